// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The `inspa` command-line entry point.

#![cfg(feature = "cli")]

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use clap::{ArgAction, CommandFactory, FromArgMatches, Parser, Subcommand};

use crate::{
    config_io, container,
    progress::{self, ProgressEvent},
    script, Error, Result,
};

mod example;

#[derive(Parser, Debug)]
#[clap(author, version, about, bin_name("inspa"), propagate_version(true))]
struct Cli {
    /// Enables verbose logging; repeat for trace-level output.
    #[clap(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Builds a self-extracting installer from a configuration file.
    Build {
        /// Path to the configuration file (TOML or JSON).
        #[clap(short, long)]
        config: PathBuf,
        /// Path to the runtime stub executable to splice the payload onto.
        #[clap(long)]
        stub: PathBuf,
        /// Directory input paths are resolved relative to. Defaults to the
        /// configuration file's parent directory.
        #[clap(long)]
        base_dir: Option<PathBuf>,
        /// Path to write the built installer to.
        #[clap(short, long)]
        output: PathBuf,
    },
    /// Validates a configuration file and reports every diagnostic found.
    Validate {
        /// Path to the configuration file (TOML or JSON).
        #[clap(short, long)]
        config: PathBuf,
        /// Print diagnostics as a JSON array instead of human-readable text.
        #[clap(long)]
        json: bool,
    },
    /// Prints the header metadata embedded in a built installer.
    Inspect {
        /// Path to a built installer.
        installer: PathBuf,
        /// Print the header as JSON instead of human-readable text.
        #[clap(long)]
        json: bool,
    },
    /// Extracts a built installer's payload into a directory.
    Extract {
        /// Path to a built installer.
        installer: PathBuf,
        /// Directory to extract into.
        #[clap(short, long)]
        dir: PathBuf,
        /// Run post-install scripts and apply environment mutations after
        /// extraction, as a real install would.
        #[clap(long)]
        run_scripts: bool,
    },
    /// Prints the footer's recorded payload hash.
    Hash {
        /// Path to a built installer.
        installer: PathBuf,
    },
    /// Placeholder for the graphical installer front end.
    Gui,
    /// Writes a sample configuration file to get started from.
    Example {
        /// Path to write the sample configuration to.
        #[clap(short, long)]
        output: PathBuf,
    },
}

fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            config,
            stub,
            base_dir,
            output,
        } => cmd_build(&config, &stub, base_dir.as_deref(), &output),
        Commands::Validate { config, json } => cmd_validate(&config, json),
        Commands::Inspect { installer, json } => cmd_inspect(&installer, json),
        Commands::Extract {
            installer,
            dir,
            run_scripts,
        } => cmd_extract(&installer, &dir, run_scripts),
        Commands::Hash { installer } => cmd_hash(&installer),
        Commands::Gui => {
            println!("the graphical front end is not implemented in this core crate");
            Ok(())
        }
        Commands::Example { output } => example::write(&output),
    }
}

fn cmd_build(
    config_path: &PathBuf,
    stub: &PathBuf,
    base_dir: Option<&std::path::Path>,
    output: &PathBuf,
) -> Result<()> {
    let config = config_io::load(config_path)?;
    let base_dir = base_dir
        .map(std::path::Path::to_path_buf)
        .or_else(|| config_path.parent().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let timestamp = now_unix();

    let result = container::build(&config, stub, &base_dir, output, timestamp)?;
    tracing::info!(
        "built {} ({} files, {} bytes payload, {:?})",
        inspa_utils::display_path(&result.output_path),
        result.file_count,
        result.payload_size,
        result.algo_used,
    );
    Ok(())
}

fn cmd_validate(config_path: &PathBuf, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(config_path).map_err(Error::BuildIo)?;
    let config: inspa_config::Config = match config_path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text).map_err(Error::HeaderMalformed)?,
        _ => toml::from_str(&text).map_err(Error::TomlConfig)?,
    };
    let diagnostics = config.validate();

    if json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else if diagnostics.is_empty() {
        println!("no problems found");
    } else {
        for d in &diagnostics {
            println!("{d}");
        }
    }

    if diagnostics
        .iter()
        .any(|d| d.severity == inspa_config::Severity::Error)
    {
        Err(Error::ConfigInvalid(diagnostics))
    } else {
        Ok(())
    }
}

fn cmd_inspect(installer: &PathBuf, json: bool) -> Result<()> {
    let container = container::Container::open_path(installer)?;
    let header = container.header();

    if json {
        println!("{}", serde_json::to_string_pretty(header)?);
    } else {
        println!("product:   {} {}", header.product.name, header.product.version);
        println!("schema:    {}", header.schema_version);
        println!("files:     {}", header.files.len());
        println!("scripts:   {}", header.scripts.len());
        println!("payload:   {} bytes", container.footer().payload_size);
        println!("hash:      {}", header.hash.archive);
    }
    Ok(())
}

fn cmd_extract(installer: &PathBuf, dir: &PathBuf, run_scripts: bool) -> Result<()> {
    let container = container::Container::open_path(installer)?;
    container.verify()?;
    run_install(&container, dir, run_scripts)
}

fn cmd_hash(installer: &PathBuf) -> Result<()> {
    let container = container::Container::open_path(installer)?;
    println!("{}", container.header().hash.archive);
    Ok(())
}

/// The runtime entry point for a bare `/S` invocation: a built installer
/// locating and installing its own spliced payload with no UI, as opposed to
/// the `extract`/`build`/etc. subcommands, which operate on an installer
/// given by path.
fn cmd_run_silent() -> Result<()> {
    let container = container::Container::open_self()?;
    container.verify()?;

    let silent_allowed = container.header().install.silent_allowed;
    if !silent_allowed {
        return Err(Error::EnvScopeDenied(
            "silent (/S) install is not permitted by this installer's configuration".into(),
        ));
    }

    let default_path = container.header().install.default_path.clone();
    let install_dir = PathBuf::from(expand_env_placeholders(&default_path));

    crate::init_install_logging(0, &install_dir);
    tracing::info!(
        "silent install into {}",
        inspa_utils::display_path(&install_dir)
    );

    run_install(&container, &install_dir, true)
}

/// Extracts `container`'s payload into `dir`, optionally running post-install
/// scripts and environment mutations, shared by [`cmd_extract`] and
/// [`cmd_run_silent`].
fn run_install(container: &container::Container, dir: &Path, run_scripts: bool) -> Result<()> {
    let (sink, rx) = progress::channel();
    let cancel = progress::CancellationFlag::new();
    let printer = std::thread::spawn(move || {
        for event in rx {
            if let ProgressEvent::LogLine(line) = event {
                tracing::info!("{line}");
            }
        }
    });

    std::fs::create_dir_all(dir).map_err(Error::ExtractIo)?;
    let result = crate::extract::extract(container, dir, &sink, &cancel);
    drop(sink);
    let _ = printer.join();
    result?;

    if run_scripts {
        let (sink, _rx) = progress::channel();
        let report = script::run_all(&container.header().scripts, dir, &sink);
        if report.had_failure {
            tracing::warn!("one or more post-install scripts failed");
        }
        crate::env_mutator::apply(&container.header().env, dir, &sink);
    }

    Ok(())
}

/// Expands Windows-style `%VAR%` placeholders (e.g. `%LocalAppData%`) in
/// `value` using the current process environment. A name with no matching
/// variable is left untouched, `%` marks with no closing `%` are passed
/// through literally.
fn expand_env_placeholders(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find('%') {
        result.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(v) => result.push_str(&v),
                    Err(_) => {
                        result.push('%');
                        result.push_str(name);
                        result.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push('%');
                rest = after;
                break;
            }
        }
    }
    result.push_str(rest);
    result
}

fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Runs the CLI, exiting the process with a code from [`Error::exit_code`] on failure.
pub fn run<I, A>(args: I)
where
    I: IntoIterator<Item = A>,
    A: Into<OsString> + Clone,
{
    if let Err(e) = try_run(args) {
        tracing::error!("{e}");
        std::process::exit(e.exit_code());
    }
}

fn try_run<I, A>(args: I) -> Result<()>
where
    I: IntoIterator<Item = A>,
    A: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

    // `/S` is the NSIS-style silent-install flag a built installer's own stub
    // is invoked with; clap's dash-based parser can't represent it, so it's
    // intercepted here before any subcommand matching happens.
    if args.iter().skip(1).any(|a| a == "/S") {
        return cmd_run_silent();
    }

    let matches = Cli::command().get_matches_from(args);
    let cli = Cli::from_arg_matches(&matches).map_err(Error::Clap)?;

    match &cli.command {
        Commands::Extract { dir, .. } => crate::init_install_logging(cli.verbose, dir),
        _ => crate::init_tracing_subscriber(cli.verbose),
    }
    run_cli(cli)
}
