// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `inspa-core`: the builder and runtime for a self-extracting Windows
//! installer format.
//!
//! A built installer is a stub executable with a compressed payload and a
//! JSON header spliced onto its end, terminated by a fixed-size footer
//! record ([`container::footer::Footer`]) that lets the stub find its own
//! payload at runtime without any external metadata.
//!
//! ## Builder pipeline
//!
//! [`collector::collect`] walks the configured input roots into a
//! [`collector::FileManifest`], [`container::writer::build`] streams that
//! manifest through a [`compress::Compressor`] and appends it to a copy of
//! the stub executable, hashing the payload with [`hash::Hasher`] as it goes.
//!
//! ## Runtime pipeline
//!
//! [`container::reader::Container::open_self`] locates the footer and header
//! of the running executable, [`container::reader::Container::verify`]
//! re-hashes the payload, [`extract::extract`] decompresses it into a target
//! directory, [`script::run_all`] runs any post-install actions, and
//! [`env_mutator::apply`] applies `PATH`/environment mutations. Progress and
//! cancellation flow through [`progress::ProgressSink`] and
//! [`progress::CancellationFlag`] rather than direct UI calls, so the same
//! runtime drives both the CLI and a future GUI front end.
//!
//! ## Feature flags
//!
//! - **`cli`**: enables the `inspa` binary and its `clap`/`tracing-subscriber`
//!   dependencies. Enabled by default.
//! - **`schema`**: re-exports `inspa-config`'s JSON schema generation.

#![deny(missing_docs)]

pub mod collector;
pub mod compress;
pub mod config_io;
pub mod container;
pub mod env_mutator;
mod error;
pub mod extract;
pub mod hash;
pub mod progress;
pub mod script;
mod shell;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};

pub use inspa_config::{Config, Diagnostic, Severity};

#[cfg(feature = "cli")]
fn parse_log_level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing_subscriber::EnvFilter::builder()
            .from_env_lossy()
            .max_level_hint()
            .and_then(|l| l.into_level())
            .unwrap_or(tracing::Level::INFO),
        1 => tracing::Level::DEBUG,
        2.. => tracing::Level::TRACE,
    }
}

/// Initializes the global `tracing` subscriber for the CLI binary.
///
/// Not called automatically: an embedder (a GUI front end, an integration
/// test) that wants its own subscriber should skip this and wire `tracing`
/// up itself.
#[cfg(feature = "cli")]
pub fn init_tracing_subscriber(verbosity: u8) {
    let level = parse_log_level(verbosity);
    let debug = level == tracing::Level::DEBUG;
    let trace = level == tracing::Level::TRACE;

    tracing_subscriber::fmt()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_target(debug)
        .with_line_number(trace)
        .with_file(trace)
        .with_max_level(level)
        .without_time()
        .init();
}

/// Initializes the global `tracing` subscriber for a runtime operation
/// (extraction or a silent install) that writes to `install.log` under
/// `install_dir` in addition to stderr, per the persisted-state contract.
///
/// Falls back to the platform temp directory if `install_dir` cannot be
/// created. Like [`init_tracing_subscriber`], call this at most once.
#[cfg(feature = "cli")]
pub fn init_install_logging(verbosity: u8, install_dir: &std::path::Path) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = parse_log_level(verbosity);
    let debug = level == tracing::Level::DEBUG;
    let trace = level == tracing::Level::TRACE;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_target(debug)
        .with_line_number(trace)
        .with_file(trace)
        .without_time();

    let log_dir = std::fs::create_dir_all(install_dir)
        .map(|()| install_dir.to_path_buf())
        .unwrap_or_else(|_| std::env::temp_dir());
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("install.log"))
        .ok();
    let file_layer = log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .without_time()
            .with_writer(std::sync::Mutex::new(file))
    });

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::from_level(level).into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn public_modules_are_reachable() {
        let _ = crate::hash::Hasher::new();
    }
}
