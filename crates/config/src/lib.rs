//! Configuration record types for the inspa installer builder.
//!
//! This crate models the declarative configuration that drives the builder
//! (see `inspa-core`): product metadata, installer UI text, compression
//! settings, the file collection rules, post-install scripts and
//! environment mutations. Configuration types are kept separate from the
//! packaging engine itself, so they can be shared with an embedder (a GUI, a
//! build script) without pulling in the builder/runtime implementation.

#![deny(missing_docs)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod builder;
mod validate;

pub use builder::ConfigBuilder;
pub use validate::{Diagnostic, Severity};

/// Schema versions this crate knows how to read and write.
pub const SUPPORTED_SCHEMA_VERSIONS: &[u32] = &[1];

/// Product metadata shown in the installer UI and embedded in the header.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductConfig {
    /// Display name of the product being installed.
    pub name: String,
    /// Product version string, shown verbatim in the installer UI.
    pub version: String,
    /// Company or publisher name.
    pub company: Option<String>,
    /// Short, one-line product description.
    pub description: Option<String>,
}

/// Opaque UI text, copied verbatim into the header for the runtime GUI to render.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UiConfig {
    /// Installer window title.
    pub window_title: Option<String>,
    /// Heading shown on the welcome screen.
    pub welcome_heading: Option<String>,
    /// Subtitle shown below the welcome heading.
    pub welcome_subtitle: Option<String>,
    /// Name of a bundled theme (opaque to the core).
    pub theme: Option<String>,
}

/// Install-time behavior: target directory policy, admin requirements, legal docs.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InstallConfig {
    /// Default install directory, e.g. `%ProgramFiles%\MyApp`.
    pub default_path: String,
    /// Whether the user may override [`InstallConfig::default_path`] interactively.
    #[serde(default)]
    pub allow_user_path: bool,
    /// Whether the chosen path should be hidden from casual inspection in the UI.
    #[serde(default)]
    pub force_hidden_path: bool,
    /// Whether `/S` (silent) installs are permitted.
    #[serde(default)]
    pub silent_allowed: bool,
    /// Whether the installer must run elevated.
    ///
    /// [`Config::validate`] promotes this to `true` when [`InstallConfig::default_path`]
    /// resolves under a system-privileged location, regardless of the configured value.
    #[serde(default)]
    pub require_admin: bool,
    /// Path to a license file to show before install, relative to the config file.
    pub license_file: Option<String>,
    /// Path to a privacy policy file to show before install.
    pub privacy_file: Option<String>,
}

/// Compression algorithm used for the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgo {
    /// Streaming zstd compression (primary).
    Zstd,
    /// Stored-entry ZIP archive (fallback).
    Zip,
}

/// Compression settings for the payload.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompressionConfig {
    /// Algorithm to use.
    pub algo: CompressionAlgo,
    /// zstd compression level, 1 (fastest) to 22 (smallest). Ignored for `zip`.
    #[serde(default = "default_zstd_level")]
    pub level: u8,
    /// Whether to fall back to `zip` if zstd initialization fails.
    #[serde(default)]
    pub fallback_to_zip: bool,
}

fn default_zstd_level() -> u8 {
    19
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            algo: CompressionAlgo::Zstd,
            level: default_zstd_level(),
            fallback_to_zip: true,
        }
    }
}

/// One input root to collect files from.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InputSpec {
    /// Path to a file or directory, relative to the config file or absolute.
    pub path: String,
    /// Whether directories are walked recursively.
    #[serde(default = "default_true")]
    pub recursive: bool,
    /// If true, entries are nested under `<root_basename>/` in the install tree.
    #[serde(default)]
    pub preserve_structure: bool,
}

fn default_true() -> bool {
    true
}

/// Interpreter used to run a post-install action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    /// Run via the system PowerShell executable.
    Powershell,
    /// Run via the system command interpreter.
    Batch,
}

/// Gating condition for when a post-install action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum RunIf {
    /// Always run, regardless of prior action outcomes.
    Always,
    /// Run only if every prior action succeeded.
    Success,
    /// Run only if any prior action failed.
    Failure,
}

/// A single post-install action.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostAction {
    /// Which interpreter runs [`PostAction::command`].
    #[serde(rename = "type")]
    pub kind: ScriptType,
    /// Script path or inline command, resolved relative to the install directory.
    pub command: String,
    /// Extra arguments passed to the interpreter.
    #[serde(default)]
    pub args: Vec<String>,
    /// Kill the child process after this many seconds.
    pub timeout_sec: u64,
    /// When this action should run, relative to the outcome of prior actions.
    #[serde(default = "default_run_if")]
    pub run_if: RunIf,
    /// Start the child process without a visible console window.
    #[serde(default)]
    pub hidden: bool,
    /// Forward captured output to the progress sink.
    #[serde(default)]
    pub show_in_ui: bool,
    /// Working directory override. Defaults to the install target.
    pub working_dir: Option<String>,
}

fn default_run_if() -> RunIf {
    RunIf::Always
}

/// Environment mutations to apply after extraction.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnvConfig {
    /// Directories to append to `PATH` if not already present.
    #[serde(default)]
    pub add_path: Vec<String>,
    /// Environment variables to set, values may reference `%INSTALL_DIR%`.
    #[serde(default)]
    pub set: BTreeMap<String, String>,
    /// Write to the machine-wide environment store instead of the user's.
    #[serde(default)]
    pub system_scope: bool,
}

/// Resources consumed only by the external resource patcher (e.g. the stub icon).
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourcesConfig {
    /// Path to a `.ico` file to embed in the stub executable.
    pub icon: Option<String>,
}

/// The validated configuration record that drives the builder.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Schema version of this configuration document.
    pub schema_version: u32,
    /// Product metadata.
    pub product: ProductConfig,
    /// UI text, opaque to the core.
    #[serde(default)]
    pub ui: UiConfig,
    /// Install-time behavior.
    pub install: InstallConfig,
    /// Payload compression settings.
    #[serde(default)]
    pub compression: CompressionConfig,
    /// Ordered input roots to collect files from.
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    /// Ordered glob exclusion patterns, matched against collected relative paths.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Ordered post-install actions.
    #[serde(default)]
    pub post_actions: Vec<PostAction>,
    /// Environment mutations applied after extraction.
    #[serde(default)]
    pub env: EnvConfig,
    /// Resources consumed by the external resource patcher only.
    #[serde(default)]
    pub resources: ResourcesConfig,
}

/// Locations considered system-privileged for the purpose of the
/// `require_admin` promotion rule. Matched case-insensitively as a prefix of
/// [`InstallConfig::default_path`] after environment-variable style markers
/// are stripped of their surrounding `%`.
const PRIVILEGED_PATH_MARKERS: &[&str] = &[
    "programfiles",
    "programfiles(x86)",
    "programw6432",
    "windir",
    "systemroot",
    "commonprogramfiles",
];

impl Config {
    /// Returns `true` if [`InstallConfig::default_path`] resolves under a
    /// system-privileged location (e.g. `%ProgramFiles%\...`).
    pub fn targets_privileged_location(&self) -> bool {
        let path = self.install.default_path.to_ascii_lowercase();
        PRIVILEGED_PATH_MARKERS
            .iter()
            .any(|marker| path.contains(&format!("%{marker}%")) || path.contains(marker))
    }

    /// Runs all validation checks, returning every diagnostic found.
    ///
    /// This never short-circuits: callers that need a hard yes/no (such as
    /// the builder) should check [`Diagnostic::severity`] for
    /// [`Severity::Error`] entries via [`Config::validate_strict`].
    pub fn validate(&self) -> Vec<Diagnostic> {
        validate::run(self)
    }

    /// Runs [`Config::validate`] and fails on the first error-level diagnostic.
    pub fn validate_strict(&self) -> Result<(), Diagnostic> {
        self.validate()
            .into_iter()
            .find(|d| d.severity == Severity::Error)
            .map_or(Ok(()), Err)
    }

    /// Applies the `require_admin` promotion rule (§3.1) and returns a
    /// normalized copy. Does not otherwise validate the record.
    pub fn normalized(mut self) -> Self {
        if self.targets_privileged_location() {
            self.install.require_admin = true;
        }
        self
    }

    /// SHA-256 over the canonical JSON serialization of this record, used as
    /// `build.config_fingerprint` in the header.
    pub fn fingerprint(&self) -> [u8; 32] {
        let bytes = serde_json::to_vec(self).expect("Config always serializes");
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hasher.finalize().into()
    }

    /// [`Config::fingerprint`] as a lowercase hex string.
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Config {
        Config {
            schema_version: 1,
            product: ProductConfig {
                name: "Demo".into(),
                version: "1.0.0".into(),
                company: None,
                description: None,
            },
            ui: UiConfig::default(),
            install: InstallConfig {
                default_path: "C:/Demo".into(),
                allow_user_path: true,
                force_hidden_path: false,
                silent_allowed: true,
                require_admin: false,
                license_file: None,
                privacy_file: None,
            },
            compression: CompressionConfig::default(),
            inputs: vec![],
            exclude: vec![],
            post_actions: vec![],
            env: EnvConfig::default(),
            resources: ResourcesConfig::default(),
        }
    }

    #[test]
    fn fingerprint_is_stable_for_equal_configs() {
        let a = minimal();
        let b = minimal();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let a = minimal();
        let mut b = minimal();
        b.product.version = "2.0.0".into();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn require_admin_promoted_under_program_files() {
        let mut cfg = minimal();
        cfg.install.default_path = "%ProgramFiles%\\Demo".into();
        let cfg = cfg.normalized();
        assert!(cfg.install.require_admin);
    }

    #[test]
    fn require_admin_not_promoted_for_user_path() {
        let mut cfg = minimal();
        cfg.install.default_path = "%LocalAppData%\\Demo".into();
        let cfg = cfg.normalized();
        assert!(!cfg.install.require_admin);
    }

    #[test]
    fn serde_round_trip() {
        let cfg = minimal();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
