// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned while building or running a self-extracting installer.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration failed validation; contains the collected diagnostics.
    #[error("configuration is invalid: {}", join_diagnostics(.0))]
    ConfigInvalid(Vec<inspa_config::Diagnostic>),
    /// Two distinct source paths produced the same logical path in the manifest.
    #[error("duplicate logical path in manifest: {0}")]
    CollectorDuplicate(String),
    /// I/O failure while walking input roots.
    #[error("failed to collect input files: {0}")]
    CollectorIo(std::io::Error),
    /// The chosen compression backend failed to initialize.
    #[error("failed to initialize compressor: {0}")]
    CompressionInitFailure(std::io::Error),
    /// The stub executable could not be read.
    #[error("stub executable not found at {0}")]
    StubMissing(PathBuf),
    /// I/O failure while assembling the container.
    #[error("I/O error while building container: {0}")]
    BuildIo(#[from] std::io::Error),
    /// The trailing footer record could not be located in the executable.
    #[error("footer not found; this does not look like an installer container")]
    FooterNotFound,
    /// The header block failed to parse as JSON.
    #[error("header is malformed: {0}")]
    HeaderMalformed(#[from] serde_json::Error),
    /// The header declares a schema version this reader does not understand.
    #[error("unsupported header schema version {0}")]
    UnsupportedSchema(u32),
    /// The payload's hash did not match the recorded digest.
    #[error("integrity check failed: payload hash does not match footer")]
    IntegrityFailure,
    /// A manifest entry would have escaped the extraction target directory.
    #[error("refusing to extract {0:?}: escapes target directory")]
    PathEscape(String),
    /// I/O failure while extracting files.
    #[error("I/O error while extracting: {0}")]
    ExtractIo(std::io::Error),
    /// A post-install script exceeded its configured timeout.
    #[error("script timed out after {0}s: {1}")]
    ScriptTimedOut(u64, String),
    /// A post-install script exited with a non-zero status.
    #[error("script failed with exit code {0:?}: {1}")]
    ScriptFailed(Option<i32>, String),
    /// An environment mutation required a privilege scope that was unavailable.
    #[error("environment scope denied: {0}")]
    EnvScopeDenied(String),
    /// The operation was cancelled.
    #[error("cancelled")]
    Cancelled,
    /// Trailing bytes remained after decoding every manifest entry.
    #[error("payload stream has trailing bytes past the last manifest entry")]
    TrailingBytes,
    /// TOML parse error while loading a configuration file.
    #[error("failed to parse config: {0}")]
    TomlConfig(#[from] toml::de::Error),
    /// Glob pattern error while compiling exclusion rules.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Glob evaluation error while walking a glob input.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Directory walk error.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    /// Zip archive error.
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// Failed to express a collected file's path relative to its input root.
    #[error(transparent)]
    RelativeTo(#[from] relative_path::RelativeToError),
    /// Hex decode error.
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    /// Clap argument parsing error.
    #[cfg(feature = "cli")]
    #[error(transparent)]
    Clap(#[from] clap::error::Error),
}

fn join_diagnostics(diagnostics: &[inspa_config::Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenient alias for [`Result`](std::result::Result) with [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Maps an error onto the CLI exit code taxonomy of the installer's external interface:
    /// `1` for user/config errors, `2` for integrity/runtime errors, `3` for I/O errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ConfigInvalid(_)
            | Error::CollectorDuplicate(_)
            | Error::UnsupportedSchema(_)
            | Error::TomlConfig(_)
            | Error::GlobPattern(_) => 1,
            Error::IntegrityFailure
            | Error::PathEscape(_)
            | Error::FooterNotFound
            | Error::HeaderMalformed(_)
            | Error::TrailingBytes
            | Error::Cancelled
            | Error::ScriptTimedOut(..)
            | Error::ScriptFailed(..)
            | Error::EnvScopeDenied(_) => 2,
            _ => 3,
        }
    }
}
