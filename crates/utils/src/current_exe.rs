// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Find the path to the currently running binary, taking care of the usual
//! TOCTOU and symlink pitfalls around [`std::env::current_exe`].
//!
//! The installer's Container Reader (see `inspa-core::container::reader`)
//! needs to open *itself* to locate the embedded payload, so the path it
//! gets back here must actually point at the running executable and not at
//! something an attacker swapped in underneath it.

/// Retrieves the currently running binary's path, taking into account security considerations.
///
/// The path is cached as soon as possible (before even `main` runs) and that value is returned
/// repeatedly instead of fetching the path every time. It is possible for the path to not be
/// found, or explicitly disabled (see following macOS-specific behavior, kept for parity with
/// other platforms even though the runtime itself only targets Windows).
///
/// # Security
///
/// We canonicalize the path returned by [`std::env::current_exe`] to resolve any soft links.
/// This avoids the usual issue of needing the file to exist at the passed path, because a valid
/// current executable result for our purpose should always exist.
pub fn current_exe() -> std::io::Result<PathBuf> {
    STARTING_BINARY.cloned()
}

use ctor::ctor;
use std::{
    io::{Error, ErrorKind, Result},
    path::{Path, PathBuf},
};

/// A cached version of the current binary using [`ctor`] to cache it before even `main` runs.
#[ctor]
#[used]
static STARTING_BINARY: StartingBinary = StartingBinary::new();

/// Represents a binary path that was cached when the program was loaded.
struct StartingBinary(std::io::Result<PathBuf>);

impl StartingBinary {
    /// Find the starting executable as safely as possible.
    fn new() -> Self {
        let dangerous_path = match std::env::current_exe() {
            Ok(dangerous_path) => dangerous_path,
            error @ Err(_) => return Self(error),
        };

        if let Some(symlink) = Self::has_symlink(&dangerous_path) {
            return Self(Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "current_exe() resolved through a symlink on a non-allowed platform: {}",
                    symlink.display()
                ),
            )));
        }

        Self(dunce::canonicalize(&dangerous_path))
    }

    /// A clone of the [`PathBuf`] found to be the starting path.
    ///
    /// Because [`Error`] is not clone-able, it is recreated instead.
    fn cloned(&self) -> Result<PathBuf> {
        self.0
            .as_ref()
            .map(Clone::clone)
            .map_err(|e| Error::new(e.kind(), e.to_string()))
    }

    #[cfg(any(
        not(target_os = "macos"),
        feature = "process-relaunch-dangerous-allow-symlink-macos"
    ))]
    fn has_symlink(_: &Path) -> Option<&Path> {
        None
    }

    #[cfg(all(
        target_os = "macos",
        not(feature = "process-relaunch-dangerous-allow-symlink-macos")
    ))]
    fn has_symlink(path: &Path) -> Option<&Path> {
        path.ancestors().find(|ancestor| {
            matches!(
                ancestor
                    .symlink_metadata()
                    .as_ref()
                    .map(std::fs::Metadata::file_type)
                    .as_ref()
                    .map(std::fs::FileType::is_symlink),
                Ok(true)
            )
        })
    }
}
