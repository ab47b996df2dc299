// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Materializes a decompressed payload stream under a target directory,
//! staging files in a hidden subdirectory and promoting them only once the
//! entire extraction has succeeded.

use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use relative_path::PathExt;

use crate::{
    compress::Decompressor,
    container::reader::Container,
    progress::{CancellationFlag, ProgressEvent, ProgressSink},
    Error, Result,
};

const STAGING_DIR_NAME: &str = ".inspa_staging";
/// Extractor copy buffer, per the streaming discipline (≤ 1 MiB).
const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Extracts every file described by `container`'s header into `target_dir`.
///
/// Files are first written under `target_dir/.inspa_staging/<logical_path>`
/// and only renamed into their final position after every entry has been
/// written successfully, so a failure or cancellation never leaves partial
/// files directly under `target_dir`.
pub fn extract(
    container: &Container,
    target_dir: &Path,
    progress: &ProgressSink,
    cancel: &CancellationFlag,
) -> Result<()> {
    let staging_dir = target_dir.join(STAGING_DIR_NAME);
    let result = extract_into_staging(container, &staging_dir, progress, cancel);

    match result {
        Ok(()) => {
            promote_staging(&staging_dir, target_dir)?;
            let _ = fs::remove_dir_all(&staging_dir);
            progress.send(ProgressEvent::Completed);
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_dir_all(&staging_dir);
            progress.send(ProgressEvent::Failed(e.to_string()));
            Err(e)
        }
    }
}

fn extract_into_staging(
    container: &Container,
    staging_dir: &Path,
    progress: &ProgressSink,
    cancel: &CancellationFlag,
) -> Result<()> {
    fs::create_dir_all(staging_dir).map_err(Error::ExtractIo)?;
    let staging_root = dunce::canonicalize(staging_dir).map_err(Error::ExtractIo)?;

    let header = container.header();
    let bytes_total: u64 = header.files.iter().map(|f| f.size).sum();
    let mut bytes_done: u64 = 0;

    let payload = container.payload_reader()?;
    match Decompressor::new(payload, header.compression.algo)? {
        Decompressor::Zstd(mut decoder) => {
            for entry in &header.files {
                check_cancelled(cancel)?;
                extract_framed_entry(
                    &mut decoder,
                    entry,
                    &staging_root,
                    progress,
                    &mut bytes_done,
                    bytes_total,
                )?;
            }
            let mut trailing = [0u8; 1];
            if decoder.read(&mut trailing).map_err(Error::ExtractIo)? != 0 {
                return Err(Error::TrailingBytes);
            }
        }
        Decompressor::Zip(mut archive) => {
            for i in 0..archive.len() {
                check_cancelled(cancel)?;
                let mut file = archive.by_index(i)?;
                let logical_path = file.name().to_string();
                let dest = staged_path(&staging_root, &logical_path)?;
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(Error::ExtractIo)?;
                }
                let mut out = fs::File::create(&dest).map_err(Error::ExtractIo)?;
                let written = std::io::copy(&mut file, &mut out).map_err(Error::ExtractIo)?;
                bytes_done += written;
                progress.send(ProgressEvent::FileFinished {
                    path: logical_path.clone(),
                });
                progress.send(ProgressEvent::BytesProgressed {
                    bytes_done,
                    bytes_total,
                });
            }
        }
    }

    Ok(())
}

fn extract_framed_entry(
    decoder: &mut impl Read,
    entry: &crate::container::header::FileEntry,
    staging_root: &Path,
    progress: &ProgressSink,
    bytes_done: &mut u64,
    bytes_total: u64,
) -> Result<()> {
    let mut len_buf = [0u8; 8];
    decoder.read_exact(&mut len_buf).map_err(Error::ExtractIo)?;
    let path_len = u64::from_le_bytes(len_buf) as usize;
    let mut path_buf = vec![0u8; path_len];
    decoder.read_exact(&mut path_buf).map_err(Error::ExtractIo)?;
    let logical_path = String::from_utf8_lossy(&path_buf).into_owned();

    decoder.read_exact(&mut len_buf).map_err(Error::ExtractIo)?;
    let size = u64::from_le_bytes(len_buf);

    progress.send(ProgressEvent::FileStarted {
        path: logical_path.clone(),
    });

    let dest = staged_path(staging_root, &logical_path)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(Error::ExtractIo)?;
    }
    let mut out = fs::File::create(&dest).map_err(Error::ExtractIo)?;

    let mut remaining = size;
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    while remaining > 0 {
        let chunk = (remaining as usize).min(buf.len());
        decoder
            .read_exact(&mut buf[..chunk])
            .map_err(Error::ExtractIo)?;
        std::io::Write::write_all(&mut out, &buf[..chunk]).map_err(Error::ExtractIo)?;
        remaining -= chunk as u64;
        *bytes_done += chunk as u64;
    }

    set_mtime(&dest, entry.mtime);

    progress.send(ProgressEvent::FileFinished {
        path: logical_path,
    });
    progress.send(ProgressEvent::BytesProgressed {
        bytes_done: *bytes_done,
        bytes_total,
    });
    Ok(())
}

/// Validates that `logical_path` cannot escape `staging_root` (rejects `..`
/// segments, absolute paths, and anything that resolves outside once its
/// parent is canonicalized) and returns the path it should be staged at.
fn staged_path(staging_root: &Path, logical_path: &str) -> Result<PathBuf> {
    if Path::new(logical_path).is_absolute()
        || logical_path
            .split('/')
            .any(|segment| segment == ".." || segment == ".")
    {
        return Err(Error::PathEscape(logical_path.to_string()));
    }

    let dest = staging_root.join(logical_path);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(Error::ExtractIo)?;
        let canonical_parent = dunce::canonicalize(parent).map_err(Error::ExtractIo)?;
        if !canonical_parent.starts_with(staging_root) {
            return Err(Error::PathEscape(logical_path.to_string()));
        }
    }
    Ok(dest)
}

/// Renames every file under `staging_dir` into its final position under
/// `target_dir`, mirroring the staged relative layout.
fn promote_staging(staging_dir: &Path, target_dir: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(staging_dir) {
        let entry = entry.map_err(Error::WalkDir)?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().relative_to(staging_dir)?;
        let dest = target_dir.join(relative.to_path(""));
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(Error::ExtractIo)?;
        }
        fs::rename(entry.path(), &dest).map_err(Error::ExtractIo)?;
    }
    Ok(())
}

fn check_cancelled(cancel: &CancellationFlag) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(target_os = "windows")]
fn set_mtime(_path: &Path, _mtime: i64) {
    // Best-effort only: setting file times requires extra Windows API calls
    // the core does not otherwise need; extraction succeeds either way.
}

#[cfg(not(target_os = "windows"))]
fn set_mtime(path: &Path, mtime: i64) {
    use std::time::{Duration, UNIX_EPOCH};
    if let Ok(file) = fs::File::open(path) {
        let time = UNIX_EPOCH + Duration::from_secs(mtime.max(0) as u64);
        let _ = file.set_modified(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        container::writer,
        progress::{CancellationFlag, ProgressSink},
    };
    use inspa_config::ConfigBuilder;
    use std::fs;
    use std::sync::mpsc;

    fn build_sample(dir: &Path) -> Container {
        fs::write(dir.join("stub.exe"), b"MZ-stub").unwrap();
        let inputs_dir = dir.join("in");
        fs::create_dir(&inputs_dir).unwrap();
        fs::write(inputs_dir.join("readme.txt"), b"hello\n").unwrap();

        let config = ConfigBuilder::new()
            .product("Demo", "1.0.0")
            .default_path("C:/Demo")
            .input(inspa_config::InputSpec {
                path: "in".into(),
                recursive: true,
                preserve_structure: false,
            })
            .build();

        let out = dir.join("installer.exe");
        writer::build(&config, &dir.join("stub.exe"), dir, &out, 0).unwrap();
        Container::open_path(&out).unwrap()
    }

    #[test]
    fn round_trips_file_content() {
        let dir = tempfile::tempdir().unwrap();
        let container = build_sample(dir.path());
        let target = dir.path().join("install");
        fs::create_dir(&target).unwrap();

        let (tx, _rx) = mpsc::channel();
        let sink = ProgressSink::new(tx);
        let cancel = CancellationFlag::new();

        extract(&container, &target, &sink, &cancel).unwrap();

        let content = fs::read_to_string(target.join("readme.txt")).unwrap();
        assert_eq!(content, "hello\n");
        assert!(!target.join(STAGING_DIR_NAME).exists());
    }

    #[test]
    fn rejects_path_escape() {
        let root = tempfile::tempdir().unwrap();
        let err = staged_path(root.path(), "../evil.txt").unwrap_err();
        assert!(matches!(err, Error::PathEscape(_)));
    }

    #[test]
    fn cancellation_leaves_no_files_under_target() {
        let dir = tempfile::tempdir().unwrap();
        let container = build_sample(dir.path());
        let target = dir.path().join("install");
        fs::create_dir(&target).unwrap();

        let (tx, _rx) = mpsc::channel();
        let sink = ProgressSink::new(tx);
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let result = extract(&container, &target, &sink, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!target.join("readme.txt").exists());
        assert!(!target.join(STAGING_DIR_NAME).exists());
    }
}
