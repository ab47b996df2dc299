// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Walks configured input roots into a deterministic, de-duplicated
//! [`FileManifest`], applying glob exclusion rules along the way.

use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};

use inspa_config::{Config, InputSpec};
use relative_path::PathExt;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::{Error, Result};

/// One entry of the ordered [`FileManifest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Forward-slash relative path under which the file appears after install.
    pub logical_path: String,
    /// Where to read the file's bytes from during the build.
    pub source_path: PathBuf,
    /// File size in bytes, as observed at collection time.
    pub size: u64,
    /// Modification time, Unix seconds.
    pub mtime: i64,
}

/// The ordered sequence of files that make up the installer's payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileManifest(pub Vec<ManifestEntry>);

impl FileManifest {
    /// Total size, in bytes, of every entry's source file.
    pub fn total_size(&self) -> u64 {
        self.0.iter().map(|e| e.size).sum()
    }
}

/// Walks `config.inputs` relative to `base_dir`, applying `config.exclude`
/// glob patterns, and returns a manifest with entries in deterministic,
/// lexicographically-sorted order.
pub fn collect(config: &Config, base_dir: &Path) -> Result<FileManifest> {
    let excludes = compile_excludes(&config.exclude)?;
    let mut by_logical_path: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut visited_inodes: HashSet<FileKey> = HashSet::new();

    for input in &config.inputs {
        collect_one_root(input, base_dir, &excludes, &mut by_logical_path, &mut visited_inodes)?;
    }

    let mut entries = Vec::with_capacity(by_logical_path.len());
    for (logical_path, source_path) in by_logical_path {
        let metadata = std::fs::metadata(&source_path).map_err(Error::CollectorIo)?;
        entries.push(ManifestEntry {
            logical_path,
            size: metadata.len(),
            mtime: mtime_unix_seconds(&metadata),
            source_path,
        });
    }

    Ok(FileManifest(entries))
}

fn collect_one_root(
    input: &InputSpec,
    base_dir: &Path,
    excludes: &[glob::Pattern],
    by_logical_path: &mut BTreeMap<String, PathBuf>,
    visited_inodes: &mut HashSet<FileKey>,
) -> Result<()> {
    let root = base_dir.join(&input.path);
    if !root.exists() {
        return Err(Error::CollectorIo(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input path does not exist: {}", root.display()),
        )));
    }
    let canonical_root = dunce::canonicalize(&root).map_err(Error::CollectorIo)?;

    let root_basename = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut walker = WalkDir::new(&root).sort_by_file_name();
    if !input.recursive {
        walker = walker.max_depth(1);
    }

    let walker = walker
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| is_within_root(entry, &canonical_root));

    for entry in walker {
        let entry = entry.map_err(Error::WalkDir)?;
        if entry.file_type().is_dir() {
            continue;
        }

        if entry.path_is_symlink() {
            if let Ok(metadata) = entry.metadata() {
                if !visited_inodes.insert(FileKey::from_metadata(&metadata)) {
                    continue; // symlink cycle, already seen this underlying file
                }
            }
        }

        let relative_str = entry.path().relative_to(&root)?.into_string();

        if is_excluded(&relative_str, excludes) {
            continue;
        }

        let logical_path = if input.preserve_structure {
            format!("{root_basename}/{relative_str}")
        } else {
            relative_str
        };

        match by_logical_path.get(&logical_path) {
            Some(existing) if existing != entry.path() => {
                return Err(Error::CollectorDuplicate(logical_path));
            }
            _ => {
                by_logical_path.insert(logical_path, entry.path().to_path_buf());
            }
        }
    }

    Ok(())
}

/// A symlinked directory is only traversed if it resolves inside
/// `canonical_root`; everything else (regular entries, and symlinks that
/// stay inside the root) passes through unfiltered.
fn is_within_root(entry: &walkdir::DirEntry, canonical_root: &Path) -> bool {
    if !(entry.path_is_symlink() && entry.file_type().is_dir()) {
        return true;
    }
    dunce::canonicalize(entry.path())
        .map(|canonical| canonical.starts_with(canonical_root))
        .unwrap_or(false)
}

fn compile_excludes(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| glob::Pattern::new(p).map_err(Error::GlobPattern))
        .collect()
}

fn is_excluded(relative_path: &str, excludes: &[glob::Pattern]) -> bool {
    excludes.iter().any(|p| p.matches(relative_path))
}

fn mtime_unix_seconds(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Cheap per-file identity used to detect symlink cycles during the walk.
/// On platforms without inode numbers this degenerates to canonical path
/// identity, which is still sufficient to break cycles.
#[derive(PartialEq, Eq, Hash)]
struct FileKey(u64, u64);

impl FileKey {
    #[cfg(unix)]
    fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self(metadata.dev(), metadata.ino())
    }

    #[cfg(not(unix))]
    fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        use std::time::UNIX_EPOCH;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(metadata.len(), modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inspa_config::ConfigBuilder;
    use std::fs;

    fn input(path: &str, recursive: bool, preserve_structure: bool) -> InputSpec {
        InputSpec {
            path: path.into(),
            recursive,
            preserve_structure,
        }
    }

    #[test]
    fn collects_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let config = ConfigBuilder::new().input(input(".", true, false)).build();
        let manifest = collect(&config, dir.path()).unwrap();

        let names: Vec<_> = manifest.0.iter().map(|e| e.logical_path.clone()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn exclusion_globs_skip_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "k").unwrap();
        fs::write(dir.path().join("skip.log"), "s").unwrap();

        let mut config = ConfigBuilder::new().input(input(".", true, false)).build();
        config.exclude = vec!["*.log".into()];
        let manifest = collect(&config, dir.path()).unwrap();

        assert_eq!(manifest.0.len(), 1);
        assert_eq!(manifest.0[0].logical_path, "keep.txt");
    }

    #[test]
    fn preserve_structure_prefixes_root_basename() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("assets");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("logo.png"), "x").unwrap();

        let config = ConfigBuilder::new()
            .input(input("assets", true, true))
            .build();
        let manifest = collect(&config, dir.path()).unwrap();

        assert_eq!(manifest.0[0].logical_path, "assets/logo.png");
    }

    #[cfg(unix)]
    #[test]
    fn a_symlinked_directory_pointing_outside_the_root_is_not_traversed() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "nope").unwrap();

        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        symlink(outside.path(), root.join("escape")).unwrap();
        fs::write(root.join("keep.txt"), "k").unwrap();

        let config = ConfigBuilder::new().input(input("root", true, false)).build();
        let manifest = collect(&config, dir.path()).unwrap();

        let names: Vec<_> = manifest.0.iter().map(|e| e.logical_path.clone()).collect();
        assert_eq!(names, vec!["keep.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn a_hardlink_reachable_from_two_input_roots_appears_under_both_logical_paths() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::create_dir(&a).unwrap();
        fs::create_dir(&b).unwrap();
        fs::write(a.join("shared.txt"), "x").unwrap();
        fs::hard_link(a.join("shared.txt"), b.join("shared.txt")).unwrap();

        let config = ConfigBuilder::new()
            .input(input("a", true, true))
            .input(input("b", true, true))
            .build();
        let manifest = collect(&config, dir.path()).unwrap();

        let names: Vec<_> = manifest.0.iter().map(|e| e.logical_path.clone()).collect();
        assert_eq!(names, vec!["a/shared.txt", "b/shared.txt"]);
    }
}
