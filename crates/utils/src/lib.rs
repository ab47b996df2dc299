//! Small reusable utilities shared by `inspa-config` and `inspa-core`.

pub mod current_exe;

use std::{
    ffi::OsStr,
    fs,
    io::BufWriter,
    path::{Path, PathBuf},
};

/// Human-friendly rendering of a path: `\\?\`-free on Windows, unchanged elsewhere.
#[inline]
pub fn display_path<P: AsRef<Path>>(p: P) -> String {
    dunce::simplified(&p.as_ref().components().collect::<PathBuf>())
        .display()
        .to_string()
}

/// Creates a new file at `path`, creating parent directories as needed.
#[inline]
pub fn create_file(path: &Path) -> std::io::Result<BufWriter<fs::File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(fs::File::create(path)?))
}

/// Extension trait for appending an additional extension, e.g.
/// `asset.zip` -> `asset.zip.sig` instead of replacing `.zip`.
pub trait PathExt {
    /// Appends `extension`, preserving any extension already present.
    fn with_additional_extension(&self, extension: impl AsRef<OsStr>) -> PathBuf;
}

impl PathExt for Path {
    fn with_additional_extension(&self, extension: impl AsRef<OsStr>) -> PathBuf {
        match self.extension() {
            Some(ext) => {
                let mut e = ext.to_os_string();
                e.push(".");
                e.push(extension);
                self.with_extension(e)
            }
            None => self.with_extension(extension),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_appends_ext() {
        assert_eq!(
            PathBuf::from("./asset.zip").with_additional_extension("sig"),
            PathBuf::from("./asset.zip.sig")
        );
        assert_eq!(
            PathBuf::from("./installer").with_additional_extension("log"),
            PathBuf::from("./installer.log")
        )
    }
}
