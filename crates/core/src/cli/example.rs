// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Writes a starter configuration file for the `example` subcommand.

use std::path::Path;

use crate::{Error, Result};

const SAMPLE: &str = r#"schemaVersion = 1
exclude = ["*.pdb"]

[product]
name = "My App"
version = "1.0.0"
company = "My Company"

[install]
defaultPath = "%LocalAppData%\\My App"
allowUserPath = true
silentAllowed = true

[compression]
algo = "zstd"
level = 19
fallbackToZip = true

[[inputs]]
path = "dist"
recursive = true
preserveStructure = false

[[postActions]]
type = "batch"
command = "register.bat"
timeoutSec = 30
runIf = "always"
hidden = true

[env]
addPath = ["%INSTALL_DIR%\\bin"]

[env.set]
MY_APP_HOME = "%INSTALL_DIR%"
"#;

/// Writes [`SAMPLE`] to `path`, creating parent directories as needed.
pub fn write(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(Error::BuildIo)?;
    }
    std::fs::write(path, SAMPLE).map_err(Error::BuildIo)?;
    println!("wrote {}", inspa_utils::display_path(path));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_parses_as_a_valid_config() {
        let config: inspa_config::Config = toml::from_str(SAMPLE).unwrap();
        assert!(config.validate_strict().is_ok());
    }
}
