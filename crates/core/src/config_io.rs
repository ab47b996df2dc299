// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Reads a [`Config`] from disk, accepting either TOML or JSON based on the
//! file extension, then runs strict validation and the `require_admin`
//! normalization pass.

use std::path::Path;

use inspa_config::Config;

use crate::{Error, Result};

/// Loads, validates and normalizes the configuration at `path`.
///
/// `.toml` files (or anything without a recognized extension) are parsed as
/// TOML; `.json` files are parsed as JSON.
pub fn load(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).map_err(Error::BuildIo)?;
    let config = parse(path, &text)?;
    config
        .validate_strict()
        .map_err(|d| Error::ConfigInvalid(vec![d]))?;
    Ok(config.normalized())
}

fn parse(path: &Path, text: &str) -> Result<Config> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(text).map_err(Error::HeaderMalformed),
        _ => toml::from_str(text).map_err(Error::TomlConfig),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inspa.toml");
        std::fs::write(
            &path,
            r#"
            schemaVersion = 1

            [product]
            name = "Demo"
            version = "1.0.0"

            [install]
            defaultPath = "C:/Demo"
            silentAllowed = true
            "#,
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.product.name, "Demo");
    }

    #[test]
    fn rejects_a_config_that_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inspa.toml");
        std::fs::write(
            &path,
            r#"
            schemaVersion = 1

            [product]
            name = ""
            version = "1.0.0"

            [install]
            defaultPath = ""
            "#,
        )
        .unwrap();

        assert!(matches!(load(&path), Err(Error::ConfigInvalid(_))));
    }
}
