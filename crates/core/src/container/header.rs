// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The JSON header block: product/UI/install/compression/env metadata,
//! the file manifest, post-install scripts, the payload hash and build info.
//!
//! Serialized as canonical UTF-8 JSON with no trailing newline. `hash.archive`
//! is written as a fixed 64-character hex placeholder during assembly and
//! patched in place once the payload's digest is known (see
//! `container::writer`), so the header's byte length never changes after the
//! length prefix has already been written.

use inspa_config::{CompressionConfig, Config, EnvConfig, InstallConfig, ProductConfig, UiConfig};
use serde::{Deserialize, Serialize};

use crate::{collector::FileManifest, Error, Result};

pub const HEADER_MAGIC: &str = "inspa-header";

/// 64 lowercase hex characters: the length the `hash.archive` placeholder
/// and its final patched value must always agree on.
pub const HASH_HEX_LEN: usize = 64;

fn zero_hash_hex() -> String {
    "0".repeat(HASH_HEX_LEN)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub mtime: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptEntry {
    #[serde(rename = "type")]
    pub kind: inspa_config::ScriptType,
    pub command: String,
    pub args: Vec<String>,
    pub timeout_sec: u64,
    pub run_if: inspa_config::RunIf,
    pub hidden: bool,
    pub show_in_ui: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashInfo {
    pub algo: String,
    pub archive: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInfo {
    pub timestamp: i64,
    pub builder_version: String,
    pub config_fingerprint: String,
}

/// The on-disk JSON header record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub magic: String,
    pub schema_version: u32,
    pub product: ProductConfig,
    pub ui: UiConfig,
    pub install: InstallConfig,
    pub compression: CompressionConfig,
    pub env: EnvConfig,
    pub files: Vec<FileEntry>,
    pub scripts: Vec<ScriptEntry>,
    pub hash: HashInfo,
    pub build: BuildInfo,
}

impl Header {
    /// Builds a header from a configuration and manifest, with a zeroed
    /// `hash.archive` placeholder to be patched after the payload is written.
    pub fn new(config: &Config, manifest: &FileManifest, timestamp: i64) -> Self {
        Self {
            magic: HEADER_MAGIC.to_string(),
            schema_version: config.schema_version,
            product: config.product.clone(),
            ui: config.ui.clone(),
            install: config.install.clone(),
            compression: config.compression.clone(),
            env: config.env.clone(),
            files: manifest
                .0
                .iter()
                .map(|e| FileEntry {
                    path: e.logical_path.clone(),
                    size: e.size,
                    mtime: e.mtime,
                })
                .collect(),
            scripts: config
                .post_actions
                .iter()
                .map(|a| ScriptEntry {
                    kind: a.kind,
                    command: a.command.clone(),
                    args: a.args.clone(),
                    timeout_sec: a.timeout_sec,
                    run_if: a.run_if,
                    hidden: a.hidden,
                    show_in_ui: a.show_in_ui,
                })
                .collect(),
            hash: HashInfo {
                algo: "sha256".into(),
                archive: zero_hash_hex(),
            },
            build: BuildInfo {
                timestamp,
                builder_version: env!("CARGO_PKG_VERSION").to_string(),
                config_fingerprint: config.fingerprint_hex(),
            },
        }
    }

    /// Serializes to canonical UTF-8 JSON with no trailing newline.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::HeaderMalformed)
    }

    /// Parses a header from its JSON bytes, validating the schema version
    /// against [`inspa_config::SUPPORTED_SCHEMA_VERSIONS`].
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let header: Self = serde_json::from_slice(bytes).map_err(Error::HeaderMalformed)?;
        if !inspa_config::SUPPORTED_SCHEMA_VERSIONS.contains(&header.schema_version) {
            return Err(Error::UnsupportedSchema(header.schema_version));
        }
        Ok(header)
    }

    /// Finds the byte offset of the `hash.archive` placeholder's value
    /// within `header_json`, so the writer can patch it in place without
    /// re-serializing (and thus without changing the header's byte length).
    pub fn locate_hash_placeholder(header_json: &[u8]) -> Result<usize> {
        let needle = format!("\"archive\":\"{}\"", zero_hash_hex());
        let haystack =
            std::str::from_utf8(header_json).map_err(|_| Error::TrailingBytes)?;
        let key_offset = haystack
            .find(&needle)
            .ok_or(Error::TrailingBytes)?;
        Ok(key_offset + "\"archive\":\"".len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inspa_config::ConfigBuilder;

    fn sample_config() -> Config {
        ConfigBuilder::new()
            .product("Demo", "1.0.0")
            .default_path("C:/Demo")
            .build()
    }

    #[test]
    fn round_trips_through_json() {
        let config = sample_config();
        let manifest = FileManifest::default();
        let header = Header::new(&config, &manifest, 1_700_000_000);
        let bytes = header.to_json_bytes().unwrap();
        assert!(!bytes.ends_with(b"\n"));

        let parsed = Header::from_json_bytes(&bytes).unwrap();
        assert_eq!(parsed.product.name, "Demo");
        assert_eq!(parsed.hash.archive.len(), HASH_HEX_LEN);
    }

    #[test]
    fn rejects_unsupported_schema_version() {
        let config = sample_config();
        let manifest = FileManifest::default();
        let mut header = Header::new(&config, &manifest, 0);
        header.schema_version = 999;
        let bytes = header.to_json_bytes().unwrap();
        assert!(matches!(
            Header::from_json_bytes(&bytes),
            Err(Error::UnsupportedSchema(999))
        ));
    }

    #[test]
    fn locates_hash_placeholder() {
        let config = sample_config();
        let manifest = FileManifest::default();
        let header = Header::new(&config, &manifest, 0);
        let bytes = header.to_json_bytes().unwrap();
        let offset = Header::locate_hash_placeholder(&bytes).unwrap();
        let slice = &bytes[offset..offset + HASH_HEX_LEN];
        assert_eq!(slice, zero_hash_hex().as_bytes());
    }
}
