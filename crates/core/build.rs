// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::{env, error::Error, fs::File, io::Write, path::PathBuf};

/// Regenerates `schema.json` from [`inspa_config::Config`] when the `schema`
/// feature is enabled. A no-op otherwise, since `JsonSchema` is only
/// implemented for `Config` behind that feature.
fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=../config/src/lib.rs");

    if env::var_os("CARGO_FEATURE_SCHEMA").is_none() {
        return Ok(());
    }

    let schema = schemars::schema_for!(inspa_config::Config);
    let schema_str = serde_json::to_string_pretty(&schema)?;
    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let mut schema_file = File::create(crate_dir.join("schema.json"))?;
    write!(schema_file, "{schema_str}")?;
    Ok(())
}
