// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Assembles `stub ‖ header ‖ payload ‖ legacy-hash-tail ‖ footer` atomically.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use inspa_config::{CompressionAlgo, Config};
use inspa_utils::PathExt;

use crate::{
    collector::{self, FileManifest},
    compress::Compressor,
    container::{
        footer::Footer,
        header::{Header, HASH_HEX_LEN},
    },
    hash::HashingWriter,
    Error, Result,
};

/// Build result: where the installer landed and a few figures worth
/// reporting back to the caller (CLI `build` prints these).
#[derive(Debug)]
pub struct BuildOutput {
    pub output_path: PathBuf,
    pub payload_size: u64,
    pub payload_sha256: [u8; 32],
    pub file_count: usize,
    pub algo_used: CompressionAlgo,
}

/// Builds an installer at `output_path` from `config`, splicing the payload
/// onto `stub_path`. `base_dir` is where [`InputSpec`](inspa_config::InputSpec)
/// paths are resolved relative to. `timestamp` is injected rather than read
/// from the clock, so builds are reproducible for a pinned value (testable
/// property 4).
pub fn build(
    config: &Config,
    stub_path: &Path,
    base_dir: &Path,
    output_path: &Path,
    timestamp: i64,
) -> Result<BuildOutput> {
    config
        .validate_strict()
        .map_err(|d| Error::ConfigInvalid(vec![d]))?;
    let config = config.clone().normalized();

    if !stub_path.is_file() {
        return Err(Error::StubMissing(stub_path.to_path_buf()));
    }

    let manifest = collector::collect(&config, base_dir)?;

    let temp_path = sibling_temp_path(output_path);
    let result = build_into(&config, stub_path, &manifest, &temp_path, timestamp);
    match result {
        Ok(output) => {
            std::fs::rename(&temp_path, output_path).map_err(Error::BuildIo)?;
            Ok(BuildOutput {
                output_path: output_path.to_path_buf(),
                ..output
            })
        }
        Err(e) => {
            let _ = std::fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

fn build_into(
    config: &Config,
    stub_path: &Path,
    manifest: &FileManifest,
    temp_path: &Path,
    timestamp: i64,
) -> Result<BuildOutput> {
    // The compressor's fallback decision (zstd -> zip) is only known once
    // compression has run, but the header carries `compression.algo` and is
    // written to disk *before* the payload. So the payload is compressed
    // into its own temp file first; only then is the header (with the algo
    // actually used) built and the final container assembled in order.
    let payload_temp_path = temp_path.with_additional_extension("payload");
    let payload_result = write_payload(&payload_temp_path, config, manifest);
    let (payload_size, payload_sha256, algo_used) = match payload_result {
        Ok(r) => r,
        Err(e) => {
            let _ = std::fs::remove_file(&payload_temp_path);
            return Err(e);
        }
    };

    let mut out = inspa_utils::create_file(temp_path).map_err(Error::BuildIo)?;

    let stub_len = std::io::copy(
        &mut File::open(stub_path).map_err(Error::BuildIo)?,
        &mut out,
    )
    .map_err(Error::BuildIo)?;

    let mut header = Header::new(config, manifest, timestamp);
    header.compression.algo = algo_used;
    let header_json = header.to_json_bytes()?;
    let hash_placeholder_offset = Header::locate_hash_placeholder(&header_json)?;

    out.write_all(&(header_json.len() as u64).to_le_bytes())
        .map_err(Error::BuildIo)?;
    out.write_all(&header_json).map_err(Error::BuildIo)?;
    out.flush().map_err(Error::BuildIo)?;

    let mut out = out.into_inner().map_err(|e| Error::BuildIo(e.into_error()))?;
    let payload_offset = stub_len + 8 + header_json.len() as u64;

    let mut payload_file = File::open(&payload_temp_path).map_err(Error::BuildIo)?;
    std::io::copy(&mut payload_file, &mut out).map_err(Error::BuildIo)?;
    drop(payload_file);
    let _ = std::fs::remove_file(&payload_temp_path);

    out.write_all(&payload_sha256).map_err(Error::BuildIo)?; // legacy tail

    let footer = Footer {
        header_offset: stub_len,
        header_len: header_json.len() as u64,
        payload_offset,
        payload_size,
        payload_sha256,
    };
    out.write_all(&footer.to_bytes()).map_err(Error::BuildIo)?;

    patch_hash_placeholder(
        &mut out,
        stub_len + 8 + hash_placeholder_offset as u64,
        &payload_sha256,
    )?;

    out.sync_all().map_err(Error::BuildIo)?;

    Ok(BuildOutput {
        output_path: temp_path.to_path_buf(),
        payload_size,
        payload_sha256,
        file_count: manifest.0.len(),
        algo_used,
    })
}

/// Drives `compressor` through every manifest entry and finalizes it,
/// returning the total payload bytes written and their digest. The
/// compressor (and the borrow of the scratch file it holds) never leaves
/// this function.
fn finish_stream(
    mut compressor: Compressor<HashingWriter<&mut std::io::BufWriter<File>>>,
    manifest: &FileManifest,
) -> Result<(u64, [u8; 32])> {
    for entry in &manifest.0 {
        let mut file = File::open(&entry.source_path).map_err(Error::CollectorIo)?;
        let mut limited = (&mut file).take(entry.size);
        let mut buf = Vec::new();
        limited.read_to_end(&mut buf).map_err(Error::BuildIo)?;
        if buf.len() as u64 != entry.size {
            return Err(Error::BuildIo(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "short read for {}: expected {} bytes, got {}",
                    entry.logical_path,
                    entry.size,
                    buf.len()
                ),
            )));
        }
        compressor.write_entry(&entry.logical_path, std::io::Cursor::new(buf))?;
    }

    let sink = compressor.finish()?;
    let (_, digest, bytes_written) = sink.finish();
    Ok((bytes_written, digest))
}

/// Streams every manifest entry through the compressor into `out`, retrying
/// once with `zip` if zstd initialization fails and the configuration
/// allows it. Returns `(payload_size, payload_sha256, algo_actually_used)`.
fn run_payload_stream(
    out: &mut std::io::BufWriter<File>,
    config: &Config,
    manifest: &FileManifest,
) -> Result<(u64, [u8; 32], CompressionAlgo)> {
    let init_err = match Compressor::new(
        HashingWriter::new(&mut *out),
        config.compression.algo,
        config.compression.level as i32,
    ) {
        Ok(c) => {
            let (bytes_written, digest) = finish_stream(c, manifest)?;
            return Ok((bytes_written, digest, config.compression.algo));
        }
        Err(Error::CompressionInitFailure(e)) if config.compression.fallback_to_zip => e,
        Err(e) => return Err(e),
    };

    tracing::warn!("zstd initialization failed, falling back to zip: {init_err}");
    let compressor = Compressor::new(HashingWriter::new(out), CompressionAlgo::Zip, 0)?;
    let (bytes_written, digest) = finish_stream(compressor, manifest)?;
    Ok((bytes_written, digest, CompressionAlgo::Zip))
}

/// Streams every manifest entry through the compressor into a scratch file
/// at `payload_temp_path`, retrying once with `zip` if zstd initialization
/// fails and the configuration allows it. Returns
/// `(payload_size, payload_sha256, algo_actually_used)`; the caller is
/// responsible for copying the scratch file into the final container and
/// removing it afterwards.
fn write_payload(
    payload_temp_path: &Path,
    config: &Config,
    manifest: &FileManifest,
) -> Result<(u64, [u8; 32], CompressionAlgo)> {
    let mut out = inspa_utils::create_file(payload_temp_path).map_err(Error::BuildIo)?;

    let (bytes_written, digest, algo) = run_payload_stream(&mut out, config, manifest)?;
    out.flush().map_err(Error::BuildIo)?;
    Ok((bytes_written, digest, algo))
}

fn patch_hash_placeholder(out: &mut File, absolute_offset: u64, digest: &[u8; 32]) -> Result<()> {
    let hex = hex::encode(digest);
    debug_assert_eq!(hex.len(), HASH_HEX_LEN);
    out.seek(SeekFrom::Start(absolute_offset))
        .map_err(Error::BuildIo)?;
    out.write_all(hex.as_bytes()).map_err(Error::BuildIo)?;
    out.seek(SeekFrom::End(0)).map_err(Error::BuildIo)?;
    Ok(())
}

fn sibling_temp_path(output_path: &Path) -> PathBuf {
    output_path.with_additional_extension("tmp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::reader::Container;
    use inspa_config::ConfigBuilder;
    use std::fs;

    fn make_stub(dir: &Path) -> PathBuf {
        let stub = dir.join("stub.exe");
        fs::write(&stub, b"MZ-fake-stub-bytes").unwrap();
        stub
    }

    #[test]
    fn builds_a_readable_container() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), b"hello\n").unwrap();
        let stub = make_stub(dir.path());

        let config = ConfigBuilder::new()
            .product("Demo", "1.0.0")
            .default_path("C:/Demo")
            .input(inspa_config::InputSpec {
                path: ".".into(),
                recursive: false,
                preserve_structure: false,
            })
            .build();

        let out_path = dir.path().join("sub").join("installer.exe");
        let output = build(&config, &stub, dir.path(), &out_path, 1_700_000_000).unwrap();
        assert_eq!(output.file_count, 2); // readme.txt + stub.exe sit in the same dir
        assert!(output.payload_size > 0);

        let container = Container::open_path(&out_path).unwrap();
        assert_eq!(container.footer().payload_sha256, output.payload_sha256);
        assert_eq!(
            container.header().hash.archive,
            hex::encode(output.payload_sha256)
        );
    }

    #[test]
    fn fails_fast_on_missing_stub() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigBuilder::new()
            .product("Demo", "1.0.0")
            .default_path("C:/Demo")
            .build();
        let result = build(
            &config,
            &dir.path().join("missing.exe"),
            dir.path(),
            &dir.path().join("out.exe"),
            0,
        );
        assert!(matches!(result, Err(Error::StubMissing(_))));
    }
}
