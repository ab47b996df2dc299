// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The on-disk installer container format: header/footer codecs and the
//! writer/reader halves that assemble and consume it.

pub mod footer;
pub mod header;
pub mod reader;
pub mod writer;

pub use footer::Footer;
pub use header::Header;
pub use reader::Container;
pub use writer::{build, BuildOutput};
