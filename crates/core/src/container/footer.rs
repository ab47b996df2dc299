// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The fixed 72-byte trailing locator record.
//!
//! `[0..8) magic | [8..16) header_offset | [16..24) header_len |
//!  [24..32) payload_offset | [32..40) payload_size | [40..72) payload_sha256`
//!
//! All multi-byte integers are little-endian. `magic` is the sole version
//! discriminator; the header carries its own `schema_version`.

pub const FOOTER_LEN: usize = 72;
pub const MAGIC: &[u8; 8] = b"INSPAF01";

/// The legacy 8-byte header magic recognized by the scan-path fallback in
/// readers that predate the footer.
pub const LEGACY_HEADER_MAGIC: &[u8; 8] = b"INSPRO1\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub header_offset: u64,
    pub header_len: u64,
    pub payload_offset: u64,
    pub payload_size: u64,
    pub payload_sha256: [u8; 32],
}

impl Footer {
    /// Packs this footer into its 72-byte on-disk representation.
    pub fn to_bytes(&self) -> [u8; FOOTER_LEN] {
        let mut buf = [0u8; FOOTER_LEN];
        buf[0..8].copy_from_slice(MAGIC);
        buf[8..16].copy_from_slice(&self.header_offset.to_le_bytes());
        buf[16..24].copy_from_slice(&self.header_len.to_le_bytes());
        buf[24..32].copy_from_slice(&self.payload_offset.to_le_bytes());
        buf[32..40].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[40..72].copy_from_slice(&self.payload_sha256);
        buf
    }

    /// Parses a 72-byte slice into a [`Footer`], returning `None` if the
    /// magic does not match (callers fall back to the legacy scan path).
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() != FOOTER_LEN || &buf[0..8] != MAGIC {
            return None;
        }
        let mut payload_sha256 = [0u8; 32];
        payload_sha256.copy_from_slice(&buf[40..72]);
        Some(Self {
            header_offset: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            header_len: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            payload_offset: u64::from_le_bytes(buf[24..32].try_into().unwrap()),
            payload_size: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
            payload_sha256,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let footer = Footer {
            header_offset: 1024,
            header_len: 256,
            payload_offset: 1024 + 8 + 256,
            payload_size: 4096,
            payload_sha256: [7u8; 32],
        };
        let bytes = footer.to_bytes();
        assert_eq!(bytes.len(), FOOTER_LEN);
        assert_eq!(Footer::from_bytes(&bytes), Some(footer));
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut bytes = [0u8; FOOTER_LEN];
        bytes[0..8].copy_from_slice(b"NOTITNOT");
        assert_eq!(Footer::from_bytes(&bytes), None);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(Footer::from_bytes(&[0u8; 10]), None);
    }
}
