// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Streaming SHA-256 over byte sequences, shared by the builder and the runtime.

use sha2::{Digest, Sha256};
use std::io::Write;

/// A digest accumulator that can also act as a passthrough [`Write`] sink,
/// so a writer can be wrapped in a [`HashingWriter`] and never materialize
/// the hashed bytes separately.
#[derive(Default)]
pub struct Hasher(Sha256);

impl Hasher {
    /// Creates a fresh hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `chunk` into the running digest.
    pub fn update(&mut self, chunk: &[u8]) {
        self.0.update(chunk);
    }

    /// Consumes the hasher, returning the final 32-byte digest.
    pub fn finalize(self) -> [u8; 32] {
        self.0.finalize().into()
    }

    /// Computes the digest of a single byte slice in one shot.
    pub fn digest(data: &[u8]) -> [u8; 32] {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}

/// Wraps an inner writer `W`, updating a [`Hasher`] with every chunk written
/// through it before forwarding the bytes on.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Hasher,
    bytes_written: u64,
}

impl<W: Write> HashingWriter<W> {
    /// Wraps `inner`, starting from a fresh digest.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
            bytes_written: 0,
        }
    }

    /// Total bytes written through this sink so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Consumes the writer, returning the inner sink, the final digest and
    /// the total number of bytes written.
    pub fn finish(self) -> (W, [u8; 32], u64) {
        (self.inner, self.hasher.finalize(), self.bytes_written)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + std::io::Seek> std::io::Seek for HashingWriter<W> {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_known_vector() {
        let digest = Hasher::digest(b"hello\n");
        assert_eq!(
            hex::encode(digest),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be0"
        );
    }

    #[test]
    fn hashing_writer_forwards_bytes() {
        let mut out = Vec::new();
        {
            let mut w = HashingWriter::new(&mut out);
            w.write_all(b"abc").unwrap();
            w.write_all(b"def").unwrap();
            let (_, digest, n) = w.finish();
            assert_eq!(n, 6);
            assert_eq!(digest, Hasher::digest(b"abcdef"));
        }
        assert_eq!(out, b"abcdef");
    }
}
