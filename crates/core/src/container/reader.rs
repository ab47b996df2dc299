// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Mirrors [`super::writer`]: locates the embedded container within an
//! executable (itself, typically) and exposes its header and payload stream.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use crate::{
    container::{
        footer::{Footer, FOOTER_LEN, LEGACY_HEADER_MAGIC},
        header::Header,
    },
    hash::Hasher,
    Error, Result,
};

/// An opened installer container: a resolved [`Footer`], a parsed [`Header`]
/// and a handle to the backing file.
pub struct Container {
    path: PathBuf,
    file: File,
    footer: Footer,
    header: Header,
}

impl Container {
    /// Opens the container embedded in the currently running executable.
    pub fn open_self() -> Result<Self> {
        let path = inspa_utils::current_exe::current_exe().map_err(Error::BuildIo)?;
        Self::open_path(&path)
    }

    /// Opens the container embedded at `path`.
    pub fn open_path(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(Error::BuildIo)?;
        let file_len = file.metadata().map_err(Error::BuildIo)?.len();

        let footer = locate_footer(&mut file, file_len)?;

        let header_bytes = read_exact_at(
            &mut file,
            footer.header_offset + 8,
            footer.header_len as usize,
        )?;
        let header = Header::from_json_bytes(&header_bytes)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            footer,
            header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    /// Returns a fresh, seekable handle positioned at the start of the
    /// payload region, suitable for wrapping in a [`crate::compress::Decompressor`].
    pub fn payload_reader(&self) -> Result<PayloadReader<File>> {
        let mut file = File::open(&self.path).map_err(Error::BuildIo)?;
        file.seek(SeekFrom::Start(self.footer.payload_offset))
            .map_err(Error::BuildIo)?;
        Ok(PayloadReader {
            inner: file,
            base: self.footer.payload_offset,
            size: self.footer.payload_size,
            position: 0,
        })
    }

    /// Re-streams the payload region through a hasher and compares the
    /// digest against the footer's recorded `payload_sha256`.
    pub fn verify(&self) -> Result<()> {
        let mut reader = self.payload_reader()?;
        let mut hasher = Hasher::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).map_err(Error::BuildIo)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        if hasher.finalize() == self.footer.payload_sha256 {
            Ok(())
        } else {
            Err(Error::IntegrityFailure)
        }
    }
}

/// A bounded reader over exactly the payload byte range of a container.
/// Also seekable, with positions relative to the start of the payload
/// region, so formats that need random access (the `zip` fallback's central
/// directory) can be read without ever materializing the whole payload.
pub struct PayloadReader<R> {
    inner: R,
    base: u64,
    size: u64,
    position: u64,
}

impl<R: Read> Read for PayloadReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.size - self.position;
        if remaining == 0 {
            return Ok(0);
        }
        let cap = buf.len().min(remaining as usize);
        let n = self.inner.read(&mut buf[..cap])?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: Seek> Seek for PayloadReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => n,
            SeekFrom::End(n) => (self.size as i64 + n) as u64,
            SeekFrom::Current(n) => (self.position as i64 + n) as u64,
        };
        self.inner.seek(SeekFrom::Start(self.base + target))?;
        self.position = target;
        Ok(target)
    }
}

fn locate_footer(file: &mut File, file_len: u64) -> Result<Footer> {
    if file_len >= FOOTER_LEN as u64 {
        let tail = read_exact_at(file, file_len - FOOTER_LEN as u64, FOOTER_LEN)?;
        if let Some(footer) = Footer::from_bytes(&tail) {
            return Ok(footer);
        }
    }
    legacy_scan(file, file_len)
}

/// Forward linear scan from file start for the legacy 8-byte header magic,
/// returning on the first match per the decided Open Question resolution.
fn legacy_scan(file: &mut File, file_len: u64) -> Result<Footer> {
    const CHUNK: usize = 64 * 1024;
    file.seek(SeekFrom::Start(0)).map_err(Error::BuildIo)?;

    let mut scanned = Vec::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = file.read(&mut buf).map_err(Error::BuildIo)?;
        if n == 0 {
            break;
        }
        scanned.extend_from_slice(&buf[..n]);
        if scanned.len() > (16 * 1024 * 1024) {
            break; // the stub is never this large; stop scanning
        }
    }

    let magic_pos = scanned
        .windows(LEGACY_HEADER_MAGIC.len())
        .position(|w| w == LEGACY_HEADER_MAGIC)
        .ok_or(Error::FooterNotFound)?;

    let header_offset = magic_pos as u64 + LEGACY_HEADER_MAGIC.len() as u64;
    let header_len_bytes = read_exact_at(file, header_offset, 8)?;
    let header_len = u64::from_le_bytes(header_len_bytes.try_into().unwrap());
    let payload_offset = header_offset + 8 + header_len;

    if file_len < payload_offset + 32 {
        return Err(Error::FooterNotFound);
    }
    let payload_size = file_len - 32 - payload_offset;
    let hash_bytes = read_exact_at(file, file_len - 32, 32)?;
    let mut payload_sha256 = [0u8; 32];
    payload_sha256.copy_from_slice(&hash_bytes);

    Ok(Footer {
        header_offset,
        header_len,
        payload_offset,
        payload_size,
        payload_sha256,
    })
}

fn read_exact_at(file: &mut File, offset: u64, len: usize) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset)).map_err(Error::BuildIo)?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).map_err(Error::BuildIo)?;
    Ok(buf)
}
