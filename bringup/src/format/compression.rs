// SPDX-FileCopyrightText: 2023-2025 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::io::{self, Read};

use flate2::read::GzDecoder;
use liblzma::read::XzDecoder;
use lz4_flex::frame::FrameDecoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub static GZIP_MAGIC: &[u8; 2] = b"\x1f\x8b";
/// Gzip magic followed by the deflate compression method. Every gzip member
/// produced by the kernel build starts with this.
pub static GZIP_MEMBER_SIGNATURE: &[u8; 3] = b"\x1f\x8b\x08";
pub static LZ4_FRAME_MAGIC: &[u8; 4] = b"\x04\x22\x4d\x18";
pub static LZ4_LEGACY_MAGIC: &[u8; 4] = b"\x02\x21\x4c\x18";
pub static XZ_MAGIC: &[u8; 6] = b"\xfd\x37\x7a\x58\x5a\x00";

/// Legacy LZ4 streams always use 8 MiB blocks.
const LZ4_LEGACY_BLOCK_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown compression format")]
    UnknownFormat,
    #[error("Invalid legacy LZ4 magic: {0:02x?}")]
    InvalidLz4LegacyMagic([u8; 4]),
    #[error("Failed to read compressed data header")]
    HeaderRead(#[source] io::Error),
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CompressedFormat {
    Gzip,
    Lz4Frame,
    Lz4Legacy,
    Xz,
}

impl CompressedFormat {
    /// Detect the compression format from the first few bytes of a stream.
    pub fn detect(magic: &[u8]) -> Option<Self> {
        if magic.starts_with(GZIP_MAGIC) {
            Some(Self::Gzip)
        } else if magic.starts_with(LZ4_FRAME_MAGIC) {
            Some(Self::Lz4Frame)
        } else if magic.starts_with(LZ4_LEGACY_MAGIC) {
            Some(Self::Lz4Legacy)
        } else if magic.starts_with(XZ_MAGIC) {
            Some(Self::Xz)
        } else {
            None
        }
    }
}

/// Read into `buf` until it is full or EOF is reached.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;

    while n < buf.len() {
        match reader.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(r) => n += r,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(n)
}

/// Decoder for the legacy LZ4 format produced by `lz4 -l`, which is what the
/// kernel build uses for `Image.lz4`. The stream is a magic followed by blocks
/// of `<u32 LE compressed size><data>`. Decoding stops cleanly at EOF, at a
/// truncated block header, or at a size field that cannot be a block (the
/// kernel build appends the uncompressed size after the last block).
/// Concatenated streams are supported.
pub struct Lz4LegacyDecoder<R: Read> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    done: bool,
}

impl<R: Read> Lz4LegacyDecoder<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(Error::HeaderRead)?;

        if &magic != LZ4_LEGACY_MAGIC {
            return Err(Error::InvalidLz4LegacyMagic(magic));
        }

        Ok(Self {
            reader,
            buf: vec![],
            pos: 0,
            done: false,
        })
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn next_block(&mut self) -> io::Result<()> {
        let max_compressed = lz4_flex::block::get_maximum_output_size(LZ4_LEGACY_BLOCK_SIZE);

        loop {
            let mut size_buf = [0u8; 4];
            if read_full(&mut self.reader, &mut size_buf)? != size_buf.len() {
                self.done = true;
                return Ok(());
            }

            if &size_buf == LZ4_LEGACY_MAGIC {
                continue;
            }

            let size = u32::from_le_bytes(size_buf) as usize;
            if size == 0 || size > max_compressed {
                self.done = true;
                return Ok(());
            }

            let mut compressed = vec![0u8; size];
            self.reader.read_exact(&mut compressed)?;

            self.buf = lz4_flex::block::decompress(&compressed, LZ4_LEGACY_BLOCK_SIZE)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.pos = 0;

            return Ok(());
        }
    }
}

impl<R: Read> Read for Lz4LegacyDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.buf.len() {
            if self.done {
                return Ok(0);
            }

            self.next_block()?;
        }

        let n = buf.len().min(self.buf.len() - self.pos);
        buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;

        Ok(n)
    }
}

pub enum CompressedReader<R: Read> {
    Gzip(GzDecoder<R>),
    Lz4Frame(FrameDecoder<R>),
    Lz4Legacy(Lz4LegacyDecoder<R>),
    Xz(XzDecoder<R>),
}

impl<R: Read> CompressedReader<R> {
    pub fn with_format(reader: R, format: CompressedFormat) -> Result<Self> {
        match format {
            CompressedFormat::Gzip => Ok(Self::Gzip(GzDecoder::new(reader))),
            CompressedFormat::Lz4Frame => Ok(Self::Lz4Frame(FrameDecoder::new(reader))),
            CompressedFormat::Lz4Legacy => Ok(Self::Lz4Legacy(Lz4LegacyDecoder::new(reader)?)),
            CompressedFormat::Xz => Ok(Self::Xz(XzDecoder::new(reader))),
        }
    }

    pub fn format(&self) -> CompressedFormat {
        match self {
            Self::Gzip(_) => CompressedFormat::Gzip,
            Self::Lz4Frame(_) => CompressedFormat::Lz4Frame,
            Self::Lz4Legacy(_) => CompressedFormat::Lz4Legacy,
            Self::Xz(_) => CompressedFormat::Xz,
        }
    }

    pub fn into_inner(self) -> R {
        match self {
            Self::Gzip(r) => r.into_inner(),
            Self::Lz4Frame(r) => r.into_inner(),
            Self::Lz4Legacy(r) => r.into_inner(),
            Self::Xz(r) => r.into_inner(),
        }
    }
}

impl<'a> CompressedReader<&'a [u8]> {
    /// Autodetect the format of an in-memory buffer.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let format = CompressedFormat::detect(data).ok_or(Error::UnknownFormat)?;
        Self::with_format(data, format)
    }
}

impl<R: Read> Read for CompressedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Gzip(r) => r.read(buf),
            Self::Lz4Frame(r) => r.read(buf),
            Self::Lz4Legacy(r) => r.read(buf),
            Self::Xz(r) => r.read(buf),
        }
    }
}
