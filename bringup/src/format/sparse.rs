// SPDX-FileCopyrightText: 2024-2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Streaming reader for Android sparse images. Only decoding to a raw image is
//! supported. Producing sparse images is left to the platform tools.

use std::{
    fmt,
    io::{self, Read, Seek, SeekFrom, Write},
    mem,
    sync::atomic::AtomicBool,
};

use crc32fast::Hasher;
use thiserror::Error;
use zerocopy::{FromBytes, IntoBytes, byteorder::little_endian};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::stream::{self, ReadDiscardExt};

/// Magic value for [`RawHeader::magic`], as stored little-endian on disk.
pub const HEADER_MAGIC: u32 = 0xed26ff3a;

const CHUNK_TYPE_RAW: u16 = 0xcac1;
const CHUNK_TYPE_FILL: u16 = 0xcac2;
const CHUNK_TYPE_DONT_CARE: u16 = 0xcac3;
const CHUNK_TYPE_CRC32: u16 = 0xcac4;

/// Supported major version.
pub const MAJOR_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid magic: {0:#010x}")]
    InvalidMagic(u32),
    #[error("Unsupported major version: {0}")]
    UnsupportedMajorVersion(u16),
    #[error("Invalid file header size: {0} < {size}", size = mem::size_of::<RawHeader>())]
    InvalidFileHeaderSize(u16),
    #[error("Invalid chunk header size: {0} < {size}", size = mem::size_of::<RawChunk>())]
    InvalidChunkHeaderSize(u16),
    #[error("Invalid block size (must be a non-zero multiple of 4): {0}")]
    InvalidBlockSize(u32),
    #[error("Chunk #{index}: Invalid type: {chunk_type:#06x}")]
    InvalidChunkType { index: u32, chunk_type: u16 },
    #[error("Chunk #{index}: Size overflow: {chunk_size} blocks * {block_size}")]
    ChunkSizeOverflow {
        index: u32,
        chunk_size: u32,
        block_size: u32,
    },
    #[error("Chunk #{index}: Ends at block {end_block}, but image has {total_blocks} blocks")]
    EndBlockExceedsTotal {
        index: u32,
        end_block: u64,
        total_blocks: u32,
    },
    #[error("Chunk #{index}: Expected total size {expected_size}, but have {total_size}")]
    InvalidChunkSize {
        index: u32,
        expected_size: u64,
        total_size: u32,
    },
    #[error("Previous chunk still has {0} unread bytes")]
    UnreadChunkData(u32),
    #[error("Expected checkpoint CRC32 {expected:08x}, but have {actual:08x}")]
    MismatchedCrc32Checkpoint { expected: u32, actual: u32 },
    #[error("Expected final CRC32 {expected:08x}, but have {actual:08x}")]
    MismatchedCrc32Final { expected: u32, actual: u32 },
    #[error("Failed to read sparse data: {0}")]
    DataRead(&'static str, #[source] io::Error),
    #[error("Failed to write raw data: {0}")]
    DataWrite(&'static str, #[source] io::Error),
}

type Result<T> = std::result::Result<T, Error>;

/// Raw on-disk layout for the header.
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C, packed)]
struct RawHeader {
    magic: little_endian::U32,
    major_version: little_endian::U16,
    minor_version: little_endian::U16,
    /// Size of this header. May be larger than [`RawHeader`].
    file_hdr_sz: little_endian::U16,
    /// Size of a chunk header. May be larger than [`RawChunk`].
    chunk_hdr_sz: little_endian::U16,
    blk_sz: little_endian::U32,
    total_blks: little_endian::U32,
    total_chunks: little_endian::U32,
    /// CRC32 of the unsparsed data or 0 if absent.
    image_checksum: little_endian::U32,
}

impl RawHeader {
    fn validate(&self) -> Result<()> {
        if self.magic.get() != HEADER_MAGIC {
            return Err(Error::InvalidMagic(self.magic.get()));
        }

        if self.major_version.get() != MAJOR_VERSION {
            return Err(Error::UnsupportedMajorVersion(self.major_version.get()));
        }

        if usize::from(self.file_hdr_sz.get()) < mem::size_of::<Self>() {
            return Err(Error::InvalidFileHeaderSize(self.file_hdr_sz.get()));
        } else if usize::from(self.chunk_hdr_sz.get()) < mem::size_of::<RawChunk>() {
            return Err(Error::InvalidChunkHeaderSize(self.chunk_hdr_sz.get()));
        }

        if self.blk_sz.get() == 0 || self.blk_sz.get() % 4 != 0 {
            return Err(Error::InvalidBlockSize(self.blk_sz.get()));
        }

        Ok(())
    }
}

/// Raw on-disk layout for the chunk header.
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C, packed)]
struct RawChunk {
    chunk_type: little_endian::U16,
    reserved1: little_endian::U16,
    /// Number of unsparsed blocks this chunk represents.
    chunk_sz: little_endian::U32,
    /// Size in bytes of this chunk, including the chunk header.
    total_sz: little_endian::U32,
}

/// Sparse file header.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub major_version: u16,
    pub minor_version: u16,
    pub block_size: u32,
    pub num_blocks: u32,
    pub num_chunks: u32,
    pub crc32: u32,
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("major_version", &self.major_version)
            .field("minor_version", &self.minor_version)
            .field("block_size", &self.block_size)
            .field("num_blocks", &self.num_blocks)
            .field("num_chunks", &self.num_chunks)
            .field("crc32", &format_args!("{:#010x}", self.crc32))
            .finish()
    }
}

impl Header {
    /// Size of the image once unsparsed.
    pub fn raw_size(&self) -> u64 {
        u64::from(self.num_blocks) * u64::from(self.block_size)
    }
}

/// The data represented by a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkData {
    /// Raw data follows the chunk header. It must be read through the
    /// [`SparseReader`]'s [`Read`] implementation.
    Data,
    /// Repeating little-endian fill value.
    Fill(u32),
    /// Unallocated blocks. Decoders emit zeros.
    Hole,
    /// Checkpoint of the CRC32 of all blocks so far.
    Crc32(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub start_block: u32,
    pub num_blocks: u32,
    pub data: ChunkData,
}

/// Whether to validate CRC32 checksums.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrcMode {
    Validate,
    Ignore,
}

/// Feed `size` bytes of a repeating 32-bit pattern to `hasher`.
fn hash_fill(hasher: &mut Hasher, fill_value: little_endian::U32, mut size: u64) {
    let buf = [fill_value; 1024];

    while size > 0 {
        let n = size.min(buf.as_bytes().len() as u64) as usize;
        hasher.update(&buf.as_bytes()[..n]);
        size -= n as u64;
    }
}

/// Streaming reader for sparse files. Chunks are visited with
/// [`Self::next_chunk`]. The payload of [`ChunkData::Data`] chunks is read via
/// [`Read`] and must be fully consumed before advancing.
pub struct SparseReader<R> {
    inner: R,
    header: RawHeader,
    block: u32,
    chunk: u32,
    data_remain: u32,
    hasher: Option<Hasher>,
}

impl<R: Read> SparseReader<R> {
    pub fn new(mut inner: R, crc_mode: CrcMode) -> Result<Self> {
        let header =
            RawHeader::read_from_io(&mut inner).map_err(|e| Error::DataRead("header", e))?;

        header.validate()?;

        let excess = header.file_hdr_sz.get() - mem::size_of::<RawHeader>() as u16;
        inner
            .read_discard_exact(excess.into())
            .map_err(|e| Error::DataRead("header_excess", e))?;

        Ok(Self {
            inner,
            header,
            block: 0,
            chunk: 0,
            data_remain: 0,
            hasher: match crc_mode {
                CrcMode::Validate => Some(Hasher::new()),
                CrcMode::Ignore => None,
            },
        })
    }

    pub fn header(&self) -> Header {
        Header {
            major_version: self.header.major_version.get(),
            minor_version: self.header.minor_version.get(),
            block_size: self.header.blk_sz.get(),
            num_blocks: self.header.total_blks.get(),
            num_chunks: self.header.total_chunks.get(),
            crc32: self.header.image_checksum.get(),
        }
    }

    /// Read the next chunk header or return [`None`] after the last chunk.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        if self.data_remain != 0 {
            return Err(Error::UnreadChunkData(self.data_remain));
        }

        if self.chunk == self.header.total_chunks.get() {
            return Ok(None);
        }

        let index = self.chunk;
        let raw_chunk =
            RawChunk::read_from_io(&mut self.inner).map_err(|e| Error::DataRead("chunk", e))?;

        let chunk_sz = raw_chunk.chunk_sz.get();
        let blk_sz = self.header.blk_sz.get();

        let end_block = u64::from(self.block) + u64::from(chunk_sz);
        if end_block > u64::from(self.header.total_blks.get()) {
            return Err(Error::EndBlockExceedsTotal {
                index,
                end_block,
                total_blocks: self.header.total_blks.get(),
            });
        }

        let payload_size = match raw_chunk.chunk_type.get() {
            CHUNK_TYPE_RAW => chunk_sz
                .checked_mul(blk_sz)
                .ok_or(Error::ChunkSizeOverflow {
                    index,
                    chunk_size: chunk_sz,
                    block_size: blk_sz,
                })?,
            CHUNK_TYPE_FILL | CHUNK_TYPE_CRC32 => 4,
            CHUNK_TYPE_DONT_CARE => 0,
            t => {
                return Err(Error::InvalidChunkType {
                    index,
                    chunk_type: t,
                });
            }
        };

        let chunk_hdr_sz = self.header.chunk_hdr_sz.get();
        let expected_size = u64::from(payload_size) + u64::from(chunk_hdr_sz);
        if expected_size != u64::from(raw_chunk.total_sz.get()) {
            return Err(Error::InvalidChunkSize {
                index,
                expected_size,
                total_size: raw_chunk.total_sz.get(),
            });
        }

        let excess = chunk_hdr_sz - mem::size_of::<RawChunk>() as u16;
        self.inner
            .read_discard_exact(excess.into())
            .map_err(|e| Error::DataRead("chunk_excess", e))?;

        let chunk_bytes = u64::from(chunk_sz) * u64::from(blk_sz);

        let data = match raw_chunk.chunk_type.get() {
            CHUNK_TYPE_RAW => {
                self.data_remain = payload_size;
                ChunkData::Data
            }
            CHUNK_TYPE_FILL => {
                let value = little_endian::U32::read_from_io(&mut self.inner)
                    .map_err(|e| Error::DataRead("chunk_fill_value", e))?;

                if let Some(hasher) = &mut self.hasher {
                    hash_fill(hasher, value, chunk_bytes);
                }

                ChunkData::Fill(value.get())
            }
            CHUNK_TYPE_DONT_CARE => {
                if let Some(hasher) = &mut self.hasher {
                    hash_fill(hasher, 0.into(), chunk_bytes);
                }

                ChunkData::Hole
            }
            _ => {
                let expected = little_endian::U32::read_from_io(&mut self.inner)
                    .map_err(|e| Error::DataRead("chunk_crc32", e))?;

                if let Some(hasher) = &self.hasher {
                    let actual = hasher.clone().finalize();
                    if actual != expected.get() {
                        return Err(Error::MismatchedCrc32Checkpoint {
                            expected: expected.get(),
                            actual,
                        });
                    }
                }

                ChunkData::Crc32(expected.get())
            }
        };

        let chunk = Chunk {
            start_block: self.block,
            num_blocks: chunk_sz,
            data,
        };

        self.chunk += 1;
        // Bounded by total_blks above.
        self.block = end_block as u32;

        Ok(Some(chunk))
    }

    /// Verify the final checksum, if present, and return the underlying reader.
    pub fn finish(self) -> Result<R> {
        if let Some(hasher) = self.hasher {
            let expected = self.header.image_checksum.get();
            if expected != 0 {
                let actual = hasher.finalize();
                if actual != expected {
                    return Err(Error::MismatchedCrc32Final { expected, actual });
                }
            }
        }

        Ok(self.inner)
    }
}

impl<R: Read> Read for SparseReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let to_read = buf.len().min(self.data_remain as usize);
        let n = self.inner.read(&mut buf[..to_read])?;

        if let Some(hasher) = &mut self.hasher {
            hasher.update(&buf[..n]);
        }

        self.data_remain -= n as u32;

        Ok(n)
    }
}

/// Decode a whole sparse image into `writer`. Holes are skipped by seeking, so
/// the caller must extend the output to [`Header::raw_size`] afterwards if the
/// image ends with a hole. The writer must start out empty or zero-filled.
pub fn unsparse(
    reader: impl Read,
    mut writer: impl Write + Seek,
    crc_mode: CrcMode,
    cancel_signal: &AtomicBool,
) -> Result<Header> {
    let mut sparse_reader = SparseReader::new(reader, crc_mode)?;
    let header = sparse_reader.header();

    while let Some(chunk) = sparse_reader.next_chunk()? {
        let size = u64::from(chunk.num_blocks) * u64::from(header.block_size);

        match chunk.data {
            ChunkData::Data => {
                stream::copy_n(&mut sparse_reader, &mut writer, size, cancel_signal)
                    .map_err(|e| Error::DataWrite("chunk_data", e))?;
            }
            ChunkData::Fill(value) => {
                let buf = vec![little_endian::U32::from(value); header.block_size as usize / 4];

                for _ in 0..chunk.num_blocks {
                    stream::check_cancel(cancel_signal)
                        .map_err(|e| Error::DataWrite("chunk_fill", e))?;

                    writer
                        .write_all(buf.as_bytes())
                        .map_err(|e| Error::DataWrite("chunk_fill", e))?;
                }
            }
            ChunkData::Hole => {
                let offset = i64::try_from(size).map_err(|_| {
                    Error::DataWrite(
                        "chunk_hole",
                        io::Error::new(io::ErrorKind::InvalidInput, "Hole too large"),
                    )
                })?;

                writer
                    .seek(SeekFrom::Current(offset))
                    .map_err(|e| Error::DataWrite("chunk_hole", e))?;
            }
            ChunkData::Crc32(_) => {}
        }
    }

    sparse_reader.finish()?;

    Ok(header)
}
