// SPDX-FileCopyrightText: 2024-2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    io::{Cursor, Read},
    sync::atomic::AtomicBool,
};

use assert_matches::assert_matches;
use bringup::format::sparse::{
    self, Chunk, ChunkData, CrcMode, Error, HEADER_MAGIC, MAJOR_VERSION, SparseReader,
};

const BLOCK_SIZE: u32 = 8;

enum TestChunk<'a> {
    Raw(&'a [u8]),
    Fill(u32, u32),
    DontCare(u32),
    Crc32(u32),
}

fn build(num_blocks: u32, crc32: u32, chunks: &[TestChunk]) -> Vec<u8> {
    let mut data = vec![];
    data.extend_from_slice(&HEADER_MAGIC.to_le_bytes());
    data.extend_from_slice(&MAJOR_VERSION.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&28u16.to_le_bytes());
    data.extend_from_slice(&12u16.to_le_bytes());
    data.extend_from_slice(&BLOCK_SIZE.to_le_bytes());
    data.extend_from_slice(&num_blocks.to_le_bytes());
    data.extend_from_slice(&(chunks.len() as u32).to_le_bytes());
    data.extend_from_slice(&crc32.to_le_bytes());

    for chunk in chunks {
        let (chunk_type, blocks, payload): (u16, u32, Vec<u8>) = match chunk {
            TestChunk::Raw(d) => (0xcac1, d.len() as u32 / BLOCK_SIZE, d.to_vec()),
            TestChunk::Fill(b, v) => (0xcac2, *b, v.to_le_bytes().to_vec()),
            TestChunk::DontCare(b) => (0xcac3, *b, vec![]),
            TestChunk::Crc32(c) => (0xcac4, 0, c.to_le_bytes().to_vec()),
        };

        data.extend_from_slice(&chunk_type.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&blocks.to_le_bytes());
        data.extend_from_slice(&(12 + payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&payload);
    }

    data
}

fn expected_raw() -> Vec<u8> {
    let mut raw = b"abcdefgh".to_vec();
    raw.extend_from_slice(&[0x11, 0x22, 0x33, 0x44].repeat(4));
    raw.extend_from_slice(&[0u8; 16]);
    raw
}

fn test_chunks(checkpoint: u32) -> Vec<TestChunk<'static>> {
    vec![
        TestChunk::Raw(b"abcdefgh"),
        TestChunk::Fill(2, 0x44332211),
        TestChunk::Crc32(checkpoint),
        TestChunk::DontCare(2),
    ]
}

#[test]
fn read_chunks() {
    let raw = expected_raw();
    let checkpoint = crc32fast::hash(&raw[..24]);
    let image = build(5, crc32fast::hash(&raw), &test_chunks(checkpoint));

    let mut reader = SparseReader::new(Cursor::new(&image), CrcMode::Validate).unwrap();
    let header = reader.header();
    assert_eq!(header.block_size, BLOCK_SIZE);
    assert_eq!(header.num_chunks, 4);
    assert_eq!(header.raw_size(), 40);

    assert_eq!(
        reader.next_chunk().unwrap(),
        Some(Chunk {
            start_block: 0,
            num_blocks: 1,
            data: ChunkData::Data,
        }),
    );

    // The payload must be consumed before moving on.
    assert_matches!(reader.next_chunk(), Err(Error::UnreadChunkData(8)));

    let mut buf = vec![];
    (&mut reader).take(8).read_to_end(&mut buf).unwrap();
    assert_eq!(buf, b"abcdefgh");

    assert_eq!(
        reader.next_chunk().unwrap().map(|c| c.data),
        Some(ChunkData::Fill(0x44332211)),
    );
    assert_eq!(
        reader.next_chunk().unwrap().map(|c| c.data),
        Some(ChunkData::Crc32(checkpoint)),
    );
    assert_eq!(
        reader.next_chunk().unwrap(),
        Some(Chunk {
            start_block: 3,
            num_blocks: 2,
            data: ChunkData::Hole,
        }),
    );
    assert_eq!(reader.next_chunk().unwrap(), None);

    reader.finish().unwrap();
}

#[test]
fn unsparse_to_raw() {
    let raw = expected_raw();
    let checkpoint = crc32fast::hash(&raw[..24]);
    let image = build(5, crc32fast::hash(&raw), &test_chunks(checkpoint));

    let cancel_signal = AtomicBool::new(false);
    let mut writer = Cursor::new(Vec::new());
    let header = sparse::unsparse(
        Cursor::new(&image),
        &mut writer,
        CrcMode::Validate,
        &cancel_signal,
    )
    .unwrap();

    // The trailing hole is only seeked over.
    let mut output = writer.into_inner();
    assert_eq!(output.len(), 24);
    output.resize(header.raw_size() as usize, 0);
    assert_eq!(output, raw);
}

#[test]
fn checksum_mismatch() {
    let raw = expected_raw();
    let image = build(5, crc32fast::hash(&raw), &test_chunks(0x12345678));

    let cancel_signal = AtomicBool::new(false);
    assert_matches!(
        sparse::unsparse(
            Cursor::new(&image),
            Cursor::new(Vec::new()),
            CrcMode::Validate,
            &cancel_signal,
        ),
        Err(Error::MismatchedCrc32Checkpoint { expected: 0x12345678, .. })
    );

    sparse::unsparse(
        Cursor::new(&image),
        Cursor::new(Vec::new()),
        CrcMode::Ignore,
        &cancel_signal,
    )
    .unwrap();

    let checkpoint = crc32fast::hash(&raw[..24]);
    let image = build(5, 0xdeadbeef, &test_chunks(checkpoint));
    assert_matches!(
        sparse::unsparse(
            Cursor::new(&image),
            Cursor::new(Vec::new()),
            CrcMode::Validate,
            &cancel_signal,
        ),
        Err(Error::MismatchedCrc32Final { expected: 0xdeadbeef, .. })
    );
}

#[test]
fn invalid_images() {
    let raw = expected_raw();
    let mut image = build(5, 0, &test_chunks(crc32fast::hash(&raw[..24])));

    // Header claims fewer blocks than the chunks cover.
    image[16..20].copy_from_slice(&4u32.to_le_bytes());
    assert_matches!(
        sparse::unsparse(
            Cursor::new(&image),
            Cursor::new(Vec::new()),
            CrcMode::Ignore,
            &AtomicBool::new(false),
        ),
        Err(Error::EndBlockExceedsTotal { index: 3, .. })
    );

    let mut image = build(1, 0, &[TestChunk::Raw(b"abcdefgh")]);
    image[0] = 0;
    assert_matches!(
        SparseReader::new(Cursor::new(&image), CrcMode::Ignore).err(),
        Some(Error::InvalidMagic(_))
    );

    let mut image = build(1, 0, &[TestChunk::Raw(b"abcdefgh")]);
    image[28] = 0xff;
    let mut reader = SparseReader::new(Cursor::new(&image), CrcMode::Ignore).unwrap();
    assert_matches!(
        reader.next_chunk(),
        Err(Error::InvalidChunkType { index: 0, .. })
    );
}

#[test]
fn cancelled() {
    let image = build(1, 0, &[TestChunk::Fill(1, 0)]);
    let cancel_signal = AtomicBool::new(true);

    assert_matches!(
        sparse::unsparse(
            Cursor::new(&image),
            Cursor::new(Vec::new()),
            CrcMode::Ignore,
            &cancel_signal,
        ),
        Err(Error::DataWrite("chunk_fill", _))
    );
}
