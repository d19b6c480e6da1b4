// SPDX-FileCopyrightText: 2023-2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::io::{Read, Write};

use assert_matches::assert_matches;
use bringup::format::compression::{CompressedFormat, CompressedReader, Error, LZ4_LEGACY_MAGIC};
use flate2::{Compression, write::GzEncoder};
use liblzma::write::XzEncoder;

fn decompress(data: &[u8]) -> (CompressedFormat, Vec<u8>) {
    let mut reader = CompressedReader::new(data).unwrap();
    let format = reader.format();

    let mut result = vec![];
    reader.read_to_end(&mut result).unwrap();

    (format, result)
}

fn lz4_legacy_block(data: &[u8]) -> Vec<u8> {
    let block = lz4_flex::block::compress(data);

    let mut result = (block.len() as u32).to_le_bytes().to_vec();
    result.extend_from_slice(&block);
    result
}

#[test]
fn gzip() {
    let mut encoder = GzEncoder::new(vec![], Compression::default());
    encoder.write_all(b"gzip-compressed data").unwrap();
    let data = encoder.finish().unwrap();

    assert_eq!(
        decompress(&data),
        (CompressedFormat::Gzip, b"gzip-compressed data".to_vec()),
    );
}

#[test]
fn xz() {
    let mut encoder = XzEncoder::new(vec![], 6);
    encoder.write_all(b"xz-compressed data").unwrap();
    let data = encoder.finish().unwrap();

    assert_eq!(
        decompress(&data),
        (CompressedFormat::Xz, b"xz-compressed data".to_vec()),
    );
}

#[test]
fn lz4_frame() {
    let mut encoder = lz4_flex::frame::FrameEncoder::new(vec![]);
    encoder.write_all(b"lz4-compressed data").unwrap();
    let data = encoder.finish().unwrap();

    assert_eq!(
        decompress(&data),
        (CompressedFormat::Lz4Frame, b"lz4-compressed data".to_vec()),
    );
}

#[test]
fn lz4_legacy_with_trailing_size() {
    let first = b"first block ".repeat(100);
    let second = b"second block".repeat(100);

    let mut data = LZ4_LEGACY_MAGIC.to_vec();
    data.extend_from_slice(&lz4_legacy_block(&first));
    data.extend_from_slice(&lz4_legacy_block(&second));
    // Concatenated stream.
    data.extend_from_slice(LZ4_LEGACY_MAGIC);
    data.extend_from_slice(&lz4_legacy_block(b"third"));
    // The kernel build appends the uncompressed size, which is larger than any
    // valid block.
    data.extend_from_slice(&0x7fff_ffffu32.to_le_bytes());

    let (format, result) = decompress(&data);
    assert_eq!(format, CompressedFormat::Lz4Legacy);

    let mut expected = first;
    expected.extend_from_slice(&second);
    expected.extend_from_slice(b"third");
    assert_eq!(result, expected);
}

#[test]
fn unknown_format() {
    assert_eq!(CompressedFormat::detect(b"\0\0\0\0"), None);
    assert_matches!(
        CompressedReader::new(b"plain data".as_slice()).err(),
        Some(Error::UnknownFormat)
    );
    assert_matches!(
        CompressedReader::with_format(b"\0\0\0\0".as_slice(), CompressedFormat::Lz4Legacy).err(),
        Some(Error::InvalidLz4LegacyMagic([0, 0, 0, 0]))
    );
}
