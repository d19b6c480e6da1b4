// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    cell::Cell,
    fs,
    path::Path,
    sync::atomic::AtomicBool,
};

use assert_matches::assert_matches;
use bringup::{
    artifact::{ArtifactHandle, ArtifactKind, DetectedFormat},
    convert::{self, Error, NativeSparseDecoder, SparseDecoder},
    format::sparse,
};

/// Writes a fixed raw image and counts invocations.
#[derive(Default)]
struct CountingDecoder {
    calls: Cell<usize>,
    output: Vec<u8>,
}

impl SparseDecoder for CountingDecoder {
    fn sparse_to_raw(
        &self,
        _input: &Path,
        output: &Path,
        _cancel_signal: &AtomicBool,
    ) -> Result<(), Error> {
        self.calls.set(self.calls.get() + 1);
        fs::write(output, &self.output).unwrap();
        Ok(())
    }
}

/// Minimal sparse image: one 4 byte block of raw data followed by a one block
/// hole.
fn sparse_image() -> Vec<u8> {
    let mut data = vec![];
    data.extend_from_slice(&sparse::HEADER_MAGIC.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&28u16.to_le_bytes());
    data.extend_from_slice(&12u16.to_le_bytes());
    data.extend_from_slice(&4u32.to_le_bytes());
    data.extend_from_slice(&2u32.to_le_bytes());
    data.extend_from_slice(&2u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());

    data.extend_from_slice(&0xcac1u16.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&16u32.to_le_bytes());
    data.extend_from_slice(b"\x53\xef\x01\x02");

    data.extend_from_slice(&0xcac3u16.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&12u32.to_le_bytes());

    data
}

fn sparse_handle(dir: &Path) -> ArtifactHandle {
    let path = dir.join("vendor.img");
    fs::write(&path, sparse_image()).unwrap();

    let handle = ArtifactHandle::from_path(ArtifactKind::VendorFilesystem, &path).unwrap();
    assert_eq!(handle.detected_format, DetectedFormat::SparseImage);

    handle
}

#[test]
fn conversion_is_cached() {
    let temp_dir = tempfile::tempdir().unwrap();
    let handle = sparse_handle(temp_dir.path());
    let cache = temp_dir.path().join("staging").join("vendor_filesystem.raw");
    let cancel_signal = AtomicBool::new(false);

    let decoder = CountingDecoder {
        output: b"raw filesystem".to_vec(),
        ..Default::default()
    };

    let raw = convert::ensure_raw(&handle, &cache, &decoder, &cancel_signal).unwrap();
    assert_eq!(decoder.calls.get(), 1);
    assert_eq!(raw.path, cache);
    assert_eq!(raw.kind, ArtifactKind::VendorFilesystem);
    assert_eq!(raw.size, 14);
    assert_eq!(raw.detected_format, DetectedFormat::Raw);

    let again = convert::ensure_raw(&handle, &cache, &decoder, &cancel_signal).unwrap();
    assert_eq!(decoder.calls.get(), 1);
    assert_eq!(again, raw);

    // Only the cache file is left behind.
    let entries = fs::read_dir(cache.parent().unwrap()).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn raw_input_is_passed_through() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("vendor.img");
    fs::write(&path, b"\x53\xef not sparse").unwrap();

    let handle = ArtifactHandle::from_path(ArtifactKind::VendorFilesystem, &path).unwrap();
    let cache = temp_dir.path().join("vendor.raw");
    let decoder = CountingDecoder::default();

    let raw = convert::ensure_raw(&handle, &cache, &decoder, &AtomicBool::new(false)).unwrap();

    assert_eq!(raw, handle);
    assert_eq!(decoder.calls.get(), 0);
    assert!(!cache.exists());
}

#[test]
fn empty_output_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let handle = sparse_handle(temp_dir.path());
    let cache = temp_dir.path().join("vendor.raw");
    let decoder = CountingDecoder::default();

    assert_matches!(
        convert::ensure_raw(&handle, &cache, &decoder, &AtomicBool::new(false)),
        Err(Error::EmptyOutput(_))
    );
    assert!(!cache.exists());

    // An empty file left by an earlier failure is not treated as a cache hit.
    fs::write(&cache, b"").unwrap();
    let decoder = CountingDecoder {
        output: b"data".to_vec(),
        ..Default::default()
    };
    convert::ensure_raw(&handle, &cache, &decoder, &AtomicBool::new(false)).unwrap();
    assert_eq!(decoder.calls.get(), 1);
}

#[test]
fn native_decoder() {
    let temp_dir = tempfile::tempdir().unwrap();
    let handle = sparse_handle(temp_dir.path());
    let cache = temp_dir.path().join("vendor.raw");

    let raw =
        convert::ensure_raw(&handle, &cache, &NativeSparseDecoder, &AtomicBool::new(false))
            .unwrap();

    assert_eq!(raw.size, 8);
    assert_eq!(fs::read(&cache).unwrap(), b"\x53\xef\x01\x02\0\0\0\0");
}
