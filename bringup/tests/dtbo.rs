// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
};

use assert_matches::assert_matches;
use bringup::{
    format::dtbo::{self, DTBO_MAGIC, DtboEntry, Endianness, Error},
    tool::{self, DtbDecompiler},
};

struct TestEntry {
    offset: u32,
    size: u32,
    id: u32,
    rev: u32,
}

/// Build a 500 byte image with a 28 byte header, entries at offset 32 and
/// each blob filled with a distinct byte.
fn build_image(big_endian: bool, entries: &[TestEntry]) -> Vec<u8> {
    let put = |buf: &mut Vec<u8>, offset: usize, value: u32| {
        let bytes = if big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        buf[offset..offset + 4].copy_from_slice(&bytes);
    };

    let mut buf = vec![0u8; 500];
    put(&mut buf, 0, DTBO_MAGIC);
    put(&mut buf, 4, 28);
    put(&mut buf, 8, 0);
    put(&mut buf, 12, 16);
    put(&mut buf, 16, entries.len() as u32);
    put(&mut buf, 20, 32);

    for (i, entry) in entries.iter().enumerate() {
        let base = 32 + i * 16;
        put(&mut buf, base, entry.size);
        put(&mut buf, base + 4, entry.offset);
        put(&mut buf, base + 8, entry.id);
        put(&mut buf, base + 12, entry.rev);

        let range = entry.offset as usize..(entry.offset + entry.size) as usize;
        buf[range].fill(0xa0 + i as u8);
    }

    buf
}

/// Build an image with `count` entries of `blob_size` bytes each. The blobs
/// directly follow the entry table and the last one ends the buffer.
fn compact_image(big_endian: bool, count: u32, blob_size: u32) -> Vec<u8> {
    let put = |buf: &mut Vec<u8>, value: u32| {
        buf.extend_from_slice(&if big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        });
    };

    let entries_offset = 32;
    let blobs_offset = entries_offset + count * 16;

    let mut buf = vec![];
    for value in [DTBO_MAGIC, 32, 0, 16, count, entries_offset, 0, 0] {
        put(&mut buf, value);
    }

    for i in 0..count {
        put(&mut buf, blob_size);
        put(&mut buf, blobs_offset + i * blob_size);
        put(&mut buf, i * 3);
        put(&mut buf, i);
    }

    for i in 0..count {
        buf.extend(std::iter::repeat_n(i as u8, blob_size as usize));
    }

    buf
}

fn two_entries() -> [TestEntry; 2] {
    [
        TestEntry {
            offset: 100,
            size: 120,
            id: 0x1234,
            rev: 1,
        },
        TestEntry {
            offset: 300,
            size: 150,
            id: 0xdeadbeef,
            rev: 0x10,
        },
    ]
}

#[test]
fn split_big_endian_table() {
    let data = build_image(true, &two_entries());
    let table = dtbo::parse_dtbo_table(&data).unwrap();

    assert_eq!(table.endianness, Endianness::Big);
    assert_eq!(table.header_size, 28);
    assert_eq!(table.entries_offset, 32);
    assert_eq!(
        table.entries,
        [
            DtboEntry {
                dt_size: 120,
                dt_offset: 100,
                dt_id: 0x1234,
                dt_rev: 1,
            },
            DtboEntry {
                dt_size: 150,
                dt_offset: 300,
                dt_id: 0xdeadbeef,
                dt_rev: 0x10,
            },
        ],
    );

    let exported = dtbo::export_entries(&table, &data);
    assert_eq!(exported.len(), 2);

    assert_eq!(exported[0].0, "dtbo_000_id00001234_rev00000001.dtb");
    assert_eq!(exported[0].1, &data[100..220]);
    assert_eq!(exported[1].0, "dtbo_001_iddeadbeef_rev00000010.dtb");
    assert_eq!(exported[1].1, &data[300..450]);
}

#[test]
fn little_endian_table() {
    let data = build_image(false, &two_entries());
    let table = dtbo::parse_dtbo_table(&data).unwrap();

    assert_eq!(table.endianness, Endianness::Little);
    assert_eq!(table.entries[1].dt_id, 0xdeadbeef);
}

#[test]
fn rejects_bad_input() {
    let mut data = build_image(true, &two_entries());

    // Entry #1 extends past the end of the buffer.
    data[32 + 16..32 + 20].copy_from_slice(&250u32.to_be_bytes());
    assert_matches!(
        dtbo::parse_dtbo_table(&data),
        Err(Error::EntryOutOfBounds(1))
    );

    // Entry table itself extends past the end of the buffer.
    let mut data = build_image(true, &two_entries());
    data[16..20].copy_from_slice(&1000u32.to_be_bytes());
    assert_matches!(
        dtbo::parse_dtbo_table(&data),
        Err(Error::EntryTableOutOfBounds { count: 1000, .. })
    );

    assert_matches!(
        dtbo::parse_dtbo_table(&[0u8; 64]),
        Err(Error::BadMagic([0, 0, 0, 0]))
    );
    assert_matches!(
        dtbo::parse_dtbo_table(&DTBO_MAGIC.to_be_bytes()),
        Err(Error::TruncatedHeader(4))
    );

    // Too short to hold the magic.
    assert_matches!(
        dtbo::parse_dtbo_table(&[0xd7, 0xb7]),
        Err(Error::BadMagic([0xd7, 0xb7, 0, 0]))
    );
    assert_matches!(dtbo::parse_dtbo_table(&[]), Err(Error::BadMagic([0, 0, 0, 0])));
    assert!(!dtbo::has_magic(&[0xd7]));
}

#[test]
fn entry_counts_round_trip() {
    for (big_endian, count) in [(true, 0), (false, 1), (true, 3), (false, 17), (true, 64)] {
        let data = compact_image(big_endian, count, 8);
        let table = dtbo::parse_dtbo_table(&data).unwrap();

        assert_eq!(table.entries.len(), count as usize);

        let exports = dtbo::export_entries(&table, &data);
        assert_eq!(exports.len(), count as usize);

        for (i, (name, blob)) in exports.iter().enumerate() {
            let i = i as u32;
            assert_eq!(
                *name,
                format!("dtbo_{i:03}_id{:08x}_rev{i:08x}.dtb", i * 3),
            );
            assert_eq!(*blob, [i as u8; 8]);
        }

        if let Some((_, last)) = exports.last() {
            // The final blob ends exactly at the end of the buffer.
            assert_eq!(last.as_ptr_range().end, data.as_ptr_range().end);
        }

        // One byte less and the final entry no longer fits.
        if count > 0 {
            assert_matches!(
                dtbo::parse_dtbo_table(&data[..data.len() - 1]),
                Err(Error::EntryOutOfBounds(i)) if i == count - 1
            );
        }
    }
}

#[test]
fn rerun_with_smaller_large_table() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();

    let data = compact_image(true, 1001, 4);
    let table = dtbo::parse_dtbo_table(&data).unwrap();
    let report = dtbo::write_entries(&table, &data, dir, None).unwrap();

    assert_eq!(report.written.len(), 1001);
    assert_eq!(
        report.written[1000].file_name().unwrap(),
        "dtbo_1000_id00000bb8_rev000003e8.dtb",
    );

    let data = compact_image(true, 1, 4);
    let table = dtbo::parse_dtbo_table(&data).unwrap();
    dtbo::write_entries(&table, &data, dir, None).unwrap();

    assert_eq!(fs::read_dir(dir).unwrap().count(), 1);
}

#[test]
fn empty_table() {
    let data = build_image(true, &[]);
    let table = dtbo::parse_dtbo_table(&data).unwrap();

    assert!(table.entries.is_empty());
    assert!(dtbo::export_entries(&table, &data).is_empty());
}

#[derive(Default)]
struct FailingDecompiler {
    calls: RefCell<Vec<PathBuf>>,
}

impl DtbDecompiler for FailingDecompiler {
    fn dtb_to_dts(&self, dtb: &Path, dts: &Path) -> Result<(), tool::Error> {
        self.calls.borrow_mut().push(dtb.to_owned());

        if self.calls.borrow().len() == 1 {
            Err(tool::Error::Unsupported("bad blob".to_owned()))
        } else {
            fs::write(dts, "/dts-v1/;\n").unwrap();
            Ok(())
        }
    }
}

#[test]
fn export_replaces_previous_run() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();

    let stale = dir.join("dtbo_007_id00000000_rev00000000.dtb");
    let unrelated = dir.join("notes.txt");
    fs::write(&stale, b"stale").unwrap();
    fs::write(&unrelated, b"keep").unwrap();

    let data = build_image(true, &two_entries());
    let table = dtbo::parse_dtbo_table(&data).unwrap();

    let decompiler = FailingDecompiler::default();
    let report = dtbo::write_entries(&table, &data, dir, Some(&decompiler)).unwrap();

    assert_eq!(report.written.len(), 2);
    assert_eq!(decompiler.calls.borrow().len(), 2);
    assert_eq!(report.decompiled.len(), 1);
    assert_eq!(report.decompile_failures.len(), 1);
    assert_eq!(report.decompile_failures[0].0, report.written[0]);

    assert!(!stale.exists());
    assert!(unrelated.exists());

    let report = dtbo::write_entries(&table, &data, dir, None).unwrap();
    assert!(report.decompiled.is_empty());

    let mut names = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    names.sort();

    // The .dts from the first run also matches the export pattern.
    assert_eq!(
        names,
        [
            "dtbo_000_id00001234_rev00000001.dtb",
            "dtbo_001_iddeadbeef_rev00000010.dtb",
            "notes.txt",
        ],
    );
    assert_eq!(fs::read(&report.written[1]).unwrap(), &data[300..450]);
}
