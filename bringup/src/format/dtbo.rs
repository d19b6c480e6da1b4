// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Parser for DTBO (device tree blob overlay) partition images. The table is
//! a fixed header followed by an array of entries, each pointing at one
//! flattened device tree inside the same buffer.

use std::{
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::tool::{self, DtbDecompiler};

pub const DTBO_MAGIC: u32 = 0xd7b7ab1e;

/// Every field read from the header lies before this offset.
const HEADER_MIN_SIZE: usize = 24;
/// Four u32 fields.
const ENTRY_MIN_SIZE: u32 = 16;

static EXPORT_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^dtbo_[0-9]{3,}_id[0-9a-f]{8}_rev[0-9a-f]{8}\.(dtb|dts)$")
        .expect("Export name regex is valid")
});

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not a DTBO image: magic {0:02x?} does not match in either byte order")]
    BadMagic([u8; 4]),
    #[error("Header is truncated: {0} < {HEADER_MIN_SIZE} bytes")]
    TruncatedHeader(usize),
    #[error("Entry size is too small: {0} < {ENTRY_MIN_SIZE}")]
    EntrySizeTooSmall(u32),
    #[error("Entry table ({offset} + {count} * {size}) exceeds buffer size {len}")]
    EntryTableOutOfBounds {
        offset: u32,
        count: u32,
        size: u32,
        len: usize,
    },
    #[error("Entry #{0} points outside of the buffer")]
    EntryOutOfBounds(u32),
    #[error("Failed to clear stale exports: {0:?}")]
    ClearStale(PathBuf, #[source] io::Error),
    #[error("Failed to write export: {0:?}")]
    DataWrite(PathBuf, #[source] io::Error),
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

impl Endianness {
    fn read_u32(self, buf: &[u8], offset: usize) -> u32 {
        let bytes = [
            buf[offset],
            buf[offset + 1],
            buf[offset + 2],
            buf[offset + 3],
        ];

        match self {
            Self::Big => u32::from_be_bytes(bytes),
            Self::Little => u32::from_le_bytes(bytes),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DtboEntry {
    pub dt_size: u32,
    pub dt_offset: u32,
    pub dt_id: u32,
    pub dt_rev: u32,
}

impl DtboEntry {
    /// Deterministic export name. Reruns overwrite instead of accumulating.
    pub fn file_name(&self, index: usize) -> String {
        format!(
            "dtbo_{index:03}_id{:08x}_rev{:08x}.dtb",
            self.dt_id, self.dt_rev,
        )
    }

    fn range(&self) -> std::ops::Range<usize> {
        self.dt_offset as usize..self.dt_offset as usize + self.dt_size as usize
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DtboTable {
    pub endianness: Endianness,
    pub header_size: u32,
    pub entry_size: u32,
    pub entry_count: u32,
    pub entries_offset: u32,
    pub entries: Vec<DtboEntry>,
}

impl fmt::Display for DtboTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DTBO table:")?;
        writeln!(f, "- Byte order:     {:?}", self.endianness)?;
        writeln!(f, "- Header size:    {}", self.header_size)?;
        writeln!(f, "- Entry size:     {}", self.entry_size)?;
        writeln!(f, "- Entries offset: {}", self.entries_offset)?;
        write!(f, "- Entries:        {}", self.entry_count)?;

        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(f)?;
            write!(
                f,
                "  - [{i:03}] id={:#010x} rev={:#010x} offset={} size={}",
                entry.dt_id, entry.dt_rev, entry.dt_offset, entry.dt_size,
            )?;
        }

        Ok(())
    }
}

/// Parse a DTBO table from the complete image contents. Every entry must lie
/// within `buf` or the whole parse fails.
pub fn parse_dtbo_table(buf: &[u8]) -> Result<DtboTable> {
    // A bad magic takes precedence so that non-DTBO inputs are named as such.
    let endianness = detect_endianness(buf)?;

    if buf.len() < HEADER_MIN_SIZE {
        return Err(Error::TruncatedHeader(buf.len()));
    }

    let header_size = endianness.read_u32(buf, 4);
    let entry_size = endianness.read_u32(buf, 12);
    let entry_count = endianness.read_u32(buf, 16);
    let entries_offset = endianness.read_u32(buf, 20);

    if entry_size < ENTRY_MIN_SIZE {
        return Err(Error::EntrySizeTooSmall(entry_size));
    }

    let table_end = u64::from(entry_count)
        .checked_mul(u64::from(entry_size))
        .and_then(|s| s.checked_add(u64::from(entries_offset)));
    if table_end.is_none_or(|end| end > buf.len() as u64) {
        return Err(Error::EntryTableOutOfBounds {
            offset: entries_offset,
            count: entry_count,
            size: entry_size,
            len: buf.len(),
        });
    }

    let mut entries = Vec::with_capacity(entry_count as usize);

    for index in 0..entry_count {
        // Cannot overflow because the whole table fits in the buffer.
        let base = entries_offset as usize + index as usize * entry_size as usize;

        let entry = DtboEntry {
            dt_size: endianness.read_u32(buf, base),
            dt_offset: endianness.read_u32(buf, base + 4),
            dt_id: endianness.read_u32(buf, base + 8),
            dt_rev: endianness.read_u32(buf, base + 12),
        };

        let end = u64::from(entry.dt_offset) + u64::from(entry.dt_size);
        if end > buf.len() as u64 {
            return Err(Error::EntryOutOfBounds(index));
        }

        entries.push(entry);
    }

    Ok(DtboTable {
        endianness,
        header_size,
        entry_size,
        entry_count,
        entries_offset,
        entries,
    })
}

/// Inputs shorter than the magic are zero padded and can never match.
fn detect_endianness(buf: &[u8]) -> Result<Endianness> {
    let mut magic = [0u8; 4];
    let n = buf.len().min(magic.len());
    magic[..n].copy_from_slice(&buf[..n]);

    match (
        u32::from_be_bytes(magic) == DTBO_MAGIC,
        u32::from_le_bytes(magic) == DTBO_MAGIC,
    ) {
        (true, false) => Ok(Endianness::Big),
        (false, true) => Ok(Endianness::Little),
        _ => Err(Error::BadMagic(magic)),
    }
}

/// Check whether `buf` starts with the DTBO magic in either byte order.
pub fn has_magic(buf: &[u8]) -> bool {
    detect_endianness(buf).is_ok()
}

/// Slice each entry out of `source`. `table` must have been parsed from
/// `source`.
pub fn export_entries<'a>(table: &DtboTable, source: &'a [u8]) -> Vec<(String, &'a [u8])> {
    table
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.file_name(i), &source[entry.range()]))
        .collect()
}

/// Whether `name` looks like something produced by [`write_entries`].
pub fn is_export_name(name: &str) -> bool {
    EXPORT_NAME_REGEX.is_match(name)
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub decompiled: Vec<PathBuf>,
    /// Per-blob decompilation failures. These never abort the export.
    pub decompile_failures: Vec<(PathBuf, tool::Error)>,
}

fn clear_stale(dir: &Path) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| Error::ClearStale(dir.to_owned(), e))?;

    for entry in entries {
        let entry = entry.map_err(|e| Error::ClearStale(dir.to_owned(), e))?;
        let name = entry.file_name();

        if name.to_str().is_some_and(is_export_name) {
            let path = entry.path();
            debug!("Removing stale export: {path:?}");

            fs::remove_file(&path).map_err(|e| Error::ClearStale(path, e))?;
        }
    }

    Ok(())
}

/// Write every entry of `table` into `dir`, replacing the outputs of any
/// previous run. If `decompiler` is set, each blob is also decompiled to a
/// `.dts` file next to it on a best-effort basis.
pub fn write_entries(
    table: &DtboTable,
    source: &[u8],
    dir: &Path,
    decompiler: Option<&dyn DtbDecompiler>,
) -> Result<ExportReport> {
    fs::create_dir_all(dir).map_err(|e| Error::DataWrite(dir.to_owned(), e))?;
    clear_stale(dir)?;

    let mut report = ExportReport::default();

    for (name, data) in export_entries(table, source) {
        let path = dir.join(&name);

        let mut temp =
            NamedTempFile::new_in(dir).map_err(|e| Error::DataWrite(path.clone(), e))?;
        temp.write_all(data)
            .map_err(|e| Error::DataWrite(path.clone(), e))?;
        temp.persist(&path)
            .map_err(|e| Error::DataWrite(path.clone(), e.error))?;

        report.written.push(path);
    }

    if let Some(decompiler) = decompiler {
        for dtb_path in &report.written {
            let dts_path = dtb_path.with_extension("dts");

            match decompiler.dtb_to_dts(dtb_path, &dts_path) {
                Ok(()) => report.decompiled.push(dts_path),
                Err(e) => {
                    warn!("Failed to decompile {dtb_path:?}: {e}");
                    report.decompile_failures.push((dtb_path.clone(), e));
                }
            }
        }
    }

    Ok(report)
}
