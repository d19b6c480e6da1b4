// SPDX-FileCopyrightText: 2023-2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Read-only splitter for Android boot images (v0 through v4) and vendor boot
//! images (v3 and v4).

use std::{
    fmt, fs,
    io::{self, Cursor, Read, Seek},
    mem,
    path::{Path, PathBuf},
    str::{self, Utf8Error},
};

use bstr::ByteSlice;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use zerocopy::{FromBytes, byteorder::little_endian};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
    format::padding,
    stream::{CountingReader, FromReader, ReadFixedSizeExt},
    util::{self, NumBytes, OutOfBoundsError},
};

pub const BOOT_MAGIC: [u8; 8] = *b"ANDROID!";
pub const BOOT_NAME_SIZE: usize = 16;
pub const BOOT_ARGS_SIZE: usize = 512;
pub const BOOT_EXTRA_ARGS_SIZE: usize = 1024;

pub const VENDOR_BOOT_MAGIC: [u8; 8] = *b"VNDRBOOT";
pub const VENDOR_BOOT_ARGS_SIZE: usize = 2048;
pub const VENDOR_BOOT_NAME_SIZE: usize = 16;

pub const VENDOR_RAMDISK_NAME_SIZE: usize = 32;
pub const VENDOR_RAMDISK_TABLE_ENTRY_BOARD_ID_SIZE: usize = 16;

/// Fixed page size of v3+ boot images.
pub const PAGE_SIZE: u32 = 4096;

const HDR_V4_SIGNATURE_SIZE: u32 = 4096;

/// Upper bound for any single component, like the kernel.
const COMPONENT_MAX_SIZE: u32 = 64 * 1024 * 1024;
const BOOTCONFIG_MAX_SIZE: u32 = 1024;

/// Name of the serialized header inside an unpacked directory.
pub const HEADER_FILE_NAME: &str = "header.toml";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown boot image format")]
    UnknownFormat,
    #[error("Unknown magic: {0:?}")]
    UnknownMagic([u8; 8]),
    #[error("Unknown header version: {0}")]
    UnknownHeaderVersion(u32),
    #[error("{0:?} field is not UTF-8 encoded: {data:?}", data = .2.as_bstr())]
    StringNotUtf8(&'static str, #[source] Utf8Error, Vec<u8>),
    #[error("{0:?} field is out of bounds")]
    IntOutOfBounds(&'static str, #[source] OutOfBoundsError),
    #[error("{0:?} overflowed integer bounds during calculations")]
    IntOverflow(&'static str),
    #[error("Page size must not be zero")]
    PageSizeZero,
    #[error("Invalid header size for boot image type: {0}")]
    InvalidHeaderSize(u32),
    #[error("Invalid vendor v4 total ramdisk size: {field_value} != {total_size}")]
    VendorV4InvalidRamdiskSize { field_value: u32, total_size: u32 },
    #[error("Invalid vendor v4 ramdisk table size: {actual} != {expected}")]
    VendorV4InvalidRamdiskTableSize { actual: u32, expected: u32 },
    #[error("Invalid vendor v4 ramdisk entry size: {0}")]
    VendorV4InvalidRamdiskEntrySize(u32),
    #[error("Invalid vendor v4 ramdisk entry [{index}] offset: {field_value} != {expected}")]
    VendorV4InvalidRamdiskEntryOffset {
        index: u32,
        field_value: u32,
        expected: u64,
    },
    #[error("Failed to serialize boot image header")]
    HeaderSerialize(#[source] toml_edit::ser::Error),
    #[error("Failed to read boot image data: {0}")]
    DataRead(&'static str, #[source] io::Error),
    #[error("Failed to write boot image component: {0:?}")]
    DataWrite(PathBuf, #[source] io::Error),
}

type Result<T> = std::result::Result<T, Error>;

fn check_size(value: u32, max: u32, field: &'static str) -> Result<u32> {
    util::check_bounds(value, ..=max).map_err(|e| Error::IntOutOfBounds(field, e))
}

fn padded_str(data: &[u8], field: &'static str) -> Result<String> {
    let trimmed = padding::trim_end_padding(data);

    str::from_utf8(trimmed)
        .map(|s| s.to_owned())
        .map_err(|e| Error::StringNotUtf8(field, e, trimmed.to_vec()))
}

/// Read a page-aligned section and the padding that follows it.
fn read_section(
    mut reader: impl Read + Seek,
    size: u32,
    page_size: u32,
    field: &'static str,
) -> Result<Vec<u8>> {
    let data = reader
        .read_vec_exact(size as usize)
        .map_err(|e| Error::DataRead(field, e))?;
    padding::read_discard(&mut reader, page_size.into()).map_err(|e| Error::DataRead(field, e))?;

    Ok(data)
}

fn check_header_size(reader: &mut impl Seek, header_size: u32, field: &'static str) -> Result<()> {
    let pos = reader
        .stream_position()
        .map_err(|e| Error::DataRead(field, e))?;

    if pos != u64::from(header_size) {
        return Err(Error::InvalidHeaderSize(header_size));
    }

    Ok(())
}

#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(packed)]
struct RawV0 {
    magic: [u8; 8],
    kernel_size: little_endian::U32,
    kernel_addr: little_endian::U32,
    ramdisk_size: little_endian::U32,
    ramdisk_addr: little_endian::U32,
    second_size: little_endian::U32,
    second_addr: little_endian::U32,
    tags_addr: little_endian::U32,
    page_size: little_endian::U32,
    header_version: little_endian::U32,
    os_version: little_endian::U32,
    name: [u8; BOOT_NAME_SIZE],
    cmdline: [u8; BOOT_ARGS_SIZE],
    id: [little_endian::U32; 8],
    extra_cmdline: [u8; BOOT_EXTRA_ARGS_SIZE],
}

#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(packed)]
struct RawV1Extra {
    recovery_dtbo_size: little_endian::U32,
    recovery_dtbo_offset: little_endian::U64,
    header_size: little_endian::U32,
}

#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(packed)]
struct RawV2Extra {
    dtb_size: little_endian::U32,
    dtb_addr: little_endian::U64,
}

#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(packed)]
struct RawV3 {
    magic: [u8; 8],
    kernel_size: little_endian::U32,
    ramdisk_size: little_endian::U32,
    os_version: little_endian::U32,
    header_size: little_endian::U32,
    reserved: [little_endian::U32; 4],
    header_version: little_endian::U32,
    cmdline: [u8; BOOT_ARGS_SIZE + BOOT_EXTRA_ARGS_SIZE],
}

#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(packed)]
struct RawV4Extra {
    signature_size: little_endian::U32,
}

#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(packed)]
struct RawVendorV3 {
    magic: [u8; 8],
    header_version: little_endian::U32,
    page_size: little_endian::U32,
    kernel_addr: little_endian::U32,
    ramdisk_addr: little_endian::U32,
    vendor_ramdisk_size: little_endian::U32,
    cmdline: [u8; VENDOR_BOOT_ARGS_SIZE],
    tags_addr: little_endian::U32,
    name: [u8; VENDOR_BOOT_NAME_SIZE],
    header_size: little_endian::U32,
    dtb_size: little_endian::U32,
    dtb_addr: little_endian::U64,
}

#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(packed)]
struct RawVendorV4Extra {
    vendor_ramdisk_table_size: little_endian::U32,
    vendor_ramdisk_table_entry_num: little_endian::U32,
    vendor_ramdisk_table_entry_size: little_endian::U32,
    bootconfig_size: little_endian::U32,
}

#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(packed)]
struct RawVendorV4RamdiskTableEntry {
    ramdisk_size: little_endian::U32,
    ramdisk_offset: little_endian::U32,
    ramdisk_type: little_endian::U32,
    ramdisk_name: [u8; VENDOR_RAMDISK_NAME_SIZE],
    board_id: [little_endian::U32; VENDOR_RAMDISK_TABLE_ENTRY_BOARD_ID_SIZE],
}

/// Boot image with header version 0, 1, or 2. The recovery DTBO exists for v1+
/// and the DTB for v2.
#[derive(Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct BootImageV0Through2 {
    pub header_version: u32,
    pub kernel_addr: u32,
    pub ramdisk_addr: u32,
    pub second_addr: u32,
    pub tags_addr: u32,
    pub page_size: u32,
    pub os_version: u32,
    pub name: String,
    pub cmdline: String,
    pub id: [u32; 8],
    pub extra_cmdline: String,
    pub recovery_dtbo_offset: Option<u64>,
    pub dtb_addr: Option<u64>,
    #[serde(skip)]
    pub kernel: Vec<u8>,
    #[serde(skip)]
    pub ramdisk: Vec<u8>,
    #[serde(skip)]
    pub second: Vec<u8>,
    #[serde(skip)]
    pub recovery_dtbo: Vec<u8>,
    #[serde(skip)]
    pub dtb: Vec<u8>,
}

impl fmt::Debug for BootImageV0Through2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootImageV0Through2")
            .field("header_version", &self.header_version)
            .field("page_size", &self.page_size)
            .field("name", &self.name)
            .field("cmdline", &self.cmdline)
            .field("kernel", &NumBytes(self.kernel.len()))
            .field("ramdisk", &NumBytes(self.ramdisk.len()))
            .field("second", &NumBytes(self.second.len()))
            .field("recovery_dtbo", &NumBytes(self.recovery_dtbo.len()))
            .field("dtb", &NumBytes(self.dtb.len()))
            .finish_non_exhaustive()
    }
}

impl<R: Read> FromReader<R> for BootImageV0Through2 {
    type Error = Error;

    fn from_reader(reader: R) -> Result<Self> {
        let mut reader = CountingReader::new(reader);

        let raw =
            RawV0::read_from_io(&mut reader).map_err(|e| Error::DataRead("Boot::V0::header", e))?;

        if raw.magic != BOOT_MAGIC {
            return Err(Error::UnknownMagic(raw.magic));
        }

        let header_version = raw.header_version.get();
        if header_version > 2 {
            return Err(Error::UnknownHeaderVersion(header_version));
        }

        let kernel_size = check_size(raw.kernel_size.get(), COMPONENT_MAX_SIZE, "kernel_size")?;
        let ramdisk_size = check_size(raw.ramdisk_size.get(), COMPONENT_MAX_SIZE, "ramdisk_size")?;
        let second_size = check_size(raw.second_size.get(), COMPONENT_MAX_SIZE, "second_size")?;

        let page_size = raw.page_size.get();
        if page_size == 0 {
            return Err(Error::PageSizeZero);
        }

        let mut image = Self {
            header_version,
            kernel_addr: raw.kernel_addr.get(),
            ramdisk_addr: raw.ramdisk_addr.get(),
            second_addr: raw.second_addr.get(),
            tags_addr: raw.tags_addr.get(),
            page_size,
            os_version: raw.os_version.get(),
            name: padded_str(&raw.name, "Boot::V0::name")?,
            cmdline: padded_str(&raw.cmdline, "Boot::V0::cmdline")?,
            id: raw.id.map(|id| id.get()),
            extra_cmdline: padded_str(&raw.extra_cmdline, "Boot::V0::extra_cmdline")?,
            recovery_dtbo_offset: None,
            dtb_addr: None,
            kernel: vec![],
            ramdisk: vec![],
            second: vec![],
            recovery_dtbo: vec![],
            dtb: vec![],
        };

        let mut recovery_dtbo_size = 0;
        let mut dtb_size = 0;

        if header_version >= 1 {
            let raw_v1 = RawV1Extra::read_from_io(&mut reader)
                .map_err(|e| Error::DataRead("Boot::V1::header", e))?;

            recovery_dtbo_size = check_size(
                raw_v1.recovery_dtbo_size.get(),
                COMPONENT_MAX_SIZE,
                "recovery_dtbo_size",
            )?;
            image.recovery_dtbo_offset = Some(raw_v1.recovery_dtbo_offset.get());

            let header_size = raw_v1.header_size.get();

            if header_version == 2 {
                let raw_v2 = RawV2Extra::read_from_io(&mut reader)
                    .map_err(|e| Error::DataRead("Boot::V2::header", e))?;

                dtb_size = check_size(raw_v2.dtb_size.get(), COMPONENT_MAX_SIZE, "dtb_size")?;
                image.dtb_addr = Some(raw_v2.dtb_addr.get());
            }

            check_header_size(&mut reader, header_size, "Boot::V1::header_size")?;
        }

        padding::read_discard(&mut reader, page_size.into())
            .map_err(|e| Error::DataRead("Boot::V0::header_padding", e))?;

        image.kernel = read_section(&mut reader, kernel_size, page_size, "Boot::V0::kernel")?;
        image.ramdisk = read_section(&mut reader, ramdisk_size, page_size, "Boot::V0::ramdisk")?;
        image.second = read_section(&mut reader, second_size, page_size, "Boot::V0::second")?;
        image.recovery_dtbo = read_section(
            &mut reader,
            recovery_dtbo_size,
            page_size,
            "Boot::V1::recovery_dtbo",
        )?;
        image.dtb = read_section(&mut reader, dtb_size, page_size, "Boot::V2::dtb")?;

        Ok(image)
    }
}

/// Boot image with header version 3 or 4. The kernel command line and the DTB
/// moved to the vendor boot image in these versions.
#[derive(Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct BootImageV3Through4 {
    pub header_version: u32,
    pub os_version: u32,
    pub reserved: [u32; 4],
    pub cmdline: String,
    /// Whether a non-empty VTS signature was present (v4 only). The signature
    /// itself is not kept.
    pub has_signature: bool,
    #[serde(skip)]
    pub kernel: Vec<u8>,
    #[serde(skip)]
    pub ramdisk: Vec<u8>,
}

impl fmt::Debug for BootImageV3Through4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootImageV3Through4")
            .field("header_version", &self.header_version)
            .field("os_version", &self.os_version)
            .field("reserved", &self.reserved)
            .field("cmdline", &self.cmdline)
            .field("has_signature", &self.has_signature)
            .field("kernel", &NumBytes(self.kernel.len()))
            .field("ramdisk", &NumBytes(self.ramdisk.len()))
            .finish()
    }
}

impl<R: Read> FromReader<R> for BootImageV3Through4 {
    type Error = Error;

    fn from_reader(reader: R) -> Result<Self> {
        let mut reader = CountingReader::new(reader);

        let raw =
            RawV3::read_from_io(&mut reader).map_err(|e| Error::DataRead("Boot::V3::header", e))?;

        if raw.magic != BOOT_MAGIC {
            return Err(Error::UnknownMagic(raw.magic));
        }

        let header_version = raw.header_version.get();
        if !(3..=4).contains(&header_version) {
            return Err(Error::UnknownHeaderVersion(header_version));
        }

        let kernel_size = check_size(raw.kernel_size.get(), COMPONENT_MAX_SIZE, "kernel_size")?;
        let ramdisk_size = check_size(raw.ramdisk_size.get(), COMPONENT_MAX_SIZE, "ramdisk_size")?;
        let cmdline = padded_str(&raw.cmdline, "Boot::V3::cmdline")?;

        let signature_size = if header_version == 4 {
            let raw_v4 = RawV4Extra::read_from_io(&mut reader)
                .map_err(|e| Error::DataRead("Boot::V4::header", e))?;

            check_size(
                raw_v4.signature_size.get(),
                HDR_V4_SIGNATURE_SIZE,
                "signature_size",
            )?
        } else {
            0
        };

        check_header_size(&mut reader, raw.header_size.get(), "Boot::V3::header_size")?;

        padding::read_discard(&mut reader, PAGE_SIZE.into())
            .map_err(|e| Error::DataRead("Boot::V3::header_padding", e))?;

        let kernel = read_section(&mut reader, kernel_size, PAGE_SIZE, "Boot::V3::kernel")?;
        let ramdisk = read_section(&mut reader, ramdisk_size, PAGE_SIZE, "Boot::V3::ramdisk")?;

        // Some OEMs ship an all-zero signature block.
        let signature = read_section(
            &mut reader,
            signature_size,
            PAGE_SIZE,
            "Boot::V4::signature",
        )?;

        Ok(Self {
            header_version,
            os_version: raw.os_version.get(),
            reserved: raw.reserved.map(|r| r.get()),
            cmdline,
            has_signature: !util::is_zero(&signature),
            kernel,
            ramdisk,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct RamdiskMeta {
    pub ramdisk_type: u32,
    pub ramdisk_name: String,
    pub board_id: [u32; VENDOR_RAMDISK_TABLE_ENTRY_BOARD_ID_SIZE],
}

/// Vendor boot image with header version 3 or 4. v3 images always have a
/// single ramdisk. v4 images have a ramdisk table and a bootconfig section.
#[derive(Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct VendorBootImageV3Through4 {
    pub header_version: u32,
    pub page_size: u32,
    pub kernel_addr: u32,
    pub ramdisk_addr: u32,
    pub cmdline: String,
    pub tags_addr: u32,
    pub name: String,
    pub dtb_addr: u64,
    pub ramdisk_metas: Vec<RamdiskMeta>,
    #[serde(skip)]
    pub dtb: Vec<u8>,
    #[serde(skip)]
    pub ramdisks: Vec<Vec<u8>>,
    #[serde(skip)]
    pub bootconfig: String,
}

impl fmt::Debug for VendorBootImageV3Through4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorBootImageV3Through4")
            .field("header_version", &self.header_version)
            .field("page_size", &self.page_size)
            .field("cmdline", &self.cmdline)
            .field("name", &self.name)
            .field("dtb", &NumBytes(self.dtb.len()))
            .field(
                "ramdisks",
                &self
                    .ramdisks
                    .iter()
                    .map(|r| NumBytes(r.len()))
                    .collect::<Vec<_>>(),
            )
            .field("ramdisk_metas", &self.ramdisk_metas)
            .field("bootconfig", &NumBytes(self.bootconfig.len()))
            .finish_non_exhaustive()
    }
}

impl<R: Read> FromReader<R> for VendorBootImageV3Through4 {
    type Error = Error;

    fn from_reader(reader: R) -> Result<Self> {
        let mut reader = CountingReader::new(reader);

        let raw = RawVendorV3::read_from_io(&mut reader)
            .map_err(|e| Error::DataRead("Vendor::V3::header", e))?;

        if raw.magic != VENDOR_BOOT_MAGIC {
            return Err(Error::UnknownMagic(raw.magic));
        }

        let header_version = raw.header_version.get();
        if !(3..=4).contains(&header_version) {
            return Err(Error::UnknownHeaderVersion(header_version));
        }

        let page_size = raw.page_size.get();
        if page_size == 0 {
            return Err(Error::PageSizeZero);
        }

        let vendor_ramdisk_size = check_size(
            raw.vendor_ramdisk_size.get(),
            COMPONENT_MAX_SIZE,
            "vendor_ramdisk_size",
        )?;
        let dtb_size = check_size(raw.dtb_size.get(), COMPONENT_MAX_SIZE, "dtb_size")?;

        let mut table_entry_num = 0;
        let mut bootconfig_size = 0;

        if header_version == 4 {
            let raw_v4 = RawVendorV4Extra::read_from_io(&mut reader)
                .map_err(|e| Error::DataRead("Vendor::V4::header", e))?;

            let entry_size = raw_v4.vendor_ramdisk_table_entry_size.get();
            if entry_size != mem::size_of::<RawVendorV4RamdiskTableEntry>() as u32 {
                return Err(Error::VendorV4InvalidRamdiskEntrySize(entry_size));
            }

            table_entry_num = raw_v4.vendor_ramdisk_table_entry_num.get();

            let table_size = table_entry_num
                .checked_mul(entry_size)
                .ok_or(Error::IntOverflow("Vendor::V4::table_size"))?;
            if table_size != raw_v4.vendor_ramdisk_table_size.get() {
                return Err(Error::VendorV4InvalidRamdiskTableSize {
                    actual: table_size,
                    expected: raw_v4.vendor_ramdisk_table_size.get(),
                });
            }

            bootconfig_size = check_size(
                raw_v4.bootconfig_size.get(),
                BOOTCONFIG_MAX_SIZE,
                "bootconfig_size",
            )?;
        }

        check_header_size(&mut reader, raw.header_size.get(), "Vendor::V3::header_size")?;

        padding::read_discard(&mut reader, page_size.into())
            .map_err(|e| Error::DataRead("Vendor::V3::header_padding", e))?;

        let ramdisk_data = read_section(
            &mut reader,
            vendor_ramdisk_size,
            page_size,
            "Vendor::V3::ramdisk",
        )?;
        let dtb = read_section(&mut reader, dtb_size, page_size, "Vendor::V3::dtb")?;

        let mut image = Self {
            header_version,
            page_size,
            kernel_addr: raw.kernel_addr.get(),
            ramdisk_addr: raw.ramdisk_addr.get(),
            cmdline: padded_str(&raw.cmdline, "Vendor::V3::cmdline")?,
            tags_addr: raw.tags_addr.get(),
            name: padded_str(&raw.name, "Vendor::V3::name")?,
            dtb_addr: raw.dtb_addr.get(),
            ramdisk_metas: vec![],
            dtb,
            ramdisks: vec![],
            bootconfig: String::new(),
        };

        if header_version == 3 {
            image.ramdisks.push(ramdisk_data);
            return Ok(image);
        }

        // The table appears after the ramdisk section it describes.
        let mut ramdisk_reader = Cursor::new(ramdisk_data);
        let mut total_size = 0u32;

        for index in 0..table_entry_num {
            let entry = RawVendorV4RamdiskTableEntry::read_from_io(&mut reader)
                .map_err(|e| Error::DataRead("Vendor::V4::table_entry", e))?;

            let size = check_size(entry.ramdisk_size.get(), vendor_ramdisk_size, "ramdisk_size")?;
            let expected = ramdisk_reader.position();

            if u64::from(entry.ramdisk_offset.get()) != expected {
                return Err(Error::VendorV4InvalidRamdiskEntryOffset {
                    index,
                    field_value: entry.ramdisk_offset.get(),
                    expected,
                });
            }

            let ramdisk = ramdisk_reader
                .read_vec_exact(size as usize)
                .map_err(|e| Error::DataRead("Vendor::V4::ramdisk", e))?;

            image.ramdisks.push(ramdisk);
            image.ramdisk_metas.push(RamdiskMeta {
                ramdisk_type: entry.ramdisk_type.get(),
                ramdisk_name: padded_str(&entry.ramdisk_name, "Vendor::V4::ramdisk_name")?,
                board_id: entry.board_id.map(|id| id.get()),
            });

            total_size = total_size
                .checked_add(size)
                .ok_or(Error::IntOverflow("Vendor::V4::total_ramdisk_size"))?;
        }

        if total_size != vendor_ramdisk_size {
            return Err(Error::VendorV4InvalidRamdiskSize {
                field_value: vendor_ramdisk_size,
                total_size,
            });
        }

        padding::read_discard(&mut reader, page_size.into())
            .map_err(|e| Error::DataRead("Vendor::V4::table_padding", e))?;

        let bootconfig = read_section(
            &mut reader,
            bootconfig_size,
            page_size,
            "Vendor::V4::bootconfig",
        )?;

        image.bootconfig = String::from_utf8(bootconfig).map_err(|e| {
            Error::StringNotUtf8("Vendor::V4::bootconfig", e.utf8_error(), e.into_bytes())
        })?;

        Ok(image)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum BootImage {
    V0Through2(BootImageV0Through2),
    V3Through4(BootImageV3Through4),
    VendorV3Through4(VendorBootImageV3Through4),
}

impl BootImage {
    pub fn header_version(&self) -> u32 {
        match self {
            Self::V0Through2(b) => b.header_version,
            Self::V3Through4(b) => b.header_version,
            Self::VendorV3Through4(b) => b.header_version,
        }
    }

    /// List the non-empty components under their stable output names. The
    /// names are chosen so that the artifact locator's patterns match them.
    pub fn components(&self) -> Vec<(String, &[u8])> {
        let mut result: Vec<(String, &[u8])> = vec![];

        match self {
            Self::V0Through2(b) => {
                result.push(("kernel".to_owned(), &b.kernel));
                result.push(("ramdisk".to_owned(), &b.ramdisk));
                result.push(("second".to_owned(), &b.second));
                result.push(("recovery_dtbo".to_owned(), &b.recovery_dtbo));
                result.push(("dtb".to_owned(), &b.dtb));
            }
            Self::V3Through4(b) => {
                result.push(("kernel".to_owned(), &b.kernel));
                result.push(("ramdisk".to_owned(), &b.ramdisk));
            }
            Self::VendorV3Through4(b) => {
                if b.ramdisks.len() == 1 {
                    result.push(("vendor_ramdisk".to_owned(), &b.ramdisks[0]));
                } else {
                    for (i, ramdisk) in b.ramdisks.iter().enumerate() {
                        result.push((format!("vendor_ramdisk.{i:02}"), ramdisk));
                    }
                }

                result.push(("dtb".to_owned(), &b.dtb));
                result.push(("bootconfig".to_owned(), b.bootconfig.as_bytes()));
            }
        }

        result.retain(|(_, data)| !data.is_empty());

        result
    }

    /// Write every non-empty component and [`HEADER_FILE_NAME`] into `dir`,
    /// which must already exist. Returns the paths that were written.
    pub fn unpack(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = vec![];

        for (name, data) in self.components() {
            let path = dir.join(&name);
            debug!("Writing {name} ({} bytes)", data.len());

            fs::write(&path, data).map_err(|e| Error::DataWrite(path.clone(), e))?;
            written.push(path);
        }

        let header = toml_edit::ser::to_string_pretty(self).map_err(Error::HeaderSerialize)?;
        let path = dir.join(HEADER_FILE_NAME);

        fs::write(&path, header).map_err(|e| Error::DataWrite(path.clone(), e))?;
        written.push(path);

        Ok(written)
    }
}

impl fmt::Display for BootImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V0Through2(b) => {
                writeln!(f, "Boot image v{} header:", b.header_version)?;
                writeln!(f, "- Page size:            {}", b.page_size)?;
                writeln!(f, "- OS version:           {:#x}", b.os_version)?;
                writeln!(f, "- Name:                 {:?}", b.name)?;
                writeln!(f, "- Kernel cmdline:       {:?}", b.cmdline)?;
                writeln!(f, "- Extra kernel cmdline: {:?}", b.extra_cmdline)?;
            }
            Self::V3Through4(b) => {
                writeln!(f, "Boot image v{} header:", b.header_version)?;
                writeln!(f, "- OS version:           {:#x}", b.os_version)?;
                writeln!(f, "- Kernel cmdline:       {:?}", b.cmdline)?;
                writeln!(f, "- Has VTS signature:    {}", b.has_signature)?;
            }
            Self::VendorV3Through4(b) => {
                writeln!(f, "Vendor boot image v{} header:", b.header_version)?;
                writeln!(f, "- Page size:            {}", b.page_size)?;
                writeln!(f, "- Name:                 {:?}", b.name)?;
                writeln!(f, "- Kernel cmdline:       {:?}", b.cmdline)?;

                for meta in &b.ramdisk_metas {
                    writeln!(
                        f,
                        "- Ramdisk:              {:?} (type {})",
                        meta.ramdisk_name, meta.ramdisk_type,
                    )?;
                }
            }
        }

        let components = self.components();
        write!(f, "- Components:           ")?;

        if components.is_empty() {
            write!(f, "(none)")?;
        } else {
            for (i, (name, data)) in components.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{name} ({})", data.len())?;
            }
        }

        Ok(())
    }
}

impl<R: Read + Seek> FromReader<R> for BootImage {
    type Error = Error;

    fn from_reader(mut reader: R) -> Result<Self> {
        reader
            .rewind()
            .map_err(|e| Error::DataRead("Boot::V0::autodetect", e))?;

        match BootImageV0Through2::from_reader(&mut reader) {
            Ok(b) => return Ok(Self::V0Through2(b)),
            Err(Error::UnknownMagic(_) | Error::UnknownHeaderVersion(_)) => {}
            Err(e) => return Err(e),
        }

        reader
            .rewind()
            .map_err(|e| Error::DataRead("Boot::V3::autodetect", e))?;

        match BootImageV3Through4::from_reader(&mut reader) {
            Ok(b) => return Ok(Self::V3Through4(b)),
            Err(Error::UnknownMagic(_) | Error::UnknownHeaderVersion(_)) => {}
            Err(e) => return Err(e),
        }

        reader
            .rewind()
            .map_err(|e| Error::DataRead("Vendor::V3::autodetect", e))?;

        match VendorBootImageV3Through4::from_reader(&mut reader) {
            Ok(b) => return Ok(Self::VendorV3Through4(b)),
            Err(Error::UnknownMagic(_) | Error::UnknownHeaderVersion(_)) => {}
            Err(e) => return Err(e),
        }

        Err(Error::UnknownFormat)
    }
}
