// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Summary of the fixed-size `vbmeta` header. Descriptors and signatures are
//! not parsed.

use std::{
    fmt,
    io::{self, Read},
    str::{self, Utf8Error},
};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zerocopy::{FromBytes, byteorder::big_endian};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{format::padding, stream::FromReader};

pub const HEADER_MAGIC: [u8; 4] = *b"AVB0";
pub const RELEASE_STRING_SIZE: usize = 48;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid header magic: {0:?}")]
    InvalidHeaderMagic([u8; 4]),
    #[error("Release string is not UTF-8 encoded")]
    ReleaseStringNotUtf8(#[source] Utf8Error),
    #[error("Failed to read vbmeta header")]
    DataRead(#[source] io::Error),
}

type Result<T> = std::result::Result<T, Error>;

/// Raw on-disk layout of the 256-byte header. All fields are big-endian.
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C, packed)]
struct RawHeader {
    magic: [u8; 4],
    required_libavb_version_major: big_endian::U32,
    required_libavb_version_minor: big_endian::U32,
    authentication_data_block_size: big_endian::U64,
    auxiliary_data_block_size: big_endian::U64,
    algorithm_type: big_endian::U32,
    hash_offset: big_endian::U64,
    hash_size: big_endian::U64,
    signature_offset: big_endian::U64,
    signature_size: big_endian::U64,
    public_key_offset: big_endian::U64,
    public_key_size: big_endian::U64,
    public_key_metadata_offset: big_endian::U64,
    public_key_metadata_size: big_endian::U64,
    descriptors_offset: big_endian::U64,
    descriptors_size: big_endian::U64,
    rollback_index: big_endian::U64,
    flags: big_endian::U32,
    rollback_index_location: big_endian::U32,
    release_string: [u8; RELEASE_STRING_SIZE],
    reserved: [u8; 80],
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
    pub struct VbmetaFlags: u32 {
        const HASHTREE_DISABLED = 1 << 0;
        const VERIFICATION_DISABLED = 1 << 1;

        const _ = !0;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct VbmetaSummary {
    pub required_libavb_version_major: u32,
    pub required_libavb_version_minor: u32,
    pub authentication_data_block_size: u64,
    pub auxiliary_data_block_size: u64,
    pub algorithm_type: u32,
    pub rollback_index: u64,
    pub rollback_index_location: u32,
    pub flags: VbmetaFlags,
    pub release_string: String,
}

impl VbmetaSummary {
    /// Name of the signing algorithm as used by avbtool.
    pub fn algorithm_name(&self) -> &'static str {
        match self.algorithm_type {
            0 => "NONE",
            1 => "SHA256_RSA2048",
            2 => "SHA256_RSA4096",
            3 => "SHA256_RSA8192",
            4 => "SHA512_RSA2048",
            5 => "SHA512_RSA4096",
            6 => "SHA512_RSA8192",
            _ => "UNKNOWN",
        }
    }

    /// Describe flags that weaken verified boot, if any are set.
    pub fn weakened_verification(&self) -> Option<String> {
        let mut reasons = vec![];

        if self.flags.contains(VbmetaFlags::VERIFICATION_DISABLED) {
            reasons.push("verification disabled");
        }
        if self.flags.contains(VbmetaFlags::HASHTREE_DISABLED) {
            reasons.push("hashtree disabled");
        }

        if reasons.is_empty() {
            None
        } else {
            Some(reasons.join(", "))
        }
    }
}

impl fmt::Display for VbmetaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "vbmeta header:")?;
        writeln!(
            f,
            "- Required libavb:  {}.{}",
            self.required_libavb_version_major, self.required_libavb_version_minor,
        )?;
        writeln!(f, "- Algorithm:        {}", self.algorithm_name())?;
        writeln!(f, "- Rollback index:   {}", self.rollback_index)?;
        writeln!(f, "- Rollback slot:    {}", self.rollback_index_location)?;
        writeln!(f, "- Flags:            {:#x}", self.flags.bits())?;
        write!(f, "- Release string:   {:?}", self.release_string)
    }
}

impl<R: Read> FromReader<R> for VbmetaSummary {
    type Error = Error;

    fn from_reader(mut reader: R) -> Result<Self> {
        let raw = RawHeader::read_from_io(&mut reader).map_err(Error::DataRead)?;

        if raw.magic != HEADER_MAGIC {
            return Err(Error::InvalidHeaderMagic(raw.magic));
        }

        let release_string = str::from_utf8(padding::trim_end_padding(&raw.release_string))
            .map_err(Error::ReleaseStringNotUtf8)?;

        Ok(Self {
            required_libavb_version_major: raw.required_libavb_version_major.get(),
            required_libavb_version_minor: raw.required_libavb_version_minor.get(),
            authentication_data_block_size: raw.authentication_data_block_size.get(),
            auxiliary_data_block_size: raw.auxiliary_data_block_size.get(),
            algorithm_type: raw.algorithm_type.get(),
            rollback_index: raw.rollback_index.get(),
            rollback_index_location: raw.rollback_index_location.get(),
            flags: VbmetaFlags::from_bits_retain(raw.flags.get()),
            release_string: release_string.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::mem;

    use super::*;

    #[test]
    fn header_is_256_bytes() {
        assert_eq!(mem::size_of::<RawHeader>(), 256);
    }

    #[test]
    fn parse_disabled_verification() {
        let mut data = [0u8; 256];
        data[..4].copy_from_slice(b"AVB0");
        data[7] = 1;
        data[28..32].copy_from_slice(&2u32.to_be_bytes());
        data[112..120].copy_from_slice(&5u64.to_be_bytes());
        data[120..124].copy_from_slice(&3u32.to_be_bytes());
        data[128..139].copy_from_slice(b"avbtool 1.3");

        let summary = VbmetaSummary::from_reader(&data[..]).unwrap();
        assert_eq!(summary.required_libavb_version_major, 1);
        assert_eq!(summary.algorithm_name(), "SHA256_RSA4096");
        assert_eq!(summary.rollback_index, 5);
        assert_eq!(summary.release_string, "avbtool 1.3");
        assert_eq!(
            summary.weakened_verification().as_deref(),
            Some("verification disabled, hashtree disabled"),
        );
    }

    #[test]
    fn reject_bad_magic() {
        let data = [0u8; 256];
        let err = VbmetaSummary::from_reader(&data[..]).unwrap_err();
        assert!(matches!(err, Error::InvalidHeaderMagic(_)));
    }
}
