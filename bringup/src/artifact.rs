// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fmt,
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::format::{
    bootimage::{BOOT_MAGIC, VENDOR_BOOT_MAGIC},
    compression::CompressedFormat,
    dtbo, sparse, vbmeta,
};

/// Number of leading bytes needed to recognize every supported magic.
const SNIFF_SIZE: usize = 8;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    BootHeader,
    Kernel,
    Ramdisk,
    DeviceTree,
    DeviceTreeOverlay,
    DynamicPartitionContainer,
    VendorFilesystem,
    VerifiedBootMetadata,
    KernelConfig,
}

impl ArtifactKind {
    pub const ALL: [Self; 9] = [
        Self::BootHeader,
        Self::Kernel,
        Self::Ramdisk,
        Self::DeviceTree,
        Self::DeviceTreeOverlay,
        Self::DynamicPartitionContainer,
        Self::VendorFilesystem,
        Self::VerifiedBootMetadata,
        Self::KernelConfig,
    ];

    /// Stable name used for output directories and report entries.
    pub fn name(self) -> &'static str {
        match self {
            Self::BootHeader => "boot_header",
            Self::Kernel => "kernel",
            Self::Ramdisk => "ramdisk",
            Self::DeviceTree => "device_tree",
            Self::DeviceTreeOverlay => "device_tree_overlay",
            Self::DynamicPartitionContainer => "dynamic_partition_container",
            Self::VendorFilesystem => "vendor_filesystem",
            Self::VerifiedBootMetadata => "verified_boot_metadata",
            Self::KernelConfig => "kernel_config",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Container format recognized from a file's leading bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum DetectedFormat {
    /// No wrapper recognized.
    Raw,
    SparseImage,
    GzipStream,
    Lz4Stream,
    XzStream,
    Dtbo,
    BootImage,
    Vbmeta,
    /// Too short or unreadable.
    Unknown,
}

impl DetectedFormat {
    /// Classify a buffer by its leading bytes.
    pub fn detect(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Self::Unknown;
        }

        match CompressedFormat::detect(data) {
            Some(CompressedFormat::Gzip) => return Self::GzipStream,
            Some(CompressedFormat::Lz4Frame | CompressedFormat::Lz4Legacy) => {
                return Self::Lz4Stream;
            }
            Some(CompressedFormat::Xz) => return Self::XzStream,
            None => {}
        }

        if dtbo::has_magic(data) {
            Self::Dtbo
        } else if data.starts_with(&BOOT_MAGIC) || data.starts_with(&VENDOR_BOOT_MAGIC) {
            Self::BootImage
        } else if data.starts_with(&vbmeta::HEADER_MAGIC) {
            Self::Vbmeta
        } else if data.starts_with(&sparse::HEADER_MAGIC.to_le_bytes()) {
            Self::SparseImage
        } else {
            Self::Raw
        }
    }
}

/// Sniff the format of a file on disk. Unreadable files are [`DetectedFormat::Unknown`].
pub fn sniff(path: &Path) -> DetectedFormat {
    let mut buf = Vec::with_capacity(SNIFF_SIZE);

    let result = File::open(path).and_then(|f| f.take(SNIFF_SIZE as u64).read_to_end(&mut buf));

    match result {
        Ok(_) => DetectedFormat::detect(&buf),
        Err(_) => DetectedFormat::Unknown,
    }
}

/// An input file chosen for one artifact kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub size: u64,
    pub detected_format: DetectedFormat,
}

impl ArtifactHandle {
    /// Build a handle for an existing file, sniffing its format.
    pub fn from_path(kind: ArtifactKind, path: &Path) -> io::Result<Self> {
        let size = path.metadata()?.len();

        Ok(Self {
            kind,
            path: path.to_owned(),
            size,
            detected_format: sniff(path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_magics() {
        assert_eq!(DetectedFormat::detect(b"\x1f\x8b\x08\x00"), DetectedFormat::GzipStream);
        assert_eq!(DetectedFormat::detect(b"\x04\x22\x4d\x18"), DetectedFormat::Lz4Stream);
        assert_eq!(DetectedFormat::detect(b"\x02\x21\x4c\x18"), DetectedFormat::Lz4Stream);
        assert_eq!(
            DetectedFormat::detect(b"\xfd\x37\x7a\x58\x5a\x00"),
            DetectedFormat::XzStream,
        );
        assert_eq!(DetectedFormat::detect(b"\xd7\xb7\xab\x1e"), DetectedFormat::Dtbo);
        assert_eq!(DetectedFormat::detect(b"\x1e\xab\xb7\xd7"), DetectedFormat::Dtbo);
        assert_eq!(DetectedFormat::detect(b"ANDROID!"), DetectedFormat::BootImage);
        assert_eq!(DetectedFormat::detect(b"VNDRBOOT"), DetectedFormat::BootImage);
        assert_eq!(DetectedFormat::detect(b"AVB0\0\0\0\x01"), DetectedFormat::Vbmeta);
        assert_eq!(DetectedFormat::detect(b"\x3a\xff\x26\xed"), DetectedFormat::SparseImage);
        assert_eq!(DetectedFormat::detect(b"\x53\xef\0\0"), DetectedFormat::Raw);
        assert_eq!(DetectedFormat::detect(b"\x1f"), DetectedFormat::Unknown);
    }

    #[test]
    fn stable_names() {
        let names = ArtifactKind::ALL.map(|k| k.name());
        assert_eq!(names[0], "boot_header");
        assert_eq!(names[6], "vendor_filesystem");

        let mut sorted = names.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
    }

    #[test]
    fn sniff_missing_file() {
        assert_eq!(
            sniff(Path::new("/nonexistent/bringup/artifact")),
            DetectedFormat::Unknown,
        );
    }
}
