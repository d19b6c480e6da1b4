// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Kernel version and embedded config (IKCONFIG) recovery from kernel images
//! that may be raw, compressed, or compressed with a decompressor stub in
//! front.

use std::{cell::OnceCell, sync::LazyLock};

use memchr::memmem;
use regex::bytes::Regex;
use tracing::debug;

use crate::{
    artifact::DetectedFormat,
    format::compression::{CompressedFormat, CompressedReader, GZIP_MEMBER_SIGNATURE},
    strategy::{self, Exhausted, Strategy, Success},
    stream,
};

/// Matches a `strings`-style line: the banner must start at the beginning of
/// the buffer or right after a non-printable byte.
static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)(?:^|[^\x20-\x7e])(Linux version [0-9]+\.[0-9]+[\x20-\x7e]*)")
        .expect("Version regex is valid")
});

/// Marker in front of the gzip-compressed config in kernels built with
/// `CONFIG_IKCONFIG`.
pub const IKCONFIG_MARKER: &[u8; 8] = b"IKCFG_ST";

/// Default cap on decompressed output.
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: u64 = 256 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelOptions {
    /// Whether LZ4 payloads may be decompressed.
    pub lz4: bool,
    pub max_decompressed_size: u64,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            lz4: true,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
        }
    }
}

/// Find the first Linux version banner in `data`.
pub fn scan_version(data: &[u8]) -> Option<String> {
    let captures = VERSION_REGEX.captures(data)?;
    let banner = captures.get(1)?.as_bytes();

    Some(String::from_utf8_lossy(banner).trim_end().to_owned())
}

/// Decompress `data`, keeping whatever was produced before a decoding error.
/// Kernel payloads are routinely followed by trailing bytes, so a corrupt tail
/// is only an error if nothing at all was decoded.
pub fn decompress_tolerant(
    data: &[u8],
    format: CompressedFormat,
    limit: u64,
) -> Result<Vec<u8>, String> {
    let reader = CompressedReader::with_format(data, format).map_err(|e| e.to_string())?;
    let result = stream::read_to_end_tolerant(reader, limit);

    match result.error {
        Some(e) if result.data.is_empty() => Err(format!("{format:?} decoding failed: {e}")),
        Some(e) => {
            debug!(
                "{format:?} stream ended with an error after {} bytes: {e}",
                result.data.len(),
            );
            Ok(result.data)
        }
        None if result.data.is_empty() => Err(format!("{format:?} stream is empty")),
        None => {
            if result.truncated {
                debug!("{format:?} output capped at {limit} bytes");
            }
            Ok(result.data)
        }
    }
}

fn detected(data: &[u8]) -> DetectedFormat {
    DetectedFormat::detect(data)
}

/// Strategies that turn a kernel image into its decompressed payload, in
/// order of preference.
pub fn payload_strategies<'a>(options: KernelOptions) -> Vec<Strategy<'a, [u8], Vec<u8>>> {
    let limit = options.max_decompressed_size;

    vec![
        Strategy::new(
            "gzip",
            |data: &[u8]| detected(data) == DetectedFormat::GzipStream,
            move |data| decompress_tolerant(data, CompressedFormat::Gzip, limit),
        ),
        Strategy::new(
            "lz4",
            move |data: &[u8]| options.lz4 && detected(data) == DetectedFormat::Lz4Stream,
            move |data| {
                let format = CompressedFormat::detect(data).ok_or("Unknown LZ4 variant")?;
                decompress_tolerant(data, format, limit)
            },
        ),
        Strategy::new(
            "embedded-gzip",
            |data: &[u8]| memmem::find(data, GZIP_MEMBER_SIGNATURE).is_some(),
            move |data| {
                let offset = memmem::find(data, GZIP_MEMBER_SIGNATURE)
                    .ok_or("No gzip member signature")?;
                debug!("Found gzip member signature at offset {offset}");

                decompress_tolerant(&data[offset..], CompressedFormat::Gzip, limit)
            },
        ),
        Strategy::new(
            "xz",
            |data: &[u8]| detected(data) == DetectedFormat::XzStream,
            move |data| decompress_tolerant(data, CompressedFormat::Xz, limit),
        ),
    ]
}

/// Strategies for recovering the kernel version banner: a direct scan of the
/// raw bytes, then a scan of each decompressed payload candidate.
pub fn version_strategies<'a>(options: KernelOptions) -> Vec<Strategy<'a, [u8], String>> {
    let no_banner = || "No Linux version banner".to_owned();

    let mut strategies = vec![Strategy::new(
        "direct-scan",
        |_: &[u8]| true,
        move |data| scan_version(data).ok_or_else(no_banner),
    )];

    strategies.extend(
        payload_strategies(options)
            .into_iter()
            .map(|s| s.and_then(move |payload| scan_version(&payload).ok_or_else(no_banner))),
    );

    strategies
}

/// Recover the kernel version string. An [`Exhausted`] result means the
/// version is unavailable, not that the input is invalid.
pub fn recover_version(data: &[u8], options: KernelOptions) -> Result<Success<String>, Exhausted> {
    strategy::run_strategies(data, &version_strategies(options))
}

/// Decompress the kernel payload using the first applicable strategy.
pub fn decompress_payload(data: &[u8], options: KernelOptions) -> Option<Vec<u8>> {
    strategy::run_strategies(data, &payload_strategies(options))
        .ok()
        .map(|s| s.value)
}

/// Extract the config that follows an [`IKCONFIG_MARKER`].
pub fn extract_ikconfig(data: &[u8], limit: u64) -> Result<String, String> {
    let mut needle = IKCONFIG_MARKER.to_vec();
    needle.extend_from_slice(&GZIP_MEMBER_SIGNATURE[..2]);

    let offset =
        memmem::find(data, &needle).ok_or("IKCONFIG marker is not followed by a gzip stream")?;
    let payload = &data[offset + IKCONFIG_MARKER.len()..];

    let config = decompress_tolerant(payload, CompressedFormat::Gzip, limit)?;

    Ok(String::from_utf8_lossy(&config).into_owned())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IkconfigOutcome {
    Embedded { strategy: &'static str, config: String },
    /// No buffer contains the marker. The kernel was built without
    /// `CONFIG_IKCONFIG`.
    NotEmbedded,
}

/// Recover the embedded kernel config, first from the raw image and then from
/// the decompressed payload. The payload is only decompressed if needed.
pub fn recover_ikconfig(data: &[u8], options: KernelOptions) -> Result<IkconfigOutcome, Exhausted> {
    let limit = options.max_decompressed_size;
    let payload = OnceCell::new();
    let payload = || payload.get_or_init(|| decompress_payload(data, options));

    let has_marker = |buf: &[u8]| memmem::find(buf, IKCONFIG_MARKER).is_some();

    let strategies = [
        Strategy::new("raw", |data: &[u8]| has_marker(data), |data| {
            extract_ikconfig(data, limit)
        }),
        Strategy::new(
            "decompressed",
            |_: &[u8]| payload().as_deref().is_some_and(has_marker),
            |_| {
                let payload = payload().as_deref().ok_or("No decompressed payload")?;
                extract_ikconfig(payload, limit)
            },
        ),
    ];

    match strategy::run_strategies(data, &strategies) {
        Ok(s) => Ok(IkconfigOutcome::Embedded {
            strategy: s.strategy,
            config: s.value,
        }),
        Err(e) if e.all_skipped() => Ok(IkconfigOutcome::NotEmbedded),
        Err(e) => Err(e),
    }
}
