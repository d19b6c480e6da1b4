// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::io::Write;

use assert_matches::assert_matches;
use bringup::{
    kernel::{self, IKCONFIG_MARKER, IkconfigOutcome, KernelOptions},
    strategy::Outcome,
};
use flate2::{Compression, write::GzEncoder};

const BANNER: &str = "Linux version 6.1.75-android14-11-g1234abcd (build-user@build-host) #1 SMP PREEMPT";

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(vec![], Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn lz4_legacy(data: &[u8]) -> Vec<u8> {
    let block = lz4_flex::block::compress(data);

    let mut result = b"\x02\x21\x4c\x18".to_vec();
    result.extend_from_slice(&(block.len() as u32).to_le_bytes());
    result.extend_from_slice(&block);
    result
}

/// Decompressed kernel payload with the banner in the middle.
fn payload() -> Vec<u8> {
    let mut data = vec![0xeeu8; 4096];
    data.push(0);
    data.extend_from_slice(BANNER.as_bytes());
    data.push(b'\n');
    data.push(0);
    data.extend_from_slice(&[0xeeu8; 4096]);
    data
}

/// A decompressor stub that is not printable and contains no known magic.
fn stub(len: usize) -> Vec<u8> {
    (0..len).map(|i| 0x80 | (i % 0x70) as u8).collect()
}

fn attempt_outcomes(attempts: &[bringup::strategy::Attempt]) -> Vec<(&'static str, bool)> {
    attempts
        .iter()
        .map(|a| (a.strategy, a.outcome == Outcome::Skipped))
        .collect()
}

#[test]
fn version_from_embedded_gzip() {
    let mut image = stub(137);
    image.extend_from_slice(&gzip(&payload()));
    // Trailing data after the compressed stream must not matter.
    image.extend_from_slice(&[0xff; 64]);

    let success = kernel::recover_version(&image, KernelOptions::default()).unwrap();

    assert_eq!(success.strategy, "embedded-gzip");
    assert_eq!(success.value, BANNER);
    assert_eq!(
        attempt_outcomes(&success.attempts),
        [
            ("direct-scan", false),
            ("gzip", true),
            ("lz4", true),
            ("embedded-gzip", false),
        ],
    );
    assert_matches!(success.attempts[0].outcome, Outcome::Failed(_));
    assert_eq!(success.attempts[3].outcome, Outcome::Succeeded);
}

#[test]
fn direct_scan_has_priority() {
    // The raw bytes already contain a banner, so the compressed payload is
    // never inspected.
    let mut image = b"\0Linux version 4.14.0-raw\0".to_vec();
    image.extend_from_slice(&gzip(&payload()));

    let success = kernel::recover_version(&image, KernelOptions::default()).unwrap();

    assert_eq!(success.strategy, "direct-scan");
    assert_eq!(success.value, "Linux version 4.14.0-raw");
    assert_eq!(success.attempts.len(), 1);
}

#[test]
fn version_from_gzip_stream() {
    let image = gzip(&payload());

    let success = kernel::recover_version(&image, KernelOptions::default()).unwrap();

    assert_eq!(success.strategy, "gzip");
    assert_eq!(success.value, BANNER);
}

#[test]
fn version_from_lz4_legacy() {
    let image = lz4_legacy(&payload());

    let success = kernel::recover_version(&image, KernelOptions::default()).unwrap();
    assert_eq!(success.strategy, "lz4");
    assert_eq!(success.value, BANNER);

    // Without the LZ4 capability, nothing else applies.
    let options = KernelOptions {
        lz4: false,
        ..Default::default()
    };
    let exhausted = kernel::recover_version(&image, options).unwrap_err();
    assert!(
        exhausted
            .attempts
            .iter()
            .any(|a| a.strategy == "lz4" && a.outcome == Outcome::Skipped)
    );
}

#[test]
fn version_unavailable() {
    let exhausted = kernel::recover_version(&stub(4096), KernelOptions::default()).unwrap_err();

    assert!(!exhausted.all_skipped());
    assert_matches!(exhausted.attempts[0].outcome, Outcome::Failed(_));
    assert!(exhausted.to_string().starts_with("direct-scan: "));
}

#[test]
fn corrupt_gzip_tail_is_tolerated() {
    let compressed = gzip(&payload());
    // Drop the trailer and the last few deflate bytes.
    let truncated = &compressed[..compressed.len() - 12];

    let success = kernel::recover_version(truncated, KernelOptions::default()).unwrap();
    assert_eq!(success.value, BANNER);
}

#[test]
fn decompressed_output_is_capped() {
    let image = gzip(&payload());
    let options = KernelOptions {
        max_decompressed_size: 1024,
        ..Default::default()
    };

    let data = kernel::decompress_payload(&image, options).unwrap();
    assert_eq!(data.len(), 1024);

    // The banner lies beyond the cap.
    assert!(kernel::recover_version(&image, options).is_err());
}

fn ikconfig_blob(config: &str) -> Vec<u8> {
    let mut data = b"\0\0".to_vec();
    data.extend_from_slice(IKCONFIG_MARKER);
    data.extend_from_slice(&gzip(config.as_bytes()));
    data.extend_from_slice(b"IKCFG_ED");
    data
}

#[test]
fn ikconfig_in_raw_image() {
    let config = "CONFIG_ARM64=y\nCONFIG_IKCONFIG=y\n";
    let mut image = stub(64);
    image.extend_from_slice(&ikconfig_blob(config));

    assert_eq!(
        kernel::recover_ikconfig(&image, KernelOptions::default()).unwrap(),
        IkconfigOutcome::Embedded {
            strategy: "raw",
            config: config.to_owned(),
        },
    );
}

#[test]
fn ikconfig_in_compressed_payload() {
    let config = "CONFIG_ARM64=y\n# CONFIG_MODULES is not set\n";
    let mut payload = payload();
    payload.extend_from_slice(&ikconfig_blob(config));
    let image = gzip(&payload);

    assert_eq!(
        kernel::recover_ikconfig(&image, KernelOptions::default()).unwrap(),
        IkconfigOutcome::Embedded {
            strategy: "decompressed",
            config: config.to_owned(),
        },
    );
}

#[test]
fn ikconfig_not_embedded() {
    let image = gzip(&payload());

    assert_eq!(
        kernel::recover_ikconfig(&image, KernelOptions::default()).unwrap(),
        IkconfigOutcome::NotEmbedded,
    );
}

#[test]
fn ikconfig_marker_without_stream() {
    let mut image = stub(64);
    image.extend_from_slice(IKCONFIG_MARKER);
    image.extend_from_slice(b"garbage");

    let exhausted = kernel::recover_ikconfig(&image, KernelOptions::default()).unwrap_err();
    assert!(!exhausted.all_skipped());
}
