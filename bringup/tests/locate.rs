// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{fs, path::Path};

use bringup::{
    artifact::{ArtifactKind, DetectedFormat},
    locate::{self, DEFAULT_DEPTH},
};

fn touch(path: &Path, data: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

#[test]
fn pattern_order_wins_over_file_order() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();

    touch(&root.join("Image.gz"), b"\x1f\x8b\x08\0data");
    touch(&root.join("zImage"), b"kernel");

    let handle = locate::locate(ArtifactKind::Kernel, &[root.to_owned()], DEFAULT_DEPTH)
        .unwrap()
        .unwrap();
    assert_eq!(handle.path, root.join("zImage"));
    assert_eq!(handle.size, 6);
    assert_eq!(handle.detected_format, DetectedFormat::Raw);
}

#[test]
fn config_is_not_a_kernel() {
    let temp_dir = tempfile::tempdir().unwrap();
    let inputs = temp_dir.path().join("inputs");
    let boot = temp_dir.path().join("boot");

    touch(&inputs.join("kernel.config"), b"CONFIG_ARM64=y\n");
    touch(&boot.join("kernel"), b"kernel");

    let roots = [inputs.clone(), boot.clone()];

    let handle = locate::locate(ArtifactKind::Kernel, &roots, DEFAULT_DEPTH)
        .unwrap()
        .unwrap();
    assert_eq!(handle.path, boot.join("kernel"));

    let handle = locate::locate(ArtifactKind::KernelConfig, &roots, DEFAULT_DEPTH)
        .unwrap()
        .unwrap();
    assert_eq!(handle.path, inputs.join("kernel.config"));

    assert_eq!(
        locate::locate(ArtifactKind::Kernel, &[inputs], DEFAULT_DEPTH).unwrap(),
        None,
    );
}

#[test]
fn empty_candidates_are_skipped() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();

    touch(&root.join("boot.img"), b"");
    touch(&root.join("boot_a.img"), b"ANDROID!");

    let handle = locate::locate(ArtifactKind::BootHeader, &[root.to_owned()], DEFAULT_DEPTH)
        .unwrap()
        .unwrap();
    assert_eq!(handle.path, root.join("boot_a.img"));
    assert_eq!(handle.detected_format, DetectedFormat::BootImage);
}

#[test]
fn search_depth_is_bounded() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();

    touch(&root.join("a").join("b").join("dtbo.img"), b"\xd7\xb7\xab\x1e");

    let roots = [root.to_owned()];
    assert_eq!(
        locate::locate(ArtifactKind::DeviceTreeOverlay, &roots, DEFAULT_DEPTH).unwrap(),
        None,
    );

    let handle = locate::locate(ArtifactKind::DeviceTreeOverlay, &roots, 2)
        .unwrap()
        .unwrap();
    assert_eq!(handle.detected_format, DetectedFormat::Dtbo);

    // Shallower files are preferred for the same pattern.
    touch(&root.join("a").join("dtbo.img"), b"\x1e\xab\xb7\xd7");
    let handle = locate::locate(ArtifactKind::DeviceTreeOverlay, &roots, 2)
        .unwrap()
        .unwrap();
    assert_eq!(handle.path, root.join("a").join("dtbo.img"));
}

#[test]
fn earlier_roots_are_preferred() {
    let temp_dir = tempfile::tempdir().unwrap();
    let first = temp_dir.path().join("first");
    let second = temp_dir.path().join("second");

    touch(&first.join("vendor_a.img"), b"a");
    touch(&second.join("vendor.img"), b"b");

    // A better pattern in a later root still wins.
    let roots = [first.clone(), second.clone()];
    let handle = locate::locate(ArtifactKind::VendorFilesystem, &roots, DEFAULT_DEPTH)
        .unwrap()
        .unwrap();
    assert_eq!(handle.path, second.join("vendor.img"));

    touch(&first.join("vendor.img"), b"c");
    let handle = locate::locate(ArtifactKind::VendorFilesystem, &roots, DEFAULT_DEPTH)
        .unwrap()
        .unwrap();
    assert_eq!(handle.path, first.join("vendor.img"));
}

#[test]
fn locate_every_kind() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();

    touch(&root.join("dtbo.img"), b"\xd7\xb7\xab\x1e");
    touch(&root.join("dtb"), b"\xd0\x0d\xfe\xed");
    touch(&root.join("vbmeta.img"), b"AVB0");

    let located = locate::locate_all(&[root.to_owned()], DEFAULT_DEPTH).unwrap();

    assert_eq!(
        located.keys().copied().collect::<Vec<_>>(),
        [
            ArtifactKind::DeviceTree,
            ArtifactKind::DeviceTreeOverlay,
            ArtifactKind::VerifiedBootMetadata,
        ],
    );
    assert_eq!(located[&ArtifactKind::DeviceTree].path, root.join("dtb"));

    let missing = tempfile::tempdir().unwrap();
    let none = locate::locate_all(&[missing.path().join("nonexistent")], DEFAULT_DEPTH).unwrap();
    assert!(none.is_empty());
}
