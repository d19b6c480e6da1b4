// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::fs;

use bringup::report::{self, Aggregator, Status, Summary, SummaryEntry};

#[test]
fn classify_paths() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();

    let file = dir.join("file");
    let empty = dir.join("empty");
    let empty_dir = dir.join("empty_dir");
    let full_dir = dir.join("full_dir");
    fs::write(&file, b"data").unwrap();
    fs::write(&empty, b"").unwrap();
    fs::create_dir_all(empty_dir.join("nested")).unwrap();
    fs::create_dir_all(full_dir.join("nested")).unwrap();
    fs::write(full_dir.join("nested").join("file"), b"").unwrap();

    assert_eq!(report::classify(&file), Status::Found);
    assert_eq!(report::classify(&empty), Status::FoundButEmpty);
    assert_eq!(report::classify(&empty_dir), Status::FoundButEmpty);
    assert_eq!(report::classify(&full_dir), Status::Found);
    assert_eq!(report::classify(&dir.join("missing")), Status::Missing);

    #[cfg(unix)]
    {
        let link = dir.join("dangling");
        std::os::unix::fs::symlink(dir.join("missing"), &link).unwrap();
        assert_eq!(report::classify(&link), Status::FoundButEmpty);
    }
}

#[test]
fn summary_groups_results() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();

    let kernel = dir.join("version.txt");
    let ramdisk = dir.join("ramdisk");
    let cpio = dir.join("ramdisk.cpio");
    fs::write(&kernel, b"Linux version 6.1\n").unwrap();
    fs::write(&ramdisk, b"\x1f\x8b").unwrap();
    fs::write(&cpio, b"").unwrap();

    let mut aggregator = Aggregator::new();
    aggregator.record("kernel_version", [kernel.clone()], Some("6.1".to_owned()));
    aggregator.record("ramdisk", [ramdisk.clone(), cpio.clone()], None);
    aggregator.record("empty", [cpio.clone()], Some("zero bytes".to_owned()));
    aggregator.record("vendor_filesystem", [dir.join("vendor")], None);
    aggregator.record_status(
        "bootloader_lock_state",
        Status::Warning("contradictory".to_owned()),
        [],
        None,
    );

    assert_eq!(aggregator.results().len(), 5);
    assert_eq!(
        aggregator.get("ramdisk").unwrap().status,
        Status::Warning(format!("partial result: {cpio:?} is found but empty")),
    );

    // Recording a name again replaces the old result.
    aggregator.record_status("kernel_version", Status::Missing, [], None);
    assert_eq!(aggregator.results().len(), 5);
    assert_eq!(aggregator.results()[0].status, Status::Missing);

    let summary = aggregator.summarize();

    assert!(summary.found.is_empty());
    assert_eq!(
        summary.missing,
        [
            SummaryEntry {
                name: "kernel_version".to_owned(),
                detail: None,
                paths: vec![],
            },
            SummaryEntry {
                name: "vendor_filesystem".to_owned(),
                detail: None,
                paths: vec![dir.join("vendor")],
            },
        ],
    );
    assert_eq!(
        summary
            .warnings
            .iter()
            .map(|e| (e.name.as_str(), e.detail.as_deref()))
            .collect::<Vec<_>>(),
        [
            ("ramdisk", Some(format!("partial result: {cpio:?} is found but empty").as_str())),
            ("empty", Some("found but empty: zero bytes")),
            ("bootloader_lock_state", Some("contradictory")),
        ],
    );

    let text = summary.to_string();
    assert!(text.starts_with("Found (0):\n\nMissing (2):\n- kernel_version\n"));
    assert!(text.contains("Warnings (3):\n- ramdisk: partial result: "));
}

#[test]
fn summary_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join(report::SUMMARY_FILE_NAME);

    let summary = Summary {
        found: vec![SummaryEntry {
            name: "device_tree_overlay".to_owned(),
            detail: Some("2 entries".to_owned()),
            paths: vec!["extracted/device_tree_overlay/dtbo_000.dtb".into()],
        }],
        missing: vec![SummaryEntry {
            name: "kernel_config".to_owned(),
            detail: None,
            paths: vec![],
        }],
        warnings: vec![],
    };

    summary.write(&path).unwrap();
    // Rewriting replaces the file.
    summary.write(&path).unwrap();

    let data = fs::read_to_string(&path).unwrap();
    let parsed: Summary = toml_edit::de::from_str(&data).unwrap();
    assert_eq!(parsed, summary);

    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
}
