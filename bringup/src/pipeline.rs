// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! The full extraction run. Steps execute in a fixed order because later steps
//! search the outputs of earlier ones. A failing step is recorded as a warning
//! and the remaining steps still run. Only cancellation stops the run.

use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    sync::atomic::Ordering,
};

use anyhow::{Context, Result, anyhow};
use ring::digest::{Context as DigestContext, SHA256};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug_span, info, warn};

use crate::{
    artifact::{ArtifactHandle, ArtifactKind},
    context::{RunContext, Tools},
    convert,
    format::{
        bootimage::BootImage,
        compression::{CompressedFormat, CompressedReader},
        dtbo,
        vbmeta::VbmetaSummary,
    },
    fsextract,
    kernel::{self, IkconfigOutcome},
    locate,
    report::{Status, Summary},
    signals::{self, LockState},
    stream::{self, FromReader, HashingReader},
    util,
};

pub const PRESERVED_FILE_NAME: &str = "preserved.toml";
pub const VERSION_FILE_NAME: &str = "version.txt";
pub const KERNEL_CONFIG_FILE_NAME: &str = "kernel.config";
pub const VBMETA_FILE_NAME: &str = "vbmeta.toml";
pub const RAMDISK_CPIO_FILE_NAME: &str = "ramdisk.cpio";

pub const STEP_PRESERVED: &str = "preserved_images";
pub const STEP_KERNEL_VERSION: &str = "kernel_version";
pub const STEP_BOOTLOADER: &str = "bootloader_lock_state";
pub const STEP_VERIFIED_BOOT: &str = "verified_boot_state";

/// Images copied verbatim before anything else touches them.
const PRESERVED_KINDS: [ArtifactKind; 4] = [
    ArtifactKind::BootHeader,
    ArtifactKind::DeviceTree,
    ArtifactKind::DeviceTreeOverlay,
    ArtifactKind::VerifiedBootMetadata,
];

/// Kinds that an unpacked boot image can provide.
const BOOT_COMPONENT_KINDS: [ArtifactKind; 4] = [
    ArtifactKind::Kernel,
    ArtifactKind::Ramdisk,
    ArtifactKind::DeviceTree,
    ArtifactKind::DeviceTreeOverlay,
];

#[derive(Clone, Debug, Default)]
pub struct Inputs {
    /// Directories searched for firmware images, in order of preference.
    pub search_roots: Vec<PathBuf>,
    /// Text collected from the device, such as `fastboot getvar all` output.
    pub signal_sources: Vec<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PreservedImage {
    pub kind: ArtifactKind,
    pub source: PathBuf,
    pub file: PathBuf,
    pub size: u64,
    #[serde(with = "hex")]
    pub sha256: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PreservedManifest {
    pub images: Vec<PreservedImage>,
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = util::parent_path(path);

    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in: {parent:?}"))?;
    temp.write_all(data)
        .with_context(|| format!("Failed to write: {path:?}"))?;
    temp.persist(path)
        .with_context(|| format!("Failed to persist: {path:?}"))?;

    Ok(())
}

fn read_input(handle: &ArtifactHandle) -> Result<Vec<u8>> {
    fs::read(&handle.path)
        .with_context(|| format!("Failed to read {}: {:?}", handle.kind, handle.path))
}

fn file_name(path: &Path) -> Result<&OsStr> {
    path.file_name()
        .ok_or_else(|| anyhow!("Path has no file name: {path:?}"))
}

fn copy_into(handle: &ArtifactHandle, dir: &Path, ctx: &RunContext<'_>) -> Result<PathBuf> {
    let target = dir.join(file_name(&handle.path)?);

    let reader = File::open(&handle.path)
        .with_context(|| format!("Failed to open for reading: {:?}", handle.path))?;
    let mut writer = File::create(&target)
        .map(BufWriter::new)
        .with_context(|| format!("Failed to open for writing: {target:?}"))?;

    stream::copy(reader, &mut writer, ctx.cancel_signal)
        .and_then(|_| writer.flush())
        .with_context(|| format!("Failed to copy {:?} to {target:?}", handle.path))?;

    Ok(target)
}

/// Clear a step's output directory and return it.
fn step_dir(ctx: &RunContext<'_>, kind: ArtifactKind) -> Result<PathBuf> {
    let dir = ctx.layout.extracted(kind);
    util::recreate_dir(&dir).with_context(|| format!("Failed to recreate directory: {dir:?}"))?;

    Ok(dir)
}

fn record_not_found(ctx: &mut RunContext<'_>, name: &str, kind: ArtifactKind) {
    ctx.aggregator.record_status(
        name,
        Status::Missing,
        [],
        Some(format!("no {kind} candidate found")),
    );
}

/// Run one step. Errors are recorded against `name` instead of being
/// propagated, unless the run was cancelled.
fn run_step(
    ctx: &mut RunContext<'_>,
    name: &str,
    step: impl FnOnce(&mut RunContext<'_>) -> Result<()>,
) -> Result<()> {
    let _span = debug_span!("step", name).entered();

    if let Err(e) = step(ctx) {
        if ctx.cancel_signal.load(Ordering::SeqCst) {
            return Err(e);
        }

        warn!("Step {name} failed: {e:#}");
        ctx.aggregator
            .record_status(name, Status::Warning(format!("failed: {e:#}")), [], None);
    }

    stream::check_cancel(ctx.cancel_signal)?;

    Ok(())
}

fn preserve_images(
    ctx: &mut RunContext<'_>,
    located: &BTreeMap<ArtifactKind, ArtifactHandle>,
) -> Result<()> {
    let dir = ctx.layout.preserved();
    util::recreate_dir(&dir).with_context(|| format!("Failed to recreate directory: {dir:?}"))?;

    let mut manifest = PreservedManifest::default();

    for kind in PRESERVED_KINDS {
        let Some(handle) = located.get(&kind) else {
            continue;
        };

        let target = dir.join(file_name(&handle.path)?);

        let reader = File::open(&handle.path)
            .map(BufReader::new)
            .with_context(|| format!("Failed to open for reading: {:?}", handle.path))?;
        let mut reader = HashingReader::new(reader, DigestContext::new(&SHA256));
        let mut writer = File::create(&target)
            .map(BufWriter::new)
            .with_context(|| format!("Failed to open for writing: {target:?}"))?;

        let size = stream::copy(&mut reader, &mut writer, ctx.cancel_signal)
            .and_then(|n| writer.flush().map(|_| n))
            .with_context(|| format!("Failed to copy {:?} to {target:?}", handle.path))?;

        let (_, digest) = reader.finish();

        manifest.images.push(PreservedImage {
            kind,
            source: handle.path.clone(),
            file: target,
            size,
            sha256: digest.finish().as_ref().to_vec(),
        });
    }

    let path = dir.join(PRESERVED_FILE_NAME);
    let data = toml_edit::ser::to_string_pretty(&manifest)
        .context("Failed to serialize preserved image list")?;
    write_atomic(&path, data.as_bytes())?;

    let count = manifest.images.len();
    let paths = manifest.images.into_iter().map(|i| i.file);
    ctx.aggregator
        .record(STEP_PRESERVED, paths, Some(format!("{count} images")));

    Ok(())
}

fn unpack_boot(ctx: &mut RunContext<'_>, handle: &ArtifactHandle) -> Result<()> {
    let name = ArtifactKind::BootHeader.name();
    let dir = step_dir(ctx, ArtifactKind::BootHeader)?;

    let reader = File::open(&handle.path)
        .map(BufReader::new)
        .with_context(|| format!("Failed to open for reading: {:?}", handle.path))?;
    let image = BootImage::from_reader(reader)
        .with_context(|| format!("Failed to parse boot image: {:?}", handle.path))?;

    let written = image
        .unpack(&dir)
        .with_context(|| format!("Failed to unpack boot image into: {dir:?}"))?;

    ctx.aggregator.record(
        name,
        written,
        Some(format!("header version {}", image.header_version())),
    );

    Ok(())
}

fn kernel_version(ctx: &mut RunContext<'_>, handle: Option<&ArtifactHandle>) -> Result<()> {
    let dir = step_dir(ctx, ArtifactKind::Kernel)?;

    let Some(handle) = handle else {
        record_not_found(ctx, STEP_KERNEL_VERSION, ArtifactKind::Kernel);
        return Ok(());
    };

    let data = read_input(handle)?;

    match kernel::recover_version(&data, ctx.config.kernel_options()) {
        Ok(success) => {
            info!("Kernel version: {}", success.value);

            let path = dir.join(VERSION_FILE_NAME);
            write_atomic(&path, format!("{}\n", success.value).as_bytes())?;

            ctx.aggregator.record(
                STEP_KERNEL_VERSION,
                [path],
                Some(format!("{} (strategy: {})", success.value, success.strategy)),
            );
        }
        Err(exhausted) => {
            ctx.aggregator.record_status(
                STEP_KERNEL_VERSION,
                Status::Missing,
                [],
                Some(format!("version unavailable: {exhausted}")),
            );
        }
    }

    Ok(())
}

fn kernel_config(
    ctx: &mut RunContext<'_>,
    config: Option<&ArtifactHandle>,
    kernel: Option<&ArtifactHandle>,
) -> Result<()> {
    let name = ArtifactKind::KernelConfig.name();
    let dir = step_dir(ctx, ArtifactKind::KernelConfig)?;
    let path = dir.join(KERNEL_CONFIG_FILE_NAME);

    if let Some(handle) = config {
        let data = read_input(handle)?;
        write_atomic(&path, &data)?;

        ctx.aggregator
            .record(name, [path], Some(format!("copied from {:?}", handle.path)));
        return Ok(());
    }

    let Some(kernel) = kernel else {
        record_not_found(ctx, name, ArtifactKind::Kernel);
        return Ok(());
    };

    let data = read_input(kernel)?;

    match kernel::recover_ikconfig(&data, ctx.config.kernel_options()) {
        Ok(IkconfigOutcome::Embedded { strategy, config }) => {
            write_atomic(&path, config.as_bytes())?;

            ctx.aggregator
                .record(name, [path], Some(format!("strategy: {strategy}")));
        }
        Ok(IkconfigOutcome::NotEmbedded) => {
            ctx.aggregator.record_status(
                name,
                Status::Missing,
                [],
                Some("not embedded in kernel image".to_owned()),
            );
        }
        Err(exhausted) => {
            let status =
                Status::Warning(format!("embedded config could not be extracted: {exhausted}"));
            ctx.aggregator.record_status(name, status, [], None);
        }
    }

    Ok(())
}

fn device_tree_overlay(
    ctx: &mut RunContext<'_>,
    tools: &Tools<'_>,
    handle: Option<&ArtifactHandle>,
) -> Result<()> {
    let name = ArtifactKind::DeviceTreeOverlay.name();
    let dir = step_dir(ctx, ArtifactKind::DeviceTreeOverlay)?;

    let Some(handle) = handle else {
        record_not_found(ctx, name, ArtifactKind::DeviceTreeOverlay);
        return Ok(());
    };

    let data = read_input(handle)?;
    let table = dtbo::parse_dtbo_table(&data)
        .with_context(|| format!("Invalid DTBO image: {:?}", handle.path))?;
    info!("DTBO: {} entries ({:?})", table.entries.len(), table.endianness);

    let report = dtbo::write_entries(&table, &data, &dir, tools.dtb_decompiler)
        .with_context(|| format!("Failed to export DTBO entries to: {dir:?}"))?;

    let mut detail = format!(
        "{} entries, {} decompiled",
        report.written.len(),
        report.decompiled.len(),
    );
    if !report.decompile_failures.is_empty() {
        detail.push_str(&format!(
            ", {} decompile failures",
            report.decompile_failures.len(),
        ));
    }

    let paths = report.written.into_iter().chain(report.decompiled);
    ctx.aggregator.record(name, paths, Some(detail));

    Ok(())
}

fn device_tree(
    ctx: &mut RunContext<'_>,
    tools: &Tools<'_>,
    handle: Option<&ArtifactHandle>,
) -> Result<()> {
    let name = ArtifactKind::DeviceTree.name();
    let dir = step_dir(ctx, ArtifactKind::DeviceTree)?;

    let Some(handle) = handle else {
        record_not_found(ctx, name, ArtifactKind::DeviceTree);
        return Ok(());
    };

    let dtb = copy_into(handle, &dir, ctx)?;
    let mut detail = None;

    if let Some(decompiler) = tools.dtb_decompiler {
        let dts = dtb.with_extension("dts");

        if let Err(e) = decompiler.dtb_to_dts(&dtb, &dts) {
            warn!("Failed to decompile {dtb:?}: {e}");
            detail = Some(format!("decompilation failed: {e}"));
        }
    }

    ctx.aggregator.record(name, [dtb], detail);

    Ok(())
}

fn ramdisk(ctx: &mut RunContext<'_>, handle: Option<&ArtifactHandle>) -> Result<()> {
    let name = ArtifactKind::Ramdisk.name();
    let dir = step_dir(ctx, ArtifactKind::Ramdisk)?;

    let Some(handle) = handle else {
        record_not_found(ctx, name, ArtifactKind::Ramdisk);
        return Ok(());
    };

    let copied = copy_into(handle, &dir, ctx)?;
    let mut paths = vec![copied];

    let mut magic = [0u8; 6];
    let n = File::open(&handle.path)
        .and_then(|f| f.take(magic.len() as u64).read(&mut magic))
        .with_context(|| format!("Failed to read: {:?}", handle.path))?;

    let detail = match CompressedFormat::detect(&magic[..n]) {
        Some(format) => {
            let cpio = dir.join(RAMDISK_CPIO_FILE_NAME);

            let reader = File::open(&handle.path)
                .map(BufReader::new)
                .with_context(|| format!("Failed to open for reading: {:?}", handle.path))?;
            let reader = CompressedReader::with_format(reader, format)
                .with_context(|| format!("Failed to open {format:?} stream: {:?}", handle.path))?;
            let mut writer = File::create(&cpio)
                .map(BufWriter::new)
                .with_context(|| format!("Failed to open for writing: {cpio:?}"))?;

            stream::copy(reader, &mut writer, ctx.cancel_signal)
                .and_then(|_| writer.flush())
                .with_context(|| format!("Failed to decompress ramdisk: {:?}", handle.path))?;

            paths.push(cpio);
            format!("{format:?} compressed")
        }
        None => "uncompressed".to_owned(),
    };

    ctx.aggregator.record(name, paths, Some(detail));

    Ok(())
}

fn verified_boot_metadata(ctx: &mut RunContext<'_>, handle: Option<&ArtifactHandle>) -> Result<()> {
    let name = ArtifactKind::VerifiedBootMetadata.name();
    let dir = step_dir(ctx, ArtifactKind::VerifiedBootMetadata)?;

    let Some(handle) = handle else {
        record_not_found(ctx, name, ArtifactKind::VerifiedBootMetadata);
        return Ok(());
    };

    let reader = File::open(&handle.path)
        .map(BufReader::new)
        .with_context(|| format!("Failed to open for reading: {:?}", handle.path))?;
    let summary = VbmetaSummary::from_reader(reader)
        .with_context(|| format!("Failed to parse vbmeta header: {:?}", handle.path))?;

    let path = dir.join(VBMETA_FILE_NAME);
    let data =
        toml_edit::ser::to_string_pretty(&summary).context("Failed to serialize vbmeta summary")?;
    write_atomic(&path, data.as_bytes())?;

    match summary.weakened_verification() {
        Some(reason) => {
            ctx.aggregator
                .record_status(name, Status::Warning(reason), [path], None);
        }
        None => {
            ctx.aggregator
                .record(name, [path], Some(summary.algorithm_name().to_owned()));
        }
    }

    Ok(())
}

fn dynamic_partitions(
    ctx: &mut RunContext<'_>,
    tools: &Tools<'_>,
    handle: Option<&ArtifactHandle>,
) -> Result<()> {
    let kind = ArtifactKind::DynamicPartitionContainer;
    let name = kind.name();
    let dir = step_dir(ctx, kind)?;

    let Some(handle) = handle else {
        record_not_found(ctx, name, kind);
        return Ok(());
    };

    let raw = convert::ensure_raw(
        handle,
        &ctx.layout.raw_cache(kind),
        tools.sparse_decoder,
        ctx.cancel_signal,
    )
    .with_context(|| format!("Failed to convert to raw image: {:?}", handle.path))?;

    let produced = tools
        .super_unpacker
        .unpack(&raw.path, &dir)
        .with_context(|| format!("Failed to unpack dynamic partitions: {:?}", raw.path))?;

    let detail = format!("{} partitions", produced.len());
    ctx.aggregator.record(name, produced, Some(detail));

    Ok(())
}

fn vendor_filesystem(
    ctx: &mut RunContext<'_>,
    tools: &Tools<'_>,
    handle: Option<&ArtifactHandle>,
) -> Result<()> {
    let kind = ArtifactKind::VendorFilesystem;
    let name = kind.name();
    let out_dir = ctx.layout.extracted(kind);

    let Some(handle) = handle else {
        util::recreate_dir(&out_dir)
            .with_context(|| format!("Failed to recreate directory: {out_dir:?}"))?;
        record_not_found(ctx, name, kind);
        return Ok(());
    };

    let raw = convert::ensure_raw(
        handle,
        &ctx.layout.raw_cache(kind),
        tools.sparse_decoder,
        ctx.cancel_signal,
    )
    .with_context(|| format!("Failed to convert to raw image: {:?}", handle.path))?;

    let extraction = fsextract::extract_subtree(
        &raw.path,
        &ctx.config.vendor_paths,
        &ctx.config.fs_backends,
        tools.fs_capabilities(),
        &out_dir,
        ctx.cancel_signal,
    )
    .with_context(|| format!("Failed to extract from: {:?}", raw.path))?;

    let present = extraction
        .present()
        .map(Path::to_path_buf)
        .collect::<Vec<_>>();
    let absent = extraction.absent().collect::<Vec<_>>();
    let failures = extraction
        .failures
        .iter()
        .map(|(backend, reason)| format!("{backend}: {reason}"))
        .collect::<Vec<_>>();
    let failures = (!failures.is_empty()).then(|| failures.join("; "));

    if present.is_empty() {
        ctx.aggregator
            .record_status(name, Status::Missing, [], failures);
    } else if !absent.is_empty() {
        let status = Status::Warning(format!("absent: {}", absent.join(", ")));
        ctx.aggregator.record_status(name, status, present, failures);
    } else {
        ctx.aggregator.record(name, present, failures);
    }

    Ok(())
}

fn device_signals(ctx: &mut RunContext<'_>, sources: &[PathBuf]) -> Result<()> {
    let dir = ctx.layout.signals();

    if sources.is_empty() {
        for name in [STEP_BOOTLOADER, STEP_VERIFIED_BOOT] {
            ctx.aggregator.record_status(
                name,
                Status::Missing,
                [],
                Some("no device signal sources provided".to_owned()),
            );
        }
        return Ok(());
    }

    let signals = signals::collect(sources, &dir)
        .with_context(|| format!("Failed to collect device signals into: {dir:?}"))?;
    let manifest = dir.join(signals::SIGNALS_FILE_NAME);

    match signals.lock_state() {
        state @ (LockState::Locked | LockState::Unlocked) => {
            ctx.aggregator.record_status(
                STEP_BOOTLOADER,
                Status::Found,
                [manifest.clone()],
                Some(state.to_string()),
            );
        }
        LockState::Unknown => {
            let reason = if signals.bootloader.is_some() {
                "bootloader lock state is contradictory"
            } else {
                "bootloader lock state not reported"
            };

            ctx.aggregator.record_status(
                STEP_BOOTLOADER,
                Status::Warning(reason.to_owned()),
                [manifest.clone()],
                None,
            );
        }
    }

    match &signals.verified_boot_state {
        Some(state) => {
            ctx.aggregator.record_status(
                STEP_VERIFIED_BOOT,
                Status::Found,
                [manifest],
                Some(state.clone()),
            );
        }
        None => {
            ctx.aggregator.record_status(
                STEP_VERIFIED_BOOT,
                Status::Warning("verified boot state unknown".to_owned()),
                [manifest],
                None,
            );
        }
    }

    Ok(())
}

fn relocate(
    located: &mut BTreeMap<ArtifactKind, ArtifactHandle>,
    kinds: &[ArtifactKind],
    roots: &[PathBuf],
    depth: usize,
) -> Result<()> {
    for &kind in kinds {
        if located.contains_key(&kind) {
            continue;
        }

        if let Some(handle) = locate::locate(kind, roots, depth)? {
            info!("Located {kind} in unpacked output: {:?}", handle.path);
            located.insert(kind, handle);
        }
    }

    Ok(())
}

/// Run every step and write the summary.
pub fn run(ctx: &mut RunContext<'_>, tools: &Tools<'_>, inputs: &Inputs) -> Result<Summary> {
    ctx.layout
        .create()
        .with_context(|| format!("Failed to create output layout: {:?}", ctx.layout.root()))?;

    let depth = ctx.config.locate_depth;
    let mut roots = inputs.search_roots.clone();
    let mut located = locate::locate_all(&roots, depth).context("Failed to locate artifacts")?;

    for handle in located.values() {
        info!(
            "Located {}: {:?} ({:?})",
            handle.kind, handle.path, handle.detected_format,
        );
    }

    run_step(ctx, STEP_PRESERVED, |ctx| preserve_images(ctx, &located))?;

    let boot = located.get(&ArtifactKind::BootHeader).cloned();
    run_step(ctx, ArtifactKind::BootHeader.name(), |ctx| match &boot {
        Some(handle) => unpack_boot(ctx, handle),
        None => {
            step_dir(ctx, ArtifactKind::BootHeader)?;
            record_not_found(ctx, ArtifactKind::BootHeader.name(), ArtifactKind::BootHeader);
            Ok(())
        }
    })?;

    let boot_dir = ctx.layout.extracted(ArtifactKind::BootHeader);
    if boot.is_some() && boot_dir.is_dir() {
        roots.push(boot_dir);
        relocate(&mut located, &BOOT_COMPONENT_KINDS, &roots, depth)?;
    }

    let kernel = located.get(&ArtifactKind::Kernel);

    run_step(ctx, STEP_KERNEL_VERSION, |ctx| kernel_version(ctx, kernel))?;
    run_step(ctx, ArtifactKind::KernelConfig.name(), |ctx| {
        kernel_config(ctx, located.get(&ArtifactKind::KernelConfig), kernel)
    })?;
    run_step(ctx, ArtifactKind::Ramdisk.name(), |ctx| {
        ramdisk(ctx, located.get(&ArtifactKind::Ramdisk))
    })?;
    run_step(ctx, ArtifactKind::DeviceTreeOverlay.name(), |ctx| {
        device_tree_overlay(ctx, tools, located.get(&ArtifactKind::DeviceTreeOverlay))
    })?;
    run_step(ctx, ArtifactKind::DeviceTree.name(), |ctx| {
        device_tree(ctx, tools, located.get(&ArtifactKind::DeviceTree))
    })?;
    run_step(ctx, ArtifactKind::VerifiedBootMetadata.name(), |ctx| {
        verified_boot_metadata(ctx, located.get(&ArtifactKind::VerifiedBootMetadata))
    })?;
    run_step(ctx, ArtifactKind::DynamicPartitionContainer.name(), |ctx| {
        dynamic_partitions(
            ctx,
            tools,
            located.get(&ArtifactKind::DynamicPartitionContainer),
        )
    })?;

    let super_dir = ctx.layout.extracted(ArtifactKind::DynamicPartitionContainer);
    if super_dir.is_dir() {
        roots.push(super_dir);
        relocate(
            &mut located,
            &[ArtifactKind::VendorFilesystem],
            &roots,
            depth,
        )?;
    }

    run_step(ctx, ArtifactKind::VendorFilesystem.name(), |ctx| {
        vendor_filesystem(ctx, tools, located.get(&ArtifactKind::VendorFilesystem))
    })?;
    run_step(ctx, "device_signals", |ctx| {
        device_signals(ctx, &inputs.signal_sources)
    })?;

    let summary = ctx.aggregator.summarize();
    let path = ctx.layout.summary();
    summary
        .write(&path)
        .with_context(|| format!("Failed to write summary: {path:?}"))?;

    Ok(summary)
}
