// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Finds the best input file for each artifact kind. Candidate names are fixed,
//! ordered glob patterns per kind. Patterns are tried first, then search roots,
//! then files. Within a root, files closer to the root come first and ties are
//! broken by path. The first non-empty regular file wins.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::artifact::{ArtifactHandle, ArtifactKind};

/// Default search depth: the root itself plus its immediate subdirectories.
pub const DEFAULT_DEPTH: usize = 1;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid pattern: {0:?}")]
    Pattern(&'static str, #[source] globset::Error),
    #[error("Failed to inspect candidate: {0:?}")]
    Inspect(PathBuf, #[source] std::io::Error),
}

type Result<T> = std::result::Result<T, Error>;

/// Ordered filename patterns for each kind. Earlier patterns are preferred.
pub fn patterns(kind: ArtifactKind) -> &'static [&'static str] {
    match kind {
        ArtifactKind::BootHeader => &["boot.img", "boot*.img"],
        ArtifactKind::Kernel => &["*zImage*", "*kernel*", "*Image*", "*Image.gz*"],
        ArtifactKind::Ramdisk => &[
            "*ramdisk*.gz",
            "*ramdisk*.lz4",
            "*ramdisk*.cpio",
            "*ramdisk*",
        ],
        ArtifactKind::DeviceTree => &["dtb", "*.dtb", "dtb.img"],
        ArtifactKind::DeviceTreeOverlay => {
            &["dtbo.img", "dtbo*.img", "*dtbo*", "recovery_dtbo"]
        }
        ArtifactKind::DynamicPartitionContainer => &["super.img", "super*.img"],
        ArtifactKind::VendorFilesystem => {
            &["vendor.img", "vendor_a.img", "vendor_b.img", "vendor.raw"]
        }
        ArtifactKind::VerifiedBootMetadata => &["vbmeta.img", "vbmeta*.img"],
        ArtifactKind::KernelConfig => {
            &["ikconfig", ".config", "kernel.config", "*defconfig*"]
        }
    }
}

/// Filenames that never match `kind`, even when one of its patterns does.
pub fn exclusions(kind: ArtifactKind) -> &'static [&'static str] {
    match kind {
        // `*kernel*` would otherwise pick up `kernel.config`.
        ArtifactKind::Kernel => &["*config*"],
        _ => &[],
    }
}

fn exclusion_set(kind: ArtifactKind) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();

    for p in exclusions(kind) {
        builder.add(Glob::new(p).map_err(|e| Error::Pattern(*p, e))?);
    }

    builder.build().map_err(|e| Error::Pattern("<exclusions>", e))
}

fn matchers(kind: ArtifactKind) -> Result<Vec<GlobMatcher>> {
    patterns(kind)
        .iter()
        .map(|p| {
            Glob::new(p)
                .map(|g| g.compile_matcher())
                .map_err(|e| Error::Pattern(*p, e))
        })
        .collect()
}

/// List the regular files under `root` up to `depth` directory levels below
/// it, shallowest first. Unreadable directories are skipped.
fn candidates(root: &Path, depth: usize) -> Vec<(usize, PathBuf)> {
    let mut files = WalkDir::new(root)
        .min_depth(1)
        .max_depth(depth + 1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                debug!("Skipping unreadable entry under {root:?}: {e}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| (e.depth(), e.into_path()))
        .collect::<Vec<_>>();

    files.sort();

    files
}

/// Find the best candidate for `kind` in `roots`. Returns [`None`] if nothing
/// matches.
pub fn locate(
    kind: ArtifactKind,
    roots: &[PathBuf],
    depth: usize,
) -> Result<Option<ArtifactHandle>> {
    let matchers = matchers(kind)?;
    let excluded = exclusion_set(kind)?;
    let files = roots
        .iter()
        .map(|r| candidates(r, depth))
        .collect::<Vec<_>>();

    for (pattern, matcher) in patterns(kind).iter().zip(&matchers) {
        for (root, root_files) in roots.iter().zip(&files) {
            for (_, path) in root_files {
                let Some(name) = path.file_name() else {
                    continue;
                };

                if !matcher.is_match(name) {
                    continue;
                } else if excluded.is_match(name) {
                    trace!("Skipping excluded candidate: {path:?}");
                    continue;
                }

                let handle = ArtifactHandle::from_path(kind, path)
                    .map_err(|e| Error::Inspect(path.clone(), e))?;

                if handle.size == 0 {
                    trace!("Skipping empty candidate: {path:?}");
                    continue;
                }

                debug!("Located {kind} via {pattern:?} in {root:?}: {path:?}");
                return Ok(Some(handle));
            }
        }
    }

    debug!("No candidate for {kind} in {roots:?}");
    Ok(None)
}

/// Locate every artifact kind. Kinds without a candidate are omitted.
pub fn locate_all(
    roots: &[PathBuf],
    depth: usize,
) -> Result<BTreeMap<ArtifactKind, ArtifactHandle>> {
    let mut result = BTreeMap::new();

    for kind in ArtifactKind::ALL {
        if let Some(handle) = locate(kind, roots, depth)? {
            result.insert(kind, handle);
        }
    }

    Ok(result)
}
