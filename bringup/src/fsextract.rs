// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Copies selected subtrees out of a raw filesystem image.
//!
//! Two backends are supported. The mount backend loop mounts the image
//! read-only and copies with ordinary file operations. The offline-dump backend
//! lists directories through [`FsIntrospect`] and dumps one regular file at a
//! time, which works without privileges. Backends are tried in order and each
//! one only handles the paths that are still missing.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    fs::{self, File},
    io::{self, BufWriter, Write},
    mem,
    path::{Path, PathBuf},
    sync::atomic::AtomicBool,
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, debug_span, info, warn};

use crate::{
    stream,
    tool::{self, DirEntry, EntryKind, FsIntrospect, LoopMount},
    util,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid logical path: {0:?}")]
    InvalidPath(String),
    #[error("Failed to prepare output directory: {0:?}")]
    OutputDir(PathBuf, #[source] io::Error),
    #[error("Extraction was cancelled")]
    Cancelled(#[source] io::Error),
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Mount,
    OfflineDump,
}

impl Backend {
    pub const DEFAULT_ORDER: [Self; 2] = [Self::Mount, Self::OfflineDump];
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mount => f.write_str("mount"),
            Self::OfflineDump => f.write_str("offline-dump"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathOutcome {
    Present(PathBuf),
    Absent,
}

/// The capabilities backing each [`Backend`].
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    pub mount: &'a dyn LoopMount,
    pub introspect: &'a dyn FsIntrospect,
}

#[derive(Debug, Default)]
pub struct SubtreeExtraction {
    /// One entry per requested logical path, plus one [`PathOutcome::Absent`]
    /// entry for each file or directory inside a requested subtree that could
    /// not be dumped.
    pub paths: BTreeMap<String, PathOutcome>,
    /// Backend and per-path failures that were recovered from.
    pub failures: Vec<(Backend, String)>,
}

impl SubtreeExtraction {
    pub fn present(&self) -> impl Iterator<Item = &Path> {
        self.paths.values().filter_map(|o| match o {
            PathOutcome::Present(p) => Some(p.as_path()),
            PathOutcome::Absent => None,
        })
    }

    pub fn absent(&self) -> impl Iterator<Item = &str> {
        self.paths
            .iter()
            .filter(|(_, o)| **o == PathOutcome::Absent)
            .map(|(p, _)| p.as_str())
    }
}

/// A read-only loop mount that is released when dropped.
pub struct MountGuard<'a> {
    mounter: &'a dyn LoopMount,
    mount_point: Option<TempDir>,
}

impl<'a> MountGuard<'a> {
    pub fn mount(
        mounter: &'a dyn LoopMount,
        image: &Path,
    ) -> std::result::Result<Self, tool::Error> {
        let mount_point = tempfile::Builder::new()
            .prefix("bringup-mnt-")
            .tempdir()
            .map_err(|e| tool::Error::Io("mount point", e))?;

        mounter.mount(image, mount_point.path())?;
        debug!("Mounted {image:?} at {:?}", mount_point.path());

        Ok(Self {
            mounter,
            mount_point: Some(mount_point),
        })
    }

    pub fn path(&self) -> &Path {
        self.mount_point
            .as_ref()
            .map_or_else(|| Path::new(""), |d| d.path())
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        let Some(mount_point) = self.mount_point.take() else {
            return;
        };

        match self.mounter.unmount(mount_point.path()) {
            Ok(()) => debug!("Unmounted {:?}", mount_point.path()),
            Err(e) => {
                warn!("Failed to unmount {:?}: {e}", mount_point.path());
                // Never delete through a mount that is still active.
                mem::forget(mount_point);
            }
        }
    }
}

/// Convert an absolute in-image path to a relative output path.
fn relative_path(logical: &str) -> Result<PathBuf> {
    let mut result = PathBuf::new();

    for component in logical.split('/') {
        match component {
            "" | "." => {}
            ".." => return Err(Error::InvalidPath(logical.to_owned())),
            c => result.push(c),
        }
    }

    if result.as_os_str().is_empty() {
        return Err(Error::InvalidPath(logical.to_owned()));
    }

    Ok(result)
}

fn join_logical(parent: &str, name: &str) -> String {
    format!("{}/{name}", parent.trim_end_matches('/'))
}

fn split_logical(logical: &str) -> (String, &str) {
    let trimmed = logical.trim_end_matches('/');

    match trimmed.rsplit_once('/') {
        Some((parent, name)) if !parent.is_empty() => (parent.to_owned(), name),
        Some((_, name)) => ("/".to_owned(), name),
        None => ("/".to_owned(), trimmed),
    }
}

fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

fn remove_partial(path: &Path) {
    let result = match path.symlink_metadata() {
        Ok(m) if m.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return,
    };

    if let Err(e) = result {
        warn!("Failed to remove partial output {path:?}: {e}");
    }
}

fn is_cancel(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::Interrupted
}

fn copy_file(source: &Path, target: &Path, cancel_signal: &AtomicBool) -> io::Result<()> {
    let reader = File::open(source)?;
    let mut writer = BufWriter::new(File::create(target)?);

    stream::copy(reader, &mut writer, cancel_signal)?;
    writer.flush()
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    let link = fs::read_link(source)?;
    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, _target: &Path) -> io::Result<()> {
    debug!("Skipping symlink: {source:?}");
    Ok(())
}

/// Recursively copy `source` to `target`. Special files are skipped.
fn copy_tree(source: &Path, target: &Path, cancel_signal: &AtomicBool) -> io::Result<()> {
    stream::check_cancel(cancel_signal)?;

    let file_type = source.symlink_metadata()?.file_type();

    if file_type.is_dir() {
        fs::create_dir_all(target)?;

        let mut entries = fs::read_dir(source)?.collect::<io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            copy_tree(&entry.path(), &target.join(entry.file_name()), cancel_signal)?;
        }
    } else if file_type.is_file() {
        copy_file(source, target, cancel_signal)?;
    } else if file_type.is_symlink() {
        copy_symlink(source, target)?;
    } else {
        debug!("Skipping special file: {source:?}");
    }

    Ok(())
}

fn extract_mounted(
    mounter: &dyn LoopMount,
    image: &Path,
    pending: &[(&str, PathBuf)],
    out_dir: &Path,
    failures: &mut Vec<(Backend, String)>,
    cancel_signal: &AtomicBool,
) -> Result<()> {
    if let Err(e) = mounter.check_privileges() {
        warn!("Mount backend unavailable: {e}");
        failures.push((Backend::Mount, e.to_string()));
        return Ok(());
    }

    let guard = match MountGuard::mount(mounter, image) {
        Ok(g) => g,
        Err(e) => {
            warn!("Failed to mount {image:?}: {e}");
            failures.push((Backend::Mount, e.to_string()));
            return Ok(());
        }
    };

    for (logical, relative) in pending {
        let source = guard.path().join(relative);
        if !exists(&source) {
            debug!("Not present in image: {logical}");
            continue;
        }

        let target = out_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::OutputDir(parent.to_owned(), e))?;
        }

        if let Err(e) = copy_tree(&source, &target, cancel_signal) {
            remove_partial(&target);

            if is_cancel(&e) {
                return Err(Error::Cancelled(e));
            }

            warn!("Failed to copy {logical}: {e}");
            failures.push((Backend::Mount, format!("{logical}: {e}")));
        }
    }

    Ok(())
}

/// Dump one regular file and check that its size matches the listing.
fn dump_file(
    introspect: &dyn FsIntrospect,
    image: &Path,
    logical: &str,
    expected_size: u64,
    target: &Path,
) -> std::result::Result<(), String> {
    introspect
        .dump_file(image, logical, target)
        .map_err(|e| e.to_string())?;

    let size = util::file_size_or_zero(target).map_err(|e| e.to_string())?;
    if size != expected_size {
        return Err(format!("dumped {size} bytes, expected {expected_size}"));
    }

    Ok(())
}

/// Dump a file or directory tree. Entries that fail to dump are removed and
/// recorded in `failures` and `lost`, and the rest of the tree is still
/// processed.
#[allow(clippy::too_many_arguments)]
fn dump_tree(
    introspect: &dyn FsIntrospect,
    image: &Path,
    logical: &str,
    entry: &DirEntry,
    target: &Path,
    failures: &mut Vec<(Backend, String)>,
    lost: &mut BTreeSet<String>,
    cancel_signal: &AtomicBool,
) -> Result<()> {
    stream::check_cancel(cancel_signal).map_err(Error::Cancelled)?;

    match entry.kind {
        EntryKind::Directory => {
            let entries = match introspect.list_dir(image, logical) {
                Ok(e) => e,
                Err(e) => {
                    warn!("Failed to list {logical}: {e}");
                    failures.push((Backend::OfflineDump, format!("{logical}: {e}")));
                    lost.insert(logical.to_owned());
                    return Ok(());
                }
            };

            fs::create_dir_all(target).map_err(|e| Error::OutputDir(target.to_owned(), e))?;

            for child in &entries {
                dump_tree(
                    introspect,
                    image,
                    &join_logical(logical, &child.name),
                    child,
                    &target.join(&child.name),
                    failures,
                    lost,
                    cancel_signal,
                )?;
            }
        }
        EntryKind::File => {
            if let Err(e) = dump_file(introspect, image, logical, entry.size, target) {
                remove_partial(target);
                warn!("Failed to dump {logical}: {e}");
                failures.push((Backend::OfflineDump, format!("{logical}: {e}")));
                lost.insert(logical.to_owned());
            }
        }
        EntryKind::Symlink | EntryKind::Other => {
            debug!("Skipping non-regular entry: {logical}");
        }
    }

    Ok(())
}

fn extract_offline(
    introspect: &dyn FsIntrospect,
    image: &Path,
    pending: &[(&str, PathBuf)],
    out_dir: &Path,
    failures: &mut Vec<(Backend, String)>,
    lost: &mut BTreeSet<String>,
    cancel_signal: &AtomicBool,
) -> Result<()> {
    for (logical, relative) in pending {
        let (parent, name) = split_logical(logical);

        let listing = match introspect.list_dir(image, &parent) {
            Ok(l) => l,
            Err(e) => {
                failures.push((Backend::OfflineDump, format!("{parent}: {e}")));
                continue;
            }
        };

        let Some(entry) = listing.into_iter().find(|e| e.name == name) else {
            debug!("Not present in image: {logical}");
            continue;
        };

        let target = out_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::OutputDir(parent.to_owned(), e))?;
        }

        dump_tree(
            introspect,
            image,
            logical,
            &entry,
            &target,
            failures,
            lost,
            cancel_signal,
        )?;
    }

    Ok(())
}

/// Extract each logical path in `paths` from `image` into `out_dir`, trying
/// `backends` in order. `out_dir` is cleared first. A path is only reported as
/// [`PathOutcome::Present`] if it exists in `out_dir` afterwards.
pub fn extract_subtree(
    image: &Path,
    paths: &[String],
    backends: &[Backend],
    capabilities: Capabilities<'_>,
    out_dir: &Path,
    cancel_signal: &AtomicBool,
) -> Result<SubtreeExtraction> {
    let _span = debug_span!("extract_subtree", ?image).entered();

    let requested = paths
        .iter()
        .map(|p| relative_path(p).map(|r| (p.as_str(), r)))
        .collect::<Result<Vec<_>>>()?;

    util::recreate_dir(out_dir).map_err(|e| Error::OutputDir(out_dir.to_owned(), e))?;

    let mut failures = vec![];
    let mut lost = BTreeSet::new();

    for &backend in backends {
        let pending = requested
            .iter()
            .filter(|(_, r)| !exists(&out_dir.join(r)))
            .cloned()
            .collect::<Vec<_>>();
        if pending.is_empty() {
            break;
        }

        info!("Extracting {} paths with {backend} backend", pending.len());

        match backend {
            Backend::Mount => extract_mounted(
                capabilities.mount,
                image,
                &pending,
                out_dir,
                &mut failures,
                cancel_signal,
            )?,
            Backend::OfflineDump => extract_offline(
                capabilities.introspect,
                image,
                &pending,
                out_dir,
                &mut failures,
                &mut lost,
                cancel_signal,
            )?,
        }
    }

    let mut paths = requested
        .into_iter()
        .map(|(logical, relative)| {
            let target = out_dir.join(relative);
            let outcome = if exists(&target) {
                PathOutcome::Present(target)
            } else {
                PathOutcome::Absent
            };

            (logical.to_owned(), outcome)
        })
        .collect::<BTreeMap<_, _>>();

    for logical in lost {
        let target = out_dir.join(relative_path(&logical)?);
        if !exists(&target) {
            paths.entry(logical).or_insert(PathOutcome::Absent);
        }
    }

    Ok(SubtreeExtraction { paths, failures })
}
