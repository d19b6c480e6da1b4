// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{path::PathBuf, sync::atomic::AtomicBool};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::{
    artifact::{ArtifactHandle, ArtifactKind},
    cli::{status, warning},
    config::Config,
    context::SystemTools,
    convert,
    fsextract::{self, Backend, PathOutcome},
};

fn extract_subcommand(cli: &ExtractCli, config: &Config, cancel_signal: &AtomicBool) -> Result<()> {
    let system = SystemTools::new(config);
    let tools = system.tools();

    let handle = ArtifactHandle::from_path(ArtifactKind::VendorFilesystem, &cli.input)
        .with_context(|| format!("Failed to inspect image: {:?}", cli.input))?;

    let cache = cli.input.with_extension("raw");
    let raw = convert::ensure_raw(&handle, &cache, tools.sparse_decoder, cancel_signal)
        .with_context(|| format!("Failed to convert to raw image: {:?}", cli.input))?;

    let paths = if cli.path.is_empty() {
        &config.vendor_paths
    } else {
        &cli.path
    };
    let backends = if cli.backend.is_empty() {
        &config.fs_backends
    } else {
        &cli.backend
    };

    let extraction = fsextract::extract_subtree(
        &raw.path,
        paths,
        backends,
        tools.fs_capabilities(),
        &cli.output,
        cancel_signal,
    )
    .with_context(|| format!("Failed to extract from: {:?}", raw.path))?;

    for (backend, reason) in &extraction.failures {
        warning!("{backend}: {reason}");
    }

    for (logical, outcome) in &extraction.paths {
        match outcome {
            PathOutcome::Present(p) => status!("{logical} -> {p:?}"),
            PathOutcome::Absent => warning!("{logical}: absent"),
        }
    }

    Ok(())
}

pub fn fs_main(cli: &FsCli, config: &Config, cancel_signal: &AtomicBool) -> Result<()> {
    match &cli.command {
        FsCommand::Extract(c) => extract_subcommand(c, config, cancel_signal),
    }
}

/// Extract paths from a filesystem image.
///
/// Sparse images are converted to a `.raw` file next to the input first. The
/// output directory is cleared before extracting.
#[derive(Debug, Parser)]
struct ExtractCli {
    /// Path to input filesystem image.
    #[arg(short, long, value_name = "FILE", value_parser)]
    input: PathBuf,

    /// Path to output directory.
    #[arg(short, long, value_name = "DIR", value_parser)]
    output: PathBuf,

    /// Absolute path inside the image to extract.
    ///
    /// Defaults to the vendor paths from the config.
    #[arg(short, long, value_name = "PATH")]
    path: Vec<String>,

    /// Backend to try, in order.
    #[arg(short, long, value_enum)]
    backend: Vec<Backend>,
}

#[derive(Debug, Subcommand)]
enum FsCommand {
    Extract(ExtractCli),
}

/// Work with filesystem images.
#[derive(Debug, Parser)]
pub struct FsCli {
    #[command(subcommand)]
    command: FsCommand,
}
