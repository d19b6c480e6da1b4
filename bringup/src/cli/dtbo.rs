// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::{
    cli::{status, warning},
    config::Config,
    format::dtbo::{self, DtboTable},
    tool::DtbDecompiler,
};

fn read_table(path: &Path) -> Result<(Vec<u8>, DtboTable)> {
    let data = fs::read(path).with_context(|| format!("Failed to read: {path:?}"))?;
    let table =
        dtbo::parse_dtbo_table(&data).with_context(|| format!("Invalid DTBO image: {path:?}"))?;

    Ok((data, table))
}

fn info_subcommand(cli: &InfoCli) -> Result<()> {
    let (_, table) = read_table(&cli.input)?;

    println!("{table}");

    Ok(())
}

fn unpack_subcommand(cli: &UnpackCli, config: &Config) -> Result<()> {
    let (data, table) = read_table(&cli.input)?;

    let dtc = config.dtc();
    let decompiler = (!cli.no_decompile).then_some(&dtc as &dyn DtbDecompiler);

    let report = dtbo::write_entries(&table, &data, &cli.output, decompiler)
        .with_context(|| format!("Failed to export entries to: {:?}", cli.output))?;

    for path in &report.written {
        status!("Wrote {path:?}");
    }

    for (path, e) in &report.decompile_failures {
        warning!("Failed to decompile {path:?}: {e}");
    }

    Ok(())
}

pub fn dtbo_main(cli: &DtboCli, config: &Config) -> Result<()> {
    match &cli.command {
        DtboCommand::Info(c) => info_subcommand(c),
        DtboCommand::Unpack(c) => unpack_subcommand(c, config),
    }
}

/// Display the DTBO header and entry table.
#[derive(Debug, Parser)]
struct InfoCli {
    /// Path to input DTBO image.
    #[arg(short, long, value_name = "FILE", value_parser)]
    input: PathBuf,
}

/// Split a DTBO image into one device tree blob per entry.
///
/// Previously exported blobs in the output directory are removed first.
#[derive(Debug, Parser)]
struct UnpackCli {
    /// Path to input DTBO image.
    #[arg(short, long, value_name = "FILE", value_parser)]
    input: PathBuf,

    /// Path to output directory.
    #[arg(short, long, value_name = "DIR", value_parser)]
    output: PathBuf,

    /// Don't decompile the blobs with dtc.
    #[arg(long)]
    no_decompile: bool,
}

#[derive(Debug, Subcommand)]
enum DtboCommand {
    Info(InfoCli),
    Unpack(UnpackCli),
}

/// Inspect or unpack device tree overlay images.
#[derive(Debug, Parser)]
pub struct DtboCli {
    #[command(subcommand)]
    command: DtboCommand,
}
