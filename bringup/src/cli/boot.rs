// SPDX-FileCopyrightText: 2023-2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::{cli::status, format::bootimage::BootImage, stream::FromReader};

fn read_image(path: &Path) -> Result<BootImage> {
    let reader =
        File::open(path).with_context(|| format!("Failed to open for reading: {path:?}"))?;
    let image = BootImage::from_reader(BufReader::new(reader))
        .with_context(|| format!("Failed to read boot image: {path:?}"))?;

    Ok(image)
}

fn display_info(cli: &BootCli, image: &BootImage) {
    if !cli.quiet {
        if cli.debug {
            println!("{image:#?}");
        } else {
            println!("{image}");
        }
    }
}

fn unpack_subcommand(boot_cli: &BootCli, cli: &UnpackCli) -> Result<()> {
    let image = read_image(&cli.input)?;
    display_info(boot_cli, &image);

    fs::create_dir_all(&cli.output)
        .with_context(|| format!("Failed to create directory: {:?}", cli.output))?;

    let written = image
        .unpack(&cli.output)
        .with_context(|| format!("Failed to unpack boot image to: {:?}", cli.output))?;

    for path in written {
        status!("Wrote {path:?}");
    }

    Ok(())
}

fn info_subcommand(boot_cli: &BootCli, cli: &InfoCli) -> Result<()> {
    let image = read_image(&cli.input)?;
    display_info(boot_cli, &image);

    Ok(())
}

pub fn boot_main(cli: &BootCli) -> Result<()> {
    match &cli.command {
        BootCommand::Unpack(c) => unpack_subcommand(cli, c),
        BootCommand::Info(c) => info_subcommand(cli, c),
    }
}

/// Unpack a boot image.
///
/// Each non-empty component is written to the output directory along with the
/// header fields in `header.toml`.
#[derive(Debug, Parser)]
struct UnpackCli {
    /// Path to input boot image.
    #[arg(short, long, value_name = "FILE", value_parser)]
    input: PathBuf,

    /// Path to output directory.
    #[arg(short, long, value_name = "DIR", value_parser)]
    output: PathBuf,
}

/// Display boot image header information.
#[derive(Debug, Parser)]
struct InfoCli {
    /// Path to input boot image.
    #[arg(short, long, value_name = "FILE", value_parser)]
    input: PathBuf,
}

#[derive(Debug, Subcommand)]
enum BootCommand {
    Unpack(UnpackCli),
    Info(InfoCli),
}

/// Inspect or unpack boot images.
#[derive(Debug, Parser)]
pub struct BootCli {
    #[command(subcommand)]
    command: BootCommand,

    /// Don't print boot image header information.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print boot image header information in debug format.
    #[arg(short, long, global = true)]
    debug: bool,
}
