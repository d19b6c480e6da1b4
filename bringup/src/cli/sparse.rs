// SPDX-FileCopyrightText: 2024-2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fs::File,
    io::BufReader,
    path::PathBuf,
    sync::atomic::AtomicBool,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::{
    cli::status,
    config::Config,
    convert::{NativeSparseDecoder, SparseDecoder},
    format::sparse::{ChunkData, CrcMode, SparseReader},
    stream::ReadDiscardExt,
};

fn unpack_subcommand(cli: &UnpackCli, config: &Config, cancel_signal: &AtomicBool) -> Result<()> {
    let simg2img = config.simg2img();
    let decoder: &dyn SparseDecoder = if cli.external {
        &simg2img
    } else {
        &NativeSparseDecoder
    };

    decoder
        .sparse_to_raw(&cli.input, &cli.output, cancel_signal)
        .with_context(|| format!("Failed to unpack sparse image: {:?}", cli.input))?;

    status!("Wrote {:?}", cli.output);

    Ok(())
}

fn info_subcommand(cli: &InfoCli) -> Result<()> {
    let reader = File::open(&cli.input)
        .map(BufReader::new)
        .with_context(|| format!("Failed to open for reading: {:?}", cli.input))?;
    let mut sparse_reader = SparseReader::new(reader, CrcMode::Ignore)
        .with_context(|| format!("Failed to read sparse header: {:?}", cli.input))?;
    let header = sparse_reader.header();

    println!("{header:#?}");
    println!("Raw size: {}", header.raw_size());

    while let Some(chunk) = sparse_reader
        .next_chunk()
        .with_context(|| format!("Failed to read chunk: {:?}", cli.input))?
    {
        if chunk.data == ChunkData::Data {
            let size = u64::from(chunk.num_blocks) * u64::from(header.block_size);
            sparse_reader
                .read_discard_exact(size)
                .with_context(|| format!("Failed to skip chunk data: {:?}", cli.input))?;
        }

        if cli.chunks {
            println!("{chunk:?}");
        }
    }

    Ok(())
}

pub fn sparse_main(cli: &SparseCli, config: &Config, cancel_signal: &AtomicBool) -> Result<()> {
    match &cli.command {
        SparseCommand::Unpack(c) => unpack_subcommand(c, config, cancel_signal),
        SparseCommand::Info(c) => info_subcommand(c),
    }
}

/// Unpack a sparse image to a raw image.
#[derive(Debug, Parser)]
struct UnpackCli {
    /// Path to input sparse image.
    #[arg(short, long, value_name = "FILE", value_parser)]
    input: PathBuf,

    /// Path to output raw image.
    #[arg(short, long, value_name = "FILE", value_parser)]
    output: PathBuf,

    /// Use simg2img instead of the built-in decoder.
    #[arg(long)]
    external: bool,
}

/// Display sparse image metadata.
#[derive(Debug, Parser)]
struct InfoCli {
    /// Path to input sparse image.
    #[arg(short, long, value_name = "FILE", value_parser)]
    input: PathBuf,

    /// List every chunk.
    #[arg(long)]
    chunks: bool,
}

#[derive(Debug, Subcommand)]
enum SparseCommand {
    Unpack(UnpackCli),
    Info(InfoCli),
}

/// Unpack and inspect sparse images.
#[derive(Debug, Parser)]
pub struct SparseCli {
    #[command(subcommand)]
    command: SparseCommand,
}
