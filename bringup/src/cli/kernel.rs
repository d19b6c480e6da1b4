// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use crate::{
    cli::{status, warning},
    config::Config,
    kernel::{self, IkconfigOutcome},
};

fn read_kernel(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read kernel image: {path:?}"))
}

fn version_subcommand(cli: &VersionCli, config: &Config) -> Result<()> {
    let data = read_kernel(&cli.input)?;

    match kernel::recover_version(&data, config.kernel_options()) {
        Ok(success) => {
            if cli.verbose {
                for attempt in &success.attempts {
                    status!("{attempt}");
                }
            }

            println!("{}", success.value);
        }
        Err(exhausted) => {
            warning!("Kernel version unavailable");
            for attempt in &exhausted.attempts {
                warning!("- {attempt}");
            }
        }
    }

    Ok(())
}

fn config_subcommand(cli: &ConfigCli, config: &Config) -> Result<()> {
    let data = read_kernel(&cli.input)?;

    let (strategy, text) = match kernel::recover_ikconfig(&data, config.kernel_options()) {
        Ok(IkconfigOutcome::Embedded { strategy, config }) => (strategy, config),
        Ok(IkconfigOutcome::NotEmbedded) => bail!("Kernel does not embed its config"),
        Err(e) => bail!("Failed to extract embedded config: {e}"),
    };

    match &cli.output {
        Some(path) => {
            fs::write(path, text.as_bytes())
                .with_context(|| format!("Failed to write config: {path:?}"))?;
            status!("Extracted config via {strategy}: {path:?}");
        }
        None => {
            io::stdout()
                .write_all(text.as_bytes())
                .context("Failed to write config to stdout")?;
        }
    }

    Ok(())
}

pub fn kernel_main(cli: &KernelCli, config: &Config) -> Result<()> {
    match &cli.command {
        KernelCommand::Version(c) => version_subcommand(c, config),
        KernelCommand::Config(c) => config_subcommand(c, config),
    }
}

/// Print the Linux version banner of a kernel image.
///
/// Compressed kernels and kernels with a decompressor stub in front of the
/// payload are supported.
#[derive(Debug, Parser)]
struct VersionCli {
    /// Path to input kernel image.
    #[arg(short, long, value_name = "FILE", value_parser)]
    input: PathBuf,

    /// Show every strategy that was tried.
    #[arg(short, long)]
    verbose: bool,
}

/// Extract the config embedded with CONFIG_IKCONFIG.
#[derive(Debug, Parser)]
struct ConfigCli {
    /// Path to input kernel image.
    #[arg(short, long, value_name = "FILE", value_parser)]
    input: PathBuf,

    /// Path to output config. Written to stdout if not specified.
    #[arg(short, long, value_name = "FILE", value_parser)]
    output: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum KernelCommand {
    Version(VersionCli),
    Config(ConfigCli),
}

/// Inspect kernel images.
#[derive(Debug, Parser)]
pub struct KernelCli {
    #[command(subcommand)]
    command: KernelCommand,
}
