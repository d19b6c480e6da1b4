// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::{
    cli::{status, warning},
    signals::{self, LockState},
};

pub fn signals_main(cli: &SignalsCli) -> Result<()> {
    let signals = signals::collect(&cli.input, &cli.output)
        .with_context(|| format!("Failed to collect signals into: {:?}", cli.output))?;

    match signals.lock_state() {
        LockState::Unknown => warning!("Bootloader lock state: unknown"),
        state => status!("Bootloader lock state: {state}"),
    }

    match &signals.verified_boot_state {
        Some(state) => status!("Verified boot state: {state}"),
        None => warning!("Verified boot state: unknown"),
    }

    Ok(())
}

/// Classify text collected from a device.
///
/// Inputs are typically the output of `fastboot getvar all` or
/// `adb shell getprop`. They are copied into the output directory along with
/// the classification in `signals.toml`.
#[derive(Debug, Parser)]
pub struct SignalsCli {
    /// Path to a collected text file.
    #[arg(short, long, value_name = "FILE", value_parser, required = true)]
    input: Vec<PathBuf>,

    /// Path to output directory. Cleared first.
    #[arg(short, long, value_name = "DIR", value_parser)]
    output: PathBuf,
}
