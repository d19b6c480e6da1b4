// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{path::PathBuf, sync::atomic::AtomicBool};

use anyhow::Result;
use clap::Parser;

use crate::{
    cli::{status, warning},
    config::Config,
    context::{RunContext, SystemTools},
    pipeline::{self, Inputs},
};

pub fn run_main(cli: &RunCli, config: Config, cancel_signal: &AtomicBool) -> Result<()> {
    let system = SystemTools::new(&config);
    let tools = system.tools();

    let inputs = Inputs {
        search_roots: cli.input.clone(),
        signal_sources: cli.signals.clone(),
    };

    let mut ctx = RunContext::new(&cli.output, config, cancel_signal);
    let summary = pipeline::run(&mut ctx, &tools, &inputs)?;

    if !cli.quiet {
        println!("{summary}");
    }

    status!("Summary written to {:?}", ctx.layout.summary());

    if !summary.warnings.is_empty() {
        warning!("{} artifacts need attention", summary.warnings.len());
    }

    Ok(())
}

/// Locate, normalize and extract every supported artifact.
///
/// Results are written below the output directory. Each step replaces its own
/// previous outputs, so the command can be rerun safely.
#[derive(Debug, Parser)]
pub struct RunCli {
    /// Directory containing unpacked firmware images. Earlier directories are
    /// preferred.
    #[arg(short, long, value_name = "DIR", value_parser, required = true)]
    input: Vec<PathBuf>,

    /// Path to output directory.
    #[arg(short, long, value_name = "DIR", value_parser)]
    output: PathBuf,

    /// Text collected from the device (eg. `fastboot getvar all` output).
    #[arg(long, value_name = "FILE", value_parser)]
    signals: Vec<PathBuf>,

    /// Don't print the summary.
    #[arg(short, long)]
    quiet: bool,
}
