// SPDX-FileCopyrightText: 2023-2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    env,
    io::{self, IsTerminal},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{Level, debug};

use crate::{
    cli::{boot, dtbo, fs, kernel, locate, run, signals, sparse},
    config::Config,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Subcommand)]
pub enum Command {
    Run(run::RunCli),
    Locate(locate::LocateCli),
    Boot(boot::BootCli),
    Dtbo(dtbo::DtboCli),
    Kernel(kernel::KernelCli),
    Sparse(sparse::SparseCli),
    Fs(fs::FsCli),
    Signals(signals::SignalsCli),
}

#[derive(Debug, Parser)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Lowest log message severity to output.
    #[arg(long, global = true, value_name = "LEVEL", default_value_t, value_enum)]
    pub log_level: LogLevel,

    /// Path to config file.
    ///
    /// Defaults to `bringup.toml` in the current directory if it exists.
    #[arg(short, long, global = true, value_name = "FILE", value_parser)]
    pub config: Option<PathBuf>,
}

fn init_logging(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_max_level(Level::from(level))
        .init();
}

pub fn main(logging_initialized: &AtomicBool, cancel_signal: &Arc<AtomicBool>) -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_level);
    logging_initialized.store(true, Ordering::SeqCst);

    let cwd = env::current_dir().context("Failed to get current directory")?;
    let config = Config::load_or_default(cli.config.as_deref(), &cwd)?;
    debug!("Loaded config: {config:?}");

    match cli.command {
        Command::Run(c) => run::run_main(&c, config, cancel_signal),
        Command::Locate(c) => locate::locate_main(&c, &config),
        Command::Boot(c) => boot::boot_main(&c),
        Command::Dtbo(c) => dtbo::dtbo_main(&c, &config),
        Command::Kernel(c) => kernel::kernel_main(&c, &config),
        Command::Sparse(c) => sparse::sparse_main(&c, &config, cancel_signal),
        Command::Fs(c) => fs::fs_main(&c, &config, cancel_signal),
        Command::Signals(c) => signals::signals_main(&c),
    }
}
