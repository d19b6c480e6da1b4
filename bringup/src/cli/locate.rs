// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::{artifact::ArtifactKind, config::Config, locate};

pub fn locate_main(cli: &LocateCli, config: &Config) -> Result<()> {
    let depth = cli.depth.unwrap_or(config.locate_depth);
    let kinds = if cli.kind.is_empty() {
        ArtifactKind::ALL.to_vec()
    } else {
        cli.kind.clone()
    };

    for kind in kinds {
        let handle = locate::locate(kind, &cli.input, depth)
            .with_context(|| format!("Failed to locate {kind}"))?;

        match handle {
            Some(h) => println!("{kind}: {:?} ({} bytes, {:?})", h.path, h.size, h.detected_format),
            None => println!("{kind}: not found"),
        }
    }

    Ok(())
}

/// Find the best candidate file for each artifact kind.
#[derive(Debug, Parser)]
pub struct LocateCli {
    /// Directory to search. Earlier directories are preferred.
    #[arg(short, long, value_name = "DIR", value_parser, required = true)]
    input: Vec<PathBuf>,

    /// Only locate the specified kind.
    #[arg(short, long, value_enum)]
    kind: Vec<ArtifactKind>,

    /// Number of subdirectory levels to search below each input directory.
    #[arg(long, value_name = "LEVELS")]
    depth: Option<usize>,
}
