// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Classification of text collected from a device, such as the output of
//! `fastboot getvar all` or `adb shell getprop`. Free-form output is only
//! trusted when every matching line agrees. Anything else is unknown.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::util;

pub const SIGNALS_FILE_NAME: &str = "signals.toml";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read signal source: {0:?}")]
    Read(PathBuf, #[source] io::Error),
    #[error("Failed to write signals: {0:?}")]
    Write(PathBuf, #[source] io::Error),
    #[error("Failed to serialize signals")]
    Serialize(#[from] toml_edit::ser::Error),
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Locked,
    Unlocked,
    /// No evidence or contradictory evidence.
    Unknown,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => f.write_str("locked"),
            Self::Unlocked => f.write_str("unlocked"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Signals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootloader: Option<LockState>,
    /// `green`, `yellow`, `orange` or `red` when every source agrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_boot_state: Option<String>,
    /// Every line that contributed to the classification.
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub sources: Vec<PathBuf>,
}

impl Signals {
    pub fn lock_state(&self) -> LockState {
        self.bootloader.unwrap_or(LockState::Unknown)
    }
}

/// Split a `[key]: [value]` (getprop), `key=value` (build.prop) or
/// `(bootloader) key: value` (fastboot) line.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    let line = line.strip_prefix("(bootloader)").unwrap_or(line).trim_start();

    if let Some(rest) = line.strip_prefix('[') {
        let (key, value) = rest.split_once("]:")?;
        let value = value.trim().strip_prefix('[')?.strip_suffix(']')?;
        return Some((key.trim(), value.trim()));
    }

    let (key, value) = match (line.find('='), line.find(':')) {
        (Some(e), Some(c)) if c < e => line.split_at(c),
        (Some(e), _) => line.split_at(e),
        (None, Some(c)) => line.split_at(c),
        (None, None) => return None,
    };

    Some((key.trim(), value[1..].trim()))
}

fn lock_vote(key: &str, value: &str) -> Option<LockState> {
    let value = value.to_ascii_lowercase();

    match (key, value.as_str()) {
        ("unlocked", "yes") | ("ro.boot.flash.locked", "0") => Some(LockState::Unlocked),
        ("unlocked", "no") | ("ro.boot.flash.locked", "1") => Some(LockState::Locked),
        ("ro.boot.vbmeta.device_state", "unlocked") => Some(LockState::Unlocked),
        ("ro.boot.vbmeta.device_state", "locked") => Some(LockState::Locked),
        _ => None,
    }
}

/// Classify the combined text of every source.
pub fn classify<'a>(texts: impl IntoIterator<Item = &'a str>) -> Signals {
    let mut votes = BTreeSet::new();
    let mut states = BTreeSet::new();
    let mut evidence = vec![];

    for text in texts {
        for line in text.lines() {
            let Some((key, value)) = parse_line(line) else {
                continue;
            };

            if let Some(vote) = lock_vote(key, value) {
                votes.insert(vote);
                evidence.push(line.trim().to_owned());
            } else if key == "ro.boot.verifiedbootstate" && !value.is_empty() {
                states.insert(value.to_ascii_lowercase());
                evidence.push(line.trim().to_owned());
            }
        }
    }

    let bootloader = match votes.len() {
        0 => None,
        1 => votes.into_iter().next(),
        _ => Some(LockState::Unknown),
    };

    let verified_boot_state = if states.len() == 1 {
        states.into_iter().next()
    } else {
        if states.len() > 1 {
            debug!("Conflicting verified boot states: {states:?}");
        }
        None
    };

    Signals {
        bootloader,
        verified_boot_state,
        evidence,
        sources: vec![],
    }
}

/// Copy each source into `dir`, classify them, and write
/// [`SIGNALS_FILE_NAME`]. `dir` is cleared first.
pub fn collect(sources: &[PathBuf], dir: &Path) -> Result<Signals> {
    util::recreate_dir(dir).map_err(|e| Error::Write(dir.to_owned(), e))?;

    let mut texts = vec![];
    let mut copies = vec![];
    let mut names = BTreeMap::<String, usize>::new();

    for source in sources {
        let data = fs::read(source).map_err(|e| Error::Read(source.clone(), e))?;

        let base = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "signal.txt".to_owned());
        let count = names.entry(base.clone()).or_default();
        let name = if *count == 0 {
            base
        } else {
            format!("{count}_{base}")
        };
        *count += 1;

        let target = dir.join(&name);
        fs::write(&target, &data).map_err(|e| Error::Write(target.clone(), e))?;

        texts.push(String::from_utf8_lossy(&data).into_owned());
        copies.push(target);
    }

    let mut signals = classify(texts.iter().map(|t| t.as_str()));
    signals.sources = copies;

    let path = dir.join(SIGNALS_FILE_NAME);
    let data = toml_edit::ser::to_string_pretty(&signals)?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| Error::Write(path.clone(), e))?;
    temp.write_all(data.as_bytes())
        .map_err(|e| Error::Write(path.clone(), e))?;
    temp.persist(&path)
        .map_err(|e| Error::Write(path.clone(), e.error))?;

    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_formats() {
        assert_eq!(
            parse_line("[ro.boot.flash.locked]: [1]"),
            Some(("ro.boot.flash.locked", "1")),
        );
        assert_eq!(
            parse_line("(bootloader) unlocked:yes"),
            Some(("unlocked", "yes")),
        );
        assert_eq!(
            parse_line("ro.boot.verifiedbootstate=orange"),
            Some(("ro.boot.verifiedbootstate", "orange")),
        );
        assert_eq!(parse_line("no separator"), None);
    }
}
