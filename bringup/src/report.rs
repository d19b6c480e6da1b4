// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Per-artifact outcome tracking. Outcomes are derived from what is actually on
//! disk: a path that exists but holds no data is reported separately from a
//! path that does not exist at all.

use std::{
    fmt,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::util;

pub const SUMMARY_FILE_NAME: &str = "summary.toml";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to serialize summary")]
    Serialize(#[from] toml_edit::ser::Error),
    #[error("Failed to write summary: {0:?}")]
    Write(PathBuf, #[source] io::Error),
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Found,
    Missing,
    FoundButEmpty,
    Warning(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found => f.write_str("found"),
            Self::Missing => f.write_str("missing"),
            Self::FoundButEmpty => f.write_str("found but empty"),
            Self::Warning(detail) => write!(f, "warning: {detail}"),
        }
    }
}

/// Classify a single path by what exists on disk.
pub fn classify(path: &Path) -> Status {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            // Dangling symlinks exist but have nothing behind them.
            return if path.symlink_metadata().is_ok() {
                Status::FoundButEmpty
            } else {
                Status::Missing
            };
        }
        Err(e) => {
            debug!("Treating unreadable path as missing: {path:?}: {e}");
            return Status::Missing;
        }
    };

    if metadata.is_dir() {
        let has_file = WalkDir::new(path)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .any(|e| e.file_type().is_file());

        if has_file {
            Status::Found
        } else {
            Status::FoundButEmpty
        }
    } else if metadata.len() > 0 {
        Status::Found
    } else {
        Status::FoundButEmpty
    }
}

/// Combine the classes of several paths belonging to one record. Unanimous
/// classes are kept. Any mix becomes a warning naming the paths that were not
/// found with data.
pub fn combine(classes: &[(PathBuf, Status)]) -> Status {
    let Some((_, first)) = classes.first() else {
        return Status::Missing;
    };

    if classes.iter().all(|(_, s)| s == first) {
        return first.clone();
    }

    let incomplete = classes
        .iter()
        .filter(|(_, s)| *s != Status::Found)
        .map(|(p, s)| format!("{p:?} is {s}"))
        .collect::<Vec<_>>();

    Status::Warning(format!("partial result: {}", incomplete.join(", ")))
}

/// The outcome for one named artifact. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionResult {
    pub name: String,
    pub status: Status,
    pub output_paths: Vec<PathBuf>,
    pub detail: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SummaryEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Summary {
    #[serde(default)]
    pub found: Vec<SummaryEntry>,
    #[serde(default)]
    pub missing: Vec<SummaryEntry>,
    #[serde(default)]
    pub warnings: Vec<SummaryEntry>,
}

impl Summary {
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml_edit::ser::to_string_pretty(self)?)
    }

    /// Atomically write the summary as TOML.
    pub fn write(&self, path: &Path) -> Result<()> {
        let data = self.to_toml()?;
        let parent = util::parent_path(path);

        let mut temp = NamedTempFile::new_in(parent).map_err(|e| Error::Write(path.to_owned(), e))?;
        temp.write_all(data.as_bytes())
            .map_err(|e| Error::Write(path.to_owned(), e))?;
        temp.persist(path)
            .map_err(|e| Error::Write(path.to_owned(), e.error))?;

        Ok(())
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections = [
            ("Found", &self.found),
            ("Missing", &self.missing),
            ("Warnings", &self.warnings),
        ];

        for (i, (title, entries)) in sections.into_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }

            writeln!(f, "{title} ({}):", entries.len())?;

            for entry in entries {
                match &entry.detail {
                    Some(d) => writeln!(f, "- {}: {d}", entry.name)?,
                    None => writeln!(f, "- {}", entry.name)?,
                }
            }
        }

        Ok(())
    }
}

/// Collects one [`ExtractionResult`] per name. Recording a name again replaces
/// the earlier result, so a rerun stage never produces duplicates.
#[derive(Debug, Default)]
pub struct Aggregator {
    results: Vec<ExtractionResult>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, result: ExtractionResult) -> ExtractionResult {
        match &result.status {
            Status::Found | Status::Missing => debug!("{}: {}", result.name, result.status),
            s => warn!("{}: {s}", result.name),
        }

        if let Some(existing) = self.results.iter_mut().find(|r| r.name == result.name) {
            *existing = result.clone();
        } else {
            self.results.push(result.clone());
        }

        result
    }

    /// Record `name` by classifying `paths` on disk.
    pub fn record(
        &mut self,
        name: &str,
        paths: impl IntoIterator<Item = PathBuf>,
        detail: Option<String>,
    ) -> ExtractionResult {
        let classes = paths
            .into_iter()
            .map(|p| {
                let status = classify(&p);
                (p, status)
            })
            .collect::<Vec<_>>();

        let status = combine(&classes);

        self.insert(ExtractionResult {
            name: name.to_owned(),
            status,
            output_paths: classes.into_iter().map(|(p, _)| p).collect(),
            detail,
        })
    }

    /// Record `name` with a status decided by the caller.
    pub fn record_status(
        &mut self,
        name: &str,
        status: Status,
        paths: impl IntoIterator<Item = PathBuf>,
        detail: Option<String>,
    ) -> ExtractionResult {
        self.insert(ExtractionResult {
            name: name.to_owned(),
            status,
            output_paths: paths.into_iter().collect(),
            detail,
        })
    }

    pub fn results(&self) -> &[ExtractionResult] {
        &self.results
    }

    pub fn get(&self, name: &str) -> Option<&ExtractionResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Group results by status. Empty results are reported as warnings.
    pub fn summarize(&self) -> Summary {
        let mut summary = Summary::default();

        for result in &self.results {
            let mut entry = SummaryEntry {
                name: result.name.clone(),
                detail: result.detail.clone(),
                paths: result.output_paths.clone(),
            };

            match &result.status {
                Status::Found => summary.found.push(entry),
                Status::Missing => summary.missing.push(entry),
                Status::FoundButEmpty => {
                    entry.detail = Some(match entry.detail {
                        Some(d) => format!("found but empty: {d}"),
                        None => "found but empty".to_owned(),
                    });
                    summary.warnings.push(entry);
                }
                Status::Warning(w) => {
                    entry.detail = Some(match entry.detail {
                        Some(d) => format!("{w}: {d}"),
                        None => w.clone(),
                    });
                    summary.warnings.push(entry);
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_classes_become_warning() {
        let status = combine(&[
            (PathBuf::from("a"), Status::Found),
            (PathBuf::from("b"), Status::Missing),
        ]);
        assert_eq!(
            status,
            Status::Warning("partial result: \"b\" is missing".to_owned()),
        );

        assert_eq!(
            combine(&[
                (PathBuf::from("a"), Status::FoundButEmpty),
                (PathBuf::from("b"), Status::FoundButEmpty),
            ]),
            Status::FoundButEmpty,
        );
        assert_eq!(combine(&[]), Status::Missing);
    }
}
