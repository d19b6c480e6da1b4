// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Normalizes partition images to raw form. Sparse images are decoded once
//! into a cache file and reused by later runs.

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::atomic::AtomicBool,
};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    artifact::{ArtifactHandle, DetectedFormat},
    format::sparse::{self, CrcMode},
    tool::{self, Simg2img},
    util,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to decode sparse image")]
    Sparse(#[from] sparse::Error),
    #[error("External sparse decoder failed")]
    Tool(#[from] tool::Error),
    #[error("Converted image is empty: {0:?}")]
    EmptyOutput(PathBuf),
    #[error("I/O error: {0:?}")]
    File(PathBuf, #[source] io::Error),
}

type Result<T> = std::result::Result<T, Error>;

/// Turns an Android sparse image into a raw image. `output` is created or
/// truncated by the decoder.
pub trait SparseDecoder {
    fn sparse_to_raw(&self, input: &Path, output: &Path, cancel_signal: &AtomicBool)
    -> Result<()>;
}

/// In-process decoder built on [`sparse::unsparse`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeSparseDecoder;

impl SparseDecoder for NativeSparseDecoder {
    fn sparse_to_raw(
        &self,
        input: &Path,
        output: &Path,
        cancel_signal: &AtomicBool,
    ) -> Result<()> {
        let reader = File::open(input)
            .map(BufReader::new)
            .map_err(|e| Error::File(input.to_owned(), e))?;
        let file = File::create(output).map_err(|e| Error::File(output.to_owned(), e))?;

        let mut writer = BufWriter::new(file);
        let header = sparse::unsparse(reader, &mut writer, CrcMode::Validate, cancel_signal)?;

        writer
            .flush()
            .map_err(|e| Error::File(output.to_owned(), e))?;
        let file = writer
            .into_inner()
            .map_err(|e| Error::File(output.to_owned(), e.into_error()))?;

        // Trailing holes are only seeked over.
        file.set_len(header.raw_size())
            .map_err(|e| Error::File(output.to_owned(), e))?;

        Ok(())
    }
}

impl SparseDecoder for Simg2img {
    fn sparse_to_raw(&self, input: &Path, output: &Path, _: &AtomicBool) -> Result<()> {
        self.convert(input, output)?;

        Ok(())
    }
}

/// Return a raw version of `handle`. Non-sparse handles are returned as is.
/// Sparse handles are decoded into `cache_path` unless a non-empty file is
/// already there. The output is written to a temporary file next to
/// `cache_path` and only moved into place once complete.
pub fn ensure_raw(
    handle: &ArtifactHandle,
    cache_path: &Path,
    decoder: &dyn SparseDecoder,
    cancel_signal: &AtomicBool,
) -> Result<ArtifactHandle> {
    if handle.detected_format != DetectedFormat::SparseImage {
        return Ok(handle.clone());
    }

    let cached_size =
        util::file_size_or_zero(cache_path).map_err(|e| Error::File(cache_path.to_owned(), e))?;

    if cached_size > 0 {
        debug!("Reusing converted image: {cache_path:?}");
        return raw_handle(handle, cache_path, cached_size);
    }

    info!("Converting sparse image: {:?} -> {cache_path:?}", handle.path);

    let parent = util::parent_path(cache_path);
    fs::create_dir_all(parent).map_err(|e| Error::File(parent.to_owned(), e))?;

    let temp = NamedTempFile::new_in(parent).map_err(|e| Error::File(parent.to_owned(), e))?;

    decoder.sparse_to_raw(&handle.path, temp.path(), cancel_signal)?;

    let size = util::file_size_or_zero(temp.path())
        .map_err(|e| Error::File(temp.path().to_owned(), e))?;
    if size == 0 {
        return Err(Error::EmptyOutput(handle.path.clone()));
    }

    temp.persist(cache_path)
        .map_err(|e| Error::File(cache_path.to_owned(), e.error))?;

    raw_handle(handle, cache_path, size)
}

fn raw_handle(handle: &ArtifactHandle, path: &Path, size: u64) -> Result<ArtifactHandle> {
    Ok(ArtifactHandle {
        kind: handle.kind,
        path: path.to_owned(),
        size,
        detected_format: crate::artifact::sniff(path),
    })
}
