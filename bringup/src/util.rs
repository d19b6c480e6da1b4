/*
 * SPDX-FileCopyrightText: 2023 Andrew Gunnerson
 * SPDX-License-Identifier: GPL-3.0-only
 */

use std::{
    fmt,
    fs,
    io,
    ops::{Bound, RangeBounds},
    path::Path,
};

use num_traits::PrimInt;
use thiserror::Error;

pub const ZEROS: [u8; 16384] = [0u8; 16384];

#[derive(Debug, Error)]
#[error("{value} not in range {start:?}..{end:?}")]
pub struct OutOfBoundsError {
    pub value: String,
    pub start: Bound<String>,
    pub end: Bound<String>,
}

/// Return `value` if it is contained in `bounds`. Otherwise, return an error
/// describing the violated bounds.
pub fn check_bounds<T, R>(value: T, bounds: R) -> Result<T, OutOfBoundsError>
where
    T: PartialOrd + fmt::Display,
    R: RangeBounds<T>,
{
    if bounds.contains(&value) {
        return Ok(value);
    }

    let to_string = |b: Bound<&T>| match b {
        Bound::Included(v) => Bound::Included(v.to_string()),
        Bound::Excluded(v) => Bound::Excluded(v.to_string()),
        Bound::Unbounded => Bound::Unbounded,
    };

    Err(OutOfBoundsError {
        value: value.to_string(),
        start: to_string(bounds.start_bound()),
        end: to_string(bounds.end_bound()),
    })
}

/// A small wrapper to format a number as a size in bytes.
#[derive(Clone, Copy)]
pub struct NumBytes<T: PrimInt>(pub T);

impl<T: PrimInt + fmt::Debug> fmt::Debug for NumBytes<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == T::one() {
            write!(f, "<{:?} byte>", self.0)
        } else {
            write!(f, "<{:?} bytes>", self.0)
        }
    }
}

/// Check if a byte slice is all zeros.
pub fn is_zero(mut buf: &[u8]) -> bool {
    while !buf.is_empty() {
        let n = buf.len().min(ZEROS.len());
        if buf[..n] != ZEROS[..n] {
            return false;
        }

        buf = &buf[n..];
    }

    true
}

/// Get the non-empty parent of a path. If the path has no parent in the string,
/// then `.` is returned. This does not perform any filesystem operations.
pub fn parent_path(path: &Path) -> &Path {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            return parent;
        }
    }

    Path::new(".")
}

/// Remove a directory tree if it exists and recreate it empty. Used by every
/// step that owns an output directory so that reruns never mix old and new
/// results.
pub fn recreate_dir(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    fs::create_dir_all(path)
}

/// Get the size of a file, treating a missing file as empty.
pub fn file_size_or_zero(path: &Path) -> io::Result<u64> {
    match fs::metadata(path) {
        Ok(m) => Ok(m.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}
