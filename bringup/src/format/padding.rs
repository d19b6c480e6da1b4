// SPDX-FileCopyrightText: 2023-2024 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::io::{self, Read, Seek};

use num_traits::PrimInt;

use crate::stream::ReadDiscardExt;

/// Calculate the amount of padding that needs to be added to align the
/// specified offset to a page boundary.
pub fn calc<N: PrimInt>(offset: N, page_size: N) -> N {
    let r = offset % page_size;
    if r == N::zero() {
        N::zero()
    } else {
        page_size - r
    }
}

/// Round to the next multiple of the page size.
pub fn round<N: PrimInt>(offset: N, page_size: N) -> Option<N> {
    let remain = calc(offset, page_size);
    offset.checked_add(&remain)
}

/// Read and discard data until the next multiple of the page size. [`Seek`] is
/// only used for querying the file position.
pub fn read_discard(mut reader: impl Read + Seek, page_size: u64) -> io::Result<u64> {
    let pos = reader.stream_position()?;
    let padding = calc(pos, page_size);

    reader.read_discard_exact(padding)?;

    Ok(padding)
}

/// Trim trailing NUL padding from a fixed-size string field.
pub fn trim_end_padding(buf: &[u8]) -> &[u8] {
    let end = buf.iter().rposition(|b| *b != 0).map_or(0, |pos| pos + 1);

    &buf[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_alignment() {
        assert_eq!(calc(0u32, 4096), 0);
        assert_eq!(calc(1u32, 4096), 4095);
        assert_eq!(round(4097u64, 4096), Some(8192));
        assert_eq!(round(u32::MAX, 4096), None);
    }

    #[test]
    fn trim_padding() {
        assert_eq!(trim_end_padding(b"abc\0\0"), b"abc");
        assert_eq!(trim_end_padding(b"a\0c\0"), b"a\0c");
        assert_eq!(trim_end_padding(b"\0\0"), b"");
    }
}
