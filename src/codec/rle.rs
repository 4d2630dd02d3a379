//! Run-length encoding of raster rows.
//!
//! A row is a sequence of `(code, run_length - 1)` varint pairs whose run
//! lengths add up to the raster width.

use super::varint::{read_varint, write_varint};
use crate::error::{GridError, Result};

/// Encode a row of entity codes, appending to `out`.
pub fn encode_row(row: &[u32], out: &mut Vec<u8>) {
    let mut x = 0;
    while x < row.len() {
        let first = x;
        let cur = row[x];
        x += 1;
        while x < row.len() && row[x] == cur {
            x += 1;
        }
        write_varint(out, cur);
        write_varint(out, (x - first - 1) as u32);
    }
}

/// Iterator over the `(code, run_length)` pairs of an encoded row.
///
/// Positions are absolute within `buf`, so error offsets point into the
/// backing file when `buf` is the whole mapping.
pub struct Runs<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Runs<'a> {
    pub fn new(buf: &'a [u8], start: usize, end: usize) -> Self {
        Self {
            buf: &buf[..end.min(buf.len())],
            pos: start,
            end,
        }
    }

    fn next_run(&mut self) -> Result<(u32, usize)> {
        let (code, pos) = read_varint(self.buf, self.pos)?;
        let (rep, pos) = read_varint(self.buf, pos)?;
        self.pos = pos;
        Ok((code, rep as usize + 1))
    }
}

impl Iterator for Runs<'_> {
    type Item = Result<(u32, usize)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            return None;
        }
        let run = self.next_run();
        if run.is_err() {
            self.pos = self.end;
        }
        Some(run)
    }
}

/// Code of column `x` in the encoded row `buf[start..end]`.
///
/// Linear scan over the runs; `row` is only used for error reporting.
pub fn code_at(buf: &[u8], start: usize, end: usize, x: usize, row: usize) -> Result<u32> {
    let mut covered = 0;
    for run in Runs::new(buf, start, end) {
        let (code, len) = run?;
        covered += len;
        if x < covered {
            return Ok(code);
        }
    }
    Err(GridError::RowOverrun { row })
}

/// Decode a full row, checking that it spans exactly `width` pixels.
pub fn decode_row(buf: &[u8], width: usize) -> Result<Vec<u32>> {
    let mut row = Vec::with_capacity(width);
    for run in Runs::new(buf, 0, buf.len()) {
        let (code, len) = run?;
        if row.len() + len > width {
            return Err(GridError::Inconsistent {
                detail: format!("row runs exceed width {}", width),
            });
        }
        row.extend(std::iter::repeat(code).take(len));
    }
    if row.len() != width {
        return Err(GridError::Inconsistent {
            detail: format!("row runs cover {} of {} pixels", row.len(), width),
        });
    }
    Ok(row)
}

/// Re-encode a row through a code mapping, without expanding it.
///
/// `map` must be injective on the codes present, so runs stay maximal.
pub fn recode_row<F>(buf: &[u8], map: F, out: &mut Vec<u8>) -> Result<()>
where
    F: Fn(u32) -> u32,
{
    for run in Runs::new(buf, 0, buf.len()) {
        let (code, len) = run?;
        write_varint(out, map(code));
        write_varint(out, (len - 1) as u32);
    }
    Ok(())
}
