//! Container file layout.
//!
//! ```text
//! magic        u32
//! width        u32
//! height       u32
//! xcover       f32
//! ycover       f32
//! xshift       f32
//! yshift       f32
//! numentries   u32            (including the background code 0)
//! row offsets  u32 * height
//! meta offsets u32 * (numentries + 1), the last one equals the file size
//! row blobs    RLE rows, in row order
//! meta blobs   UTF-8 metadata chains, in code order
//! ```
//!
//! All integers and floats are big-endian; offsets are absolute.

use std::io::Write;
use std::ops::Deref;

use crate::error::{GridError, Result};
use crate::viewport::Viewport;

/// Format identifier and version.
pub const MAGIC: u32 = 0x6e06_e001;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Decoded fixed-size header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub xcover: f32,
    pub ycover: f32,
    pub xshift: f32,
    pub yshift: f32,
    pub numentries: u32,
}

impl Header {
    pub fn for_viewport(viewport: &Viewport, numentries: u32) -> Self {
        Self {
            width: viewport.width as u32,
            height: viewport.height as u32,
            xcover: viewport.xcover as f32,
            ycover: viewport.ycover as f32,
            xshift: viewport.xshift as f32,
            yshift: viewport.yshift as f32,
            numentries,
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::from_header(
            self.width as usize,
            self.height as usize,
            self.xcover,
            self.ycover,
            self.xshift,
            self.yshift,
        )
    }

    /// Start of the row blobs, right after both offset tables.
    pub fn data_start(&self) -> usize {
        HEADER_SIZE + 4 * (self.height as usize + self.numentries as usize + 1)
    }

    /// Position of the row offset table entry for row `y`.
    fn row_slot(&self, y: usize) -> usize {
        HEADER_SIZE + 4 * y
    }

    /// Position of the metadata offset table entry for code `i`.
    fn meta_slot(&self, i: usize) -> usize {
        HEADER_SIZE + 4 * (self.height as usize + i)
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(GridError::Truncated {
                needed: HEADER_SIZE,
                len: buf.len(),
            });
        }
        let magic = read_u32(buf, 0)?;
        if magic != MAGIC {
            return Err(GridError::BadMagic { found: magic });
        }
        Ok(Self {
            width: read_u32(buf, 4)?,
            height: read_u32(buf, 8)?,
            xcover: read_f32(buf, 12)?,
            ycover: read_f32(buf, 16)?,
            xshift: read_f32(buf, 20)?,
            yshift: read_f32(buf, 24)?,
            numentries: read_u32(buf, 28)?,
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&MAGIC.to_be_bytes())?;
        w.write_all(&self.width.to_be_bytes())?;
        w.write_all(&self.height.to_be_bytes())?;
        w.write_all(&self.xcover.to_be_bytes())?;
        w.write_all(&self.ycover.to_be_bytes())?;
        w.write_all(&self.xshift.to_be_bytes())?;
        w.write_all(&self.yshift.to_be_bytes())?;
        w.write_all(&self.numentries.to_be_bytes())
    }
}

/// Big-endian `u32` at an absolute position.
pub fn read_u32(buf: &[u8], pos: usize) -> Result<u32> {
    let bytes = buf.get(pos..pos + 4).ok_or(GridError::Truncated {
        needed: pos + 4,
        len: buf.len(),
    })?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_f32(buf: &[u8], pos: usize) -> Result<f32> {
    read_u32(buf, pos).map(f32::from_bits)
}

/// Counts bytes passing through a writer.
struct CountingWriter<W> {
    inner: W,
    written: usize,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Write a complete container in a single forward pass.
///
/// All blob lengths are known up front, so both offset tables are emitted
/// before the data they describe. Returns the number of bytes written.
pub fn write_container<W: Write>(
    out: W,
    header: &Header,
    rows: &[Vec<u8>],
    metadata: &[Vec<u8>],
) -> Result<usize> {
    if rows.len() != header.height as usize || metadata.len() != header.numentries as usize {
        return Err(GridError::Inconsistent {
            detail: format!(
                "header declares {} rows and {} entries, got {} and {}",
                header.height,
                header.numentries,
                rows.len(),
                metadata.len()
            ),
        });
    }

    let first = header.data_start();
    let total = first
        + rows.iter().map(Vec::len).sum::<usize>()
        + metadata.iter().map(Vec::len).sum::<usize>();
    if total > u32::MAX as usize {
        return Err(GridError::Inconsistent {
            detail: format!("index of {} bytes exceeds 32-bit offsets", total),
        });
    }

    let mut w = CountingWriter {
        inner: out,
        written: 0,
    };
    header.write_to(&mut w)?;

    let mut pos = first;
    for blob in rows.iter().chain(metadata.iter()) {
        w.write_all(&(pos as u32).to_be_bytes())?;
        pos += blob.len();
    }
    // End of the last metadata blob.
    w.write_all(&(pos as u32).to_be_bytes())?;
    if w.written != first {
        return Err(GridError::Inconsistent {
            detail: format!("expected data at {}, positioned at {}", first, w.written),
        });
    }

    for blob in rows.iter().chain(metadata.iter()) {
        w.write_all(blob)?;
    }
    w.flush()?;
    if w.written != total {
        return Err(GridError::Inconsistent {
            detail: format!("expected {} bytes, wrote {}", total, w.written),
        });
    }
    Ok(total)
}

/// Read-only view of a container held in memory or mapped from disk.
///
/// Reads are stateless: every accessor takes explicit positions, so the
/// backing bytes can be shared freely between readers.
#[derive(Clone)]
pub struct Container<B> {
    bytes: B,
    header: Header,
}

impl<B: Deref<Target = [u8]>> Container<B> {
    /// Parse the header and validate both offset tables.
    pub fn new(bytes: B) -> Result<Self> {
        let header = Header::parse(&bytes)?;
        let container = Self { bytes, header };
        container.validate()?;
        Ok(container)
    }

    fn validate(&self) -> Result<()> {
        let buf: &[u8] = &self.bytes;
        let len = buf.len();
        let h = &self.header;
        if h.numentries == 0 {
            return Err(GridError::Inconsistent {
                detail: "index declares no entries".to_string(),
            });
        }
        let first = h.data_start();
        if first > len {
            return Err(GridError::Truncated { needed: first, len });
        }

        let meta_start = read_u32(buf, h.meta_slot(0))? as usize;
        let mut prev = first;
        for y in 0..h.height as usize {
            let off = read_u32(buf, h.row_slot(y))? as usize;
            if off < prev || off > meta_start {
                return Err(GridError::OffsetOutOfBounds {
                    what: "row",
                    offset: off,
                    len,
                });
            }
            prev = off;
        }
        for i in 0..=h.numentries as usize {
            let off = read_u32(buf, h.meta_slot(i))? as usize;
            if off < prev || off > len {
                return Err(GridError::OffsetOutOfBounds {
                    what: "metadata",
                    offset: off,
                    len,
                });
            }
            prev = off;
        }
        if prev != len {
            return Err(GridError::Truncated { needed: prev, len });
        }
        Ok(())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Byte range of row `y`'s RLE blob.
    pub fn row_range(&self, y: usize) -> Result<(usize, usize)> {
        let buf: &[u8] = &self.bytes;
        let start = read_u32(buf, self.header.row_slot(y))? as usize;
        let end = if y + 1 < self.header.height as usize {
            read_u32(buf, self.header.row_slot(y + 1))?
        } else {
            read_u32(buf, self.header.meta_slot(0))?
        } as usize;
        check_range("row", start, end, buf.len())?;
        Ok((start, end))
    }

    /// Metadata blob of entity code `code`.
    pub fn metadata(&self, code: usize) -> Result<&[u8]> {
        let buf: &[u8] = &self.bytes;
        let start = read_u32(buf, self.header.meta_slot(code))? as usize;
        let end = read_u32(buf, self.header.meta_slot(code + 1))? as usize;
        check_range("metadata", start, end, buf.len())?;
        Ok(&buf[start..end])
    }
}

fn check_range(what: &'static str, start: usize, end: usize, len: usize) -> Result<()> {
    if start > end || end > len {
        return Err(GridError::OffsetOutOfBounds {
            what,
            offset: end.max(start),
            len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::rle::{decode_row, encode_row};

    fn sample() -> (Header, Vec<Vec<u8>>, Vec<Vec<u8>>) {
        let vp = Viewport::new(4.0, 2.0, 0.0, 0.0, 1.0);
        let mut rows = Vec::new();
        for row in [[0u32, 1, 1, 2], [2, 2, 2, 2]] {
            let mut enc = Vec::new();
            encode_row(&row, &mut enc);
            rows.push(enc);
        }
        let metadata = vec![Vec::new(), b"one\0".to_vec(), b"two\0one\0".to_vec()];
        (Header::for_viewport(&vp, 3), rows, metadata)
    }

    fn encoded() -> Vec<u8> {
        let (header, rows, metadata) = sample();
        let mut buf = Vec::new();
        let n = write_container(&mut buf, &header, &rows, &metadata).unwrap();
        assert_eq!(n, buf.len());
        buf
    }

    #[test]
    fn test_layout() {
        let buf = encoded();
        assert_eq!(read_u32(&buf, 0).unwrap(), MAGIC);
        let header = Header::parse(&buf).unwrap();
        assert_eq!(header.width, 4);
        assert_eq!(header.height, 2);
        assert_eq!(header.numentries, 3);
        // Final metadata offset is the file size.
        assert_eq!(read_u32(&buf, HEADER_SIZE + 4 * 5).unwrap() as usize, buf.len());
    }

    #[test]
    fn test_read_back() {
        let container = Container::new(encoded()).unwrap();
        let (start, end) = container.row_range(0).unwrap();
        assert_eq!(
            decode_row(&container.bytes()[start..end], 4).unwrap(),
            vec![0, 1, 1, 2]
        );
        let (start, end) = container.row_range(1).unwrap();
        assert_eq!(decode_row(&container.bytes()[start..end], 4).unwrap(), vec![2; 4]);
        assert!(container.metadata(0).unwrap().is_empty());
        assert_eq!(container.metadata(2).unwrap(), b"two\0one\0");
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = encoded();
        buf[3] = 0x00;
        assert!(matches!(Container::new(buf), Err(GridError::BadMagic { .. })));
    }

    #[test]
    fn test_truncated_file() {
        let buf = encoded();
        let short = buf[..buf.len() - 1].to_vec();
        assert!(Container::new(short).is_err());
        assert!(matches!(
            Container::new(buf[..20].to_vec()),
            Err(GridError::Truncated { .. })
        ));
    }

    #[test]
    fn test_offset_outside_file() {
        let mut buf = encoded();
        // Point row 1 past the end of the file.
        buf[HEADER_SIZE + 4..HEADER_SIZE + 8].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            Container::new(buf),
            Err(GridError::OffsetOutOfBounds { what: "row", .. })
        ));
    }

    #[test]
    fn test_header_mismatch_rejected_by_writer() {
        let (header, rows, _) = sample();
        let err = write_container(Vec::new(), &header, &rows, &[Vec::new()]).unwrap_err();
        assert!(matches!(err, GridError::Inconsistent { .. }));
    }
}
