//! Unsigned LEB128 varints for 32-bit values.

use crate::error::{GridError, Result};

/// Longest encoding of a `u32`.
pub const MAX_VARINT_LEN: usize = 5;

/// Append `value`, 7 bits per byte, low bits first. Every byte but the last
/// has the high bit set.
pub fn write_varint(buf: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Read a varint starting at `pos`. Returns the value and the position after it.
///
/// Fails on truncation and on encodings that do not fit 32 bits.
pub fn read_varint(buf: &[u8], pos: usize) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_LEN {
        let p = pos + i;
        let byte = *buf.get(p).ok_or(GridError::Truncated {
            needed: p + 1,
            len: buf.len(),
        })?;
        let payload = u32::from(byte & 0x7F);
        if i == MAX_VARINT_LEN - 1 && (byte & 0x80 != 0 || payload > 0x0F) {
            return Err(GridError::VarintOverflow { offset: pos });
        }
        value |= payload << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, p + 1));
        }
    }
    Err(GridError::VarintOverflow { offset: pos })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encodings() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 0);
        write_varint(&mut buf, 127);
        write_varint(&mut buf, 128);
        write_varint(&mut buf, 300);
        assert_eq!(buf, vec![0x00, 0x7F, 0x80, 0x01, 0xAC, 0x02]);
    }

    #[test]
    fn test_round_trip_boundaries() {
        let values = [
            0u32,
            1,
            0x7F,
            0x80,
            0x3FFF,
            0x4000,
            0x1F_FFFF,
            0x20_0000,
            0x0FFF_FFFF,
            0x1000_0000,
            u32::MAX - 1,
            u32::MAX,
        ];
        let mut buf = Vec::new();
        for &v in &values {
            let start = buf.len();
            write_varint(&mut buf, v);
            assert!(buf.len() - start <= MAX_VARINT_LEN);
        }
        // 0, 1 and 0x7F take one byte each, u32::MAX takes five.
        assert_eq!(buf[..3], [0x00, 0x01, 0x7F]);
        assert_eq!(buf[buf.len() - 5..], [0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        let mut pos = 0;
        for &v in &values {
            let (got, next) = read_varint(&buf, pos).unwrap();
            assert_eq!(got, v);
            pos = next;
        }
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn test_truncated() {
        let err = read_varint(&[0x80, 0x80], 0).unwrap_err();
        assert!(matches!(err, GridError::Truncated { .. }));
        assert!(matches!(read_varint(&[], 0), Err(GridError::Truncated { .. })));
    }

    #[test]
    fn test_overlong() {
        let err = read_varint(&[0xFF, 0xFF, 0xFF, 0xFF, 0x80, 0x01], 0).unwrap_err();
        assert!(matches!(err, GridError::VarintOverflow { offset: 0 }));
        // Fifth byte carrying more than 4 payload bits.
        let err = read_varint(&[0xFF, 0xFF, 0xFF, 0xFF, 0x1F], 0).unwrap_err();
        assert!(matches!(err, GridError::VarintOverflow { .. }));
    }
}
