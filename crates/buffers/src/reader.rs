//! Binary buffer reader with cursor tracking.

use std::str;

use crate::{check_width, BufferError, Endian};

/// A binary buffer reader over a byte slice.
///
/// The reader keeps a cursor `x` and never reads past `end`. Reads that
/// would overrun return [`BufferError::EndOfBuffer`] and leave the cursor
/// untouched.
///
/// # Example
///
/// ```
/// use stackcast_buffers::{Endian, Reader};
///
/// let data = [0x01, 0x02, 0x03, 0x04];
/// let mut reader = Reader::new(&data, Endian::Big);
///
/// assert_eq!(reader.u8().unwrap(), 0x01);
/// assert_eq!(reader.uint(2).unwrap(), 0x0203);
/// assert!(reader.uint(2).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    uint8: &'a [u8],
    /// Current cursor position.
    x: usize,
    endian: Endian,
}

impl<'a> Reader<'a> {
    pub fn new(uint8: &'a [u8], endian: Endian) -> Self {
        Self {
            uint8,
            x: 0,
            endian,
        }
    }

    /// Current cursor position, i.e. the number of bytes consumed.
    pub fn offset(&self) -> usize {
        self.x
    }

    /// Returns the number of remaining bytes.
    pub fn size(&self) -> usize {
        self.uint8.len() - self.x
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    fn ensure(&self, needed: usize) -> Result<(), BufferError> {
        if needed > self.size() {
            return Err(BufferError::EndOfBuffer {
                offset: self.x,
                needed,
                remaining: self.size(),
            });
        }
        Ok(())
    }

    /// Returns a subarray of the given size and advances the cursor.
    pub fn buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        self.ensure(size)?;
        let x = self.x;
        self.x += size;
        Ok(&self.uint8[x..x + size])
    }

    /// Reads an unsigned 8-bit integer.
    #[inline]
    pub fn u8(&mut self) -> Result<u8, BufferError> {
        self.ensure(1)?;
        let val = self.uint8[self.x];
        self.x += 1;
        Ok(val)
    }

    /// Reads an unsigned integer of `width` bytes (1..=8) in the reader's
    /// byte order. Other widths fail with [`BufferError::InvalidWidth`].
    pub fn uint(&mut self, width: usize) -> Result<u64, BufferError> {
        check_width(self.x, width)?;
        let bytes = self.buf(width)?;
        let mut val: u64 = 0;
        match self.endian {
            Endian::Big => {
                for b in bytes {
                    val = (val << 8) | u64::from(*b);
                }
            }
            Endian::Little => {
                for b in bytes.iter().rev() {
                    val = (val << 8) | u64::from(*b);
                }
            }
        }
        Ok(val)
    }

    /// Reads a two's-complement signed integer of `width` bytes (1..=8),
    /// sign-extending it to 64 bits.
    pub fn int(&mut self, width: usize) -> Result<i64, BufferError> {
        let raw = self.uint(width)?;
        let shift = 64 - (width as u32) * 8;
        Ok(((raw << shift) as i64) >> shift)
    }

    pub fn f32(&mut self) -> Result<f32, BufferError> {
        Ok(f32::from_bits(self.uint(4)? as u32))
    }

    pub fn f64(&mut self) -> Result<f64, BufferError> {
        Ok(f64::from_bits(self.uint(8)?))
    }

    /// Reads a UTF-8 string of the given byte length.
    pub fn utf8(&mut self, size: usize) -> Result<&'a str, BufferError> {
        let offset = self.x;
        let bytes = self.buf(size)?;
        str::from_utf8(bytes).map_err(|_| {
            self.x = offset;
            BufferError::InvalidUtf8 { offset }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = Reader::new(&data, Endian::Big);
        assert_eq!(reader.u8().unwrap(), 0x01);
        assert_eq!(reader.u8().unwrap(), 0x02);
        assert_eq!(reader.u8().unwrap(), 0x03);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_uint_big_and_little() {
        let data = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(Reader::new(&data, Endian::Big).uint(4).unwrap(), 0x01020304);
        assert_eq!(
            Reader::new(&data, Endian::Little).uint(4).unwrap(),
            0x04030201
        );
    }

    #[test]
    fn test_int_sign_extends() {
        let data = [0xff, 0xff, 0xff];
        assert_eq!(Reader::new(&data, Endian::Big).int(3).unwrap(), -1);
        let data = [0x80];
        assert_eq!(Reader::new(&data, Endian::Big).int(1).unwrap(), -128);
        let data = [0x7f, 0xff];
        assert_eq!(Reader::new(&data, Endian::Big).int(2).unwrap(), 32767);
    }

    #[test]
    fn test_end_of_buffer_reports_offset() {
        let data = [0x00, 0x01, 0x02];
        let mut reader = Reader::new(&data, Endian::Big);
        reader.u8().unwrap();
        let err = reader.uint(4).unwrap_err();
        assert_eq!(
            err,
            BufferError::EndOfBuffer {
                offset: 1,
                needed: 4,
                remaining: 2
            }
        );
        // failed read does not move the cursor
        assert_eq!(reader.offset(), 1);
    }

    #[test]
    fn test_invalid_width() {
        let data = [0u8; 16];
        let mut reader = Reader::new(&data, Endian::Big);
        for width in [0, 9, 16] {
            assert_eq!(
                reader.uint(width).unwrap_err(),
                BufferError::InvalidWidth { offset: 0, width }
            );
            assert!(reader.int(width).is_err());
        }
        assert_eq!(reader.offset(), 0);
    }

    #[test]
    fn test_utf8() {
        let data = b"hello world";
        let mut reader = Reader::new(data, Endian::Big);
        assert_eq!(reader.utf8(5).unwrap(), "hello");
        assert_eq!(reader.utf8(6).unwrap(), " world");
    }

    #[test]
    fn test_invalid_utf8() {
        let data = [0xff, 0xfe];
        let mut reader = Reader::new(&data, Endian::Big);
        assert_eq!(
            reader.utf8(2).unwrap_err(),
            BufferError::InvalidUtf8 { offset: 0 }
        );
        assert_eq!(reader.offset(), 0);
    }

    #[test]
    fn test_floats() {
        let data = 1.5f64.to_be_bytes();
        assert_eq!(Reader::new(&data, Endian::Big).f64().unwrap(), 1.5);
        let data = 2.25f32.to_le_bytes();
        assert_eq!(Reader::new(&data, Endian::Little).f32().unwrap(), 2.25);
    }
}
