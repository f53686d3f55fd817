//! Growable binary buffer writer.

use crate::{check_width, BufferError, Endian};

/// Writes binary data into an auto-growing buffer.
///
/// # Example
///
/// ```
/// use stackcast_buffers::{Endian, Writer};
///
/// let mut writer = Writer::new(Endian::Big);
/// writer.uint(1, 4).unwrap();
/// assert_eq!(writer.flush(), vec![0, 0, 0, 1]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Writer {
    uint8: Vec<u8>,
    endian: Endian,
}

impl Writer {
    pub fn new(endian: Endian) -> Self {
        Self {
            uint8: Vec::new(),
            endian,
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.uint8.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uint8.is_empty()
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub fn u8(&mut self, val: u8) {
        self.uint8.push(val);
    }

    /// Writes the low `width` bytes (1..=8) of `val` in the writer's byte
    /// order. Other widths fail with [`BufferError::InvalidWidth`] and
    /// write nothing.
    pub fn uint(&mut self, val: u64, width: usize) -> Result<(), BufferError> {
        check_width(self.uint8.len(), width)?;
        self.put(val, width);
        Ok(())
    }

    /// Writes `val` as two's-complement bits.
    pub fn int(&mut self, val: i64, width: usize) -> Result<(), BufferError> {
        self.uint(val as u64, width)
    }

    pub fn f32(&mut self, val: f32) {
        self.put(u64::from(val.to_bits()), 4);
    }

    pub fn f64(&mut self, val: f64) {
        self.put(val.to_bits(), 8);
    }

    fn put(&mut self, val: u64, width: usize) {
        match self.endian {
            Endian::Big => {
                let bytes = val.to_be_bytes();
                self.uint8.extend_from_slice(&bytes[8 - width..]);
            }
            Endian::Little => {
                let bytes = val.to_le_bytes();
                self.uint8.extend_from_slice(&bytes[..width]);
            }
        }
    }

    pub fn buf(&mut self, data: &[u8]) {
        self.uint8.extend_from_slice(data);
    }

    /// Consumes the writer and returns the written bytes.
    pub fn flush(self) -> Vec<u8> {
        self.uint8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reader;
    use proptest::prelude::*;

    #[test]
    fn writes_big_endian_by_default() {
        let mut writer = Writer::default();
        writer.uint(0x0102, 2).unwrap();
        writer.int(-1, 3).unwrap();
        assert_eq!(writer.flush(), vec![0x01, 0x02, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn writes_little_endian() {
        let mut writer = Writer::new(Endian::Little);
        writer.uint(0x01020304, 4).unwrap();
        assert_eq!(writer.flush(), vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn rejects_widths_outside_one_to_eight() {
        let mut writer = Writer::default();
        writer.u8(1);
        for width in [0, 9, 32] {
            assert_eq!(
                writer.uint(7, width),
                Err(BufferError::InvalidWidth { offset: 1, width })
            );
        }
        assert_eq!(writer.flush(), vec![1]);
    }

    proptest! {
        #[test]
        fn int_round_trips_through_reader(val in any::<i32>(), little in any::<bool>()) {
            let endian = if little { Endian::Little } else { Endian::Big };
            let mut writer = Writer::new(endian);
            writer.int(i64::from(val), 4).unwrap();
            let data = writer.flush();
            let mut reader = Reader::new(&data, endian);
            prop_assert_eq!(reader.int(4).unwrap(), i64::from(val));
        }
    }
}
