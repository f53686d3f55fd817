//! Binary buffer utilities for stackcast drivers.
//!
//! # Overview
//!
//! - [`Reader`] - Reads binary data from a byte slice with cursor tracking.
//!   Every read is bounds-checked and reports the offset it failed at.
//! - [`Writer`] - Writes binary data to an auto-growing buffer.
//! - [`Endian`] - Byte order used by the multi-byte integer and float methods.
//!
//! # Example
//!
//! ```
//! use stackcast_buffers::{Endian, Reader, Writer};
//!
//! let mut writer = Writer::new(Endian::Big);
//! writer.u8(0x01);
//! writer.uint(0x0203, 2).unwrap();
//! writer.buf(b"hello");
//! let data = writer.flush();
//!
//! let mut reader = Reader::new(&data, Endian::Big);
//! assert_eq!(reader.u8().unwrap(), 0x01);
//! assert_eq!(reader.uint(2).unwrap(), 0x0203);
//! assert_eq!(reader.utf8(5).unwrap(), "hello");
//! ```

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

use thiserror::Error;

fn check_width(offset: usize, width: usize) -> Result<(), BufferError> {
    if (1..=8).contains(&width) {
        Ok(())
    } else {
        Err(BufferError::InvalidWidth { offset, width })
    }
}

/// Byte order for multi-byte primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Error type for buffer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Attempted to read past the end of the buffer.
    #[error("end of buffer at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    EndOfBuffer {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    /// Invalid UTF-8 sequence.
    #[error("invalid UTF-8 sequence at offset {offset}")]
    InvalidUtf8 { offset: usize },
    /// Integer width outside `1..=8` bytes.
    #[error("invalid integer width {width} at offset {offset}")]
    InvalidWidth { offset: usize, width: usize },
}

impl BufferError {
    /// Byte offset the failing read started at.
    pub fn offset(&self) -> usize {
        match self {
            Self::EndOfBuffer { offset, .. }
            | Self::InvalidUtf8 { offset }
            | Self::InvalidWidth { offset, .. } => *offset,
        }
    }
}
