//! Driver configuration.
//!
//! All option types deserialize with `#[serde(default)]`, so a partial
//! document only overrides what it names. The defaults reproduce the
//! reference binary layout: big-endian, one-byte length prefixes, trailing
//! bytes rejected.

use serde::{Deserialize, Serialize};
use stackcast_buffers::Endian;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

impl From<ByteOrder> for Endian {
    fn from(order: ByteOrder) -> Self {
        match order {
            ByteOrder::Big => Endian::Big,
            ByteOrder::Little => Endian::Little,
        }
    }
}

/// Width of string, byte-string and array length prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthPrefix {
    #[default]
    U8,
    U16,
    U32,
}

impl LengthPrefix {
    pub fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    /// Largest length the prefix can carry.
    pub fn max(self) -> u64 {
        match self {
            Self::U8 => u64::from(u8::MAX),
            Self::U16 => u64::from(u16::MAX),
            Self::U32 => u64::from(u32::MAX),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryOptions {
    pub byte_order: ByteOrder,
    pub length_prefix: LengthPrefix,
    /// Accept input that continues past the last active component.
    pub allow_trailing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    pub pretty: bool,
}

/// Options for the built-in drivers of a [`DriverRegistry`](crate::DriverRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub binary: BinaryOptions,
    pub json: JsonOptions,
}
