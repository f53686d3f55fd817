//! Fixed-layout binary driver.
//!
//! Layout with default [`BinaryOptions`]:
//!
//! - integers: their declared width, big-endian two's complement;
//! - bool, char: one byte;
//! - str, bytes: length prefix (UTF-8 byte count) followed by the raw bytes;
//! - optional: `0x00` absent, `0x01` followed by the value;
//! - array: count prefix followed by the elements;
//! - records: the active components back to back, no framing.

use stackcast_buffers::{Reader, Writer};

use super::{decode_components, encode_bound, Artifact, ArtifactKind, Bound, Decoder, Driver, Encoder};
use crate::component::Component;
use crate::config::{BinaryOptions, LengthPrefix};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::serializer::{FloatWidth, IntWidth, Serializer};
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct BinaryDriver {
    options: BinaryOptions,
}

impl BinaryDriver {
    pub const NAME: &'static str = "binary";

    pub fn new(options: BinaryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BinaryOptions {
        &self.options
    }

    fn encoder(&self) -> BinaryEncoder {
        BinaryEncoder {
            writer: Writer::new(self.options.byte_order.into()),
            prefix: self.options.length_prefix,
        }
    }

    fn decoder<'a>(&self, bytes: &'a [u8]) -> BinaryDecoder<'a> {
        BinaryDecoder {
            reader: Reader::new(bytes, self.options.byte_order.into()),
            prefix: self.options.length_prefix,
        }
    }

    /// Encodes a single value of `serializer`.
    pub fn encode_value(&self, serializer: &Serializer, value: &Value, ctx: &Context) -> Result<Vec<u8>> {
        let mut enc = self.encoder();
        serializer.encode(value, ctx, &mut enc)?;
        Ok(enc.writer.flush())
    }

    /// Decodes a single value of `serializer` from the front of `bytes`,
    /// returning it with the number of bytes consumed.
    pub fn decode_value(&self, serializer: &Serializer, bytes: &[u8], ctx: &Context) -> Result<(Value, usize)> {
        let mut dec = self.decoder(bytes);
        let value = serializer.decode(ctx, &mut dec)?;
        Ok((value, dec.reader.offset()))
    }
}

impl Driver for BinaryDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn artifact_kind(&self) -> ArtifactKind {
        ArtifactKind::Bytes
    }

    fn encode(&self, bound: &[Bound<'_>], ctx: &Context) -> Result<Artifact> {
        let mut enc = self.encoder();
        encode_bound(bound, ctx, &mut enc)?;
        let bytes = enc.writer.flush();
        tracing::debug!(
            target: "stackcast::driver::binary",
            version = ctx.version(),
            components = bound.len(),
            len = bytes.len(),
            "encoded"
        );
        Ok(Artifact::Bytes(bytes))
    }

    fn decode(&self, components: &[&Component], artifact: &Artifact, ctx: &Context) -> Result<Vec<Value>> {
        let bytes = artifact
            .as_bytes()
            .ok_or_else(|| artifact.mismatch(Self::NAME, ArtifactKind::Bytes))?;
        let mut dec = self.decoder(bytes);
        let values = decode_components(components, ctx, &mut dec)?;
        if !self.options.allow_trailing && !dec.reader.is_empty() {
            return Err(Error::malformed(
                dec.reader.offset(),
                format!("{} trailing bytes", dec.reader.size()),
            ));
        }
        tracing::debug!(
            target: "stackcast::driver::binary",
            version = ctx.version(),
            components = components.len(),
            len = bytes.len(),
            "decoded"
        );
        Ok(values)
    }
}

struct BinaryEncoder {
    writer: Writer,
    prefix: LengthPrefix,
}

impl BinaryEncoder {
    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = len as u64;
        if len > self.prefix.max() {
            return Err(Error::range(format!("{:?} length prefix", self.prefix), len));
        }
        Ok(self.writer.uint(len, self.prefix.bytes())?)
    }
}

impl Encoder for BinaryEncoder {
    fn begin_record(&mut self, _len: usize) -> Result<()> {
        Ok(())
    }

    fn field(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn end_record(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.writer.u8(u8::from(value));
        Ok(())
    }

    fn write_int(&mut self, value: i64, width: IntWidth) -> Result<()> {
        Ok(self.writer.int(value, width.bytes())?)
    }

    fn write_uint(&mut self, value: u64, width: IntWidth) -> Result<()> {
        Ok(self.writer.uint(value, width.bytes())?)
    }

    fn write_float(&mut self, value: f64, width: FloatWidth) -> Result<()> {
        match width {
            FloatWidth::F32 => self.writer.f32(value as f32),
            FloatWidth::F64 => self.writer.f64(value),
        }
        Ok(())
    }

    fn write_char(&mut self, value: char) -> Result<()> {
        let code = u32::from(value);
        let byte = u8::try_from(code).map_err(|_| Error::range("char", value.escape_unicode()))?;
        self.writer.u8(byte);
        Ok(())
    }

    fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write_len(value.len())?;
        self.writer.buf(value);
        Ok(())
    }

    fn write_presence(&mut self, present: bool) -> Result<()> {
        self.write_bool(present)
    }

    fn begin_array(&mut self, len: usize) -> Result<()> {
        self.write_len(len)
    }

    fn end_array(&mut self) -> Result<()> {
        Ok(())
    }
}

struct BinaryDecoder<'a> {
    reader: Reader<'a>,
    prefix: LengthPrefix,
}

impl BinaryDecoder<'_> {
    fn read_len(&mut self) -> Result<usize> {
        let offset = self.reader.offset();
        let len = self.reader.uint(self.prefix.bytes())?;
        usize::try_from(len).map_err(|_| Error::malformed(offset, format!("length {len} does not fit in memory")))
    }

    /// Reads a length prefix and fails unless that many bytes follow.
    fn read_sized(&mut self) -> Result<&[u8]> {
        let offset = self.reader.offset();
        let len = self.read_len()?;
        let remaining = self.reader.size();
        if len > remaining {
            return Err(Error::malformed(
                offset,
                format!("length {len} exceeds {remaining} remaining bytes"),
            ));
        }
        Ok(self.reader.buf(len)?)
    }

    fn read_flag(&mut self, what: &str) -> Result<bool> {
        let offset = self.reader.offset();
        match self.reader.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(Error::malformed(offset, format!("invalid {what} byte 0x{b:02x}"))),
        }
    }
}

impl Decoder for BinaryDecoder<'_> {
    fn offset(&self) -> usize {
        self.reader.offset()
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.reader.size())
    }

    fn begin_record(&mut self) -> Result<()> {
        Ok(())
    }

    fn field(&mut self, _name: &str) -> Result<bool> {
        Ok(!self.reader.is_empty())
    }

    fn end_record(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool> {
        self.read_flag("bool")
    }

    fn read_int(&mut self, width: IntWidth) -> Result<i64> {
        Ok(self.reader.int(width.bytes())?)
    }

    fn read_uint(&mut self, width: IntWidth) -> Result<u64> {
        Ok(self.reader.uint(width.bytes())?)
    }

    fn read_float(&mut self, width: FloatWidth) -> Result<f64> {
        Ok(match width {
            FloatWidth::F32 => f64::from(self.reader.f32()?),
            FloatWidth::F64 => self.reader.f64()?,
        })
    }

    fn read_char(&mut self) -> Result<char> {
        Ok(char::from(self.reader.u8()?))
    }

    fn read_str(&mut self) -> Result<String> {
        let offset = self.reader.offset();
        let bytes = self.read_sized()?;
        let s = std::str::from_utf8(bytes).map_err(|_| Error::malformed(offset, "invalid UTF-8"))?;
        Ok(s.to_owned())
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.read_sized()?.to_vec())
    }

    fn read_presence(&mut self) -> Result<bool> {
        self.read_flag("presence")
    }

    fn begin_array(&mut self) -> Result<usize> {
        self.read_len()
    }

    fn end_array(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ByteOrder;

    fn ctx() -> Context {
        Context::latest()
    }

    #[test]
    fn string_layout() {
        let d = BinaryDriver::default();
        assert_eq!(
            d.encode_value(&Serializer::string(), &"bar".into(), &ctx()).unwrap(),
            b"\x03bar"
        );
        let (v, n) = d.decode_value(&Serializer::string(), b"\x03barXX", &ctx()).unwrap();
        assert_eq!(v, Value::from("bar"));
        assert_eq!(n, 4);
    }

    #[test]
    fn signed_ints_are_big_endian_twos_complement() {
        let d = BinaryDriver::default();
        assert_eq!(
            d.encode_value(&Serializer::int32(), &1.into(), &ctx()).unwrap(),
            [0, 0, 0, 1]
        );
        assert_eq!(
            d.encode_value(&Serializer::int16(), &(-2).into(), &ctx()).unwrap(),
            [0xff, 0xfe]
        );
        assert_eq!(
            d.encode_value(&Serializer::int24(), &(-1).into(), &ctx()).unwrap(),
            [0xff, 0xff, 0xff]
        );
        let (v, _) = d.decode_value(&Serializer::int24(), &[0xff, 0xff, 0xfe], &ctx()).unwrap();
        assert_eq!(v, Value::from(-2));
    }

    #[test]
    fn little_endian_option() {
        let d = BinaryDriver::new(BinaryOptions {
            byte_order: ByteOrder::Little,
            ..BinaryOptions::default()
        });
        assert_eq!(
            d.encode_value(&Serializer::uint16(), &0x0102u16.into(), &ctx()).unwrap(),
            [0x02, 0x01]
        );
    }

    #[test]
    fn wider_length_prefix() {
        let d = BinaryDriver::new(BinaryOptions {
            length_prefix: LengthPrefix::U16,
            ..BinaryOptions::default()
        });
        assert_eq!(
            d.encode_value(&Serializer::string(), &"ab".into(), &ctx()).unwrap(),
            [0, 2, b'a', b'b']
        );
    }

    #[test]
    fn overlong_string_is_a_range_error() {
        let d = BinaryDriver::default();
        let long = "x".repeat(256);
        let err = d
            .encode_value(&Serializer::string(), &long.into(), &ctx())
            .unwrap_err();
        assert!(matches!(err, Error::Range { .. }));
    }

    #[test]
    fn int_overflow_is_a_range_error() {
        let d = BinaryDriver::default();
        let err = d
            .encode_value(&Serializer::uint8(), &256.into(), &ctx())
            .unwrap_err();
        assert!(matches!(err, Error::Range { .. }));
        let err = d
            .encode_value(&Serializer::int8(), &(-129).into(), &ctx())
            .unwrap_err();
        assert!(matches!(err, Error::Range { .. }));
        let err = d
            .encode_value(&Serializer::uint32(), &(-1).into(), &ctx())
            .unwrap_err();
        assert!(matches!(err, Error::Range { .. }));
    }

    #[test]
    fn wrong_kind_is_a_type_mismatch() {
        let d = BinaryDriver::default();
        let err = d
            .encode_value(&Serializer::int32(), &"1".into(), &ctx())
            .unwrap_err();
        assert_eq!(
            err,
            Error::TypeMismatch {
                component: String::new(),
                expected: "int32".into(),
                found: "str",
            }
        );
    }

    #[test]
    fn string_length_past_input_is_malformed() {
        let d = BinaryDriver::default();
        let err = d
            .decode_value(&Serializer::string(), b"\x09ab", &ctx())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput { offset: 0, .. }));
    }

    #[test]
    fn short_int_is_truncated() {
        let d = BinaryDriver::default();
        let err = d
            .decode_value(&Serializer::int32(), &[0, 0], &ctx())
            .unwrap_err();
        assert_eq!(
            err,
            Error::TruncatedInput {
                component: String::new(),
                offset: 0,
                needed: 4,
                remaining: 2,
            }
        );
    }

    #[test]
    fn optional_presence_flag() {
        let d = BinaryDriver::default();
        let s = Serializer::optional(Serializer::uint8());
        assert_eq!(d.encode_value(&s, &Value::None, &ctx()).unwrap(), [0]);
        assert_eq!(d.encode_value(&s, &7u8.into(), &ctx()).unwrap(), [1, 7]);
        assert_eq!(d.decode_value(&s, &[0], &ctx()).unwrap(), (Value::None, 1));
        let err = d.decode_value(&s, &[2, 7], &ctx()).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { .. }));
    }

    #[test]
    fn array_count_beyond_input_is_malformed() {
        let d = BinaryDriver::default();
        let s = Serializer::array(Serializer::uint16());
        let err = d.decode_value(&s, &[3, 0, 1, 0, 2], &ctx()).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { offset: 0, .. }));
        let (v, n) = d.decode_value(&s, &[2, 0, 1, 0, 2], &ctx()).unwrap();
        assert_eq!(v, Value::array([1u16, 2]));
        assert_eq!(n, 5);
    }

    #[test]
    fn huge_count_of_defaulted_elements_is_malformed() {
        let late = crate::ComponentStack::builder("late")
            .push(
                Component::new("x", Serializer::uint8())
                    .added_in(2)
                    .with_default(0u8),
            )
            .build()
            .unwrap();
        let d = BinaryDriver::new(BinaryOptions {
            length_prefix: LengthPrefix::U32,
            ..BinaryOptions::default()
        });
        let s = Serializer::array(Serializer::model(late));
        let err = d
            .decode_value(&s, &[0x00, 0x20, 0x00, 0x00], &ctx())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput { offset: 0, .. }));
        let (v, n) = d.decode_value(&s, &[0, 0, 0, 2, 7, 8], &ctx()).unwrap();
        assert_eq!(
            v,
            Value::array([Value::record([("x", 7u8)]), Value::record([("x", 8u8)])])
        );
        assert_eq!(n, 6);
    }

    #[test]
    fn array_errors_carry_the_index() {
        let d = BinaryDriver::default();
        let s = Serializer::array(Serializer::uint8());
        let err = d
            .encode_value(&s, &Value::array([1, 2, 300]), &ctx())
            .unwrap_err();
        assert_eq!(err.component(), Some("[2]"));
    }

    #[test]
    fn chars_and_bools() {
        let d = BinaryDriver::default();
        assert_eq!(d.encode_value(&Serializer::char(), &'é'.into(), &ctx()).unwrap(), [0xe9]);
        let err = d.encode_value(&Serializer::char(), &'€'.into(), &ctx()).unwrap_err();
        assert!(matches!(err, Error::Range { .. }));
        assert_eq!(d.encode_value(&Serializer::bool(), &true.into(), &ctx()).unwrap(), [1]);
        let err = d.decode_value(&Serializer::bool(), &[5], &ctx()).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { .. }));
    }

    #[test]
    fn floats() {
        let d = BinaryDriver::default();
        let bytes = d.encode_value(&Serializer::float32(), &1.5.into(), &ctx()).unwrap();
        assert_eq!(bytes, 1.5f32.to_be_bytes());
        let (v, _) = d.decode_value(&Serializer::float64(), &2.25f64.to_be_bytes(), &ctx()).unwrap();
        assert_eq!(v, Value::from(2.25));
        let err = d.encode_value(&Serializer::float32(), &1e300.into(), &ctx()).unwrap_err();
        assert!(matches!(err, Error::Range { .. }));
    }

    #[test]
    fn text_artifact_is_rejected() {
        let d = BinaryDriver::default();
        let err = d
            .decode(&[], &Artifact::Text(String::new()), &ctx())
            .unwrap_err();
        assert!(matches!(err, Error::ArtifactMismatch { .. }));
    }
}
