//! Leaf type descriptors.
//!
//! A [`Serializer`] describes one serializable type independently of any
//! wire format and encodes/decodes a single value through a driver's
//! [`Encoder`]/[`Decoder`] primitives.

use std::borrow::Cow;
use std::sync::Arc;

use serde::Serialize;

use crate::constraint::Constraint;
use crate::context::Context;
use crate::driver::{Decoder, Encoder};
use crate::error::{Error, Result};
use crate::stack::ComponentStack;
use crate::value::Value;

/// Byte width of a fixed-width integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntWidth {
    W8,
    W16,
    W24,
    W32,
    W64,
}

impl IntWidth {
    pub fn bytes(self) -> usize {
        match self {
            Self::W8 => 1,
            Self::W16 => 2,
            Self::W24 => 3,
            Self::W32 => 4,
            Self::W64 => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    /// Inclusive representable range.
    pub fn bounds(self, signed: bool) -> (i128, i128) {
        let bits = self.bits();
        if signed {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    pub fn bytes(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

/// The shape of a serializable value.
#[derive(Debug, Clone)]
pub enum Kind {
    Bool,
    Int { width: IntWidth, signed: bool },
    Float(FloatWidth),
    /// A single Latin-1 character, one byte on the wire.
    Char,
    Str,
    Bytes,
    Optional(Arc<Serializer>),
    Array(Arc<Serializer>),
    /// A nested model described by its own stack.
    Model(Arc<ComponentStack>),
}

/// A leaf of the type system.
///
/// Serializers are immutable once built and are shared by `Arc` between
/// components, optional wrappers and arrays.
#[derive(Debug, Clone)]
pub struct Serializer {
    kind: Kind,
    default: Option<Value>,
    constraint: Option<Constraint>,
}

impl Serializer {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            default: None,
            constraint: None,
        }
    }

    pub fn bool() -> Self {
        Self::new(Kind::Bool)
    }

    pub fn int(width: IntWidth, signed: bool) -> Self {
        Self::new(Kind::Int { width, signed })
    }

    pub fn int8() -> Self {
        Self::int(IntWidth::W8, true)
    }

    pub fn int16() -> Self {
        Self::int(IntWidth::W16, true)
    }

    pub fn int24() -> Self {
        Self::int(IntWidth::W24, true)
    }

    pub fn int32() -> Self {
        Self::int(IntWidth::W32, true)
    }

    pub fn int64() -> Self {
        Self::int(IntWidth::W64, true)
    }

    pub fn uint8() -> Self {
        Self::int(IntWidth::W8, false)
    }

    pub fn uint16() -> Self {
        Self::int(IntWidth::W16, false)
    }

    pub fn uint24() -> Self {
        Self::int(IntWidth::W24, false)
    }

    pub fn uint32() -> Self {
        Self::int(IntWidth::W32, false)
    }

    pub fn uint64() -> Self {
        Self::int(IntWidth::W64, false)
    }

    pub fn float32() -> Self {
        Self::new(Kind::Float(FloatWidth::F32))
    }

    pub fn float64() -> Self {
        Self::new(Kind::Float(FloatWidth::F64))
    }

    pub fn char() -> Self {
        Self::new(Kind::Char)
    }

    pub fn string() -> Self {
        Self::new(Kind::Str)
    }

    pub fn bytes() -> Self {
        Self::new(Kind::Bytes)
    }

    pub fn optional(inner: impl Into<Arc<Serializer>>) -> Self {
        Self::new(Kind::Optional(inner.into()))
    }

    pub fn array(element: impl Into<Arc<Serializer>>) -> Self {
        Self::new(Kind::Array(element.into()))
    }

    pub fn model(stack: impl Into<Arc<ComponentStack>>) -> Self {
        Self::new(Kind::Model(stack.into()))
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn constrained(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    /// Human-readable type name, e.g. `int32`, `optional<str>`,
    /// `array<model<member>>`.
    pub fn type_name(&self) -> String {
        match &self.kind {
            Kind::Bool => "bool".into(),
            Kind::Int { width, signed } => {
                format!("{}int{}", if *signed { "" } else { "u" }, width.bits())
            }
            Kind::Float(FloatWidth::F32) => "float32".into(),
            Kind::Float(FloatWidth::F64) => "float64".into(),
            Kind::Char => "char".into(),
            Kind::Str => "str".into(),
            Kind::Bytes => "bytes".into(),
            Kind::Optional(inner) => format!("optional<{}>", inner.type_name()),
            Kind::Array(inner) => format!("array<{}>", inner.type_name()),
            Kind::Model(stack) => format!("model<{}>", stack.name()),
        }
    }

    /// Lower bound on the number of bytes any value of this type occupies in
    /// the binary encoding. Used to reject impossible array counts early.
    pub fn min_encoded_len(&self, ctx: &Context) -> Result<usize> {
        Ok(match &self.kind {
            Kind::Int { width, .. } => width.bytes(),
            Kind::Float(width) => width.bytes(),
            Kind::Bool | Kind::Char | Kind::Str | Kind::Bytes => 1,
            Kind::Optional(_) | Kind::Array(_) => 1,
            Kind::Model(stack) => stack.min_encoded_len(ctx)?,
        })
    }

    fn check<'v>(&self, value: &'v Value) -> Result<Cow<'v, Value>> {
        match &self.constraint {
            Some(constraint) => constraint.apply(value),
            None => Ok(Cow::Borrowed(value)),
        }
    }

    /// Encodes `value` through `enc`.
    ///
    /// Fails with [`Error::TypeMismatch`] when the value is not of this
    /// serializer's kind and [`Error::Range`] when it does not fit the
    /// declared width.
    pub fn encode(&self, value: &Value, ctx: &Context, enc: &mut dyn Encoder) -> Result<()> {
        let value = self.check(value)?;
        match (&self.kind, value.as_ref()) {
            (Kind::Bool, Value::Bool(b)) => enc.write_bool(*b),
            (Kind::Int { width, signed }, v @ (Value::Int(_) | Value::UInt(_))) => {
                let n = v.as_integer().unwrap_or_default();
                let (lo, hi) = width.bounds(*signed);
                if n < lo || n > hi {
                    return Err(Error::range(self.type_name(), n));
                }
                if *signed {
                    enc.write_int(n as i64, *width)
                } else {
                    enc.write_uint(n as u64, *width)
                }
            }
            (Kind::Float(width), v @ (Value::Float(_) | Value::Int(_) | Value::UInt(_))) => {
                let f = v.as_f64().unwrap_or_default();
                if *width == FloatWidth::F32 && f.is_finite() && f.abs() > f64::from(f32::MAX) {
                    return Err(Error::range(self.type_name(), f));
                }
                enc.write_float(f, *width)
            }
            (Kind::Char, Value::Char(c)) => {
                if u32::from(*c) > 0xff {
                    return Err(Error::range(self.type_name(), c.escape_unicode()));
                }
                enc.write_char(*c)
            }
            (Kind::Str, Value::Str(s)) => enc.write_str(s),
            (Kind::Bytes, Value::Bytes(b)) => enc.write_bytes(b),
            (Kind::Optional(_), Value::None) => enc.write_presence(false),
            (Kind::Optional(inner), v) => {
                enc.write_presence(true)?;
                inner.encode(v, ctx, enc)
            }
            (Kind::Array(element), Value::Array(items)) => {
                enc.begin_array(items.len())?;
                for (i, item) in items.iter().enumerate() {
                    element
                        .encode(item, ctx, enc)
                        .map_err(|e| e.within(&format!("[{i}]")))?;
                }
                enc.end_array()
            }
            (Kind::Model(stack), Value::Record(record)) => stack.encode_record(record, ctx, enc),
            (_, v) => Err(Error::type_mismatch(self.type_name(), v.kind_name())),
        }
    }

    /// Decodes one value of this type from `dec`.
    pub fn decode(&self, ctx: &Context, dec: &mut dyn Decoder) -> Result<Value> {
        let value = match &self.kind {
            Kind::Bool => Value::Bool(dec.read_bool()?),
            Kind::Int {
                width,
                signed: true,
            } => Value::Int(dec.read_int(*width)?),
            Kind::Int {
                width,
                signed: false,
            } => Value::UInt(dec.read_uint(*width)?),
            Kind::Float(width) => Value::Float(dec.read_float(*width)?),
            Kind::Char => Value::Char(dec.read_char()?),
            Kind::Str => Value::Str(dec.read_str()?),
            Kind::Bytes => Value::Bytes(dec.read_bytes()?),
            Kind::Optional(inner) => {
                if dec.read_presence()? {
                    inner.decode(ctx, dec)?
                } else {
                    Value::None
                }
            }
            Kind::Array(element) => {
                let offset = dec.offset();
                let count = dec.begin_array()?;
                if let Some(remaining) = dec.remaining() {
                    // zero-size elements are counted as one byte each
                    let per_element = element.min_encoded_len(ctx)?.max(1);
                    let needed = count.saturating_mul(per_element);
                    if needed > remaining {
                        return Err(Error::malformed(
                            offset,
                            format!(
                                "array declares {count} elements but only {remaining} bytes remain"
                            ),
                        ));
                    }
                }
                let mut items = Vec::with_capacity(count.min(1024));
                for i in 0..count {
                    let item = element
                        .decode(ctx, dec)
                        .map_err(|e| e.within(&format!("[{i}]")))?;
                    items.push(item);
                }
                dec.end_array()?;
                Value::Array(items)
            }
            Kind::Model(stack) => Value::Record(stack.decode_record(ctx, dec)?),
        };
        match self.check(&value)? {
            Cow::Borrowed(_) => Ok(value),
            Cow::Owned(reshaped) => Ok(reshaped),
        }
    }
}
