//! JSON text driver.
//!
//! Records become objects keyed by component name in active order, numbers
//! become JSON numbers, chars one-character strings, byte strings base64
//! text and absent optionals `null`. The decoder's offset is the index of
//! the JSON value being read, counted in document order.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{Map, Number, Value as JsonValue};

use super::{decode_components, encode_bound, Artifact, ArtifactKind, Bound, Decoder, Driver, Encoder};
use crate::component::Component;
use crate::config::JsonOptions;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::serializer::{FloatWidth, IntWidth};
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct JsonDriver {
    options: JsonOptions,
}

impl JsonDriver {
    pub const NAME: &'static str = "json";

    pub fn new(options: JsonOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &JsonOptions {
        &self.options
    }
}

impl Driver for JsonDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn artifact_kind(&self) -> ArtifactKind {
        ArtifactKind::Text
    }

    fn encode(&self, bound: &[Bound<'_>], ctx: &Context) -> Result<Artifact> {
        let mut enc = JsonEncoder::default();
        encode_bound(bound, ctx, &mut enc)?;
        let root = enc.root.unwrap_or(JsonValue::Null);
        let text = if self.options.pretty {
            serde_json::to_string_pretty(&root)?
        } else {
            serde_json::to_string(&root)?
        };
        tracing::debug!(
            target: "stackcast::driver::json",
            version = ctx.version(),
            components = bound.len(),
            len = text.len(),
            "encoded"
        );
        Ok(Artifact::Text(text))
    }

    fn decode(&self, components: &[&Component], artifact: &Artifact, ctx: &Context) -> Result<Vec<Value>> {
        let text = artifact
            .as_text()
            .ok_or_else(|| artifact.mismatch(Self::NAME, ArtifactKind::Text))?;
        let root: JsonValue = serde_json::from_str(text)?;
        let mut dec = JsonDecoder::new(&root);
        let values = decode_components(components, ctx, &mut dec)?;
        tracing::debug!(
            target: "stackcast::driver::json",
            version = ctx.version(),
            components = components.len(),
            "decoded"
        );
        Ok(values)
    }
}

enum Frame {
    Object {
        map: Map<String, JsonValue>,
        key: Option<String>,
    },
    Array(Vec<JsonValue>),
}

#[derive(Default)]
struct JsonEncoder {
    frames: Vec<Frame>,
    root: Option<JsonValue>,
}

impl JsonEncoder {
    fn emit(&mut self, value: JsonValue) -> Result<()> {
        match self.frames.last_mut() {
            None => self.root = Some(value),
            Some(Frame::Array(items)) => items.push(value),
            Some(Frame::Object { map, key }) => {
                let key = key
                    .take()
                    .ok_or_else(|| Error::malformed(map.len(), "object value without a field name"))?;
                map.insert(key, value);
            }
        }
        Ok(())
    }

    fn number(value: f64) -> Result<JsonValue> {
        Number::from_f64(value)
            .map(JsonValue::Number)
            .ok_or_else(|| Error::range("JSON number", value))
    }
}

impl Encoder for JsonEncoder {
    fn begin_record(&mut self, len: usize) -> Result<()> {
        self.frames.push(Frame::Object {
            map: Map::with_capacity(len),
            key: None,
        });
        Ok(())
    }

    fn field(&mut self, name: &str) -> Result<()> {
        if let Some(Frame::Object { key, .. }) = self.frames.last_mut() {
            *key = Some(name.to_owned());
        }
        Ok(())
    }

    fn end_record(&mut self) -> Result<()> {
        match self.frames.pop() {
            Some(Frame::Object { map, .. }) => self.emit(JsonValue::Object(map)),
            _ => Err(Error::malformed(0, "unbalanced record")),
        }
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.emit(JsonValue::Bool(value))
    }

    fn write_int(&mut self, value: i64, _width: IntWidth) -> Result<()> {
        self.emit(JsonValue::from(value))
    }

    fn write_uint(&mut self, value: u64, _width: IntWidth) -> Result<()> {
        self.emit(JsonValue::from(value))
    }

    fn write_float(&mut self, value: f64, width: FloatWidth) -> Result<()> {
        let value = match width {
            FloatWidth::F32 => f64::from(value as f32),
            FloatWidth::F64 => value,
        };
        let n = Self::number(value)?;
        self.emit(n)
    }

    fn write_char(&mut self, value: char) -> Result<()> {
        self.emit(JsonValue::String(value.to_string()))
    }

    fn write_str(&mut self, value: &str) -> Result<()> {
        self.emit(JsonValue::String(value.to_owned()))
    }

    fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.emit(JsonValue::String(BASE64.encode(value)))
    }

    fn write_presence(&mut self, present: bool) -> Result<()> {
        if present {
            Ok(())
        } else {
            self.emit(JsonValue::Null)
        }
    }

    fn begin_array(&mut self, len: usize) -> Result<()> {
        self.frames.push(Frame::Array(Vec::with_capacity(len)));
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        match self.frames.pop() {
            Some(Frame::Array(items)) => self.emit(JsonValue::Array(items)),
            _ => Err(Error::malformed(0, "unbalanced array")),
        }
    }
}

enum Cursor<'a> {
    Root(Option<&'a JsonValue>),
    Object {
        map: &'a Map<String, JsonValue>,
        current: Option<&'a JsonValue>,
    },
    Array(std::slice::Iter<'a, JsonValue>),
}

struct JsonDecoder<'a> {
    cursors: Vec<Cursor<'a>>,
    /// Values taken so far.
    taken: usize,
}

impl<'a> JsonDecoder<'a> {
    fn new(root: &'a JsonValue) -> Self {
        Self {
            cursors: vec![Cursor::Root(Some(root))],
            taken: 0,
        }
    }

    fn peek(&self) -> Option<&'a JsonValue> {
        match self.cursors.last()? {
            Cursor::Root(v) => *v,
            Cursor::Object { current, .. } => *current,
            Cursor::Array(iter) => iter.as_slice().first(),
        }
    }

    fn take(&mut self) -> Result<&'a JsonValue> {
        let value = match self.cursors.last_mut() {
            Some(Cursor::Root(v)) => v.take(),
            Some(Cursor::Object { current, .. }) => current.take(),
            Some(Cursor::Array(iter)) => iter.next(),
            None => None,
        };
        match value {
            Some(v) => {
                self.taken += 1;
                Ok(v)
            }
            None => Err(Error::TruncatedInput {
                component: String::new(),
                offset: self.taken,
                needed: 1,
                remaining: 0,
            }),
        }
    }

    fn unexpected(&self, expected: &str, found: &JsonValue) -> Error {
        Error::malformed(
            self.taken.saturating_sub(1),
            format!("expected {expected}, found {}", json_kind(found)),
        )
    }

    fn take_str(&mut self, expected: &str) -> Result<&'a str> {
        let v = self.take()?;
        v.as_str().ok_or_else(|| self.unexpected(expected, v))
    }

    fn take_number(&mut self) -> Result<&'a Number> {
        match self.take()? {
            JsonValue::Number(n) => Ok(n),
            v => Err(self.unexpected("number", v)),
        }
    }

    fn out_of_range(&self, width: IntWidth, signed: bool, n: &Number) -> Error {
        let kind = format!("{}int{}", if signed { "" } else { "u" }, width.bits());
        Error::range(kind, n)
    }
}

fn json_kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

impl<'a> Decoder for JsonDecoder<'a> {
    fn offset(&self) -> usize {
        self.taken
    }

    fn remaining(&self) -> Option<usize> {
        None
    }

    fn begin_record(&mut self) -> Result<()> {
        match self.take()? {
            JsonValue::Object(map) => {
                self.cursors.push(Cursor::Object { map, current: None });
                Ok(())
            }
            v => Err(self.unexpected("object", v)),
        }
    }

    fn field(&mut self, name: &str) -> Result<bool> {
        match self.cursors.last_mut() {
            Some(Cursor::Object { map, current }) => {
                *current = (*map).get(name);
                Ok(current.is_some())
            }
            _ => Err(Error::malformed(self.taken, "field outside of an object")),
        }
    }

    fn end_record(&mut self) -> Result<()> {
        match self.cursors.pop() {
            Some(Cursor::Object { .. }) => Ok(()),
            _ => Err(Error::malformed(self.taken, "unbalanced record")),
        }
    }

    fn read_bool(&mut self) -> Result<bool> {
        match self.take()? {
            JsonValue::Bool(b) => Ok(*b),
            v => Err(self.unexpected("bool", v)),
        }
    }

    fn read_int(&mut self, width: IntWidth) -> Result<i64> {
        let n = self.take_number()?;
        let (lo, hi) = width.bounds(true);
        match n.as_i64() {
            Some(v) if (lo..=hi).contains(&i128::from(v)) => Ok(v),
            Some(_) => Err(self.out_of_range(width, true, n)),
            None => Err(self.unexpected("integer", &JsonValue::Number(n.clone()))),
        }
    }

    fn read_uint(&mut self, width: IntWidth) -> Result<u64> {
        let n = self.take_number()?;
        let (_, hi) = width.bounds(false);
        match n.as_u64() {
            Some(v) if i128::from(v) <= hi => Ok(v),
            Some(_) => Err(self.out_of_range(width, false, n)),
            None if n.as_i64().is_some() => Err(self.out_of_range(width, false, n)),
            None => Err(self.unexpected("integer", &JsonValue::Number(n.clone()))),
        }
    }

    fn read_float(&mut self, _width: FloatWidth) -> Result<f64> {
        let n = self.take_number()?;
        n.as_f64()
            .ok_or_else(|| Error::malformed(self.taken - 1, format!("number {n} is not representable")))
    }

    fn read_char(&mut self) -> Result<char> {
        let s = self.take_str("string")?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if u32::from(c) <= 0xff => Ok(c),
            (Some(c), None) => Err(Error::range("char", c.escape_unicode())),
            _ => Err(Error::malformed(
                self.taken - 1,
                format!("expected a single character, found {s:?}"),
            )),
        }
    }

    fn read_str(&mut self) -> Result<String> {
        Ok(self.take_str("string")?.to_owned())
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let s = self.take_str("base64 string")?;
        BASE64
            .decode(s)
            .map_err(|e| Error::malformed(self.taken - 1, format!("invalid base64: {e}")))
    }

    fn read_presence(&mut self) -> Result<bool> {
        match self.peek() {
            Some(JsonValue::Null) => {
                self.take()?;
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Err(Error::TruncatedInput {
                component: String::new(),
                offset: self.taken,
                needed: 1,
                remaining: 0,
            }),
        }
    }

    fn begin_array(&mut self) -> Result<usize> {
        match self.take()? {
            JsonValue::Array(items) => {
                self.cursors.push(Cursor::Array(items.iter()));
                Ok(items.len())
            }
            v => Err(self.unexpected("array", v)),
        }
    }

    fn end_array(&mut self) -> Result<()> {
        match self.cursors.pop() {
            Some(Cursor::Array(_)) => Ok(()),
            _ => Err(Error::malformed(self.taken, "unbalanced array")),
        }
    }
}
