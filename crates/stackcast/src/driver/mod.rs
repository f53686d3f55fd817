//! Driver contract and the primitives drivers expose to serializers.
//!
//! A [`Driver`] turns an ordered list of active components and their values
//! into an [`Artifact`] and back. Serializers never see the artifact; they
//! talk to the per-call [`Encoder`]/[`Decoder`] a driver builds, so one type
//! description serves every wire format.

mod binary;
mod json;
mod registry;

pub use binary::BinaryDriver;
pub use json::JsonDriver;
pub use registry::{get_driver, global, install, DriverRegistry, RegistryBuilder};

use std::borrow::Cow;
use std::fmt;

use crate::component::Component;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::serializer::{FloatWidth, IntWidth};
use crate::value::Value;

/// What a driver produces from a dump and consumes on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Bytes(Vec<u8>),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Bytes,
    Text,
}

impl ArtifactKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bytes => "bytes",
            Self::Text => "text",
        }
    }
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Bytes(_) => ArtifactKind::Bytes,
            Self::Text(_) => ArtifactKind::Text,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bytes(_) => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Text(_) => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bytes(_) => None,
        }
    }

    pub(crate) fn mismatch(&self, driver: &str, expected: ArtifactKind) -> Error {
        Error::ArtifactMismatch {
            driver: driver.to_owned(),
            expected: expected.name(),
            found: self.kind().name(),
        }
    }
}

/// An active component paired with the value it will be encoded from.
#[derive(Debug, Clone)]
pub struct Bound<'a> {
    pub component: &'a Component,
    pub value: Cow<'a, Value>,
}

/// A stateless codec.
///
/// Implementations must not keep per-call state: every `encode`/`decode`
/// builds its own writer or reader, so identical inputs always yield
/// identical outputs and one instance can be shared across threads.
pub trait Driver: Send + Sync + fmt::Debug {
    /// Registry key, e.g. `"binary"`.
    fn name(&self) -> &str;

    /// The single artifact type this driver produces and accepts.
    fn artifact_kind(&self) -> ArtifactKind;

    fn encode(&self, bound: &[Bound<'_>], ctx: &Context) -> Result<Artifact>;

    /// Decodes one value per component, in the order given.
    fn decode(
        &self,
        components: &[&Component],
        artifact: &Artifact,
        ctx: &Context,
    ) -> Result<Vec<Value>>;
}

/// Write-side primitives a driver offers to serializers.
pub trait Encoder {
    fn begin_record(&mut self, len: usize) -> Result<()>;
    /// Announces the component the next value belongs to.
    fn field(&mut self, name: &str) -> Result<()>;
    fn end_record(&mut self) -> Result<()>;

    fn write_bool(&mut self, value: bool) -> Result<()>;
    fn write_int(&mut self, value: i64, width: IntWidth) -> Result<()>;
    fn write_uint(&mut self, value: u64, width: IntWidth) -> Result<()>;
    fn write_float(&mut self, value: f64, width: FloatWidth) -> Result<()>;
    fn write_char(&mut self, value: char) -> Result<()>;
    fn write_str(&mut self, value: &str) -> Result<()>;
    fn write_bytes(&mut self, value: &[u8]) -> Result<()>;
    /// Optional marker; a present marker is followed by the inner value.
    fn write_presence(&mut self, present: bool) -> Result<()>;

    fn begin_array(&mut self, len: usize) -> Result<()>;
    fn end_array(&mut self) -> Result<()>;
}

/// Read-side primitives a driver offers to serializers.
pub trait Decoder {
    /// Position used in error reports.
    fn offset(&self) -> usize;
    /// Bytes left in the input, for drivers that know it.
    fn remaining(&self) -> Option<usize>;

    fn begin_record(&mut self) -> Result<()>;
    /// Moves to the component `name`; returns `false` when the input holds
    /// no data for it.
    fn field(&mut self, name: &str) -> Result<bool>;
    fn end_record(&mut self) -> Result<()>;

    fn read_bool(&mut self) -> Result<bool>;
    fn read_int(&mut self, width: IntWidth) -> Result<i64>;
    fn read_uint(&mut self, width: IntWidth) -> Result<u64>;
    fn read_float(&mut self, width: FloatWidth) -> Result<f64>;
    fn read_char(&mut self) -> Result<char>;
    fn read_str(&mut self) -> Result<String>;
    fn read_bytes(&mut self) -> Result<Vec<u8>>;
    fn read_presence(&mut self) -> Result<bool>;

    /// Returns the element count.
    fn begin_array(&mut self) -> Result<usize>;
    fn end_array(&mut self) -> Result<()>;
}

/// Encodes bound components as one record.
pub fn encode_bound(bound: &[Bound<'_>], ctx: &Context, enc: &mut dyn Encoder) -> Result<()> {
    enc.begin_record(bound.len())?;
    for b in bound {
        let name = b.component.name();
        enc.field(name)?;
        b.component
            .encode(&b.value, ctx, enc)
            .map_err(|e| e.within(name))?;
    }
    enc.end_record()
}

/// Decodes one value per component as one record.
///
/// A component introduced after version 1 whose data is missing from the
/// input (an artifact written at an older version) takes its default.
pub fn decode_components(
    components: &[&Component],
    ctx: &Context,
    dec: &mut dyn Decoder,
) -> Result<Vec<Value>> {
    dec.begin_record()?;
    let mut values = Vec::with_capacity(components.len());
    for component in components {
        let name = component.name();
        let present = dec.field(name)?;
        if !present && component.version_added() > 1 {
            if let Some(default) = component.default_value() {
                tracing::trace!(
                    target: "stackcast::driver",
                    component = name,
                    "substituting default for missing data"
                );
                values.push(default.clone());
                continue;
            }
        }
        let offset = dec.offset();
        let value = component.decode(ctx, dec).map_err(|e| e.within(name))?;
        if let Some(expected) = component.constant_value() {
            if &value != expected {
                return Err(Error::malformed(
                    offset,
                    format!("constant mismatch: expected {expected:?}, found {value:?}"),
                )
                .within(name));
            }
        }
        values.push(value);
    }
    dec.end_record()?;
    Ok(values)
}
