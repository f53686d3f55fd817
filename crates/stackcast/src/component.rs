//! Named, versioned slots of a component stack.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::driver::{Decoder, Encoder};
use crate::error::{Error, Result};
use crate::serializer::Serializer;
use crate::stack::ComponentStack;
use crate::value::{Record, Value};

/// What a component holds: a leaf serializer or a nested stack.
#[derive(Debug, Clone)]
pub enum Payload {
    Serializer(Arc<Serializer>),
    Stack(Arc<ComponentStack>),
}

impl From<Serializer> for Payload {
    fn from(s: Serializer) -> Self {
        Self::Serializer(Arc::new(s))
    }
}

impl From<Arc<Serializer>> for Payload {
    fn from(s: Arc<Serializer>) -> Self {
        Self::Serializer(s)
    }
}

impl From<ComponentStack> for Payload {
    fn from(s: ComponentStack) -> Self {
        Self::Stack(Arc::new(s))
    }
}

impl From<Arc<ComponentStack>> for Payload {
    fn from(s: Arc<ComponentStack>) -> Self {
        Self::Stack(s)
    }
}

/// Half-open version interval `[added, removed)`.
///
/// Fields are `None` when not set explicitly, so a window can be merged over
/// an inherited one without losing track of what the component declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionWindow {
    pub added: Option<u32>,
    pub removed: Option<u32>,
}

impl VersionWindow {
    pub fn added(&self) -> u32 {
        self.added.unwrap_or(1)
    }

    pub fn contains(&self, version: u32) -> bool {
        self.added() <= version && self.removed.map_or(true, |removed| version < removed)
    }

    /// Fills the settings this window leaves open from `parent`.
    pub fn merged_over(&self, parent: &VersionWindow) -> VersionWindow {
        VersionWindow {
            added: self.added.or(parent.added),
            removed: self.removed.or(parent.removed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_none() && self.removed.is_none()
    }
}

type Getter = dyn Fn(&Record) -> Option<Value> + Send + Sync;
type Setter = dyn Fn(&mut Record, Value) + Send + Sync;

/// Getter/setter pair for components whose value is derived from other
/// state in the record.
#[derive(Clone)]
pub struct Accessor {
    get: Arc<Getter>,
    set: Arc<Setter>,
}

impl Accessor {
    pub fn new(
        get: impl Fn(&Record) -> Option<Value> + Send + Sync + 'static,
        set: impl Fn(&mut Record, Value) + Send + Sync + 'static,
    ) -> Self {
        Self {
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    pub fn get(&self, record: &Record) -> Option<Value> {
        (self.get)(record)
    }

    pub fn set(&self, record: &mut Record, value: Value) {
        (self.set)(record, value)
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Accessor")
    }
}

/// How a component's value is read from and written back to a record.
#[derive(Debug, Clone, Default)]
pub enum Binding {
    /// Stored under the component name.
    #[default]
    Direct,
    /// Read through a getter, written through a setter.
    Accessor(Accessor),
    /// Always this value; decoding verifies it.
    Constant(Value),
}

impl Binding {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Accessor(_) => "accessor",
            Self::Constant(_) => "constant",
        }
    }
}

/// One named slot in a stack.
#[derive(Debug, Clone)]
pub struct Component {
    name: String,
    payload: Payload,
    window: VersionWindow,
    default: Option<Value>,
    binding: Binding,
    pinned_version: Option<u32>,
}

impl Component {
    pub fn new(name: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            window: VersionWindow::default(),
            default: None,
            binding: Binding::Direct,
            pinned_version: None,
        }
    }

    /// A component named by its position when the stack is built.
    pub fn unnamed(payload: impl Into<Payload>) -> Self {
        Self::new(String::new(), payload)
    }

    pub fn added_in(mut self, version: u32) -> Self {
        self.window.added = Some(version);
        self
    }

    pub fn removed_in(mut self, version: u32) -> Self {
        self.window.removed = Some(version);
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn accessor(mut self, accessor: Accessor) -> Self {
        self.binding = Binding::Accessor(accessor);
        self
    }

    pub fn constant(mut self, value: impl Into<Value>) -> Self {
        self.binding = Binding::Constant(value.into());
        self
    }

    /// Encodes and decodes the payload at `version` whatever the caller's
    /// context says.
    pub fn pinned(mut self, version: u32) -> Self {
        self.pinned_version = Some(version.max(1));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn window(&self) -> VersionWindow {
        self.window
    }

    pub fn version_added(&self) -> u32 {
        self.window.added()
    }

    pub fn version_removed(&self) -> Option<u32> {
        self.window.removed
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn pinned_version(&self) -> Option<u32> {
        self.pinned_version
    }

    pub fn is_active(&self, ctx: &Context) -> bool {
        self.window.contains(ctx.version())
    }

    /// The declared default, falling back to the serializer's own.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref().or(match &self.payload {
            Payload::Serializer(s) => s.default_value(),
            Payload::Stack(_) => None,
        })
    }

    pub(crate) fn constant_value(&self) -> Option<&Value> {
        match &self.binding {
            Binding::Constant(v) => Some(v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> String {
        match &self.payload {
            Payload::Serializer(s) => s.type_name(),
            Payload::Stack(stack) => format!("stack<{}>", stack.name()),
        }
    }

    /// The value currently bound to this component in `record`, without
    /// falling back to defaults.
    pub fn read<'r>(&'r self, record: &'r Record) -> Option<Cow<'r, Value>> {
        match &self.binding {
            Binding::Direct => record.get(&self.name).map(Cow::Borrowed),
            Binding::Accessor(accessor) => accessor.get(record).map(Cow::Owned),
            Binding::Constant(v) => Some(Cow::Borrowed(v)),
        }
    }

    /// Like [`Component::read`], then the default.
    pub fn resolve<'r>(&'r self, record: &'r Record) -> Option<Cow<'r, Value>> {
        self.read(record)
            .or_else(|| self.default_value().map(Cow::Borrowed))
    }

    /// Stores a decoded value into `record`. Constants are not stored.
    pub fn write(&self, record: &mut Record, value: Value) {
        match &self.binding {
            Binding::Direct => {
                record.insert(self.name.clone(), value);
            }
            Binding::Accessor(accessor) => accessor.set(record, value),
            Binding::Constant(_) => {}
        }
    }

    pub(crate) fn scoped<'c>(&self, ctx: &'c Context) -> Cow<'c, Context> {
        match self.pinned_version {
            Some(v) => Cow::Owned(ctx.with_version(v)),
            None => Cow::Borrowed(ctx),
        }
    }

    pub fn encode(&self, value: &Value, ctx: &Context, enc: &mut dyn Encoder) -> Result<()> {
        let ctx = self.scoped(ctx);
        match (&self.payload, value) {
            (Payload::Serializer(s), v) => s.encode(v, &ctx, enc),
            (Payload::Stack(stack), Value::Record(record)) => stack.encode_record(record, &ctx, enc),
            (Payload::Stack(stack), v) => Err(Error::type_mismatch(
                format!("stack<{}>", stack.name()),
                v.kind_name(),
            )),
        }
    }

    pub fn decode(&self, ctx: &Context, dec: &mut dyn Decoder) -> Result<Value> {
        let ctx = self.scoped(ctx);
        match &self.payload {
            Payload::Serializer(s) => s.decode(&ctx, dec),
            Payload::Stack(stack) => Ok(Value::Record(stack.decode_record(&ctx, dec)?)),
        }
    }

    /// Lower bound on the binary size of this component's data.
    pub(crate) fn min_encoded_len(&self, ctx: &Context) -> Result<usize> {
        if self.version_added() > 1 && self.default_value().is_some() {
            return Ok(0);
        }
        let ctx = self.scoped(ctx);
        match &self.payload {
            Payload::Serializer(s) => s.min_encoded_len(&ctx),
            Payload::Stack(stack) => stack.min_encoded_len(&ctx),
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_window(&mut self, window: VersionWindow) {
        self.window = window;
    }

    pub(crate) fn set_payload(&mut self, payload: Payload) {
        self.payload = payload;
    }
}
