//! Ordered, filterable component stacks.
//!
//! A [`ComponentStack`] is the schema of a model: component order is
//! serialization order, and [`ComponentStack::filter`] selects the subset
//! active under a [`Context`]. Stacks are built once by [`StackBuilder`] and
//! never change afterwards; models share them by `Arc`.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::component::{Component, Payload, VersionWindow};
use crate::context::Context;
use crate::driver::{self, Bound, Decoder, Encoder};
use crate::error::{Error, Result};
use crate::value::{Record, Value};

/// Custom inclusion predicate applied after the version window.
pub trait ComponentFilter: Send + Sync {
    /// Component names this filter depends on under `ctx`. Names missing
    /// from the stack make [`ComponentStack::filter`] fail.
    fn references<'a>(&'a self, _ctx: &'a Context) -> Vec<&'a str> {
        Vec::new()
    }

    fn keep(&self, component: &Component, ctx: &Context) -> bool;
}

impl<F> ComponentFilter for F
where
    F: Fn(&Component, &Context) -> bool + Send + Sync,
{
    fn keep(&self, component: &Component, ctx: &Context) -> bool {
        self(component, ctx)
    }
}

/// Keeps `names` only while the context flag `flag` is set.
#[derive(Debug, Clone)]
pub struct Toggle {
    flag: String,
    names: Vec<String>,
}

impl Toggle {
    pub fn new<S: Into<String>>(flag: impl Into<String>, names: impl IntoIterator<Item = S>) -> Self {
        Self {
            flag: flag.into(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl ComponentFilter for Toggle {
    fn references<'a>(&'a self, _ctx: &'a Context) -> Vec<&'a str> {
        self.names.iter().map(String::as_str).collect()
    }

    fn keep(&self, component: &Component, ctx: &Context) -> bool {
        ctx.flag(&self.flag) || !self.names.iter().any(|n| n == component.name())
    }
}

/// Drops the components listed in the context extra `key` (an array of
/// names).
#[derive(Debug, Clone)]
pub struct Exclude {
    key: String,
}

impl Exclude {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn listed<'a>(&self, ctx: &'a Context) -> impl Iterator<Item = &'a str> {
        ctx.get(&self.key)
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str())
    }
}

impl ComponentFilter for Exclude {
    fn references<'a>(&'a self, ctx: &'a Context) -> Vec<&'a str> {
        self.listed(ctx).collect()
    }

    fn keep(&self, component: &Component, ctx: &Context) -> bool {
        !self.listed(ctx).any(|n| n == component.name())
    }
}

/// Serializable description of a stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackSchema {
    pub name: String,
    pub components: Vec<ComponentSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub version_added: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_removed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub binding: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<StackSchema>,
}

/// An immutable, ordered set of uniquely named components.
#[derive(Clone)]
pub struct ComponentStack {
    name: String,
    components: IndexMap<String, Component>,
    filter: Option<Arc<dyn ComponentFilter>>,
}

impl fmt::Debug for ComponentStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentStack")
            .field("name", &self.name)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl ComponentStack {
    pub fn builder(name: impl Into<String>) -> StackBuilder {
        StackBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Components in declaration order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Highest version any component of this stack or a nested stack is
    /// added or removed at.
    pub fn latest_version(&self) -> u32 {
        self.components()
            .map(|c| {
                let own = c.version_added().max(c.version_removed().unwrap_or(1));
                match c.payload() {
                    Payload::Stack(nested) => own.max(nested.latest_version()),
                    Payload::Serializer(_) => own,
                }
            })
            .max()
            .unwrap_or(1)
    }

    fn unknown(&self, component: &str) -> Error {
        Error::UnknownComponent {
            stack: self.name.clone(),
            component: component.to_owned(),
        }
    }

    /// Active components under `ctx`, in declaration order.
    pub fn filter(&self, ctx: &Context) -> Result<Vec<&Component>> {
        if let Some(filter) = &self.filter {
            if let Some(name) = filter
                .references(ctx)
                .into_iter()
                .find(|n| !self.components.contains_key(*n))
            {
                return Err(self.unknown(name));
            }
        }
        Ok(self
            .components()
            .filter(|c| {
                let keep = c.is_active(ctx) && self.filter.as_ref().map_or(true, |f| f.keep(c, ctx));
                if !keep {
                    tracing::trace!(
                        target: "stackcast::stack",
                        stack = %self.name,
                        component = c.name(),
                        version = ctx.version(),
                        "component filtered out"
                    );
                }
                keep
            })
            .collect())
    }

    /// Pairs active components with their values from `record`, falling
    /// back to defaults.
    pub fn bind_values<'a>(&'a self, record: &'a Record, ctx: &Context) -> Result<Vec<Bound<'a>>> {
        self.filter(ctx)?
            .into_iter()
            .map(|component| {
                let value = component.resolve(record).ok_or_else(|| Error::MissingValue {
                    component: component.name().to_owned(),
                })?;
                Ok(Bound { component, value })
            })
            .collect()
    }

    /// Builds a record from decoded values of `active`. Components that were
    /// not active take their default when they have one.
    pub fn rehydrate(&self, active: &[&Component], values: Vec<Value>) -> Record {
        let mut record = Record::with_capacity(self.components.len());
        for (component, value) in active.iter().zip(values) {
            component.write(&mut record, value);
        }
        for component in self.components() {
            if active.iter().any(|a| a.name() == component.name()) {
                continue;
            }
            if let Some(default) = component.default_value() {
                component.write(&mut record, default.clone());
            }
        }
        record
    }

    /// Compares two records over the components active under `ctx`,
    /// recursing into nested stacks under their own active set.
    pub fn records_equal(&self, a: &Record, b: &Record, ctx: &Context) -> bool {
        let Ok(active) = self.filter(ctx) else {
            return false;
        };
        active.iter().all(|c| match (c.resolve(a), c.resolve(b)) {
            (Some(x), Some(y)) => match (c.payload(), x.as_ref(), y.as_ref()) {
                (Payload::Stack(nested), Value::Record(x), Value::Record(y)) => {
                    nested.records_equal(x, y, &c.scoped(ctx))
                }
                _ => x == y,
            },
            (x, y) => x == y,
        })
    }

    pub fn encode_record(&self, record: &Record, ctx: &Context, enc: &mut dyn Encoder) -> Result<()> {
        let bound = self.bind_values(record, ctx)?;
        driver::encode_bound(&bound, ctx, enc)
    }

    pub fn decode_record(&self, ctx: &Context, dec: &mut dyn Decoder) -> Result<Record> {
        let active = self.filter(ctx)?;
        let values = driver::decode_components(&active, ctx, dec)?;
        Ok(self.rehydrate(&active, values))
    }

    pub(crate) fn min_encoded_len(&self, ctx: &Context) -> Result<usize> {
        self.filter(ctx)?
            .into_iter()
            .map(|c| c.min_encoded_len(ctx))
            .sum()
    }

    /// Components that take a default when absent from older artifacts but
    /// are followed, in encoded order, by a component from an earlier
    /// version. Nested stacks are flattened into dotted paths; pinned nested
    /// stacks have a fixed layout and are skipped.
    ///
    /// A layout without framing cannot tell such a component is missing: a
    /// binary artifact written before it was added puts the next component's
    /// data in its place, and loading fails further on.
    pub fn out_of_order_additions(&self) -> Vec<String> {
        let mut flat = Vec::new();
        self.flatten("", &mut flat);
        flat.iter()
            .enumerate()
            .filter(|(i, (_, added, substitutable))| {
                *substitutable && flat[i + 1..].iter().any(|(_, later, _)| later < added)
            })
            .map(|(_, (path, ..))| path.clone())
            .collect()
    }

    fn flatten(&self, prefix: &str, out: &mut Vec<(String, u32, bool)>) {
        for c in self.components() {
            let path = if prefix.is_empty() {
                c.name().to_owned()
            } else {
                format!("{prefix}.{}", c.name())
            };
            let substitutable = c.version_added() > 1 && c.default_value().is_some();
            match c.payload() {
                Payload::Stack(nested) if !substitutable && c.pinned_version().is_none() => {
                    nested.flatten(&path, out)
                }
                _ => out.push((path, c.version_added(), substitutable)),
            }
        }
    }

    pub fn schema(&self) -> StackSchema {
        StackSchema {
            name: self.name.clone(),
            components: self
                .components()
                .map(|c| ComponentSchema {
                    name: c.name().to_owned(),
                    type_name: c.type_name(),
                    version_added: c.version_added(),
                    version_removed: c.version_removed(),
                    default: c.default_value().cloned(),
                    binding: c.binding().name(),
                    pinned_version: c.pinned_version(),
                    stack: match c.payload() {
                        Payload::Stack(nested) => Some(nested.schema()),
                        Payload::Serializer(_) => None,
                    },
                })
                .collect(),
        }
    }

    /// Copy of this stack with `parent` merged under every component's own
    /// window, recursively.
    fn inherit(&self, parent: &VersionWindow) -> Result<ComponentStack> {
        let mut components = IndexMap::with_capacity(self.components.len());
        for (name, component) in &self.components {
            let mut component = component.clone();
            component.set_window(component.window().merged_over(parent));
            check_window(&component)?;
            if let Payload::Stack(nested) = component.payload() {
                let nested = nested.inherit(&component.window())?;
                component.set_payload(Payload::Stack(Arc::new(nested)));
            }
            components.insert(name.clone(), component);
        }
        Ok(ComponentStack {
            name: self.name.clone(),
            components,
            filter: self.filter.clone(),
        })
    }
}

fn check_window(component: &Component) -> Result<()> {
    match component.version_removed() {
        Some(removed) if removed < component.version_added() => Err(Error::InvalidVersionWindow {
            component: component.name().to_owned(),
            added: component.version_added(),
            removed,
        }),
        _ => Ok(()),
    }
}

/// One-time builder pass producing an immutable [`ComponentStack`].
pub struct StackBuilder {
    name: String,
    components: Vec<Component>,
    filter: Option<Arc<dyn ComponentFilter>>,
}

impl StackBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
            filter: None,
        }
    }

    pub fn push(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn field(self, name: impl Into<String>, payload: impl Into<Payload>) -> Self {
        self.push(Component::new(name, payload))
    }

    pub fn filter(mut self, filter: impl ComponentFilter + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Names unnamed components `f_<position>`, rejects duplicate names and
    /// inverted version windows, and pushes each nested stack's inherited
    /// window down into its components.
    pub fn build(self) -> Result<ComponentStack> {
        let mut components = IndexMap::with_capacity(self.components.len());
        for (i, mut component) in self.components.into_iter().enumerate() {
            if component.name().is_empty() {
                component.set_name(format!("f_{}", i + 1));
            }
            check_window(&component)?;
            let window = component.window();
            if let Payload::Stack(nested) = component.payload() {
                if !window.is_empty() {
                    let nested = nested.inherit(&window)?;
                    component.set_payload(Payload::Stack(Arc::new(nested)));
                }
            }
            let name = component.name().to_owned();
            if components.contains_key(&name) {
                return Err(Error::DuplicateComponent {
                    stack: self.name,
                    component: name,
                });
            }
            components.insert(name, component);
        }
        let stack = ComponentStack {
            name: self.name,
            components,
            filter: self.filter,
        };
        for path in stack.out_of_order_additions() {
            tracing::warn!(
                target: "stackcast::stack",
                stack = %stack.name,
                component = %path,
                "defaulted component precedes older components; binary artifacts from before it was added will not load"
            );
        }
        tracing::debug!(
            target: "stackcast::stack",
            stack = %stack.name,
            components = stack.len(),
            "stack built"
        );
        Ok(stack)
    }
}

impl fmt::Debug for StackBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackBuilder")
            .field("name", &self.name)
            .field("components", &self.components.len())
            .finish()
    }
}
