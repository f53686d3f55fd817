//! Immutable per-call serialization context.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Highest representable version; used by [`Context::latest`].
pub const LATEST: u32 = u32::MAX;

/// Immutable parameter bag threaded through every stack traversal.
///
/// Carries the `version` that decides which components are active plus any
/// number of application- or driver-specific extras. Derived contexts are
/// new values; a context is never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    version: u32,
    extras: Arc<BTreeMap<String, JsonValue>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::latest()
    }
}

impl Context {
    /// Context at `version`. Versions start at 1; `0` is raised to 1.
    pub fn at(version: u32) -> Self {
        Self {
            version: version.max(1),
            extras: Arc::default(),
        }
    }

    /// Context that activates every component not yet removed.
    pub fn latest() -> Self {
        Self::at(LATEST)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_latest(&self) -> bool {
        self.version == LATEST
    }

    pub fn with_version(&self, version: u32) -> Self {
        Self {
            version: version.max(1),
            extras: Arc::clone(&self.extras),
        }
    }

    pub fn with_extra(&self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        let mut extras = (*self.extras).clone();
        extras.insert(key.into(), value.into());
        Self {
            version: self.version,
            extras: Arc::new(extras),
        }
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.extras.get(key)
    }

    /// `true` when `key` is present and JSON-truthy (`true`, non-zero
    /// number, non-empty string).
    pub fn flag(&self, key: &str) -> bool {
        match self.extras.get(key) {
            Some(JsonValue::Bool(b)) => *b,
            Some(JsonValue::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(JsonValue::String(s)) => !s.is_empty(),
            Some(JsonValue::Array(_) | JsonValue::Object(_)) => true,
            Some(JsonValue::Null) | None => false,
        }
    }

    pub fn extras(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.extras.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Builds a context from `{"version": n, ...extras}`. A missing version
    /// means latest.
    pub fn from_json(value: JsonValue) -> crate::Result<Self> {
        let spec: ContextSpec = serde_json::from_value(value)?;
        Ok(spec.into())
    }
}

#[derive(Debug, Deserialize)]
struct ContextSpec {
    version: Option<u32>,
    #[serde(flatten)]
    extras: BTreeMap<String, JsonValue>,
}

impl From<ContextSpec> for Context {
    fn from(spec: ContextSpec) -> Self {
        Self {
            version: spec.version.unwrap_or(LATEST).max(1),
            extras: Arc::new(spec.extras),
        }
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ContextSpec::deserialize(deserializer).map(Into::into)
    }
}
