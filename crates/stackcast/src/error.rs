//! Engine error type.

use stackcast_buffers::BufferError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the engine reports.
///
/// Decode-time errors carry the dotted component path (`outer.inner[2]`)
/// and the byte offset they were detected at. Errors raised below the
/// component that owns them start with an empty path and are labelled on the
/// way out by [`Error::within`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("type mismatch in `{component}`: expected {expected}, found {found}")]
    TypeMismatch {
        component: String,
        expected: String,
        found: &'static str,
    },
    #[error("value {value} out of range for {kind} in `{component}`")]
    Range {
        component: String,
        kind: String,
        value: String,
    },
    #[error("truncated input in `{component}` at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput {
        component: String,
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("malformed input in `{component}` at offset {offset}: {reason}")]
    MalformedInput {
        component: String,
        offset: usize,
        reason: String,
    },
    #[error("driver not found: {0}")]
    DriverNotFound(String),
    #[error("unknown component `{component}` in stack `{stack}`")]
    UnknownComponent { stack: String, component: String },
    #[error("no value bound for `{component}` and no default declared")]
    MissingValue { component: String },
    #[error("duplicate component `{component}` in stack `{stack}`")]
    DuplicateComponent { stack: String, component: String },
    #[error("component `{component}` added in version {added} but removed in version {removed}")]
    InvalidVersionWindow {
        component: String,
        added: u32,
        removed: u32,
    },
    #[error("driver `{0}` is already registered")]
    DuplicateDriver(String),
    #[error("driver registry is already initialised")]
    RegistryFrozen,
    #[error("driver `{driver}` expects a {expected} artifact, got {found}")]
    ArtifactMismatch {
        driver: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("constraint violated in `{component}`: {reason}")]
    ConstraintViolation { component: String, reason: String },
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<BufferError> for Error {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::EndOfBuffer {
                offset,
                needed,
                remaining,
            } => Self::TruncatedInput {
                component: String::new(),
                offset,
                needed,
                remaining,
            },
            BufferError::InvalidUtf8 { offset } => Self::MalformedInput {
                component: String::new(),
                offset,
                reason: "invalid UTF-8".into(),
            },
            BufferError::InvalidWidth { width, .. } => Self::range("integer width", width),
        }
    }
}

impl Error {
    pub(crate) fn type_mismatch(expected: impl Into<String>, found: &'static str) -> Self {
        Self::TypeMismatch {
            component: String::new(),
            expected: expected.into(),
            found,
        }
    }

    pub(crate) fn range(kind: impl Into<String>, value: impl ToString) -> Self {
        Self::Range {
            component: String::new(),
            kind: kind.into(),
            value: value.to_string(),
        }
    }

    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            component: String::new(),
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn constraint(reason: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            component: String::new(),
            reason: reason.into(),
        }
    }

    /// The component path this error is attributed to, if it carries one.
    pub fn component(&self) -> Option<&str> {
        match self {
            Self::TypeMismatch { component, .. }
            | Self::Range { component, .. }
            | Self::TruncatedInput { component, .. }
            | Self::MalformedInput { component, .. }
            | Self::MissingValue { component }
            | Self::ConstraintViolation { component, .. } => Some(component),
            _ => None,
        }
    }

    /// Byte offset for decode-time errors.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::TruncatedInput { offset, .. } | Self::MalformedInput { offset, .. } => {
                Some(*offset)
            }
            _ => None,
        }
    }

    /// Prefixes the component path with `segment`.
    ///
    /// Segments starting with `[` (array indices) are glued on without a dot.
    pub fn within(mut self, segment: &str) -> Self {
        let path = match &mut self {
            Self::TypeMismatch { component, .. }
            | Self::Range { component, .. }
            | Self::TruncatedInput { component, .. }
            | Self::MalformedInput { component, .. }
            | Self::MissingValue { component }
            | Self::ConstraintViolation { component, .. } => component,
            _ => return self,
        };
        *path = if path.is_empty() {
            segment.to_owned()
        } else if path.starts_with('[') {
            format!("{segment}{path}")
        } else {
            format!("{segment}.{path}")
        };
        self
    }
}
