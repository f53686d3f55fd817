//! Value constraints attached to serializers.

use std::borrow::Cow;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::value::Value;

/// What happens when a value violates its constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintPolicy {
    /// Fail with [`Error::ConstraintViolation`].
    #[default]
    Strict,
    /// Clamp or truncate the value into bounds.
    Reshape,
    /// Pass the value through unchanged.
    Ignore,
}

/// A check applied to values before they are encoded and after they are
/// decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Numeric bounds, inclusive on both ends.
    Range {
        min: f64,
        max: f64,
        policy: ConstraintPolicy,
    },
    /// Maximum length: UTF-8 bytes for strings, bytes for byte strings,
    /// elements for arrays.
    Length { max: usize, policy: ConstraintPolicy },
}

impl Constraint {
    pub fn range(min: f64, max: f64) -> Result<Self> {
        if min.is_nan() || max.is_nan() {
            return Err(Error::constraint("range bounds must be numbers"));
        }
        if min > max {
            return Err(Error::constraint(format!(
                "minimum {min} is greater than maximum {max}"
            )));
        }
        Ok(Self::Range {
            min,
            max,
            policy: ConstraintPolicy::Strict,
        })
    }

    pub fn length(max: usize) -> Self {
        Self::Length {
            max,
            policy: ConstraintPolicy::Strict,
        }
    }

    pub fn with_policy(mut self, new_policy: ConstraintPolicy) -> Self {
        match &mut self {
            Self::Range { policy, .. } | Self::Length { policy, .. } => *policy = new_policy,
        }
        self
    }

    pub fn policy(&self) -> ConstraintPolicy {
        match self {
            Self::Range { policy, .. } | Self::Length { policy, .. } => *policy,
        }
    }

    /// Checks `value`, returning it unchanged, reshaped, or an error
    /// depending on the policy. Values the constraint does not apply to
    /// (e.g. a string under a numeric range) pass through.
    pub fn apply<'v>(&self, value: &'v Value) -> Result<Cow<'v, Value>> {
        let Some(reason) = self.violation(value) else {
            return Ok(Cow::Borrowed(value));
        };
        match self.policy() {
            ConstraintPolicy::Ignore => Ok(Cow::Borrowed(value)),
            ConstraintPolicy::Strict => Err(Error::constraint(reason)),
            ConstraintPolicy::Reshape => {
                tracing::warn!(target: "stackcast::constraint", %reason, "reshaping value");
                Ok(Cow::Owned(self.reshape(value)))
            }
        }
    }

    fn violation(&self, value: &Value) -> Option<String> {
        match self {
            Self::Range { min, max, .. } => {
                let n = value.as_f64()?;
                (n < *min || n > *max).then(|| format!("{n} is out of bounds [{min}, {max}]"))
            }
            Self::Length { max, .. } => {
                let len = length_of(value)?;
                (len > *max).then(|| format!("length {len} exceeds maximum {max}"))
            }
        }
    }

    fn reshape(&self, value: &Value) -> Value {
        match (self, value) {
            (Self::Range { min, max, .. }, Value::Float(f)) => Value::Float(f.clamp(*min, *max)),
            (Self::Range { min, max, .. }, Value::Int(i)) => {
                let lo = min.ceil();
                let hi = max.floor().max(lo);
                Value::Int((*i as f64).clamp(lo, hi) as i64)
            }
            (Self::Range { min, max, .. }, Value::UInt(u)) => {
                let lo = min.ceil().max(0.0);
                let hi = max.floor().max(lo);
                Value::UInt((*u as f64).clamp(lo, hi) as u64)
            }
            (Self::Length { max, .. }, Value::Str(s)) => {
                let mut end = (*max).min(s.len());
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                Value::Str(s[..end].to_owned())
            }
            (Self::Length { max, .. }, Value::Bytes(b)) => Value::Bytes(b[..*max].to_vec()),
            (Self::Length { max, .. }, Value::Array(items)) => {
                Value::Array(items[..*max].to_vec())
            }
            _ => value.clone(),
        }
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::Str(s) => Some(s.len()),
        Value::Bytes(b) => Some(b.len()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}
