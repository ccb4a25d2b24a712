//! Value: what a channel cell can hold. All numeric types use f32.

use crate::transform::Mat4;
use serde::{Deserialize, Serialize};

/// Lightweight kind enum for quick dispatch; matches the host channel types
/// the bridge exposes (float | int | bool | string | matrix).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Int,
    Bool,
    Text,
    Matrix,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    Float(f32),
    Int(i32),
    Bool(bool),
    Text(String),
    Matrix(Mat4),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Int(_) => ValueKind::Int,
            Value::Bool(_) => ValueKind::Bool,
            Value::Text(_) => ValueKind::Text,
            Value::Matrix(_) => ValueKind::Matrix,
        }
    }

    /// Numeric coercion used by mirroring and channel wiring; Text and
    /// Matrix have no scalar reading and yield None.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f32),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Float(f) => Some(*f != 0.0),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Mirror rule shared by mirror-channel groups and preset mirroring:
    /// booleans flip (1 - v), every other numeric negates.
    pub fn mirrored(&self) -> Value {
        match self {
            Value::Bool(b) => Value::Bool(!b),
            Value::Float(f) => Value::Float(-f),
            Value::Int(i) => Value::Int(-i),
            other => other.clone(),
        }
    }

    pub fn f(v: f32) -> Self {
        Value::Float(v)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Float(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrored_rules() {
        assert_eq!(Value::Float(2.5).mirrored(), Value::Float(-2.5));
        assert_eq!(Value::Int(3).mirrored(), Value::Int(-3));
        assert_eq!(Value::Bool(true).mirrored(), Value::Bool(false));
        assert_eq!(
            Value::Text("x".into()).mirrored(),
            Value::Text("x".into())
        );
    }

    #[test]
    fn coercions() {
        assert_eq!(Value::Bool(true).as_f32(), Some(1.0));
        assert_eq!(Value::Int(2).as_f32(), Some(2.0));
        assert_eq!(Value::Float(0.0).as_bool(), Some(false));
        assert_eq!(Value::Text("hi".into()).as_f32(), None);
    }
}
