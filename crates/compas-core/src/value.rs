//! Typed event argument values.
//!
//! Every event name declares a parameter type; trigger expressions and
//! externally fired events are type-checked against it. Some declared
//! types are classes rather than concrete types: a `Realtime` parameter
//! accepts any of bool/int/float/timestamp, and the `Maybe*` types also
//! accept null.

use serde::ser::{Serialize, Serializer};

use crate::position::PatInstRef;
use crate::tstamp::Tstamp;

/// A typed event argument.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// No argument.
    None,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Musical timestamp.
    Tstamp(Tstamp),
    /// Short string (variable or stream name).
    String(String),
    /// Pattern instance reference.
    PatInstRef(PatInstRef),
}

/// Declared parameter type of an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    /// No argument accepted.
    None,
    /// Boolean.
    Bool,
    /// Integer.
    Int,
    /// Float.
    Float,
    /// Musical timestamp.
    Tstamp,
    /// Short string.
    String,
    /// Pattern instance reference.
    PatInstRef,
    /// Any of bool/int/float/timestamp.
    Realtime,
    /// String or null.
    MaybeString,
    /// Realtime value or null.
    MaybeRealtime,
}

impl Value {
    /// Returns the concrete type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::None => ValueType::None,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Tstamp(_) => ValueType::Tstamp,
            Value::String(_) => ValueType::String,
            Value::PatInstRef(_) => ValueType::PatInstRef,
        }
    }

    /// Returns true if this value satisfies the declared type class.
    pub fn matches(&self, declared: ValueType) -> bool {
        match declared {
            ValueType::Realtime => matches!(
                self,
                Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Tstamp(_)
            ),
            ValueType::MaybeString => matches!(self, Value::None | Value::String(_)),
            ValueType::MaybeRealtime => {
                matches!(
                    self,
                    Value::None
                        | Value::Bool(_)
                        | Value::Int(_)
                        | Value::Float(_)
                        | Value::Tstamp(_)
                )
            }
            other => self.value_type() == other,
        }
    }

    /// Converts this value to the declared type where a lossless or
    /// conventional conversion exists. Returns `None` on mismatch.
    ///
    /// Supported conversions beyond identity: int -> float,
    /// float -> int (rounded), int/float -> timestamp.
    pub fn convert(&self, declared: ValueType) -> Option<Value> {
        if self.matches(declared) {
            return Some(self.clone());
        }

        match (self, declared) {
            (Value::Int(i), ValueType::Float) => Some(Value::Float(*i as f64)),
            (Value::Float(f), ValueType::Int) => Some(Value::Int(libm::round(*f) as i64)),
            (Value::Int(i), ValueType::Tstamp) if *i >= 0 => {
                Some(Value::Tstamp(Tstamp::new(*i, 0)))
            }
            (Value::Float(f), ValueType::Tstamp) if *f >= 0.0 => {
                let beats = libm::floor(*f);
                let rem = libm::floor((*f - beats) * f64::from(crate::tstamp::BEAT_UNITS));
                Some(Value::Tstamp(Tstamp::new(
                    beats as i64,
                    (rem as i32).clamp(0, crate::tstamp::BEAT_UNITS - 1),
                )))
            }
            // Pair literals in expressions arrive as timestamps; small
            // non-negative pairs convert to pattern instance refs.
            (Value::Tstamp(t), ValueType::PatInstRef)
                if t.beats() >= 0 && t.beats() <= i64::from(i32::MAX) =>
            {
                Some(Value::PatInstRef(PatInstRef::new(t.beats() as i32, t.rem())))
            }
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Tstamp(t) => t.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::PatInstRef(p) => p.serialize(serializer),
        }
    }
}
