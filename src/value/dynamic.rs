// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

use super::format::format_number;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Dynamically typed script value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    Vector(Vec<Value>),
}

impl Value {
    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn vector(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Vector(items.into_iter().collect())
    }

    /// Vector of numbers
    pub fn numbers(items: impl IntoIterator<Item = f64>) -> Self {
        Value::Vector(items.into_iter().map(Value::Number).collect())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Vector(_) => "vector",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Truthiness used by conditions and logical operators
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Vector(v) => !v.is_empty(),
        }
    }

    pub fn try_as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn try_as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Number that is neither NaN nor infinite
    pub fn try_as_finite(&self) -> Option<f64> {
        self.try_as_number().filter(|n| n.is_finite())
    }

    pub fn try_as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn try_as_vector(&self) -> Option<&[Value]> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Elements of a vector, or nothing for every other type
    pub fn as_vector_or_empty(&self) -> &[Value] {
        self.try_as_vector().unwrap_or(&[])
    }

    /// Exactly two numbers
    pub fn get_vec2(&self) -> Option<(f64, f64)> {
        match self.try_as_vector()? {
            [x, y] => Some((x.try_as_number()?, y.try_as_number()?)),
            _ => None,
        }
    }

    /// Two or three numbers; a missing third component takes `default_z`
    pub fn get_vec3(&self, default_z: f64) -> Option<[f64; 3]> {
        match self.try_as_vector()? {
            [x, y] => Some([x.try_as_number()?, y.try_as_number()?, default_z]),
            [x, y, z] => Some([x.try_as_number()?, y.try_as_number()?, z.try_as_number()?]),
            _ => None,
        }
    }

    /// All elements as numbers, if every element is one
    pub fn try_as_numbers(&self) -> Option<Vec<f64>> {
        self.try_as_vector()?
            .iter()
            .map(Value::try_as_number)
            .collect()
    }

    /// Length as reported by `len()`: elements of a vector, code points of a string
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Vector(v) => Some(v.len()),
            Value::String(s) => Some(s.chars().count()),
            _ => None,
        }
    }

    /// Rendering used inside `echo()`: strings are quoted
    pub fn to_echo_string(&self) -> String {
        match self {
            Value::String(s) => format!("\"{}\"", escape(s)),
            other => other.to_string(),
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`; only numbers and strings compare.
    /// Any comparison involving NaN is unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn less_than(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Less)
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Vector(a), Value::Vector(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undef"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Vector(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.to_echo_string())?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Vector(v)
    }
}
