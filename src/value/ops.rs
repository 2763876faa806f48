// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Arithmetic and indexing on values
//!
//! Operations with mismatched operand types yield `Undefined` instead of failing.

use super::dynamic::Value;

impl Value {
    pub fn add(&self, rhs: &Value) -> Value {
        elementwise(self, rhs, |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Value) -> Value {
        elementwise(self, rhs, |a, b| a - b)
    }

    pub fn mul(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a * b),
            (Value::Vector(v), Value::Number(s)) | (Value::Number(s), Value::Vector(v)) => {
                scale(v, *s)
            }
            (Value::Vector(a), Value::Vector(b)) => multiply_vectors(a, b),
            _ => Value::Undefined,
        }
    }

    pub fn div(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a / b),
            (Value::Vector(v), Value::Number(s)) => Value::Vector(
                v.iter()
                    .map(|x| x.div(&Value::Number(*s)))
                    .collect(),
            ),
            (Value::Number(s), Value::Vector(v)) => Value::Vector(
                v.iter()
                    .map(|x| Value::Number(*s).div(x))
                    .collect(),
            ),
            _ => Value::Undefined,
        }
    }

    pub fn rem(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a % b),
            _ => Value::Undefined,
        }
    }

    pub fn neg(&self) -> Value {
        match self {
            Value::Number(n) => Value::Number(-n),
            Value::Vector(v) => Value::Vector(v.iter().map(Value::neg).collect()),
            _ => Value::Undefined,
        }
    }

    pub fn not(&self) -> Value {
        Value::Bool(!self.to_bool())
    }

    /// `value[index]`; strings index by code point
    pub fn index(&self, index: &Value) -> Value {
        let Some(i) = index.try_as_number() else {
            return Value::Undefined;
        };
        if i.is_nan() || i < 0.0 {
            return Value::Undefined;
        }
        let i = i.floor() as usize;
        match self {
            Value::Vector(v) => v.get(i).cloned().unwrap_or_default(),
            Value::String(s) => s
                .chars()
                .nth(i)
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// `.x`, `.y`, `.z` member access on vectors
    pub fn member(&self, name: &str) -> Value {
        let index = match name {
            "x" => 0.0,
            "y" => 1.0,
            "z" => 2.0,
            _ => return Value::Undefined,
        };
        self.index(&Value::Number(index))
    }
}

fn elementwise(lhs: &Value, rhs: &Value, op: fn(f64, f64) -> f64) -> Value {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Value::Number(op(*a, *b)),
        (Value::Vector(a), Value::Vector(b)) => Value::Vector(
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| elementwise(x, y, op))
                .collect(),
        ),
        _ => Value::Undefined,
    }
}

fn scale(v: &[Value], s: f64) -> Value {
    Value::Vector(v.iter().map(|x| x.mul(&Value::Number(s))).collect())
}

fn is_matrix(rows: &[Value]) -> bool {
    !rows.is_empty() && rows.iter().all(|r| matches!(r, Value::Vector(_)))
}

/// Dot product, matrix * vector, vector * matrix or matrix * matrix
fn multiply_vectors(a: &[Value], b: &[Value]) -> Value {
    match (is_matrix(a), is_matrix(b)) {
        (false, false) => dot(a, b),
        (true, false) => Value::Vector(
            a.iter()
                .map(|row| dot(row.as_vector_or_empty(), b))
                .collect(),
        ),
        (false, true) => {
            let columns = transpose(b);
            Value::Vector(columns.iter().map(|col| dot(a, col)).collect())
        }
        (true, true) => {
            let columns = transpose(b);
            Value::Vector(
                a.iter()
                    .map(|row| {
                        Value::Vector(
                            columns
                                .iter()
                                .map(|col| dot(row.as_vector_or_empty(), col))
                                .collect(),
                        )
                    })
                    .collect(),
            )
        }
    }
}

fn dot(a: &[Value], b: &[Value]) -> Value {
    if a.len() != b.len() {
        return Value::Undefined;
    }
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b) {
        match (x.try_as_number(), y.try_as_number()) {
            (Some(x), Some(y)) => sum += x * y,
            _ => return Value::Undefined,
        }
    }
    Value::Number(sum)
}

fn transpose(rows: &[Value]) -> Vec<Vec<Value>> {
    let width = rows
        .iter()
        .map(|r| r.as_vector_or_empty().len())
        .min()
        .unwrap_or(0);
    (0..width)
        .map(|c| {
            rows.iter()
                .map(|r| r.as_vector_or_empty()[c].clone())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_arithmetic() {
        let a = Value::numbers([1.0, 2.0, 3.0]);
        let b = Value::numbers([4.0, 5.0, 6.0]);
        assert_eq!(a.add(&b), Value::numbers([5.0, 7.0, 9.0]));
        assert_eq!(a.mul(&b), Value::Number(32.0));
        assert_eq!(a.mul(&Value::Number(2.0)), Value::numbers([2.0, 4.0, 6.0]));
        assert_eq!(a.neg(), Value::numbers([-1.0, -2.0, -3.0]));
    }

    #[test]
    fn test_matrix_vector_product() {
        let m = Value::vector([Value::numbers([0.0, -1.0]), Value::numbers([1.0, 0.0])]);
        assert_eq!(m.mul(&Value::numbers([1.0, 0.0])), Value::numbers([0.0, 1.0]));
    }

    #[test]
    fn test_mismatched_types_are_undefined() {
        assert!(Value::string("a").add(&Value::Number(1.0)).is_undefined());
        assert!(Value::Bool(true).mul(&Value::Number(1.0)).is_undefined());
    }

    #[test]
    fn test_indexing() {
        let v = Value::numbers([10.0, 20.0, 30.0]);
        assert_eq!(v.index(&Value::Number(1.0)), Value::Number(20.0));
        assert_eq!(v.member("z"), Value::Number(30.0));
        assert!(v.index(&Value::Number(3.0)).is_undefined());
        assert!(v.index(&Value::Number(-1.0)).is_undefined());
        assert_eq!(Value::string("añb").index(&Value::Number(1.0)), Value::string("ñ"));
    }
}
