// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Piecewise-linear table lookup

use super::{BuiltinContext, BuiltinError, Builtins};
use crate::value::Value;

pub(super) fn register(builtins: &mut Builtins) {
    builtins.register("lookup", lookup, &["lookup(key, <key,value> vector) -> value"]);
}

/// Interpolate `key` in a table of `[key, value]` rows.
///
/// The tightest bracketing rows are found in one pass; rows that are not
/// pairs of numbers are skipped. Keys outside the table clamp to the value
/// of the nearest end. Returns `None` when the first row is not a pair.
pub fn interpolate(key: f64, table: &[Value]) -> Option<f64> {
    let first = table.first()?;
    if first.as_vector_or_empty().len() < 2 {
        return None;
    }
    let (mut low_p, mut low_v) = first.get_vec2()?;
    let (mut high_p, mut high_v) = (low_p, low_v);

    for row in &table[1..] {
        let Some((p, v)) = row.get_vec2() else {
            continue;
        };
        if p <= key && (p > low_p || low_p > key) {
            low_p = p;
            low_v = v;
        }
        if p >= key && (p < high_p || high_p < key) {
            high_p = p;
            high_v = v;
        }
    }

    if key <= low_p {
        return Some(high_v);
    }
    if key >= high_p {
        return Some(low_v);
    }
    let f = (key - low_p) / (high_p - low_p);
    Some(high_v * f + low_v * (1.0 - f))
}

fn lookup(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    let [key, table] = args else {
        return Err(BuiltinError::ArgCount("lookup"));
    };
    let Some(key) = key.try_as_finite() else {
        return Err(BuiltinError::Custom(format!(
            "lookup({}, ...) first argument is not a number",
            key.to_echo_string()
        )));
    };
    Ok(interpolate(key, table.as_vector_or_empty())
        .map(Value::Number)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::super::testing::call;
    use super::*;

    fn table(rows: &[(f64, f64)]) -> Value {
        Value::vector(rows.iter().map(|(k, v)| Value::numbers([*k, *v])))
    }

    #[test]
    fn test_midpoint() {
        let (value, _) = call("lookup", &[Value::Number(5.0), table(&[(0.0, 0.0), (10.0, 10.0)])]);
        assert_eq!(value, Value::Number(5.0));
    }

    #[test]
    fn test_clamps_outside_range() {
        let t = table(&[(0.0, 1.0), (10.0, 3.0)]);
        assert_eq!(call("lookup", &[Value::Number(-5.0), t.clone()]).0, Value::Number(1.0));
        assert_eq!(call("lookup", &[Value::Number(15.0), t]).0, Value::Number(3.0));
    }

    #[test]
    fn test_unsorted_table_uses_tightest_bracket() {
        let rows = [(10.0, 100.0), (-10.0, -100.0), (0.0, 0.0), (4.0, 40.0)];
        assert_eq!(interpolate(2.0, table(&rows).as_vector_or_empty()), Some(20.0));
        assert_eq!(interpolate(7.0, table(&rows).as_vector_or_empty()), Some(70.0));
    }

    #[test]
    fn test_degenerate_tables() {
        assert!(call("lookup", &[Value::Number(1.0), Value::vector([])]).0.is_undefined());
        assert!(call("lookup", &[Value::Number(1.0), Value::numbers([1.0, 2.0])])
            .0
            .is_undefined());
    }

    #[test]
    fn test_non_numeric_key_warns() {
        let (value, sink) = call("lookup", &[Value::string("k"), table(&[(0.0, 0.0)])]);
        assert!(value.is_undefined());
        assert!(sink.contains("lookup(\"k\", ...) first argument is not a number"));
    }
}
