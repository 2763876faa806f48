// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! `search()`: element and substring search over strings and tables
//!
//! `num_returns_per_match` selects the result shape: `1` returns the first
//! match index per search element, `0` returns every match, `n > 1` returns up
//! to `n` matches. Strings compare by code point.

use super::{BuiltinContext, BuiltinError, Builtins};
use crate::value::Value;

pub(super) fn register(builtins: &mut Builtins) {
    builtins.register(
        "search",
        search,
        &["search(string , string or vector [, num_returns_per_match [, index_col_num ] ] ) -> vector"],
    );
}

fn index(j: usize) -> Value {
    Value::Number(j as f64)
}

/// Outcome of scanning the table for one search element
struct Matches {
    /// Indices collected when more than one result per element is wanted
    all: Vec<Value>,
    count: u32,
}

/// Scan `candidates` for elements accepted by `is_match`, pushing the first
/// index straight into `results` when only one result per element is wanted.
fn scan(
    candidates: impl Iterator<Item = (usize, bool)>,
    num_returns: u32,
    results: &mut Vec<Value>,
) -> Matches {
    let mut matches = Matches {
        all: Vec::new(),
        count: 0,
    };
    for (j, is_match) in candidates {
        if !is_match {
            continue;
        }
        matches.count += 1;
        if num_returns == 1 {
            results.push(index(j));
            break;
        }
        matches.all.push(index(j));
        if num_returns > 1 && matches.count >= num_returns {
            break;
        }
    }
    matches
}

fn wants_groups(num_returns: u32) -> bool {
    num_returns == 0 || num_returns > 1
}

/// Each code point of `find` against each code point of `table`
fn search_in_string(find: &str, table: &str, num_returns: u32) -> Vec<Value> {
    let mut results = Vec::new();
    for c in find.chars() {
        let matches = scan(table.chars().map(|t| t == c).enumerate(), num_returns, &mut results);
        if wants_groups(num_returns) {
            results.push(Value::Vector(matches.all));
        }
    }
    results
}

/// Each code point of `find` against the first code point of column
/// `index_col` of every table row
fn search_in_table(
    ctx: &BuiltinContext<'_>,
    find: &str,
    table: &[Value],
    num_returns: u32,
    index_col: usize,
) -> Vec<Value> {
    let mut keys = Vec::with_capacity(table.len());
    for (j, row) in table.iter().enumerate() {
        let entry = row.as_vector_or_empty();
        if entry.len() <= index_col {
            ctx.warn(format!(
                "Invalid entry in search vector at index {}, required number of values in the entry: {}. Invalid entry: {}",
                j,
                index_col + 1,
                row.to_echo_string()
            ));
            return Vec::new();
        }
        keys.push(entry[index_col].to_string().chars().next());
    }

    let mut results = Vec::new();
    for c in find.chars() {
        let matches = scan(
            keys.iter().map(|k| *k == Some(c)).enumerate(),
            num_returns,
            &mut results,
        );
        if matches.count == 0 {
            ctx.warn(format!("search term not found: \"{}\"", c));
        }
        if wants_groups(num_returns) {
            results.push(Value::Vector(matches.all));
        }
    }
    results
}

/// Does `row` match `needle`, either as a whole (column 0) or in column `index_col`
fn row_matches(needle: &Value, row: &Value, index_col: usize) -> bool {
    (index_col == 0 && needle == row)
        || row
            .as_vector_or_empty()
            .get(index_col)
            .is_some_and(|cell| needle == cell)
}

fn search(ctx: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    if args.len() < 2 {
        return Err(BuiltinError::ArgCount("search"));
    }
    let find = &args[0];
    let table = &args[1];
    let count_arg = |i: usize, default: f64| {
        args.get(i)
            .map(|v| v.try_as_number().unwrap_or(0.0))
            .unwrap_or(default)
    };
    let num_returns = count_arg(2, 1.0) as u32;
    let index_col = count_arg(3, 0.0) as usize;

    let results = match find {
        Value::Number(_) => {
            let mut results = Vec::new();
            let mut count = 0u32;
            for (j, row) in table.as_vector_or_empty().iter().enumerate() {
                if row_matches(find, row, index_col) {
                    results.push(index(j));
                    count += 1;
                    if num_returns != 0 && count >= num_returns {
                        break;
                    }
                }
            }
            results
        }
        Value::String(needle) => match table {
            Value::String(haystack) => search_in_string(needle, haystack, num_returns),
            other => search_in_table(ctx, needle, other.as_vector_or_empty(), num_returns, index_col),
        },
        Value::Vector(needles) => {
            let rows = table.as_vector_or_empty();
            let mut results = Vec::new();
            for needle in needles {
                let matches = scan(
                    rows.iter().map(|row| row_matches(needle, row, index_col)).enumerate(),
                    num_returns,
                    &mut results,
                );
                // A single-result search with no hit still reports an empty slot
                if num_returns == 1 && matches.count == 0 {
                    results.push(Value::Vector(Vec::new()));
                }
                if wants_groups(num_returns) {
                    results.push(Value::Vector(matches.all));
                }
            }
            results
        }
        _ => return Ok(Value::Undefined),
    };
    Ok(Value::Vector(results))
}

#[cfg(test)]
mod tests {
    use super::super::testing::call;
    use super::*;

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    fn letters_table() -> Value {
        Value::vector(
            ["a", "b", "c", "d", "a", "b", "c", "d", "e"]
                .iter()
                .enumerate()
                .map(|(i, s)| Value::vector([Value::string(*s), n(i as f64 + 1.0)])),
        )
    }

    #[test]
    fn test_string_in_string() {
        assert_eq!(
            call("search", &[Value::string("a"), Value::string("abcdabcd")]).0,
            Value::numbers([0.0])
        );
        assert_eq!(
            call("search", &[Value::string("a"), Value::string("abcdabcd"), n(0.0)]).0,
            Value::vector([Value::numbers([0.0, 4.0])])
        );
        assert_eq!(
            call("search", &[Value::string("e"), Value::string("abcdabcd"), n(1.0)]).0,
            Value::vector([])
        );
    }

    #[test]
    fn test_unicode_code_points() {
        assert_eq!(
            call("search", &[Value::string("🂡aЛ"), Value::string("a🂡Л🂡a🂡Л🂡a"), n(0.0)]).0,
            Value::vector([
                Value::numbers([1.0, 3.0, 5.0, 7.0]),
                Value::numbers([0.0, 4.0, 8.0]),
                Value::numbers([2.0, 6.0]),
            ])
        );
    }

    #[test]
    fn test_string_in_table() {
        assert_eq!(
            call("search", &[Value::string("abc"), letters_table(), n(1.0)]).0,
            Value::numbers([0.0, 1.0, 2.0])
        );
        assert_eq!(
            call("search", &[Value::string("abce"), letters_table(), n(2.0)]).0,
            Value::vector([
                Value::numbers([0.0, 4.0]),
                Value::numbers([1.0, 5.0]),
                Value::numbers([2.0, 6.0]),
                Value::numbers([8.0]),
            ])
        );
    }

    #[test]
    fn test_missing_term_warns_only_for_tables() {
        let (value, sink) = call("search", &[Value::string("z"), letters_table()]);
        assert_eq!(value, Value::vector([]));
        assert!(sink.contains("search term not found: \"z\""));

        let (_, sink) = call("search", &[Value::string("z"), Value::string("abc")]);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_number_on_column() {
        let mut rows: Vec<Value> = letters_table().as_vector_or_empty().to_vec();
        rows[8] = Value::vector([Value::string("e"), n(3.0)]);
        assert_eq!(
            call("search", &[n(3.0), Value::Vector(rows), n(0.0), n(1.0)]).0,
            Value::numbers([2.0, 8.0])
        );
    }

    #[test]
    fn test_vector_single_result_keeps_empty_slot() {
        let table = Value::numbers([1.0, 2.0, 3.0]);
        assert_eq!(
            call("search", &[Value::numbers([2.0, 9.0]), table.clone()]).0,
            Value::vector([n(1.0), Value::vector([])])
        );
        assert_eq!(
            call("search", &[Value::numbers([2.0, 9.0]), table, n(0.0)]).0,
            Value::vector([Value::numbers([1.0]), Value::vector([])])
        );
    }

    #[test]
    fn test_short_table_entry() {
        let table = Value::vector([Value::vector([Value::string("a")])]);
        let (value, sink) = call("search", &[Value::string("a"), table, n(1.0), n(1.0)]);
        assert_eq!(value, Value::vector([]));
        assert!(sink.contains("Invalid entry in search vector at index 0"));
    }
}
