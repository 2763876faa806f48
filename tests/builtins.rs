// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Built-in functions evaluated through the expression front end

use polyframe_studio::builtins::Builtins;
use polyframe_studio::eval::evaluate_expression;
use polyframe_studio::{Diagnostics, Value};

fn eval(source: &str) -> Value {
    evaluate_expression(source, &Builtins::standard(), &Diagnostics::silent()).unwrap()
}

#[test]
fn test_lookup_interpolates() {
    assert_eq!(eval("lookup(5, [[0, 0], [10, 10]])"), Value::number(5.0));
    assert_eq!(eval("lookup(-3, [[0, 1], [10, 2]])"), Value::number(1.0));
    assert_eq!(eval("lookup(25, [[0, 1], [10, 2]])"), Value::number(2.0));
}

#[test]
fn test_search_string_in_string() {
    assert_eq!(eval("search(\"a\", \"abcdabcd\")"), Value::numbers([0.0]));
    assert_eq!(
        eval("search(\"a\", \"abcdabcd\", 0)"),
        Value::vector([Value::numbers([0.0, 4.0])])
    );
}

#[test]
fn test_rands_equal_bounds_are_constant() {
    assert_eq!(eval("rands(0, 0, 3)"), Value::numbers([0.0, 0.0, 0.0]));
    assert_eq!(eval("rands(0, 0, 3)"), eval("rands(0, 0, 3)"));
}

#[test]
fn test_seeded_rands_repeat() {
    let first = eval("rands(0, 10, 5, 42)");
    assert_eq!(first, eval("rands(0, 10, 5, 42)"));
    assert_eq!(first.as_vector_or_empty().len(), 5);
}

#[test]
fn test_version() {
    assert_eq!(eval("version()"), Value::numbers([2019.0, 5.0]));
    assert_eq!(eval("version_num()"), Value::number(20190500.0));
}

#[test]
fn test_string_functions() {
    assert_eq!(eval("len(\"abc\")"), Value::number(3.0));
    assert_eq!(eval("str(\"a\", 1, \"b\")"), Value::string("a1b"));
    assert_eq!(eval("chr(65, 66)"), Value::string("AB"));
}

#[test]
fn test_arity_errors_warn_and_yield_undefined() {
    let (diagnostics, sink) = Diagnostics::memory();
    let value = evaluate_expression("abs()", &Builtins::standard(), &diagnostics).unwrap();
    assert!(value.is_undefined());
    assert!(sink.lines().iter().any(|line| line.starts_with("WARNING:")));
}

#[test]
fn test_parse_error() {
    assert!(evaluate_expression("1 +", &Builtins::standard(), &Diagnostics::silent()).is_err());
}
