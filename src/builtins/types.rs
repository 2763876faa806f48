// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Type predicates, version queries and `parent_module`

use super::{single, BuiltinContext, BuiltinError, Builtins};
use crate::value::Value;

/// Language level reported by `version()`
pub const LANGUAGE_VERSION: [f64; 2] = [2019.0, 5.0];

pub(super) fn register(builtins: &mut Builtins) {
    builtins.register("version", version, &["version() -> vector"]);
    builtins.register("version_num", version_num, &["version_num() -> number"]);
    builtins.register(
        "parent_module",
        parent_module,
        &["parent_module(number) -> string"],
    );
    builtins.register("is_undef", is_undef, &["is_undef(arg) -> boolean"]);
    builtins.register("is_list", is_list, &["is_list(arg) -> boolean"]);
    builtins.register("is_num", is_num, &["is_num(arg) -> boolean"]);
    builtins.register("is_bool", is_bool, &["is_bool(arg) -> boolean"]);
    builtins.register("is_string", is_string, &["is_string(arg) -> boolean"]);
}

fn version(_: &BuiltinContext<'_>, _args: &[Value]) -> Result<Value, BuiltinError> {
    Ok(Value::numbers(LANGUAGE_VERSION))
}

fn version_num(ctx: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    let value = match args.first() {
        Some(v) => v.clone(),
        None => version(ctx, args)?,
    };
    Ok(value
        .get_vec3(0.0)
        .map(|[y, m, d]| Value::Number(y * 10000.0 + m * 100.0 + d))
        .unwrap_or_default())
}

/// Name of the n-th enclosing user module; `parent_module(0)` is the current one
fn parent_module(ctx: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    let depth = match args {
        [] => 1.0,
        [Value::Number(n)] => *n,
        [_] => return Ok(Value::Undefined),
        _ => return Err(BuiltinError::ArgCount("parent_module")),
    };
    let n = depth.trunc() as i64;
    let size = ctx.call_stack.len() as i64;
    if n < 0 {
        return Err(BuiltinError::Custom(format!(
            "Negative parent module index ({}) not allowed",
            n
        )));
    }
    if n >= size {
        return Err(BuiltinError::Custom(format!(
            "Parent module index ({}) greater than the number of modules on the stack",
            n
        )));
    }
    Ok(ctx
        .call_stack
        .get((size - 1 - n) as usize)
        .map(Value::string)
        .unwrap_or_default())
}

fn predicate(name: &'static str, args: &[Value], test: fn(&Value) -> bool) -> Result<Value, BuiltinError> {
    Ok(Value::Bool(test(single(name, args)?)))
}

/// Bare identifiers are looked up silently by the evaluator before this runs
fn is_undef(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    predicate("is_undef", args, Value::is_undefined)
}

fn is_list(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    predicate("is_list", args, |v| matches!(v, Value::Vector(_)))
}

fn is_num(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    predicate("is_num", args, |v| matches!(v, Value::Number(n) if !n.is_nan()))
}

fn is_bool(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    predicate("is_bool", args, |v| matches!(v, Value::Bool(_)))
}

fn is_string(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    predicate("is_string", args, |v| matches!(v, Value::String(_)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{call, call_with_stack};
    use super::*;
    use crate::eval::CallStack;

    #[test]
    fn test_version_num() {
        assert_eq!(call("version_num", &[]).0, Value::Number(20190500.0));
        assert_eq!(
            call("version_num", &[Value::numbers([2021.0, 1.0, 3.0])]).0,
            Value::Number(20210103.0)
        );
    }

    #[test]
    fn test_parent_module() {
        let mut stack = CallStack::new();
        stack.push("outer");
        stack.push("inner");

        assert_eq!(call_with_stack("parent_module", &[], &stack).0, Value::string("outer"));
        assert_eq!(
            call_with_stack("parent_module", &[Value::Number(0.0)], &stack).0,
            Value::string("inner")
        );

        let (value, sink) = call_with_stack("parent_module", &[Value::Number(2.0)], &stack);
        assert!(value.is_undefined());
        assert!(sink.contains("Parent module index (2) greater than the number of modules on the stack"));

        let (_, sink) = call_with_stack("parent_module", &[Value::Number(-1.0)], &stack);
        assert!(sink.contains("Negative parent module index (-1) not allowed"));
    }

    #[test]
    fn test_predicates() {
        assert_eq!(call("is_num", &[Value::Number(f64::NAN)]).0, Value::Bool(false));
        assert_eq!(call("is_num", &[Value::Number(1.0)]).0, Value::Bool(true));
        assert_eq!(call("is_list", &[Value::vector([])]).0, Value::Bool(true));
        assert_eq!(call("is_undef", &[Value::Undefined]).0, Value::Bool(true));
        assert_eq!(call("is_string", &[Value::string("")]).0, Value::Bool(true));
        assert_eq!(call("is_bool", &[Value::Number(0.0)]).0, Value::Bool(false));
    }
}
