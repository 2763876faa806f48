// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! String and sequence built-ins

use super::{single, BuiltinContext, BuiltinError, Builtins};
use crate::value::Value;

pub(super) fn register(builtins: &mut Builtins) {
    builtins.register("len", len, &["len(string) -> number", "len(vector) -> number"]);
    builtins.register("str", to_str, &["str(number or string, ...) -> string"]);
    builtins.register(
        "chr",
        chr,
        &["chr(number) -> string", "chr(vector) -> string", "chr(range) -> string"],
    );
    builtins.register("ord", ord, &["ord(string) -> number"]);
    builtins.register(
        "concat",
        concat,
        &["concat(number or string or vector, ...) -> vector"],
    );
}

fn len(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    single("len", args)?
        .len()
        .map(|n| Value::Number(n as f64))
        .ok_or(BuiltinError::ArgConvert("len"))
}

fn to_str(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    Ok(Value::String(args.iter().map(|v| v.to_string()).collect()))
}

/// Characters for code points; vectors are flattened, invalid code points dropped
fn push_chars(value: &Value, out: &mut String) {
    match value {
        Value::Number(n) if n.is_finite() && *n >= 1.0 => {
            if let Some(c) = char::from_u32(*n as u32) {
                out.push(c);
            }
        }
        Value::Vector(items) => items.iter().for_each(|item| push_chars(item, out)),
        _ => {}
    }
}

fn chr(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    let mut out = String::new();
    for arg in args {
        push_chars(arg, &mut out);
    }
    Ok(Value::String(out))
}

fn ord(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    match args {
        [] => Ok(Value::Undefined),
        [Value::String(s)] => Ok(s
            .chars()
            .next()
            .map(|c| Value::Number(c as u32 as f64))
            .unwrap_or_default()),
        [other] => Err(BuiltinError::Custom(format!(
            "ord() argument {} is not of type string",
            other
        ))),
        _ => Err(BuiltinError::Custom(format!(
            "ord() called with {} arguments, only 1 argument expected",
            args.len()
        ))),
    }
}

fn concat(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::Vector(items) => out.extend(items.iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::Vector(out))
}

#[cfg(test)]
mod tests {
    use super::super::testing::call;
    use super::*;

    #[test]
    fn test_len() {
        assert_eq!(call("len", &[Value::string("Лa🂡")]).0, Value::Number(3.0));
        assert_eq!(call("len", &[Value::numbers([1.0, 2.0])]).0, Value::Number(2.0));
        let (value, sink) = call("len", &[Value::Number(4.0)]);
        assert!(value.is_undefined());
        assert!(sink.contains("len() parameter could not be converted"));
    }

    #[test]
    fn test_str_concatenates_plain_text() {
        assert_eq!(
            call("str", &[Value::string("w="), Value::Number(2.5), Value::numbers([1.0])]).0,
            Value::string("w=2.5[1]")
        );
    }

    #[test]
    fn test_chr_and_ord() {
        assert_eq!(
            call("chr", &[Value::numbers([72.0, 105.0]), Value::Number(33.0)]).0,
            Value::string("Hi!")
        );
        assert_eq!(call("chr", &[Value::Number(0.0)]).0, Value::string(""));
        assert_eq!(call("ord", &[Value::string("Л")]).0, Value::Number(1051.0));
        assert!(call("ord", &[Value::string("")]).0.is_undefined());

        let (_, sink) = call("ord", &[Value::Number(3.0)]);
        assert!(sink.contains("ord() argument 3 is not of type string"));
    }

    #[test]
    fn test_concat() {
        assert_eq!(
            call("concat", &[Value::numbers([1.0, 2.0]), Value::Number(3.0), Value::string("a")]).0,
            Value::vector([
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0),
                Value::string("a")
            ])
        );
    }
}
