// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Numeric built-ins

use super::{single, single_number, BuiltinContext, BuiltinError, Builtins};
use crate::value::Value;

pub(super) fn register(builtins: &mut Builtins) {
    builtins.register("abs", abs, &["abs(number) -> number"]);
    builtins.register("sign", sign, &["sign(number) -> -1, 0 or 1"]);
    builtins.register(
        "min",
        min,
        &["min(number, number, ...) -> number", "min(vector) -> number"],
    );
    builtins.register(
        "max",
        max,
        &["max(number, number, ...) -> number", "max(vector) -> number"],
    );
    builtins.register("sin", sin, &["sin(degrees) -> number"]);
    builtins.register("cos", cos, &["cos(degrees) -> number"]);
    builtins.register("asin", asin, &["asin(number) -> degrees"]);
    builtins.register("acos", acos, &["acos(number) -> degrees"]);
    builtins.register("tan", tan, &["tan(number) -> degrees"]);
    builtins.register("atan", atan, &["atan(number) -> degrees"]);
    builtins.register("atan2", atan2, &["atan2(number) -> degrees"]);
    builtins.register("round", round, &["round(number) -> number"]);
    builtins.register("ceil", ceil, &["ceil(number) -> number"]);
    builtins.register("floor", floor, &["floor(number) -> number"]);
    builtins.register("pow", pow, &["pow(base, exponent) -> number"]);
    builtins.register("sqrt", sqrt, &["sqrt(number) -> number"]);
    builtins.register("exp", exp, &["exp(number) -> number"]);
    builtins.register("log", log, &["log(number) -> number"]);
    builtins.register("ln", ln, &["ln(number) -> number"]);
    builtins.register("norm", norm, &["norm(vector) -> number"]);
    builtins.register("cross", cross, &["cross(vector, vector) -> vector"]);
}

fn unary(name: &'static str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, BuiltinError> {
    Ok(Value::Number(f(single_number(name, args)?)))
}

fn binary(name: &'static str, args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value, BuiltinError> {
    match args {
        [a, b] => match (a.try_as_number(), b.try_as_number()) {
            (Some(a), Some(b)) => Ok(Value::Number(f(a, b))),
            _ => Err(BuiltinError::ArgConvert(name)),
        },
        _ => Err(BuiltinError::ArgCount(name)),
    }
}

fn abs(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("abs", args, f64::abs)
}

fn sign(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("sign", args, |x| {
        if x < 0.0 {
            -1.0
        } else if x > 0.0 {
            1.0
        } else {
            0.0
        }
    })
}

/// Shared body of `min` and `max`. A single non-empty vector argument picks
/// an element; otherwise every argument must be a number.
fn extremum(name: &'static str, args: &[Value], prefer: fn(&Value, &Value) -> bool) -> Result<Value, BuiltinError> {
    let first = args.first().ok_or(BuiltinError::ArgCount(name))?;

    if let (1, Value::Vector(items)) = (args.len(), first) {
        if let Some(head) = items.first() {
            let best = items[1..]
                .iter()
                .fold(head, |best, item| if prefer(item, best) { item } else { best });
            return Ok(best.clone());
        }
    }

    let Value::Number(mut best) = *first else {
        return Err(BuiltinError::ArgConvert(name));
    };
    for arg in &args[1..] {
        let x = arg.try_as_number().ok_or(BuiltinError::ArgConvert(name))?;
        if prefer(&Value::Number(x), &Value::Number(best)) {
            best = x;
        }
    }
    Ok(Value::Number(best))
}

fn min(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    extremum("min", args, |a, b| a.less_than(b))
}

fn max(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    extremum("max", args, |a, b| b.less_than(a))
}

/// Sine of an angle in degrees, exact at multiples of 30 and 90
pub fn sin_degrees(x: f64) -> f64 {
    if !x.is_finite() {
        return f64::NAN;
    }
    let mut x = x % 360.0;
    if x < 0.0 {
        x += 360.0;
    }
    let oppose = x >= 180.0;
    if oppose {
        x -= 180.0;
    }
    if x > 90.0 {
        x = 180.0 - x;
    }
    let s = if x == 0.0 {
        0.0
    } else if x == 30.0 {
        0.5
    } else if x == 90.0 {
        1.0
    } else {
        x.to_radians().sin()
    };
    if oppose {
        -s
    } else {
        s
    }
}

/// Cosine of an angle in degrees, exact at multiples of 60 and 90
pub fn cos_degrees(x: f64) -> f64 {
    if !x.is_finite() {
        return f64::NAN;
    }
    let mut x = x % 360.0;
    if x < 0.0 {
        x += 360.0;
    }
    let mut oppose = x >= 180.0;
    if oppose {
        x -= 180.0;
    }
    if x > 90.0 {
        x = 180.0 - x;
        oppose = !oppose;
    }
    let c = if x == 0.0 {
        1.0
    } else if x == 60.0 {
        0.5
    } else if x == 90.0 {
        0.0
    } else {
        x.to_radians().cos()
    };
    if oppose {
        -c
    } else {
        c
    }
}

/// Tangent of an angle in degrees, exact at multiples of 45
pub fn tan_degrees(x: f64) -> f64 {
    if !x.is_finite() {
        return f64::NAN;
    }
    let mut x = x % 180.0;
    if x < 0.0 {
        x += 180.0;
    }
    if x == 0.0 {
        0.0
    } else if x == 45.0 {
        1.0
    } else if x == 90.0 {
        f64::INFINITY
    } else if x == 135.0 {
        -1.0
    } else {
        x.to_radians().tan()
    }
}

fn sin(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("sin", args, sin_degrees)
}

fn cos(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("cos", args, cos_degrees)
}

fn tan(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("tan", args, tan_degrees)
}

fn asin(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("asin", args, |x| x.asin().to_degrees())
}

fn acos(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("acos", args, |x| x.acos().to_degrees())
}

fn atan(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("atan", args, |x| x.atan().to_degrees())
}

fn atan2(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    binary("atan2", args, |y, x| y.atan2(x).to_degrees())
}

fn round(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("round", args, f64::round)
}

fn ceil(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("ceil", args, f64::ceil)
}

fn floor(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("floor", args, f64::floor)
}

fn pow(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    binary("pow", args, f64::powf)
}

fn sqrt(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("sqrt", args, f64::sqrt)
}

fn exp(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("exp", args, f64::exp)
}

/// `log(x)` is base 10, `log(b, x)` is base `b`
fn log(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    let (base, x) = match args {
        [x] => (Some(10.0), x.try_as_number()),
        [b, x] => (b.try_as_number(), x.try_as_number()),
        _ => return Err(BuiltinError::ArgCount("log")),
    };
    match (base, x) {
        (Some(base), Some(x)) => Ok(Value::Number(x.ln() / base.ln())),
        _ => Err(BuiltinError::ArgConvert("log")),
    }
}

fn ln(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    unary("ln", args, f64::ln)
}

fn norm(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    let Value::Vector(items) = single("norm", args)? else {
        return Ok(Value::Undefined);
    };
    let mut sum = 0.0;
    for item in items {
        let x = item
            .try_as_number()
            .ok_or_else(|| BuiltinError::Custom("Incorrect arguments to norm()".into()))?;
        sum += x * x;
    }
    Ok(Value::Number(sum.sqrt()))
}

fn cross(_: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    let custom = |msg: &str| BuiltinError::Custom(msg.to_string());
    let [a, b] = args else {
        return Err(custom("Invalid number of parameters for cross()"));
    };
    let (Value::Vector(a), Value::Vector(b)) = (a, b) else {
        return Err(custom("Invalid type of parameters for cross()"));
    };

    let number = |v: &Value| v.try_as_number().unwrap_or(f64::NAN);
    if a.len() == 2 && b.len() == 2 {
        return Ok(Value::Number(
            number(&a[0]) * number(&b[1]) - number(&a[1]) * number(&b[0]),
        ));
    }
    if a.len() != 3 || b.len() != 3 {
        return Err(custom("Invalid vector size of parameter for cross()"));
    }

    let mut u = [0.0; 3];
    let mut v = [0.0; 3];
    for i in 0..3 {
        let (Some(x), Some(y)) = (a[i].try_as_number(), b[i].try_as_number()) else {
            return Err(custom("Invalid value in parameter vector for cross()"));
        };
        if x.is_nan() || y.is_nan() {
            return Err(custom("Invalid value (NaN) in parameter vector for cross()"));
        }
        if x.is_infinite() || y.is_infinite() {
            return Err(custom("Invalid value (INF) in parameter vector for cross()"));
        }
        u[i] = x;
        v[i] = y;
    }

    Ok(Value::numbers([
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ]))
}
