// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Expression evaluation

use super::context::{is_special, FrameId};
use super::instantiate::Instantiator;
use crate::builtins::BuiltinContext;
use crate::script::{Argument, BinaryOp, Expr, Location, Parameter, UnaryOp};
use crate::value::Value;
use std::cmp::Ordering;

/// Ranges with more elements than this are not expanded
pub const MAX_RANGE_ELEMENTS: usize = 1_000_000;

/// Nested user function and module calls deeper than this are cut off
pub const MAX_RECURSION_DEPTH: usize = 256;

impl Instantiator<'_> {
    /// `in file main.scad, line 3` for the statement being evaluated
    pub(super) fn located(&self, frame: FrameId) -> String {
        format!("in file {}, line {}", self.env.file(frame), self.location.line)
    }

    pub(super) fn warn_at(&self, frame: FrameId, message: impl std::fmt::Display) {
        self.diagnostics
            .warning(format!("{}, {}", message, self.located(frame)));
    }

    pub(super) fn eval(&mut self, frame: FrameId, expr: &Expr) -> Value {
        match expr {
            Expr::Literal(value) => value.clone(),
            Expr::Ident(name) => self.lookup_variable(frame, name),
            Expr::Vector(items) => Value::Vector(items.iter().map(|e| self.eval(frame, e)).collect()),
            Expr::Range { start, step, end } => {
                let start = self.eval(frame, start);
                let step = step.as_ref().map(|s| self.eval(frame, s));
                let end = self.eval(frame, end);
                self.expand_range(frame, &start, step.as_ref(), &end)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(frame, operand);
                match op {
                    UnaryOp::Not => value.not(),
                    UnaryOp::Negate => value.neg(),
                    UnaryOp::Plus => value,
                }
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(frame, *op, lhs, rhs),
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(frame, condition).to_bool() {
                    self.eval(frame, then)
                } else {
                    self.eval(frame, otherwise)
                }
            }
            Expr::Call {
                name,
                args,
                location,
            } => self.call_function(frame, name, args, *location),
            Expr::Index { target, index } => {
                let target = self.eval(frame, target);
                let index = self.eval(frame, index);
                target.index(&index)
            }
            Expr::Member { target, name } => self.eval(frame, target).member(name),
        }
    }

    fn eval_binary(&mut self, frame: FrameId, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Value {
        match op {
            BinaryOp::And => {
                return Value::Bool(self.eval(frame, lhs).to_bool() && self.eval(frame, rhs).to_bool());
            }
            BinaryOp::Or => {
                return Value::Bool(self.eval(frame, lhs).to_bool() || self.eval(frame, rhs).to_bool());
            }
            _ => {}
        }

        let a = self.eval(frame, lhs);
        let b = self.eval(frame, rhs);
        let ordered = |accept: fn(Ordering) -> bool| Value::Bool(a.compare(&b).map(accept).unwrap_or(false));
        match op {
            BinaryOp::Equal => Value::Bool(a == b),
            BinaryOp::NotEqual => Value::Bool(a != b),
            BinaryOp::Less => ordered(Ordering::is_lt),
            BinaryOp::LessEqual => ordered(Ordering::is_le),
            BinaryOp::Greater => ordered(Ordering::is_gt),
            BinaryOp::GreaterEqual => ordered(Ordering::is_ge),
            BinaryOp::Add => a.add(&b),
            BinaryOp::Subtract => a.sub(&b),
            BinaryOp::Multiply => a.mul(&b),
            BinaryOp::Divide => a.div(&b),
            BinaryOp::Modulo => a.rem(&b),
            BinaryOp::And | BinaryOp::Or => Value::Undefined,
        }
    }

    fn lookup_variable(&mut self, frame: FrameId, name: &str) -> Value {
        match self.env.lookup(frame, name) {
            Some(value) => value.clone(),
            None => {
                self.warn_at(frame, format!("Ignoring unknown variable '{}'", name));
                Value::Undefined
            }
        }
    }

    /// Materialize `[start:step:end]` as a vector
    fn expand_range(&mut self, frame: FrameId, start: &Value, step: Option<&Value>, end: &Value) -> Value {
        let (Some(mut begin), Some(mut finish)) = (start.try_as_number(), end.try_as_number()) else {
            return Value::Undefined;
        };
        let step = match step {
            Some(value) => match value.try_as_number() {
                Some(s) => s,
                None => return Value::Undefined,
            },
            None => {
                if begin > finish {
                    std::mem::swap(&mut begin, &mut finish);
                }
                1.0
            }
        };
        if !(begin.is_finite() && finish.is_finite() && step.is_finite()) || step == 0.0 {
            return Value::Vector(Vec::new());
        }
        if (step > 0.0 && begin > finish) || (step < 0.0 && begin < finish) {
            if self.options.range_check {
                self.warn_at(frame, "Range is empty");
            }
            return Value::Vector(Vec::new());
        }

        let count = (((finish - begin) / step).floor() as usize).saturating_add(1);
        if count > MAX_RANGE_ELEMENTS {
            self.warn_at(frame, format!("Bad range parameter: too many elements ({})", count));
            return Value::Vector(Vec::new());
        }
        Value::Vector((0..count).map(|i| Value::Number(begin + step * i as f64)).collect())
    }

    /// Evaluate call arguments in the caller's frame
    pub(super) fn eval_args(&mut self, frame: FrameId, args: &[Argument]) -> Vec<(Option<String>, Value)> {
        args.iter()
            .map(|arg| (arg.name.clone(), self.eval(frame, &arg.value)))
            .collect()
    }

    /// Bind evaluated arguments to formal parameters in `frame`
    pub(super) fn bind_parameters(&mut self, frame: FrameId, params: &[Parameter], args: Vec<(Option<String>, Value)>) {
        let mut bound: Vec<Option<Value>> = vec![None; params.len()];
        let mut position = 0;
        for (name, value) in args {
            match name {
                Some(name) if is_special(&name) => self.env.set_variable(frame, name, value),
                Some(name) => {
                    if let Some(i) = params.iter().position(|p| p.name == name) {
                        bound[i] = Some(value);
                    }
                }
                None => {
                    if position < params.len() {
                        bound[position] = Some(value);
                    }
                    position += 1;
                }
            }
        }

        for (param, value) in params.iter().zip(bound) {
            let value = match (value, &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval(frame, default),
                (None, None) => Value::Undefined,
            };
            self.env.set_variable(frame, param.name.clone(), value);
        }
    }

    fn call_function(&mut self, frame: FrameId, name: &str, args: &[Argument], location: Location) -> Value {
        self.location = location;

        if let Some((def, defined_in)) = self.env.lookup_function(frame, name) {
            if self.depth >= MAX_RECURSION_DEPTH {
                self.diagnostics.error(format!(
                    "Recursion detected calling function '{}', {}",
                    name,
                    self.located(frame)
                ));
                return Value::Undefined;
            }
            let values = self.eval_args(frame, args);
            let call = self.env.push(defined_in);
            self.bind_parameters(call, &def.params, values);
            self.depth += 1;
            let result = self.eval(call, &def.body);
            self.depth -= 1;
            self.env.pop(call);
            self.location = location;
            return result;
        }

        // `is_undef(x)` must not warn about an unknown `x`
        if name == "is_undef" {
            if let [Argument {
                name: None,
                value: Expr::Ident(var),
            }] = args
            {
                return Value::Bool(self.env.lookup(frame, var).map_or(true, Value::is_undefined));
            }
        }

        if !self.builtins.contains(name) {
            self.warn_at(frame, format!("Ignoring unknown function '{}'", name));
            return Value::Undefined;
        }

        let values: Vec<Value> = args.iter().map(|arg| self.eval(frame, &arg.value)).collect();
        self.location = location;
        let site = self.located(frame);
        let ctx = BuiltinContext::new(self.diagnostics, &self.stack, &site);
        self.builtins
            .call(name, &ctx, &values)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::Builtins;
    use crate::diagnostics::Diagnostics;
    use crate::eval::evaluate_expression;

    fn eval(source: &str) -> Value {
        let builtins = Builtins::standard();
        evaluate_expression(source, &builtins, &Diagnostics::silent()).unwrap_or_default()
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Value::number(7.0));
        assert_eq!(eval("(1 + 2) * 3"), Value::number(9.0));
        assert_eq!(eval("-2 + 5 % 3"), Value::number(0.0));
        assert_eq!(eval("[1, 2] + [10, 20]"), Value::numbers([11.0, 22.0]));
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(eval("1 < 2 && 2 <= 2"), Value::Bool(true));
        assert_eq!(eval("\"a\" < 1"), Value::Bool(false));
        assert_eq!(eval("undef == undef"), Value::Bool(true));
        assert_eq!(eval("0 / 0 == 0 / 0"), Value::Bool(false));
        assert_eq!(eval("true ? 1 : 2"), Value::number(1.0));
    }

    #[test]
    fn test_ranges() {
        assert_eq!(eval("[0:3]"), Value::numbers([0.0, 1.0, 2.0, 3.0]));
        assert_eq!(eval("[0:0.5:1]"), Value::numbers([0.0, 0.5, 1.0]));
        assert_eq!(eval("[3:0]"), Value::numbers([0.0, 1.0, 2.0, 3.0]));
        assert_eq!(eval("[0:-1:3]"), Value::Vector(Vec::new()));
        assert_eq!(eval("[0:1e-300:1]"), Value::Vector(Vec::new()));
    }

    #[test]
    fn test_builtin_calls() {
        assert_eq!(eval("lookup(5, [[0, 0], [10, 10]])"), Value::number(5.0));
        assert_eq!(eval("len(\"abc\")"), Value::number(3.0));
        assert_eq!(eval("[1, 2, 3][1]"), Value::number(2.0));
        assert_eq!(eval("[4, 5, 6].z"), Value::number(6.0));
    }

    #[test]
    fn test_unknown_names_warn() {
        let builtins = Builtins::standard();
        let (diagnostics, sink) = Diagnostics::memory();
        let value = evaluate_expression("nope + frob(1)", &builtins, &diagnostics).unwrap_or_default();
        assert!(value.is_undefined());
        assert!(sink.contains("WARNING: Ignoring unknown variable 'nope'"));
        assert!(sink.contains("WARNING: Ignoring unknown function 'frob'"));
    }

    #[test]
    fn test_is_undef_is_silent() {
        let builtins = Builtins::standard();
        let (diagnostics, sink) = Diagnostics::memory();
        let value = evaluate_expression("is_undef(missing)", &builtins, &diagnostics).unwrap_or_default();
        assert_eq!(value, Value::Bool(true));
        assert!(sink.lines().is_empty());
    }
}
