// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Built-in function library
//!
//! Every built-in is a plain function from positional argument values to a
//! [`Value`]. Argument problems are returned as [`BuiltinError`] and reported
//! by [`Builtins::call`] as a located warning; the call then yields `undef`.

mod lookup;
mod math;
mod random;
mod search;
mod strings;
mod types;

pub use math::{cos_degrees, sin_degrees};
pub use random::{hash_seed, sample_uniform};

use crate::diagnostics::Diagnostics;
use crate::eval::CallStack;
use crate::value::Value;
use ahash::AHashMap;
use std::fmt;
use thiserror::Error;

/// Failure of a built-in call; always reported as a warning
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuiltinError {
    #[error("{0}() number of parameters does not match")]
    ArgCount(&'static str),
    #[error("{0}() parameter could not be converted")]
    ArgConvert(&'static str),
    #[error("{0}")]
    Custom(String),
}

/// Everything a built-in may touch besides its arguments
pub struct BuiltinContext<'a> {
    pub diagnostics: &'a Diagnostics,
    pub call_stack: &'a CallStack,
    /// Rendered call site, e.g. `in file main.scad, line 3`
    pub location: &'a str,
}

impl<'a> BuiltinContext<'a> {
    pub fn new(diagnostics: &'a Diagnostics, call_stack: &'a CallStack, location: &'a str) -> Self {
        Self {
            diagnostics,
            call_stack,
            location,
        }
    }

    /// Warning with the call site appended
    pub fn warn(&self, message: impl fmt::Display) {
        if self.location.is_empty() {
            self.diagnostics.warning(message.to_string());
        } else {
            self.diagnostics
                .warning(format!("{}, {}", message, self.location));
        }
    }
}

pub type BuiltinFn = fn(&BuiltinContext<'_>, &[Value]) -> Result<Value, BuiltinError>;

pub struct BuiltinFunction {
    pub name: &'static str,
    pub func: BuiltinFn,
    pub usage: &'static [&'static str],
}

/// Registry of built-in functions by name
pub struct Builtins {
    functions: AHashMap<&'static str, BuiltinFunction>,
}

impl Builtins {
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// Registry holding the full standard library
    pub fn standard() -> Self {
        let mut builtins = Self::empty();
        math::register(&mut builtins);
        random::register(&mut builtins);
        strings::register(&mut builtins);
        lookup::register(&mut builtins);
        search::register(&mut builtins);
        types::register(&mut builtins);
        builtins
    }

    pub fn register(&mut self, name: &'static str, func: BuiltinFn, usage: &'static [&'static str]) {
        self.functions
            .insert(name, BuiltinFunction { name, func, usage });
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn usage(&self, name: &str) -> Option<&'static [&'static str]> {
        self.functions.get(name).map(|f| f.usage)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Invoke a built-in; `None` if no function of that name exists
    pub fn call(&self, name: &str, ctx: &BuiltinContext<'_>, args: &[Value]) -> Option<Value> {
        let function = self.functions.get(name)?;
        match (function.func)(ctx, args) {
            Ok(value) => Some(value),
            Err(err) => {
                ctx.warn(&err);
                Some(Value::Undefined)
            }
        }
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::standard()
    }
}

/// The single argument of a one-argument built-in
pub(crate) fn single<'v>(name: &'static str, args: &'v [Value]) -> Result<&'v Value, BuiltinError> {
    match args {
        [value] => Ok(value),
        _ => Err(BuiltinError::ArgCount(name)),
    }
}

/// The single numeric argument of a one-argument built-in
pub(crate) fn single_number(name: &'static str, args: &[Value]) -> Result<f64, BuiltinError> {
    single(name, args)?
        .try_as_number()
        .ok_or(BuiltinError::ArgConvert(name))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::diagnostics::MemorySink;
    use std::sync::Arc;

    /// Call a standard built-in with a memory sink attached
    pub fn call(name: &str, args: &[Value]) -> (Value, Arc<MemorySink>) {
        call_with_stack(name, args, &CallStack::new())
    }

    pub fn call_with_stack(name: &str, args: &[Value], stack: &CallStack) -> (Value, Arc<MemorySink>) {
        let (diagnostics, sink) = Diagnostics::memory();
        let ctx = BuiltinContext::new(&diagnostics, stack, "in file test.scad, line 1");
        let value = Builtins::standard()
            .call(name, &ctx, args)
            .unwrap_or_default();
        (value, sink)
    }
}
