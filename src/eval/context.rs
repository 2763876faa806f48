// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Variable-binding frames and the module call stack
//!
//! Frames live in a single stack owned by [`Environment`]. Ordinary names
//! resolve lexically by following `parent` links; `$` names resolve
//! dynamically by scanning every frame below the current one. A frame may
//! also list library frames whose modules and functions it can see.

use crate::script::{FunctionDef, ModuleDef, Scope};
use crate::value::Value;
use ahash::AHashMap;
use std::sync::Arc;

pub type FrameId = usize;

#[derive(Debug, Default)]
struct Frame {
    parent: Option<FrameId>,
    /// Display name of the file whose code runs in this frame
    file: Arc<str>,
    variables: AHashMap<String, Value>,
    modules: AHashMap<String, Arc<ModuleDef>>,
    functions: AHashMap<String, Arc<FunctionDef>>,
    /// Frames of `use`d libraries
    uses: Vec<FrameId>,
}

/// Stack of binding frames for one instantiation run
#[derive(Debug)]
pub struct Environment {
    frames: Vec<Frame>,
}

impl Environment {
    /// Environment with a single root frame
    pub fn new(file: &str) -> Self {
        Self {
            frames: vec![Frame {
                file: Arc::from(file),
                ..Frame::default()
            }],
        }
    }

    pub fn root(&self) -> FrameId {
        0
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Push a frame whose lexical parent is `parent`
    pub fn push(&mut self, parent: FrameId) -> FrameId {
        let file = self
            .frames
            .get(parent)
            .map(|f| f.file.clone())
            .unwrap_or_else(|| Arc::from(""));
        self.push_in_file(parent, file)
    }

    /// Push a frame for code that belongs to another file
    pub fn push_in_file(&mut self, parent: FrameId, file: Arc<str>) -> FrameId {
        self.frames.push(Frame {
            parent: Some(parent),
            file,
            ..Frame::default()
        });
        self.frames.len() - 1
    }

    /// Drop `frame` and everything above it
    pub fn pop(&mut self, frame: FrameId) {
        if frame > 0 {
            self.frames.truncate(frame);
        }
    }

    pub fn file(&self, frame: FrameId) -> &str {
        self.frames.get(frame).map(|f| &*f.file).unwrap_or("")
    }

    pub fn set_variable(&mut self, frame: FrameId, name: impl Into<String>, value: Value) {
        if let Some(f) = self.frames.get_mut(frame) {
            f.variables.insert(name.into(), value);
        }
    }

    pub fn add_use(&mut self, frame: FrameId, library: FrameId) {
        if let Some(f) = self.frames.get_mut(frame) {
            f.uses.push(library);
        }
    }

    /// Make the definitions of `scope` visible in `frame`
    pub fn define(&mut self, frame: FrameId, scope: &Scope) {
        if let Some(f) = self.frames.get_mut(frame) {
            f.modules
                .extend(scope.modules.iter().map(|(k, v)| (k.clone(), v.clone())));
            f.functions
                .extend(scope.functions.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    /// Resolve a variable as seen from `frame`
    pub fn lookup(&self, frame: FrameId, name: &str) -> Option<&Value> {
        if is_special(name) {
            let top = frame.min(self.frames.len().saturating_sub(1));
            return self.frames[..=top]
                .iter()
                .rev()
                .find_map(|f| f.variables.get(name));
        }
        self.lexical(frame).find_map(|f| f.variables.get(name))
    }

    /// Resolve a module; also returns the frame it was defined in
    pub fn lookup_module(&self, frame: FrameId, name: &str) -> Option<(Arc<ModuleDef>, FrameId)> {
        self.lookup_definition(frame, |f| f.modules.get(name).cloned())
    }

    /// Resolve a function; also returns the frame it was defined in
    pub fn lookup_function(&self, frame: FrameId, name: &str) -> Option<(Arc<FunctionDef>, FrameId)> {
        self.lookup_definition(frame, |f| f.functions.get(name).cloned())
    }

    fn lookup_definition<T>(&self, frame: FrameId, find: impl Fn(&Frame) -> Option<T>) -> Option<(T, FrameId)> {
        let mut current = Some(frame);
        while let Some(id) = current {
            let f = self.frames.get(id)?;
            if let Some(found) = find(f) {
                return Some((found, id));
            }
            for &library in &f.uses {
                if let Some(found) = self.frames.get(library).and_then(&find) {
                    return Some((found, library));
                }
            }
            current = f.parent;
        }
        None
    }

    fn lexical(&self, frame: FrameId) -> impl Iterator<Item = &Frame> {
        let mut current = Some(frame);
        std::iter::from_fn(move || {
            let f = self.frames.get(current?)?;
            current = f.parent;
            Some(f)
        })
    }
}

/// `$`-prefixed names are dynamically scoped
pub fn is_special(name: &str) -> bool {
    name.starts_with('$')
}

/// Names of the modules currently being instantiated, outermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStack {
    names: Vec<String>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str) {
        self.names.push(name.to_string());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.names.pop()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn current(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;

    #[test]
    fn test_lexical_lookup() {
        let mut env = Environment::new("main.scad");
        let root = env.root();
        env.set_variable(root, "a", Value::number(1.0));
        let inner = env.push(root);
        env.set_variable(inner, "b", Value::number(2.0));

        assert_eq!(env.lookup(inner, "a"), Some(&Value::number(1.0)));
        assert_eq!(env.lookup(inner, "b"), Some(&Value::number(2.0)));
        assert_eq!(env.lookup(root, "b"), None);
        assert_eq!(env.file(inner), "main.scad");
    }

    #[test]
    fn test_special_variables_are_dynamic() {
        let mut env = Environment::new("main.scad");
        let root = env.root();
        env.set_variable(root, "$fn", Value::number(0.0));

        let definition = env.push(root);
        let call = env.push(root);
        env.set_variable(call, "$fn", Value::number(8.0));
        // Lexically unrelated to `call`, but above it on the stack
        let body = env.push(definition);

        assert_eq!(env.lookup(body, "$fn"), Some(&Value::number(8.0)));
        env.pop(call);
        assert_eq!(env.depth(), 2);
    }

    #[test]
    fn test_definitions_and_uses() {
        let mut env = Environment::new("main.scad");
        let root = env.root();
        let library = env.push_in_file(root, Arc::from("lib.scad"));
        let lib = parse("module pill() { sphere(1); } function twice(x) = 2 * x;").unwrap_or_default();
        env.define(library, &lib.scope);

        let file = env.push(root);
        env.add_use(file, library);
        let inner = env.push(file);

        let (module, defined_in) = env.lookup_module(inner, "pill").unwrap_or_else(|| panic!("pill not found"));
        assert_eq!(module.name, "pill");
        assert_eq!(defined_in, library);
        assert!(env.lookup_function(inner, "twice").is_some());
        assert!(env.lookup_function(root, "twice").is_none());
    }

    #[test]
    fn test_call_stack() {
        let mut stack = CallStack::new();
        stack.push("outer");
        stack.push("inner");
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.get(0), Some("outer"));
        assert_eq!(stack.current(), Some("inner"));
        assert_eq!(stack.pop().as_deref(), Some("inner"));
    }
}
