// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Instantiator
//!
//! Walks a parsed script with a binding environment and produces the
//! abstract node tree. Problems are reported through [`Diagnostics`] and
//! the offending statement is skipped; nothing here fails hard.

use super::context::{is_special, CallStack, Environment, FrameId};
use super::expression::MAX_RECURSION_DEPTH;
use crate::ast::{AbstractNode, NodeKind, TransformOp, Vec3};
use crate::builtins::Builtins;
use crate::diagnostics::Diagnostics;
use crate::geometry::get_fragments_from_r;
use crate::io::{display_name, ModuleCache, ScriptModule};
use crate::script::{Expr, Instantiation, Location, ModuleDef, Scope};
use crate::value::Value;
use ahash::AHashMap;
use nalgebra::Matrix4;
use std::f64::consts::PI;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Viewport state visible to scripts as `$vpt`, `$vpr` and `$vpd`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub translation: [f64; 3],
    pub rotation: [f64; 3],
    pub distance: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            translation: [0.0, 0.0, 0.0],
            rotation: [55.0, 0.0, 25.0],
            distance: 140.0,
        }
    }
}

/// Special variables seeded before instantiation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub camera: Camera,
    /// Animation time `$t`
    pub time: f64,
    /// `$preview`, true for preview and false for full renders
    pub preview: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            time: 0.0,
            preview: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstantiateOptions {
    /// Warn when a built-in module argument cannot be converted
    pub parameter_check: bool,
    /// Warn about empty ranges
    pub range_check: bool,
}

impl Default for InstantiateOptions {
    fn default() -> Self {
        Self {
            parameter_check: true,
            range_check: false,
        }
    }
}

/// Result of one instantiation run
#[derive(Debug, Clone)]
pub struct Instantiated {
    /// `None` when the script produced no top-level object
    pub root: Option<AbstractNode>,
    /// Camera after applying `$vpt`, `$vpr` and `$vpd` from the script
    pub camera: Camera,
    /// Number of nodes created, including dropped ones
    pub node_count: usize,
}

/// Child block handed to a user module, evaluated where it was written
#[derive(Clone, Copy)]
struct Children<'a> {
    scope: &'a Scope,
    frame: FrameId,
    /// Children of the module that wrote the block
    outer: Option<&'a Children<'a>>,
}

pub struct Instantiator<'a> {
    pub(super) env: Environment,
    pub(super) stack: CallStack,
    pub(super) builtins: &'a Builtins,
    pub(super) diagnostics: &'a Diagnostics,
    pub(super) options: InstantiateOptions,
    /// Statement currently being evaluated
    pub(super) location: Location,
    pub(super) depth: usize,
    libraries: Option<&'a ModuleCache>,
    library_frames: AHashMap<PathBuf, FrameId>,
    next_index: usize,
}

impl<'a> Instantiator<'a> {
    pub fn new(builtins: &'a Builtins, diagnostics: &'a Diagnostics) -> Self {
        Self {
            env: Environment::new(""),
            stack: CallStack::new(),
            builtins,
            diagnostics,
            options: InstantiateOptions::default(),
            location: Location::default(),
            depth: 0,
            libraries: None,
            library_frames: AHashMap::new(),
            next_index: 0,
        }
    }

    pub fn with_options(mut self, options: InstantiateOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve `use <...>` through an already populated module cache
    pub fn with_libraries(mut self, cache: &'a ModuleCache) -> Self {
        self.libraries = Some(cache);
        self
    }

    /// Instantiate the top level of `module`
    pub fn instantiate(mut self, module: &ScriptModule, view: &ViewState) -> Instantiated {
        let file = self.enter_file(module, view);
        let nodes = self.instantiate_list(&module.scope.children, file, None);
        let camera = self.read_camera(file, view.camera);

        let root = (!nodes.is_empty()).then(|| {
            AbstractNode::new(NodeKind::Group, 0).with_children(nodes)
        });
        debug!(nodes = self.next_index, "instantiated");
        Instantiated {
            root,
            camera,
            node_count: self.next_index,
        }
    }

    /// Evaluate one expression at the top level of `module`
    pub fn evaluate(mut self, module: &ScriptModule, expr: &Expr) -> Value {
        let file = self.enter_file(module, &ViewState::default());
        self.eval(file, expr)
    }

    /// Seed the root frame, bind libraries and the file's own top level
    fn enter_file(&mut self, module: &ScriptModule, view: &ViewState) -> FrameId {
        // The root group takes index 0
        self.next_index = 1;
        let root = self.env.root();
        for (name, value) in [
            ("$fn", Value::number(0.0)),
            ("$fa", Value::number(12.0)),
            ("$fs", Value::number(2.0)),
            ("$t", Value::number(view.time)),
            ("$preview", Value::Bool(view.preview)),
            ("$vpt", Value::numbers(view.camera.translation)),
            ("$vpr", Value::numbers(view.camera.rotation)),
            ("$vpd", Value::number(view.camera.distance)),
            ("$children", Value::number(0.0)),
            ("$parent_modules", Value::number(0.0)),
            ("PI", Value::number(PI)),
        ] {
            self.env.set_variable(root, name, value);
        }

        let file = self
            .env
            .push_in_file(root, Arc::from(display_name(module.path.as_deref())));
        self.attach_libraries(module, file);
        self.bind_scope(file, &module.scope);
        file
    }

    fn attach_libraries(&mut self, module: &ScriptModule, frame: FrameId) {
        let Some(cache) = self.libraries else {
            return;
        };
        for path in module.used_files(cache.library_paths()) {
            if let Some(&library) = self.library_frames.get(&path) {
                self.env.add_use(frame, library);
                continue;
            }
            let Some(parsed) = cache
                .lookup(&path)
                .or_else(|| cache.evaluate(&path).map(|c| c.module))
            else {
                continue;
            };
            let library = self
                .env
                .push_in_file(self.env.root(), Arc::from(display_name(Some(&path))));
            self.library_frames.insert(path, library);
            self.attach_libraries(&parsed, library);
            self.bind_scope(library, &parsed.scope);
            self.env.add_use(frame, library);
        }
    }

    /// Apply `$vpt`, `$vpr` and `$vpd` as left by the script
    fn read_camera(&mut self, frame: FrameId, seed: Camera) -> Camera {
        let mut camera = seed;
        if let Some(vpr) = self.env.lookup(frame, "$vpr") {
            match vpr.get_vec3(0.0) {
                Some(rotation) => camera.rotation = rotation,
                None => self.diagnostics.ui_warning(format!(
                    "Unable to convert $vpr={} to a vec3 or vec2 of numbers",
                    vpr.to_echo_string()
                )),
            }
        }
        if let Some(vpt) = self.env.lookup(frame, "$vpt") {
            match vpt.get_vec3(0.0) {
                Some(translation) => camera.translation = translation,
                None => self.diagnostics.ui_warning(format!(
                    "Unable to convert $vpt={} to a vec3 or vec2 of numbers",
                    vpt.to_echo_string()
                )),
            }
        }
        if let Some(vpd) = self.env.lookup(frame, "$vpd") {
            match vpd.try_as_number() {
                Some(distance) => camera.distance = distance,
                None => self.diagnostics.ui_warning(format!(
                    "Unable to convert $vpd={} to a number",
                    vpd.to_echo_string()
                )),
            }
        }
        camera
    }

    fn allocate_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Register definitions and evaluate assignments, in source order
    fn bind_scope(&mut self, frame: FrameId, scope: &Scope) {
        self.env.define(frame, scope);
        for assignment in &scope.assignments {
            self.location = assignment.location;
            let value = self.eval(frame, &assignment.expr);
            self.env.set_variable(frame, assignment.name.clone(), value);
        }
    }

    /// Instantiate a child block in a fresh frame below `parent`
    fn instantiate_scope(&mut self, scope: &Scope, parent: FrameId, children: Option<&Children<'_>>) -> Vec<AbstractNode> {
        if scope.is_empty() {
            return Vec::new();
        }
        let frame = self.env.push(parent);
        self.bind_scope(frame, scope);
        let nodes = self.instantiate_list(&scope.children, frame, children);
        self.env.pop(frame);
        nodes
    }

    fn instantiate_list(&mut self, list: &[Instantiation], frame: FrameId, children: Option<&Children<'_>>) -> Vec<AbstractNode> {
        list.iter()
            .filter_map(|inst| self.instantiate_one(inst, frame, children))
            .collect()
    }

    fn instantiate_one(&mut self, inst: &Instantiation, frame: FrameId, children: Option<&Children<'_>>) -> Option<AbstractNode> {
        self.location = inst.location;
        let index = self.allocate_index();

        if inst.is_if() {
            return self
                .instantiate_if(inst, frame, children, index)
                .map(|node| node.with_modifiers(inst.modifiers));
        }

        let node = match self.env.lookup_module(frame, &inst.name) {
            Some((def, defined_in)) => {
                self.stack.push(&inst.name);
                let node = self.call_user_module(inst, &def, defined_in, frame, children, index);
                self.stack.pop();
                node
            }
            None => self.call_builtin_module(inst, frame, children, index),
        };
        node.map(|node| node.with_modifiers(inst.modifiers))
    }

    fn instantiate_if(&mut self, inst: &Instantiation, frame: FrameId, children: Option<&Children<'_>>, index: usize) -> Option<AbstractNode> {
        let condition = inst
            .args
            .first()
            .map(|arg| self.eval(frame, &arg.value))
            .unwrap_or_default();
        let branch = if condition.to_bool() {
            Some(&inst.children)
        } else {
            inst.else_children.as_ref()
        };
        let nodes = branch
            .map(|scope| self.instantiate_scope(scope, frame, children))
            .unwrap_or_default();
        Some(AbstractNode::new(NodeKind::Group, index).with_children(nodes))
    }

    fn call_user_module(
        &mut self,
        inst: &Instantiation,
        def: &ModuleDef,
        defined_in: FrameId,
        frame: FrameId,
        children: Option<&Children<'_>>,
        index: usize,
    ) -> Option<AbstractNode> {
        if self.depth >= MAX_RECURSION_DEPTH {
            self.diagnostics.error(format!(
                "Recursion detected calling module '{}', {}",
                inst.name,
                self.located(frame)
            ));
            return None;
        }

        let values = self.eval_args(frame, &inst.args);
        let call = self.env.push(defined_in);
        self.env.set_variable(
            call,
            "$children",
            Value::number(inst.children.children.len() as f64),
        );
        self.env.set_variable(
            call,
            "$parent_modules",
            Value::number(self.stack.len() as f64),
        );
        self.bind_parameters(call, &def.params, values);

        let block = Children {
            scope: &inst.children,
            frame,
            outer: children,
        };
        self.depth += 1;
        self.bind_scope(call, &def.body);
        let nodes = self.instantiate_list(&def.body.children, call, Some(&block));
        self.depth -= 1;
        self.env.pop(call);

        Some(AbstractNode::new(NodeKind::Group, index).with_children(nodes))
    }

    fn call_builtin_module(&mut self, inst: &Instantiation, frame: FrameId, children: Option<&Children<'_>>, index: usize) -> Option<AbstractNode> {
        let params = match builtin_parameters(&inst.name) {
            Some(params) => params,
            None => {
                self.warn_at(frame, format!("Ignoring unknown module '{}'", inst.name));
                return None;
            }
        };

        let values = self.eval_args(frame, &inst.args);
        let call = self.env.push(frame);

        let node = match inst.name.as_str() {
            "for" => {
                let nodes = self.instantiate_for(values, inst, call, children);
                Some(AbstractNode::new(NodeKind::Group, index).with_children(nodes))
            }
            "echo" => {
                self.echo(&values);
                let nodes = self.instantiate_scope(&inst.children, call, children);
                Some(AbstractNode::new(NodeKind::Group, index).with_children(nodes))
            }
            "children" => {
                let args = self.bind_builtin(call, params, values);
                let nodes = self.instantiate_children_of(&args, call, children);
                Some(AbstractNode::new(NodeKind::Group, index).with_children(nodes))
            }
            name => {
                let args = self.bind_builtin(call, params, values);
                let kind = self.builtin_kind(name, &args, call);
                let nodes = if kind.as_ref().map_or(false, NodeKind::is_primitive) {
                    Vec::new()
                } else {
                    self.instantiate_scope(&inst.children, call, children)
                };
                kind.map(|kind| AbstractNode::new(kind, index).with_children(nodes))
            }
        };
        self.env.pop(call);
        node
    }

    /// Bind built-in module arguments by name or position; `$` names go into `call`
    fn bind_builtin(&mut self, call: FrameId, params: &'static [&'static str], values: Vec<(Option<String>, Value)>) -> BuiltinArgs {
        let mut args = BuiltinArgs::default();
        let mut position = 0;
        for (name, value) in values {
            match name {
                Some(name) if is_special(&name) => self.env.set_variable(call, name, value),
                Some(name) => {
                    if let Some(&param) = params.iter().find(|p| **p == name) {
                        args.named.insert(param, value);
                    }
                }
                None => {
                    if let Some(&param) = params.get(position) {
                        args.named.insert(param, value.clone());
                    }
                    args.positional.push(value);
                    position += 1;
                }
            }
        }
        args
    }

    fn special_number(&self, frame: FrameId, name: &str, fallback: f64) -> f64 {
        self.env
            .lookup(frame, name)
            .and_then(Value::try_as_number)
            .unwrap_or(fallback)
    }

    fn fragments(&self, frame: FrameId, r: f64) -> u32 {
        get_fragments_from_r(
            r,
            self.special_number(frame, "$fn", 0.0),
            self.special_number(frame, "$fs", 2.0),
            self.special_number(frame, "$fa", 12.0),
        )
    }

    fn parameter_warning(&self, frame: FrameId, message: String) {
        if self.options.parameter_check {
            self.warn_at(frame, message);
        }
    }

    fn builtin_kind(&mut self, name: &str, args: &BuiltinArgs, frame: FrameId) -> Option<NodeKind> {
        let kind = match name {
            "cube" => {
                let mut size = Vec3::new(1.0, 1.0, 1.0);
                if let Some(value) = args.get("size") {
                    match (value.try_as_number(), value.get_vec3(0.0)) {
                        (Some(s), _) => size = Vec3::new(s, s, s),
                        (None, Some([x, y, z])) => size = Vec3::new(x, y, z),
                        _ => self.parameter_warning(
                            frame,
                            format!(
                                "Unable to convert cube(size={}, ...) parameter to a number or a vec3 of numbers",
                                value.to_echo_string()
                            ),
                        ),
                    }
                }
                NodeKind::Cube {
                    size,
                    center: args.flag("center"),
                }
            }
            "sphere" => {
                let r = match (args.number("d"), args.number("r")) {
                    (Some(d), _) => d / 2.0,
                    (None, Some(r)) => r,
                    (None, None) => {
                        if let Some(value) = args.get("r").or_else(|| args.get("d")) {
                            self.parameter_warning(
                                frame,
                                format!("Unable to convert sphere(r={}) parameter to a number", value.to_echo_string()),
                            );
                        }
                        1.0
                    }
                };
                NodeKind::Sphere {
                    r,
                    fragments: self.fragments(frame, r),
                }
            }
            "cylinder" => {
                let h = args.number("h").unwrap_or(1.0);
                let mut r1 = 1.0;
                let mut r2 = 1.0;
                if let Some(r) = args.number("r") {
                    r1 = r;
                    r2 = r;
                }
                if let Some(d) = args.number("d") {
                    r1 = d / 2.0;
                    r2 = d / 2.0;
                }
                if let Some(r) = args.number("r1") {
                    r1 = r;
                }
                if let Some(r) = args.number("r2") {
                    r2 = r;
                }
                if let Some(d) = args.number("d1") {
                    r1 = d / 2.0;
                }
                if let Some(d) = args.number("d2") {
                    r2 = d / 2.0;
                }
                if r1 < 0.0 || r2 < 0.0 || h < 0.0 {
                    self.parameter_warning(frame, "cylinder() parameters must not be negative".to_string());
                }
                NodeKind::Cylinder {
                    h,
                    r1,
                    r2,
                    center: args.flag("center"),
                    fragments: self.fragments(frame, r1.max(r2)),
                }
            }
            "union" => NodeKind::Union,
            "difference" => NodeKind::Difference,
            "intersection" => NodeKind::Intersection,
            "group" => NodeKind::Group,
            "render" => NodeKind::Render {
                convexity: args.number("convexity").map_or(1, |c| c.max(1.0) as u32),
            },
            "color" => NodeKind::Color(self.color(args, frame)),
            "translate" => {
                let v = args.get("v").and_then(|v| v.get_vec3(0.0)).unwrap_or([0.0; 3]);
                NodeKind::Transform(TransformOp::Translate(Vec3::from(v)))
            }
            "rotate" => {
                let a = args.get("a").cloned().unwrap_or_default();
                let op = match (a.try_as_number(), a.try_as_numbers()) {
                    (Some(angle), _) => {
                        let axis = args
                            .get("v")
                            .and_then(|v| v.get_vec3(0.0))
                            .unwrap_or([0.0, 0.0, 1.0]);
                        TransformOp::RotateAxis {
                            angle,
                            axis: Vec3::from(axis),
                        }
                    }
                    (None, Some(angles)) => {
                        let angle = |i: usize| angles.get(i).copied().unwrap_or(0.0);
                        TransformOp::Rotate(Vec3::new(angle(0), angle(1), angle(2)))
                    }
                    _ => TransformOp::Rotate(Vec3::zeros()),
                };
                NodeKind::Transform(op)
            }
            "scale" => {
                let v = args.get("v").cloned().unwrap_or_default();
                let factors = match (v.try_as_number(), v.get_vec3(1.0)) {
                    (Some(s), _) => Vec3::new(s, s, s),
                    (None, Some(xyz)) => Vec3::from(xyz),
                    _ => Vec3::new(1.0, 1.0, 1.0),
                };
                NodeKind::Transform(TransformOp::Scale(factors))
            }
            "mirror" => {
                let v = args.get("v").and_then(|v| v.get_vec3(0.0)).unwrap_or([1.0, 0.0, 0.0]);
                NodeKind::Transform(TransformOp::Mirror(Vec3::from(v)))
            }
            "multmatrix" => NodeKind::Transform(TransformOp::Multmatrix(matrix_argument(args.get("m")))),
            _ => return None,
        };
        Some(kind)
    }

    fn color(&mut self, args: &BuiltinArgs, frame: FrameId) -> [f64; 4] {
        let mut rgba = [-1.0, -1.0, -1.0, 1.0];
        match args.get("c") {
            Some(Value::String(name)) => match named_color(name) {
                Some(rgb) => rgba[..3].copy_from_slice(&rgb),
                None => self.warn_at(frame, format!("Unable to parse color \"{}\"", name)),
            },
            Some(value) => {
                if let Some(components) = value.try_as_numbers() {
                    for (slot, c) in rgba.iter_mut().zip(components) {
                        *slot = c;
                    }
                }
            }
            None => {}
        }
        if let Some(alpha) = args.number("alpha") {
            rgba[3] = alpha;
        }
        rgba
    }

    fn echo(&self, values: &[(Option<String>, Value)]) {
        let parts: Vec<String> = values
            .iter()
            .map(|(name, value)| match name {
                Some(name) => format!("{} = {}", name, value.to_echo_string()),
                None => value.to_echo_string(),
            })
            .collect();
        self.diagnostics.echo(parts.join(", "));
    }

    /// `for (a = ..., b = ...)`: nested loops, first variable outermost
    fn instantiate_for(
        &mut self,
        values: Vec<(Option<String>, Value)>,
        inst: &Instantiation,
        frame: FrameId,
        children: Option<&Children<'_>>,
    ) -> Vec<AbstractNode> {
        let loops: Vec<(String, Value)> = values
            .into_iter()
            .filter_map(|(name, value)| Some((name?, value)))
            .collect();
        let mut nodes = Vec::new();
        self.for_level(&loops, inst, frame, children, &mut nodes);
        nodes
    }

    fn for_level(
        &mut self,
        loops: &[(String, Value)],
        inst: &Instantiation,
        frame: FrameId,
        children: Option<&Children<'_>>,
        out: &mut Vec<AbstractNode>,
    ) {
        let Some(((name, values), rest)) = loops.split_first() else {
            out.extend(self.instantiate_scope(&inst.children, frame, children));
            return;
        };
        let items = match values {
            Value::Vector(items) => items.clone(),
            Value::Undefined => Vec::new(),
            other => vec![other.clone()],
        };
        for item in items {
            let iteration = self.env.push(frame);
            self.env.set_variable(iteration, name.clone(), item);
            self.for_level(rest, inst, iteration, children, out);
            self.env.pop(iteration);
        }
    }

    /// `children()`, `children(i)`, `children([i, j])`
    fn instantiate_children_of(&mut self, args: &BuiltinArgs, frame: FrameId, children: Option<&Children<'_>>) -> Vec<AbstractNode> {
        let Some(block) = children else {
            return Vec::new();
        };
        let count = block.scope.children.len();
        let selected: Vec<usize> = match args.positional.first() {
            None => (0..count).collect(),
            Some(value) => {
                let requested: Vec<f64> = match value {
                    Value::Number(n) => vec![*n],
                    Value::Vector(_) => value.try_as_numbers().unwrap_or_default(),
                    _ => Vec::new(),
                };
                let mut valid = Vec::new();
                for n in requested {
                    if n >= 0.0 && (n as usize) < count {
                        valid.push(n as usize);
                    } else {
                        self.warn_at(
                            frame,
                            format!("Children index ({}) out of bounds ({} children)", n, count),
                        );
                    }
                }
                valid
            }
        };
        if selected.is_empty() {
            return Vec::new();
        }

        // Child blocks run in the frame they were written in
        let scope_frame = self.env.push(block.frame);
        self.bind_scope(scope_frame, block.scope);
        let mut nodes = Vec::new();
        for i in selected {
            if let Some(node) = self.instantiate_one(&block.scope.children[i], scope_frame, block.outer) {
                nodes.push(node);
            }
        }
        self.env.pop(scope_frame);
        nodes
    }
}

/// Evaluated built-in module arguments
#[derive(Debug, Default)]
struct BuiltinArgs {
    named: AHashMap<&'static str, Value>,
    positional: Vec<Value>,
}

impl BuiltinArgs {
    fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::try_as_number)
    }

    fn flag(&self, name: &str) -> bool {
        self.get(name).map_or(false, Value::to_bool)
    }
}

/// Parameter names of built-in modules, in positional order
fn builtin_parameters(name: &str) -> Option<&'static [&'static str]> {
    let params: &'static [&'static str] = match name {
        "cube" => &["size", "center"],
        "sphere" => &["r", "d"],
        "cylinder" => &["h", "r1", "r2", "center", "r", "d", "d1", "d2"],
        "union" | "difference" | "intersection" | "group" | "echo" | "for" => &[],
        "render" => &["convexity"],
        "color" => &["c", "alpha"],
        "translate" | "scale" | "mirror" => &["v"],
        "rotate" => &["a", "v"],
        "multmatrix" => &["m"],
        "children" => &["index"],
        _ => return None,
    };
    Some(params)
}

/// 4x4 matrix from nested vectors; missing entries keep the identity
fn matrix_argument(value: Option<&Value>) -> Matrix4<f64> {
    let mut m = Matrix4::identity();
    let rows = value.map(Value::as_vector_or_empty).unwrap_or(&[]);
    for (r, row) in rows.iter().take(4).enumerate() {
        for (c, cell) in row.as_vector_or_empty().iter().take(4).enumerate() {
            if let Some(x) = cell.try_as_number() {
                m[(r, c)] = x;
            }
        }
    }
    m
}

fn named_color(name: &str) -> Option<[f64; 3]> {
    let rgb = match name.to_ascii_lowercase().as_str() {
        "black" => [0.0, 0.0, 0.0],
        "white" => [1.0, 1.0, 1.0],
        "red" => [1.0, 0.0, 0.0],
        "green" => [0.0, 128.0 / 255.0, 0.0],
        "lime" => [0.0, 1.0, 0.0],
        "blue" => [0.0, 0.0, 1.0],
        "yellow" => [1.0, 1.0, 0.0],
        "cyan" | "aqua" => [0.0, 1.0, 1.0],
        "magenta" | "fuchsia" => [1.0, 0.0, 1.0],
        "orange" => [1.0, 165.0 / 255.0, 0.0],
        "purple" => [128.0 / 255.0, 0.0, 128.0 / 255.0],
        "gray" | "grey" => [128.0 / 255.0, 128.0 / 255.0, 128.0 / 255.0],
        "silver" => [192.0 / 255.0, 192.0 / 255.0, 192.0 / 255.0],
        _ => return None,
    };
    Some(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parse_source;

    fn run(source: &str) -> (Instantiated, std::sync::Arc<crate::diagnostics::MemorySink>) {
        let (diagnostics, sink) = Diagnostics::memory();
        let module = parse_source(source, None, &[], &diagnostics).unwrap_or_default();
        let builtins = Builtins::standard();
        let result = Instantiator::new(&builtins, &diagnostics).instantiate(&module, &ViewState::default());
        (result, sink)
    }

    fn dump(source: &str) -> String {
        run(source).0.root.map(|r| r.dump()).unwrap_or_default()
    }

    #[test]
    fn test_single_cube() {
        assert_eq!(dump("cube(10);"), "group() {\n\tcube(size = [10, 10, 10], center = false);\n}\n");
    }

    #[test]
    fn test_empty_script_has_no_root() {
        let (result, _) = run("x = 1;");
        assert!(result.root.is_none());
    }

    #[test]
    fn test_indices_are_preorder() {
        let (result, _) = run("union() { cube(); sphere(); }");
        let root = result.root.unwrap_or_else(|| panic!("no root"));
        let union = &root.children[0];
        assert_eq!(union.index, 1);
        assert_eq!(union.children[0].index, 2);
        assert_eq!(union.children[1].index, 3);
    }

    #[test]
    fn test_fragments_follow_special_variables() {
        assert!(dump("sphere(5, $fn = 8);").contains("sphere($fn = 8, r = 5)"));
        // r = 5, $fs = 2: 2*pi*5/2 = 15.7 -> 16; 360/12 = 30
        assert!(dump("sphere(5);").contains("sphere($fn = 16, r = 5)"));
        assert!(dump("$fn = 6; cylinder(h = 2, d = 4);").contains("cylinder($fn = 6, h = 2, r1 = 2, r2 = 2, center = false)"));
    }

    #[test]
    fn test_user_module_with_children() {
        let source = "
            module wrap(n = 2) { echo(n = n, kids = $children); children(); }
            wrap(3) { cube(); sphere(); }
        ";
        let (result, sink) = run(source);
        assert!(sink.contains("ECHO: n = 3, kids = 2"));
        let text = result.root.map(|r| r.dump()).unwrap_or_default();
        assert!(text.contains("cube("));
        assert!(text.contains("sphere("));
    }

    #[test]
    fn test_children_see_caller_scope() {
        let source = "
            module m() { size = 99; children(0); }
            size = 4;
            m() cube(size);
        ";
        assert!(dump(source).contains("cube(size = [4, 4, 4]"));
    }

    #[test]
    fn test_for_and_if() {
        let text = dump("for (i = [1:3]) if (i != 2) translate([i, 0, 0]) cube(i);");
        assert!(text.contains("cube(size = [1, 1, 1]"));
        assert!(!text.contains("cube(size = [2, 2, 2]"));
        assert!(text.contains("cube(size = [3, 3, 3]"));
        assert!(text.contains("multmatrix([[1, 0, 0, 3], [0, 1, 0, 0], [0, 0, 1, 0], [0, 0, 0, 1]])"));
    }

    #[test]
    fn test_parent_module_and_stack() {
        let source = "
            module inner() echo(parent_module(1), $parent_modules);
            module outer() inner();
            outer();
        ";
        let (_, sink) = run(source);
        assert!(sink.contains("ECHO: \"outer\", 2"));
    }

    #[test]
    fn test_unknown_module_warns() {
        let (result, sink) = run("frobnicate();\ncube();");
        assert!(sink.contains("WARNING: Ignoring unknown module 'frobnicate', in file <untitled>, line 1"));
        assert_eq!(result.root.map(|r| r.children.len()), Some(1));
    }

    #[test]
    fn test_modifiers_are_kept() {
        let (result, _) = run("%cube(); #sphere(); *cylinder();");
        let root = result.root.unwrap_or_else(|| panic!("no root"));
        assert!(root.children[0].modifiers.background);
        assert!(root.children[1].modifiers.highlight);
        assert!(root.children[2].modifiers.disabled);
    }

    #[test]
    fn test_camera_read_back() {
        let (result, sink) = run("$vpr = [10, 20]; $vpd = \"far\"; cube();");
        assert_eq!(result.camera.rotation, [10.0, 20.0, 0.0]);
        assert_eq!(result.camera.distance, Camera::default().distance);
        assert!(sink.contains("UI-WARNING: Unable to convert $vpd=\"far\" to a number"));
    }

    #[test]
    fn test_recursive_module_is_cut_off() {
        let (_, sink) = run("module r() r(); r();");
        assert!(sink.contains("ERROR: Recursion detected calling module 'r'"));
    }

    #[test]
    fn test_user_function() {
        let (_, sink) = run("function fact(n) = n <= 1 ? 1 : n * fact(n - 1);\necho(fact(5));");
        assert!(sink.contains("ECHO: 120"));
    }
}
