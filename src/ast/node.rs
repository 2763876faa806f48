// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Abstract node definitions

use crate::builtins::{cos_degrees, sin_degrees};
use crate::script::Modifiers;
use crate::value::format_number;
use nalgebra::{Matrix3, Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// 3D Vector type alias
pub type Vec3 = Vector3<f64>;

/// Node of the instantiated geometry tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstractNode {
    pub kind: NodeKind,
    /// Creation order within one instantiation run
    pub index: usize,
    pub modifiers: Modifiers,
    pub children: Vec<AbstractNode>,
}

impl AbstractNode {
    pub fn new(kind: NodeKind, index: usize) -> Self {
        Self {
            kind,
            index,
            modifiers: Modifiers::default(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<AbstractNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(AbstractNode::node_count).sum::<usize>()
    }

    /// Depth-first search for the first node flagged with `!`
    pub fn find_root_tagged(&self) -> Option<&AbstractNode> {
        if self.modifiers.root {
            return Some(self);
        }
        self.children.iter().find_map(AbstractNode::find_root_tagged)
    }

    /// The first `!`-flagged subtree if there is one, otherwise `self`
    pub fn into_effective_root(self) -> AbstractNode {
        match self.find_root_tagged() {
            Some(tagged) if tagged.index != self.index => tagged.clone(),
            _ => self,
        }
    }

    /// Single-line description, e.g. `cube(size = [1, 1, 1], center = false)`
    pub fn header(&self) -> String {
        format!("{}{}", self.modifiers.prefix(), self.kind.describe())
    }

    /// Canonical indented text of this subtree
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    pub(crate) fn dump_into(&self, out: &mut String, indent: usize) {
        let pad = "\t".repeat(indent);
        if self.children.is_empty() {
            let _ = writeln!(out, "{}{};", pad, self.header());
            return;
        }
        let _ = writeln!(out, "{}{} {{", pad, self.header());
        for child in &self.children {
            child.dump_into(out, indent + 1);
        }
        let _ = writeln!(out, "{}}}", pad);
    }
}

/// Types of abstract nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // Primitives
    Cube {
        size: Vec3,
        center: bool,
    },
    Sphere {
        r: f64,
        fragments: u32,
    },
    Cylinder {
        h: f64,
        r1: f64,
        r2: f64,
        center: bool,
        fragments: u32,
    },

    // Boolean operations
    Union,
    Difference,
    Intersection,

    /// Implicit union: files, user modules, `for`, `if`, `children()`
    Group,
    /// Subtree evaluated to exact geometry even in preview
    Render {
        convexity: u32,
    },
    Color([f64; 4]),
    Transform(TransformOp),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Cube { .. } => "cube",
            NodeKind::Sphere { .. } => "sphere",
            NodeKind::Cylinder { .. } => "cylinder",
            NodeKind::Union => "union",
            NodeKind::Difference => "difference",
            NodeKind::Intersection => "intersection",
            NodeKind::Group => "group",
            NodeKind::Render { .. } => "render",
            NodeKind::Color(_) => "color",
            NodeKind::Transform(_) => "multmatrix",
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            NodeKind::Cube { .. } | NodeKind::Sphere { .. } | NodeKind::Cylinder { .. }
        )
    }

    fn describe(&self) -> String {
        let args = match self {
            NodeKind::Cube { size, center } => {
                format!("size = {}, center = {}", vector(size.as_slice()), center)
            }
            NodeKind::Sphere { r, fragments } => {
                format!("$fn = {}, r = {}", fragments, format_number(*r))
            }
            NodeKind::Cylinder {
                h,
                r1,
                r2,
                center,
                fragments,
            } => format!(
                "$fn = {}, h = {}, r1 = {}, r2 = {}, center = {}",
                fragments,
                format_number(*h),
                format_number(*r1),
                format_number(*r2),
                center
            ),
            NodeKind::Render { convexity } => format!("convexity = {}", convexity),
            NodeKind::Color(rgba) => vector(rgba),
            NodeKind::Transform(op) => {
                let m = op.to_matrix();
                let rows: Vec<String> = (0..4)
                    .map(|r| vector(&[m[(r, 0)], m[(r, 1)], m[(r, 2)], m[(r, 3)]]))
                    .collect();
                format!("[{}]", rows.join(", "))
            }
            NodeKind::Union
            | NodeKind::Difference
            | NodeKind::Intersection
            | NodeKind::Group => String::new(),
        };
        format!("{}({})", self.name(), args)
    }
}

fn vector(items: &[f64]) -> String {
    let parts: Vec<String> = items.iter().map(|x| format_number(*x)).collect();
    format!("[{}]", parts.join(", "))
}

/// Transformation operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformOp {
    Translate(Vec3),
    /// Euler angles in degrees, applied x then y then z
    Rotate(Vec3),
    /// Rotation in degrees about an arbitrary axis
    RotateAxis {
        angle: f64,
        axis: Vec3,
    },
    Scale(Vec3),
    /// Reflection across the plane through the origin with this normal
    Mirror(Vec3),
    Multmatrix(Matrix4<f64>),
}

impl TransformOp {
    /// Convert transformation to a 4x4 matrix
    pub fn to_matrix(&self) -> Matrix4<f64> {
        match self {
            TransformOp::Translate(v) => Matrix4::new_translation(v),
            TransformOp::Rotate(angles) => {
                let rx = axis_rotation(angles.x, &Vec3::x());
                let ry = axis_rotation(angles.y, &Vec3::y());
                let rz = axis_rotation(angles.z, &Vec3::z());
                (rz * ry * rx).to_homogeneous()
            }
            TransformOp::RotateAxis { angle, axis } => {
                if axis.norm() == 0.0 {
                    return Matrix4::identity();
                }
                axis_rotation(*angle, &axis.normalize()).to_homogeneous()
            }
            TransformOp::Scale(s) => Matrix4::new_nonuniform_scaling(s),
            TransformOp::Mirror(normal) => {
                let length_squared = normal.norm_squared();
                if length_squared == 0.0 {
                    return Matrix4::identity();
                }
                let reflection = Matrix3::identity() - normal * normal.transpose() * (2.0 / length_squared);
                reflection.to_homogeneous()
            }
            TransformOp::Multmatrix(m) => *m,
        }
    }
}

/// Rotation about a unit axis, exact at multiples of 90 degrees
fn axis_rotation(degrees: f64, axis: &Vec3) -> Matrix3<f64> {
    let c = cos_degrees(degrees);
    let s = sin_degrees(degrees);
    let t = 1.0 - c;
    let (x, y, z) = (axis.x, axis.y, axis.z);
    Matrix3::new(
        t * x * x + c,
        t * x * y - s * z,
        t * x * z + s * y,
        t * x * y + s * z,
        t * y * y + c,
        t * y * z - s * x,
        t * x * z - s * y,
        t * y * z + s * x,
        t * z * z + c,
    )
}
