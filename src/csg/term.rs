// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boolean term tree over placed geometry leaves

use crate::geometry::{BooleanOp, BoundingBox, Geometry};
use nalgebra::Matrix4;
use std::fmt::Write;
use std::sync::Arc;

/// Geometry placed in world space
#[derive(Debug, Clone, PartialEq)]
pub struct CsgLeaf {
    pub geometry: Arc<Geometry>,
    pub matrix: Matrix4<f64>,
    /// Set by the outermost `color()` ancestor
    pub color: Option<[f64; 4]>,
    /// Node name and creation index, e.g. `cube2`
    pub label: String,
    pub index: usize,
    /// World-space bounding box
    pub bbox: BoundingBox,
}

impl CsgLeaf {
    pub fn new(geometry: Arc<Geometry>, matrix: Matrix4<f64>, color: Option<[f64; 4]>, label: String, index: usize) -> Self {
        let bbox = geometry.bounding_box().transformed(&matrix);
        Self {
            geometry,
            matrix,
            color,
            label,
            index,
            bbox,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CsgNode {
    Leaf(Arc<CsgLeaf>),
    Operation {
        op: BooleanOp,
        left: Box<CsgNode>,
        right: Box<CsgNode>,
        bbox: BoundingBox,
    },
}

impl CsgNode {
    pub fn leaf(leaf: CsgLeaf) -> Self {
        CsgNode::Leaf(Arc::new(leaf))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            CsgNode::Leaf(leaf) => leaf.bbox,
            CsgNode::Operation { bbox, .. } => *bbox,
        }
    }

    pub fn is_operation(&self) -> bool {
        matches!(self, CsgNode::Operation { .. })
    }

    pub fn is_union(&self) -> bool {
        matches!(self, CsgNode::Operation { op: BooleanOp::Union, .. })
    }

    /// Leaves and operations
    pub fn node_count(&self) -> usize {
        match self {
            CsgNode::Leaf(_) => 1,
            CsgNode::Operation { left, right, .. } => 1 + left.node_count() + right.node_count(),
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            CsgNode::Leaf(_) => 1,
            CsgNode::Operation { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }

    /// Leaves in left-to-right order
    pub fn leaves(&self) -> Vec<&CsgLeaf> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a CsgLeaf>) {
        match self {
            CsgNode::Leaf(leaf) => out.push(leaf),
            CsgNode::Operation { left, right, .. } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
        }
    }

    /// Infix text, e.g. `(cube2 - sphere3)`
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out);
        out
    }

    fn dump_into(&self, out: &mut String) {
        match self {
            CsgNode::Leaf(leaf) => out.push_str(&leaf.label),
            CsgNode::Operation { op, left, right, .. } => {
                out.push('(');
                left.dump_into(out);
                let _ = write!(out, " {} ", op_symbol(*op));
                right.dump_into(out);
                out.push(')');
            }
        }
    }
}

pub(crate) fn op_symbol(op: BooleanOp) -> char {
    match op {
        BooleanOp::Union => '+',
        BooleanOp::Intersection => '*',
        BooleanOp::Difference => '-',
    }
}

/// Combine two optional terms, pruning by emptiness and bounding boxes.
///
/// A missing operand stands for the empty set. Intersections of disjoint
/// boxes are empty, and a subtrahend disjoint from its minuend is dropped.
pub fn create_operation(op: BooleanOp, left: Option<CsgNode>, right: Option<CsgNode>) -> Option<CsgNode> {
    let (left, right) = match (left, right) {
        (None, right) => return if op == BooleanOp::Union { right } else { None },
        (left, None) => return if op == BooleanOp::Intersection { None } else { left },
        (Some(left), Some(right)) => (left, right),
    };

    let (left_box, right_box) = (left.bounding_box(), right.bounding_box());
    let bbox = match op {
        BooleanOp::Union => left_box.union(&right_box),
        BooleanOp::Intersection => {
            let overlap = left_box.intersection(&right_box);
            if overlap.is_empty() {
                return None;
            }
            overlap
        }
        BooleanOp::Difference => {
            if !left_box.intersects(&right_box) {
                return Some(left);
            }
            left_box
        }
    };

    Some(CsgNode::Operation {
        op,
        left: Box::new(left),
        right: Box::new(right),
        bbox,
    })
}
