// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry evaluator
//!
//! Evaluates a node subtree bottom-up into a [`Geometry`]. Subtrees already
//! present in the solid cache are reused; everything computed here is kept
//! aside in [`GeometryEvaluator::into_fresh`] so the caller decides when the
//! cache is written.

use super::boolean::{self, BooleanOp};
use super::{Geometry, GeometryCaches, Mesh, Primitive};
use crate::ast::{AbstractNode, Fingerprint, NodeKind, NodeTree};
use crate::render::Cancelled;
use indexmap::IndexMap;
use std::sync::Arc;

/// Called once per evaluated node with the number of nodes done so far
pub type Checkpoint<'c> = dyn FnMut(usize) -> Result<(), Cancelled> + 'c;

pub struct GeometryEvaluator<'a> {
    tree: &'a NodeTree,
    caches: Option<&'a GeometryCaches>,
    fresh: IndexMap<Fingerprint, Arc<Geometry>>,
    visited: usize,
}

impl<'a> GeometryEvaluator<'a> {
    pub fn new(tree: &'a NodeTree) -> Self {
        Self {
            tree,
            caches: None,
            fresh: IndexMap::new(),
            visited: 0,
        }
    }

    /// Reuse geometry from the solid cache; hits are marked recently used
    /// but nothing is inserted
    pub fn with_caches(mut self, caches: &'a GeometryCaches) -> Self {
        self.caches = Some(caches);
        self
    }

    /// Evaluate `node`, which must belong to the evaluator's tree.
    ///
    /// `None` means the subtree produced no geometry at all (an empty group),
    /// as opposed to an empty geometry.
    pub fn evaluate(
        &mut self,
        node: &AbstractNode,
        checkpoint: &mut Checkpoint<'_>,
    ) -> Result<Option<Arc<Geometry>>, Cancelled> {
        let fingerprint = self.tree.fingerprint(node).map(str::to_owned);
        if let Some(geometry) = fingerprint.as_deref().and_then(|fp| self.lookup(fp)) {
            self.visited += node.node_count();
            checkpoint(self.visited)?;
            return Ok(Some(geometry));
        }

        let mesh = match &node.kind {
            kind if kind.is_primitive() => Primitive::from_node(kind).map(|p| p.to_mesh()),
            NodeKind::Transform(op) => self
                .apply_to_children(node, BooleanOp::Union, checkpoint)?
                .map(|mesh| mesh.transformed(&op.to_matrix())),
            NodeKind::Difference => self.apply_to_children(node, BooleanOp::Difference, checkpoint)?,
            NodeKind::Intersection => self.apply_to_children(node, BooleanOp::Intersection, checkpoint)?,
            _ => self.apply_to_children(node, BooleanOp::Union, checkpoint)?,
        };

        self.visited += 1;
        checkpoint(self.visited)?;

        let Some(mesh) = mesh else {
            return Ok(None);
        };
        let geometry = Arc::new(Geometry::new(mesh));
        if let Some(fingerprint) = fingerprint {
            self.fresh.insert(fingerprint, geometry.clone());
        }
        Ok(Some(geometry))
    }

    /// Background and disabled children take no part in the result
    fn apply_to_children(
        &mut self,
        node: &AbstractNode,
        op: BooleanOp,
        checkpoint: &mut Checkpoint<'_>,
    ) -> Result<Option<Mesh>, Cancelled> {
        let mut operands = Vec::with_capacity(node.children.len());
        let mut first = true;
        for child in &node.children {
            if child.modifiers.background || child.modifiers.disabled {
                continue;
            }
            let geometry = self.evaluate(child, checkpoint)?;
            let is_first = std::mem::replace(&mut first, false);
            match geometry {
                Some(geometry) if !geometry.is_empty() => operands.push(geometry),
                // Intersecting with nothing gives nothing
                _ if op == BooleanOp::Intersection => return Ok(Some(Mesh::empty())),
                // Subtracting from nothing gives nothing
                _ if op == BooleanOp::Difference && is_first => return Ok(Some(Mesh::empty())),
                _ => {}
            }
        }
        Ok(boolean::fold(op, operands.iter().map(|g| &g.mesh)))
    }

    fn lookup(&self, fingerprint: &str) -> Option<Arc<Geometry>> {
        self.fresh
            .get(fingerprint)
            .cloned()
            .or_else(|| self.caches.and_then(|c| c.solid().get(fingerprint)))
    }

    /// Nodes evaluated or reused so far
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Geometry computed by this evaluator, in evaluation order
    pub fn into_fresh(self) -> IndexMap<Fingerprint, Arc<Geometry>> {
        self.fresh
    }
}
