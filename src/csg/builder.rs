// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Term builder
//!
//! Walks an instantiated node tree and produces the boolean term tree the
//! normalizer consumes. Transformations and colors are accumulated top-down
//! into each leaf. `#` subtrees are recorded as highlights and stay part of
//! the root term; `%` subtrees are recorded as background and removed from
//! it; `*` subtrees are skipped.

use super::term::{create_operation, CsgLeaf, CsgNode};
use crate::ast::{AbstractNode, Fingerprint, NodeKind, NodeTree};
use crate::geometry::{BooleanOp, Geometry, GeometryCaches, GeometryEvaluator, Primitive};
use crate::render::{CancelToken, Cancelled};
use indexmap::IndexMap;
use nalgebra::Matrix4;
use std::sync::Arc;

/// Terms produced from one node tree
#[derive(Debug, Clone, Default)]
pub struct CsgTerms {
    pub root: Option<CsgNode>,
    pub highlights: Vec<CsgNode>,
    pub background: Vec<CsgNode>,
    /// Leaf geometry computed while building, for the mesh cache
    pub fresh: IndexMap<Fingerprint, Arc<Geometry>>,
}

#[derive(Debug, Clone, Copy)]
struct State {
    matrix: Matrix4<f64>,
    color: Option<[f64; 4]>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            matrix: Matrix4::identity(),
            color: None,
        }
    }
}

pub struct CsgTermBuilder<'a> {
    tree: &'a NodeTree,
    caches: Option<&'a GeometryCaches>,
    cancel: CancelToken,
    highlights: Vec<CsgNode>,
    background: Vec<CsgNode>,
    fresh: IndexMap<Fingerprint, Arc<Geometry>>,
}

impl<'a> CsgTermBuilder<'a> {
    pub fn new(tree: &'a NodeTree) -> Self {
        Self {
            tree,
            caches: None,
            cancel: CancelToken::new(),
            highlights: Vec::new(),
            background: Vec::new(),
            fresh: IndexMap::new(),
        }
    }

    /// Leaf geometry is looked up in the caches before it is computed
    pub fn with_caches(mut self, caches: &'a GeometryCaches) -> Self {
        self.caches = Some(caches);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn build(mut self) -> Result<CsgTerms, Cancelled> {
        let root = self.visit(self.tree.root(), State::default())?;
        Ok(CsgTerms {
            root,
            highlights: self.highlights,
            background: self.background,
            fresh: self.fresh,
        })
    }

    fn visit(&mut self, node: &AbstractNode, state: State) -> Result<Option<CsgNode>, Cancelled> {
        self.cancel.check()?;
        if node.modifiers.disabled {
            return Ok(None);
        }

        let term = match &node.kind {
            kind if kind.is_primitive() => self.primitive_leaf(node, state),
            NodeKind::Render { .. } => self.render_leaf(node, state)?,
            NodeKind::Transform(op) => {
                let state = State {
                    matrix: state.matrix * op.to_matrix(),
                    ..state
                };
                self.apply_to_children(node, BooleanOp::Union, state)?
            }
            NodeKind::Color(color) => {
                let state = State {
                    color: state.color.or(Some(*color)),
                    ..state
                };
                self.apply_to_children(node, BooleanOp::Union, state)?
            }
            NodeKind::Difference => self.apply_to_children(node, BooleanOp::Difference, state)?,
            NodeKind::Intersection => self.apply_to_children(node, BooleanOp::Intersection, state)?,
            _ => self.apply_to_children(node, BooleanOp::Union, state)?,
        };

        let Some(term) = term else {
            return Ok(None);
        };
        if node.modifiers.highlight {
            self.highlights.push(term.clone());
        }
        if node.modifiers.background {
            self.background.push(term);
            return Ok(None);
        }
        Ok(Some(term))
    }

    /// The first child with a term seeds the fold; later ones are combined with `op`
    fn apply_to_children(&mut self, node: &AbstractNode, op: BooleanOp, state: State) -> Result<Option<CsgNode>, Cancelled> {
        let mut acc = None;
        let mut seeded = false;
        for child in &node.children {
            let Some(term) = self.visit(child, state)? else {
                continue;
            };
            acc = if seeded {
                create_operation(op, acc, Some(term))
            } else {
                Some(term)
            };
            seeded = true;
        }
        Ok(acc)
    }

    fn primitive_leaf(&mut self, node: &AbstractNode, state: State) -> Option<CsgNode> {
        let fingerprint = self.tree.fingerprint(node)?.to_owned();
        let geometry = match self.cached(&fingerprint) {
            Some(geometry) => geometry,
            None => {
                let mesh = Primitive::from_node(&node.kind)?.to_mesh();
                let geometry = Arc::new(Geometry::new(mesh));
                self.fresh.insert(fingerprint, geometry.clone());
                geometry
            }
        };
        self.leaf(geometry, node, state)
    }

    /// `render()` subtrees become a single leaf of evaluated geometry
    fn render_leaf(&mut self, node: &AbstractNode, state: State) -> Result<Option<CsgNode>, Cancelled> {
        let Some(fingerprint) = self.tree.fingerprint(node).map(str::to_owned) else {
            return Ok(None);
        };
        let geometry = match self.cached(&fingerprint) {
            Some(geometry) => Some(geometry),
            None => {
                let mut evaluator = GeometryEvaluator::new(self.tree);
                if let Some(caches) = self.caches {
                    evaluator = evaluator.with_caches(caches);
                }
                let token = self.cancel.clone();
                let geometry = evaluator.evaluate(node, &mut |_| token.check())?;
                if let Some(geometry) = &geometry {
                    self.fresh.insert(fingerprint, geometry.clone());
                }
                geometry
            }
        };
        Ok(geometry.and_then(|g| self.leaf(g, node, state)))
    }

    fn cached(&self, fingerprint: &str) -> Option<Arc<Geometry>> {
        if let Some(geometry) = self.fresh.get(fingerprint) {
            return Some(geometry.clone());
        }
        self.caches?.lookup(fingerprint)
    }

    /// Empty geometry contributes no leaf
    fn leaf(&self, geometry: Arc<Geometry>, node: &AbstractNode, state: State) -> Option<CsgNode> {
        if geometry.is_empty() {
            return None;
        }
        Some(CsgNode::leaf(CsgLeaf::new(
            geometry,
            state.matrix,
            state.color,
            format!("{}{}", node.kind.name(), node.index),
            node.index,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{TransformOp, Vec3};
    use crate::diagnostics::Diagnostics;
    use crate::script::Modifiers;

    fn cube(index: usize, size: f64) -> AbstractNode {
        AbstractNode::new(
            NodeKind::Cube {
                size: Vec3::new(size, size, size),
                center: false,
            },
            index,
        )
    }

    fn flagged(node: AbstractNode, modifiers: Modifiers) -> AbstractNode {
        node.with_modifiers(modifiers)
    }

    fn build(root: AbstractNode) -> CsgTerms {
        let tree = NodeTree::new(root);
        CsgTermBuilder::new(&tree).build().unwrap_or_default()
    }

    #[test]
    fn test_difference_term() {
        let root = AbstractNode::new(NodeKind::Difference, 0).with_children(vec![cube(1, 10.0), cube(2, 5.0)]);
        let terms = build(root);
        assert_eq!(terms.root.map(|t| t.dump()).as_deref(), Some("(cube1 - cube2)"));
        assert!(terms.highlights.is_empty());
        assert_eq!(terms.fresh.len(), 2);
    }

    #[test]
    fn test_transform_and_color_accumulate() {
        let inner = AbstractNode::new(NodeKind::Color([0.0, 1.0, 0.0, 1.0]), 2).with_children(vec![cube(3, 1.0)]);
        let outer = AbstractNode::new(NodeKind::Color([1.0, 0.0, 0.0, 1.0]), 1).with_children(vec![inner]);
        let root = AbstractNode::new(NodeKind::Transform(TransformOp::Translate(Vec3::new(0.0, 0.0, 7.0))), 0)
            .with_children(vec![outer]);

        let terms = build(root);
        let root = terms.root.unwrap_or_else(|| panic!("missing root term"));
        let leaves = root.leaves();
        assert_eq!(leaves[0].color, Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(leaves[0].bbox.min.z, 7.0);
    }

    #[test]
    fn test_modifiers() {
        let highlight = Modifiers {
            highlight: true,
            ..Default::default()
        };
        let background = Modifiers {
            background: true,
            ..Default::default()
        };
        let disabled = Modifiers {
            disabled: true,
            ..Default::default()
        };
        let root = AbstractNode::new(NodeKind::Group, 0).with_children(vec![
            flagged(cube(1, 1.0), highlight),
            flagged(cube(2, 2.0), background),
            flagged(cube(3, 3.0), disabled),
        ]);

        let terms = build(root);
        assert_eq!(terms.root.map(|t| t.dump()).as_deref(), Some("cube1"));
        assert_eq!(terms.highlights.len(), 1);
        assert_eq!(terms.background.iter().map(CsgNode::dump).collect::<Vec<_>>(), ["cube2"]);
    }

    #[test]
    fn test_empty_operations_degrade() {
        let root = AbstractNode::new(NodeKind::Group, 0).with_children(vec![
            AbstractNode::new(NodeKind::Difference, 1),
            AbstractNode::new(NodeKind::Intersection, 2).with_children(vec![cube(3, 1.0), cube(4, 0.0)]),
        ]);
        let terms = build(root);
        assert_eq!(terms.root.map(|t| t.dump()).as_deref(), Some("cube3"));
    }

    #[test]
    fn test_render_node_is_one_leaf() {
        let root = AbstractNode::new(NodeKind::Render { convexity: 1 }, 0)
            .with_children(vec![cube(1, 1.0), cube(2, 2.0)]);
        let tree = NodeTree::new(root);
        let caches = GeometryCaches::new(8, 8, &Diagnostics::silent());
        let terms = CsgTermBuilder::new(&tree).with_caches(&caches).build();
        let dump = terms.ok().and_then(|t| t.root).map(|t| t.dump());
        assert_eq!(dump.as_deref(), Some("render0"));
    }

    #[test]
    fn test_cached_leaf_is_marked_recently_used() {
        let tree = NodeTree::new(cube(0, 1.0));
        let fingerprint = tree.fingerprint(tree.root()).map(str::to_owned).unwrap_or_default();
        let caches = GeometryCaches::new(8, 8, &Diagnostics::silent());
        let geometry = Arc::new(Geometry::new(Primitive::cube(Vec3::new(1.0, 1.0, 1.0), false).to_mesh()));
        caches.mesh().put(fingerprint.clone(), geometry.clone());
        caches.mesh().put("other".into(), geometry);

        let terms = CsgTermBuilder::new(&tree).with_caches(&caches).build().unwrap_or_default();
        assert!(terms.root.is_some());
        assert!(terms.fresh.is_empty());
        assert_eq!(caches.mesh().keys(), vec!["other".to_string(), fingerprint]);
    }

    #[test]
    fn test_cancelled_build() {
        let tree = NodeTree::new(cube(0, 1.0));
        let token = CancelToken::new();
        token.cancel();
        assert!(CsgTermBuilder::new(&tree).with_cancel(token).build().is_err());
    }
}
