// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Term normalization into a sum of products
//!
//! Rewrites a term tree until every union sits above every intersection and
//! difference, and every intersection or difference has a leaf as its right
//! operand. Each union operand is then a left-deep chain that reads as one
//! product. The rewrite rules follow Goldfeather et al., "Near Real-Time CSG
//! Rendering Using Tree Normalization and Geometric Pruning" (1989):
//!
//! ```text
//! x - (y + z)  ->  (x - y) - z
//! x * (y + z)  ->  (x * y) + (x * z)
//! x - (y * z)  ->  (x - y) + (x - z)
//! x * (y * z)  ->  (x * y) * z
//! x - (y - z)  ->  (x - y) + (x * z)
//! x * (y - z)  ->  (x * y) - z
//! (x - y) * z  ->  (x * z) - y
//! (x + y) - z  ->  (x - z) + (y - z)
//! (x + y) * z  ->  (x * z) + (y * z)
//! ```

use super::term::{create_operation, CsgNode};
use crate::diagnostics::Diagnostics;
use crate::geometry::BooleanOp;
use crate::render::{CancelToken, Cancelled};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Abort {
    Overflow,
    Cancelled,
}

enum Rewrite {
    Changed(Option<CsgNode>),
    Unchanged(CsgNode),
}

pub struct CsgNormalizer {
    limit: usize,
    diagnostics: Diagnostics,
    cancel: Option<CancelToken>,
    nodecount: usize,
    rewrites: usize,
    aborted: bool,
}

impl CsgNormalizer {
    pub fn new(limit: usize, diagnostics: Diagnostics) -> Self {
        Self {
            limit,
            diagnostics,
            cancel: None,
            nodecount: 0,
            rewrites: 0,
            aborted: false,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// True if the last call gave up because the tree grew past the limit
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Normalize `root`; `Ok(None)` if the result is empty or exceeds the limit
    pub fn normalize(&mut self, root: CsgNode) -> Result<Option<CsgNode>, Cancelled> {
        self.aborted = false;
        let mut current = root;
        for pass in 1.. {
            self.nodecount = 0;
            self.rewrites = 0;
            let next = match self.normalize_pass(current) {
                Ok(Some(next)) => next,
                Ok(None) => return Ok(None),
                Err(Abort::Overflow) => return Ok(None),
                Err(Abort::Cancelled) => return Err(Cancelled),
            };
            debug!(pass, rewrites = self.rewrites, nodes = next.node_count(), "normalization pass");
            if self.rewrites == 0 {
                current = next;
                break;
            }
            if next.node_count() > self.limit {
                return Ok(self.overflow());
            }
            current = next;
        }

        if current.leaf_count() > self.limit {
            return Ok(self.overflow());
        }
        Ok(Some(current))
    }

    fn overflow(&mut self) -> Option<CsgNode> {
        self.diagnostics.warning(format!(
            "Normalized tree is growing past {} elements. Aborting normalization.",
            self.limit
        ));
        self.aborted = true;
        None
    }

    fn normalize_pass(&mut self, node: CsgNode) -> Result<Option<CsgNode>, Abort> {
        if !node.is_operation() {
            return Ok(Some(node));
        }
        if let Some(token) = &self.cancel {
            token.check().map_err(|_| Abort::Cancelled)?;
        }

        let mut node = Some(node);
        loop {
            node = self.apply_rules(node);

            self.nodecount += 1;
            if self.nodecount > self.limit {
                self.overflow();
                return Err(Abort::Overflow);
            }

            let (op, left, right) = match node {
                Some(CsgNode::Operation { op, left, right, .. }) => (op, left, right),
                other => return Ok(other),
            };
            let left = self.normalize_pass(*left)?;
            node = create_operation(op, left, Some(*right));

            let again = match &node {
                Some(CsgNode::Operation { op, left, right, .. }) => {
                    *op != BooleanOp::Union && (right.is_operation() || left.is_union())
                }
                _ => false,
            };
            if !again {
                break;
            }
        }

        match node {
            Some(CsgNode::Operation { op, left, right, .. }) => {
                let right = self.normalize_pass(*right)?;
                Ok(create_operation(op, Some(*left), right))
            }
            other => Ok(other),
        }
    }

    /// Apply rewrite rules at the top of `node` until none matches
    fn apply_rules(&mut self, mut node: Option<CsgNode>) -> Option<CsgNode> {
        while let Some(current) = node {
            match match_and_replace(current) {
                Rewrite::Changed(next) => {
                    self.rewrites += 1;
                    node = next;
                }
                Rewrite::Unchanged(current) => return Some(current),
            }
        }
        None
    }
}

fn make(op: BooleanOp, left: Option<CsgNode>, right: Option<CsgNode>) -> Option<CsgNode> {
    create_operation(op, left, right)
}

fn match_and_replace(node: CsgNode) -> Rewrite {
    use BooleanOp::{Difference, Intersection, Union};

    let (op, left, right, bbox) = match node {
        CsgNode::Operation { op, left, right, bbox } => (op, left, right, bbox),
        leaf => return Rewrite::Unchanged(leaf),
    };
    if op == Union {
        return Rewrite::Unchanged(CsgNode::Operation { op, left, right, bbox });
    }
    let x = *left;

    match *right {
        CsgNode::Operation {
            op: inner,
            left: y,
            right: z,
            ..
        } => {
            let (y, z) = (Some(*y), Some(*z));
            let result = if op == Difference {
                match inner {
                    Union => make(Difference, make(Difference, Some(x), y), z),
                    Intersection => make(Union, make(Difference, Some(x.clone()), y), make(Difference, Some(x), z)),
                    Difference => make(Union, make(Difference, Some(x.clone()), y), make(Intersection, Some(x), z)),
                }
            } else {
                match inner {
                    Union => make(Union, make(Intersection, Some(x.clone()), y), make(Intersection, Some(x), z)),
                    Intersection => make(Intersection, make(Intersection, Some(x), y), z),
                    Difference => make(Difference, make(Intersection, Some(x), y), z),
                }
            };
            Rewrite::Changed(result)
        }
        z => match x {
            CsgNode::Operation {
                op: Difference,
                left: a,
                right: b,
                ..
            } if op == Intersection => Rewrite::Changed(make(Difference, make(Intersection, Some(*a), Some(z)), Some(*b))),
            CsgNode::Operation {
                op: Union,
                left: a,
                right: b,
                ..
            } => Rewrite::Changed(make(Union, make(op, Some(*a), Some(z.clone())), make(op, Some(*b), Some(z)))),
            x => Rewrite::Unchanged(CsgNode::Operation {
                op,
                left: Box::new(x),
                right: Box::new(z),
                bbox,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::term::tests::cube_leaf;

    fn op(op: BooleanOp, left: CsgNode, right: CsgNode) -> CsgNode {
        CsgNode::Operation {
            bbox: left.bounding_box().union(&right.bounding_box()),
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn normalize(term: CsgNode, limit: usize) -> (Option<String>, Vec<String>) {
        let (diagnostics, sink) = Diagnostics::memory();
        let result = CsgNormalizer::new(limit, diagnostics).normalize(term);
        (result.ok().flatten().map(|t| t.dump()), sink.lines())
    }

    #[test]
    fn test_leaf_is_already_normal() {
        assert_eq!(normalize(cube_leaf("a", 0.0), 10).0.as_deref(), Some("a"));
    }

    #[test]
    fn test_difference_over_union() {
        let term = op(
            BooleanOp::Difference,
            cube_leaf("a", 0.0),
            op(BooleanOp::Union, cube_leaf("b", 0.2), cube_leaf("c", 0.4)),
        );
        assert_eq!(normalize(term, 10).0.as_deref(), Some("((a - b) - c)"));
    }

    #[test]
    fn test_intersection_distributes_over_union() {
        let term = op(
            BooleanOp::Intersection,
            cube_leaf("a", 0.0),
            op(BooleanOp::Union, cube_leaf("b", 0.2), cube_leaf("c", 0.4)),
        );
        assert_eq!(normalize(term, 10).0.as_deref(), Some("((a * b) + (a * c))"));
    }

    #[test]
    fn test_left_union_is_lifted() {
        let term = op(
            BooleanOp::Difference,
            op(BooleanOp::Union, cube_leaf("a", 0.0), cube_leaf("b", 0.2)),
            cube_leaf("c", 0.4),
        );
        assert_eq!(normalize(term, 10).0.as_deref(), Some("((a - c) + (b - c))"));
    }

    #[test]
    fn test_nested_difference() {
        let term = op(
            BooleanOp::Difference,
            cube_leaf("a", 0.0),
            op(BooleanOp::Difference, cube_leaf("b", 0.2), cube_leaf("c", 0.4)),
        );
        assert_eq!(normalize(term, 10).0.as_deref(), Some("((a - b) + (a * c))"));
    }

    #[test]
    fn test_intersection_of_difference() {
        let term = op(
            BooleanOp::Intersection,
            op(BooleanOp::Difference, cube_leaf("a", 0.0), cube_leaf("b", 0.2)),
            cube_leaf("c", 0.4),
        );
        assert_eq!(normalize(term, 10).0.as_deref(), Some("((a * c) - b)"));
    }

    #[test]
    fn test_disjoint_branches_are_pruned() {
        let term = op(
            BooleanOp::Intersection,
            cube_leaf("a", 0.0),
            op(BooleanOp::Union, cube_leaf("near", 0.5), cube_leaf("far", 9.0)),
        );
        assert_eq!(normalize(term, 10).0.as_deref(), Some("(a * near)"));
    }

    #[test]
    fn test_overflow_yields_nothing() {
        let mut union = cube_leaf("u0", 0.0);
        for i in 1..4 {
            union = op(BooleanOp::Union, union, cube_leaf(&format!("u{}", i), 0.1 * i as f64));
        }
        let term = op(BooleanOp::Intersection, cube_leaf("a", 0.0), union);

        let (result, lines) = normalize(term.clone(), 4);
        assert_eq!(result, None);
        assert!(lines
            .iter()
            .any(|l| l == "WARNING: Normalized tree is growing past 4 elements. Aborting normalization."));

        let (result, lines) = normalize(term, 100);
        assert!(result.is_some());
        assert!(lines.is_empty());
    }

    #[test]
    fn test_result_respects_limit() {
        for limit in 1..12 {
            let term = op(
                BooleanOp::Intersection,
                op(BooleanOp::Union, cube_leaf("a", 0.0), cube_leaf("b", 0.1)),
                op(BooleanOp::Union, cube_leaf("c", 0.2), cube_leaf("d", 0.3)),
            );
            let (diagnostics, _sink) = Diagnostics::memory();
            let mut normalizer = CsgNormalizer::new(limit, diagnostics);
            if let Ok(Some(result)) = normalizer.normalize(term) {
                assert!(result.leaf_count() <= limit);
                assert!(!normalizer.aborted());
            }
        }
    }

    #[test]
    fn test_cancelled_before_first_pass() {
        let token = CancelToken::new();
        token.cancel();
        let term = op(BooleanOp::Difference, cube_leaf("a", 0.0), cube_leaf("b", 0.5));
        let result = CsgNormalizer::new(10, Diagnostics::silent())
            .with_cancel(token)
            .normalize(term);
        assert_eq!(result, Err(Cancelled));
    }
}
