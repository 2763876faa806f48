// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Flattened render products

use super::term::{op_symbol, CsgLeaf, CsgNode};
use crate::geometry::{BooleanOp, BoundingBox};
use std::fmt::Write;
use std::sync::Arc;

/// One leaf of a product with its operation against everything before it.
/// The first leaf of a product always carries [`BooleanOp::Union`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTerm {
    pub leaf: Arc<CsgLeaf>,
    pub op: BooleanOp,
}

/// Intersection of leaves followed by subtractions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsgProduct {
    pub terms: Vec<ProductTerm>,
}

impl CsgProduct {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Leaves that are drawn
    pub fn intersections(&self) -> impl Iterator<Item = &CsgLeaf> {
        self.terms
            .iter()
            .filter(|t| t.op != BooleanOp::Difference)
            .map(|t| t.leaf.as_ref())
    }

    /// Leaves carved out of the intersection
    pub fn subtractions(&self) -> impl Iterator<Item = &CsgLeaf> {
        self.terms
            .iter()
            .filter(|t| t.op == BooleanOp::Difference)
            .map(|t| t.leaf.as_ref())
    }

    /// Bounding box of the drawn part
    pub fn bounding_box(&self) -> BoundingBox {
        self.intersections()
            .map(|leaf| leaf.bbox)
            .reduce(|a, b| a.intersection(&b))
            .unwrap_or_default()
    }

    /// `cube2 *cube3 -sphere4`
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                let _ = write!(out, " {}", op_symbol(term.op));
            }
            out.push_str(&term.leaf.label);
        }
        out
    }
}

/// Products of one normalized term
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsgProducts {
    pub products: Vec<CsgProduct>,
}

impl CsgProducts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the products of a normalized term, one per union operand
    pub fn import(&mut self, term: &CsgNode) {
        self.import_as(term, BooleanOp::Union);
    }

    fn import_as(&mut self, term: &CsgNode, op: BooleanOp) {
        match term {
            CsgNode::Leaf(leaf) => {
                if op == BooleanOp::Union || self.products.is_empty() {
                    self.products.push(CsgProduct::default());
                }
                if let Some(product) = self.products.last_mut() {
                    let op = if product.is_empty() { BooleanOp::Union } else { op };
                    product.terms.push(ProductTerm {
                        leaf: leaf.clone(),
                        op,
                    });
                }
            }
            CsgNode::Operation { op: inner, left, right, .. } => {
                self.import_as(left, op);
                self.import_as(right, *inner);
            }
        }
    }

    /// Total number of leaves
    pub fn size(&self) -> usize {
        self.products.iter().map(CsgProduct::len).sum()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CsgProduct> {
        self.products.iter()
    }

    /// One line per product, each prefixed with `+`
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for product in &self.products {
            let _ = writeln!(out, "+{}", product.dump());
        }
        out
    }
}

/// Everything the preview renderer draws
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSet {
    pub root: CsgProducts,
    pub highlights: CsgProducts,
    pub background: CsgProducts,
}

impl ProductSet {
    pub fn is_empty(&self) -> bool {
        self.root.is_empty() && self.highlights.is_empty() && self.background.is_empty()
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (name, products) in [
            ("root", &self.root),
            ("highlights", &self.highlights),
            ("background", &self.background),
        ] {
            if products.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{}:", name);
            out.push_str(&products.dump());
        }
        out
    }
}
