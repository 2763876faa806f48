// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Evaluated geometry handle

use super::{BoundingBox, Mesh};
use std::mem::size_of;

/// Result of evaluating a node subtree
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub mesh: Mesh,
    /// 2 or 3
    pub dimension: u8,
}

impl Geometry {
    pub fn new(mesh: Mesh) -> Self {
        Self { mesh, dimension: 3 }
    }

    pub fn empty() -> Self {
        Self::new(Mesh::empty())
    }

    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.mesh.bounding_box()
    }

    pub fn facets(&self) -> usize {
        self.mesh.triangle_count()
    }

    pub fn vertices(&self) -> usize {
        self.mesh.vertex_count()
    }

    /// Bytes charged against a cache budget
    pub fn memory_size(&self) -> usize {
        size_of::<Self>() + self.mesh.memory_size()
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::empty()
    }
}
