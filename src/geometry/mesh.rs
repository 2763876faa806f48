// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh representation and utilities

use super::BoundingBox;
use ahash::AHashMap;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::mem::size_of;

/// Vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
}

impl Vertex {
    pub fn new(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self { position, normal }
    }

    /// Transform the position by `matrix` and the normal by `normal_matrix`
    pub fn transform(&mut self, matrix: &Matrix4<f64>, normal_matrix: &Matrix3<f64>) {
        self.position = matrix.transform_point(&self.position);
        let normal = normal_matrix * self.normal;
        self.normal = normal.try_normalize(1e-12).unwrap_or(normal);
    }
}

/// Triangle defined by three vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triangle {
    pub indices: [usize; 3],
}

impl Triangle {
    pub fn new(indices: [usize; 3]) -> Self {
        Self { indices }
    }

    fn flipped(self) -> Self {
        let [a, b, c] = self.indices;
        Self { indices: [a, c, b] }
    }
}

/// Triangular mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new()
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count),
        }
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, vertex: Vertex) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a triangle
    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Transform all vertices by a matrix; reflections keep outward winding
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        let linear = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or(linear);
        for vertex in &mut self.vertices {
            vertex.transform(matrix, &normal_matrix);
        }
        if linear.determinant() < 0.0 {
            for triangle in &mut self.triangles {
                *triangle = triangle.flipped();
            }
        }
    }

    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Mesh {
        let mut mesh = self.clone();
        mesh.transform(matrix);
        mesh
    }

    /// Compute bounding box
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_vertices(&self.vertices)
    }

    /// Get vertex count
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get triangle count
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Approximate heap footprint in bytes
    pub fn memory_size(&self) -> usize {
        size_of::<Self>()
            + self.vertices.len() * size_of::<Vertex>()
            + self.triangles.len() * size_of::<Triangle>()
    }

    /// Every directed edge is matched by its reverse, after welding
    /// vertices that share a position
    pub fn is_closed(&self) -> bool {
        let mut ids: AHashMap<[u64; 3], usize> = AHashMap::new();
        let welded: Vec<usize> = self
            .vertices
            .iter()
            .map(|v| {
                // +0.0 folds -0.0 into 0.0
                let p = v.position;
                let key = [(p.x + 0.0).to_bits(), (p.y + 0.0).to_bits(), (p.z + 0.0).to_bits()];
                let next = ids.len();
                *ids.entry(key).or_insert(next)
            })
            .collect();

        let mut edges: AHashMap<(usize, usize), i32> = AHashMap::new();
        for t in &self.triangles {
            let [a, b, c] = t.indices.map(|i| welded.get(i).copied().unwrap_or(i));
            for (u, v) in [(a, b), (b, c), (c, a)] {
                if u != v {
                    *edges.entry((u.min(v), u.max(v))).or_default() += if u < v { 1 } else { -1 };
                }
            }
        }
        edges.values().all(|&balance| balance == 0)
    }

    /// Merge with another mesh (simple union without CSG)
    pub fn merge(&mut self, other: &Mesh) {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);

        for triangle in &other.triangles {
            self.triangles.push(Triangle::new([
                triangle.indices[0] + offset,
                triangle.indices[1] + offset,
                triangle.indices[2] + offset,
            ]));
        }
    }

    /// Recompute vertex normals from triangle geometry
    /// This calculates face normals and averages them at shared vertices
    pub fn recompute_normals(&mut self) {
        if self.vertices.is_empty() || self.triangles.is_empty() {
            return;
        }

        let mut normal_sums: Vec<Vector3<f64>> = vec![Vector3::zeros(); self.vertices.len()];

        for triangle in &self.triangles {
            let [a, b, c] = triangle.indices;
            let edge1 = self.vertices[b].position - self.vertices[a].position;
            let edge2 = self.vertices[c].position - self.vertices[a].position;
            // Area weighted
            let face_normal = edge1.cross(&edge2);
            if face_normal.norm() > 1e-10 {
                for &idx in &triangle.indices {
                    normal_sums[idx] += face_normal;
                }
            }
        }

        for (vertex, sum) in self.vertices.iter_mut().zip(normal_sums) {
            vertex.normal = sum.try_normalize(1e-12).unwrap_or_else(Vector3::z);
        }
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}
