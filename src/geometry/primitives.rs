// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric primitives generator

use super::{Mesh, Triangle, Vertex};
use crate::ast::NodeKind;
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Radii below this are treated as a point
const GRID_FINE: f64 = 0.000_000_953_674_316_406_25;

/// Number of segments used to approximate a circle of radius `r`
pub fn get_fragments_from_r(r: f64, fn_: f64, fs: f64, fa: f64) -> u32 {
    if r < GRID_FINE || !fn_.is_finite() || !fs.is_finite() || !fa.is_finite() {
        return 3;
    }
    if fn_ > 0.0 {
        return (fn_ as u32).max(3);
    }
    (360.0 / fa).min(r * 2.0 * PI / fs).max(5.0).ceil() as u32
}

/// Geometric primitives
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Cube { size: Vector3<f64>, center: bool },
    Sphere { r: f64, fn_: u32 },
    Cylinder { h: f64, r1: f64, r2: f64, center: bool, fn_: u32 },
}

impl Primitive {
    pub fn cube(size: Vector3<f64>, center: bool) -> Self {
        Self::Cube { size, center }
    }

    pub fn sphere(r: f64, fn_: u32) -> Self {
        Self::Sphere { r, fn_: fn_.max(3) }
    }

    pub fn cylinder(h: f64, r1: f64, r2: f64, center: bool, fn_: u32) -> Self {
        Self::Cylinder {
            h,
            r1,
            r2,
            center,
            fn_: fn_.max(3),
        }
    }

    /// Primitive described by a node, if it is one
    pub fn from_node(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Cube { size, center } => Some(Self::cube(*size, *center)),
            NodeKind::Sphere { r, fragments } => Some(Self::sphere(*r, *fragments)),
            NodeKind::Cylinder {
                h,
                r1,
                r2,
                center,
                fragments,
            } => Some(Self::cylinder(*h, *r1, *r2, *center, *fragments)),
            _ => None,
        }
    }

    /// Degenerate primitives produce no geometry
    pub fn is_degenerate(&self) -> bool {
        match self {
            Self::Cube { size, .. } => size.iter().any(|s| *s <= 0.0 || !s.is_finite()),
            Self::Sphere { r, .. } => *r <= 0.0 || !r.is_finite(),
            Self::Cylinder { h, r1, r2, .. } => {
                *h <= 0.0 || !h.is_finite() || *r1 < 0.0 || *r2 < 0.0 || (*r1 <= 0.0 && *r2 <= 0.0)
            }
        }
    }

    pub fn to_mesh(&self) -> Mesh {
        if self.is_degenerate() {
            return Mesh::empty();
        }
        match self {
            Self::Cube { size, center } => generate_cube_mesh(*size, *center),
            Self::Sphere { r, fn_ } => generate_sphere_mesh(*r, *fn_),
            Self::Cylinder {
                h,
                r1,
                r2,
                center,
                fn_,
            } => {
                let z0 = if *center { -h / 2.0 } else { 0.0 };
                generate_cone_mesh(z0, *h, *r1, *r2, *fn_)
            }
        }
    }
}

fn generate_cube_mesh(size: Vector3<f64>, center: bool) -> Mesh {
    let mut mesh = Mesh::with_capacity(36, 12);

    let min = if center { -size / 2.0 } else { Vector3::zeros() };
    let max = min + size;

    let positions = [
        Point3::new(min.x, min.y, min.z),
        Point3::new(max.x, min.y, min.z),
        Point3::new(max.x, max.y, min.z),
        Point3::new(min.x, max.y, min.z),
        Point3::new(min.x, min.y, max.z),
        Point3::new(max.x, min.y, max.z),
        Point3::new(max.x, max.y, max.z),
        Point3::new(min.x, max.y, max.z),
    ];

    // Two outward-facing triangles per face
    let faces = [
        ([4, 5, 6], Vector3::z()),
        ([4, 6, 7], Vector3::z()),
        ([1, 0, 3], -Vector3::z()),
        ([1, 3, 2], -Vector3::z()),
        ([5, 1, 2], Vector3::x()),
        ([5, 2, 6], Vector3::x()),
        ([0, 4, 7], -Vector3::x()),
        ([0, 7, 3], -Vector3::x()),
        ([7, 6, 2], Vector3::y()),
        ([7, 2, 3], Vector3::y()),
        ([0, 1, 5], -Vector3::y()),
        ([0, 5, 4], -Vector3::y()),
    ];

    for (indices, normal) in faces {
        let v0 = mesh.add_vertex(Vertex::new(positions[indices[0]], normal));
        let v1 = mesh.add_vertex(Vertex::new(positions[indices[1]], normal));
        let v2 = mesh.add_vertex(Vertex::new(positions[indices[2]], normal));
        mesh.add_triangle(Triangle::new([v0, v1, v2]));
    }

    mesh
}

/// Latitude rings placed at ring centers, poles closed by fans
fn generate_sphere_mesh(radius: f64, fragments: u32) -> Mesh {
    let mut mesh = Mesh::new();
    let rings = ((fragments + 1) / 2).max(1) as usize;
    let slices = fragments as usize;

    for ring in 0..rings {
        let phi = PI * (ring as f64 + 0.5) / rings as f64;
        let z = radius * phi.cos();
        let r = radius * phi.sin();
        for j in 0..slices {
            let theta = 2.0 * PI * j as f64 / slices as f64;
            let position = Point3::new(r * theta.cos(), r * theta.sin(), z);
            mesh.add_vertex(Vertex::new(position, position.coords / radius));
        }
    }
    let top = mesh.add_vertex(Vertex::new(Point3::new(0.0, 0.0, radius), Vector3::z()));
    let bottom = mesh.add_vertex(Vertex::new(Point3::new(0.0, 0.0, -radius), -Vector3::z()));

    let at = |ring: usize, j: usize| ring * slices + j % slices;
    for j in 0..slices {
        mesh.add_triangle(Triangle::new([top, at(0, j), at(0, j + 1)]));
        mesh.add_triangle(Triangle::new([bottom, at(rings - 1, j + 1), at(rings - 1, j)]));
    }
    for ring in 0..rings - 1 {
        for j in 0..slices {
            mesh.add_triangle(Triangle::new([at(ring, j), at(ring + 1, j), at(ring + 1, j + 1)]));
            mesh.add_triangle(Triangle::new([at(ring, j), at(ring + 1, j + 1), at(ring, j + 1)]));
        }
    }

    mesh
}

fn generate_cone_mesh(z0: f64, height: f64, r1: f64, r2: f64, segments: u32) -> Mesh {
    let mut mesh = Mesh::new();
    let z1 = z0 + height;

    let bottom_center_idx = mesh.add_vertex(Vertex::new(Point3::new(0.0, 0.0, z0), -Vector3::z()));
    let top_center_idx = mesh.add_vertex(Vertex::new(Point3::new(0.0, 0.0, z1), Vector3::z()));

    let mut bottom_indices = Vec::with_capacity(segments as usize);
    let mut top_indices = Vec::with_capacity(segments as usize);

    for i in 0..segments {
        let angle = 2.0 * PI * i as f64 / segments as f64;
        let (sin, cos) = angle.sin_cos();
        bottom_indices.push(mesh.add_vertex(Vertex::new(Point3::new(r1 * cos, r1 * sin, z0), -Vector3::z())));
        top_indices.push(mesh.add_vertex(Vertex::new(Point3::new(r2 * cos, r2 * sin, z1), Vector3::z())));
    }

    let n = segments as usize;
    for i in 0..n {
        let next = (i + 1) % n;
        let (bi, bn, ti, tn) = (bottom_indices[i], bottom_indices[next], top_indices[i], top_indices[next]);

        mesh.add_triangle(Triangle::new([bottom_center_idx, bn, bi]));
        mesh.add_triangle(Triangle::new([top_center_idx, ti, tn]));

        // A zero radius leaves zero-area triangles that keep the mesh closed
        mesh.add_triangle(Triangle::new([bi, bn, tn]));
        mesh.add_triangle(Triangle::new([bi, tn, ti]));
    }

    // Recompute normals to properly average at shared vertices
    mesh.recompute_normals();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments() {
        assert_eq!(get_fragments_from_r(10.0, 0.0, 2.0, 12.0), 30);
        assert_eq!(get_fragments_from_r(1.0, 0.0, 2.0, 12.0), 5);
        assert_eq!(get_fragments_from_r(1.0, 7.0, 2.0, 12.0), 7);
        assert_eq!(get_fragments_from_r(1.0, 1.0, 2.0, 12.0), 3);
        assert_eq!(get_fragments_from_r(0.0, 50.0, 2.0, 12.0), 3);
    }

    #[test]
    fn test_cube_generation() {
        let mesh = Primitive::cube(Vector3::new(10.0, 10.0, 10.0), true).to_mesh();
        assert_eq!(mesh.triangle_count(), 12);
        let bbox = mesh.bounding_box();
        assert_eq!(bbox.min, Point3::new(-5.0, -5.0, -5.0));
        assert_eq!(bbox.max, Point3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_sphere_is_closed() {
        let mesh = Primitive::sphere(5.0, 16).to_mesh();
        assert!(mesh.is_closed());
        assert_eq!(mesh.vertex_count(), 8 * 16 + 2);
        assert!(mesh.bounding_box().max.z <= 5.0);
    }

    #[test]
    fn test_cylinder_is_closed() {
        let mesh = Primitive::cylinder(10.0, 5.0, 5.0, false, 32).to_mesh();
        assert!(mesh.is_closed());
        assert_eq!(mesh.vertex_count(), 2 + 32 * 2);
        assert_eq!(mesh.bounding_box().min.z, 0.0);
    }

    #[test]
    fn test_centered_cone_is_closed() {
        let mesh = Primitive::cylinder(10.0, 5.0, 0.0, true, 12).to_mesh();
        assert!(mesh.is_closed());
        assert_eq!(mesh.bounding_box().min.z, -5.0);
        assert_eq!(mesh.bounding_box().max.z, 5.0);
    }

    #[test]
    fn test_degenerate_primitives_are_empty() {
        assert!(Primitive::cube(Vector3::new(1.0, 0.0, 1.0), false).to_mesh().is_empty());
        assert!(Primitive::sphere(0.0, 8).to_mesh().is_empty());
        assert!(Primitive::cylinder(0.0, 1.0, 1.0, false, 8).to_mesh().is_empty());
    }
}
