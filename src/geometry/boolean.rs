// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boolean operations on triangle meshes using BSP trees
//!
//! Unions concatenate meshes. Differences and intersections clip the
//! operands against each other's BSP tree, splitting triangles that
//! straddle a plane. Operands with disjoint bounding boxes skip the tree.

use super::{Mesh, Triangle, Vertex};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BooleanOp {
    Union,
    Difference,
    Intersection,
}

impl BooleanOp {
    pub fn name(&self) -> &'static str {
        match self {
            BooleanOp::Union => "union",
            BooleanOp::Difference => "difference",
            BooleanOp::Intersection => "intersection",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Plane {
    normal: Vector3<f64>,
    w: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Side {
    Coplanar,
    Front,
    Back,
    Spanning,
}

impl Side {
    fn of(distance: f64) -> Self {
        if distance > EPSILON {
            Side::Front
        } else if distance < -EPSILON {
            Side::Back
        } else {
            Side::Coplanar
        }
    }

    fn combine(self, other: Side) -> Side {
        match (self, other) {
            (Side::Coplanar, side) | (side, Side::Coplanar) => side,
            (a, b) if a == b => a,
            _ => Side::Spanning,
        }
    }
}

#[derive(Debug, Clone)]
struct Polygon {
    vertices: Vec<Vertex>,
    plane: Plane,
}

/// Buckets a split writes into; coplanar pieces are routed by the caller
struct Split<'a> {
    coplanar_front: &'a mut Vec<Polygon>,
    coplanar_back: &'a mut Vec<Polygon>,
    front: &'a mut Vec<Polygon>,
    back: &'a mut Vec<Polygon>,
}

impl Plane {
    fn from_points(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a)).try_normalize(1e-12)?;
        Some(Self { normal, w: normal.dot(&a.coords) })
    }

    fn distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) - self.w
    }

    fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    fn split(&self, polygon: &Polygon, out: Split<'_>) {
        let sides: Vec<Side> = polygon
            .vertices
            .iter()
            .map(|v| Side::of(self.distance(&v.position)))
            .collect();
        let kind = sides.iter().fold(Side::Coplanar, |acc, side| acc.combine(*side));

        match kind {
            Side::Coplanar => {
                if self.normal.dot(&polygon.plane.normal) > 0.0 {
                    out.coplanar_front.push(polygon.clone());
                } else {
                    out.coplanar_back.push(polygon.clone());
                }
            }
            Side::Front => out.front.push(polygon.clone()),
            Side::Back => out.back.push(polygon.clone()),
            Side::Spanning => {
                let mut front = Vec::new();
                let mut back = Vec::new();
                let count = polygon.vertices.len();
                for i in 0..count {
                    let j = (i + 1) % count;
                    let (vi, vj) = (polygon.vertices[i], polygon.vertices[j]);
                    let (si, sj) = (sides[i], sides[j]);
                    if si != Side::Back {
                        front.push(vi);
                    }
                    if si != Side::Front {
                        back.push(vi);
                    }
                    if (si == Side::Front && sj == Side::Back) || (si == Side::Back && sj == Side::Front) {
                        let di = self.distance(&vi.position);
                        let dj = self.distance(&vj.position);
                        let v = lerp(&vi, &vj, di / (di - dj));
                        front.push(v);
                        back.push(v);
                    }
                }
                if front.len() >= 3 {
                    out.front.push(Polygon { vertices: front, plane: polygon.plane });
                }
                if back.len() >= 3 {
                    out.back.push(Polygon { vertices: back, plane: polygon.plane });
                }
            }
        }
    }
}

fn lerp(a: &Vertex, b: &Vertex, t: f64) -> Vertex {
    let position = a.position + (b.position - a.position) * t;
    let normal = a.normal + (b.normal - a.normal) * t;
    Vertex::new(position, normal.try_normalize(1e-12).unwrap_or(normal))
}

impl Polygon {
    fn from_triangle(mesh: &Mesh, triangle: &Triangle) -> Option<Self> {
        let vertices: Vec<Vertex> = triangle
            .indices
            .iter()
            .map(|&i| mesh.vertices.get(i).copied())
            .collect::<Option<_>>()?;
        let plane = Plane::from_points(&vertices[0].position, &vertices[1].position, &vertices[2].position)?;
        Some(Self { vertices, plane })
    }

    fn flip(&mut self) {
        self.vertices.reverse();
        for v in &mut self.vertices {
            v.normal = -v.normal;
        }
        self.plane.flip();
    }
}

#[derive(Debug, Default)]
struct BspNode {
    plane: Option<Plane>,
    front: Option<Box<BspNode>>,
    back: Option<Box<BspNode>>,
    polygons: Vec<Polygon>,
}

impl BspNode {
    fn new(polygons: Vec<Polygon>) -> Self {
        let mut node = Self::default();
        node.build(polygons);
        node
    }

    fn build(&mut self, polygons: Vec<Polygon>) {
        let Some(first) = polygons.first() else {
            return;
        };
        let plane = *self.plane.get_or_insert(first.plane);

        let mut front = Vec::new();
        let mut back = Vec::new();
        let mut coplanar = Vec::new();
        for polygon in &polygons {
            let mut coplanar_back = Vec::new();
            plane.split(
                polygon,
                Split {
                    coplanar_front: &mut coplanar,
                    coplanar_back: &mut coplanar_back,
                    front: &mut front,
                    back: &mut back,
                },
            );
            coplanar.append(&mut coplanar_back);
        }
        self.polygons.append(&mut coplanar);

        if !front.is_empty() {
            self.front.get_or_insert_with(Box::default).build(front);
        }
        if !back.is_empty() {
            self.back.get_or_insert_with(Box::default).build(back);
        }
    }

    fn invert(&mut self) {
        for polygon in &mut self.polygons {
            polygon.flip();
        }
        if let Some(plane) = &mut self.plane {
            plane.flip();
        }
        if let Some(front) = &mut self.front {
            front.invert();
        }
        if let Some(back) = &mut self.back {
            back.invert();
        }
        std::mem::swap(&mut self.front, &mut self.back);
    }

    /// Remove the parts of `polygons` inside this tree's solid
    fn clip_polygons(&self, polygons: Vec<Polygon>) -> Vec<Polygon> {
        let Some(plane) = self.plane else {
            return polygons;
        };
        let mut front = Vec::new();
        let mut back = Vec::new();
        for polygon in &polygons {
            let mut coplanar_front = Vec::new();
            let mut coplanar_back = Vec::new();
            plane.split(
                polygon,
                Split {
                    coplanar_front: &mut coplanar_front,
                    coplanar_back: &mut coplanar_back,
                    front: &mut front,
                    back: &mut back,
                },
            );
            front.append(&mut coplanar_front);
            back.append(&mut coplanar_back);
        }

        let mut front = match &self.front {
            Some(node) => node.clip_polygons(front),
            None => front,
        };
        let back = match &self.back {
            Some(node) => node.clip_polygons(back),
            None => Vec::new(),
        };
        front.extend(back);
        front
    }

    fn clip_to(&mut self, other: &BspNode) {
        self.polygons = other.clip_polygons(std::mem::take(&mut self.polygons));
        if let Some(front) = &mut self.front {
            front.clip_to(other);
        }
        if let Some(back) = &mut self.back {
            back.clip_to(other);
        }
    }

    fn all_polygons(&self) -> Vec<Polygon> {
        let mut result = self.polygons.clone();
        if let Some(front) = &self.front {
            result.extend(front.all_polygons());
        }
        if let Some(back) = &self.back {
            result.extend(back.all_polygons());
        }
        result
    }
}

fn mesh_to_polygons(mesh: &Mesh) -> Vec<Polygon> {
    mesh.triangles
        .iter()
        .filter_map(|triangle| Polygon::from_triangle(mesh, triangle))
        .collect()
}

/// Fan-triangulate convex polygons
fn polygons_to_mesh(polygons: &[Polygon]) -> Mesh {
    let mut mesh = Mesh::with_capacity(polygons.len() * 3, polygons.len());
    for polygon in polygons {
        let base = mesh.vertex_count();
        for vertex in &polygon.vertices {
            mesh.add_vertex(*vertex);
        }
        for i in 1..polygon.vertices.len().saturating_sub(1) {
            mesh.add_triangle(Triangle::new([base, base + i, base + i + 1]));
        }
    }
    mesh
}

/// Perform boolean operation between two meshes
pub fn perform_boolean_operation(mesh_a: &Mesh, mesh_b: &Mesh, op: BooleanOp) -> Mesh {
    match op {
        BooleanOp::Union => perform_union(mesh_a, mesh_b),
        BooleanOp::Difference => perform_difference(mesh_a, mesh_b),
        BooleanOp::Intersection => perform_intersection(mesh_a, mesh_b),
    }
}

fn perform_union(mesh_a: &Mesh, mesh_b: &Mesh) -> Mesh {
    let mut result = mesh_a.clone();
    result.merge(mesh_b);
    result
}

fn perform_difference(mesh_a: &Mesh, mesh_b: &Mesh) -> Mesh {
    if mesh_a.is_empty() || mesh_b.is_empty() || !mesh_a.bounding_box().intersects(&mesh_b.bounding_box()) {
        return mesh_a.clone();
    }
    let mut a = BspNode::new(mesh_to_polygons(mesh_a));
    let mut b = BspNode::new(mesh_to_polygons(mesh_b));

    // a - b = ~(~a | b)
    a.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.all_polygons());
    a.invert();
    polygons_to_mesh(&a.all_polygons())
}

fn perform_intersection(mesh_a: &Mesh, mesh_b: &Mesh) -> Mesh {
    if mesh_a.is_empty() || mesh_b.is_empty() || !mesh_a.bounding_box().intersects(&mesh_b.bounding_box()) {
        return Mesh::empty();
    }
    let mut a = BspNode::new(mesh_to_polygons(mesh_a));
    let mut b = BspNode::new(mesh_to_polygons(mesh_b));

    // a & b = ~(~a | ~b)
    a.invert();
    b.clip_to(&a);
    b.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    a.build(b.all_polygons());
    a.invert();
    polygons_to_mesh(&a.all_polygons())
}

/// Left fold of `op` over meshes in order; `None` for no operands
pub fn fold<'a>(op: BooleanOp, meshes: impl IntoIterator<Item = &'a Mesh>) -> Option<Mesh> {
    let mut iter = meshes.into_iter();
    let first = iter.next()?.clone();
    Some(iter.fold(first, |acc, next| perform_boolean_operation(&acc, next, op)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, Primitive};
    use nalgebra::{Matrix4, Point3};

    fn cube_at(x: f64, size: f64) -> Mesh {
        Primitive::cube(Vector3::new(size, size, size), false)
            .to_mesh()
            .transformed(&Matrix4::new_translation(&Vector3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn test_union_concatenates() {
        let result = perform_boolean_operation(&cube_at(0.0, 1.0), &cube_at(5.0, 1.0), BooleanOp::Union);
        assert_eq!(result.triangle_count(), 24);
    }

    #[test]
    fn test_difference_of_covered_operand_is_empty() {
        let covered = perform_boolean_operation(&cube_at(1.0, 1.0), &cube_at(0.0, 5.0), BooleanOp::Difference);
        assert!(covered.is_empty());
    }

    #[test]
    fn test_disjoint_operands_skip_the_tree() {
        let difference = perform_boolean_operation(&cube_at(0.0, 1.0), &cube_at(3.0, 1.0), BooleanOp::Difference);
        assert_eq!(difference.triangle_count(), 12);
        let intersection = perform_boolean_operation(&cube_at(0.0, 1.0), &cube_at(3.0, 1.0), BooleanOp::Intersection);
        assert!(intersection.is_empty());
    }

    #[test]
    fn test_difference_cuts_sphere_out_of_cube() {
        let cube = Primitive::cube(Vector3::new(10.0, 10.0, 10.0), false).to_mesh();
        let sphere = Primitive::sphere(5.0, 16).to_mesh();
        let result = perform_boolean_operation(&cube, &sphere, BooleanOp::Difference);

        assert!(!result.is_empty());
        assert_ne!(result.triangle_count(), cube.triangle_count());
        assert!(cube.bounding_box().approx_eq(&result.bounding_box(), 1e-6));
        // the corner at the sphere's center is carved away
        assert!(result.vertices.iter().all(|v| v.position.coords.norm() > 4.5));
    }

    #[test]
    fn test_partial_difference_keeps_outer_extent() {
        let result = perform_boolean_operation(&cube_at(0.0, 4.0), &cube_at(3.0, 2.0), BooleanOp::Difference);
        let bbox = result.bounding_box();
        assert!(bbox.approx_eq(
            &BoundingBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 4.0, 4.0)),
            1e-6
        ));
        assert!(result.triangle_count() > 12);
    }

    #[test]
    fn test_intersection_overlap_box() {
        let result = perform_boolean_operation(&cube_at(0.0, 2.0), &cube_at(1.0, 2.0), BooleanOp::Intersection);
        let bbox = result.bounding_box();
        assert!(bbox.approx_eq(
            &BoundingBox::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0)),
            1e-6
        ));
    }

    #[test]
    fn test_intersection_with_sphere_stays_inside_both() {
        let cube = Primitive::cube(Vector3::new(6.0, 6.0, 6.0), true).to_mesh();
        let sphere = Primitive::sphere(4.0, 16).to_mesh();
        let result = perform_boolean_operation(&cube, &sphere, BooleanOp::Intersection);

        assert!(!result.is_empty());
        assert!(result.vertices.iter().all(|v| v.position.coords.amax() < 3.0 + 1e-6));
        assert!(result.vertices.iter().all(|v| v.position.coords.norm() < 4.0 + 1e-6));
        assert_ne!(result.triangle_count(), cube.triangle_count());
    }

    #[test]
    fn test_fold_order() {
        let meshes = [cube_at(0.0, 1.0), cube_at(3.0, 1.0)];
        assert_eq!(fold(BooleanOp::Difference, meshes.iter()).map(|m| m.triangle_count()), Some(12));
        assert!(fold(BooleanOp::Union, std::iter::empty()).is_none());
    }
}
