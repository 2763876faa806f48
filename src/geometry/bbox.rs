// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bounding box utilities

use super::Vertex;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box; `min > max` on any axis means empty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_vertices(vertices: &[Vertex]) -> Self {
        let mut bbox = Self::empty();
        for vertex in vertices {
            bbox.expand_to_include(&vertex.position);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand_to_include(&mut self, point: &Point3<f64>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Smallest box containing both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        BoundingBox::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Overlap of both boxes, empty if they are disjoint
    pub fn intersection(&self, other: &BoundingBox) -> BoundingBox {
        let result = BoundingBox::new(self.min.sup(&other.min), self.max.inf(&other.max));
        if result.is_empty() {
            BoundingBox::empty()
        } else {
            result
        }
    }

    /// Boxes sharing only a face still count as intersecting
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !self.is_empty() && !other.is_empty() && !self.intersection(other).is_empty()
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        !other.is_empty()
            && self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    /// Box around the eight transformed corners
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> BoundingBox {
        if self.is_empty() {
            return *self;
        }
        let mut result = BoundingBox::empty();
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            result.expand_to_include(&matrix.transform_point(&corner));
        }
        result
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn volume(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let size = self.size();
        size.x * size.y * size.z
    }

    /// Check if two bounding boxes are approximately equal within tolerance
    pub fn approx_eq(&self, other: &BoundingBox, tolerance: f64) -> bool {
        (self.min - other.min).amax() < tolerance && (self.max - other.max).amax() < tolerance
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_at(x: f64) -> BoundingBox {
        BoundingBox::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0))
    }

    #[test]
    fn test_bounding_box() {
        let mut bbox = BoundingBox::empty();
        assert!(bbox.is_empty());
        bbox.expand_to_include(&Point3::new(1.0, 2.0, 3.0));
        bbox.expand_to_include(&Point3::new(-1.0, 0.0, 5.0));
        assert_eq!(bbox.min, Point3::new(-1.0, 0.0, 3.0));
        assert_eq!(bbox.max, Point3::new(1.0, 2.0, 5.0));
        assert_eq!(bbox.volume(), 8.0);
        assert_eq!(bbox.center(), Point3::new(0.0, 1.0, 4.0));
    }

    #[test]
    fn test_overlap_queries() {
        assert!(unit_at(0.0).intersects(&unit_at(0.5)));
        assert!(unit_at(0.0).intersects(&unit_at(1.0)));
        assert!(!unit_at(0.0).intersects(&unit_at(2.0)));
        assert!(unit_at(0.0).intersection(&unit_at(3.0)).is_empty());
        assert!(unit_at(0.0).union(&unit_at(2.0)).contains(&unit_at(1.0)));
        assert!(!BoundingBox::empty().intersects(&unit_at(0.0)));
    }

    #[test]
    fn test_transformed_box() {
        let rotated = unit_at(0.0).transformed(&Matrix4::new_nonuniform_scaling(&Vector3::new(-2.0, 1.0, 1.0)));
        assert!(rotated.approx_eq(
            &BoundingBox::new(Point3::new(-2.0, 0.0, 0.0), Point3::new(0.0, 1.0, 1.0)),
            1e-12
        ));
    }
}
