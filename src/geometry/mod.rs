// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - mesh representation, evaluation and caching

mod bbox;
mod boolean;
mod cache;
mod evaluator;
mod mesh;
mod object;
mod primitives;

pub use bbox::BoundingBox;
pub use boolean::{fold, perform_boolean_operation, BooleanOp};
pub use cache::{GeometryCache, GeometryCaches};
pub use evaluator::{Checkpoint, GeometryEvaluator};
pub use mesh::{Mesh, Triangle, Vertex};
pub use object::Geometry;
pub use primitives::{get_fragments_from_r, Primitive};
