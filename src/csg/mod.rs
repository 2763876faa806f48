// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG terms, normalization and render products

mod builder;
mod normalizer;
mod products;
mod term;

pub use builder::{CsgTermBuilder, CsgTerms};
pub use normalizer::CsgNormalizer;
pub use products::{CsgProduct, CsgProducts, ProductSet, ProductTerm};
pub use term::{create_operation, CsgLeaf, CsgNode};
