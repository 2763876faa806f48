// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Abstract node tree
//!
//! The instantiated form of a script: primitives, boolean operators,
//! transforms and groups, each tagged with its creation index and modifiers.

mod node;
mod tree;

pub use node::{AbstractNode, NodeKind, TransformOp, Vec3};
pub use tree::{Fingerprint, NodeTree};
