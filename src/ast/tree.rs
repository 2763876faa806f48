// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Node tree with per-subtree fingerprints
//!
//! The fingerprint of a node is the SHA-256 digest of its subtree's
//! canonical dump. Creation indices are not part of the dump, so equal
//! subtrees share a fingerprint across compiles and within one tree.

use super::node::AbstractNode;
use ahash::AHashMap;
use sha2::{Digest, Sha256};

/// Identity key of a geometry subtree
pub type Fingerprint = String;

#[derive(Debug, Clone)]
pub struct NodeTree {
    root: AbstractNode,
    fingerprints: AHashMap<usize, Fingerprint>,
    dump: String,
}

impl NodeTree {
    pub fn new(root: AbstractNode) -> Self {
        let mut fingerprints = AHashMap::new();
        let dump = fingerprint_subtree(&root, &mut fingerprints);
        Self {
            root,
            fingerprints,
            dump,
        }
    }

    pub fn root(&self) -> &AbstractNode {
        &self.root
    }

    /// Fingerprint of a node belonging to this tree
    pub fn fingerprint(&self, node: &AbstractNode) -> Option<&str> {
        self.fingerprints.get(&node.index).map(String::as_str)
    }

    pub fn root_fingerprint(&self) -> Option<&str> {
        self.fingerprint(&self.root)
    }

    /// Canonical text of the whole tree
    pub fn dump(&self) -> &str {
        &self.dump
    }

    pub fn node_count(&self) -> usize {
        self.fingerprints.len()
    }
}

impl PartialEq for NodeTree {
    fn eq(&self, other: &Self) -> bool {
        self.dump == other.dump
    }
}

/// Record fingerprints for every node below `node` and return its dump
fn fingerprint_subtree(node: &AbstractNode, out: &mut AHashMap<usize, Fingerprint>) -> String {
    let mut text = String::new();
    if node.children.is_empty() {
        text.push_str(&node.header());
        text.push_str(";\n");
    } else {
        text.push_str(&node.header());
        text.push_str(" {\n");
        for child in &node.children {
            for line in fingerprint_subtree(child, out).lines() {
                text.push('\t');
                text.push_str(line);
                text.push('\n');
            }
        }
        text.push_str("}\n");
    }
    out.insert(node.index, format!("{:x}", Sha256::digest(text.as_bytes())));
    text
}
