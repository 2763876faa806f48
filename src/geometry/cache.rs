// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Size-bounded geometry caches
//!
//! Entries are kept in access order: the front of the map is the least
//! recently used entry and is evicted first once the byte budget is exceeded.

use super::Geometry;
use crate::ast::Fingerprint;
use crate::diagnostics::Diagnostics;
use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::debug;

const MB: usize = 1024 * 1024;

/// LRU cache of evaluated geometry keyed by subtree fingerprint
pub struct GeometryCache {
    name: &'static str,
    entries: IndexMap<Fingerprint, Arc<Geometry>>,
    total_bytes: usize,
    max_bytes: usize,
    hits: usize,
    misses: usize,
    diagnostics: Diagnostics,
}

impl GeometryCache {
    pub fn new(name: &'static str, max_size_mb: usize, diagnostics: Diagnostics) -> Self {
        Self {
            name,
            entries: IndexMap::new(),
            total_bytes: 0,
            max_bytes: max_size_mb.saturating_mul(MB),
            hits: 0,
            misses: 0,
            diagnostics,
        }
    }

    /// Look up an entry and mark it most recently used
    pub fn get(&mut self, fingerprint: &str) -> Option<Arc<Geometry>> {
        match self.entries.get_index_of(fingerprint) {
            Some(index) => {
                self.hits += 1;
                let last = self.entries.len() - 1;
                self.entries.move_index(index, last);
                self.entries.get_index(last).map(|(_, g)| g.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Insert an entry, evicting the least recently used ones to stay in budget.
    /// Returns false if the entry alone exceeds the budget.
    pub fn put(&mut self, fingerprint: Fingerprint, geometry: Arc<Geometry>) -> bool {
        let size = geometry.memory_size();
        if size > self.max_bytes {
            self.diagnostics.warning(format!(
                "{} insert failed: object of {} bytes exceeds the {} byte budget",
                self.name, size, self.max_bytes
            ));
            return false;
        }
        if let Some(previous) = self.entries.shift_remove(&fingerprint) {
            self.total_bytes -= previous.memory_size();
        }
        self.total_bytes += size;
        self.entries.insert(fingerprint, geometry);
        self.evict();
        true
    }

    fn evict(&mut self) {
        while self.total_bytes > self.max_bytes {
            let Some((key, geometry)) = self.entries.shift_remove_index(0) else {
                break;
            };
            self.total_bytes -= geometry.memory_size();
            debug!(cache = self.name, %key, "evicted");
        }
    }

    pub fn set_max_size_mb(&mut self, max_size_mb: usize) {
        self.max_bytes = max_size_mb.saturating_mul(MB);
        self.evict();
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fingerprints from least to most recently used
    pub fn keys(&self) -> Vec<Fingerprint> {
        self.entries.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }

    /// Report occupancy to the diagnostics channel
    pub fn print(&self) {
        self.diagnostics.info(format!(
            "{}: {} entries, {} bytes ({} hits, {} misses)",
            self.name,
            self.entries.len(),
            self.total_bytes,
            self.hits,
            self.misses
        ));
    }
}

/// Mesh and solid caches shared between the orchestrator and worker results
#[derive(Clone)]
pub struct GeometryCaches {
    mesh: Arc<Mutex<GeometryCache>>,
    solid: Arc<Mutex<GeometryCache>>,
}

impl GeometryCaches {
    pub fn new(mesh_size_mb: usize, solid_size_mb: usize, diagnostics: &Diagnostics) -> Self {
        Self {
            mesh: Arc::new(Mutex::new(GeometryCache::new(
                "Mesh cache",
                mesh_size_mb,
                diagnostics.clone(),
            ))),
            solid: Arc::new(Mutex::new(GeometryCache::new(
                "Solid cache",
                solid_size_mb,
                diagnostics.clone(),
            ))),
        }
    }

    /// Approximate geometry used for preview leaves
    pub fn mesh(&self) -> MutexGuard<'_, GeometryCache> {
        self.mesh.lock()
    }

    /// Geometry produced by full renders
    pub fn solid(&self) -> MutexGuard<'_, GeometryCache> {
        self.solid.lock()
    }

    /// Look up the mesh tier, then the solid tier, marking the entry found
    /// as most recently used in its tier
    pub fn lookup(&self, fingerprint: &str) -> Option<Arc<Geometry>> {
        {
            let mut mesh = self.mesh();
            if mesh.contains(fingerprint) {
                return mesh.get(fingerprint);
            }
        }
        self.solid().get(fingerprint)
    }

    pub fn set_max_sizes(&self, mesh_size_mb: usize, solid_size_mb: usize) {
        self.mesh().set_max_size_mb(mesh_size_mb);
        self.solid().set_max_size_mb(solid_size_mb);
    }

    pub fn clear(&self) {
        self.mesh().clear();
        self.solid().clear();
    }

    pub fn print(&self) {
        self.mesh().print();
        self.solid().print();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    fn cube(size: f64) -> Arc<Geometry> {
        Arc::new(Geometry::new(
            Primitive::cube(Vector3::new(size, size, size), false).to_mesh(),
        ))
    }

    fn cache_for(entries: usize) -> GeometryCache {
        let mut cache = GeometryCache::new("Test cache", 0, Diagnostics::silent());
        cache.max_bytes = cube(1.0).memory_size() * entries;
        cache
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = cache_for(2);
        cache.put("a".into(), cube(1.0));
        cache.put("b".into(), cube(2.0));
        assert!(cache.get("a").is_some());
        cache.put("c".into(), cube(3.0));

        assert_eq!(cache.keys(), vec!["a".to_string(), "c".to_string()]);
        assert!(cache.total_bytes() <= cache.max_bytes());
    }

    #[test]
    fn test_lookup_refreshes_entry_in_its_tier() {
        let caches = GeometryCaches::new(1, 1, &Diagnostics::silent());
        caches.mesh().put("a".into(), cube(1.0));
        caches.mesh().put("b".into(), cube(1.0));
        caches.solid().put("c".into(), cube(1.0));
        caches.solid().put("d".into(), cube(1.0));

        assert!(caches.lookup("a").is_some());
        assert!(caches.lookup("c").is_some());
        assert!(caches.lookup("missing").is_none());

        assert_eq!(caches.mesh().keys(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(caches.solid().keys(), vec!["d".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_oversized_insert_is_refused() {
        let (diagnostics, sink) = Diagnostics::memory();
        let mut cache = GeometryCache::new("Solid cache", 0, diagnostics);
        assert!(!cache.put("a".into(), cube(1.0)));
        assert!(cache.is_empty());
        assert!(sink.contains("WARNING: Solid cache insert failed"));
    }

    #[test]
    fn test_shrinking_budget_evicts() {
        let mut cache = cache_for(3);
        for key in ["a", "b", "c"] {
            cache.put(key.into(), cube(1.0));
        }
        cache.max_bytes = cube(1.0).memory_size();
        cache.evict();
        assert_eq!(cache.keys(), vec!["c".to_string()]);
    }

    #[test]
    fn test_replacing_entry_keeps_byte_count() {
        let mut cache = cache_for(4);
        cache.put("a".into(), cube(1.0));
        let bytes = cache.total_bytes();
        cache.put("a".into(), cube(5.0));
        assert_eq!(cache.total_bytes(), bytes);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_print_reports_occupancy() {
        let (diagnostics, sink) = Diagnostics::memory();
        let caches = GeometryCaches::new(1, 1, &diagnostics);
        caches.solid().put("a".into(), cube(1.0));
        assert!(caches.solid().get("a").is_some());
        assert!(caches.solid().get("missing").is_none());
        caches.print();
        assert!(sink.contains("Mesh cache: 0 entries, 0 bytes"));
        assert!(sink.contains("Solid cache: 1 entries"));
        assert!(sink.contains("(1 hits, 1 misses)"));
        caches.clear();
        assert!(caches.solid().is_empty());
    }
}
