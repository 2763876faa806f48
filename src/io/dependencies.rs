// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Dependency tracker
//!
//! Watches the files the active document includes and the libraries it
//! uses, transitively. Each call to [`DependencyTracker::handle_dependencies`]
//! refreshes only the libraries that were known when the call started; any
//! library discovered along the way is picked up by the next call. Repeated
//! calls on a stable file set therefore converge to a constant timestamp.

use super::importer::ScriptModule;
use super::module_cache::{file_mtime, ModuleCache};
use indexmap::IndexSet;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Last observed modification times
#[derive(Debug, Clone, PartialEq)]
pub struct DependencySnapshot {
    pub files: BTreeMap<PathBuf, SystemTime>,
    /// Newest mtime seen among included files
    pub includes_mtime: SystemTime,
    /// Newest mtime seen among used libraries
    pub deps_mtime: SystemTime,
}

impl Default for DependencySnapshot {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            includes_mtime: SystemTime::UNIX_EPOCH,
            deps_mtime: SystemTime::UNIX_EPOCH,
        }
    }
}

pub struct DependencyTracker {
    cache: ModuleCache,
    /// Files textually included by the active document
    includes: Vec<PathBuf>,
    /// Libraries reachable through `use`, in discovery order
    libraries: IndexSet<PathBuf>,
    snapshot: DependencySnapshot,
}

impl DependencyTracker {
    pub fn new(cache: ModuleCache) -> Self {
        Self {
            cache,
            includes: Vec::new(),
            libraries: IndexSet::new(),
            snapshot: DependencySnapshot::default(),
        }
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ModuleCache {
        &mut self.cache
    }

    pub fn snapshot(&self) -> &DependencySnapshot {
        &self.snapshot
    }

    /// Libraries known so far
    pub fn libraries(&self) -> impl Iterator<Item = &Path> {
        self.libraries.iter().map(PathBuf::as_path)
    }

    /// Replace the watched set with the includes and direct uses of `root`
    pub fn set_root(&mut self, root: &ScriptModule) {
        self.includes = root.includes.clone();
        self.libraries = root
            .used_files(self.cache.library_paths())
            .into_iter()
            .collect();
        self.snapshot.files.retain(|path, _| {
            root.includes.contains(path) || self.libraries.contains(path)
        });
    }

    /// Newest modification time across the included files
    pub fn includes_changed(&mut self) -> SystemTime {
        let mut newest = SystemTime::UNIX_EPOCH;
        for path in &self.includes {
            let mtime = file_mtime(path);
            self.snapshot.files.insert(path.clone(), mtime);
            newest = newest.max(mtime);
        }
        self.snapshot.includes_mtime = self.snapshot.includes_mtime.max(newest);
        newest
    }

    /// Refresh used libraries and return the newest modification time among them
    pub fn handle_dependencies(&mut self) -> SystemTime {
        let known: Vec<PathBuf> = self.libraries.iter().cloned().collect();
        let mut newest = SystemTime::UNIX_EPOCH;

        for path in known {
            let Some(cached) = self.cache.evaluate(&path) else {
                continue;
            };
            self.snapshot.files.insert(path.clone(), cached.mtime);
            newest = newest.max(cached.mtime);

            for used in cached.module.used_files(self.cache.library_paths()) {
                if self.libraries.insert(used.clone()) {
                    debug!(library = %used.display(), "discovered library");
                }
            }
        }

        self.snapshot.deps_mtime = self.snapshot.deps_mtime.max(newest);
        newest
    }

    /// Drop every cached library
    pub fn clear(&mut self) {
        self.cache.clear();
        self.snapshot = DependencySnapshot::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::io::parse_source;
    use std::fs;

    fn root_using(dir: &Path, text: &str) -> ScriptModule {
        let path = dir.join("main.scad");
        parse_source(text, Some(&path), &[], &Diagnostics::silent()).unwrap_or_default()
    }

    #[test]
    fn test_chain_converges() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("a.scad"), "use <b.scad>\nmodule a() {}")?;
        fs::write(dir.path().join("b.scad"), "use <c.scad>\nmodule b() {}")?;
        fs::write(dir.path().join("c.scad"), "module c() {}")?;

        let mut tracker = DependencyTracker::new(ModuleCache::new(Diagnostics::silent(), Vec::new()));
        tracker.set_root(&root_using(dir.path(), "use <a.scad>\na();"));

        let mut previous = None;
        let mut stable_after = None;
        for pass in 0..10 {
            let known_before = tracker.libraries().count();
            let mtime = tracker.handle_dependencies();
            if previous == Some(mtime) && tracker.libraries().count() == known_before {
                stable_after = Some(pass);
                break;
            }
            previous = Some(mtime);
        }

        assert!(stable_after.is_some());
        assert_eq!(tracker.libraries().count(), 3);
        assert_eq!(tracker.cache().size(), 3);

        let settled = tracker.handle_dependencies();
        assert_eq!(Some(settled), previous);
        Ok(())
    }

    #[test]
    fn test_includes_changed_reports_newest() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("p.scad"), "x = 1;")?;
        let root = root_using(dir.path(), "include <p.scad>\ncube(x);");

        let mut tracker = DependencyTracker::new(ModuleCache::new(Diagnostics::silent(), Vec::new()));
        tracker.set_root(&root);
        let first = tracker.includes_changed();
        assert!(first > SystemTime::UNIX_EPOCH);
        assert_eq!(tracker.includes_changed(), first);
        assert_eq!(tracker.snapshot().files.len(), 1);
        Ok(())
    }
}
