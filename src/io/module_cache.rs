// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Parsed-module cache for `use`d libraries
//!
//! Entries are keyed by path and invalidated when the file (or any file it
//! includes) has a different modification time than when it was parsed.

use super::importer::{parse_source, ScriptModule};
use crate::diagnostics::Diagnostics;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Modification time of a file, `UNIX_EPOCH` if it cannot be read
pub fn file_mtime(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

#[derive(Debug, Clone)]
struct CacheEntry {
    /// `None` when the last parse failed
    module: Option<Arc<ScriptModule>>,
    mtime: SystemTime,
    /// Newest mtime among the module's includes at parse time
    includes_mtime: SystemTime,
}

/// Result of [`ModuleCache::evaluate`]
#[derive(Debug, Clone)]
pub struct CachedModule {
    pub module: Arc<ScriptModule>,
    /// Newest modification time of the file and everything it includes
    pub mtime: SystemTime,
    /// True if the file was (re)parsed by this call
    pub reparsed: bool,
}

/// Thread-safe cache of parsed library modules
pub struct ModuleCache {
    entries: DashMap<PathBuf, CacheEntry>,
    library_paths: Vec<PathBuf>,
    diagnostics: Diagnostics,
}

impl ModuleCache {
    pub fn new(diagnostics: Diagnostics, library_paths: Vec<PathBuf>) -> Self {
        Self {
            entries: DashMap::new(),
            library_paths,
            diagnostics,
        }
    }

    pub fn library_paths(&self) -> &[PathBuf] {
        &self.library_paths
    }

    pub fn set_library_paths(&mut self, paths: Vec<PathBuf>) {
        self.library_paths = paths;
    }

    /// Parse `text` as the contents of `path` and store the result
    pub fn parse(&self, path: &Path, text: &str) -> Option<Arc<ScriptModule>> {
        let mtime = file_mtime(path);
        let module = match parse_source(text, Some(path), &self.library_paths, &self.diagnostics) {
            Ok(module) => Some(Arc::new(module)),
            Err(e) => {
                self.diagnostics.error(format!(
                    "Parser error in file \"{}\", line {}: {}",
                    path.display(),
                    e.line,
                    e.message
                ));
                None
            }
        };
        let includes_mtime = module
            .as_deref()
            .map(newest_include)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                module: module.clone(),
                mtime,
                includes_mtime,
            },
        );
        module
    }

    /// Cached module for `path`, re-reading it if the file or its includes changed
    pub fn evaluate(&self, path: &Path) -> Option<CachedModule> {
        let mtime = file_mtime(path);
        if mtime == SystemTime::UNIX_EPOCH {
            self.diagnostics
                .warning(format!("Can't open library '{}'.", path.display()));
            self.entries.remove(path);
            return None;
        }

        if let Some(entry) = self.entries.get(path) {
            let fresh = entry.mtime == mtime
                && entry
                    .module
                    .as_deref()
                    .map(|m| newest_include(m) <= entry.includes_mtime)
                    .unwrap_or(true);
            if fresh {
                return entry.module.clone().map(|module| CachedModule {
                    module,
                    mtime: mtime.max(entry.includes_mtime),
                    reparsed: false,
                });
            }
        }

        debug!(path = %path.display(), "compiling library");
        self.diagnostics
            .info(format!("Compiling library '{}'.", path.display()));
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                self.diagnostics
                    .warning(format!("Can't open library '{}': {}", path.display(), e));
                return None;
            }
        };
        let module = self.parse(path, &text)?;
        let includes_mtime = newest_include(&module);
        Some(CachedModule {
            module,
            mtime: mtime.max(includes_mtime),
            reparsed: true,
        })
    }

    /// Cached module without touching the file system
    pub fn lookup(&self, path: &Path) -> Option<Arc<ScriptModule>> {
        self.entries.get(path).and_then(|e| e.module.clone())
    }

    /// Number of cached files
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

fn newest_include(module: &ScriptModule) -> SystemTime {
    module
        .includes
        .iter()
        .map(|p| file_mtime(p))
        .max()
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
