// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - script import, module cache and dependency tracking

mod dependencies;
mod importer;
mod module_cache;

pub use dependencies::{DependencySnapshot, DependencyTracker};
pub use importer::{display_name, import_file, parse_source, resolve_path, ScriptModule};
pub use module_cache::{file_mtime, CachedModule, ModuleCache};
