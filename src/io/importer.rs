// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script file importer
//!
//! Reads a script, resolves `include <...>` textually and records which files
//! were pulled in so the dependency tracker can watch them.

use crate::diagnostics::Diagnostics;
use crate::script::{parse_script, IncludeResolver, Location, ParseError, Scope};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Includes nested deeper than this are reported and skipped
const MAX_INCLUDE_DEPTH: usize = 64;

/// A parsed script file with its resolved includes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptModule {
    pub path: Option<PathBuf>,
    pub scope: Scope,
    /// Names given to `use <...>`
    pub uses: Vec<String>,
    /// Files merged in by `include`, in the order they were read
    pub includes: Vec<PathBuf>,
}

impl ScriptModule {
    /// Directory used to resolve relative `include` and `use` names
    pub fn directory(&self) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve every `use` name, skipping names that cannot be found
    pub fn used_files(&self, library_paths: &[PathBuf]) -> Vec<PathBuf> {
        let dir = self.directory();
        self.uses
            .iter()
            .filter_map(|name| resolve_path(name, &dir, library_paths))
            .collect()
    }
}

/// Find `name` relative to `base_dir`, then in each library directory
pub fn resolve_path(name: &str, base_dir: &Path, library_paths: &[PathBuf]) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    std::iter::once(base_dir)
        .chain(library_paths.iter().map(PathBuf::as_path))
        .map(|dir| dir.join(candidate))
        .find(|path| path.is_file())
}

/// Human-friendly file name for messages
pub fn display_name(path: Option<&Path>) -> String {
    path.and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "<untitled>".to_string())
}

struct Importer<'a> {
    library_paths: &'a [PathBuf],
    diagnostics: &'a Diagnostics,
    /// Files currently being read, innermost last
    stack: Vec<PathBuf>,
    base_dir: PathBuf,
    included: Vec<PathBuf>,
}

impl Importer<'_> {
    fn current_dir(&self) -> PathBuf {
        self.stack
            .last()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone())
    }
}

impl IncludeResolver for Importer<'_> {
    fn include(&mut self, name: &str, location: Location) -> Option<Scope> {
        let Some(path) = resolve_path(name, &self.current_dir(), self.library_paths) else {
            self.diagnostics
                .warning(format!("Can't open include file '{}', {}", name, location));
            return None;
        };
        if self.stack.contains(&path) || self.stack.len() >= MAX_INCLUDE_DEPTH {
            self.diagnostics
                .warning(format!("Recursive include of '{}' ignored, {}", name, location));
            return None;
        }
        if !self.included.contains(&path) {
            self.included.push(path.clone());
        }

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                self.diagnostics
                    .warning(format!("Can't read include file '{}': {}", path.display(), e));
                return None;
            }
        };

        self.stack.push(path.clone());
        let parsed = parse_script(&text, self);
        self.stack.pop();

        match parsed {
            Ok(parsed) => Some(parsed.scope),
            Err(e) => {
                self.diagnostics.error(format!(
                    "Parser error in file \"{}\", line {}: {}",
                    path.display(),
                    e.line,
                    e.message
                ));
                None
            }
        }
    }
}

/// Parse script text that belongs to `path` (if any), resolving includes
pub fn parse_source(
    text: &str,
    path: Option<&Path>,
    library_paths: &[PathBuf],
    diagnostics: &Diagnostics,
) -> Result<ScriptModule, ParseError> {
    let base_dir = path
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut importer = Importer {
        library_paths,
        diagnostics,
        stack: path.map(|p| vec![p.to_path_buf()]).unwrap_or_default(),
        base_dir,
        included: Vec::new(),
    };

    let parsed = parse_script(text, &mut importer)
        .map_err(|e| e.with_file(display_name(path)))?;

    Ok(ScriptModule {
        path: path.map(Path::to_path_buf),
        scope: parsed.scope,
        uses: parsed.uses,
        includes: importer.included,
    })
}

/// Import a script file from disk
pub fn import_file(path: impl AsRef<Path>, library_paths: &[PathBuf], diagnostics: &Diagnostics) -> Result<ScriptModule> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).with_context(|| format!("Failed to read script file: {}", path.display()))?;

    parse_source(&source, Some(path), library_paths, diagnostics)
        .with_context(|| format!("Failed to parse script file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_import_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "cube([10, 10, 10]);")?;

        let module = import_file(file.path(), &[], &Diagnostics::silent())?;
        assert_eq!(module.scope.children.len(), 1);
        assert_eq!(module.path.as_deref(), Some(file.path()));

        Ok(())
    }

    #[test]
    fn test_include_is_merged_and_recorded() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("params.scad"), "size = 4;\nsphere(1);")?;
        let main = dir.path().join("main.scad");
        fs::write(&main, "include <params.scad>\ncube(size);")?;

        let module = import_file(&main, &[], &Diagnostics::silent())?;
        assert_eq!(module.scope.assignments[0].name, "size");
        assert_eq!(module.scope.children.len(), 2);
        assert_eq!(module.includes, vec![dir.path().join("params.scad")]);

        Ok(())
    }

    #[test]
    fn test_missing_include_warns() -> Result<()> {
        let (diagnostics, sink) = Diagnostics::memory();
        let module = parse_source("include <nowhere.scad>\ncube();", None, &[], &diagnostics)?;
        assert_eq!(module.scope.children.len(), 1);
        assert!(sink.contains("Can't open include file 'nowhere.scad'"));
        Ok(())
    }

    #[test]
    fn test_recursive_include_is_cut() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let a = dir.path().join("a.scad");
        fs::write(&a, "include <a.scad>\ncube();")?;

        let (diagnostics, sink) = Diagnostics::memory();
        let module = import_file(&a, &[], &diagnostics)?;
        assert_eq!(module.scope.children.len(), 1);
        assert!(sink.contains("Recursive include"));
        Ok(())
    }

    #[test]
    fn test_library_path_lookup() -> Result<()> {
        let lib = tempfile::tempdir()?;
        fs::write(lib.path().join("shapes.scad"), "module pill() { sphere(1); }")?;

        let module = parse_source("use <shapes.scad>\npill();", None, &[lib.path().to_path_buf()], &Diagnostics::silent())?;
        assert_eq!(module.used_files(&[lib.path().to_path_buf()]), vec![lib.path().join("shapes.scad")]);
        Ok(())
    }
}
