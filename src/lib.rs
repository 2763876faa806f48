// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe Studio
//!
//! Compile, preview and render pipeline for OpenSCAD-style parametric
//! scripts. A script is parsed, instantiated into a node tree, turned into a
//! boolean term tree and normalized into flat render products; full renders
//! evaluate the node tree on a background worker.

pub mod ast;
pub mod builtins;
pub mod config;
pub mod csg;
pub mod diagnostics;
pub mod eval;
pub mod geometry;
pub mod io;
pub mod kernel;
pub mod render;
pub mod script;
pub mod value;

pub use config::PipelineConfig;
pub use csg::ProductSet;
pub use diagnostics::{Diagnostics, Level};
pub use geometry::{Geometry, Mesh};
pub use kernel::{CompileStatus, Kernel, KernelError, RenderStatus};
pub use value::Value;

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;

/// Compile `source` and return its preview products
pub fn preview(source: &str) -> Result<ProductSet> {
    let mut kernel = Kernel::new(PipelineConfig::default(), Diagnostics::silent());
    kernel.set_text(source);
    match kernel.preview()? {
        CompileStatus::Compiled => Ok(kernel.products().cloned().unwrap_or_default()),
        status => bail!("compilation did not complete: {:?}", status),
    }
}

/// Compile and fully render `source`, blocking until the worker is done
pub fn render(source: &str) -> Result<Option<Arc<Geometry>>> {
    let mut kernel = Kernel::new(PipelineConfig::default(), Diagnostics::silent());
    kernel.set_text(source);
    render_with(&mut kernel)
}

/// Render a script file from disk
pub fn render_file(path: impl AsRef<Path>) -> Result<Option<Arc<Geometry>>> {
    let mut kernel = Kernel::new(PipelineConfig::default(), Diagnostics::silent());
    kernel.open(path)?;
    render_with(&mut kernel)
}

fn render_with(kernel: &mut Kernel) -> Result<Option<Arc<Geometry>>> {
    match kernel.render()? {
        CompileStatus::Rendering => {}
        status => bail!("compilation did not complete: {:?}", status),
    }
    match kernel.wait_render() {
        Some(RenderStatus::Finished) | Some(RenderStatus::Empty) => Ok(kernel.root_geometry().cloned()),
        Some(RenderStatus::Cancelled) => bail!("rendering was cancelled"),
        _ => bail!("rendering failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cube() {
        let products = preview("cube([10, 10, 10]);").unwrap();
        assert_eq!(products.root.size(), 1);

        let geometry = render("cube([10, 10, 10]);").unwrap();
        assert_eq!(geometry.map(|g| g.facets()), Some(12));
    }

    #[test]
    fn test_empty_script_is_an_error() {
        assert!(preview("").is_err());
    }
}
