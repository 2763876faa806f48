// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! End-to-end compile, preview and render tests

use polyframe_studio::diagnostics::MemorySink;
use polyframe_studio::geometry::BooleanOp;
use polyframe_studio::kernel::{CompileStatus, Kernel, KernelError, RenderStatus};
use polyframe_studio::{Diagnostics, PipelineConfig};
use std::sync::Arc;

fn kernel_with(config: PipelineConfig, text: &str) -> (Kernel, Arc<MemorySink>) {
    let (diagnostics, sink) = Diagnostics::memory();
    let mut kernel = Kernel::new(config, diagnostics);
    kernel.set_text(text);
    (kernel, sink)
}

fn kernel(text: &str) -> (Kernel, Arc<MemorySink>) {
    kernel_with(PipelineConfig::default(), text)
}

#[test]
fn test_single_cube_preview() {
    let (mut kernel, _sink) = kernel("cube(1);");
    assert_eq!(kernel.preview().unwrap(), CompileStatus::Compiled);

    let products = kernel.products().unwrap();
    assert_eq!(products.root.len(), 1);
    assert_eq!(products.root.size(), 1);
    assert!(products.highlights.is_empty());
    assert!(products.background.is_empty());
    assert!(kernel.preview_enabled());
}

#[test]
fn test_difference_preview() {
    let config = PipelineConfig {
        opencsg_limit: 50,
        ..Default::default()
    };
    let (mut kernel, sink) = kernel_with(config, "difference() { cube(10); sphere(5); }");
    assert_eq!(kernel.preview().unwrap(), CompileStatus::Compiled);

    let products = kernel.products().unwrap();
    assert_eq!(products.root.len(), 1);
    let product = &products.root.products[0];
    assert_eq!(product.len(), 2);
    assert_eq!(product.terms[0].op, BooleanOp::Union);
    assert_eq!(product.terms[1].op, BooleanOp::Difference);

    let dump = products.root.dump();
    assert!(dump.starts_with("+cube"), "{}", dump);
    assert!(dump.contains(" -sphere"), "{}", dump);
    assert!(sink.contains("Normalized CSG tree has 2 elements"));
}

#[test]
fn test_normalization_overflow_leaves_empty_products() {
    let config = PipelineConfig {
        opencsg_limit: 1,
        ..Default::default()
    };
    let (mut kernel, sink) = kernel_with(
        config,
        "difference() { cube(10); sphere(5); translate([2, 2, 2]) sphere(4); }",
    );
    assert_eq!(kernel.preview().unwrap(), CompileStatus::Compiled);

    assert!(sink.contains("WARNING: Normalized tree is growing past 2 elements. Aborting normalization."));
    assert!(sink.contains("WARNING: CSG normalization resulted in an empty tree"));
    assert!(kernel.products().map_or(true, |p| p.root.is_empty()));
    assert!(!kernel.has_geometry());
}

#[test]
fn test_large_tree_disables_preview() {
    let config = PipelineConfig {
        opencsg_limit: 1,
        ..Default::default()
    };
    let (mut kernel, sink) = kernel_with(config, "cube(1); translate([0.5, 0, 0]) cube(1);");
    assert_eq!(kernel.preview().unwrap(), CompileStatus::Compiled);

    assert_eq!(kernel.products().map(|p| p.root.size()), Some(2));
    assert!(!kernel.preview_enabled());
    assert!(sink.contains("UI-WARNING: Normalized tree has 2 elements!"));
    assert!(sink.contains("UI-WARNING: OpenCSG rendering has been disabled."));
}

#[test]
fn test_highlight_and_background_modifiers() {
    let (mut kernel, sink) = kernel("#cube(1); %translate([5, 0, 0]) cube(1); sphere(1);");
    assert_eq!(kernel.preview().unwrap(), CompileStatus::Compiled);

    let products = kernel.products().unwrap();
    assert_eq!(products.highlights.len(), 1);
    assert_eq!(products.background.len(), 1);
    // highlighted objects still take part in the root term
    assert_eq!(products.root.size(), 2);
    assert!(sink.contains("Compiling highlights (1 CSG Trees)..."));
    assert!(sink.contains("Compiling background (1 CSG Trees)..."));
}

#[test]
fn test_root_modifier_selects_subtree() {
    let (mut kernel, _sink) = kernel("sphere(1); !translate([5, 0, 0]) cube(1);");
    assert_eq!(kernel.preview().unwrap(), CompileStatus::Compiled);

    let products = kernel.products().unwrap();
    assert_eq!(products.root.size(), 1);
    assert!(products.root.dump().starts_with("+cube"));
}

#[test]
fn test_preview_is_idempotent() {
    let (mut kernel, _sink) = kernel("difference() { cube(10); sphere(5); }");
    kernel.preview().unwrap();
    let first = kernel.products().cloned();

    assert_eq!(kernel.preview().unwrap(), CompileStatus::Compiled);
    assert_eq!(kernel.products().cloned(), first);

    assert_eq!(kernel.reload_preview().unwrap(), CompileStatus::Unchanged);
    assert_eq!(kernel.products().cloned(), first);
}

#[test]
fn test_reload_picks_up_edits() {
    let (mut kernel, _sink) = kernel("cube(1);");
    kernel.preview().unwrap();

    kernel.set_text("cube(1); translate([3, 0, 0]) sphere(1);");
    assert_eq!(kernel.reload_preview().unwrap(), CompileStatus::Compiled);
    assert_eq!(kernel.products().map(|p| p.root.size()), Some(2));
}

#[test]
fn test_compile_is_refused_while_rendering() {
    let (mut kernel, _sink) = kernel("difference() { cube(10); sphere(5); }");
    assert_eq!(kernel.render().unwrap(), CompileStatus::Rendering);
    assert!(kernel.lock().is_held());

    assert!(matches!(kernel.preview(), Err(KernelError::Busy)));
    assert!(matches!(kernel.render(), Err(KernelError::Busy)));
    assert!(matches!(kernel.flush_caches(), Err(KernelError::Busy)));

    assert!(kernel.wait_render().is_some());
    assert!(!kernel.lock().is_held());
    assert_eq!(kernel.preview().unwrap(), CompileStatus::Compiled);
}

#[test]
fn test_cancel_request_always_settles_the_render() {
    let (mut kernel, _sink) = kernel("cube(2);");
    kernel.render().unwrap();
    assert_eq!(kernel.wait_render(), Some(RenderStatus::Finished));

    kernel.set_text("for (i = [0 : 400]) translate([i * 0.1, 0, 0]) sphere(1, $fn = 24);");
    assert_eq!(kernel.render().unwrap(), CompileStatus::Rendering);
    kernel.cancel_render();

    // the worker may finish before it observes the request
    let status = kernel.wait_render();
    assert!(matches!(status, Some(RenderStatus::Cancelled | RenderStatus::Finished)), "{:?}", status);
    assert!(kernel.node_tree().is_some());
    assert!(!kernel.lock().is_held());
    assert_eq!(kernel.preview().unwrap(), CompileStatus::Compiled);
}

#[test]
fn test_render_difference_cuts_geometry() {
    let (mut kernel, _sink) = kernel("difference() { cube(10); sphere(5); }");
    assert_eq!(kernel.render().unwrap(), CompileStatus::Rendering);
    assert_eq!(kernel.wait_render(), Some(RenderStatus::Finished));

    let geometry = kernel.root_geometry().cloned().unwrap();
    assert_ne!(geometry.facets(), 12);
    let bbox = geometry.bounding_box();
    assert!(bbox.min.coords.iter().all(|c| c.abs() < 1e-6));
    assert!(bbox.max.coords.iter().all(|c| (c - 10.0).abs() < 1e-6));
}

#[test]
fn test_flush_caches_empties_both_tiers() {
    let (mut kernel, _sink) = kernel("cube(3);");
    kernel.render().unwrap();
    kernel.wait_render();
    assert!(!kernel.caches().mesh().is_empty());

    kernel.flush_caches().unwrap();
    assert!(kernel.caches().mesh().is_empty());
    assert!(kernel.caches().solid().is_empty());
}
