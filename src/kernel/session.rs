// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Compile orchestrator
//!
//! Coordinates parsing, dependency tracking, instantiation, term building,
//! normalization and the exact-geometry worker for one design document.
//! Every pass builds into locals and commits in one step at the end, so an
//! aborted or cancelled pass leaves the previous state untouched.

use super::document::Document;
use super::error::{KernelError, PassAbort};
use super::lock::{CompileGuard, CompileLock};
use super::state::{CompileStatus, PipelineState, RenderStatus};
use crate::ast::NodeTree;
use crate::builtins::Builtins;
use crate::config::PipelineConfig;
use crate::csg::{CsgNode, CsgNormalizer, CsgProducts, CsgTermBuilder, CsgTerms, ProductSet};
use crate::diagnostics::Diagnostics;
use crate::eval::{Camera, InstantiateOptions, Instantiator, ViewState};
use crate::geometry::{Geometry, GeometryCaches};
use crate::io::{parse_source, DependencyTracker, ModuleCache, ScriptModule};
use crate::render::{CancelToken, Progress, RenderEvent, RenderOutcome, RenderWorker};
use crate::script::ParseError;
use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info};

/// One consistent compile result
#[derive(Debug)]
struct Compiled {
    /// `None` while the render worker owns the tree
    tree: Option<NodeTree>,
    terms: CsgTerms,
    normalized: Option<CsgNode>,
    products: ProductSet,
}

struct ActiveRender {
    worker: RenderWorker,
    /// Keeps the compile token held until the worker reports
    _guard: CompileGuard,
    started: Instant,
}

/// Figures reported after a finished render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSummary {
    pub dimension: u8,
    pub facets: usize,
    pub vertices: usize,
    pub elapsed: Duration,
    /// The host should play the completion sound
    pub play_sound: bool,
}

/// What [`Kernel::poll_render`] observed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderPoll {
    NotRunning,
    Running(Option<Progress>),
    Done(RenderStatus),
}

pub struct Kernel {
    config: PipelineConfig,
    diagnostics: Diagnostics,
    builtins: Builtins,
    tracker: DependencyTracker,
    caches: GeometryCaches,
    lock: CompileLock,
    cancel: CancelToken,
    document: Document,
    view: ViewState,
    state: PipelineState,
    root_module: Option<Arc<ScriptModule>>,
    parse_error: Option<ParseError>,
    compiled: Option<Compiled>,
    /// Watermark of the newest included file seen
    includes_mtime: SystemTime,
    /// Watermark of the newest used library seen
    deps_mtime: SystemTime,
    render: Option<ActiveRender>,
    root_geometry: Option<Arc<Geometry>>,
    preview_enabled: bool,
    last_render: Option<RenderSummary>,
}

impl Kernel {
    pub fn new(config: PipelineConfig, diagnostics: Diagnostics) -> Self {
        let modules = ModuleCache::new(diagnostics.clone(), config.library_paths.clone());
        let caches = GeometryCaches::new(config.mesh_cache_size_mb, config.solid_cache_size_mb, &diagnostics);
        Self {
            config,
            builtins: Builtins::standard(),
            tracker: DependencyTracker::new(modules),
            caches,
            lock: CompileLock::new(),
            cancel: CancelToken::new(),
            document: Document::default(),
            view: ViewState::default(),
            state: PipelineState::Idle,
            root_module: None,
            parse_error: None,
            compiled: None,
            includes_mtime: SystemTime::UNIX_EPOCH,
            deps_mtime: SystemTime::UNIX_EPOCH,
            render: None,
            root_geometry: None,
            preview_enabled: true,
            last_render: None,
            diagnostics,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The compile token; held for the duration of a pass or render
    pub fn lock(&self) -> &CompileLock {
        &self.lock
    }

    pub fn caches(&self) -> &GeometryCaches {
        &self.caches
    }

    /// Products of the last successful compile
    pub fn products(&self) -> Option<&ProductSet> {
        self.compiled.as_ref().map(|c| &c.products)
    }

    pub fn node_tree(&self) -> Option<&NodeTree> {
        self.compiled.as_ref().and_then(|c| c.tree.as_ref())
    }

    /// Exact geometry of the last finished render
    pub fn root_geometry(&self) -> Option<&Arc<Geometry>> {
        self.root_geometry.as_ref()
    }

    /// True if there is anything to draw
    pub fn has_geometry(&self) -> bool {
        self.products().is_some_and(|p| !p.root.is_empty()) || self.root_geometry.is_some()
    }

    /// False after a compile whose root products exceeded the preview limit
    pub fn preview_enabled(&self) -> bool {
        self.preview_enabled
    }

    pub fn camera(&self) -> Camera {
        self.view.camera
    }

    pub fn parse_error(&self) -> Option<&ParseError> {
        self.parse_error.as_ref()
    }

    pub fn last_render(&self) -> Option<&RenderSummary> {
        self.last_render.as_ref()
    }

    pub fn is_rendering(&self) -> bool {
        self.render.is_some()
    }

    /// Load a document from disk, dropping everything compiled for the previous one
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), KernelError> {
        if self.lock.is_held() {
            return Err(KernelError::Busy);
        }
        let path = path.as_ref();
        let document = Document::open(path).map_err(|source| KernelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "opened document");
        self.document = document;
        self.reset_session();
        Ok(())
    }

    /// Replace the editor text; takes effect on the next compile
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.document.set_text(text);
    }

    pub fn set_animation_time(&mut self, time: f64) {
        self.view.time = time;
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.view.camera = camera;
    }

    /// Token observed by the checkpoints of compile passes.
    /// It is cleared at the start of every pass.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Compile the current text and build preview products
    pub fn preview(&mut self) -> Result<CompileStatus, KernelError> {
        let started = Instant::now();
        let status = self.compile(false, true, true)?;
        self.finish_preview(status, started);
        Ok(status)
    }

    /// Recompile only if the document or one of its dependencies changed
    pub fn reload_preview(&mut self) -> Result<CompileStatus, KernelError> {
        let started = Instant::now();
        let status = self.compile(true, false, true)?;
        self.finish_preview(status, started);
        Ok(status)
    }

    /// Compile with `$preview` false and start the exact-geometry worker
    pub fn render(&mut self) -> Result<CompileStatus, KernelError> {
        let status = self.compile(false, true, false)?;
        if status != CompileStatus::Compiled {
            return Ok(status);
        }
        self.start_worker(CancelToken::new())
    }

    /// Hand the compiled tree to a worker observing `token`
    fn start_worker(&mut self, token: CancelToken) -> Result<CompileStatus, KernelError> {
        let guard = self.lock.try_acquire().ok_or(KernelError::Busy)?;
        let Some(tree) = self.compiled.as_mut().and_then(|c| c.tree.take()) else {
            return Ok(CompileStatus::Failed);
        };

        self.root_geometry = None;
        self.diagnostics.info("Rendering Polygon Mesh...");
        self.transition(PipelineState::Rendering);
        let worker = RenderWorker::start_with_token(tree, self.caches.clone(), self.config.progress_interval(), token);
        self.render = Some(ActiveRender {
            worker,
            _guard: guard,
            started: Instant::now(),
        });
        Ok(CompileStatus::Rendering)
    }

    /// Drain worker events without blocking
    pub fn poll_render(&mut self) -> RenderPoll {
        let polled = match self.render.as_mut() {
            None => return RenderPoll::NotRunning,
            Some(active) => {
                let mut done = None;
                while let Some(event) = active.worker.try_next() {
                    if let RenderEvent::Done(outcome) = event {
                        done = Some(outcome);
                        break;
                    }
                }
                (done, active.worker.is_finished(), active.worker.progress())
            }
        };
        match polled {
            (Some(outcome), _, _) => RenderPoll::Done(self.finish_render(Some(outcome))),
            (None, true, _) => RenderPoll::Done(self.finish_render(None)),
            (None, false, progress) => RenderPoll::Running(progress),
        }
    }

    /// Block until the running render reports
    pub fn wait_render(&mut self) -> Option<RenderStatus> {
        let active = self.render.as_mut()?;
        let mut outcome = None;
        while !active.worker.is_finished() {
            if let Some(RenderEvent::Done(done)) = active.worker.next_timeout(Duration::from_millis(50)) {
                outcome = Some(done);
            }
        }
        Some(self.finish_render(outcome))
    }

    /// Ask the worker to stop at its next checkpoint
    pub fn cancel_render(&self) {
        if let Some(active) = &self.render {
            active.worker.cancel();
        }
    }

    /// Report whether the rendered geometry is a closed solid
    pub fn check_validity(&self) -> Option<bool> {
        let Some(geometry) = &self.root_geometry else {
            self.diagnostics.info("Nothing to validate! Try building first (press F6).");
            return None;
        };
        if geometry.dimension != 3 {
            self.diagnostics.info("Current top level object is not a 3D object.");
            return None;
        }
        let valid = geometry.mesh.is_closed();
        self.diagnostics
            .info(format!("   Valid:      {:>6}", if valid { "yes" } else { "no" }));
        Some(valid)
    }

    /// True if the rendered geometry can be handed to a `dim`-dimensional exporter
    pub fn can_export(&self, dim: u8) -> bool {
        let Some(geometry) = &self.root_geometry else {
            self.diagnostics.error("Nothing to export! Try rendering first (press F6).");
            return false;
        };
        if geometry.dimension != dim {
            self.diagnostics
                .ui_error(format!("Current top level object is not a {}D object.", dim));
            return false;
        }
        if geometry.is_empty() {
            self.diagnostics.ui_error("Current top level object is empty.");
            return false;
        }
        true
    }

    /// Empty the geometry caches and the library cache
    pub fn flush_caches(&mut self) -> Result<(), KernelError> {
        let _guard = self.lock.try_acquire().ok_or(KernelError::Busy)?;
        self.caches.clear();
        self.tracker.clear();
        self.deps_mtime = SystemTime::UNIX_EPOCH;
        debug!("caches flushed");
        Ok(())
    }

    /// Apply new settings; cache budgets shrink immediately
    pub fn apply_config(&mut self, config: PipelineConfig) -> Result<(), KernelError> {
        let _guard = self.lock.try_acquire().ok_or(KernelError::Busy)?;
        self.caches
            .set_max_sizes(config.mesh_cache_size_mb, config.solid_cache_size_mb);
        if config.library_paths != self.config.library_paths {
            self.tracker
                .cache_mut()
                .set_library_paths(config.library_paths.clone());
            self.tracker.clear();
            self.deps_mtime = SystemTime::UNIX_EPOCH;
        }
        self.config = config;
        Ok(())
    }

    /// Source text of the last parsed document
    pub fn dump_ast(&self) -> Option<String> {
        self.root_module.as_ref().map(|m| m.scope.dump())
    }

    /// Canonical text of the instantiated node tree
    pub fn dump_csg_tree(&self) -> Option<String> {
        self.node_tree().map(|tree| tree.dump().to_string())
    }

    /// Raw term, normalized term and products of the last compile
    pub fn dump_products(&self) -> Option<String> {
        let compiled = self.compiled.as_ref()?;
        let mut out = String::new();
        let raw = compiled.terms.root.as_ref().map(CsgNode::dump);
        let normalized = compiled.normalized.as_ref().map(CsgNode::dump);
        let _ = writeln!(out, "term: {}", raw.as_deref().unwrap_or("<empty>"));
        let _ = writeln!(out, "normalized: {}", normalized.as_deref().unwrap_or("<empty>"));
        out.push_str(&compiled.products.dump());
        Some(out)
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "pipeline state");
        self.state = next;
    }

    fn reset_session(&mut self) {
        self.root_module = None;
        self.parse_error = None;
        self.includes_mtime = SystemTime::UNIX_EPOCH;
        self.deps_mtime = SystemTime::UNIX_EPOCH;
        self.clear_compiled();
    }

    fn clear_compiled(&mut self) {
        self.compiled = None;
        self.root_geometry = None;
    }

    /// One compile pass under the compile token
    fn compile(&mut self, reload: bool, force: bool, preview: bool) -> Result<CompileStatus, KernelError> {
        let _guard = self.lock.try_acquire().ok_or(KernelError::Busy)?;
        self.cancel.reset();
        self.diagnostics.reset_pass();
        self.diagnostics.set_hardwarnings(self.config.hardwarnings);
        self.diagnostics.suppress_exceptions();
        self.transition(PipelineState::StalenessCheck);

        let did_compile = match self.refresh_sources(reload) {
            Ok(did_compile) => did_compile,
            Err(e) => {
                self.transition(PipelineState::Idle);
                return Err(e);
            }
        };

        if self.diagnostics.take_latched() {
            self.diagnostics.info("Execution aborted");
            self.transition(PipelineState::Idle);
            return Ok(CompileStatus::Aborted);
        }
        if !did_compile && !force {
            self.transition(PipelineState::Idle);
            return Ok(CompileStatus::Unchanged);
        }

        let status = match self.compile_design(preview) {
            Ok(status) => status,
            Err(abort) => {
                self.report_abort(abort);
                abort.into()
            }
        };
        self.transition(PipelineState::Idle);
        Ok(status)
    }

    /// Reparse stale sources and settle libraries. After libraries changed on
    /// a reload the staleness check runs again, since the document or its
    /// includes may have changed meanwhile. True if anything was recompiled.
    fn refresh_sources(&mut self, reload: bool) -> Result<bool, KernelError> {
        let mut did_compile = false;
        let mut stale = self.needs_reparse(reload)?;
        for _ in 0..self.config.max_dependency_passes.max(1) {
            if stale {
                self.reparse();
                did_compile = true;
            }
            if !self.settle_dependencies() {
                break;
            }
            did_compile = true;
            if !reload {
                break;
            }
            stale = self.needs_reparse(true)?;
            if !stale {
                break;
            }
        }
        Ok(did_compile)
    }

    fn needs_reparse(&mut self, reload: bool) -> Result<bool, KernelError> {
        if !reload {
            return Ok(true);
        }
        if self.document.changed_on_disk() {
            self.document.reload().map_err(|source| KernelError::Io {
                path: self.document.path().map(Path::to_path_buf).unwrap_or_default(),
                source,
            })?;
            return Ok(true);
        }
        if self.root_module.is_some() {
            let mtime = self.tracker.includes_changed();
            if mtime > self.includes_mtime {
                self.includes_mtime = mtime;
                return Ok(true);
            }
        }
        Ok(self.document.is_modified_since_compile())
    }

    fn reparse(&mut self) {
        self.transition(PipelineState::Reparse);
        self.diagnostics.info("Parsing design (AST generation)...");
        self.document.mark_compiled();

        let parsed = parse_source(
            self.document.text(),
            self.document.path(),
            self.tracker.cache().library_paths(),
            &self.diagnostics,
        );
        match parsed {
            Ok(module) => {
                let module = Arc::new(module);
                self.tracker.set_root(&module);
                self.includes_mtime = self.includes_mtime.max(self.tracker.includes_changed());
                self.root_module = Some(module);
                self.parse_error = None;
            }
            Err(e) => {
                let file = e.file.clone().unwrap_or_else(|| self.document.name());
                self.diagnostics.error(format!(
                    "Parser error in file \"{}\", line {}: {}",
                    file, e.line, e.message
                ));
                self.root_module = None;
                self.parse_error = Some(e);
            }
        }
    }

    /// Refresh used libraries until a pass turns up neither a newer
    /// modification time nor a new library; true if anything changed
    fn settle_dependencies(&mut self) -> bool {
        if self.root_module.is_none() {
            return false;
        }
        let mut changed = false;
        for pass in 0..self.config.max_dependency_passes.max(1) {
            let known = self.tracker.libraries().count();
            let mtime = self.tracker.handle_dependencies();
            let newer = mtime > self.deps_mtime;
            if newer {
                self.deps_mtime = mtime;
                changed = true;
            }
            let discovered = self.tracker.libraries().count();
            debug!(pass, known, discovered, newer, "dependency pass");
            if !newer && discovered == known {
                break;
            }
        }
        if changed {
            self.diagnostics.info(format!(
                "Used file cache size: {} files",
                self.tracker.cache().size()
            ));
        }
        changed
    }

    fn compile_design(&mut self, preview: bool) -> Result<CompileStatus, PassAbort> {
        self.transition(PipelineState::Instantiate);
        self.diagnostics.info("Compiling design (CSG Tree generation)...");
        let Some(module) = self.root_module.clone() else {
            return Ok(self.fail_compile());
        };

        let view = ViewState { preview, ..self.view };
        let options = InstantiateOptions {
            parameter_check: self.config.parameter_check,
            range_check: self.config.range_check,
        };
        let instantiated = Instantiator::new(&self.builtins, &self.diagnostics)
            .with_options(options)
            .with_libraries(self.tracker.cache())
            .instantiate(&module, &view);
        if self.diagnostics.take_latched() {
            return Err(PassAbort::HardWarning);
        }
        self.view.camera = instantiated.camera;

        let Some(root) = instantiated.root else {
            return Ok(self.fail_compile());
        };
        let tree = NodeTree::new(root.into_effective_root());

        self.transition(PipelineState::BuildTerms);
        self.diagnostics.info("Compiling design (CSG Products generation)...");
        let terms = CsgTermBuilder::new(&tree)
            .with_caches(&self.caches)
            .with_cancel(self.cancel.clone())
            .build()?;
        self.caches.print();
        if self.diagnostics.take_latched() {
            return Err(PassAbort::HardWarning);
        }

        self.transition(PipelineState::Normalize);
        self.diagnostics.info("Compiling design (CSG Products normalization)...");
        let mut normalizer = CsgNormalizer::new(self.config.normalize_limit(), self.diagnostics.clone())
            .with_cancel(self.cancel.clone());

        let mut products = ProductSet::default();
        let normalized = match terms.root.clone() {
            Some(term) => {
                let normalized = normalizer.normalize(term)?;
                match &normalized {
                    Some(normalized) => products.root.import(normalized),
                    None => self
                        .diagnostics
                        .warning("CSG normalization resulted in an empty tree"),
                }
                normalized
            }
            None => None,
        };

        if !terms.highlights.is_empty() {
            self.diagnostics.info(format!(
                "Compiling highlights ({} CSG Trees)...",
                terms.highlights.len()
            ));
            products.highlights = normalize_all(&mut normalizer, &terms.highlights)?;
        }
        if !terms.background.is_empty() {
            self.diagnostics.info(format!(
                "Compiling background ({} CSG Trees)...",
                terms.background.len()
            ));
            products.background = normalize_all(&mut normalizer, &terms.background)?;
        }
        if self.diagnostics.take_latched() {
            return Err(PassAbort::HardWarning);
        }

        let size = products.root.size();
        if size > self.config.opencsg_limit {
            self.diagnostics
                .ui_warning(format!("Normalized tree has {} elements!", size));
            self.diagnostics.ui_warning("OpenCSG rendering has been disabled.");
            self.preview_enabled = false;
        } else {
            self.diagnostics
                .info(format!("Normalized CSG tree has {} elements", size));
            self.preview_enabled = true;
        }

        self.commit(tree, terms, normalized, products);
        Ok(CompileStatus::Compiled)
    }

    /// Replace the compiled state in one step
    fn commit(&mut self, tree: NodeTree, mut terms: CsgTerms, normalized: Option<CsgNode>, products: ProductSet) {
        {
            let mut mesh = self.caches.mesh();
            for (fingerprint, geometry) in terms.fresh.drain(..) {
                mesh.put(fingerprint, geometry);
            }
        }
        info!(
            nodes = tree.node_count(),
            products = products.root.len(),
            leaves = products.root.size(),
            "compiled"
        );
        self.compiled = Some(Compiled {
            tree: Some(tree),
            terms,
            normalized,
            products,
        });
        self.root_geometry = None;
        self.transition(PipelineState::PreviewReady);
    }

    fn fail_compile(&mut self) -> CompileStatus {
        if self.parse_error.is_some() {
            self.diagnostics.error("Compilation failed!");
        } else {
            self.diagnostics
                .error("Compilation failed! (no top level object found)");
        }
        self.clear_compiled();
        CompileStatus::Failed
    }

    fn report_abort(&self, abort: PassAbort) {
        let message = match (abort, self.state) {
            (PassAbort::HardWarning, PipelineState::Instantiate) => "Execution aborted",
            (PassAbort::HardWarning, _) => "CSG generation cancelled due to hardwarning being enabled.",
            (PassAbort::Cancelled, _) => "CSG generation cancelled.",
        };
        self.diagnostics.info(message);
    }

    fn finish_preview(&self, status: CompileStatus, started: Instant) {
        if status == CompileStatus::Compiled {
            self.diagnostics.info("Compile and preview finished.");
            self.diagnostics.info(rendering_time(started.elapsed()));
        }
    }

    /// Take the tree back from the worker and commit its results
    fn finish_render(&mut self, outcome: Option<RenderOutcome>) -> RenderStatus {
        let Some(active) = self.render.take() else {
            return RenderStatus::Failed;
        };
        self.transition(PipelineState::Done);

        let Some(outcome) = outcome else {
            self.diagnostics.error("Rendering failed.");
            self.clear_compiled();
            self.transition(PipelineState::Idle);
            return RenderStatus::Failed;
        };
        if let Some(compiled) = self.compiled.as_mut() {
            compiled.tree = Some(outcome.tree);
        }
        if outcome.cancelled {
            self.diagnostics.info("Rendering cancelled.");
            self.transition(PipelineState::Idle);
            return RenderStatus::Cancelled;
        }

        {
            let mut solid = self.caches.solid();
            for (fingerprint, geometry) in outcome.fresh {
                solid.put(fingerprint, geometry);
            }
        }

        let elapsed = active.started.elapsed();
        let status = match outcome.geometry {
            Some(geometry) => {
                self.caches.print();
                self.diagnostics.info(rendering_time(elapsed));
                if !geometry.is_empty() {
                    self.report_geometry(&geometry);
                }
                self.diagnostics.info("Rendering finished.");
                let status = if geometry.is_empty() {
                    RenderStatus::Empty
                } else {
                    RenderStatus::Finished
                };
                self.last_render = Some(RenderSummary {
                    dimension: geometry.dimension,
                    facets: geometry.facets(),
                    vertices: geometry.vertices(),
                    elapsed,
                    play_sound: self.config.sound_notification
                        && elapsed.as_secs() >= self.config.sound_threshold_secs,
                });
                self.root_geometry = Some(geometry);
                status
            }
            None => {
                self.diagnostics.ui_warning("No top level geometry to render");
                RenderStatus::Empty
            }
        };
        self.transition(PipelineState::Idle);
        status
    }

    fn report_geometry(&self, geometry: &Geometry) {
        let simple = geometry.mesh.is_closed();
        self.diagnostics.info(format!(
            "   Top level object is a {}D object:",
            geometry.dimension
        ));
        self.diagnostics
            .info(format!("   Simple:     {:>6}", if simple { "yes" } else { "no" }));
        self.diagnostics
            .info(format!("   Vertices:   {:6}", geometry.vertices()));
        self.diagnostics
            .info(format!("   Facets:     {:6}", geometry.facets()));
        if !simple {
            self.diagnostics
                .ui_warning("Object may not be a valid 2-manifold and may need repair!");
        }
    }
}

fn normalize_all(normalizer: &mut CsgNormalizer, terms: &[CsgNode]) -> Result<CsgProducts, PassAbort> {
    let mut products = CsgProducts::new();
    for term in terms {
        if let Some(normalized) = normalizer.normalize(term.clone())? {
            products.import(&normalized);
        }
    }
    Ok(products)
}

fn rendering_time(elapsed: Duration) -> String {
    let s = elapsed.as_secs();
    format!(
        "Total rendering time: {} hours, {} minutes, {} seconds",
        s / 3600,
        (s / 60) % 60,
        s % 60
    )
}
