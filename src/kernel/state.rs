// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

use std::fmt;

/// Stage of the compile pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    StalenessCheck,
    Reparse,
    Instantiate,
    BuildTerms,
    Normalize,
    PreviewReady,
    Rendering,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::StalenessCheck => "staleness-check",
            PipelineState::Reparse => "reparse",
            PipelineState::Instantiate => "instantiate",
            PipelineState::BuildTerms => "build-terms",
            PipelineState::Normalize => "normalize",
            PipelineState::PreviewReady => "preview-ready",
            PipelineState::Rendering => "rendering",
            PipelineState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of one compile request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    /// Nothing changed since the last compile
    Unchanged,
    /// A new consistent state was committed
    Compiled,
    /// Parsing or instantiation produced nothing; the compiled state was cleared
    Failed,
    /// Hard warnings stopped the pass; the previous state was kept
    Aborted,
    /// Cancellation stopped the pass; the previous state was kept
    Cancelled,
    /// The exact-geometry worker was started
    Rendering,
}

/// Outcome of a finished render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Finished,
    /// Finished without top-level geometry
    Empty,
    Cancelled,
    /// The worker stopped without reporting
    Failed,
}
