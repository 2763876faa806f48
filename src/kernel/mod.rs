// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Compile orchestrator
//!
//! The [`Kernel`] owns the document, the dependency tracker, the geometry
//! caches and the compiled state, and drives them through the pipeline:
//!
//! ```text
//! Idle -> StalenessCheck -> Reparse -> Instantiate -> BuildTerms -> Normalize
//!      -> PreviewReady | Rendering -> Done -> Idle
//! ```

mod document;
mod error;
mod lock;
mod session;
mod state;

pub use document::Document;
pub use error::{KernelError, PassAbort};
pub use lock::{CompileGuard, CompileLock};
pub use session::{Kernel, RenderPoll, RenderSummary};
pub use state::{CompileStatus, PipelineState, RenderStatus};
