// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Background rendering with progress and cancellation

mod progress;
mod worker;

pub use progress::{CancelToken, Cancelled, Progress, ProgressReporter};
pub use worker::{RenderEvent, RenderOutcome, RenderWorker};
