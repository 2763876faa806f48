// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

use super::state::CompileStatus;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    /// Another compile or render cycle holds the compile token
    #[error("a compile or render cycle is already running")]
    Busy,
    #[error("no document is open")]
    NoDocument,
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a pass stopped before committing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PassAbort {
    #[error("warning raised with hard warnings enabled")]
    HardWarning,
    #[error("pass cancelled")]
    Cancelled,
}

impl From<crate::render::Cancelled> for PassAbort {
    fn from(_: crate::render::Cancelled) -> Self {
        PassAbort::Cancelled
    }
}

impl From<PassAbort> for CompileStatus {
    fn from(abort: PassAbort) -> Self {
        match abort {
            PassAbort::HardWarning => CompileStatus::Aborted,
            PassAbort::Cancelled => CompileStatus::Cancelled,
        }
    }
}
