// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Single in-flight compile token

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Token that at most one compile or render cycle may hold.
///
/// Acquisition never blocks: a second request while the token is held is
/// refused, not queued. The token is released when the returned guard drops.
#[derive(Debug, Clone, Default)]
pub struct CompileLock(Arc<AtomicBool>);

impl CompileLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<CompileGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CompileGuard(self.0.clone()))
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Proof of holding the [`CompileLock`]
#[derive(Debug)]
pub struct CompileGuard(Arc<AtomicBool>);

impl Drop for CompileGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
