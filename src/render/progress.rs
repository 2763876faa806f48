// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Throttled progress reporting and cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A cancellation request was observed at a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previous request so the token can guard a new pass
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`Cancelled`] if cancellation was requested
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Amount of work done out of a known total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    /// Progress in thousandths, 0..=1000
    pub fn permille(&self) -> u32 {
        if self.total == 0 {
            return 1000;
        }
        ((self.done.min(self.total) as u64 * 1000) / self.total as u64) as u32
    }
}

/// Checkpoint callback handed to long-running evaluations.
///
/// Every [`tick`](ProgressReporter::tick) checks for cancellation; the
/// progress sink is invoked at most once per interval and never sees a value
/// lower than one it already received.
pub struct ProgressReporter<'a> {
    total: usize,
    done: usize,
    interval: Duration,
    last_report: Option<Instant>,
    token: CancelToken,
    sink: Box<dyn FnMut(Progress) + Send + 'a>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(total: usize, interval: Duration, token: CancelToken, sink: impl FnMut(Progress) + Send + 'a) -> Self {
        Self {
            total,
            done: 0,
            interval,
            last_report: None,
            token,
            sink: Box::new(sink),
        }
    }

    pub fn tick(&mut self, done: usize) -> Result<(), Cancelled> {
        self.token.check()?;
        self.done = self.done.max(done.min(self.total));
        let due = self
            .last_report
            .map(|last| last.elapsed() >= self.interval)
            .unwrap_or(true);
        if due {
            self.last_report = Some(Instant::now());
            let progress = self.progress();
            (self.sink)(progress);
        }
        Ok(())
    }

    /// Report completion regardless of throttling
    pub fn finish(&mut self) {
        self.done = self.total;
        let progress = self.progress();
        (self.sink)(progress);
    }

    pub fn progress(&self) -> Progress {
        Progress {
            done: self.done,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_reports_are_throttled_and_monotonic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut reporter = ProgressReporter::new(10, Duration::from_secs(3600), CancelToken::new(), move |p: Progress| {
            sink.lock().push(p.done)
        });

        for done in [1, 5, 3, 7] {
            assert!(reporter.tick(done).is_ok());
        }
        assert_eq!(reporter.progress().done, 7);
        reporter.finish();
        assert_eq!(*seen.lock(), vec![1, 10]);
    }

    #[test]
    fn test_unthrottled_reports_never_decrease() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut reporter = ProgressReporter::new(10, Duration::ZERO, CancelToken::new(), move |p: Progress| {
            sink.lock().push(p.permille())
        });
        for done in [2, 6, 4, 50] {
            assert!(reporter.tick(done).is_ok());
        }
        assert_eq!(*seen.lock(), vec![200, 600, 600, 1000]);
    }

    #[test]
    fn test_cancel_is_observed_at_next_tick() {
        let token = CancelToken::new();
        let mut reporter = ProgressReporter::new(4, Duration::ZERO, token.clone(), |_| {});
        assert!(reporter.tick(1).is_ok());
        token.cancel();
        assert_eq!(reporter.tick(2), Err(Cancelled));
    }

    #[test]
    fn test_empty_total_is_complete() {
        assert_eq!(Progress { done: 0, total: 0 }.permille(), 1000);
    }
}
