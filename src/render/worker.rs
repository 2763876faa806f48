// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Background exact-geometry worker
//!
//! The node tree is moved onto a dedicated thread and handed back in the
//! single [`RenderEvent::Done`] event. Geometry computed by the worker is
//! returned alongside instead of being written to the caches, so cache writes
//! only ever happen on the owning side after completion.

use super::progress::{CancelToken, Cancelled, Progress, ProgressReporter};
use crate::ast::{Fingerprint, NodeTree};
use crate::geometry::{Geometry, GeometryCaches, GeometryEvaluator};
use indexmap::IndexMap;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of one worker run
#[derive(Debug)]
pub struct RenderOutcome {
    /// The tree the worker was started with
    pub tree: NodeTree,
    /// `None` if cancelled or if the tree produced no geometry
    pub geometry: Option<Arc<Geometry>>,
    pub cancelled: bool,
    /// Geometry to commit to the solid cache, empty when cancelled
    pub fresh: IndexMap<Fingerprint, Arc<Geometry>>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum RenderEvent {
    Progress(Progress),
    Done(RenderOutcome),
}

/// Handle to a running worker
pub struct RenderWorker {
    events: Receiver<RenderEvent>,
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
    last_progress: Option<Progress>,
    finished: bool,
}

impl RenderWorker {
    /// Start evaluating `tree`, reading reusable geometry from `caches`
    pub fn start(tree: NodeTree, caches: GeometryCaches, progress_interval: Duration) -> Self {
        Self::start_with_token(tree, caches, progress_interval, CancelToken::new())
    }

    /// Like [`RenderWorker::start`], observing an existing cancellation token.
    /// A token cancelled beforehand stops the worker at its first checkpoint.
    pub fn start_with_token(
        tree: NodeTree,
        caches: GeometryCaches,
        progress_interval: Duration,
        token: CancelToken,
    ) -> Self {
        let (tx, events) = channel();
        let worker_token = token.clone();

        let handle = thread::Builder::new()
            .name("render-worker".into())
            .spawn(move || {
                let started = Instant::now();
                let progress_tx = tx.clone();
                let mut reporter = ProgressReporter::new(tree.node_count(), progress_interval, worker_token, move |p| {
                    let _ = progress_tx.send(RenderEvent::Progress(p));
                });

                let result = {
                    let mut evaluator = GeometryEvaluator::new(&tree).with_caches(&caches);
                    evaluator
                        .evaluate(tree.root(), &mut |done| reporter.tick(done))
                        .map(|geometry| (geometry, evaluator.into_fresh()))
                };

                let outcome = match result {
                    Ok((geometry, fresh)) => {
                        reporter.finish();
                        RenderOutcome {
                            tree,
                            geometry,
                            cancelled: false,
                            fresh,
                            elapsed: started.elapsed(),
                        }
                    }
                    Err(Cancelled) => RenderOutcome {
                        tree,
                        geometry: None,
                        cancelled: true,
                        fresh: IndexMap::new(),
                        elapsed: started.elapsed(),
                    },
                };
                debug!(cancelled = outcome.cancelled, elapsed = ?outcome.elapsed, "render worker done");
                let _ = tx.send(RenderEvent::Done(outcome));
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("failed to spawn render worker: {}", e);
                None
            }
        };

        Self {
            events,
            token,
            handle,
            last_progress: None,
            finished: false,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Request cancellation; observed at the worker's next checkpoint
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Most recent progress received
    pub fn progress(&self) -> Option<Progress> {
        self.last_progress
    }

    /// Next event without blocking
    pub fn try_next(&mut self) -> Option<RenderEvent> {
        if self.finished {
            return None;
        }
        match self.events.try_recv() {
            Ok(event) => Some(self.record(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.disconnected(),
        }
    }

    /// Next event, waiting at most `timeout`
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<RenderEvent> {
        if self.finished {
            return None;
        }
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(self.record(event)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => self.disconnected(),
        }
    }

    /// Block until the worker is done, discarding progress events
    pub fn wait(mut self) -> Option<RenderOutcome> {
        while !self.finished {
            match self.events.recv() {
                Ok(RenderEvent::Done(outcome)) => {
                    self.finished = true;
                    self.join();
                    return Some(outcome);
                }
                Ok(RenderEvent::Progress(p)) => self.last_progress = Some(p),
                Err(_) => {
                    self.finished = true;
                    self.join();
                }
            }
        }
        None
    }

    fn record(&mut self, event: RenderEvent) -> RenderEvent {
        match &event {
            RenderEvent::Progress(p) => self.last_progress = Some(*p),
            RenderEvent::Done(_) => {
                self.finished = true;
                self.join();
            }
        }
        event
    }

    /// The worker went away without reporting, which only happens if it panicked
    fn disconnected(&mut self) -> Option<RenderEvent> {
        self.finished = true;
        self.join();
        None
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("render worker panicked");
            }
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        if !self.finished {
            self.token.cancel();
        }
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AbstractNode, NodeKind, Vec3};
    use crate::diagnostics::Diagnostics;

    fn cubes(count: usize) -> NodeTree {
        let children = (0..count)
            .map(|i| {
                AbstractNode::new(
                    NodeKind::Cube {
                        size: Vec3::new(1.0 + i as f64, 1.0, 1.0),
                        center: false,
                    },
                    i + 1,
                )
            })
            .collect();
        NodeTree::new(AbstractNode::new(NodeKind::Union, 0).with_children(children))
    }

    #[test]
    fn test_worker_returns_tree_and_geometry() {
        let tree = cubes(3);
        let dump = tree.dump().to_string();
        let caches = GeometryCaches::new(8, 8, &Diagnostics::silent());

        let outcome = RenderWorker::start(tree, caches.clone(), Duration::ZERO).wait();
        let outcome = outcome.unwrap_or_else(|| panic!("worker did not report"));
        assert!(!outcome.cancelled);
        assert_eq!(outcome.tree.dump(), dump);
        assert_eq!(outcome.geometry.map(|g| g.facets()), Some(36));
        assert_eq!(outcome.fresh.len(), 4);
        // Nothing is written by the worker itself
        assert!(caches.solid().is_empty());
    }

    #[test]
    fn test_cancelled_worker_reports_no_result() {
        let tree = cubes(200);
        let dump = tree.dump().to_string();
        let caches = GeometryCaches::new(8, 8, &Diagnostics::silent());
        let token = CancelToken::new();
        token.cancel();

        let worker = RenderWorker::start_with_token(tree, caches.clone(), Duration::ZERO, token);
        let outcome = worker.wait().unwrap_or_else(|| panic!("worker did not report"));
        assert!(outcome.cancelled);
        assert!(outcome.geometry.is_none());
        assert!(outcome.fresh.is_empty());
        assert_eq!(outcome.tree.dump(), dump);
        assert!(caches.solid().is_empty());
    }

    #[test]
    fn test_cancel_while_running_always_reports() {
        let caches = GeometryCaches::new(8, 8, &Diagnostics::silent());
        let worker = RenderWorker::start(cubes(200), caches, Duration::ZERO);
        worker.cancel();
        let outcome = worker.wait().unwrap_or_else(|| panic!("worker did not report"));
        // finishing before the request is seen is allowed, a partial result is not
        assert_eq!(outcome.cancelled, outcome.geometry.is_none());
        assert_eq!(outcome.cancelled, outcome.fresh.is_empty());
    }

    #[test]
    fn test_pre_cancelled_token_is_observed() {
        let tree = cubes(2);
        let token = CancelToken::new();
        token.cancel();
        let mut reporter = ProgressReporter::new(tree.node_count(), Duration::ZERO, token, |_| {});
        let result = GeometryEvaluator::new(&tree).evaluate(tree.root(), &mut |done| reporter.tick(done));
        assert_eq!(result, Err(Cancelled));
    }

    #[test]
    fn test_polling_reaches_done() {
        let caches = GeometryCaches::new(8, 8, &Diagnostics::silent());
        let mut worker = RenderWorker::start(cubes(2), caches, Duration::ZERO);
        let mut done = None;
        for _ in 0..1000 {
            match worker.next_timeout(Duration::from_millis(10)) {
                Some(RenderEvent::Done(outcome)) => {
                    done = Some(outcome);
                    break;
                }
                Some(RenderEvent::Progress(p)) => assert!(p.done <= p.total),
                None => {}
            }
        }
        assert!(done.is_some());
        assert!(worker.is_finished());
        assert!(worker.try_next().is_none());
    }
}
