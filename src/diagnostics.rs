// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Leveled diagnostics channel
//!
//! The pipeline writes user-facing messages (parser errors, built-in
//! argument warnings, compile summaries) to a single sink owned by the host.
//! The pipeline never reads back from it. The handle also keeps the per-pass
//! warning/error counters and the hard-warning latch.

use colored::*;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Severity of a diagnostic line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Output of `echo()`
    Echo,
    /// Plain progress information
    Info,
    Warning,
    Error,
    /// Warning meant for the interactive surface only
    UiWarning,
    /// Error meant for the interactive surface only
    UiError,
    Trace,
}

impl Level {
    pub fn prefix(&self) -> &'static str {
        match self {
            Level::Echo => "ECHO: ",
            Level::Info => "",
            Level::Warning => "WARNING: ",
            Level::Error => "ERROR: ",
            Level::UiWarning => "UI-WARNING: ",
            Level::UiError => "UI-ERROR: ",
            Level::Trace => "TRACE: ",
        }
    }

    fn is_warning(&self) -> bool {
        matches!(self, Level::Warning | Level::UiWarning)
    }

    fn is_error(&self) -> bool {
        matches!(self, Level::Error | Level::UiError)
    }
}

/// One message sent to the sink
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.level.prefix(), self.message)
    }
}

/// Receiver of diagnostic lines
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: &Diagnostic);
}

/// Prints color-coded lines to the terminal
pub struct ConsoleSink;

impl DiagnosticSink for ConsoleSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        let line = diagnostic.to_string();
        match diagnostic.level {
            Level::Error | Level::UiError => eprintln!("{}", line.red().bold()),
            Level::Warning | Level::UiWarning => println!("{}", line.yellow()),
            Level::Echo => println!("{}", line.green()),
            Level::Trace => println!("{}", line.bright_black()),
            Level::Info => println!("{}", line),
        }
    }
}

/// Keeps every line in memory
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lines.lock().clone()
    }

    /// Rendered lines including their level prefix
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().map(|d| d.to_string()).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|d| d.to_string().contains(needle))
    }

    pub fn count(&self, level: Level) -> usize {
        self.lines.lock().iter().filter(|d| d.level == level).count()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.lines.lock().push(diagnostic.clone());
    }
}

/// Discards everything
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _diagnostic: &Diagnostic) {}
}

struct Shared {
    sink: Arc<dyn DiagnosticSink>,
    warnings: AtomicUsize,
    errors: AtomicUsize,
    hardwarnings: AtomicBool,
    suppress: AtomicBool,
    latched: AtomicBool,
}

/// Cloneable handle to the diagnostics sink
#[derive(Clone)]
pub struct Diagnostics {
    shared: Arc<Shared>,
}

impl Diagnostics {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                sink,
                warnings: AtomicUsize::new(0),
                errors: AtomicUsize::new(0),
                hardwarnings: AtomicBool::new(false),
                suppress: AtomicBool::new(false),
                latched: AtomicBool::new(false),
            }),
        }
    }

    pub fn console() -> Self {
        Self::new(Arc::new(ConsoleSink))
    }

    pub fn silent() -> Self {
        Self::new(Arc::new(NullSink))
    }

    /// Handle backed by a fresh [`MemorySink`], returned alongside for inspection
    pub fn memory() -> (Self, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Self::new(sink.clone()), sink)
    }

    pub fn emit(&self, level: Level, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            level,
            message: message.into(),
        };
        if level.is_warning() {
            self.shared.warnings.fetch_add(1, Ordering::Relaxed);
            if self.shared.hardwarnings.load(Ordering::Relaxed) {
                self.shared.latched.store(true, Ordering::Relaxed);
            }
        } else if level.is_error() {
            self.shared.errors.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.sink.emit(&diagnostic);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Level::Info, message);
    }

    pub fn echo(&self, message: impl Into<String>) {
        self.emit(Level::Echo, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(Level::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Level::Error, message);
    }

    pub fn ui_warning(&self, message: impl Into<String>) {
        self.emit(Level::UiWarning, message);
    }

    pub fn ui_error(&self, message: impl Into<String>) {
        self.emit(Level::UiError, message);
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.emit(Level::Trace, message);
    }

    /// Treat every warning as fatal for the running pass
    pub fn set_hardwarnings(&self, enabled: bool) {
        self.shared.hardwarnings.store(enabled, Ordering::Relaxed);
    }

    pub fn hardwarnings(&self) -> bool {
        self.shared.hardwarnings.load(Ordering::Relaxed)
    }

    /// Start of a pass: clears counters and the latch
    pub fn reset_pass(&self) {
        self.shared.warnings.store(0, Ordering::Relaxed);
        self.shared.errors.store(0, Ordering::Relaxed);
        self.shared.latched.store(false, Ordering::Relaxed);
    }

    /// Parsing and dependency resolution must run to completion, so the latch
    /// only records warnings while suppressed; the caller checks
    /// [`Diagnostics::would_have_thrown`] afterwards.
    pub fn suppress_exceptions(&self) {
        self.shared.suppress.store(true, Ordering::Relaxed);
        self.shared.latched.store(false, Ordering::Relaxed);
    }

    /// True if a warning was emitted while hard warnings were enabled
    pub fn would_have_thrown(&self) -> bool {
        self.shared.latched.load(Ordering::Relaxed)
    }

    /// Returns and clears the latch
    pub fn take_latched(&self) -> bool {
        self.shared.suppress.store(false, Ordering::Relaxed);
        self.shared.latched.swap(false, Ordering::Relaxed)
    }

    pub fn warning_count(&self) -> usize {
        self.shared.warnings.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> usize {
        self.shared.errors.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("warnings", &self.warning_count())
            .field("errors", &self.error_count())
            .field("hardwarnings", &self.hardwarnings())
            .finish()
    }
}
