//! Progress reporting and conversion context
//!
//! Long-running drivers (merge, container write, format conversion) report
//! progress through a [`ProgressObserver`]. Callbacks are issued inline and
//! must not mutate the database being processed.
//!
//! A [`ConversionContext`] carries the strict/lenient flag. In strict mode the
//! first warning becomes a [`CovError::ConversionError`]; in lenient mode
//! warnings accumulate and are summarized at the end.

use std::fmt::Write as _;
use std::ops::{Deref, DerefMut};

use tracing::{debug, info, warn};

use super::error::{CovError, Result};

/// Receiver of progress events; every method defaults to a no-op
pub trait ProgressObserver {
    fn on_phase_start(&mut self, name: &str, total: Option<u64>) {
        let _ = (name, total);
    }

    fn on_item(&mut self, description: Option<&str>, advance: u64) {
        let _ = (description, advance);
    }

    fn on_phase_end(&mut self) {}

    fn on_warning(&mut self, message: &str) {
        let _ = message;
    }

    fn on_complete(&mut self, warning_count: usize, items_processed: u64) {
        let _ = (warning_count, items_processed);
    }
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Observer that forwards events to `tracing`
#[derive(Debug, Default)]
pub struct TracingObserver {
    phase: Option<String>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressObserver for TracingObserver {
    fn on_phase_start(&mut self, name: &str, total: Option<u64>) {
        info!(phase = name, total, "Phase started");
        self.phase = Some(name.to_string());
    }

    fn on_item(&mut self, description: Option<&str>, advance: u64) {
        debug!(phase = self.phase.as_deref(), item = description, advance, "Progress");
    }

    fn on_phase_end(&mut self) {
        if let Some(phase) = self.phase.take() {
            info!(phase, "Phase finished");
        }
    }

    fn on_warning(&mut self, message: &str) {
        warn!(message, "Conversion warning");
    }

    fn on_complete(&mut self, warning_count: usize, items_processed: u64) {
        info!(warning_count, items_processed, "Operation complete");
    }
}

/// Strict/lenient mode plus accumulated warnings for one operation
pub struct ConversionContext {
    strict: bool,
    warnings: Vec<String>,
    items_processed: u64,
    observer: Box<dyn ProgressObserver>,
}

impl ConversionContext {
    /// Create a context with a no-op observer
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            warnings: Vec::new(),
            items_processed: 0,
            observer: Box::new(NoopObserver),
        }
    }

    /// Warnings are fatal
    pub fn strict() -> Self {
        Self::new(true)
    }

    /// Warnings accumulate
    pub fn lenient() -> Self {
        Self::new(false)
    }

    /// Attach an observer
    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Record a warning; in strict mode this fails with `ConversionError`
    pub fn warn(&mut self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        self.observer.on_warning(&message);
        self.warnings.push(message.clone());
        if self.strict {
            return Err(CovError::conversion(message));
        }
        Ok(())
    }

    /// Record a warning that is never escalated, even in strict mode
    pub fn warn_recoverable(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.observer.on_warning(&message);
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn items_processed(&self) -> u64 {
        self.items_processed
    }

    /// Human-readable summary of the accumulated warnings
    pub fn summarize(&self) -> String {
        if self.warnings.is_empty() {
            return "No conversion warnings.".to_string();
        }
        let mut summary = format!("Conversion warnings ({}):", self.warnings.len());
        for warning in &self.warnings {
            let _ = write!(summary, "\n  WARNING: {}", warning);
        }
        summary
    }

    /// Start a phase; it ends when the returned guard drops
    pub fn phase(&mut self, name: &str, total: Option<u64>) -> PhaseGuard<'_> {
        self.observer.on_phase_start(name, total);
        PhaseGuard { ctx: self }
    }

    /// Report progress on one item
    pub fn item(&mut self, description: Option<&str>, advance: u64) {
        self.items_processed += advance;
        self.observer.on_item(description, advance);
    }

    /// Report completion to the observer
    pub fn complete(&mut self) {
        self.observer
            .on_complete(self.warnings.len(), self.items_processed);
    }
}

impl Default for ConversionContext {
    fn default() -> Self {
        Self::lenient()
    }
}

impl std::fmt::Debug for ConversionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionContext")
            .field("strict", &self.strict)
            .field("warnings", &self.warnings)
            .field("items_processed", &self.items_processed)
            .finish_non_exhaustive()
    }
}

/// Open phase of a [`ConversionContext`]
pub struct PhaseGuard<'a> {
    ctx: &'a mut ConversionContext,
}

impl Deref for PhaseGuard<'_> {
    type Target = ConversionContext;

    fn deref(&self) -> &ConversionContext {
        self.ctx
    }
}

impl DerefMut for PhaseGuard<'_> {
    fn deref_mut(&mut self) -> &mut ConversionContext {
        self.ctx
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.ctx.observer.on_phase_end();
    }
}
