//! Observability for swim execution.
//!
//! This module provides the [`SwimReporter`] trait for debugging and
//! validation studies. Reporters receive callbacks at the key points of a
//! swim without touching the loop's logic.
//!
//! The default [`NoOpReporter`] has empty callbacks that the compiler removes.
//!
//! # Example
//!
//! ```
//! use muid_swim_rs::reporter::{DebugReporter, SwimReporter};
//!
//! let mut reporter = DebugReporter::new();
//! // ... run a swim with `&mut reporter` ...
//! assert_eq!(reporter.summaries().len(), 0);
//! ```

use crate::errors::SwimError;
use crate::propagation::StepReport;
use crate::state::TrajectoryState;
use crate::swim::SwimSummary;
use crate::types::{Intersection, StructuralAddress};

// ============================================================================
// SwimReporter Trait
// ============================================================================

/// Observability trait for swim execution.
///
/// All methods have empty default implementations, so implementors only
/// override the events they care about.
///
/// Reporters take `&mut self` and are not required to be `Send + Sync`; a
/// reporter observes the swims run on one thread.
pub trait SwimReporter {
    /// Called once before the first step, with the seeded state.
    fn on_swim_start(&mut self, _state: &TrajectoryState) {}

    /// Called after every successful step.
    fn on_step(&mut self, _state: &TrajectoryState, _report: &StepReport) {}

    /// Called when a crossing resolves to a structural address that still counts.
    fn on_crossing(&mut self, _intersection: &Intersection) {}

    /// Called when a hit is accepted and the state updated.
    fn on_match(&mut self, _intersection: &Intersection, _adjacent: bool) {}

    /// Called when a candidate hit is rejected by the update.
    fn on_rejection(&mut self, _address: &StructuralAddress, _error: &SwimError) {}

    /// Called once with the finished swim's summary.
    fn on_swim_end(&mut self, _summary: &SwimSummary) {}
}

// ============================================================================
// NoOpReporter
// ============================================================================

/// Zero-cost reporter that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl NoOpReporter {
    /// Create a new no-op reporter.
    pub fn new() -> Self {
        Self
    }
}

impl SwimReporter for NoOpReporter {}

// ============================================================================
// DebugReporter
// ============================================================================

/// Reporter that captures every event for post-hoc inspection.
///
/// Stores clones of intersections and summaries; meant for tests and
/// single-event debugging rather than production runs.
#[derive(Debug, Clone, Default)]
pub struct DebugReporter {
    /// Number of swims started
    starts: usize,

    /// Number of successful steps
    steps: usize,

    /// Captured crossings
    crossings: Vec<Intersection>,

    /// Captured accepted matches (intersection, from an adjacent sector)
    matches: Vec<(Intersection, bool)>,

    /// Captured rejections (address, error message)
    rejections: Vec<(StructuralAddress, String)>,

    /// Captured summaries
    summaries: Vec<SwimSummary>,
}

impl DebugReporter {
    /// Create a new debug reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all captured events.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Number of swims started.
    pub fn starts(&self) -> usize {
        self.starts
    }

    /// Number of successful steps.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Captured crossings.
    pub fn crossings(&self) -> &[Intersection] {
        &self.crossings
    }

    /// Captured accepted matches.
    pub fn matches(&self) -> &[(Intersection, bool)] {
        &self.matches
    }

    /// Captured rejections.
    pub fn rejections(&self) -> &[(StructuralAddress, String)] {
        &self.rejections
    }

    /// Captured summaries.
    pub fn summaries(&self) -> &[SwimSummary] {
        &self.summaries
    }
}

impl SwimReporter for DebugReporter {
    fn on_swim_start(&mut self, _state: &TrajectoryState) {
        self.starts += 1;
    }

    fn on_step(&mut self, _state: &TrajectoryState, _report: &StepReport) {
        self.steps += 1;
    }

    fn on_crossing(&mut self, intersection: &Intersection) {
        self.crossings.push(intersection.clone());
    }

    fn on_match(&mut self, intersection: &Intersection, adjacent: bool) {
        self.matches.push((intersection.clone(), adjacent));
    }

    fn on_rejection(&mut self, address: &StructuralAddress, error: &SwimError) {
        self.rejections.push((*address, error.to_string()));
    }

    fn on_swim_end(&mut self, summary: &SwimSummary) {
        self.summaries.push(summary.clone());
    }
}

// ============================================================================
// LoggingReporter
// ============================================================================

/// Reporter that emits events through the `log` crate.
///
/// - `on_swim_start`, `on_swim_end`: DEBUG
/// - `on_match`, `on_rejection`: DEBUG
/// - `on_step`, `on_crossing`: TRACE, only when verbose
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter {
    /// Whether to log every step and crossing
    verbose: bool,
}

impl LoggingReporter {
    /// Create a new logging reporter.
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Create a verbose logging reporter that also logs steps and crossings.
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl SwimReporter for LoggingReporter {
    fn on_swim_start(&mut self, state: &TrajectoryState) {
        log::debug!(
            "Swim start: {} p={:.3} GeV/c at ({:.1}, {:.1}, {:.1})",
            state.hypothesis,
            state.p(),
            state.position.x,
            state.position.y,
            state.position.z
        );
    }

    fn on_step(&mut self, state: &TrajectoryState, report: &StepReport) {
        if self.verbose {
            log::trace!(
                "Step {:.2} cm to ({:.1}, {:.1}, {:.1}), boundary={}",
                report.step_length,
                state.position.x,
                state.position.y,
                state.position.z,
                report.boundary_crossed
            );
        }
    }

    fn on_crossing(&mut self, intersection: &Intersection) {
        if self.verbose {
            log::trace!("Crossing {} at t={:.2} ns", intersection.address, intersection.time);
        }
    }

    fn on_match(&mut self, intersection: &Intersection, adjacent: bool) {
        log::debug!(
            "Matched {} chi2={:.3}{}",
            intersection.address,
            intersection.chi2,
            if adjacent { " (adjacent sector)" } else { "" }
        );
    }

    fn on_rejection(&mut self, address: &StructuralAddress, error: &SwimError) {
        log::debug!("Rejected candidate at {}: {}", address, error);
    }

    fn on_swim_end(&mut self, summary: &SwimSummary) {
        log::debug!(
            "Swim end: {} {:?}/{:?}, {} matched layers, chi2={:.2}/{}",
            summary.hypothesis,
            summary.termination,
            summary.outcome,
            summary.matched.len(),
            summary.chi2,
            summary.ndof
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
