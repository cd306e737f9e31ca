/*!
# muid-swim-rs - Track extrapolation and muon identification

Swims fitted charged tracks outward through a layered muon detector, one
swim per particle hypothesis, associating detector hits layer by layer with
a gated Kalman update and scoring each track's hypotheses from the resulting
crossing and hit patterns.

## Features

- Explicit swim state machine with injected stepper, geometry, hit catalog
  and channel status
- Covariance-gated hit association with adjacent-sector fallback
- Single-pass Kalman update in the track coordinate frame
- Per-hypothesis likelihoods from tabulated PDFs, normalized in log space
- Optional parallel swims (`rayon` feature) with a shared hit-claim ledger

## Modules

- [`swim`] - Swim engine and layer bookkeeping
- [`association`] - Hit matching and the hit-claim ledger
- [`components`] - Kalman update and covariance transforms
- [`geometry`] - Structural addresses, readout planes, reference geometry
- [`propagation`] - Stepper trait and the straight-line stepper
- [`scoring`] - PDFs and per-track likelihood records
- [`event`] - Event-level driver

## Example

```rust,no_run
use std::sync::Arc;

use muid_swim_rs::bench_utils::{generate_event, synthetic_pdf_tables, SyntheticEventConfig};
use muid_swim_rs::{EventProcessor, KlmGeometry, KlmGeometryConfig, StepperConfig, StraightLineStepper, SwimConfig};

let geometry = Arc::new(KlmGeometry::new(KlmGeometryConfig::default()).unwrap());
let stepper = StraightLineStepper::new(Arc::clone(&geometry), StepperConfig::default()).unwrap();
let processor = EventProcessor::new(
    SwimConfig::default(),
    Arc::new(stepper),
    geometry.clone(),
    synthetic_pdf_tables().unwrap(),
)
.unwrap();

let event = generate_event(&geometry, &SyntheticEventConfig::default(), 42).unwrap();
let result = processor.process(&event.tracks, &event.hits);
for record in result.records() {
    println!("{:?}: {:?}", record.track, record.most_likely());
}
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// Error type shared by every component
pub mod errors;

/// Configuration of the swim, matcher and updater
pub mod config;

/// Structural addresses, hits and crossing records
pub mod types;

/// Particle hypotheses
pub mod hypothesis;

/// Trajectory state and track-fit seeds
pub mod state;

/// Shared numerical components (Kalman update, covariance transforms)
pub mod components;

/// Hit matching and claim bookkeeping
pub mod association;

/// Detector geometry and channel status
pub mod geometry;

/// Trajectory propagation
pub mod propagation;

/// Hit catalogs
pub mod hits;

/// Swim engine and layer bookkeeping
pub mod swim;

/// Hypothesis scoring
pub mod scoring;

/// Per-event memoization
pub mod cache;

/// Event-level driver
pub mod event;

/// Observability hooks
pub mod reporter;

/// Low-level utilities (linear algebra, constants)
pub mod common;

/// Synthetic events for benchmarks and demos
pub mod bench_utils;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Errors and configuration
pub use config::{BoundingCylinder, MatchingConfig, SwimConfig, UpdateConfig};
pub use errors::SwimError;

// Core types
pub use hypothesis::{Hypothesis, ParticleKind};
pub use state::{TrackFit, TrajectoryState};
pub use types::{Hit, HitId, Intersection, Section, StructuralAddress, Subsystem, TimeWindow, TrackId};

// Traits
pub use geometry::{ChannelStatus, VolumeClassifier};
pub use hits::HitCatalog;
pub use propagation::Stepper;
pub use reporter::SwimReporter;
pub use scoring::LikelihoodPdf;

// Reference implementations
pub use geometry::{AllChannelsAlive, DeadChannelSet, KlmGeometry, KlmGeometryConfig, MeasurementPlane};
pub use hits::InMemoryHitCatalog;
pub use propagation::{StepperConfig, StraightLineStepper};

// Swim and scoring
pub use association::{HitAssociationMatcher, HitClaim, HitClaimLedger, MatchOutcome};
pub use components::{KalmanUpdate, KalmanUpdater};
pub use event::{EventProcessor, EventResult, TrackResult};
pub use scoring::{HypothesisScore, LikelihoodScorer, MuidRecord, PdfTableSet, TabulatedPdf};
pub use swim::{ExtrapolationAccumulator, Outcome, SwimEngine, SwimSummary, Termination};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
