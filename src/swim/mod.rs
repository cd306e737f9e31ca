//! Swimming one track hypothesis through the detector
//!
//! - [`engine`] - The phase state machine driving stepper, matcher and updater
//! - [`accumulator`] - Layer bookkeeping and the per-swim summary

pub mod accumulator;
pub mod engine;

pub use accumulator::{ExtrapolationAccumulator, Outcome, SwimSummary};
pub use engine::{LayerRecord, SwimEngine, SwimPhase, Termination};
