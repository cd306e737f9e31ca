//! Hypothesis scoring
//!
//! - [`pdf`] - Per-hypothesis probability tables
//! - [`scorer`] - Normalization across hypotheses into a per-track record

pub mod pdf;
pub mod scorer;

pub use pdf::{LikelihoodPdf, LongitudinalEntry, PdfTableSet, TabulatedPdf, TransverseEntry};
pub use scorer::{HypothesisScore, LikelihoodScorer, MuidRecord};
