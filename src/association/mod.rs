//! Hit association
//!
//! This module provides:
//! - [`matcher`] - Primary and adjacent-sector gated hit search
//! - [`ledger`] - Event-wide record of hit claims

pub mod ledger;
pub mod matcher;

pub use ledger::{HitClaim, HitClaimLedger};
pub use matcher::{Candidate, HitAssociationMatcher, MatchOutcome};
