//! Event-wide record of which swims claimed which hits
//!
//! Swims of different (track, hypothesis) pairs may accept the same physical
//! hit. The ledger keeps every claim, in the order appends complete, and does
//! not decide between them; swims never read each other's claims.

use dashmap::DashMap;
use serde::Serialize;

use crate::hypothesis::Hypothesis;
use crate::types::{HitId, TrackId};

/// One accepted association of a hit with a swim
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HitClaim {
    /// Track that was swum
    pub track: TrackId,
    /// Hypothesis it was swum under
    pub hypothesis: Hypothesis,
    /// Post-update chi-squared of the association
    pub chi2: f64,
}

/// Append-only map from hit to claims, safe for concurrent swims
#[derive(Debug, Default)]
pub struct HitClaimLedger {
    claims: DashMap<HitId, Vec<HitClaim>>,
}

impl HitClaimLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a claim on `hit`
    pub fn claim(&self, hit: HitId, claim: HitClaim) {
        self.claims.entry(hit).or_default().push(claim);
    }

    /// Claims recorded for `hit`
    pub fn claims_for(&self, hit: HitId) -> Vec<HitClaim> {
        self.claims
            .get(&hit)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Hits claimed by more than one track
    pub fn contested(&self) -> Vec<HitId> {
        let mut hits: Vec<HitId> = self
            .claims
            .iter()
            .filter(|entry| {
                let claims = entry.value();
                claims.iter().any(|c| c.track != claims[0].track)
            })
            .map(|entry| *entry.key())
            .collect();
        hits.sort();
        hits
    }

    /// Number of claimed hits
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether no hit has been claimed
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Total number of claims over all hits
    pub fn total_claims(&self) -> usize {
        self.claims.iter().map(|entry| entry.value().len()).sum()
    }

    /// Forget every claim (start of a new event)
    pub fn clear(&self) {
        self.claims.clear();
    }
}
