//! Per-track likelihood record
//!
//! The scorer evaluates each hypothesis' PDF on the summary of the swim under
//! that hypothesis and normalizes the densities across hypotheses in log
//! space. When the densities sum to almost nothing the record is flagged
//! unreliable instead of being divided through.

use log::warn;
use serde::Serialize;

use super::pdf::{LikelihoodPdf, PdfTableSet};
use crate::common::constants::{MIN_DENSITY, MIN_DENSITY_SUM};
use crate::common::linalg::log_sum_exp;
use crate::hypothesis::{Hypothesis, ParticleKind};
use crate::swim::{Outcome, SwimSummary};
use crate::types::{Subsystem, TrackId};

/// Score of one hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HypothesisScore {
    /// Scored hypothesis
    pub hypothesis: Hypothesis,
    /// Raw density
    pub density: f64,
    /// `ln(max(density, MIN_DENSITY))`
    pub log_density: f64,
    /// Density divided by the sum over hypotheses; `None` when unreliable
    /// or when the hypothesis does not match the track's charge
    pub normalized: Option<f64>,
}

/// Identification result for one track
#[derive(Debug, Clone, Serialize)]
pub struct MuidRecord {
    /// Scored track
    pub track: TrackId,
    /// Reconstructed charge
    pub charge: i8,
    /// Hypothesis the layer fields below are taken from
    pub reference: Option<Hypothesis>,
    /// Outcome of the reference swim
    pub outcome: Outcome,
    /// Final region of the reference swim
    pub final_region: Option<Subsystem>,
    /// Last extrapolated layer per region (`[barrel, endcap]`)
    pub last_ext_layer: [Option<u16>; 2],
    /// Last matched layer per region
    pub last_hit_layer: [Option<u16>; 2],
    /// Outermost extrapolated layer counted through both regions
    pub ext_layer: Option<u16>,
    /// Outermost matched layer counted through both regions
    pub hit_layer: Option<u16>,
    /// Pattern of extrapolated layers
    pub ext_pattern: u32,
    /// Pattern of matched layers
    pub hit_pattern: u32,
    /// Summed chi-squared
    pub chi2: f64,
    /// Degrees of freedom
    pub ndof: u32,
    /// One score per swum hypothesis
    pub scores: Vec<HypothesisScore>,
    /// Whether the densities summed below [`MIN_DENSITY_SUM`]
    pub unreliable: bool,
}

impl MuidRecord {
    /// Score of one species
    pub fn score(&self, kind: ParticleKind) -> Option<&HypothesisScore> {
        self.scores.iter().find(|s| s.hypothesis.kind == kind)
    }

    /// Hypothesis with the largest normalized likelihood
    pub fn most_likely(&self) -> Option<Hypothesis> {
        self.scores
            .iter()
            .filter_map(|s| s.normalized.map(|p| (s.hypothesis, p)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(h, _)| h)
    }
}

/// Turns the swim summaries of one track into a [`MuidRecord`]
#[derive(Debug, Clone, Copy)]
pub struct LikelihoodScorer<'a> {
    tables: &'a PdfTableSet,
}

impl<'a> LikelihoodScorer<'a> {
    /// Create a scorer over a table set
    pub fn new(tables: &'a PdfTableSet) -> Self {
        Self { tables }
    }

    /// Score one track
    ///
    /// `summaries` holds one summary per swum hypothesis. Hypotheses whose
    /// charge sign differs from `charge`, or without a table, get zero
    /// density and no normalized value.
    pub fn score(&self, track: TrackId, charge: i8, summaries: &[SwimSummary]) -> MuidRecord {
        let densities: Vec<f64> = summaries
            .iter()
            .map(|summary| {
                if !summary.hypothesis.matches_charge(charge) {
                    return 0.0;
                }
                self.tables
                    .get(summary.hypothesis.kind)
                    .map_or(0.0, |pdf| pdf.density(summary).max(0.0))
            })
            .collect();

        let sum: f64 = densities.iter().sum();
        let unreliable = !(sum >= MIN_DENSITY_SUM);
        if unreliable && !summaries.is_empty() {
            warn!(
                "Track {}: hypothesis densities sum to {:e}, likelihoods not normalized",
                track.0, sum
            );
        }

        let ln_densities: Vec<f64> = densities
            .iter()
            .map(|&d| if d > 0.0 { d.ln() } else { f64::NEG_INFINITY })
            .collect();
        let ln_sum = log_sum_exp(&ln_densities);

        let scores = summaries
            .iter()
            .zip(densities.iter().zip(&ln_densities))
            .map(|(summary, (&density, &ln_density))| HypothesisScore {
                hypothesis: summary.hypothesis,
                density,
                log_density: density.max(MIN_DENSITY).ln(),
                normalized: (!unreliable && summary.hypothesis.matches_charge(charge))
                    .then(|| (ln_density - ln_sum).exp()),
            })
            .collect();

        let reference = summaries
            .iter()
            .find(|s| s.hypothesis.kind == ParticleKind::Muon && s.hypothesis.matches_charge(charge))
            .or_else(|| summaries.first());

        match reference {
            Some(r) => MuidRecord {
                track,
                charge,
                reference: Some(r.hypothesis),
                outcome: r.outcome,
                final_region: r.final_region,
                last_ext_layer: r.last_ext_layer,
                last_hit_layer: r.last_hit_layer,
                ext_layer: r.combined_ext_layer(),
                hit_layer: r.combined_hit_layer(),
                ext_pattern: r.ext_pattern,
                hit_pattern: r.hit_pattern,
                chi2: r.chi2,
                ndof: r.ndof,
                scores,
                unreliable,
            },
            None => MuidRecord {
                track,
                charge,
                reference: None,
                outcome: Outcome::NotReached,
                final_region: None,
                last_ext_layer: [None; 2],
                last_hit_layer: [None; 2],
                ext_layer: None,
                hit_layer: None,
                ext_pattern: 0,
                hit_pattern: 0,
                chi2: 0.0,
                ndof: 0,
                scores,
                unreliable,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::pdf::{LongitudinalEntry, TabulatedPdf, TransverseEntry, PATTERN_BITS};
    use approx::assert_relative_eq;

    fn pdf(hit_probability: f64) -> TabulatedPdf {
        TabulatedPdf::new(
            vec![LongitudinalEntry {
                outcome: Outcome::ReachedBoundary,
                region: Subsystem::Barrel,
                last_layer: 1,
                hit_probability: vec![hit_probability; PATTERN_BITS],
            }],
            vec![TransverseEntry {
                ndof: 4,
                p0: 1.0,
                p1: 1.0,
                p2: 1.0,
            }],
        )
        .unwrap()
    }

    fn tables() -> PdfTableSet {
        let mut set = PdfTableSet::new();
        set.insert(ParticleKind::Muon, pdf(0.9));
        set.insert(ParticleKind::Pion, pdf(0.3));
        set
    }

    fn summary(kind: ParticleKind, charge: i8) -> SwimSummary {
        let mut s = SwimSummary::not_reached(TrackId(3), Hypothesis::new(kind, charge));
        s.outcome = Outcome::ReachedBoundary;
        s.final_region = Some(Subsystem::Barrel);
        s.last_ext_layer = [Some(1), None];
        s.ext_pattern = 0b11;
        s.hit_pattern = 0b11;
        s.ndof = 4;
        s
    }

    #[test]
    fn test_normalized_likelihoods() {
        let tables = tables();
        let scorer = LikelihoodScorer::new(&tables);
        let summaries = vec![summary(ParticleKind::Muon, 1), summary(ParticleKind::Pion, 1)];

        let record = scorer.score(TrackId(3), 1, &summaries);

        assert!(!record.unreliable);
        let mu = record.score(ParticleKind::Muon).unwrap();
        let pi = record.score(ParticleKind::Pion).unwrap();
        let expected = 0.81 / (0.81 + 0.09);
        assert_relative_eq!(mu.normalized.unwrap(), expected, epsilon = 1e-12);
        assert_relative_eq!(pi.normalized.unwrap(), 1.0 - expected, epsilon = 1e-12);
        assert_relative_eq!(mu.log_density, mu.density.ln(), epsilon = 1e-12);
        assert_eq!(record.most_likely().map(|h| h.kind), Some(ParticleKind::Muon));
        assert_eq!(record.reference.map(|h| h.kind), Some(ParticleKind::Muon));
        assert_eq!(record.ext_layer, Some(1));
    }

    #[test]
    fn test_wrong_charge_sign_is_excluded() {
        let tables = tables();
        let scorer = LikelihoodScorer::new(&tables);
        let summaries = vec![summary(ParticleKind::Muon, -1), summary(ParticleKind::Pion, 1)];

        let record = scorer.score(TrackId(3), 1, &summaries);

        let mu = record.score(ParticleKind::Muon).unwrap();
        assert_eq!(mu.density, 0.0);
        assert_eq!(mu.normalized, None);
        assert_relative_eq!(mu.log_density, MIN_DENSITY.ln());
        assert_relative_eq!(record.score(ParticleKind::Pion).unwrap().normalized.unwrap(), 1.0);
        // No muon of the right sign: the first summary is the reference
        assert_eq!(record.reference.map(|h| h.kind), Some(ParticleKind::Muon));
    }

    #[test]
    fn test_negligible_sum_is_unreliable() {
        let tables = tables();
        let scorer = LikelihoodScorer::new(&tables);
        let summaries = vec![
            SwimSummary::not_reached(TrackId(3), Hypothesis::new(ParticleKind::Muon, 1)),
            SwimSummary::not_reached(TrackId(3), Hypothesis::new(ParticleKind::Pion, 1)),
        ];

        let record = scorer.score(TrackId(3), 1, &summaries);

        assert!(record.unreliable);
        assert!(record.scores.iter().all(|s| s.normalized.is_none()));
        assert!(record.scores.iter().all(|s| s.log_density.is_finite()));
        assert_eq!(record.outcome, Outcome::NotReached);
        assert_eq!(record.most_likely(), None);
    }

    #[test]
    fn test_empty_track() {
        let tables = tables();
        let record = LikelihoodScorer::new(&tables).score(TrackId(9), 1, &[]);
        assert!(record.unreliable);
        assert!(record.scores.is_empty());
        assert_eq!(record.reference, None);
    }
}
