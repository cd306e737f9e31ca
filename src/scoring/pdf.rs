//! Per-hypothesis probability tables
//!
//! A [`TabulatedPdf`] scores a [`SwimSummary`] as the product of two parts:
//!
//! - **Longitudinal**: for every extrapolated layer, the probability of a hit
//!   there (matched layer) or of no hit (missed layer). The per-layer
//!   probabilities depend on the outcome, the final region and the last
//!   extrapolated layer of that region.
//! - **Transverse**: density of the reduced chi-squared `x = χ²/ndof`,
//!
//!   ```text
//!   f(x) = p0 · p2 · (x·p1·p2)^(p2−1) / Γ(p2) · exp(−x·p1·p2)
//!   ```
//!
//!   with one parameter set per (even) number of degrees of freedom. A swim
//!   without matched layers contributes 1.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::constants::{MAX_BARREL_LAYERS, MAX_ENDCAP_LAYERS, MAX_TABULATED_NDOF};
use crate::common::linalg::ln_gamma;
use crate::errors::SwimError;
use crate::hypothesis::ParticleKind;
use crate::swim::{Outcome, SwimSummary};
use crate::types::Subsystem;

/// Number of layer-pattern bits covered by a longitudinal entry
pub const PATTERN_BITS: usize = (MAX_BARREL_LAYERS + MAX_ENDCAP_LAYERS) as usize;

/// Probability density of a swim summary under one hypothesis
pub trait LikelihoodPdf: Send + Sync {
    /// Non-negative density of `summary`
    fn density(&self, summary: &SwimSummary) -> f64;
}

/// Per-layer hit probabilities for one (outcome, region, last layer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongitudinalEntry {
    /// Outcome the entry applies to
    pub outcome: Outcome,
    /// Final region the entry applies to
    pub region: Subsystem,
    /// Last extrapolated layer in `region`
    pub last_layer: u16,
    /// Hit probability per pattern bit (see [`StructuralAddress::layer_bit`])
    ///
    /// [`StructuralAddress::layer_bit`]: crate::types::StructuralAddress::layer_bit
    pub hit_probability: Vec<f64>,
}

/// Reduced chi-squared density parameters for one ndof
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransverseEntry {
    /// Degrees of freedom (even, positive)
    pub ndof: u32,
    /// Normalization
    pub p0: f64,
    /// Scale
    pub p1: f64,
    /// Shape
    pub p2: f64,
}

impl TransverseEntry {
    /// Density at reduced chi-squared `x`
    pub fn density(&self, x: f64) -> f64 {
        let rate = self.p1 * self.p2;
        let x = x.max(f64::MIN_POSITIVE);
        let ln_f = self.p0.ln() + self.p2.ln() + (self.p2 - 1.0) * (x * rate).ln()
            - ln_gamma(self.p2)
            - x * rate;
        ln_f.exp()
    }
}

/// Serialized form of a [`TabulatedPdf`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PdfTable {
    longitudinal: Vec<LongitudinalEntry>,
    transverse: Vec<TransverseEntry>,
}

type LongitudinalKey = (Outcome, Subsystem, u16);

/// Lookup-table PDF for one hypothesis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PdfTable", into = "PdfTable")]
pub struct TabulatedPdf {
    longitudinal: HashMap<LongitudinalKey, Vec<f64>>,
    transverse: HashMap<u32, TransverseEntry>,
}

impl TabulatedPdf {
    /// Build and validate a table
    ///
    /// Probabilities must lie in `[0, 1]` and cover every pattern bit;
    /// transverse entries need an even, positive ndof and positive
    /// parameters. Later duplicates replace earlier ones.
    pub fn new(
        longitudinal: Vec<LongitudinalEntry>,
        transverse: Vec<TransverseEntry>,
    ) -> Result<Self, SwimError> {
        let mut by_key = HashMap::with_capacity(longitudinal.len());
        for entry in longitudinal {
            if entry.outcome == Outcome::NotReached {
                return Err(SwimError::configuration(
                    "longitudinal entries cannot target the not-reached outcome",
                ));
            }
            if entry.hit_probability.len() < PATTERN_BITS {
                return Err(SwimError::configuration(format!(
                    "longitudinal entry {:?}/{:?}/{} has {} probabilities, need {}",
                    entry.outcome,
                    entry.region,
                    entry.last_layer,
                    entry.hit_probability.len(),
                    PATTERN_BITS
                )));
            }
            if entry
                .hit_probability
                .iter()
                .any(|p| !(0.0..=1.0).contains(p))
            {
                return Err(SwimError::configuration(
                    "hit probabilities must lie in [0, 1]",
                ));
            }
            by_key.insert(
                (entry.outcome, entry.region, entry.last_layer),
                entry.hit_probability,
            );
        }

        let mut by_ndof = HashMap::with_capacity(transverse.len());
        for entry in transverse {
            if entry.ndof == 0 || entry.ndof % 2 != 0 {
                return Err(SwimError::configuration(format!(
                    "transverse ndof {} must be even and positive",
                    entry.ndof
                )));
            }
            let positive = |v: f64| v > 0.0 && v.is_finite();
            if !(positive(entry.p0) && positive(entry.p1) && positive(entry.p2)) {
                return Err(SwimError::configuration(format!(
                    "transverse parameters for ndof {} must be positive",
                    entry.ndof
                )));
            }
            by_ndof.insert(entry.ndof, entry);
        }

        Ok(Self {
            longitudinal: by_key,
            transverse: by_ndof,
        })
    }

    /// Parse and validate a JSON table
    pub fn from_json_str(json: &str) -> Result<Self, SwimError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Longitudinal part of the density
    ///
    /// Zero for a not-reached summary or when no entry matches.
    pub fn longitudinal(&self, summary: &SwimSummary) -> f64 {
        let Some(region) = summary.final_region else {
            return 0.0;
        };
        let Some(last_layer) = summary.last_ext_layer(region) else {
            return 0.0;
        };
        let Some(probabilities) = self.longitudinal.get(&(summary.outcome, region, last_layer)) else {
            return 0.0;
        };

        probabilities
            .iter()
            .take(PATTERN_BITS)
            .enumerate()
            .filter(|(bit, _)| summary.ext_pattern & (1 << bit) != 0)
            .map(|(bit, &p)| {
                if summary.hit_pattern & (1 << bit) != 0 {
                    p
                } else {
                    1.0 - p
                }
            })
            .product()
    }

    /// Transverse part of the density
    ///
    /// One without matches; zero when no entry covers the ndof.
    pub fn transverse(&self, summary: &SwimSummary) -> f64 {
        if summary.ndof == 0 {
            return 1.0;
        }
        let ndof = summary.ndof.min(MAX_TABULATED_NDOF);
        self.transverse
            .get(&ndof)
            .map_or(0.0, |entry| entry.density(summary.reduced_chi2()))
    }
}

impl LikelihoodPdf for TabulatedPdf {
    fn density(&self, summary: &SwimSummary) -> f64 {
        let longitudinal = self.longitudinal(summary);
        if longitudinal <= 0.0 {
            return 0.0;
        }
        longitudinal * self.transverse(summary)
    }
}

impl TryFrom<PdfTable> for TabulatedPdf {
    type Error = SwimError;

    fn try_from(table: PdfTable) -> Result<Self, Self::Error> {
        TabulatedPdf::new(table.longitudinal, table.transverse)
    }
}

impl From<TabulatedPdf> for PdfTable {
    fn from(pdf: TabulatedPdf) -> Self {
        let mut longitudinal: Vec<LongitudinalEntry> = pdf
            .longitudinal
            .into_iter()
            .map(|((outcome, region, last_layer), hit_probability)| LongitudinalEntry {
                outcome,
                region,
                last_layer,
                hit_probability,
            })
            .collect();
        longitudinal.sort_by_key(|e| (e.outcome as u8, e.region, e.last_layer));
        let mut transverse: Vec<TransverseEntry> = pdf.transverse.into_values().collect();
        transverse.sort_by_key(|e| e.ndof);
        PdfTable {
            longitudinal,
            transverse,
        }
    }
}

/// PDF tables for every hypothesis species
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfTableSet {
    tables: HashMap<ParticleKind, TabulatedPdf>,
}

impl PdfTableSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the table of one species
    pub fn insert(&mut self, kind: ParticleKind, pdf: TabulatedPdf) {
        self.tables.insert(kind, pdf);
    }

    /// Table of one species
    pub fn get(&self, kind: ParticleKind) -> Option<&TabulatedPdf> {
        self.tables.get(&kind)
    }

    /// Number of species covered
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no species is covered
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Parse and validate a JSON table set
    pub fn from_json_str(json: &str) -> Result<Self, SwimError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read, parse and validate a JSON table set
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SwimError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}
