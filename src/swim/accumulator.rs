//! Per-(track, hypothesis) crossing and hit bookkeeping
//!
//! The accumulator is fed one record per accepted layer crossing and is
//! consumed once, at the end of the swim, into a [`SwimSummary`].
//!
//! Per detector region (barrel, endcap) it keeps:
//! - the first layer still accepted (a ratchet that never moves back),
//! - the last extrapolated and last matched layer,
//! - the number of extrapolated and matched layers.
//!
//! Across regions it keeps the extrapolated and matched layer patterns (see
//! [`StructuralAddress::layer_bit`]), the summed chi-squared and the number
//! of matched measurements.

use serde::{Deserialize, Serialize};

use super::engine::Termination;
use crate::common::constants::MEASUREMENTS_PER_LAYER;
use crate::hypothesis::Hypothesis;
use crate::types::{Intersection, StructuralAddress, Subsystem, TrackId};

/// How a swim ended relative to the instrumented layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// No layer was crossed
    NotReached,
    /// Stopped, curled back or hit the iteration cap inside the detector
    StoppedInVolume,
    /// Left the bounding volume before the outermost layer of its region
    Escaped,
    /// Left the bounding volume after crossing the outermost layer of its region
    ReachedBoundary,
}

/// Bookkeeping of one swim in progress
#[derive(Debug, Clone)]
pub struct ExtrapolationAccumulator {
    track: TrackId,
    hypothesis: Hypothesis,
    escaped: bool,
    first_active_layer: [u16; 2],
    last_ext_layer: [Option<u16>; 2],
    last_hit_layer: [Option<u16>; 2],
    ext_layer_count: [u32; 2],
    hit_layer_count: [u32; 2],
    ext_pattern: u32,
    hit_pattern: u32,
    chi2: f64,
    points: u32,
    last_region: Option<Subsystem>,
    barrel_to_endcap: bool,
    matched: Vec<Intersection>,
}

impl ExtrapolationAccumulator {
    /// Create an empty accumulator
    pub fn new(track: TrackId, hypothesis: Hypothesis) -> Self {
        Self {
            track,
            hypothesis,
            escaped: false,
            first_active_layer: [0; 2],
            last_ext_layer: [None; 2],
            last_hit_layer: [None; 2],
            ext_layer_count: [0; 2],
            hit_layer_count: [0; 2],
            ext_pattern: 0,
            hit_pattern: 0,
            chi2: 0.0,
            points: 0,
            last_region: None,
            barrel_to_endcap: false,
            matched: Vec::new(),
        }
    }

    /// Whether a crossing of `address` still counts
    ///
    /// Layers below the region's ratchet (already passed) are ignored.
    #[inline]
    pub fn accepts(&self, address: &StructuralAddress) -> bool {
        address.layer >= self.first_active_layer[address.subsystem.index()]
    }

    /// Record a crossing with an accepted measurement
    ///
    /// Unmatched intersections are recorded as extrapolated-only.
    pub fn record_hit(&mut self, intersection: Intersection) {
        if !intersection.is_matched() {
            self.record_extrapolated(&intersection.address, true);
            return;
        }
        let address = intersection.address;
        let region = address.subsystem.index();
        self.advance(&address);
        let bit = address.layer_bit().unwrap_or(0);
        self.ext_pattern |= bit;
        self.hit_pattern |= bit;
        self.ext_layer_count[region] += 1;
        self.hit_layer_count[region] += 1;
        self.last_hit_layer[region] = Some(address.layer);
        self.chi2 += intersection.chi2;
        self.points += MEASUREMENTS_PER_LAYER;
        self.matched.push(intersection);
    }

    /// Record a crossing without an accepted measurement
    ///
    /// A dead element sets no pattern bit and no count, but the layer still
    /// counts as reached.
    pub fn record_extrapolated(&mut self, address: &StructuralAddress, alive: bool) {
        self.advance(address);
        if alive {
            self.ext_pattern |= address.layer_bit().unwrap_or(0);
            self.ext_layer_count[address.subsystem.index()] += 1;
        }
    }

    /// Note that the particle left the bounding volume
    pub fn mark_escaped(&mut self) {
        self.escaped = true;
    }

    /// Cumulative chi-squared so far
    pub fn chi2(&self) -> f64 {
        self.chi2
    }

    /// Matched measurements so far
    pub fn points(&self) -> u32 {
        self.points
    }

    /// Layer pattern of crossings so far
    pub fn ext_pattern(&self) -> u32 {
        self.ext_pattern
    }

    /// Layer pattern of matched crossings so far
    pub fn hit_pattern(&self) -> u32 {
        self.hit_pattern
    }

    fn advance(&mut self, address: &StructuralAddress) {
        let region = address.subsystem.index();
        self.first_active_layer[region] = self.first_active_layer[region].max(address.layer + 1);
        self.last_ext_layer[region] = Some(address.layer);
        if self.last_region == Some(Subsystem::Barrel) && address.subsystem == Subsystem::Endcap {
            self.barrel_to_endcap = true;
        }
        self.last_region = Some(address.subsystem);
    }

    /// Close the books
    ///
    /// `layer_counts` gives the number of layers per region (`[barrel,
    /// endcap]`), used to tell a boundary exit from an early escape.
    pub fn finalize(mut self, termination: Termination, layer_counts: [u16; 2], steps: usize) -> SwimSummary {
        let endcap = Subsystem::Endcap.index();

        // A track that moved from the barrel into the endcap is not charged
        // for the last endcap layer unless it was matched there
        if self.barrel_to_endcap && layer_gt(self.last_ext_layer[endcap], self.last_hit_layer[endcap]) {
            self.last_ext_layer[endcap] = self.last_ext_layer[endcap].and_then(|l| l.checked_sub(1));
            if self.ext_layer_count[endcap] > self.hit_layer_count[endcap] {
                self.ext_layer_count[endcap] -= 1;
            }
        }

        let final_region = if self.last_ext_layer[endcap].is_some() {
            Some(Subsystem::Endcap)
        } else if self.last_ext_layer[Subsystem::Barrel.index()].is_some() {
            Some(Subsystem::Barrel)
        } else {
            None
        };

        let outcome = match final_region {
            None => Outcome::NotReached,
            Some(region) if termination == Termination::Escaped || self.escaped => {
                let outermost = layer_counts[region.index()].saturating_sub(1);
                if self.last_ext_layer[region.index()].map_or(false, |l| l >= outermost) {
                    Outcome::ReachedBoundary
                } else {
                    Outcome::Escaped
                }
            }
            Some(_) => Outcome::StoppedInVolume,
        };

        SwimSummary {
            track: self.track,
            hypothesis: self.hypothesis,
            termination,
            outcome,
            final_region,
            last_ext_layer: self.last_ext_layer,
            last_hit_layer: self.last_hit_layer,
            ext_layer_count: self.ext_layer_count,
            hit_layer_count: self.hit_layer_count,
            ext_pattern: self.ext_pattern,
            hit_pattern: self.hit_pattern,
            chi2: self.chi2,
            ndof: self.points,
            matched: self.matched,
            steps,
        }
    }
}

/// `a > b` with `None` ordered below every layer
#[inline]
fn layer_gt(a: Option<u16>, b: Option<u16>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a > b,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Result of one finished swim
#[derive(Debug, Clone, Serialize)]
pub struct SwimSummary {
    /// Swum track
    pub track: TrackId,
    /// Hypothesis it was swum under
    pub hypothesis: Hypothesis,
    /// Why the loop stopped
    pub termination: Termination,
    /// Outcome relative to the instrumented layers
    pub outcome: Outcome,
    /// Region of the last extrapolated layer
    pub final_region: Option<Subsystem>,
    /// Last extrapolated layer per region (`[barrel, endcap]`)
    pub last_ext_layer: [Option<u16>; 2],
    /// Last matched layer per region
    pub last_hit_layer: [Option<u16>; 2],
    /// Extrapolated layers per region
    pub ext_layer_count: [u32; 2],
    /// Matched layers per region
    pub hit_layer_count: [u32; 2],
    /// Pattern of extrapolated layers
    pub ext_pattern: u32,
    /// Pattern of matched layers
    pub hit_pattern: u32,
    /// Summed chi-squared of accepted matches
    pub chi2: f64,
    /// Degrees of freedom (two per matched layer)
    pub ndof: u32,
    /// Accepted intersections, in crossing order
    pub matched: Vec<Intersection>,
    /// Loop iterations taken
    pub steps: usize,
}

impl SwimSummary {
    /// Summary of a swim that never started
    pub fn not_reached(track: TrackId, hypothesis: Hypothesis) -> Self {
        ExtrapolationAccumulator::new(track, hypothesis).finalize(Termination::Stopped, [0, 0], 0)
    }

    /// Last extrapolated layer in `region`
    #[inline]
    pub fn last_ext_layer(&self, region: Subsystem) -> Option<u16> {
        self.last_ext_layer[region.index()]
    }

    /// Last matched layer in `region`
    #[inline]
    pub fn last_hit_layer(&self, region: Subsystem) -> Option<u16> {
        self.last_hit_layer[region.index()]
    }

    /// Outermost extrapolated layer counted through both regions
    ///
    /// Endcap layers continue the barrel numbering; `None` if nothing was
    /// reached.
    pub fn combined_ext_layer(&self) -> Option<u16> {
        match self.last_ext_layer {
            [barrel, Some(endcap)] => Some(barrel.map_or(0, |b| b + 1) + endcap),
            [barrel, None] => barrel,
        }
    }

    /// Outermost matched layer counted through both regions
    pub fn combined_hit_layer(&self) -> Option<u16> {
        match self.last_hit_layer[Subsystem::Endcap.index()] {
            Some(endcap) => Some(
                self.last_ext_layer[Subsystem::Barrel.index()].map_or(0, |b| b + 1) + endcap,
            ),
            None => self.last_hit_layer[Subsystem::Barrel.index()],
        }
    }

    /// Chi-squared per degree of freedom, zero without matches
    pub fn reduced_chi2(&self) -> f64 {
        if self.ndof == 0 {
            0.0
        } else {
            self.chi2 / f64::from(self.ndof)
        }
    }
}
