//! Covariance-gated association of layer crossings with hits
//!
//! For a crossing of element `A` at extrapolated time `t`:
//!
//! 1. **Primary**: hits of `A` inside the time window whose in-plane distance
//!    to the crossing is within the gate; keep the nearest.
//! 2. **Adjacent**: only when the primary search is empty, each neighbouring
//!    sector whose plane lies within `adjacent_tolerance` of the crossing is
//!    searched the same way, with the track projected along its direction
//!    onto that plane.
//! 3. Nothing found: the outcome records whether `A` is alive.
//!
//! The gate distance for a hit combines the track error along the hit
//! direction, the hit variance along the same direction and the intrinsic
//! strip error:
//!
//! ```text
//! gate = max(σ_max · sqrt(err_track² + var_hit + err_strip²), d_max)
//! ```

use nalgebra::{Matrix6, Vector2, Vector3};

use crate::common::constants::PARALLEL_EPSILON;
use crate::common::linalg::plane_error;
use crate::config::MatchingConfig;
use crate::geometry::{ChannelStatus, MeasurementPlane, VolumeClassifier};
use crate::hits::HitCatalog;
use crate::state::TrajectoryState;
use crate::types::{Hit, StructuralAddress};

/// A hit that passed the gate
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// Matched hit
    pub hit: &'a Hit,
    /// Element searched (the crossed one or a neighbour)
    pub address: StructuralAddress,
    /// Readout plane of `address`
    pub plane: MeasurementPlane,
    /// Track point on `plane`
    pub crossing: Vector3<f64>,
    /// In-plane distance between `crossing` and the hit (cm)
    pub distance: f64,
    /// Gate distance the hit was compared with (cm)
    pub gate: f64,
}

/// Result of one association attempt
#[derive(Debug, Clone)]
pub enum MatchOutcome<'a> {
    /// Best hit of the crossed element
    Primary(Candidate<'a>),
    /// Best hit of a neighbouring sector
    Adjacent(Candidate<'a>),
    /// No hit passed the gate
    Unmatched {
        /// Whether the crossed element can record hits
        alive: bool,
    },
}

impl<'a> MatchOutcome<'a> {
    /// Chosen candidate, if any
    pub fn candidate(&self) -> Option<&Candidate<'a>> {
        match self {
            MatchOutcome::Primary(c) | MatchOutcome::Adjacent(c) => Some(c),
            MatchOutcome::Unmatched { .. } => None,
        }
    }

    /// Whether the candidate came from a neighbouring sector
    pub fn is_adjacent(&self) -> bool {
        matches!(self, MatchOutcome::Adjacent(_))
    }
}

/// Primary + adjacent-sector hit search
#[derive(Debug, Clone, Default)]
pub struct HitAssociationMatcher {
    config: MatchingConfig,
}

impl HitAssociationMatcher {
    /// Create a new matcher
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Matching configuration in use
    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Gate distance (cm) for a hit seen along `readout` from the crossing
    ///
    /// # Arguments
    /// * `covariance` - Track covariance at the crossing
    /// * `direction` - Unit track direction
    /// * `readout` - Unit in-plane direction from the crossing to the hit
    /// * `hit` - Candidate hit
    /// * `plane` - Readout plane the hit covariance refers to
    pub fn gate_distance(
        &self,
        covariance: &Matrix6<f64>,
        direction: &Vector3<f64>,
        readout: &Vector3<f64>,
        hit: &Hit,
        plane: &MeasurementPlane,
    ) -> f64 {
        let err_track = plane_error(covariance, direction, readout);
        let w = Vector2::new(readout.dot(&plane.u), readout.dot(&plane.v));
        let var_hit = w.dot(&(hit.covariance * w)).max(0.0);
        let strip = self.config.strip_position_error;
        let combined = (err_track * err_track + var_hit + strip * strip).sqrt();
        (self.config.max_distance_sigma * combined).max(self.config.max_distance)
    }

    /// Search the crossed element and, failing that, its neighbours
    ///
    /// `state` must sit on the crossing of `address`.
    pub fn find_match<'a>(
        &self,
        state: &TrajectoryState,
        address: &StructuralAddress,
        classifier: &dyn VolumeClassifier,
        catalog: &'a dyn HitCatalog,
        channels: &dyn ChannelStatus,
    ) -> MatchOutcome<'a> {
        let unmatched = || MatchOutcome::Unmatched {
            alive: channels.is_alive(address),
        };
        let Some(direction) = state.direction() else {
            return unmatched();
        };

        if let Some(plane) = classifier.measurement_plane(address, &state.position) {
            if let Some(best) =
                self.nearest_in(state, &direction, state.position, *address, plane, catalog)
            {
                return MatchOutcome::Primary(best);
            }
        }

        let mut best: Option<Candidate<'a>> = None;
        for neighbour in classifier.adjacent(address) {
            let Some(plane) = classifier.measurement_plane(&neighbour, &state.position) else {
                continue;
            };
            if plane.signed_distance(&state.position).abs() > self.config.adjacent_tolerance {
                continue;
            }
            let Some(crossing) = plane.intersect_along(&state.position, &direction) else {
                continue;
            };
            if let Some(found) =
                self.nearest_in(state, &direction, crossing, neighbour, plane, catalog)
            {
                if best.as_ref().map_or(true, |b| found.distance < b.distance) {
                    best = Some(found);
                }
            }
        }

        match best {
            Some(candidate) => MatchOutcome::Adjacent(candidate),
            None => unmatched(),
        }
    }

    /// Nearest gated hit of one element, first one wins on ties
    fn nearest_in<'a>(
        &self,
        state: &TrajectoryState,
        direction: &Vector3<f64>,
        crossing: Vector3<f64>,
        address: StructuralAddress,
        plane: MeasurementPlane,
        catalog: &'a dyn HitCatalog,
    ) -> Option<Candidate<'a>> {
        let window = self.config.time_window(state.time);
        let mut best: Option<Candidate<'a>> = None;

        for hit in catalog.hits_near(&address, window) {
            let offset = plane.in_plane(&(hit.position - crossing));
            let distance = offset.norm();
            let readout = if distance > PARALLEL_EPSILON {
                offset / distance
            } else {
                plane.u
            };
            let gate = self.gate_distance(&state.covariance, direction, &readout, hit, &plane);
            if distance > gate {
                continue;
            }
            if best.as_ref().map_or(true, |b| distance < b.distance) {
                best = Some(Candidate {
                    hit,
                    address,
                    plane,
                    crossing,
                    distance,
                    gate,
                });
            }
        }
        best
    }
}
