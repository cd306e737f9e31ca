//! Swim loop of one (track, hypothesis) pair
//!
//! The loop is an explicit state machine over [`SwimPhase`]:
//!
//! ```text
//! Propagating → BoundaryCheck → (Matching → Updating?)? → Accumulating → Propagating
//!      │
//!      └→ Terminated { Escaped | Stopped | Curled | IterationLimit }
//! ```
//!
//! Every failure inside a swim is handled locally: a stepper failure stops
//! the swim, a geometry miss skips the crossing and a rejected update leaves
//! the state untouched. The accumulator is always finalized, so every swim
//! yields a [`SwimSummary`].

use log::{debug, trace, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::accumulator::{ExtrapolationAccumulator, SwimSummary};
use crate::association::{Candidate, HitAssociationMatcher, HitClaim, HitClaimLedger, MatchOutcome};
use crate::components::KalmanUpdater;
use crate::config::SwimConfig;
use crate::errors::SwimError;
use crate::geometry::{ChannelStatus, VolumeClassifier};
use crate::hits::HitCatalog;
use crate::hypothesis::Hypothesis;
use crate::propagation::{StepReport, Stepper};
use crate::reporter::SwimReporter;
use crate::state::{TrackFit, TrajectoryState};
use crate::types::{Intersection, StructuralAddress, Subsystem, TrackId};

/// Why a swim loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Termination {
    /// Left the bounding volume
    Escaped,
    /// Fell below the momentum floor or the stepper failed
    Stopped,
    /// Came back below the inner radius
    Curled,
    /// Hit the iteration cap
    IterationLimit,
}

/// What gets written to the accumulator for one crossing
#[derive(Debug, Clone)]
pub enum LayerRecord {
    /// A hit was accepted
    Matched(Intersection),
    /// No hit was accepted
    Extrapolated {
        /// Crossed element
        address: StructuralAddress,
        /// Whether the element can record hits
        alive: bool,
    },
}

/// State of the swim loop
#[derive(Debug)]
pub enum SwimPhase<'a> {
    /// Check the termination predicates, then take one step
    Propagating,
    /// Resolve the step's end point if it landed on a boundary
    BoundaryCheck(StepReport),
    /// Search hits for a crossing
    Matching(Intersection),
    /// Try the Kalman update with the chosen candidate
    Updating {
        /// Crossing being matched
        intersection: Intersection,
        /// Candidate that passed the gate
        candidate: Candidate<'a>,
        /// Whether the candidate came from a neighbouring sector
        adjacent: bool,
    },
    /// Record the crossing
    Accumulating(LayerRecord),
    /// Loop is over
    Terminated(Termination),
}

/// Runs swims against one event's collaborators
///
/// All collaborators are borrowed read-only except the ledger, which takes
/// concurrent appends. One engine can run swims from several threads.
pub struct SwimEngine<'e> {
    config: &'e SwimConfig,
    stepper: &'e dyn Stepper,
    classifier: &'e dyn VolumeClassifier,
    catalog: &'e dyn HitCatalog,
    channels: &'e dyn ChannelStatus,
    ledger: &'e HitClaimLedger,
    matcher: HitAssociationMatcher,
    updater: KalmanUpdater,
}

impl<'e> SwimEngine<'e> {
    /// Create an engine over one event
    pub fn new(
        config: &'e SwimConfig,
        stepper: &'e dyn Stepper,
        classifier: &'e dyn VolumeClassifier,
        catalog: &'e dyn HitCatalog,
        channels: &'e dyn ChannelStatus,
        ledger: &'e HitClaimLedger,
    ) -> Self {
        Self {
            config,
            stepper,
            classifier,
            catalog,
            channels,
            ledger,
            matcher: HitAssociationMatcher::new(config.matching.clone()),
            updater: KalmanUpdater::new(config.update.clone(), config.magnetic_field),
        }
    }

    /// Swim configuration in use
    pub fn config(&self) -> &SwimConfig {
        self.config
    }

    /// Whether a fitted track qualifies for swimming at all
    ///
    /// Neutral tracks, tracks at or below `min_pt` and tracks that start
    /// outside the bounding volume are not swum.
    pub fn is_swimmable(&self, fit: &TrackFit) -> bool {
        fit.charge != 0 && fit.pt() > self.config.min_pt && self.config.target.contains(&fit.position)
    }

    /// Seed and swim one hypothesis of a fitted track
    ///
    /// Tracks that do not qualify or cannot be seeded yield a not-reached
    /// summary.
    pub fn swim_fit<R: SwimReporter + ?Sized>(
        &self,
        fit: &TrackFit,
        hypothesis: Hypothesis,
        reporter: &mut R,
    ) -> SwimSummary {
        if !self.is_swimmable(fit) {
            return SwimSummary::not_reached(fit.id, hypothesis);
        }
        match TrajectoryState::from_fit(fit, hypothesis) {
            Ok(state) => self.swim(fit.id, state, reporter),
            Err(e) => {
                debug!("Track {} not seeded as {}: {}", fit.id.0, hypothesis, e);
                SwimSummary::not_reached(fit.id, hypothesis)
            }
        }
    }

    /// Swim `state` until a termination predicate fires
    pub fn swim<R: SwimReporter + ?Sized>(
        &self,
        track: TrackId,
        mut state: TrajectoryState,
        reporter: &mut R,
    ) -> SwimSummary {
        let floor = self.config.momentum_floor(state.mass());
        let mut accumulator = ExtrapolationAccumulator::new(track, state.hypothesis);
        let mut iterations = 0usize;
        let mut phase = SwimPhase::Propagating;

        reporter.on_swim_start(&state);

        let termination = loop {
            phase = match phase {
                SwimPhase::Propagating => {
                    if let Some(termination) = self.check_termination(&state, floor) {
                        SwimPhase::Terminated(termination)
                    } else if iterations >= self.config.max_iterations {
                        warn!(
                            "Track {} as {}: iteration cap {} reached",
                            track.0, state.hypothesis, self.config.max_iterations
                        );
                        SwimPhase::Terminated(Termination::IterationLimit)
                    } else {
                        iterations += 1;
                        self.propagate(track, &mut state, reporter)
                    }
                }
                SwimPhase::BoundaryCheck(report) => {
                    self.boundary_check(&report, &state, &accumulator, reporter)
                }
                SwimPhase::Matching(intersection) => self.matching(intersection, &state),
                SwimPhase::Updating {
                    intersection,
                    candidate,
                    adjacent,
                } => self.updating(track, intersection, candidate, adjacent, &mut state, reporter),
                SwimPhase::Accumulating(record) => {
                    match record {
                        LayerRecord::Matched(intersection) => accumulator.record_hit(intersection),
                        LayerRecord::Extrapolated { address, alive } => {
                            accumulator.record_extrapolated(&address, alive)
                        }
                    }
                    SwimPhase::Propagating
                }
                SwimPhase::Terminated(termination) => break termination,
            };
        };

        debug!(
            "Track {} as {} terminated {:?} after {} steps",
            track.0, state.hypothesis, termination, iterations
        );
        if termination == Termination::Escaped {
            accumulator.mark_escaped();
        }
        let layer_counts = [
            self.classifier.layer_count(Subsystem::Barrel),
            self.classifier.layer_count(Subsystem::Endcap),
        ];
        let summary = accumulator.finalize(termination, layer_counts, iterations);
        reporter.on_swim_end(&summary);
        summary
    }

    /// Termination predicates, in priority order
    fn check_termination(&self, state: &TrajectoryState, floor: f64) -> Option<Termination> {
        // NaN momentum compares false and counts as stopped
        if !(state.p() >= floor) {
            return Some(Termination::Stopped);
        }
        if !self.config.target.contains(&state.position) {
            return Some(Termination::Escaped);
        }
        if state.perp_squared() < self.config.min_radius * self.config.min_radius {
            return Some(Termination::Curled);
        }
        None
    }

    fn propagate<'a, R: SwimReporter + ?Sized>(
        &self,
        track: TrackId,
        state: &mut TrajectoryState,
        reporter: &mut R,
    ) -> SwimPhase<'a> {
        match self.stepper.step(state) {
            Ok(report) => {
                trace!(
                    "Track {} step {:.3} cm to ({:.2}, {:.2}, {:.2})",
                    track.0,
                    report.step_length,
                    state.position.x,
                    state.position.y,
                    state.position.z
                );
                reporter.on_step(state, &report);
                SwimPhase::BoundaryCheck(report)
            }
            Err(e) => {
                debug!("Track {} as {} stopped: {}", track.0, state.hypothesis, e);
                SwimPhase::Terminated(Termination::Stopped)
            }
        }
    }

    /// Structural address of a crossing at `point`
    ///
    /// An element whose layer has no bit in the layer patterns counts as a
    /// lookup miss.
    fn locate(&self, point: &Vector3<f64>) -> Result<StructuralAddress, SwimError> {
        let miss = || SwimError::GeometryLookupMiss {
            x: point.x,
            y: point.y,
            z: point.z,
        };
        let address = self.classifier.classify(point).ok_or_else(miss)?;
        if address.layer_bit().is_none() {
            warn!("{} lies outside the layer patterns", address);
            return Err(miss());
        }
        Ok(address)
    }

    fn boundary_check<'a, R: SwimReporter + ?Sized>(
        &self,
        report: &StepReport,
        state: &TrajectoryState,
        accumulator: &ExtrapolationAccumulator,
        reporter: &mut R,
    ) -> SwimPhase<'a> {
        if !report.boundary_crossed {
            return SwimPhase::Propagating;
        }
        let address = match self.locate(&state.position) {
            Ok(address) => address,
            Err(e) => {
                trace!("Crossing skipped: {}", e);
                return SwimPhase::Propagating;
            }
        };
        if !accumulator.accepts(&address) {
            trace!("Crossing of {} skipped: layer already passed", address);
            return SwimPhase::Propagating;
        }

        let intersection = Intersection::new(
            address,
            state.position,
            state.momentum,
            state.covariance,
            state.time,
        );
        trace!("Crossing {} at t={:.2} ns", address, state.time);
        reporter.on_crossing(&intersection);
        SwimPhase::Matching(intersection)
    }

    fn matching(&self, intersection: Intersection, state: &TrajectoryState) -> SwimPhase<'e> {
        let outcome = self.matcher.find_match(
            state,
            &intersection.address,
            self.classifier,
            self.catalog,
            self.channels,
        );
        match outcome {
            MatchOutcome::Primary(candidate) => SwimPhase::Updating {
                intersection,
                candidate,
                adjacent: false,
            },
            MatchOutcome::Adjacent(candidate) => SwimPhase::Updating {
                intersection,
                candidate,
                adjacent: true,
            },
            MatchOutcome::Unmatched { alive } => SwimPhase::Accumulating(LayerRecord::Extrapolated {
                address: intersection.address,
                alive,
            }),
        }
    }

    fn updating<'a, R: SwimReporter + ?Sized>(
        &self,
        track: TrackId,
        mut intersection: Intersection,
        candidate: Candidate<'_>,
        adjacent: bool,
        state: &mut TrajectoryState,
        reporter: &mut R,
    ) -> SwimPhase<'a> {
        match self.updater.update(state, candidate.hit, &candidate.plane) {
            Ok(update) => {
                update.apply_to(state);
                intersection.address = candidate.address;
                intersection.position_at_hit_plane = update.position_at_hit_plane;
                intersection.chi2 = update.chi2;
                intersection.hit_id = Some(candidate.hit.id);
                intersection.hit_time = Some(candidate.hit.time);

                self.ledger.claim(
                    candidate.hit.id,
                    HitClaim {
                        track,
                        hypothesis: state.hypothesis,
                        chi2: update.chi2,
                    },
                );
                debug!(
                    "Track {} as {} matched hit {} at {} chi2={:.3}",
                    track.0, state.hypothesis, candidate.hit.id.0, candidate.address, update.chi2
                );
                reporter.on_match(&intersection, adjacent);
                SwimPhase::Accumulating(LayerRecord::Matched(intersection))
            }
            Err(e) => {
                debug!(
                    "Track {} as {} rejected hit {} at {}: {}",
                    track.0, state.hypothesis, candidate.hit.id.0, candidate.address, e
                );
                reporter.on_rejection(&candidate.address, &e);
                SwimPhase::Accumulating(LayerRecord::Extrapolated {
                    address: intersection.address,
                    alive: self.channels.is_alive(&intersection.address),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{
        AllChannelsAlive, DeadChannelSet, KlmGeometry, KlmGeometryConfig, MeasurementPlane,
    };
    use crate::hits::InMemoryHitCatalog;
    use crate::hypothesis::ParticleKind;
    use crate::propagation::{StepperConfig, StraightLineStepper};
    use crate::reporter::{DebugReporter, NoOpReporter};
    use crate::swim::Outcome;
    use crate::types::{Hit, HitId};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix6, Vector3};
    use smallvec::SmallVec;
    use std::sync::Arc;

    struct Fixture {
        config: SwimConfig,
        geometry: Arc<KlmGeometry>,
        stepper: StraightLineStepper,
        ledger: HitClaimLedger,
    }

    impl Fixture {
        fn new() -> Self {
            let geometry = Arc::new(KlmGeometry::new(KlmGeometryConfig::default()).unwrap());
            let stepper = StraightLineStepper::new(Arc::clone(&geometry), StepperConfig::default()).unwrap();
            Self {
                config: SwimConfig::default(),
                geometry,
                stepper,
                ledger: HitClaimLedger::new(),
            }
        }

        fn engine<'e>(&'e self, catalog: &'e InMemoryHitCatalog, channels: &'e dyn ChannelStatus) -> SwimEngine<'e> {
            SwimEngine::new(
                &self.config,
                &self.stepper,
                self.geometry.as_ref(),
                catalog,
                channels,
                &self.ledger,
            )
        }

        /// One hit per barrel layer on the x axis
        fn hits_on_x_axis(&self) -> InMemoryHitCatalog {
            self.geometry
                .config()
                .barrel_layer_radii
                .iter()
                .enumerate()
                .map(|(i, &r)| {
                    let position = Vector3::new(r, 0.0, 60.0);
                    let address = self.geometry.classify(&position).unwrap();
                    Hit::new(HitId(i as u64), address, position, 1.0, 1.0, 5.0)
                })
                .collect()
        }
    }

    /// Reference geometry with every barrel layer renumbered `shift` higher
    struct ShiftedBarrel {
        inner: Arc<KlmGeometry>,
        shift: u16,
    }

    impl VolumeClassifier for ShiftedBarrel {
        fn classify(&self, point: &Vector3<f64>) -> Option<StructuralAddress> {
            let mut address = self.inner.classify(point)?;
            if address.subsystem == Subsystem::Barrel {
                address.layer += self.shift;
            }
            Some(address)
        }

        fn measurement_plane(
            &self,
            address: &StructuralAddress,
            near: &Vector3<f64>,
        ) -> Option<MeasurementPlane> {
            let mut inner = *address;
            if inner.subsystem == Subsystem::Barrel {
                inner.layer = inner.layer.checked_sub(self.shift)?;
            }
            self.inner.measurement_plane(&inner, near)
        }

        fn adjacent(&self, address: &StructuralAddress) -> SmallVec<[StructuralAddress; 2]> {
            self.inner.adjacent(address)
        }

        fn layer_count(&self, subsystem: Subsystem) -> u16 {
            self.inner.layer_count(subsystem)
        }
    }

    fn radial_muon(p: f64) -> TrajectoryState {
        TrajectoryState::new(
            Vector3::new(150.0, 0.0, 60.0),
            Vector3::new(p, 0.0, 0.0),
            Matrix6::identity() * 1e-4,
            0.0,
            Hypothesis::new(ParticleKind::Muon, -1),
        )
    }

    #[test]
    fn test_straight_track_matches_every_layer() {
        let fixture = Fixture::new();
        let catalog = fixture.hits_on_x_axis();
        let engine = fixture.engine(&catalog, &AllChannelsAlive);
        let mut reporter = DebugReporter::new();

        let summary = engine.swim(TrackId(1), radial_muon(2.0), &mut reporter);

        assert_eq!(summary.termination, Termination::Escaped);
        assert_eq!(summary.outcome, Outcome::ReachedBoundary);
        assert_eq!(summary.hit_pattern, summary.ext_pattern);
        assert_eq!(summary.ext_pattern, (1 << 15) - 1);
        assert_eq!(summary.ndof, 30);
        assert_relative_eq!(summary.chi2, 0.0, epsilon = 1e-9);
        assert_eq!(reporter.matches().len(), 15);
        assert_eq!(fixture.ledger.len(), 15);
    }

    #[test]
    fn test_below_floor_is_not_reached() {
        let fixture = Fixture::new();
        let catalog = fixture.hits_on_x_axis();
        let engine = fixture.engine(&catalog, &AllChannelsAlive);

        let summary = engine.swim(TrackId(1), radial_muon(1e-4), &mut NoOpReporter);

        assert_eq!(summary.termination, Termination::Stopped);
        assert_eq!(summary.outcome, Outcome::NotReached);
        assert_eq!(summary.ext_pattern, 0);
        assert_eq!(summary.ext_layer_count, [0, 0]);
        assert_eq!(summary.steps, 0);
    }

    #[test]
    fn test_dead_layer_sets_no_bit() {
        let fixture = Fixture::new();
        let catalog = InMemoryHitCatalog::new();
        let dead_address = fixture.geometry.classify(&Vector3::new(201.9, 0.0, 60.0)).unwrap();
        let dead: DeadChannelSet = [dead_address].into_iter().collect();
        let engine = fixture.engine(&catalog, &dead);

        let summary = engine.swim(TrackId(1), radial_muon(2.0), &mut NoOpReporter);

        assert_eq!(summary.hit_pattern, 0);
        assert_eq!(summary.ext_pattern & 1, 0);
        assert_eq!(summary.ext_pattern, ((1 << 15) - 1) & !1);
        assert_eq!(summary.ext_layer_count[0], 14);
        assert_eq!(summary.last_ext_layer[0], Some(14));
    }

    #[test]
    fn test_layers_outside_the_pattern_are_skipped() {
        let fixture = Fixture::new();
        let catalog = InMemoryHitCatalog::new();
        let classifier = ShiftedBarrel {
            inner: Arc::clone(&fixture.geometry),
            shift: 10,
        };
        let engine = SwimEngine::new(
            &fixture.config,
            &fixture.stepper,
            &classifier,
            &catalog,
            &AllChannelsAlive,
            &fixture.ledger,
        );
        let mut reporter = DebugReporter::new();

        let summary = engine.swim(TrackId(1), radial_muon(2.0), &mut reporter);

        // Layers 0..5 land on 10..15; the rest would alias endcap bits
        assert_eq!(summary.termination, Termination::Escaped);
        assert_eq!(summary.ext_pattern, 0b11111 << 10);
        assert_eq!(summary.ext_layer_count, [5, 0]);
        assert_eq!(summary.last_ext_layer[0], Some(14));
        assert_eq!(summary.final_region, Some(Subsystem::Barrel));
        assert_eq!(reporter.crossings().len(), 5);
    }

    #[test]
    fn test_iteration_cap() {
        let mut fixture = Fixture::new();
        fixture.config.max_iterations = 5;
        let catalog = InMemoryHitCatalog::new();
        let engine = fixture.engine(&catalog, &AllChannelsAlive);

        let summary = engine.swim(TrackId(1), radial_muon(2.0), &mut NoOpReporter);

        // 150 → 175 → 200 → layer 0 → layer 1 → layer 2
        assert_eq!(summary.termination, Termination::IterationLimit);
        assert_eq!(summary.outcome, Outcome::StoppedInVolume);
        assert_eq!(summary.last_ext_layer[0], Some(2));
        assert_eq!(summary.steps, 5);
    }

    #[test]
    fn test_inner_radius_curls() {
        let fixture = Fixture::new();
        let catalog = InMemoryHitCatalog::new();
        let engine = fixture.engine(&catalog, &AllChannelsAlive);
        let mut state = radial_muon(2.0);
        state.position = Vector3::new(30.0, 0.0, 60.0);
        state.momentum = Vector3::new(-2.0, 0.0, 0.0);

        let summary = engine.swim(TrackId(1), state, &mut NoOpReporter);

        assert_eq!(summary.termination, Termination::Curled);
        assert_eq!(summary.outcome, Outcome::NotReached);
    }

    #[test]
    fn test_swim_fit_skips_neutral_and_soft_tracks() {
        let fixture = Fixture::new();
        let catalog = fixture.hits_on_x_axis();
        let engine = fixture.engine(&catalog, &AllChannelsAlive);
        let hypothesis = Hypothesis::new(ParticleKind::Muon, -1);
        let mut fit = TrackFit {
            id: TrackId(7),
            position: Vector3::new(150.0, 0.0, 60.0),
            momentum: Vector3::new(2.0, 0.0, 0.0),
            covariance: Matrix6::identity() * 1e-4,
            charge: 0,
            time: 5.0,
            fit_kind: ParticleKind::Pion,
        };
        assert!(!engine.is_swimmable(&fit));
        assert_eq!(engine.swim_fit(&fit, hypothesis, &mut NoOpReporter).outcome, Outcome::NotReached);

        fit.charge = -1;
        fit.momentum = Vector3::new(0.05, 0.0, 0.0);
        assert!(!engine.is_swimmable(&fit));

        fit.momentum = Vector3::new(2.0, 0.0, 0.0);
        assert!(engine.is_swimmable(&fit));
        let summary = engine.swim_fit(&fit, hypothesis, &mut NoOpReporter);
        assert_eq!(summary.outcome, Outcome::ReachedBoundary);
        assert_eq!(summary.track, TrackId(7));
    }
}
