//! Shared fixtures for the integration tests
//!
//! Builds the reference geometry and stepper, straight-line hit patterns on
//! it, and seeds for radial tracks.

#![allow(dead_code)]

pub mod assertions;

use std::sync::Arc;

use nalgebra::{Matrix6, Vector3};

use muid_swim_rs::{
    ChannelStatus, Hit, HitClaimLedger, HitId, Hypothesis, InMemoryHitCatalog, KlmGeometry,
    KlmGeometryConfig, ParticleKind, StepperConfig, StraightLineStepper, SwimConfig, SwimEngine,
    TrackFit, TrackId, TrajectoryState, VolumeClassifier,
};

/// Collaborators of one event on the reference detector
pub struct World {
    pub config: SwimConfig,
    pub geometry: Arc<KlmGeometry>,
    pub stepper: StraightLineStepper,
    pub ledger: HitClaimLedger,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(SwimConfig::default())
    }

    pub fn with_config(config: SwimConfig) -> Self {
        let geometry = Arc::new(KlmGeometry::new(KlmGeometryConfig::default()).unwrap());
        let stepper =
            StraightLineStepper::new(Arc::clone(&geometry), StepperConfig::default()).unwrap();
        Self {
            config,
            geometry,
            stepper,
            ledger: HitClaimLedger::new(),
        }
    }

    pub fn engine<'e>(
        &'e self,
        catalog: &'e InMemoryHitCatalog,
        channels: &'e dyn ChannelStatus,
    ) -> SwimEngine<'e> {
        SwimEngine::new(
            &self.config,
            &self.stepper,
            self.geometry.as_ref(),
            catalog,
            channels,
            &self.ledger,
        )
    }

    /// Every layer crossing of a straight line, in order
    pub fn crossings(&self, start: Vector3<f64>, direction: Vector3<f64>) -> Vec<Vector3<f64>> {
        let direction = direction.normalize();
        let mut point = start;
        let mut out = Vec::new();
        while let Some(t) = self.geometry.distance_to_next_plane(&point, &direction) {
            point += direction * t;
            if self.geometry.classify(&point).is_some() {
                out.push(point);
            }
        }
        out
    }

    /// One hit exactly on every crossing of a straight line
    pub fn hits_along(
        &self,
        start: Vector3<f64>,
        direction: Vector3<f64>,
        first_id: u64,
        sigma: f64,
    ) -> Vec<Hit> {
        self.crossings(start, direction)
            .into_iter()
            .enumerate()
            .map(|(i, point)| {
                let address = self.geometry.classify(&point).unwrap();
                Hit::new(HitId(first_id + i as u64), address, point, sigma, sigma, 5.0)
            })
            .collect()
    }
}

/// Start point at radius 150 cm, azimuth `phi`, z = 60 cm
pub fn start_point(phi: f64) -> Vector3<f64> {
    Vector3::new(150.0 * phi.cos(), 150.0 * phi.sin(), 60.0)
}

/// Radial direction at azimuth `phi`
pub fn radial(phi: f64) -> Vector3<f64> {
    Vector3::new(phi.cos(), phi.sin(), 0.0)
}

/// Small diagonal cartesian covariance
pub fn small_covariance() -> Matrix6<f64> {
    Matrix6::from_diagonal(&nalgebra::Vector6::new(1e-2, 1e-2, 1e-2, 1e-6, 1e-6, 1e-6))
}

/// Radial state of momentum `p` at azimuth `phi`
pub fn radial_state(kind: ParticleKind, charge: i8, p: f64, phi: f64) -> TrajectoryState {
    TrajectoryState::new(
        start_point(phi),
        radial(phi) * p,
        small_covariance(),
        5.0,
        Hypothesis::new(kind, charge),
    )
}

/// Radial track fit of momentum `p` at azimuth `phi`
pub fn radial_fit(id: u64, charge: i8, p: f64, phi: f64) -> TrackFit {
    TrackFit {
        id: TrackId(id),
        position: start_point(phi),
        momentum: radial(phi) * p,
        covariance: small_covariance(),
        charge,
        time: 5.0,
        fit_kind: ParticleKind::Pion,
    }
}
