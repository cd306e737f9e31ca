//! Trajectory state of one swim
//!
//! A [`TrajectoryState`] is created per (track, hypothesis) from a
//! [`TrackFit`] and then mutated in place by the stepper and the Kalman
//! updater. Its covariance is always the 6×6 cartesian one; the curvilinear
//! form is derived on demand.

use nalgebra::{Matrix5, Matrix6, Vector3};
use serde::{Deserialize, Serialize};

use crate::common::linalg::{is_positive_semidefinite, symmetrize};
use crate::components::transform::{to_cartesian, to_curvilinear};
use crate::errors::SwimError;
use crate::hypothesis::{Hypothesis, ParticleKind};
use crate::types::TrackId;

/// Relative eigenvalue tolerance for accepting a seed covariance
const SEED_PSD_TOLERANCE: f64 = 1e-9;

/// Output of the upstream track fit used to seed the swims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackFit {
    /// Track identifier
    pub id: TrackId,
    /// Position at the outermost fitted point (cm)
    pub position: Vector3<f64>,
    /// Momentum at that point (GeV/c)
    pub momentum: Vector3<f64>,
    /// Cartesian covariance of (x, y, z, px, py, pz)
    pub covariance: Matrix6<f64>,
    /// Reconstructed charge (units of e)
    pub charge: i8,
    /// Time of flight from the interaction point to `position` (ns)
    pub time: f64,
    /// Species assumed by the fit
    pub fit_kind: ParticleKind,
}

impl TrackFit {
    /// Transverse momentum (GeV/c)
    #[inline]
    pub fn pt(&self) -> f64 {
        self.momentum.x.hypot(self.momentum.y)
    }

    /// Check that the fit can seed a swim
    ///
    /// Fails on non-finite kinematics or a covariance that is not positive
    /// semi-definite.
    pub fn validate(&self) -> Result<(), SwimError> {
        let finite = self.position.iter().all(|v| v.is_finite())
            && self.momentum.iter().all(|v| v.is_finite())
            && self.time.is_finite();
        if !finite {
            return Err(SwimError::PropagationFailure {
                reason: format!("non-finite seed for track {}", self.id.0),
            });
        }
        if !is_positive_semidefinite(&self.covariance, SEED_PSD_TOLERANCE) {
            return Err(SwimError::PropagationFailure {
                reason: format!(
                    "seed covariance of track {} is not positive semi-definite",
                    self.id.0
                ),
            });
        }
        Ok(())
    }
}

/// Kinematic state of a candidate particle during a swim
#[derive(Debug, Clone, Serialize)]
pub struct TrajectoryState {
    /// Position (cm)
    pub position: Vector3<f64>,
    /// Momentum (GeV/c)
    pub momentum: Vector3<f64>,
    /// Symmetric cartesian covariance of (x, y, z, px, py, pz)
    pub covariance: Matrix6<f64>,
    /// Time of flight since the interaction point (ns)
    pub time: f64,
    /// Material traversed since the start of the swim (radiation lengths)
    pub path_length: f64,
    /// Hypothesis being swum
    pub hypothesis: Hypothesis,
}

impl TrajectoryState {
    /// Create a state directly, symmetrizing the covariance
    pub fn new(
        position: Vector3<f64>,
        momentum: Vector3<f64>,
        covariance: Matrix6<f64>,
        time: f64,
        hypothesis: Hypothesis,
    ) -> Self {
        Self {
            position,
            momentum,
            covariance: symmetrize(&covariance),
            time,
            path_length: 0.0,
            hypothesis,
        }
    }

    /// Seed a swim from a track fit under the given hypothesis
    ///
    /// Validates the fit first; see [`TrackFit::validate`] and
    /// [`TrajectoryState::seed`].
    pub fn from_fit(fit: &TrackFit, hypothesis: Hypothesis) -> Result<Self, SwimError> {
        fit.validate()?;
        Ok(Self::seed(fit, hypothesis))
    }

    /// Seed a swim from an already validated track fit
    ///
    /// The fit's time of flight is rescaled from the fit mass to the
    /// hypothesis mass at fixed momentum.
    pub fn seed(fit: &TrackFit, hypothesis: Hypothesis) -> Self {
        let p2 = fit.momentum.norm_squared();
        let m = hypothesis.mass();
        let m_fit = fit.fit_kind.mass();
        let time = fit.time * ((p2 + m * m) / (p2 + m_fit * m_fit)).sqrt();
        Self::new(fit.position, fit.momentum, fit.covariance, time, hypothesis)
    }

    /// Momentum magnitude (GeV/c)
    #[inline]
    pub fn p(&self) -> f64 {
        self.momentum.norm()
    }

    /// Transverse momentum (GeV/c)
    #[inline]
    pub fn pt(&self) -> f64 {
        self.momentum.x.hypot(self.momentum.y)
    }

    /// Squared transverse distance from the beam axis (cm²)
    #[inline]
    pub fn perp_squared(&self) -> f64 {
        self.position.x * self.position.x + self.position.y * self.position.y
    }

    /// Unit vector along the momentum, or `None` when at rest
    pub fn direction(&self) -> Option<Vector3<f64>> {
        let p = self.p();
        (p > 0.0 && p.is_finite()).then(|| self.momentum / p)
    }

    /// Rest mass of the hypothesis (GeV/c²)
    #[inline]
    pub fn mass(&self) -> f64 {
        self.hypothesis.mass()
    }

    /// Charge of the hypothesis (units of e)
    #[inline]
    pub fn charge(&self) -> i8 {
        self.hypothesis.charge
    }

    /// Total energy (GeV)
    #[inline]
    pub fn energy(&self) -> f64 {
        let m = self.mass();
        (self.momentum.norm_squared() + m * m).sqrt()
    }

    /// Velocity as a fraction of the speed of light
    #[inline]
    pub fn beta(&self) -> f64 {
        let e = self.energy();
        if e > 0.0 {
            self.p() / e
        } else {
            0.0
        }
    }

    /// Whether every component of the state is finite
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.momentum.iter().all(|v| v.is_finite())
            && self.covariance.iter().all(|v| v.is_finite())
            && self.time.is_finite()
    }

    /// Covariance in curvilinear parameters `(1/p, λ, φ, y⊥, z⊥)`
    pub fn curvilinear_covariance(&self) -> Result<Matrix5<f64>, SwimError> {
        to_curvilinear(&self.momentum, &self.covariance)
            .ok_or_else(|| SwimError::degenerate("curvilinear frame undefined for this momentum"))
    }

    /// Replace the covariance by the cartesian image of a curvilinear one
    pub fn set_curvilinear_covariance(&mut self, covariance: &Matrix5<f64>) -> Result<(), SwimError> {
        self.covariance = to_cartesian(&self.momentum, covariance)
            .ok_or_else(|| SwimError::degenerate("curvilinear frame undefined for this momentum"))?;
        Ok(())
    }
}
