//! Field-free straight-line stepper
//!
//! Each step moves the particle along its momentum by the smaller of
//! `max_step` and the distance to the next active layer plane of a
//! [`KlmGeometry`], so crossings land exactly on the planes. Along the way it
//! keeps the time of flight and the traversed material up to date, applies an
//! optional continuous energy loss, transports the covariance with the
//! straight-line Jacobian and adds Highland multiple-scattering noise.

use std::sync::Arc;

use nalgebra::{Matrix3, Matrix5, Matrix6};
use serde::{Deserialize, Serialize};

use super::{StepReport, Stepper};
use crate::common::constants::SPEED_OF_LIGHT_CM_PER_NS;
use crate::components::transform::curvilinear_to_cartesian_jacobian;
use crate::errors::SwimError;
use crate::geometry::KlmGeometry;
use crate::state::TrajectoryState;

/// Stepper parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepperConfig {
    /// Longest step taken when no plane is closer (cm)
    pub max_step: f64,
    /// Continuous energy loss (GeV/cm); zero disables it
    pub de_dx: f64,
    /// Radiation length of the traversed material (cm)
    pub radiation_length: f64,
    /// Whether to add multiple-scattering noise to the covariance
    pub multiple_scattering: bool,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            max_step: 25.0,
            de_dx: 0.0,
            radiation_length: 17.6,
            multiple_scattering: false,
        }
    }
}

impl StepperConfig {
    /// Check every parameter for a usable value
    pub fn validate(&self) -> Result<(), SwimError> {
        if !(self.max_step > 0.0 && self.max_step.is_finite()) {
            return Err(SwimError::configuration("max_step must be positive"));
        }
        if !(self.de_dx >= 0.0) {
            return Err(SwimError::configuration("de_dx must be non-negative"));
        }
        if !(self.radiation_length > 0.0) {
            return Err(SwimError::configuration("radiation_length must be positive"));
        }
        Ok(())
    }
}

/// Straight-line transport through a [`KlmGeometry`]
#[derive(Debug, Clone)]
pub struct StraightLineStepper {
    geometry: Arc<KlmGeometry>,
    config: StepperConfig,
}

impl StraightLineStepper {
    /// Create a new stepper
    pub fn new(geometry: Arc<KlmGeometry>, config: StepperConfig) -> Result<Self, SwimError> {
        config.validate()?;
        Ok(Self { geometry, config })
    }

    /// Stepper parameters
    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    /// Highland scattering angle (rad) for a step of `length` cm
    fn scattering_angle(&self, state: &TrajectoryState, length: f64) -> f64 {
        let x = length / self.config.radiation_length;
        let beta_p = state.beta() * state.p();
        if x <= 0.0 || beta_p <= 0.0 {
            return 0.0;
        }
        (0.0136 / beta_p * x.sqrt() * (1.0 + 0.038 * x.ln())).max(0.0)
    }

    /// Multiple-scattering noise (cartesian) for a step of `length` cm
    fn scattering_noise(&self, state: &TrajectoryState, length: f64) -> Option<Matrix6<f64>> {
        let theta = self.scattering_angle(state, length);
        if theta <= 0.0 {
            return None;
        }
        let q = theta * theta;
        let cos_lambda = state.pt() / state.p();
        let jacobian = curvilinear_to_cartesian_jacobian(&state.momentum)?;

        // (1/p, λ, φ, y⊥, z⊥)
        let s = length;
        let q_phi = q / (cos_lambda * cos_lambda);
        let q_phi_y = q * s / (2.0 * cos_lambda);
        let q_lambda_z = q * s / 2.0;
        let q_pos = q * s * s / 3.0;
        #[rustfmt::skip]
        let noise = Matrix5::new(
            0.0, 0.0,        0.0,     0.0,     0.0,
            0.0, q,          0.0,     0.0,     q_lambda_z,
            0.0, 0.0,        q_phi,   q_phi_y, 0.0,
            0.0, 0.0,        q_phi_y, q_pos,   0.0,
            0.0, q_lambda_z, 0.0,     0.0,     q_pos,
        );
        Some(jacobian * noise * jacobian.transpose())
    }
}

impl Stepper for StraightLineStepper {
    fn step(&self, state: &mut TrajectoryState) -> Result<StepReport, SwimError> {
        if !state.is_finite() {
            return Err(SwimError::PropagationFailure {
                reason: "non-finite state before step".to_string(),
            });
        }
        let p = state.p();
        let direction = state
            .direction()
            .ok_or_else(|| SwimError::PropagationFailure {
                reason: "particle at rest".to_string(),
            })?;

        let next_plane = self.geometry.distance_to_next_plane(&state.position, &direction);
        let (length, boundary_crossed) = match next_plane {
            Some(t) if t <= self.config.max_step => (t, true),
            _ => (self.config.max_step, false),
        };

        // Straight-line transport: ∂x'/∂p = (s/p)(I − p̂p̂ᵀ)
        let mut transport = Matrix6::identity();
        let dx_dp = (Matrix3::identity() - direction * direction.transpose()) * (length / p);
        transport.fixed_view_mut::<3, 3>(0, 3).copy_from(&dx_dp);
        let mut covariance = transport * state.covariance * transport.transpose();

        if self.config.multiple_scattering {
            if let Some(noise) = self.scattering_noise(state, length) {
                covariance += noise;
            }
        }

        let beta = state.beta();
        if beta <= 0.0 {
            return Err(SwimError::PropagationFailure {
                reason: "non-positive velocity".to_string(),
            });
        }
        state.time += length / (beta * SPEED_OF_LIGHT_CM_PER_NS);
        state.path_length += length / self.config.radiation_length;
        state.position += direction * length;
        state.covariance = 0.5 * (covariance + covariance.transpose());

        if self.config.de_dx > 0.0 {
            let m = state.mass();
            let energy = (state.energy() - self.config.de_dx * length).max(m);
            let p_new = (energy * energy - m * m).max(0.0).sqrt();
            state.momentum = direction * p_new;
        }

        if !state.is_finite() {
            return Err(SwimError::PropagationFailure {
                reason: "non-finite state after step".to_string(),
            });
        }

        Ok(StepReport {
            step_length: length,
            boundary_crossed,
        })
    }
}
