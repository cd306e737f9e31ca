//! Gain-matrix update of a trajectory with one 2-D measurement
//!
//! The update works in the track coordinate system (TCS) at the crossing:
//! - `ẑ` is the track direction,
//! - `x̂ = (u × ẑ) / |u × ẑ|` lies in the plane of the track and the v readout,
//! - `ŷ = ẑ × x̂` completes the right-handed frame.
//!
//! The measurement model projects the cartesian position onto `(ŷ, x̂)`:
//!
//! ```text
//! H = | ŷᵀ  0 |      S = H·C·Hᵀ + R      K = C·Hᵀ·S⁻¹
//!     | x̂ᵀ  0 |      x' = x + K·r        C' = C − K·H·C
//! ```
//!
//! After the gain step the position is moved back onto the plane of the
//! original crossing along the corrected direction, and the momentum
//! magnitude is restored exactly.

use nalgebra::{Matrix2, Matrix6, SMatrix, Vector2, Vector3, Vector6};

use crate::common::linalg::{invert_covariance_2x2, quadratic_form, symmetrize};
use crate::common::constants::PARALLEL_EPSILON;
use crate::config::UpdateConfig;
use crate::errors::SwimError;
use crate::geometry::MeasurementPlane;
use crate::state::TrajectoryState;
use crate::types::Hit;

/// Projection from cartesian parameters onto the TCS (ŷ, x̂) plane
type Projection = SMatrix<f64, 2, 6>;

/// Result of an accepted update
#[derive(Debug, Clone)]
pub struct KalmanUpdate {
    /// Corrected position, on the plane of the original crossing (cm)
    pub position: Vector3<f64>,
    /// Corrected momentum, same magnitude as before (GeV/c)
    pub momentum: Vector3<f64>,
    /// Shrunk covariance
    pub covariance: Matrix6<f64>,
    /// Extrapolated position moved onto the hit's plane before the update
    pub position_at_hit_plane: Vector3<f64>,
    /// Pre-update residual in TCS (ŷ, x̂) coordinates (cm)
    pub residual: Vector2<f64>,
    /// Post-update chi-squared (non-negative)
    pub chi2: f64,
}

impl KalmanUpdate {
    /// Replace the kinematics of `state` with the corrected ones
    pub fn apply_to(&self, state: &mut TrajectoryState) {
        state.position = self.position;
        state.momentum = self.momentum;
        state.covariance = self.covariance;
    }
}

/// Single-pass Kalman updater with residual gating
#[derive(Debug, Clone)]
pub struct KalmanUpdater {
    config: UpdateConfig,
    magnetic_field: bool,
}

impl KalmanUpdater {
    /// Create a new updater
    ///
    /// Without a magnetic field the measurement covariance is inflated by
    /// `config.field_free_variance_scale`.
    pub fn new(config: UpdateConfig, magnetic_field: bool) -> Self {
        Self {
            config,
            magnetic_field,
        }
    }

    /// Update configuration in use
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Compute the update of `state` with `hit` on `plane`
    ///
    /// `state` is not modified. Returns [`SwimError::UnmatchedMeasurement`]
    /// when a normalized residual strictly exceeds `gate_sigma`, and
    /// [`SwimError::DegenerateUpdate`] when the frame, the combined covariance
    /// or the post-update residual covariance is singular.
    pub fn update(
        &self,
        state: &TrajectoryState,
        hit: &Hit,
        plane: &MeasurementPlane,
    ) -> Result<KalmanUpdate, SwimError> {
        let p = state.p();
        let dir = state
            .direction()
            .ok_or_else(|| SwimError::degenerate("track at rest"))?;
        let n = plane.normal;
        let (u, v) = (plane.u, plane.v);

        // Nearly tangent to the plane and along a strip
        if u.dot(&dir).abs() > self.config.cos_small_angle
            || v.dot(&dir).abs() > self.config.cos_small_angle
        {
            return Err(SwimError::degenerate("track along a readout direction"));
        }
        let cos_normal = dir.dot(&n);
        if cos_normal.abs() < PARALLEL_EPSILON {
            return Err(SwimError::degenerate("track parallel to the hit plane"));
        }

        let nx = u
            .cross(&dir)
            .try_normalize(PARALLEL_EPSILON)
            .ok_or_else(|| SwimError::degenerate("track coordinate frame"))?;
        let ny = dir.cross(&nx);

        let mut h = Projection::zeros();
        for i in 0..3 {
            h[(0, i)] = ny[i];
            h[(1, i)] = nx[i];
        }

        // Extrapolated point moved onto the hit plane
        let diff = hit.position - state.position;
        let shift = dir * (diff.dot(&n) / cos_normal);
        let at_hit_plane = state.position + shift;
        let diff = diff - shift;

        // Readout (u, v) → TCS (ŷ, x̂)
        let t = Matrix2::new(u.dot(&ny), v.dot(&ny), u.dot(&nx), v.dot(&nx));
        let residual = t * Vector2::new(diff.dot(&u), diff.dot(&v));

        let mut hit_cov = t * hit.covariance * t.transpose();
        if !self.magnetic_field {
            hit_cov *= self.config.field_free_variance_scale;
        }

        let c = state.covariance;
        let combined = h * c * h.transpose() + hit_cov;
        let combined_inv = invert_covariance_2x2(&combined)
            .ok_or_else(|| SwimError::degenerate("combined covariance is singular"))?;

        for i in 0..2 {
            let sigma = combined[(i, i)].sqrt();
            if residual[i].abs() > self.config.gate_sigma * sigma {
                return Err(SwimError::UnmatchedMeasurement {
                    address: hit.address,
                });
            }
        }

        let gain = c * h.transpose() * combined_inv;
        let params = Vector6::new(
            at_hit_plane.x,
            at_hit_plane.y,
            at_hit_plane.z,
            state.momentum.x,
            state.momentum.y,
            state.momentum.z,
        ) + gain * residual;

        let corrected_momentum = Vector3::new(params[3], params[4], params[5]);
        let new_dir = corrected_momentum
            .try_normalize(0.0)
            .ok_or_else(|| SwimError::degenerate("corrected momentum vanished"))?;
        let new_cos_normal = new_dir.dot(&n);
        if new_cos_normal.abs() < PARALLEL_EPSILON {
            return Err(SwimError::degenerate("corrected track parallel to the plane"));
        }
        let corrected = Vector3::new(params[0], params[1], params[2]);
        let position =
            corrected + new_dir * ((state.position - corrected).dot(&n) / new_cos_normal);
        let momentum = new_dir * p;

        let covariance = symmetrize(&(c - gain * h * c));

        let post_residual = Vector2::new(
            (hit.position - position).dot(&ny),
            (hit.position - position).dot(&nx),
        );
        let residual_cov = hit_cov - h * covariance * h.transpose();
        let residual_inv = invert_covariance_2x2(&residual_cov)
            .ok_or_else(|| SwimError::degenerate("post-update residual covariance is singular"))?;
        let chi2 = quadratic_form(&post_residual, &residual_inv).max(0.0);

        Ok(KalmanUpdate {
            position,
            momentum,
            covariance,
            position_at_hit_plane: at_hit_plane,
            residual,
            chi2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypothesis::{Hypothesis, ParticleKind};
    use crate::types::{HitId, Section, StructuralAddress, Subsystem};
    use approx::assert_relative_eq;

    fn plane() -> MeasurementPlane {
        // Barrel plane x = 200 with u = ẑ, v = ŷ
        MeasurementPlane::new(Vector3::x(), 200.0, Vector3::z(), Vector3::y())
    }

    fn address() -> StructuralAddress {
        StructuralAddress::new(Subsystem::Barrel, Section::Forward, 0, 3)
    }

    fn state(cov: f64) -> TrajectoryState {
        let mut covariance = Matrix6::zeros();
        for i in 0..3 {
            covariance[(i, i)] = cov;
        }
        for i in 3..6 {
            covariance[(i, i)] = 1e-4;
        }
        TrajectoryState::new(
            Vector3::new(200.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            covariance,
            0.0,
            Hypothesis::new(ParticleKind::Muon, -1),
        )
    }

    fn hit_at(y: f64, z: f64, sigma: f64) -> Hit {
        Hit::new(HitId(1), address(), Vector3::new(200.0, y, z), sigma, sigma, 0.0)
    }

    #[test]
    fn test_zero_residual_gives_zero_chi2() {
        let updater = KalmanUpdater::new(UpdateConfig::default(), true);
        let s = state(1.0);
        let update = updater.update(&s, &hit_at(0.0, 0.0, 1.0), &plane()).unwrap();
        assert_relative_eq!(update.chi2, 0.0, epsilon = 1e-12);
        assert_relative_eq!(update.position, s.position, epsilon = 1e-12);
        assert_relative_eq!(update.momentum, s.momentum, epsilon = 1e-12);
    }

    #[test]
    fn test_update_pulls_towards_hit_and_shrinks_covariance() {
        let updater = KalmanUpdater::new(UpdateConfig::default(), true);
        let s = state(1.0);
        let update = updater.update(&s, &hit_at(1.0, -0.5, 1.0), &plane()).unwrap();
        // Equal weights: halfway
        assert_relative_eq!(update.position.y, 0.5, epsilon = 1e-9);
        assert_relative_eq!(update.position.z, -0.25, epsilon = 1e-9);
        // Stays on the original plane
        assert_relative_eq!(update.position.x, 200.0, epsilon = 1e-9);
        assert_relative_eq!(update.momentum.norm(), s.p(), epsilon = 1e-12);
        assert!(update.covariance[(1, 1)] < s.covariance[(1, 1)]);
        assert!(update.covariance[(2, 2)] < s.covariance[(2, 2)]);
        assert!(update.chi2 > 0.0);
    }

    #[test]
    fn test_gate_is_strict_inequality() {
        let config = UpdateConfig {
            gate_sigma: 2.0,
            ..UpdateConfig::default()
        };
        let updater = KalmanUpdater::new(config, true);
        // S_yy = 3 + 1 = 4 → σ = 2 → boundary at 4 cm
        let mut s = state(1.0);
        s.covariance[(1, 1)] = 3.0;
        let boundary = 4.0;
        let sigma_hit = 1.0;

        let at_boundary = hit_at(boundary, 0.0, sigma_hit);
        assert!(updater.update(&s, &at_boundary, &plane()).is_ok());

        let beyond = hit_at(boundary * (1.0 + 1e-9), 0.0, sigma_hit);
        assert!(matches!(
            updater.update(&s, &beyond, &plane()),
            Err(SwimError::UnmatchedMeasurement { .. })
        ));
    }

    #[test]
    fn test_singular_combined_covariance_is_degenerate() {
        let updater = KalmanUpdater::new(UpdateConfig::default(), true);
        let s = state(0.0);
        let hit = hit_at(0.0, 0.0, 0.0);
        assert!(matches!(
            updater.update(&s, &hit, &plane()),
            Err(SwimError::DegenerateUpdate { .. })
        ));
    }

    #[test]
    fn test_exact_hit_leaves_no_residual_covariance() {
        let updater = KalmanUpdater::new(UpdateConfig::default(), true);
        // A zero-variance hit pins the position exactly
        let s = state(1.0);
        let hit = hit_at(0.0, 0.0, 0.0);
        assert!(matches!(
            updater.update(&s, &hit, &plane()),
            Err(SwimError::DegenerateUpdate { .. })
        ));
    }

    #[test]
    fn test_track_along_strip_is_degenerate() {
        let updater = KalmanUpdater::new(UpdateConfig::default(), true);
        let mut s = state(1.0);
        s.momentum = Vector3::new(0.1, 0.0, 1.0);
        assert!(matches!(
            updater.update(&s, &hit_at(0.0, 0.0, 1.0), &plane()),
            Err(SwimError::DegenerateUpdate { .. })
        ));
    }

    #[test]
    fn test_field_free_inflates_measurement_error() {
        let s = state(1.0);
        let hit = hit_at(1.0, 0.0, 1.0);
        let with_field = KalmanUpdater::new(UpdateConfig::default(), true)
            .update(&s, &hit, &plane())
            .unwrap();
        let field_free = KalmanUpdater::new(UpdateConfig::default(), false)
            .update(&s, &hit, &plane())
            .unwrap();
        // A looser measurement moves the track less
        assert!(field_free.position.y < with_field.position.y);
    }

    #[test]
    fn test_position_at_hit_plane() {
        let updater = KalmanUpdater::new(UpdateConfig::default(), true);
        let mut s = state(1.0);
        s.momentum = Vector3::new(1.0, 1.0, 0.0);
        s.position = Vector3::new(199.0, 0.0, 0.0);
        let hit = hit_at(1.0, 0.0, 1.0);
        let update = updater.update(&s, &hit, &plane()).unwrap();
        assert_relative_eq!(
            update.position_at_hit_plane,
            Vector3::new(200.0, 1.0, 0.0),
            epsilon = 1e-12
        );
        // Corrected position stays on the crossing's own plane
        assert_relative_eq!(update.position.x, 199.0, epsilon = 1e-9);
    }
}
