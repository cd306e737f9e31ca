//! Configuration types for the swim
//!
//! The configuration is split by concern: [`MatchingConfig`] drives hit
//! association, [`UpdateConfig`] drives the Kalman update, and [`SwimConfig`]
//! holds the loop's floors, caps and bounding volume. All types deserialize
//! from JSON with defaults for missing fields.

use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::errors::SwimError;
use crate::types::TimeWindow;

/// Cylindrical volume that encloses the instrumented detector
///
/// Leaving it ends the swim as escaped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingCylinder {
    /// Outer radius (cm)
    pub radius: f64,
    /// Lower z face (cm)
    pub z_min: f64,
    /// Upper z face (cm)
    pub z_max: f64,
}

impl BoundingCylinder {
    /// Create a new bounding cylinder
    pub fn new(radius: f64, z_min: f64, z_max: f64) -> Self {
        Self {
            radius,
            z_min,
            z_max,
        }
    }

    /// Signed distance to the nearest face; negative outside
    pub fn distance_from_point(&self, point: &Vector3<f64>) -> f64 {
        let r = point.x.hypot(point.y);
        (self.radius - r)
            .min(point.z - self.z_min)
            .min(self.z_max - point.z)
    }

    /// Whether the point is inside or on the surface
    #[inline]
    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        self.distance_from_point(point) >= 0.0
    }
}

impl Default for BoundingCylinder {
    fn default() -> Self {
        Self {
            radius: 345.0,
            z_min: -190.0,
            z_max: 330.0,
        }
    }
}

/// Hit association parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum gate distance between a hit and the crossing (cm)
    pub max_distance: f64,
    /// Gate width in combined standard deviations
    pub max_distance_sigma: f64,
    /// Intrinsic strip position error added to the hit variance (cm)
    pub strip_position_error: f64,
    /// Maximum perpendicular distance to an adjacent sector's plane (cm)
    pub adjacent_tolerance: f64,
    /// Accepted hit time before the extrapolated time (ns)
    pub time_window_before: f64,
    /// Accepted hit time after the extrapolated time (ns)
    pub time_window_after: f64,
}

impl MatchingConfig {
    /// Hit time window around the extrapolated time of flight
    #[inline]
    pub fn time_window(&self, extrapolated_time: f64) -> TimeWindow {
        TimeWindow::new(
            extrapolated_time - self.time_window_before,
            extrapolated_time + self.time_window_after,
        )
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_distance: 25.0,
            max_distance_sigma: 5.0,
            strip_position_error: 4.0 / 12.0_f64.sqrt(),
            adjacent_tolerance: 15.0,
            time_window_before: 50.0,
            time_window_after: 50.0,
        }
    }
}

/// Kalman update parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Reject a match whose normalized residual exceeds this in either direction
    pub gate_sigma: f64,
    /// Skip the update when the track is this close to tangent to a readout axis
    pub cos_small_angle: f64,
    /// Hit variance multiplier used when there is no magnetic field
    pub field_free_variance_scale: f64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            gate_sigma: 5.0,
            cos_small_angle: 0.98,
            field_free_variance_scale: 10.0,
        }
    }
}

/// Top-level swim configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwimConfig {
    /// Tracks at or below this transverse momentum are not swum (GeV/c)
    pub min_pt: f64,
    /// Kinetic energy below which the particle is considered stopped (GeV)
    pub min_kinetic_energy: f64,
    /// Hard cap on loop iterations per swim
    pub max_iterations: usize,
    /// Swim ends as curled when the transverse radius drops below this (cm)
    pub min_radius: f64,
    /// Enclosing volume; leaving it ends the swim as escaped
    pub target: BoundingCylinder,
    /// Whether the tracks were reconstructed in a magnetic field
    pub magnetic_field: bool,
    /// Hit association parameters
    pub matching: MatchingConfig,
    /// Kalman update parameters
    pub update: UpdateConfig,
}

impl Default for SwimConfig {
    fn default() -> Self {
        Self {
            min_pt: 0.1,
            min_kinetic_energy: 0.002,
            max_iterations: 10_000,
            min_radius: 20.0,
            target: BoundingCylinder::default(),
            magnetic_field: true,
            matching: MatchingConfig::default(),
            update: UpdateConfig::default(),
        }
    }
}

impl SwimConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, SwimError> {
        let config: SwimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SwimError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Momentum floor (GeV/c) for a particle of the given mass
    ///
    /// The momentum at which the kinetic energy equals `min_kinetic_energy`.
    #[inline]
    pub fn momentum_floor(&self, mass: f64) -> f64 {
        let e = mass + self.min_kinetic_energy;
        (e * e - mass * mass).max(0.0).sqrt()
    }

    /// Check every parameter for a usable value
    pub fn validate(&self) -> Result<(), SwimError> {
        fn check(ok: bool, description: &str) -> Result<(), SwimError> {
            if ok {
                Ok(())
            } else {
                Err(SwimError::configuration(description))
            }
        }

        check(self.min_pt >= 0.0, "min_pt must be non-negative")?;
        check(
            self.min_kinetic_energy >= 0.0,
            "min_kinetic_energy must be non-negative",
        )?;
        check(self.max_iterations > 0, "max_iterations must be positive")?;
        check(self.min_radius >= 0.0, "min_radius must be non-negative")?;
        check(
            self.target.radius > self.min_radius,
            "target radius must exceed min_radius",
        )?;
        check(
            self.target.z_min < self.target.z_max,
            "target z_min must be below z_max",
        )?;

        let m = &self.matching;
        check(m.max_distance > 0.0, "matching.max_distance must be positive")?;
        check(
            m.max_distance_sigma > 0.0,
            "matching.max_distance_sigma must be positive",
        )?;
        check(
            m.strip_position_error >= 0.0,
            "matching.strip_position_error must be non-negative",
        )?;
        check(
            m.adjacent_tolerance >= 0.0,
            "matching.adjacent_tolerance must be non-negative",
        )?;
        check(
            m.time_window_before >= 0.0 && m.time_window_after >= 0.0,
            "matching time window bounds must be non-negative",
        )?;

        let u = &self.update;
        check(u.gate_sigma > 0.0, "update.gate_sigma must be positive")?;
        check(
            u.cos_small_angle > 0.0 && u.cos_small_angle <= 1.0,
            "update.cos_small_angle must lie in (0, 1]",
        )?;
        check(
            u.field_free_variance_scale >= 1.0,
            "update.field_free_variance_scale must be at least 1",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SwimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SwimConfig::from_json_str(r#"{ "max_iterations": 42, "matching": { "max_distance": 10.0 } }"#)
            .unwrap();
        assert_eq!(config.max_iterations, 42);
        assert_relative_eq!(config.matching.max_distance, 10.0);
        assert_relative_eq!(config.matching.max_distance_sigma, 5.0);
        assert_relative_eq!(config.update.gate_sigma, 5.0);
    }

    #[test]
    fn test_invalid_json_values_rejected() {
        let err = SwimConfig::from_json_str(r#"{ "max_iterations": 0 }"#).unwrap_err();
        assert!(err.to_string().contains("max_iterations"));

        let err = SwimConfig::from_json_str(r#"{ "update": { "cos_small_angle": 1.5 } }"#).unwrap_err();
        assert!(matches!(err, SwimError::Configuration { .. }));
    }

    #[test]
    fn test_bounding_cylinder_distance() {
        let target = BoundingCylinder::new(100.0, -50.0, 50.0);
        assert_relative_eq!(target.distance_from_point(&Vector3::new(0.0, 0.0, 0.0)), 50.0);
        assert_relative_eq!(target.distance_from_point(&Vector3::new(90.0, 0.0, 0.0)), 10.0);
        assert!(target.distance_from_point(&Vector3::new(0.0, 101.0, 0.0)) < 0.0);
        assert!(!target.contains(&Vector3::new(0.0, 0.0, -51.0)));
    }

    #[test]
    fn test_momentum_floor() {
        let config = SwimConfig {
            min_kinetic_energy: 0.01,
            ..SwimConfig::default()
        };
        let mass = 0.105_658;
        let p = config.momentum_floor(mass);
        let ke = (p * p + mass * mass).sqrt() - mass;
        assert_relative_eq!(ke, 0.01, epsilon = 1e-12);
        assert_eq!(
            SwimConfig {
                min_kinetic_energy: 0.0,
                ..SwimConfig::default()
            }
            .momentum_floor(mass),
            0.0
        );
    }

    #[test]
    fn test_time_window_around_extrapolated_time() {
        let m = MatchingConfig::default();
        let w = m.time_window(20.0);
        assert!(w.contains(20.0 - m.time_window_before));
        assert!(w.contains(20.0 + m.time_window_after));
        assert!(!w.contains(20.0 + m.time_window_after + 1.0));
    }
}
