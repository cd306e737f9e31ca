//! Reference barrel + endcap detector geometry
//!
//! The barrel is a regular polygon of sectors around the beam axis. Layer `l`
//! of sector `s` is the plane `x · n_s = R_l`, where `n_s` points outward at
//! azimuth `φ_s = s · 2π / N`, limited laterally to the polygon edge and in z
//! to the barrel half length. Its readout directions are `ẑ` and the sector's
//! azimuthal direction.
//!
//! Each endcap (forward and backward of the detector offset) is a stack of
//! planes `|z − z0| = Z_l` between an inner and an outer radius, divided into
//! equal azimuthal sectors. Its readout directions are radial and azimuthal at
//! the point of interest.

use std::f64::consts::{PI, TAU};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{MeasurementPlane, VolumeClassifier};
use crate::common::constants::{MAX_BARREL_LAYERS, MAX_ENDCAP_LAYERS, PARALLEL_EPSILON};
use crate::errors::SwimError;
use crate::types::{Section, StructuralAddress, Subsystem};

/// Planes closer than this along the direction of travel are not "next" (cm)
const MIN_PLANE_DISTANCE: f64 = 1e-6;

/// Geometry parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KlmGeometryConfig {
    /// z of the detector centre (cm)
    pub offset_z: f64,
    /// Number of barrel sectors (polygon sides)
    pub barrel_sectors: u16,
    /// Perpendicular distance of each barrel layer from the axis (cm), inner first
    pub barrel_layer_radii: Vec<f64>,
    /// Half length of the active barrel around `offset_z` (cm)
    pub barrel_half_length: f64,
    /// Number of azimuthal sectors per endcap
    pub endcap_sectors: u16,
    /// Distance of each endcap layer from `offset_z` (cm), inner first
    pub endcap_layer_distances: Vec<f64>,
    /// Inner active radius of the endcaps (cm)
    pub endcap_min_radius: f64,
    /// Outer active radius of the endcaps (cm)
    pub endcap_max_radius: f64,
    /// Distance from a plane within which a point is classified onto it (cm)
    pub tolerance: f64,
}

impl Default for KlmGeometryConfig {
    fn default() -> Self {
        Self {
            offset_z: 47.0,
            barrel_sectors: 8,
            barrel_layer_radii: (0..MAX_BARREL_LAYERS).map(|l| 201.9 + 9.1 * l as f64).collect(),
            barrel_half_length: 180.0,
            endcap_sectors: 4,
            endcap_layer_distances: (0..MAX_ENDCAP_LAYERS)
                .map(|l| 185.0 + 3.5 * l as f64)
                .collect(),
            endcap_min_radius: 130.0,
            endcap_max_radius: 330.0,
            tolerance: 1e-3,
        }
    }
}

/// Barrel sector frame: outward normal and azimuthal readout direction
#[derive(Debug, Clone, Copy)]
struct SectorFrame {
    normal: Vector3<f64>,
    phi: Vector3<f64>,
}

/// Reference geometry implementing [`VolumeClassifier`]
#[derive(Debug, Clone)]
pub struct KlmGeometry {
    config: KlmGeometryConfig,
    sectors: Vec<SectorFrame>,
    half_edge_ratio: f64,
}

impl KlmGeometry {
    /// Build and validate the geometry
    pub fn new(config: KlmGeometryConfig) -> Result<Self, SwimError> {
        fn increasing(values: &[f64]) -> bool {
            values.iter().all(|v| v.is_finite() && *v > 0.0)
                && values.windows(2).all(|w| w[0] < w[1])
        }

        if config.barrel_sectors < 3 {
            return Err(SwimError::configuration("barrel_sectors must be at least 3"));
        }
        if config.endcap_sectors == 0 {
            return Err(SwimError::configuration("endcap_sectors must be positive"));
        }
        if config.barrel_layer_radii.len() > MAX_BARREL_LAYERS as usize
            || !increasing(&config.barrel_layer_radii)
        {
            return Err(SwimError::configuration(
                "barrel_layer_radii must be positive, increasing and fit the layer pattern",
            ));
        }
        if config.endcap_layer_distances.len() > MAX_ENDCAP_LAYERS as usize
            || !increasing(&config.endcap_layer_distances)
        {
            return Err(SwimError::configuration(
                "endcap_layer_distances must be positive, increasing and fit the layer pattern",
            ));
        }
        if let Some(&first) = config.endcap_layer_distances.first() {
            if first <= config.barrel_half_length {
                return Err(SwimError::configuration(
                    "endcap layers must lie beyond the barrel half length",
                ));
            }
        }
        if !(config.endcap_min_radius >= 0.0 && config.endcap_min_radius < config.endcap_max_radius) {
            return Err(SwimError::configuration("endcap radii must satisfy 0 <= min < max"));
        }
        if !(config.tolerance > 0.0) {
            return Err(SwimError::configuration("tolerance must be positive"));
        }

        let n = config.barrel_sectors;
        let sectors = (0..n)
            .map(|s| {
                let phi = f64::from(s) * TAU / f64::from(n);
                SectorFrame {
                    normal: Vector3::new(phi.cos(), phi.sin(), 0.0),
                    phi: Vector3::new(-phi.sin(), phi.cos(), 0.0),
                }
            })
            .collect();

        Ok(Self {
            half_edge_ratio: (PI / f64::from(n)).tan(),
            sectors,
            config,
        })
    }

    /// Parse a JSON geometry description
    pub fn from_json_str(json: &str) -> Result<Self, SwimError> {
        Self::new(serde_json::from_str(json)?)
    }

    /// Geometry parameters
    pub fn config(&self) -> &KlmGeometryConfig {
        &self.config
    }

    /// Barrel sector whose azimuthal range contains `point`
    pub fn barrel_sector(&self, point: &Vector3<f64>) -> u16 {
        let n = f64::from(self.config.barrel_sectors);
        let phi = point.y.atan2(point.x).rem_euclid(TAU);
        ((phi * n / TAU).round() as u16) % self.config.barrel_sectors
    }

    /// Endcap sector whose azimuthal range contains `point`
    pub fn endcap_sector(&self, point: &Vector3<f64>) -> u16 {
        let n = self.config.endcap_sectors;
        let phi = point.y.atan2(point.x).rem_euclid(TAU);
        ((phi * f64::from(n) / TAU) as u16).min(n - 1)
    }

    /// Distance along `direction` from `position` to the nearest active layer plane
    ///
    /// Planes within [`MIN_PLANE_DISTANCE`] are ignored so that a point
    /// sitting on a plane finds the following one. `direction` must be a unit
    /// vector. Returns `None` when no plane lies ahead.
    pub fn distance_to_next_plane(
        &self,
        position: &Vector3<f64>,
        direction: &Vector3<f64>,
    ) -> Option<f64> {
        let c = &self.config;
        let mut best = f64::INFINITY;

        for frame in &self.sectors {
            let cos = frame.normal.dot(direction);
            if cos.abs() < PARALLEL_EPSILON {
                continue;
            }
            let d = frame.normal.dot(position);
            for &radius in &c.barrel_layer_radii {
                let t = (radius - d) / cos;
                if t <= MIN_PLANE_DISTANCE || t >= best {
                    continue;
                }
                let landing = position + direction * t;
                let lateral = frame.phi.dot(&landing).abs();
                if (landing.z - c.offset_z).abs() <= c.barrel_half_length
                    && lateral <= radius * self.half_edge_ratio
                {
                    best = t;
                }
            }
        }

        if direction.z.abs() >= PARALLEL_EPSILON {
            for sign in [1.0, -1.0] {
                for &distance in &c.endcap_layer_distances {
                    let t = (c.offset_z + sign * distance - position.z) / direction.z;
                    if t <= MIN_PLANE_DISTANCE || t >= best {
                        continue;
                    }
                    let landing = position + direction * t;
                    let r = landing.x.hypot(landing.y);
                    if r >= c.endcap_min_radius && r <= c.endcap_max_radius {
                        best = t;
                    }
                }
            }
        }

        best.is_finite().then_some(best)
    }

    fn sector_count(&self, subsystem: Subsystem) -> u16 {
        match subsystem {
            Subsystem::Barrel => self.config.barrel_sectors,
            Subsystem::Endcap => self.config.endcap_sectors,
        }
    }

    fn classify_barrel(&self, point: &Vector3<f64>) -> Option<StructuralAddress> {
        let c = &self.config;
        if (point.z - c.offset_z).abs() > c.barrel_half_length + c.tolerance {
            return None;
        }
        let sector = self.barrel_sector(point);
        let frame = self.sectors[usize::from(sector)];
        let d = frame.normal.dot(point);
        let lateral = frame.phi.dot(point).abs();
        c.barrel_layer_radii
            .iter()
            .position(|&radius| {
                (d - radius).abs() <= c.tolerance
                    && lateral <= radius * self.half_edge_ratio + c.tolerance
            })
            .map(|layer| {
                StructuralAddress::new(
                    Subsystem::Barrel,
                    Section::from_z(point.z, c.offset_z),
                    sector,
                    layer as u16,
                )
            })
    }

    fn classify_endcap(&self, point: &Vector3<f64>) -> Option<StructuralAddress> {
        let c = &self.config;
        let r = point.x.hypot(point.y);
        if r < c.endcap_min_radius - c.tolerance || r > c.endcap_max_radius + c.tolerance {
            return None;
        }
        let dz = (point.z - c.offset_z).abs();
        c.endcap_layer_distances
            .iter()
            .position(|&distance| (dz - distance).abs() <= c.tolerance)
            .map(|layer| {
                StructuralAddress::new(
                    Subsystem::Endcap,
                    Section::from_z(point.z, c.offset_z),
                    self.endcap_sector(point),
                    layer as u16,
                )
            })
    }
}

impl VolumeClassifier for KlmGeometry {
    fn classify(&self, point: &Vector3<f64>) -> Option<StructuralAddress> {
        if !point.iter().all(|v| v.is_finite()) {
            return None;
        }
        self.classify_barrel(point)
            .or_else(|| self.classify_endcap(point))
    }

    fn measurement_plane(
        &self,
        address: &StructuralAddress,
        near: &Vector3<f64>,
    ) -> Option<MeasurementPlane> {
        let c = &self.config;
        match address.subsystem {
            Subsystem::Barrel => {
                let radius = *c.barrel_layer_radii.get(usize::from(address.layer))?;
                let frame = self.sectors.get(usize::from(address.sector))?;
                Some(MeasurementPlane::new(
                    frame.normal,
                    radius,
                    Vector3::z(),
                    frame.phi,
                ))
            }
            Subsystem::Endcap => {
                let distance = *c.endcap_layer_distances.get(usize::from(address.layer))?;
                if address.sector >= c.endcap_sectors {
                    return None;
                }
                let sign = address.section.sign();
                // Fall back to the sector centre on the axis
                let phi = if near.x.hypot(near.y) > PARALLEL_EPSILON {
                    near.y.atan2(near.x)
                } else {
                    (f64::from(address.sector) + 0.5) * TAU / f64::from(c.endcap_sectors)
                };
                Some(MeasurementPlane::new(
                    Vector3::new(0.0, 0.0, sign),
                    sign * c.offset_z + distance,
                    Vector3::new(phi.cos(), phi.sin(), 0.0),
                    Vector3::new(-phi.sin(), phi.cos(), 0.0),
                ))
            }
        }
    }

    fn adjacent(&self, address: &StructuralAddress) -> SmallVec<[StructuralAddress; 2]> {
        let n = self.sector_count(address.subsystem);
        let mut out = SmallVec::new();
        if n < 2 || address.sector >= n {
            return out;
        }
        let previous = (address.sector + n - 1) % n;
        let next = (address.sector + 1) % n;
        out.push(address.with_sector(previous));
        if next != previous {
            out.push(address.with_sector(next));
        }
        out
    }

    fn layer_count(&self, subsystem: Subsystem) -> u16 {
        match subsystem {
            Subsystem::Barrel => self.config.barrel_layer_radii.len() as u16,
            Subsystem::Endcap => self.config.endcap_layer_distances.len() as u16,
        }
    }
}
