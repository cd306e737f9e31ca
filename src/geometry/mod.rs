//! Detector geometry seams
//!
//! The swim never inspects the detector description directly. It asks a
//! [`VolumeClassifier`] which structural element a point belongs to, which
//! measurement plane that element reads out, and which sectors neighbour it,
//! and asks a [`ChannelStatus`] whether the element is alive.
//!
//! - [`klm`] - Reference barrel + endcap geometry
//! - [`channels`] - Reference channel-status implementations

pub mod channels;
pub mod klm;

use nalgebra::Vector3;
use smallvec::SmallVec;

use crate::common::constants::PARALLEL_EPSILON;
use crate::types::{StructuralAddress, Subsystem};

pub use channels::{AllChannelsAlive, DeadChannelSet};
pub use klm::{KlmGeometry, KlmGeometryConfig};

/// Readout plane of one detector element
///
/// Points `x` on the plane satisfy `normal · x = offset`. `u` and `v` are the
/// two in-plane readout directions; together with `normal` they form an
/// orthonormal frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementPlane {
    /// Unit normal
    pub normal: Vector3<f64>,
    /// Signed distance of the plane from the origin along `normal` (cm)
    pub offset: f64,
    /// First readout direction
    pub u: Vector3<f64>,
    /// Second readout direction
    pub v: Vector3<f64>,
}

impl MeasurementPlane {
    /// Create a new plane
    pub fn new(normal: Vector3<f64>, offset: f64, u: Vector3<f64>, v: Vector3<f64>) -> Self {
        Self {
            normal,
            offset,
            u,
            v,
        }
    }

    /// Signed perpendicular distance of `point` from the plane (cm)
    #[inline]
    pub fn signed_distance(&self, point: &Vector3<f64>) -> f64 {
        self.normal.dot(point) - self.offset
    }

    /// Point where the line through `point` along `direction` meets the plane
    ///
    /// Returns `None` when the line is parallel to the plane.
    pub fn intersect_along(
        &self,
        point: &Vector3<f64>,
        direction: &Vector3<f64>,
    ) -> Option<Vector3<f64>> {
        let cos = self.normal.dot(direction);
        if cos.abs() < PARALLEL_EPSILON {
            return None;
        }
        Some(point - direction * (self.signed_distance(point) / cos))
    }

    /// Component of `displacement` lying in the plane
    #[inline]
    pub fn in_plane(&self, displacement: &Vector3<f64>) -> Vector3<f64> {
        displacement - self.normal * self.normal.dot(displacement)
    }
}

/// Maps points to structural addresses
pub trait VolumeClassifier: Send + Sync {
    /// Address of the element containing `point`, if any
    fn classify(&self, point: &Vector3<f64>) -> Option<StructuralAddress>;

    /// Readout plane of `address`
    ///
    /// `near` selects the local readout frame for elements whose readout
    /// directions vary across the element.
    fn measurement_plane(
        &self,
        address: &StructuralAddress,
        near: &Vector3<f64>,
    ) -> Option<MeasurementPlane>;

    /// Same-layer elements in the neighbouring sectors
    fn adjacent(&self, address: &StructuralAddress) -> SmallVec<[StructuralAddress; 2]>;

    /// Number of instrumented layers in `subsystem`
    fn layer_count(&self, subsystem: Subsystem) -> u16;
}

/// Dead/alive status of detector elements
pub trait ChannelStatus: Send + Sync {
    /// Whether `address` can record hits
    fn is_alive(&self, address: &StructuralAddress) -> bool;
}
