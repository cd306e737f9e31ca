//! Structural addresses, hits and per-crossing records
//!
//! Everything that names *where* something is in the detector lives here, along
//! with the measured hits and the transient [`Intersection`] produced at each
//! layer crossing.

use std::fmt;

use nalgebra::{Matrix2, Matrix6, Vector3};
use serde::{Deserialize, Serialize};

use crate::common::constants::{MAX_BARREL_LAYERS, MAX_ENDCAP_LAYERS, NO_MATCH_CHI2};

/// Detector sub-region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subsystem {
    /// Cylindrical (polygonal) barrel
    Barrel,
    /// Planar endcaps
    Endcap,
}

impl Subsystem {
    /// Index into per-region arrays (`[barrel, endcap]`)
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Subsystem::Barrel => 0,
            Subsystem::Endcap => 1,
        }
    }
}

/// Forward (+z) or backward (-z) half of the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Section {
    /// Downstream of the detector offset
    Forward,
    /// Upstream of the detector offset
    Backward,
}

impl Section {
    /// Section of a point given the detector's z offset
    #[inline]
    pub fn from_z(z: f64, offset_z: f64) -> Self {
        if z >= offset_z {
            Section::Forward
        } else {
            Section::Backward
        }
    }

    /// +1 for forward, -1 for backward
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Section::Forward => 1.0,
            Section::Backward => -1.0,
        }
    }
}

/// (subsystem, section, sector, layer) tuple identifying a detector element
///
/// Layers and sectors are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructuralAddress {
    /// Barrel or endcap
    pub subsystem: Subsystem,
    /// Forward or backward
    pub section: Section,
    /// Azimuthal sector
    pub sector: u16,
    /// Layer, counted outward from the interaction point
    pub layer: u16,
}

impl StructuralAddress {
    /// Create a new address
    pub fn new(subsystem: Subsystem, section: Section, sector: u16, layer: u16) -> Self {
        Self {
            subsystem,
            section,
            sector,
            layer,
        }
    }

    /// Same element in another sector
    #[inline]
    pub fn with_sector(self, sector: u16) -> Self {
        Self { sector, ..self }
    }

    /// Bit of this layer in the combined layer patterns.
    ///
    /// Barrel layers occupy the low bits, endcap layers start at
    /// [`MAX_BARREL_LAYERS`]. `None` for a layer beyond its region's share of
    /// the pattern.
    #[inline]
    pub fn layer_bit(&self) -> Option<u32> {
        let (offset, limit) = match self.subsystem {
            Subsystem::Barrel => (0, MAX_BARREL_LAYERS),
            Subsystem::Endcap => (MAX_BARREL_LAYERS, MAX_ENDCAP_LAYERS),
        };
        let layer = u32::from(self.layer);
        (layer < limit).then(|| 1u32 << (offset + layer))
    }

    /// Whether two addresses name the same layer surface regardless of sector
    #[inline]
    pub fn same_layer(&self, other: &StructuralAddress) -> bool {
        self.subsystem == other.subsystem
            && self.section == other.section
            && self.layer == other.layer
    }
}

impl fmt::Display for StructuralAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subsystem = match self.subsystem {
            Subsystem::Barrel => "barrel",
            Subsystem::Endcap => "endcap",
        };
        let section = match self.section {
            Section::Forward => "forward",
            Section::Backward => "backward",
        };
        write!(
            f,
            "{} {} sector {} layer {}",
            subsystem, section, self.sector, self.layer
        )
    }
}

/// Identifier of a physical hit within one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HitId(pub u64);

/// Identifier of a reconstructed track within one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u64);

/// A two-dimensional measurement on a detector layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    /// Event-unique identifier
    pub id: HitId,
    /// Element that recorded the hit
    pub address: StructuralAddress,
    /// Global position (cm)
    pub position: Vector3<f64>,
    /// Measurement covariance in the plane's (u, v) readout frame (cm²)
    pub covariance: Matrix2<f64>,
    /// Hit time (ns)
    pub time: f64,
}

impl Hit {
    /// Create a hit with independent errors along the two readout directions
    pub fn new(
        id: HitId,
        address: StructuralAddress,
        position: Vector3<f64>,
        sigma_u: f64,
        sigma_v: f64,
        time: f64,
    ) -> Self {
        Self {
            id,
            address,
            position,
            covariance: Matrix2::new(sigma_u * sigma_u, 0.0, 0.0, sigma_v * sigma_v),
            time,
        }
    }
}

/// Inclusive window of hit times (ns)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Earliest accepted time
    pub start: f64,
    /// Latest accepted time
    pub end: f64,
}

impl TimeWindow {
    /// Create a new window
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Window accepting every time
    pub fn unbounded() -> Self {
        Self {
            start: f64::NEG_INFINITY,
            end: f64::INFINITY,
        }
    }

    /// Whether `t` lies inside the window
    #[inline]
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Record of one structural-layer crossing
#[derive(Debug, Clone, Serialize)]
pub struct Intersection {
    /// Crossing position (cm)
    pub position: Vector3<f64>,
    /// Momentum at the crossing (GeV/c)
    pub momentum: Vector3<f64>,
    /// Extrapolated position moved onto the matched hit's plane
    pub position_at_hit_plane: Vector3<f64>,
    /// Cartesian covariance at the crossing
    pub covariance: Matrix6<f64>,
    /// Crossed element
    pub address: StructuralAddress,
    /// Chi-squared of the accepted match, [`NO_MATCH_CHI2`] otherwise
    pub chi2: f64,
    /// Matched hit, if any
    pub hit_id: Option<HitId>,
    /// Extrapolated time of flight at the crossing (ns)
    pub time: f64,
    /// Time of the matched hit (ns)
    pub hit_time: Option<f64>,
}

impl Intersection {
    /// Create an unmatched intersection
    pub fn new(
        address: StructuralAddress,
        position: Vector3<f64>,
        momentum: Vector3<f64>,
        covariance: Matrix6<f64>,
        time: f64,
    ) -> Self {
        Self {
            position,
            momentum,
            position_at_hit_plane: position,
            covariance,
            address,
            chi2: NO_MATCH_CHI2,
            hit_id: None,
            time,
            hit_time: None,
        }
    }

    /// Whether a measurement was accepted for this crossing
    #[inline]
    pub fn is_matched(&self) -> bool {
        self.hit_id.is_some() && self.chi2 >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_bits_do_not_overlap() {
        let barrel_top = StructuralAddress::new(
            Subsystem::Barrel,
            Section::Forward,
            0,
            (MAX_BARREL_LAYERS - 1) as u16,
        );
        let endcap_first = StructuralAddress::new(Subsystem::Endcap, Section::Forward, 0, 0);
        assert_eq!(barrel_top.layer_bit(), Some(1 << 14));
        assert_eq!(endcap_first.layer_bit(), Some(1 << 15));
    }

    #[test]
    fn test_layer_bit_out_of_range() {
        let barrel = |layer| StructuralAddress::new(Subsystem::Barrel, Section::Forward, 0, layer);
        let endcap = |layer| StructuralAddress::new(Subsystem::Endcap, Section::Backward, 0, layer);

        // Would alias endcap layer 0
        assert_eq!(barrel(MAX_BARREL_LAYERS as u16).layer_bit(), None);
        assert_eq!(endcap(0).layer_bit(), Some(1 << MAX_BARREL_LAYERS));
        // Past the width of the pattern
        assert_eq!(barrel(40).layer_bit(), None);
        assert_eq!(endcap(MAX_ENDCAP_LAYERS as u16).layer_bit(), None);
        assert_eq!(endcap(u16::MAX).layer_bit(), None);
        assert_eq!(
            endcap(MAX_ENDCAP_LAYERS as u16 - 1).layer_bit(),
            Some(1 << (MAX_BARREL_LAYERS + MAX_ENDCAP_LAYERS - 1))
        );
    }

    #[test]
    fn test_same_layer_ignores_sector() {
        let a = StructuralAddress::new(Subsystem::Barrel, Section::Backward, 2, 4);
        assert!(a.same_layer(&a.with_sector(3)));
        assert!(!a.same_layer(&StructuralAddress::new(
            Subsystem::Barrel,
            Section::Forward,
            2,
            4
        )));
    }

    #[test]
    fn test_time_window_is_inclusive() {
        let w = TimeWindow::new(-5.0, 5.0);
        assert!(w.contains(-5.0));
        assert!(w.contains(5.0));
        assert!(!w.contains(5.000001));
        assert!(TimeWindow::unbounded().contains(1e9));
    }

    #[test]
    fn test_new_intersection_is_unmatched() {
        let address = StructuralAddress::new(Subsystem::Endcap, Section::Forward, 1, 0);
        let ix = Intersection::new(
            address,
            Vector3::new(0.0, 150.0, 300.0),
            Vector3::new(0.0, 0.5, 1.0),
            Matrix6::identity(),
            10.0,
        );
        assert!(!ix.is_matched());
        assert!(ix.chi2 < 0.0);
        assert_eq!(ix.position_at_hit_plane, ix.position);
    }
}
