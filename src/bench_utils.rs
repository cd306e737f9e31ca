//! Synthetic events shared between the Criterion benchmarks and the demos.
//!
//! This module provides:
//! - A seeded generator of fitted tracks and detector hits on the reference
//!   geometry
//! - Synthetic PDF tables that separate penetrating from absorbed tracks

use nalgebra::{Matrix6, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};

use crate::common::constants::MAX_TABULATED_NDOF;
use crate::errors::SwimError;
use crate::geometry::{KlmGeometry, VolumeClassifier};
use crate::hits::InMemoryHitCatalog;
use crate::hypothesis::ParticleKind;
use crate::scoring::pdf::PATTERN_BITS;
use crate::scoring::{LongitudinalEntry, PdfTableSet, TabulatedPdf, TransverseEntry};
use crate::state::TrackFit;
use crate::swim::Outcome;
use crate::types::{Hit, HitId, Subsystem, TrackId};

// =============================================================================
// Event Generation
// =============================================================================

/// Parameters of a synthetic event
#[derive(Debug, Clone)]
pub struct SyntheticEventConfig {
    /// Number of fitted tracks
    pub tracks: usize,
    /// Fraction of tracks that penetrate every layer
    pub penetrating_fraction: f64,
    /// Probability that a crossed layer records a hit
    pub hit_efficiency: f64,
    /// Hit smearing along each readout direction (cm)
    pub hit_sigma: f64,
    /// Mean number of uncorrelated hits
    pub noise_hits: f64,
    /// Momentum range of the tracks (GeV/c)
    pub momentum: (f64, f64),
    /// Radius the tracks are fitted at (cm)
    pub start_radius: f64,
}

impl Default for SyntheticEventConfig {
    fn default() -> Self {
        Self {
            tracks: 10,
            penetrating_fraction: 0.5,
            hit_efficiency: 0.9,
            hit_sigma: 1.0,
            noise_hits: 20.0,
            momentum: (0.8, 3.0),
            start_radius: 150.0,
        }
    }
}

/// Fitted tracks and hits of one event
#[derive(Debug, Clone)]
pub struct SyntheticEvent {
    /// Fitted tracks
    pub tracks: Vec<TrackFit>,
    /// Hits on the layers crossed by the tracks plus noise
    pub hits: InMemoryHitCatalog,
}

/// Generate one event on the barrel of `geometry`
///
/// Tracks are straight and radial-ish. Penetrating tracks leave hits on
/// every crossed layer (with `hit_efficiency`); absorbed ones stop after a
/// random number of layers.
pub fn generate_event(
    geometry: &KlmGeometry,
    config: &SyntheticEventConfig,
    seed: u64,
) -> Result<SyntheticEvent, SwimError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let smear = Normal::new(0.0, config.hit_sigma)
        .map_err(|e| SwimError::configuration(format!("hit_sigma: {e}")))?;
    let noise = Poisson::new(config.noise_hits.max(1e-9))
        .map_err(|e| SwimError::configuration(format!("noise_hits: {e}")))?;
    let c = geometry.config();

    let mut hits = InMemoryHitCatalog::new();
    let mut next_hit = 0u64;
    let mut tracks = Vec::with_capacity(config.tracks);

    for i in 0..config.tracks {
        let phi = rng.gen_range(0.0..std::f64::consts::TAU);
        let z = c.offset_z + rng.gen_range(-60.0..60.0);
        let p = rng.gen_range(config.momentum.0..config.momentum.1);
        let dip: f64 = rng.gen_range(-0.2..0.2);
        let direction = Vector3::new(phi.cos() * dip.cos(), phi.sin() * dip.cos(), dip.sin());
        let position = Vector3::new(config.start_radius * phi.cos(), config.start_radius * phi.sin(), z);
        let charge = if rng.gen_bool(0.5) { 1 } else { -1 };
        let penetrating = rng.gen_bool(config.penetrating_fraction.clamp(0.0, 1.0));
        let depth = if penetrating {
            usize::MAX
        } else {
            rng.gen_range(1..c.barrel_layer_radii.len())
        };

        // Walk the straight line through the layers
        let mut point = position;
        let mut crossed = 0usize;
        while crossed < depth {
            let Some(t) = geometry.distance_to_next_plane(&point, &direction) else {
                break;
            };
            point += direction * t;
            let Some(address) = geometry.classify(&point) else {
                continue;
            };
            crossed += 1;
            if !rng.gen_bool(config.hit_efficiency.clamp(0.0, 1.0)) {
                continue;
            }
            let Some(plane) = geometry.measurement_plane(&address, &point) else {
                continue;
            };
            let measured = point + plane.u * smear.sample(&mut rng) + plane.v * smear.sample(&mut rng);
            hits.insert(Hit::new(
                HitId(next_hit),
                address,
                measured,
                config.hit_sigma,
                config.hit_sigma,
                0.0,
            ));
            next_hit += 1;
        }

        tracks.push(TrackFit {
            id: TrackId(i as u64),
            position,
            momentum: direction * p,
            covariance: Matrix6::from_diagonal(&nalgebra::Vector6::new(0.01, 0.01, 0.01, 1e-5, 1e-5, 1e-5)),
            charge,
            time: config.start_radius / 30.0,
            fit_kind: ParticleKind::Pion,
        });
    }

    // Uncorrelated hits on random barrel layers
    let count = noise.sample(&mut rng) as usize;
    for _ in 0..count {
        let layer = rng.gen_range(0..c.barrel_layer_radii.len());
        let sector = rng.gen_range(0..c.barrel_sectors);
        let sector_phi = f64::from(sector) * std::f64::consts::TAU / f64::from(c.barrel_sectors);
        let radius = c.barrel_layer_radii[layer];
        let lateral = rng.gen_range(-0.3..0.3) * radius;
        let normal = Vector3::new(sector_phi.cos(), sector_phi.sin(), 0.0);
        let along = Vector3::new(-sector_phi.sin(), sector_phi.cos(), 0.0);
        let point = normal * radius
            + along * lateral
            + Vector3::z() * (c.offset_z + rng.gen_range(-c.barrel_half_length..c.barrel_half_length));
        if let Some(address) = geometry.classify(&point) {
            hits.insert(Hit::new(
                HitId(next_hit),
                address,
                point,
                config.hit_sigma,
                config.hit_sigma,
                0.0,
            ));
            next_hit += 1;
        }
    }

    Ok(SyntheticEvent { tracks, hits })
}

// =============================================================================
// Synthetic PDF Tables
// =============================================================================

/// Table with one hit probability for every layer and outcome
///
/// The transverse part is a chi-squared shape with `p2 = ndof / 2` scaled
/// by `width`.
pub fn uniform_pdf(hit_probability: f64, width: f64) -> Result<TabulatedPdf, SwimError> {
    let mut longitudinal = Vec::new();
    for outcome in [Outcome::StoppedInVolume, Outcome::Escaped, Outcome::ReachedBoundary] {
        for (region, layers) in [
            (Subsystem::Barrel, crate::common::constants::MAX_BARREL_LAYERS),
            (Subsystem::Endcap, crate::common::constants::MAX_ENDCAP_LAYERS),
        ] {
            for last_layer in 0..layers as u16 {
                longitudinal.push(LongitudinalEntry {
                    outcome,
                    region,
                    last_layer,
                    hit_probability: vec![hit_probability; PATTERN_BITS],
                });
            }
        }
    }

    let transverse = (1..=MAX_TABULATED_NDOF / 2)
        .map(|half| TransverseEntry {
            ndof: 2 * half,
            p0: 1.0,
            p1: 1.0 / width,
            p2: f64::from(half),
        })
        .collect();

    TabulatedPdf::new(longitudinal, transverse)
}

/// Tables where muons penetrate and hadrons are absorbed
pub fn synthetic_pdf_tables() -> Result<PdfTableSet, SwimError> {
    let mut set = PdfTableSet::new();
    for kind in ParticleKind::ALL {
        let pdf = match kind {
            ParticleKind::Muon => uniform_pdf(0.9, 1.0)?,
            _ => uniform_pdf(0.4, 3.0)?,
        };
        set.insert(kind, pdf);
    }
    Ok(set)
}
