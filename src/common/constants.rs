//! Numerical constants used throughout the swim
//!
//! These are fixed properties of the bookkeeping format and of the numerics.
//! User-tunable thresholds live in [`crate::config::SwimConfig`] instead.

/// Chi-squared sentinel meaning "no accepted match"
///
/// Any negative value is treated as unmatched; this is the one we write.
pub const NO_MATCH_CHI2: f64 = -1.0;

/// Number of bits reserved for barrel layers in the layer patterns
///
/// Barrel layer `l` maps to bit `l`; endcap layer `l` maps to bit
/// `MAX_BARREL_LAYERS + l`.
pub const MAX_BARREL_LAYERS: u32 = 15;

/// Number of bits reserved for endcap layers in the layer patterns
pub const MAX_ENDCAP_LAYERS: u32 = 14;

/// Independent in-plane measurements contributed by one matched layer
pub const MEASUREMENTS_PER_LAYER: u32 = 2;

/// Speed of light in cm/ns
pub const SPEED_OF_LIGHT_CM_PER_NS: f64 = 29.979_245_8;

/// Threshold below which a direction is treated as parallel to a plane
///
/// Used as the minimum |cos| between a track direction and a plane normal
/// before dividing by it.
pub const PARALLEL_EPSILON: f64 = 1e-12;

/// Track position error reported when the readout direction is parallel to the track
pub const UNDEFINED_PLANE_ERROR: f64 = 1e12;

/// Relative determinant threshold for treating a 2×2 covariance as singular
pub const SINGULAR_DETERMINANT_RATIO: f64 = 1e-14;

/// Sum of hypothesis densities below which normalization is flagged unreliable
pub const MIN_DENSITY_SUM: f64 = 1e-17;

/// Floor applied to densities before taking logarithms
pub const MIN_DENSITY: f64 = 1e-300;

/// Largest even number of degrees of freedom with its own transverse PDF entry
pub const MAX_TABULATED_NDOF: u32 = 38;
