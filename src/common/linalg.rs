//! Linear algebra utilities
//!
//! Small fixed-size helpers for the covariance bookkeeping: symmetrization,
//! positive semi-definiteness checks, guarded 2×2 inversion, the track error
//! projected onto a readout direction, and log-domain normalization.

use nalgebra::{Matrix2, Matrix3, Matrix6, SymmetricEigen, Vector2, Vector3};

use super::constants::{SINGULAR_DETERMINANT_RATIO, UNDEFINED_PLANE_ERROR};

/// Make a 6×6 matrix symmetric by averaging with its transpose
#[inline]
pub fn symmetrize(matrix: &Matrix6<f64>) -> Matrix6<f64> {
    0.5 * (matrix + matrix.transpose())
}

/// Check if a symmetric matrix is positive semi-definite
///
/// Eigenvalues down to `-tolerance × max|λ|` are accepted to absorb rounding.
pub fn is_positive_semidefinite(matrix: &Matrix6<f64>, tolerance: f64) -> bool {
    if matrix.iter().any(|v| !v.is_finite()) {
        return false;
    }
    let eigen = SymmetricEigen::new(symmetrize(matrix));
    let scale = eigen
        .eigenvalues
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    eigen
        .eigenvalues
        .iter()
        .all(|&v| v >= -tolerance * scale.max(f64::MIN_POSITIVE))
}

/// Invert a 2×2 symmetric covariance, refusing near-singular input
///
/// Returns `None` when the determinant is non-finite or small relative to the
/// product of the diagonal, which is where the plain inverse stops being
/// meaningful.
pub fn invert_covariance_2x2(matrix: &Matrix2<f64>) -> Option<Matrix2<f64>> {
    let det = matrix.determinant();
    let scale = (matrix[(0, 0)] * matrix[(1, 1)]).abs();
    if !det.is_finite() || det <= SINGULAR_DETERMINANT_RATIO * scale || det <= 0.0 {
        return None;
    }
    Some(Matrix2::new(
        matrix[(1, 1)] / det,
        -matrix[(0, 1)] / det,
        -matrix[(1, 0)] / det,
        matrix[(0, 0)] / det,
    ))
}

/// Quadratic form `rᵀ M r`
#[inline]
pub fn quadratic_form(residual: &Vector2<f64>, matrix: &Matrix2<f64>) -> f64 {
    residual.dot(&(matrix * residual))
}

/// Track position error (cm) along a readout direction
///
/// Builds the frame whose z axis is the track direction and whose x axis lies
/// in the plane of the track and the readout direction, then returns the
/// standard deviation of the position along that x axis. Returns
/// [`UNDEFINED_PLANE_ERROR`] when the readout direction is parallel to the
/// track.
pub fn plane_error(covariance: &Matrix6<f64>, n_track: &Vector3<f64>, n_readout: &Vector3<f64>) -> f64 {
    let projection = n_readout.dot(n_track);
    let denom = 1.0 - projection * projection;
    if denom <= 1e-12 {
        return UNDEFINED_PLANE_ERROR;
    }

    let nx = (n_readout - n_track * projection) / denom.sqrt();
    let ny = n_track.cross(&nx);
    let rotation = Matrix3::from_rows(&[nx.transpose(), ny.transpose(), n_track.transpose()]);

    let position_cov: Matrix3<f64> = covariance.fixed_view::<3, 3>(0, 0).into_owned();
    let rotated = rotation * position_cov * rotation.transpose();
    rotated[(0, 0)].max(0.0).sqrt()
}

/// Compute log-sum-exp for numerical stability
///
/// Computes `log(sum(exp(x)))` without overflow. Returns `-inf` for an empty
/// slice or when every value is `-inf`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }

    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() && max_val < 0.0 {
        return f64::NEG_INFINITY;
    }

    let sum: f64 = values.iter().map(|v| (v - max_val).exp()).sum();
    max_val + sum.ln()
}

/// Natural logarithm of the gamma function (Lanczos approximation, g = 7)
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection formula
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let t = x + 7.5;
    let mut sum = COEFFS[0];
    for (i, c) in COEFFS.iter().enumerate().skip(1) {
        sum += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}
