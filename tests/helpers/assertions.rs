//! Matrix comparison helpers with readable failure messages

use nalgebra::{Matrix5, Matrix6};

/// Assert two matrices agree elementwise within `tolerance` relative to the
/// largest element of `expected`
pub fn assert_matrix5_close(actual: &Matrix5<f64>, expected: &Matrix5<f64>, tolerance: f64, context: &str) {
    let scale = expected.amax().max(1e-300);
    for i in 0..5 {
        for j in 0..5 {
            let diff = (actual[(i, j)] - expected[(i, j)]).abs();
            assert!(
                diff <= tolerance * scale,
                "{}: element ({}, {}) differs: actual={:e}, expected={:e}, diff={:e}",
                context,
                i,
                j,
                actual[(i, j)],
                expected[(i, j)],
                diff
            );
        }
    }
}

/// 6×6 counterpart of [`assert_matrix5_close`]
pub fn assert_matrix6_close(actual: &Matrix6<f64>, expected: &Matrix6<f64>, tolerance: f64, context: &str) {
    let scale = expected.amax().max(1e-300);
    for i in 0..6 {
        for j in 0..6 {
            let diff = (actual[(i, j)] - expected[(i, j)]).abs();
            assert!(
                diff <= tolerance * scale,
                "{}: element ({}, {}) differs: actual={:e}, expected={:e}, diff={:e}",
                context,
                i,
                j,
                actual[(i, j)],
                expected[(i, j)],
                diff
            );
        }
    }
}
