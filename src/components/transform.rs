//! Covariance transforms between cartesian and curvilinear track parameters.
//!
//! Cartesian parameters are `(x, y, z, px, py, pz)` in cm and GeV/c.
//! Curvilinear parameters are `(1/p, λ, φ, y⊥, z⊥)` where λ is the dip angle
//! (`sin λ = pz/p`), φ the azimuth of the momentum, and `y⊥`, `z⊥` the
//! positions along the two axes perpendicular to the track:
//!
//! ```text
//! y⊥ = -x·sin φ + y·cos φ
//! z⊥ = -x·sin λ·cos φ - y·sin λ·sin φ + z·cos λ
//! ```
//!
//! The curvilinear frame has no coordinate along the track, so the cartesian
//! → curvilinear map forgets the longitudinal position. Mapping a curvilinear
//! covariance to cartesian and back is exact; mapping a cartesian covariance
//! to curvilinear and back is exact when it has no longitudinal component
//! (see [`transverse_projector`]).

use nalgebra::{Matrix5, Matrix6, SMatrix, Vector3};

/// Jacobian of cartesian parameters with respect to curvilinear parameters
pub type CurvilinearToCartesian = SMatrix<f64, 6, 5>;

/// Jacobian of curvilinear parameters with respect to cartesian parameters
pub type CartesianToCurvilinear = SMatrix<f64, 5, 6>;

/// Trigonometry of the momentum direction
#[derive(Debug, Clone, Copy)]
struct Frame {
    p: f64,
    pt: f64,
    sin_lambda: f64,
    cos_lambda: f64,
    sin_phi: f64,
    cos_phi: f64,
}

impl Frame {
    fn new(momentum: &Vector3<f64>) -> Option<Self> {
        let p = momentum.norm();
        let pt = momentum.x.hypot(momentum.y);
        // φ is undefined along the z axis
        if !p.is_finite() || p <= 0.0 || pt <= p * 1e-12 {
            return None;
        }
        let phi = momentum.y.atan2(momentum.x);
        Some(Self {
            p,
            pt,
            sin_lambda: momentum.z / p,
            cos_lambda: pt / p,
            sin_phi: phi.sin(),
            cos_phi: phi.cos(),
        })
    }
}

/// Jacobian `∂(x, y, z, px, py, pz) / ∂(1/p, λ, φ, y⊥, z⊥)`
///
/// Returns `None` for zero momentum or momentum along the z axis.
pub fn curvilinear_to_cartesian_jacobian(momentum: &Vector3<f64>) -> Option<CurvilinearToCartesian> {
    let f = Frame::new(momentum)?;
    let p2 = f.p * f.p;
    let mut j = CurvilinearToCartesian::zeros();

    j[(3, 0)] = -p2 * f.cos_lambda * f.cos_phi;
    j[(4, 0)] = -p2 * f.cos_lambda * f.sin_phi;
    j[(5, 0)] = -p2 * f.sin_lambda;

    j[(3, 1)] = -f.p * f.sin_lambda * f.cos_phi;
    j[(4, 1)] = -f.p * f.sin_lambda * f.sin_phi;
    j[(5, 1)] = f.p * f.cos_lambda;

    j[(3, 2)] = -f.p * f.cos_lambda * f.sin_phi;
    j[(4, 2)] = f.p * f.cos_lambda * f.cos_phi;

    j[(0, 3)] = -f.sin_phi;
    j[(1, 3)] = f.cos_phi;

    j[(0, 4)] = -f.sin_lambda * f.cos_phi;
    j[(1, 4)] = -f.sin_lambda * f.sin_phi;
    j[(2, 4)] = f.cos_lambda;

    Some(j)
}

/// Jacobian `∂(1/p, λ, φ, y⊥, z⊥) / ∂(x, y, z, px, py, pz)`
///
/// Returns `None` for zero momentum or momentum along the z axis.
pub fn cartesian_to_curvilinear_jacobian(momentum: &Vector3<f64>) -> Option<CartesianToCurvilinear> {
    let f = Frame::new(momentum)?;
    let p_inv = 1.0 / f.p;
    let p_inv2 = p_inv * p_inv;
    let pt_inv = 1.0 / f.pt;
    let mut j = CartesianToCurvilinear::zeros();

    j[(0, 3)] = -p_inv2 * f.cos_lambda * f.cos_phi;
    j[(0, 4)] = -p_inv2 * f.cos_lambda * f.sin_phi;
    j[(0, 5)] = -p_inv2 * f.sin_lambda;

    j[(1, 3)] = -p_inv * f.sin_lambda * f.cos_phi;
    j[(1, 4)] = -p_inv * f.sin_lambda * f.sin_phi;
    j[(1, 5)] = p_inv * f.cos_lambda;

    j[(2, 3)] = -pt_inv * f.sin_phi;
    j[(2, 4)] = pt_inv * f.cos_phi;

    j[(3, 0)] = -f.sin_phi;
    j[(3, 1)] = f.cos_phi;

    j[(4, 0)] = -f.sin_lambda * f.cos_phi;
    j[(4, 1)] = -f.sin_lambda * f.sin_phi;
    j[(4, 2)] = f.cos_lambda;

    Some(j)
}

/// Cartesian 6×6 covariance → curvilinear 5×5 covariance
pub fn to_curvilinear(momentum: &Vector3<f64>, covariance: &Matrix6<f64>) -> Option<Matrix5<f64>> {
    let j = cartesian_to_curvilinear_jacobian(momentum)?;
    let c = j * covariance * j.transpose();
    Some(0.5 * (c + c.transpose()))
}

/// Curvilinear 5×5 covariance → cartesian 6×6 covariance
pub fn to_cartesian(momentum: &Vector3<f64>, covariance: &Matrix5<f64>) -> Option<Matrix6<f64>> {
    let j = curvilinear_to_cartesian_jacobian(momentum)?;
    let c = j * covariance * j.transpose();
    Some(0.5 * (c + c.transpose()))
}

/// Projector onto the cartesian covariances representable in curvilinear form
///
/// `P·C·Pᵀ` removes the component of `C` along the track direction.
pub fn transverse_projector(momentum: &Vector3<f64>) -> Option<Matrix6<f64>> {
    let forward = curvilinear_to_cartesian_jacobian(momentum)?;
    let backward = cartesian_to_curvilinear_jacobian(momentum)?;
    Some(forward * backward)
}
