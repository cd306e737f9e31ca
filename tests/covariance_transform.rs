//! Cartesian ↔ curvilinear covariance transforms
//!
//! The two maps are mutual inverses on curvilinear covariances, and on
//! cartesian covariances once the component along the track is projected
//! out.

mod helpers;

use helpers::assertions::{assert_matrix5_close, assert_matrix6_close};
use muid_swim_rs::components::transform::{
    cartesian_to_curvilinear_jacobian, curvilinear_to_cartesian_jacobian, transverse_projector,
};
use muid_swim_rs::components::{to_cartesian, to_curvilinear};
use nalgebra::{Matrix5, Matrix6, Vector3};
use proptest::prelude::*;

fn momentum(p: f64, lambda: f64, phi: f64) -> Vector3<f64> {
    Vector3::new(
        p * lambda.cos() * phi.cos(),
        p * lambda.cos() * phi.sin(),
        p * lambda.sin(),
    )
}

prop_compose! {
    fn curvilinear_covariance()(entries in prop::collection::vec(-1.0f64..1.0, 25)) -> Matrix5<f64> {
        let a = Matrix5::from_iterator(entries);
        a * a.transpose() + Matrix5::identity() * 1e-3
    }
}

prop_compose! {
    fn cartesian_covariance()(entries in prop::collection::vec(-1.0f64..1.0, 36)) -> Matrix6<f64> {
        let a = Matrix6::from_iterator(entries);
        a * a.transpose() + Matrix6::identity() * 1e-3
    }
}

proptest! {
    #[test]
    fn curvilinear_round_trip(
        p in 0.2f64..5.0,
        lambda in -1.2f64..1.2,
        phi in -3.1f64..3.1,
        cov in curvilinear_covariance(),
    ) {
        let mom = momentum(p, lambda, phi);
        let cartesian = to_cartesian(&mom, &cov).unwrap();
        let back = to_curvilinear(&mom, &cartesian).unwrap();
        assert_matrix5_close(&back, &cov, 1e-9, "curvilinear → cartesian → curvilinear");
    }

    #[test]
    fn cartesian_round_trip_on_transverse_subspace(
        p in 0.2f64..5.0,
        lambda in -1.2f64..1.2,
        phi in -3.1f64..3.1,
        cov in cartesian_covariance(),
    ) {
        let mom = momentum(p, lambda, phi);
        let projector = transverse_projector(&mom).unwrap();
        let transverse = projector * cov * projector.transpose();
        let back = to_cartesian(&mom, &to_curvilinear(&mom, &transverse).unwrap()).unwrap();
        assert_matrix6_close(&back, &transverse, 1e-9, "projected cartesian round trip");
    }

    #[test]
    fn jacobians_are_left_inverses(
        p in 0.2f64..5.0,
        lambda in -1.2f64..1.2,
        phi in -3.1f64..3.1,
    ) {
        let mom = momentum(p, lambda, phi);
        let forward = curvilinear_to_cartesian_jacobian(&mom).unwrap();
        let backward = cartesian_to_curvilinear_jacobian(&mom).unwrap();
        assert_matrix5_close(&(backward * forward), &Matrix5::identity(), 1e-12, "J56·J65");
    }
}

#[test]
fn test_transform_undefined_along_the_axis() {
    let cov = Matrix5::identity();
    assert!(to_cartesian(&Vector3::new(0.0, 0.0, 1.0), &cov).is_none());
    assert!(to_curvilinear(&Vector3::zeros(), &Matrix6::identity()).is_none());
}
