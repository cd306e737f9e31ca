//! Core numerical components
//!
//! - [`transform`] - Cartesian ↔ curvilinear covariance transforms
//! - [`kalman`] - Gain-matrix update of a trajectory with one hit

pub mod kalman;
pub mod transform;

pub use kalman::{KalmanUpdate, KalmanUpdater};
pub use transform::{to_cartesian, to_curvilinear};
