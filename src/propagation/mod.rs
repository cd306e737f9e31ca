//! Trajectory propagation
//!
//! The swim advances its state through a [`Stepper`]. The stepper owns the
//! physics (field, energy loss, scattering); the swim only needs to know how
//! far it went and whether it landed on a structural boundary.
//!
//! - [`straight`] - Field-free reference stepper

pub mod straight;

use serde::Serialize;

use crate::errors::SwimError;
use crate::state::TrajectoryState;

pub use straight::{StepperConfig, StraightLineStepper};

/// Outcome of one successful step
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepReport {
    /// Distance travelled (cm)
    pub step_length: f64,
    /// Whether the step ended on a structural boundary
    pub boundary_crossed: bool,
}

/// Advances a trajectory state by one bounded step
pub trait Stepper: Send + Sync {
    /// Move `state` in place
    ///
    /// Returns [`SwimError::PropagationFailure`] when the state cannot be
    /// advanced. The swim ends at the first failure.
    fn step(&self, state: &mut TrajectoryState) -> Result<StepReport, SwimError>;
}
