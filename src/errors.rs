//! Error types for swims and their collaborators
//!
//! The first four variants form the degradation taxonomy of a swim. Only
//! [`SwimError::PropagationFailure`] ends a swim early; the other three are
//! absorbed by the engine and turned into reduced bookkeeping.

use thiserror::Error;

use crate::types::StructuralAddress;

/// Errors that can occur while extrapolating, matching or scoring
#[derive(Debug, Error)]
pub enum SwimError {
    /// The stepper cannot continue (non-finite state, integrator failure)
    #[error("propagation failed: {reason}")]
    PropagationFailure {
        /// Description of the failure
        reason: String,
    },

    /// A crossing point could not be resolved to a structural address
    #[error("no structural address for point ({x:.3}, {y:.3}, {z:.3})")]
    GeometryLookupMiss {
        /// Point coordinates (cm)
        x: f64,
        /// Point coordinates (cm)
        y: f64,
        /// Point coordinates (cm)
        z: f64,
    },

    /// No candidate measurement passed the gate
    #[error("no measurement within gate at {address}")]
    UnmatchedMeasurement {
        /// Address of the crossed layer
        address: StructuralAddress,
    },

    /// Matrix inversion or frame construction failed in the Kalman update
    #[error("degenerate update: {context}")]
    DegenerateUpdate {
        /// Which step of the update failed
        context: String,
    },

    /// Invalid configuration value
    #[error("configuration error: {description}")]
    Configuration {
        /// Description of the configuration issue
        description: String,
    },

    /// Malformed JSON (configuration, geometry or PDF tables)
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read a configuration or table file
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl SwimError {
    /// Shorthand for a configuration error
    pub fn configuration(description: impl Into<String>) -> Self {
        SwimError::Configuration {
            description: description.into(),
        }
    }

    /// Shorthand for a degenerate update
    pub fn degenerate(context: impl Into<String>) -> Self {
        SwimError::DegenerateUpdate {
            context: context.into(),
        }
    }

    /// Whether this error ends the swim that raised it
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwimError::PropagationFailure { .. })
    }
}
