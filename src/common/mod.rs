//! Common utilities shared by the swim components.
//!
//! Numerical constants of the bookkeeping format and small fixed-size linear
//! algebra helpers.

pub mod constants;
pub mod linalg;
