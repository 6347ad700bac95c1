//! Error types for ddpv.

use crate::numerics::block::LinearSolveError;
use crate::numerics::newton::SolverDivergence;
use thiserror::Error;

/// Structural problems with a device description. Detected before any solve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("grid needs at least 2 nodes, got {0}")]
    TooFewNodes(usize),

    #[error("grid is not strictly increasing at node {index}")]
    GridNotIncreasing { index: usize },

    #[error("grid position at node {index} is not finite")]
    NonFiniteGrid { index: usize },

    #[error("array `{field}` has length {actual}, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("`{field}` must be positive, found {value} at node {index}")]
    NonPositive {
        field: &'static str,
        index: usize,
        value: f64,
    },

    #[error("`{field}` is not finite at node {index}")]
    NonFinite { field: &'static str, index: usize },

    #[error("recombination velocity `{field}` must be non-negative, found {value}")]
    NegativeVelocity { field: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid device description: {0}")]
    InvalidDeviceDescription(#[from] DeviceError),

    #[error(transparent)]
    Divergence(#[from] SolverDivergence),

    /// Factoring a converged Jacobian failed while differentiating the sweep.
    #[error("sensitivity solve failed: {0}")]
    LinearSolve(#[from] LinearSolveError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
