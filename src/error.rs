//! Error types for the fleet planner
//!
//! Only malformed caller input and genuine internal-invariant breaks use
//! `Error`. Infeasibility that the spec treats as *data* (an unschedulable
//! task, a node that cannot be re-placed) is reported on the result values
//! themselves (`valid: false`, `failed_tasks: [...]`), not through `Result::Err`.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or solving a fleet plan
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Input referenced a task, node, or dependency endpoint that was never
    /// declared (unknown id in an assignment or dependency list)
    #[error("structural error: {0}")]
    Structural(String),

    /// Dependency graph contains a cycle
    #[error("dependency cycle detected: {0}")]
    CycleDetected(String),

    /// Problem has no feasible solution given the stated constraints
    #[error("infeasible: {0}")]
    Infeasible(String),

    /// Invalid input data (negative capacity, malformed matrix, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Dimension mismatch in input (e.g. cost matrix row/column counts)
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        got: usize,
    },

    /// A solver-internal invariant was violated; indicates a bug rather than
    /// a property of the input (broken flow conservation, envelope underflow)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a structural error
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    /// Create a cycle-detected error
    pub fn cycle_detected(msg: impl Into<String>) -> Self {
        Self::CycleDetected(msg.into())
    }

    /// Create an infeasible error
    pub fn infeasible(msg: impl Into<String>) -> Self {
        Self::Infeasible(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
