//! Error types for solver operations.

use omsi_core::{OmsiError, Status};
use thiserror::Error;

use crate::backend::{SolverKind, SolverState};

/// Errors that can occur while setting up or running a solver backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Solver not ready (state: {state})")]
    NotReady { state: SolverState },

    #[error("Solver {kind} cannot {what}")]
    WrongFamily { kind: SolverKind, what: &'static str },

    #[error("Problem setup error: {what}")]
    ProblemSetup { what: String },

    /// The LU routine rejected argument number `arg` (1-based).
    #[error("Illegal value in argument {arg} of LU solve")]
    IllegalArgument { arg: i32 },

    /// `U[pivot, pivot]` is exactly zero (1-based like the LU status code).
    #[error("Singular matrix: U({pivot},{pivot}) is exactly zero")]
    Singular { pivot: usize },

    #[error("Under-determined linear system not solvable (rank {rank} of {n})")]
    Underdetermined { rank: usize, n: usize },

    #[error("Residual norm {norm:e} exceeds tolerance {tol:e}")]
    ResidualTooLarge { norm: f64, tol: f64 },

    #[error("Convergence failed: {what}")]
    ConvergenceFailed { what: String },

    #[error("Maximum iterations {iterations} reached, residual = {residual:e}")]
    MaxIterations { iterations: usize, residual: f64 },

    #[error("Numeric error: {0}")]
    Numeric(#[from] OmsiError),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    /// Severity in the ok / warning / fatal taxonomy.
    ///
    /// Numerical rejections are recoverable; lifecycle and argument errors are not.
    pub fn status(&self) -> Status {
        match self {
            SolverError::NotReady { .. }
            | SolverError::WrongFamily { .. }
            | SolverError::ProblemSetup { .. }
            | SolverError::IllegalArgument { .. } => Status::Fatal,
            SolverError::Singular { .. }
            | SolverError::Underdetermined { .. }
            | SolverError::ResidualTooLarge { .. }
            | SolverError::ConvergenceFailed { .. }
            | SolverError::MaxIterations { .. } => Status::Warning,
            SolverError::Numeric(e) => e.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numerical_failures_are_warnings() {
        assert_eq!(SolverError::Singular { pivot: 2 }.status(), Status::Warning);
        assert_eq!(
            SolverError::ResidualTooLarge { norm: 1.0, tol: 1e-4 }.status(),
            Status::Warning
        );
        assert_eq!(
            SolverError::Numeric(OmsiError::NonFinite {
                what: "x",
                value: f64::NAN
            })
            .status(),
            Status::Warning
        );
    }

    #[test]
    fn lifecycle_failures_are_fatal() {
        let e = SolverError::NotReady {
            state: SolverState::Initialized,
        };
        assert_eq!(e.status(), Status::Fatal);
        assert!(e.to_string().contains("initialized"));
        assert_eq!(SolverError::IllegalArgument { arg: 4 }.status(), Status::Fatal);
    }
}
