//! Error types for algebraic-system evaluation.

use omsi_core::{OmsiError, Real, Status};
use omsi_solver::SolverError;
use omsi_values::ValuesError;
use thiserror::Error;

/// Errors raised while setting up or evaluating an algebraic system.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SystemError {
    #[error("Variable access error: {0}")]
    Values(#[from] ValuesError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Numeric error: {0}")]
    Numeric(#[from] OmsiError),

    /// Raised by an equation callback.
    #[error("Evaluation failed ({status}): {what}")]
    Evaluation { what: String, status: Status },

    #[error("Residual norm {norm:e} of committed solution exceeds {tol:e}")]
    ResidualCheck { norm: Real, tol: Real },

    #[error("Algebraic system {system} has no solver")]
    SolverNotSet { system: usize },

    #[error("Nested algebraic system {system} failed ({status})")]
    Nested { system: usize, status: Status },

    #[error("Layout error: {what}")]
    Layout { what: String },
}

pub type SystemResult<T> = Result<T, SystemError>;

impl SystemError {
    /// Recoverable failure reported by generated equation code.
    pub fn warning(what: impl Into<String>) -> Self {
        SystemError::Evaluation {
            what: what.into(),
            status: Status::Warning,
        }
    }

    /// Unrecoverable failure reported by generated equation code.
    pub fn fatal(what: impl Into<String>) -> Self {
        SystemError::Evaluation {
            what: what.into(),
            status: Status::Fatal,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            SystemError::Values(e) => e.status(),
            SystemError::Solver(e) => e.status(),
            SystemError::Numeric(e) => e.status(),
            SystemError::Evaluation { status, .. } | SystemError::Nested { status, .. } => {
                *status
            }
            SystemError::ResidualCheck { .. } => Status::Warning,
            SystemError::SolverNotSet { .. } | SystemError::Layout { .. } => Status::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_passes_through_lower_layers() {
        let e: SystemError = SolverError::Singular { pivot: 1 }.into();
        assert_eq!(e.status(), Status::Warning);

        let e: SystemError = ValuesError::UnknownType { position: 0 }.into();
        assert_eq!(e.status(), Status::Fatal);

        assert_eq!(SystemError::fatal("boom").status(), Status::Fatal);
        assert_eq!(
            SystemError::ResidualCheck { norm: 1.0, tol: 1e-8 }.status(),
            Status::Warning
        );
    }
}
