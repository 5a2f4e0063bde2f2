//! Backend capability interface and lifecycle states.

use core::fmt;
use omsi_core::Real;

use crate::error::SolverResult;

/// Solver family selected once per algebraic system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum SolverKind {
    /// LU factorization with partial pivoting.
    DenseDirect,
    /// Gauss elimination with total pivot search; tolerates rank deficiency.
    TotalPivot,
    /// Damped Newton iteration over a linear correction solve.
    Newton,
    /// Linear backend supplied by the host application.
    External,
}

impl SolverKind {
    pub fn name(self) -> &'static str {
        match self {
            SolverKind::DenseDirect => "dense-direct",
            SolverKind::TotalPivot => "total-pivot",
            SolverKind::Newton => "newton",
            SolverKind::External => "external",
        }
    }

    pub fn is_linear(self) -> bool {
        !matches!(self, SolverKind::Newton)
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of a solver instance.
///
/// `Uninitialized -> Initialized` (allocate / prepare) `-> Ready` (data loaded)
/// `-> Ready | Error` (after a solve).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SolverState {
    Uninitialized,
    Initialized,
    Ready,
    Error,
}

impl fmt::Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolverState::Uninitialized => "uninitialized",
            SolverState::Initialized => "initialized",
            SolverState::Ready => "ready",
            SolverState::Error => "error",
        };
        f.write_str(s)
    }
}

/// A linear solver for `A x = b`.
///
/// Matrix and vector elements are written one at a time. The vector holds the
/// right-hand side before `solve` and the solution after a successful `solve`.
pub trait LinearBackend {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Size all internal buffers for an `n x n` problem and clear them.
    fn prepare(&mut self, n: usize) -> SolverResult<()>;

    fn dimension(&self) -> usize;

    fn set_matrix_element(&mut self, row: usize, col: usize, value: Real) -> SolverResult<()>;

    fn get_matrix_element(&self, row: usize, col: usize) -> SolverResult<Real>;

    fn set_vector_element(&mut self, index: usize, value: Real) -> SolverResult<()>;

    fn get_vector_element(&self, index: usize) -> SolverResult<Real>;

    /// Solve and verify the result; on error the solution must not be used.
    fn solve(&mut self) -> SolverResult<()>;

    /// Solution of the last successful solve.
    fn solution(&self) -> &[Real];
}
