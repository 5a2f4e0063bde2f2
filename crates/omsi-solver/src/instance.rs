//! Solver instance: lifecycle state machine plus backend dispatch.

use omsi_core::Real;
use tracing::debug;

use crate::backend::{LinearBackend, SolverKind, SolverState};
use crate::dense::DenseDirect;
use crate::error::{SolverError, SolverResult};
use crate::newton::{Newton, NewtonConfig, NewtonReport, NonlinearProblem};
use crate::settings::BackendSettings;
use crate::total_pivot::TotalPivot;

/// Counters accumulated over the lifetime of an instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverStats {
    pub solves: usize,
    pub failures: usize,
    pub iterations: usize,
    pub jacobian_evaluations: usize,
}

enum Backend {
    Dense(DenseDirect),
    TotalPivot(TotalPivot),
    Newton(Newton),
    External(Box<dyn LinearBackend>),
}

/// One algebraic system's solver.
///
/// Not thread-safe; each loop owns its own instance.
pub struct SolverInstance {
    kind: SolverKind,
    state: SolverState,
    n: usize,
    backend: Option<Backend>,
    stats: SolverStats,
}

impl SolverInstance {
    /// Allocate a built-in backend for an `n x n` problem.
    pub fn allocate(
        kind: SolverKind,
        n: usize,
        settings: &BackendSettings,
        newton: &NewtonConfig,
    ) -> SolverResult<Self> {
        let backend = match kind {
            SolverKind::DenseDirect => Backend::Dense(DenseDirect::new(n, settings)),
            SolverKind::TotalPivot => Backend::TotalPivot(TotalPivot::new(n, settings)),
            SolverKind::Newton => Backend::Newton(Newton::new(n, newton.clone(), settings)),
            SolverKind::External => {
                return Err(SolverError::ProblemSetup {
                    what: "external backends are allocated with allocate_external".to_string(),
                });
            }
        };
        debug!(solver = kind.name(), n, "allocated solver");
        Ok(Self {
            kind,
            state: SolverState::Initialized,
            n,
            backend: Some(backend),
            stats: SolverStats::default(),
        })
    }

    /// Wrap a host-supplied linear backend.
    pub fn allocate_external(mut backend: Box<dyn LinearBackend>, n: usize) -> SolverResult<Self> {
        backend.prepare(n)?;
        debug!(solver = backend.name(), n, "allocated external solver");
        Ok(Self {
            kind: SolverKind::External,
            state: SolverState::Initialized,
            n,
            backend: Some(Backend::External(backend)),
            stats: SolverStats::default(),
        })
    }

    pub fn kind(&self) -> SolverKind {
        self.kind
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    pub fn is_linear(&self) -> bool {
        self.kind.is_linear()
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    pub fn name(&self) -> &'static str {
        match &self.backend {
            Some(Backend::External(b)) => b.name(),
            _ => self.kind.name(),
        }
    }

    /// Size the backend buffers for `n` and clear them.
    pub fn prepare(&mut self, n: usize) -> SolverResult<()> {
        let backend = self.backend.as_mut().ok_or(SolverError::NotReady {
            state: SolverState::Uninitialized,
        })?;
        match backend {
            Backend::Dense(b) => b.prepare(n)?,
            Backend::TotalPivot(b) => b.prepare(n)?,
            Backend::Newton(b) => b.prepare(n)?,
            Backend::External(b) => b.prepare(n)?,
        }
        self.n = n;
        self.state = SolverState::Initialized;
        Ok(())
    }

    /// Return an instance in the error state to `Initialized`.
    pub fn recover(&mut self) -> SolverResult<()> {
        if self.state == SolverState::Error {
            debug!(solver = self.name(), "resetting solver after failure");
            self.prepare(self.n)?;
        }
        Ok(())
    }

    pub fn set_matrix_element(&mut self, row: usize, col: usize, value: Real) -> SolverResult<()> {
        match self.loaded_backend()? {
            Backend::Dense(b) => b.set_matrix_element(row, col, value),
            Backend::TotalPivot(b) => b.set_matrix_element(row, col, value),
            Backend::Newton(b) => b.set_matrix_element(row, col, value),
            Backend::External(b) => b.set_matrix_element(row, col, value),
        }
    }

    pub fn get_matrix_element(&self, row: usize, col: usize) -> SolverResult<Real> {
        match self.backend_ref()? {
            Backend::Dense(b) => b.get_matrix_element(row, col),
            Backend::TotalPivot(b) => b.get_matrix_element(row, col),
            Backend::Newton(b) => b.get_matrix_element(row, col),
            Backend::External(b) => b.get_matrix_element(row, col),
        }
    }

    /// Right-hand side entry for linear backends, start value for Newton.
    pub fn set_vector_element(&mut self, index: usize, value: Real) -> SolverResult<()> {
        match self.loaded_backend()? {
            Backend::Dense(b) => b.set_vector_element(index, value),
            Backend::TotalPivot(b) => b.set_vector_element(index, value),
            Backend::Newton(b) => b.set_vector_element(index, value),
            Backend::External(b) => b.set_vector_element(index, value),
        }
    }

    pub fn get_vector_element(&self, index: usize) -> SolverResult<Real> {
        match self.backend_ref()? {
            Backend::Dense(b) => b.get_vector_element(index),
            Backend::TotalPivot(b) => b.get_vector_element(index),
            Backend::Newton(b) => b.get_vector_element(index),
            Backend::External(b) => b.get_vector_element(index),
        }
    }

    /// Declare that all data is loaded.
    pub fn mark_ready(&mut self) -> SolverResult<()> {
        match self.state {
            SolverState::Initialized | SolverState::Ready => {
                self.state = SolverState::Ready;
                Ok(())
            }
            state => Err(SolverError::NotReady { state }),
        }
    }

    /// Solve the loaded linear system.
    pub fn solve(&mut self) -> SolverResult<()> {
        if self.state != SolverState::Ready {
            return Err(SolverError::NotReady { state: self.state });
        }
        let kind = self.kind;
        let result = match self.backend.as_mut() {
            Some(Backend::Dense(b)) => b.solve(),
            Some(Backend::TotalPivot(b)) => b.solve(),
            Some(Backend::External(b)) => b.solve(),
            Some(Backend::Newton(_)) => {
                return Err(SolverError::WrongFamily {
                    kind,
                    what: "solve a linear system",
                });
            }
            None => {
                return Err(SolverError::NotReady {
                    state: SolverState::Uninitialized,
                });
            }
        };
        self.record(result.is_ok());
        result
    }

    /// Run the Newton iteration from the loaded start value.
    pub fn solve_nonlinear<P: NonlinearProblem>(
        &mut self,
        problem: &mut P,
    ) -> Result<NewtonReport, P::Error> {
        if self.state != SolverState::Ready {
            return Err(SolverError::NotReady { state: self.state }.into());
        }
        let kind = self.kind;
        let Some(Backend::Newton(newton)) = self.backend.as_mut() else {
            return Err(SolverError::WrongFamily {
                kind,
                what: "solve a nonlinear system",
            }
            .into());
        };
        let result = newton.solve_with(problem);
        if let Ok(report) = &result {
            self.stats.iterations += report.iterations;
            self.stats.jacobian_evaluations += report.jacobian_evaluations;
        }
        self.record(result.is_ok());
        result
    }

    /// Solution of the last successful solve.
    pub fn solution(&self) -> SolverResult<&[Real]> {
        if self.state != SolverState::Ready {
            return Err(SolverError::NotReady { state: self.state });
        }
        Ok(match self.backend_ref()? {
            Backend::Dense(b) => b.solution(),
            Backend::TotalPivot(b) => b.solution(),
            Backend::Newton(b) => b.solution(),
            Backend::External(b) => b.solution(),
        })
    }

    /// Release the backend data; the instance returns to `Uninitialized`.
    pub fn free(&mut self) {
        if self.backend.take().is_some() {
            debug!(solver = self.kind.name(), n = self.n, "freed solver");
        }
        self.state = SolverState::Uninitialized;
    }

    fn record(&mut self, ok: bool) {
        self.stats.solves += 1;
        if ok {
            self.state = SolverState::Ready;
        } else {
            self.stats.failures += 1;
            self.state = SolverState::Error;
        }
    }

    fn backend_ref(&self) -> SolverResult<&Backend> {
        self.backend.as_ref().ok_or(SolverError::NotReady {
            state: SolverState::Uninitialized,
        })
    }

    fn loaded_backend(&mut self) -> SolverResult<&mut Backend> {
        if self.state == SolverState::Error {
            return Err(SolverError::NotReady { state: self.state });
        }
        self.backend.as_mut().ok_or(SolverError::NotReady {
            state: SolverState::Uninitialized,
        })
    }
}

impl core::fmt::Debug for SolverInstance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SolverInstance")
            .field("solver", &self.name())
            .field("state", &self.state)
            .field("n", &self.n)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(n: usize) -> SolverInstance {
        SolverInstance::allocate(
            SolverKind::DenseDirect,
            n,
            &BackendSettings::default(),
            &NewtonConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn solve_requires_ready() {
        let mut s = dense(1);
        assert_eq!(s.state(), SolverState::Initialized);
        assert_eq!(
            s.solve().unwrap_err(),
            SolverError::NotReady {
                state: SolverState::Initialized
            }
        );
        s.set_matrix_element(0, 0, 4.0).unwrap();
        s.set_vector_element(0, 2.0).unwrap();
        s.mark_ready().unwrap();
        s.solve().unwrap();
        assert_eq!(s.solution().unwrap(), &[0.5]);
        assert_eq!(s.state(), SolverState::Ready);
    }

    #[test]
    fn failure_moves_to_error_until_recovered() {
        let mut s = dense(1);
        s.mark_ready().unwrap();
        assert!(matches!(s.solve(), Err(SolverError::Singular { .. })));
        assert_eq!(s.state(), SolverState::Error);
        assert!(s.mark_ready().is_err());
        assert!(s.set_matrix_element(0, 0, 1.0).is_err());
        assert!(s.solution().is_err());

        s.recover().unwrap();
        assert_eq!(s.state(), SolverState::Initialized);
        assert_eq!(s.stats().failures, 1);
    }

    #[test]
    fn free_returns_to_uninitialized() {
        let mut s = dense(2);
        s.free();
        assert_eq!(s.state(), SolverState::Uninitialized);
        assert!(s.mark_ready().is_err());
        assert!(s.prepare(2).is_err());
    }

    #[test]
    fn external_kind_needs_a_backend() {
        let err = SolverInstance::allocate(
            SolverKind::External,
            2,
            &BackendSettings::default(),
            &NewtonConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.status(), omsi_core::Status::Fatal);
    }

    #[test]
    fn newton_cannot_do_linear_solve() {
        let mut s = SolverInstance::allocate(
            SolverKind::Newton,
            1,
            &BackendSettings::default(),
            &NewtonConfig::default(),
        )
        .unwrap();
        s.mark_ready().unwrap();
        assert!(matches!(s.solve(), Err(SolverError::WrongFamily { .. })));
    }
}
