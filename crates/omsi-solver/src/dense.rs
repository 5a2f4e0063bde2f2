//! Dense direct solve: LU with partial pivoting plus residual verification.

use omsi_core::{Matrix, Real, Vector, residual_accepted};
use tracing::{debug, warn};

use crate::backend::LinearBackend;
use crate::error::{SolverError, SolverResult};
use crate::lapack::dgesv;
use crate::settings::BackendSettings;

/// `dgesv`-equivalent backend.
///
/// The factorization works on copies so the loaded `A` and `b` survive for
/// the independent residual check `||A x - b||_2 < residual_tolerance`.
#[derive(Clone, Debug)]
pub struct DenseDirect {
    n: usize,
    a: Matrix,
    b: Vector,
    lu: Matrix,
    x: Vector,
    pivots: Vec<usize>,
    residual_tolerance: Real,
    solved: bool,
}

impl DenseDirect {
    pub fn new(n: usize, settings: &BackendSettings) -> Self {
        Self {
            n,
            a: Matrix::zeros(n, n),
            b: Vector::zeros(n),
            lu: Matrix::zeros(n, n),
            x: Vector::zeros(n),
            pivots: vec![0; n],
            residual_tolerance: settings.residual_tolerance,
            solved: false,
        }
    }

    pub fn set_residual_tolerance(&mut self, tol: Real) {
        self.residual_tolerance = tol;
    }

    /// Row order of `P A` from the last factorization (0-based).
    pub fn pivots(&self) -> &[usize] {
        &self.pivots
    }

    /// Load a whole system at once.
    pub fn load(&mut self, a: &Matrix, b: &Vector) -> SolverResult<()> {
        self.a.copy_from(a)?;
        self.b.copy_from(b)?;
        self.solved = false;
        Ok(())
    }

    /// `||A x - b||_2` against the loaded (unfactored) system.
    pub fn residual_norm(&self, x: &Vector) -> SolverResult<Real> {
        let mut r = self.a.mul_vector(x)?;
        r.sub_vector(&self.b)?;
        Ok(r.norm())
    }
}

impl LinearBackend for DenseDirect {
    fn name(&self) -> &'static str {
        "dense-direct"
    }

    fn prepare(&mut self, n: usize) -> SolverResult<()> {
        if n != self.n {
            self.a = Matrix::zeros(n, n);
            self.b = Vector::zeros(n);
            self.lu = Matrix::zeros(n, n);
            self.x = Vector::zeros(n);
            self.pivots = vec![0; n];
            self.n = n;
        } else {
            self.a.fill(0.0);
            self.b.fill(0.0);
            self.x.fill(0.0);
        }
        self.solved = false;
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.n
    }

    fn set_matrix_element(&mut self, row: usize, col: usize, value: Real) -> SolverResult<()> {
        Ok(self.a.set(row, col, value)?)
    }

    fn get_matrix_element(&self, row: usize, col: usize) -> SolverResult<Real> {
        Ok(self.a.get(row, col)?)
    }

    fn set_vector_element(&mut self, index: usize, value: Real) -> SolverResult<()> {
        self.solved = false;
        Ok(self.b.set(index, value)?)
    }

    fn get_vector_element(&self, index: usize) -> SolverResult<Real> {
        if self.solved {
            Ok(self.x.get(index)?)
        } else {
            Ok(self.b.get(index)?)
        }
    }

    fn solve(&mut self) -> SolverResult<()> {
        let n = self.n;
        self.solved = false;
        self.lu.copy_from(&self.a)?;
        let mut rhs = self.b.clone();

        let info = dgesv(
            n,
            1,
            self.lu.as_mut_slice(),
            n,
            &mut self.pivots,
            rhs.as_mut_slice(),
            n,
        );
        if info < 0 {
            return Err(SolverError::IllegalArgument { arg: -info });
        }
        if info > 0 {
            warn!(pivot = info, "dense solve: matrix is singular");
            return Err(SolverError::Singular {
                pivot: info as usize,
            });
        }

        let norm = self.residual_norm(&rhs)?;
        if !residual_accepted(norm, self.residual_tolerance) {
            warn!(
                residual = norm,
                tolerance = self.residual_tolerance,
                "dense solve: residual check failed"
            );
            return Err(SolverError::ResidualTooLarge {
                norm,
                tol: self.residual_tolerance,
            });
        }
        debug!(n, residual = norm, "dense solve succeeded");

        self.x = rhs;
        self.solved = true;
        Ok(())
    }

    fn solution(&self) -> &[Real] {
        self.x.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> DenseDirect {
        let mut solver = DenseDirect::new(2, &BackendSettings::default());
        let a = Matrix::from_row_slice(2, 2, &[2.0, 3.0, 3.0, 0.5]).unwrap();
        let b = Vector::from_slice(&[8.0, 4.0]);
        solver.load(&a, &b).unwrap();
        solver
    }

    #[test]
    fn solves_and_keeps_original_system() {
        let mut solver = two_by_two();
        solver.solve().unwrap();
        let x = solver.solution();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
        // originals are not overwritten by the factorization
        assert_eq!(solver.get_matrix_element(1, 1).unwrap(), 0.5);
        assert_eq!(solver.get_vector_element(1).unwrap(), x[1]);
    }

    #[test]
    fn singular_matrix_is_reported() {
        let mut solver = DenseDirect::new(2, &BackendSettings::default());
        for (r, c, v) in [(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 4.0)] {
            solver.set_matrix_element(r, c, v).unwrap();
        }
        let err = solver.solve().unwrap_err();
        assert_eq!(err, SolverError::Singular { pivot: 2 });
        assert_eq!(solver.solution(), &[0.0, 0.0]);
    }

    #[test]
    fn nan_input_fails_residual_check() {
        let mut solver = two_by_two();
        solver.set_vector_element(0, Real::NAN).unwrap();
        assert!(matches!(
            solver.solve(),
            Err(SolverError::ResidualTooLarge { .. })
        ));
    }

    #[test]
    fn prepare_resizes_and_clears() {
        let mut solver = two_by_two();
        solver.prepare(3).unwrap();
        assert_eq!(solver.dimension(), 3);
        assert_eq!(solver.get_matrix_element(2, 2).unwrap(), 0.0);
        assert!(solver.set_matrix_element(3, 0, 1.0).is_err());
    }
}
