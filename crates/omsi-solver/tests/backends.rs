//! Integration tests for the solver backends.

use omsi_core::{Matrix, Real, Status, Vector};
use omsi_solver::{
    BackendSettings, LinearBackend, NewtonConfig, SolverError, SolverInstance, SolverKind,
    SolverResult, SolverState,
};
use proptest::prelude::*;

fn allocate(kind: SolverKind, n: usize) -> SolverInstance {
    SolverInstance::allocate(kind, n, &BackendSettings::default(), &NewtonConfig::default())
        .unwrap()
}

fn load(solver: &mut SolverInstance, a: &Matrix, b: &[Real]) {
    for col in 0..a.cols() {
        for row in 0..a.rows() {
            solver.set_matrix_element(row, col, a[(row, col)]).unwrap();
        }
    }
    for (i, v) in b.iter().enumerate() {
        solver.set_vector_element(i, *v).unwrap();
    }
}

#[test]
fn both_linear_backends_solve_the_two_by_two_case() {
    let a = Matrix::from_row_slice(2, 2, &[2.0, 3.0, 3.0, 0.5]).unwrap();
    for kind in [SolverKind::DenseDirect, SolverKind::TotalPivot] {
        let mut solver = allocate(kind, 2);
        load(&mut solver, &a, &[8.0, 4.0]);
        solver.mark_ready().unwrap();
        solver.solve().unwrap();

        let x = solver.solution().unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12, "{kind}: {x:?}");
        assert!((x[1] - 2.0).abs() < 1e-12, "{kind}: {x:?}");
        assert_eq!(solver.stats().solves, 1);
    }
}

#[test]
fn instance_is_reusable_after_success() {
    let mut solver = allocate(SolverKind::DenseDirect, 1);
    for rhs in [2.0, 4.0, 6.0] {
        solver.set_matrix_element(0, 0, 2.0).unwrap();
        solver.set_vector_element(0, rhs).unwrap();
        solver.mark_ready().unwrap();
        solver.solve().unwrap();
        assert_eq!(solver.solution().unwrap(), &[rhs / 2.0]);
        assert_eq!(solver.state(), SolverState::Ready);
    }
    assert_eq!(solver.stats().solves, 3);
}

#[test]
fn singular_dense_versus_total_pivot() {
    // consistent but rank deficient: dense fails, total pivot degrades gracefully
    let a = Matrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]).unwrap();

    let mut dense = allocate(SolverKind::DenseDirect, 2);
    load(&mut dense, &a, &[3.0, 6.0]);
    dense.mark_ready().unwrap();
    let err = dense.solve().unwrap_err();
    assert_eq!(err.status(), Status::Warning);

    let mut tp = allocate(SolverKind::TotalPivot, 2);
    load(&mut tp, &a, &[3.0, 6.0]);
    tp.mark_ready().unwrap();
    tp.solve().unwrap();
    let x = tp.solution().unwrap();
    assert!((x[0] + 2.0 * x[1] - 3.0).abs() < 1e-12);
}

/// Solves diagonal systems only; stands in for a host-supplied library.
struct DiagonalBackend {
    diag: Vec<Real>,
    rhs: Vec<Real>,
    x: Vec<Real>,
}

impl LinearBackend for DiagonalBackend {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn prepare(&mut self, n: usize) -> SolverResult<()> {
        self.diag = vec![0.0; n];
        self.rhs = vec![0.0; n];
        self.x = vec![0.0; n];
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.diag.len()
    }

    fn set_matrix_element(&mut self, row: usize, col: usize, value: Real) -> SolverResult<()> {
        if row == col {
            self.diag[row] = value;
        }
        Ok(())
    }

    fn get_matrix_element(&self, row: usize, col: usize) -> SolverResult<Real> {
        Ok(if row == col { self.diag[row] } else { 0.0 })
    }

    fn set_vector_element(&mut self, index: usize, value: Real) -> SolverResult<()> {
        self.rhs[index] = value;
        Ok(())
    }

    fn get_vector_element(&self, index: usize) -> SolverResult<Real> {
        Ok(self.x[index])
    }

    fn solve(&mut self) -> SolverResult<()> {
        for i in 0..self.diag.len() {
            if self.diag[i] == 0.0 {
                return Err(SolverError::Singular { pivot: i + 1 });
            }
            self.x[i] = self.rhs[i] / self.diag[i];
        }
        Ok(())
    }

    fn solution(&self) -> &[Real] {
        &self.x
    }
}

#[test]
fn external_backend_follows_the_same_lifecycle() {
    let backend = DiagonalBackend {
        diag: Vec::new(),
        rhs: Vec::new(),
        x: Vec::new(),
    };
    let mut solver = SolverInstance::allocate_external(Box::new(backend), 2).unwrap();
    assert_eq!(solver.kind(), SolverKind::External);
    assert_eq!(solver.name(), "diagonal");
    assert!(solver.solve().is_err());

    load(&mut solver, &Matrix::identity(2), &[3.0, 4.0]);
    solver.mark_ready().unwrap();
    solver.solve().unwrap();
    assert_eq!(solver.solution().unwrap(), &[3.0, 4.0]);

    solver.free();
    assert_eq!(solver.state(), SolverState::Uninitialized);
}

fn diagonally_dominant(n: usize, entries: &[Real]) -> Matrix {
    let mut a = Matrix::from_column_slice(n, n, &entries[..n * n]).unwrap();
    for i in 0..n {
        let row_sum: Real = (0..n).map(|j| a[(i, j)].abs()).sum();
        a[(i, i)] = row_sum + 1.0;
    }
    a
}

proptest! {
    #[test]
    fn direct_solve_residual_is_small(
        n in 1_usize..6,
        entries in prop::collection::vec(-10.0_f64..10.0, 36),
        rhs in prop::collection::vec(-100.0_f64..100.0, 6),
    ) {
        let a = diagonally_dominant(n, &entries);
        let b = &rhs[..n];

        let mut solver = allocate(SolverKind::DenseDirect, n);
        load(&mut solver, &a, b);
        solver.mark_ready().unwrap();
        solver.solve().unwrap();

        let x = Vector::from_slice(solver.solution().unwrap());
        let mut r = a.mul_vector(&x).unwrap();
        r.sub_vector(&Vector::from_slice(b)).unwrap();
        prop_assert!(r.norm() < 1e-4);
    }

    #[test]
    fn total_pivot_never_returns_non_finite_values(
        n in 1_usize..5,
        entries in prop::collection::vec(-5.0_f64..5.0, 25),
        rhs in prop::collection::vec(-5.0_f64..5.0, 5),
        dup in any::<bool>(),
    ) {
        let mut a = Matrix::from_column_slice(n, n, &entries[..n * n]).unwrap();
        let mut b = rhs[..n].to_vec();
        if dup && n > 1 {
            // make the last row a copy of the first: rank deficient
            for j in 0..n {
                a[(n - 1, j)] = a[(0, j)];
            }
            b[n - 1] = b[0];
        }

        let mut solver = allocate(SolverKind::TotalPivot, n);
        load(&mut solver, &a, &b);
        solver.mark_ready().unwrap();
        match solver.solve() {
            Ok(()) => {
                let x = solver.solution().unwrap();
                prop_assert!(x.iter().all(|v| v.is_finite()));
            }
            Err(e) => prop_assert_eq!(e.status(), Status::Warning),
        }
    }
}
