//! Gauss elimination with total pivot search.
//!
//! Works on the augmented matrix `[A | -b]` and records row and column
//! permutations in index arrays instead of moving data. Rows past the
//! numerical rank are accepted when their constant is negligible; the
//! matching unknowns are set to zero.

use omsi_core::{Matrix, Real, Vector, residual_accepted};
use tracing::{debug, warn};

use crate::backend::LinearBackend;
use crate::error::{SolverError, SolverResult};
use crate::settings::BackendSettings;

/// Result of [`solve_total_pivot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TotalPivotOutcome {
    /// `0` on success, `-1` when an under-determined row is inconsistent.
    pub status: i32,
    /// Numerical rank detected during elimination.
    pub rank: usize,
}

/// Solve `A x + c = 0` given `aug = [A | c]` of shape `n x (n + 1)`.
///
/// `aug` is overwritten by the elimination. `x` receives the solution and
/// `ind_row` / `ind_col` the final row and column orderings. A pivot counts
/// as zero when it is at most `pivot_epsilon` times the first pivot, which is
/// the largest entry of `A`.
pub fn solve_total_pivot(
    aug: &mut Matrix,
    x: &mut [Real],
    ind_row: &mut [usize],
    ind_col: &mut [usize],
    pivot_epsilon: Real,
    underdetermined_tolerance: Real,
) -> SolverResult<TotalPivotOutcome> {
    let n = aug.rows();
    if aug.cols() != n + 1 {
        return Err(SolverError::ProblemSetup {
            what: format!("augmented matrix must be {n}x{}, got {n}x{}", n + 1, aug.cols()),
        });
    }
    if x.len() < n || ind_row.len() < n || ind_col.len() < n + 1 {
        return Err(SolverError::ProblemSetup {
            what: "total pivot work arrays too small".to_string(),
        });
    }

    for (i, r) in ind_row.iter_mut().enumerate().take(n) {
        *r = i;
    }
    for (j, c) in ind_col.iter_mut().enumerate().take(n + 1) {
        *c = j;
    }

    let mut rank = n;
    let mut threshold = 0.0;
    for i in 0..n {
        let (p_row, p_col, abs_max) = pivot_position(aug, ind_row, ind_col, i, n);
        if i == 0 {
            threshold = pivot_epsilon * abs_max;
        }
        if abs_max <= threshold {
            rank = i;
            debug!(rank, n, "total pivot: matrix is singular");
            break;
        }
        ind_row.swap(i, p_row);
        ind_col.swap(i, p_col);

        let pivot = aug[(ind_row[i], ind_col[i])];
        for k in (i + 1)..n {
            let factor = -aug[(ind_row[k], ind_col[i])] / pivot;
            for j in (i + 1)..=n {
                let v = aug[(ind_row[i], ind_col[j])];
                aug[(ind_row[k], ind_col[j])] += factor * v;
            }
            aug[(ind_row[k], ind_col[i])] = 0.0;
        }
    }

    for i in (0..n).rev() {
        let row = ind_row[i];
        if i >= rank {
            if aug[(row, n)].abs() > underdetermined_tolerance {
                warn!(rank, n, "total pivot: under-determined system not solvable");
                return Ok(TotalPivotOutcome { status: -1, rank });
            }
            x[ind_col[i]] = 0.0;
        } else {
            let mut v = -aug[(row, n)];
            for j in ((i + 1)..n).rev() {
                v -= aug[(row, ind_col[j])] * x[ind_col[j]];
            }
            x[ind_col[i]] = v / aug[(row, ind_col[i])];
        }
    }

    Ok(TotalPivotOutcome { status: 0, rank })
}

/// Largest remaining entry over rows `ind_row[start..n]` and columns `ind_col[start..n]`.
fn pivot_position(
    aug: &Matrix,
    ind_row: &[usize],
    ind_col: &[usize],
    start: usize,
    n: usize,
) -> (usize, usize, Real) {
    let mut best = (start, start, -1.0);
    for i in start..n {
        for j in start..n {
            let v = aug[(ind_row[i], ind_col[j])].abs();
            if v > best.2 {
                best = (i, j, v);
            }
        }
    }
    best
}

/// Linear backend around [`solve_total_pivot`].
#[derive(Clone, Debug)]
pub struct TotalPivot {
    n: usize,
    a: Matrix,
    b: Vector,
    x: Vector,
    ind_row: Vec<usize>,
    ind_col: Vec<usize>,
    rank: usize,
    settings: BackendSettings,
    solved: bool,
}

impl TotalPivot {
    pub fn new(n: usize, settings: &BackendSettings) -> Self {
        Self {
            n,
            a: Matrix::zeros(n, n),
            b: Vector::zeros(n),
            x: Vector::zeros(n),
            ind_row: vec![0; n],
            ind_col: vec![0; n + 1],
            rank: 0,
            settings: *settings,
            solved: false,
        }
    }

    /// Rank found by the last solve.
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn load(&mut self, a: &Matrix, b: &Vector) -> SolverResult<()> {
        self.a.copy_from(a)?;
        self.b.copy_from(b)?;
        self.solved = false;
        Ok(())
    }
}

impl LinearBackend for TotalPivot {
    fn name(&self) -> &'static str {
        "total-pivot"
    }

    fn prepare(&mut self, n: usize) -> SolverResult<()> {
        *self = TotalPivot::new(n, &self.settings);
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
        self.solved = false;
        let mut aug = self.a.augmented(&self.b)?;
        let mut x = vec![0.0; self.n];
        let outcome = solve_total_pivot(
            &mut aug,
            &mut x,
            &mut self.ind_row,
            &mut self.ind_col,
            self.settings.pivot_epsilon,
            self.settings.underdetermined_tolerance,
        )?;
        self.rank = outcome.rank;
        if outcome.status != 0 {
            return Err(SolverError::Underdetermined {
                rank: outcome.rank,
                n: self.n,
            });
        }

        let candidate = Vector::from(x);
        let mut r = self.a.mul_vector(&candidate)?;
        r.sub_vector(&self.b)?;
        let norm = r.norm();
        let tol = self.settings.residual_tolerance;
        if !residual_accepted(norm, tol) {
            warn!(residual = norm, tolerance = tol, "total pivot: residual check failed");
            return Err(SolverError::ResidualTooLarge { norm, tol });
        }
        debug!(n = self.n, rank = self.rank, residual = norm, "total pivot solve succeeded");

        self.x = candidate;
        self.solved = true;
        Ok(())
    }

    fn solution(&self) -> &[Real] {
        self.x.as_slice()
    }
}
