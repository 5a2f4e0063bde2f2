//! `dgesv`-style dense LU solve on column-major storage.
//!
//! Status codes follow LAPACK: `0` is success, `-i` means argument `i` was
//! invalid, `i > 0` means `U(i,i)` is exactly zero so the matrix is singular
//! and no solution was computed. The factorization itself is nalgebra's LU
//! with partial pivoting.

use nalgebra::{DMatrix, DVector, Dyn, linalg::LU};
use omsi_core::Real;

/// Solve `A X = B` for `nrhs` right-hand sides.
///
/// On return `a` holds the factors of `P A = L U` (`L` strictly below the
/// diagonal with an implied unit diagonal, `U` on and above it), `ipiv[k]`
/// the original row that ends up in row `k` of `P A`, and `b` the solution
/// `X` (only when the status is `0`).
pub fn dgesv(
    n: usize,
    nrhs: usize,
    a: &mut [Real],
    lda: usize,
    ipiv: &mut [usize],
    b: &mut [Real],
    ldb: usize,
) -> i32 {
    if a.len() < lda * n {
        return -3;
    }
    if lda < n.max(1) {
        return -4;
    }
    if ipiv.len() < n {
        return -5;
    }
    if b.len() < ldb * nrhs {
        return -6;
    }
    if ldb < n.max(1) {
        return -7;
    }
    if n == 0 || nrhs == 0 {
        return 0;
    }

    let lu = DMatrix::from_fn(n, n, |i, j| a[i + j * lda]).lu();
    store_factors(&lu, n, a, lda, ipiv);

    let info = first_zero_pivot(&lu, n);
    if info != 0 {
        return info;
    }

    let mut x = DMatrix::from_fn(n, nrhs, |i, c| b[i + c * ldb]);
    if !lu.solve_mut(&mut x) {
        return n as i32;
    }
    for c in 0..nrhs {
        b[c * ldb..c * ldb + n].copy_from_slice(x.column(c).as_slice());
    }
    0
}

/// Pack `L` and `U` back into `a` and record the row order in `ipiv`.
fn store_factors(
    lu: &LU<Real, Dyn, Dyn>,
    n: usize,
    a: &mut [Real],
    lda: usize,
    ipiv: &mut [usize],
) {
    let (l, u) = (lu.l(), lu.u());
    for j in 0..n {
        for i in 0..n {
            a[i + j * lda] = if i > j { l[(i, j)] } else { u[(i, j)] };
        }
    }

    let mut order = DVector::from_fn(n, |i, _| i);
    lu.p().permute_rows(&mut order);
    ipiv[..n].copy_from_slice(order.as_slice());
}

/// 1-based index of the first exactly-zero diagonal entry of `U`, or `0`.
fn first_zero_pivot(lu: &LU<Real, Dyn, Dyn>, n: usize) -> i32 {
    let u = lu.u();
    (0..n)
        .find(|&k| u[(k, k)] == 0.0)
        .map_or(0, |k| (k + 1) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn solves_two_by_two() {
        // 2x + 3y = 8, 3x + 0.5y = 4 (column-major)
        let mut a = [2.0, 3.0, 3.0, 0.5];
        let mut b = [8.0, 4.0];
        let mut ipiv = [0; 2];
        let info = dgesv(2, 1, &mut a, 2, &mut ipiv, &mut b, 2);
        assert_eq!(info, 0);
        assert!((b[0] - 1.0).abs() < 1e-12);
        assert!((b[1] - 2.0).abs() < 1e-12);
        // |3| > |2| so row 1 becomes the first pivot row
        assert_eq!(ipiv, [1, 0]);
        // U(0,0) is the pivot, L(1,0) = 2/3
        assert_eq!(a[0], 3.0);
        assert!((a[1] - 2.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn factors_reproduce_permuted_matrix() {
        let original = [4.0, 2.0, 8.0, 3.0, 7.0, 1.0, 5.0, 6.0, 9.0];
        let mut a = original;
        let mut b = [1.0, 2.0, 3.0];
        let mut ipiv = [0; 3];
        assert_eq!(dgesv(3, 1, &mut a, 3, &mut ipiv, &mut b, 3), 0);

        for i in 0..3 {
            for j in 0..3 {
                let lu: Real = (0..3)
                    .map(|k| {
                        let l = match i.cmp(&k) {
                            Ordering::Equal => 1.0,
                            Ordering::Greater => a[i + k * 3],
                            Ordering::Less => 0.0,
                        };
                        let u = if k <= j { a[k + j * 3] } else { 0.0 };
                        l * u
                    })
                    .sum();
                assert!((lu - original[ipiv[i] + j * 3]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn reports_first_zero_pivot() {
        let mut a = [1.0, 2.0, 2.0, 4.0];
        let mut b = [1.0, 2.0];
        let mut ipiv = [0; 2];
        let info = dgesv(2, 1, &mut a, 2, &mut ipiv, &mut b, 2);
        assert_eq!(info, 2);
        // right-hand side untouched when singular
        assert_eq!(b, [1.0, 2.0]);
    }

    #[test]
    fn zero_column_is_skipped_and_reported() {
        // first column all zero: U(1,1) = 0, factoring continues
        let mut a = [0.0, 0.0, 1.0, 2.0];
        let mut b = [1.0, 1.0];
        let mut ipiv = [0; 2];
        assert_eq!(dgesv(2, 1, &mut a, 2, &mut ipiv, &mut b, 2), 1);
    }

    #[test]
    fn rejects_bad_leading_dimension() {
        let mut a = [1.0; 4];
        let mut b = [1.0; 2];
        let mut ipiv = [0; 2];
        assert_eq!(dgesv(2, 1, &mut a, 1, &mut ipiv, &mut b, 2), -4);
        assert_eq!(dgesv(2, 1, &mut a, 2, &mut ipiv, &mut b, 1), -7);
        assert_eq!(dgesv(2, 1, &mut a, 2, &mut [0; 1], &mut b, 2), -5);
    }

    #[test]
    fn multiple_right_hand_sides() {
        // identity times 2
        let mut a = [2.0, 0.0, 0.0, 2.0];
        let mut b = [2.0, 4.0, 6.0, 8.0];
        let mut ipiv = [0; 2];
        assert_eq!(dgesv(2, 2, &mut a, 2, &mut ipiv, &mut b, 2), 0);
        assert_eq!(b, [1.0, 2.0, 3.0, 4.0]);
    }
}
