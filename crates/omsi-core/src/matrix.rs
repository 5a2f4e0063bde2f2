//! Dense matrix stored in column-major order.
//!
//! Element `(row, col)` lives at flat offset `row + col * lda` where the
//! leading dimension `lda` equals the number of rows. Every solver backend and
//! the Jacobian builder use this convention; there is no row-major storage.

use core::ops::{Index, IndexMut};
use nalgebra::DMatrix;

use crate::error::{OmsiError, OmsiResult};
use crate::numeric::Real;
use crate::vector::Vector;

#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    data: DMatrix<Real>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: DMatrix::zeros(rows, cols),
        }
    }

    pub fn identity(n: usize) -> Self {
        Self {
            data: DMatrix::identity(n, n),
        }
    }

    /// Build from entries listed row by row (the natural way to write a matrix literal).
    pub fn from_row_slice(rows: usize, cols: usize, values: &[Real]) -> OmsiResult<Self> {
        Self::check_size(rows, cols, values.len())?;
        Ok(Self {
            data: DMatrix::from_row_slice(rows, cols, values),
        })
    }

    /// Build from entries in storage (column-major) order.
    pub fn from_column_slice(rows: usize, cols: usize, values: &[Real]) -> OmsiResult<Self> {
        Self::check_size(rows, cols, values.len())?;
        Ok(Self {
            data: DMatrix::from_column_slice(rows, cols, values),
        })
    }

    /// Build from nested rows; all rows must have the same length.
    pub fn from_rows(rows: &[Vec<Real>]) -> OmsiResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(OmsiError::DimensionMismatch {
                    what: "matrix row",
                    expected: cols,
                    found: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        Self::from_row_slice(rows.len(), cols, &flat)
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Leading dimension of the column-major storage.
    pub fn lda(&self) -> usize {
        self.rows()
    }

    pub fn is_square(&self) -> bool {
        self.rows() == self.cols()
    }

    pub fn get(&self, row: usize, col: usize) -> OmsiResult<Real> {
        self.check_index(row, col)?;
        Ok(self.data[(row, col)])
    }

    pub fn set(&mut self, row: usize, col: usize, value: Real) -> OmsiResult<()> {
        self.check_index(row, col)?;
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Column-major storage.
    pub fn as_slice(&self) -> &[Real] {
        self.data.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [Real] {
        self.data.as_mut_slice()
    }

    pub fn as_dmatrix(&self) -> &DMatrix<Real> {
        &self.data
    }

    pub fn fill(&mut self, value: Real) {
        self.data.fill(value);
    }

    pub fn copy_from(&mut self, src: &Matrix) -> OmsiResult<()> {
        self.check_shape(src, "matrix copy")?;
        self.data.copy_from(&src.data);
        Ok(())
    }

    pub fn negate(&mut self) {
        self.data.neg_mut();
    }

    pub fn scale(&mut self, factor: Real) {
        self.data.scale_mut(factor);
    }

    pub fn add_matrix(&mut self, other: &Matrix) -> OmsiResult<()> {
        self.check_shape(other, "matrix add")?;
        self.data += &other.data;
        Ok(())
    }

    pub fn sub_matrix(&mut self, other: &Matrix) -> OmsiResult<()> {
        self.check_shape(other, "matrix subtract")?;
        self.data -= &other.data;
        Ok(())
    }

    /// `self * other`
    pub fn mul_matrix(&self, other: &Matrix) -> OmsiResult<Matrix> {
        if self.cols() != other.rows() {
            return Err(OmsiError::DimensionMismatch {
                what: "matrix product",
                expected: self.cols(),
                found: other.rows(),
            });
        }
        Ok(Matrix {
            data: &self.data * &other.data,
        })
    }

    /// `self * x`
    pub fn mul_vector(&self, x: &Vector) -> OmsiResult<Vector> {
        if self.cols() != x.len() {
            return Err(OmsiError::DimensionMismatch {
                what: "matrix-vector product",
                expected: self.cols(),
                found: x.len(),
            });
        }
        Ok(Vector::from(&self.data * x.as_dvector()))
    }

    /// Frobenius norm.
    pub fn norm(&self) -> Real {
        self.data.norm()
    }

    /// Maximum absolute entry (0 for an empty matrix).
    pub fn max_norm(&self) -> Real {
        if self.data.is_empty() {
            0.0
        } else {
            self.data.amax()
        }
    }

    pub fn column(&self, col: usize) -> OmsiResult<Vector> {
        if col >= self.cols() {
            return Err(OmsiError::IndexOob {
                what: "matrix column",
                index: col,
                len: self.cols(),
            });
        }
        Ok(Vector::from(self.data.column(col).into_owned()))
    }

    /// Column insertion: `self[i, col] = scalar * src[i]` for every `i` in `src`.
    ///
    /// Used to append the right-hand side of an augmented system `[A | -b]`.
    pub fn set_column_scaled(&mut self, col: usize, scalar: Real, src: &Vector) -> OmsiResult<()> {
        if src.len() != self.rows() {
            return Err(OmsiError::DimensionMismatch {
                what: "column insertion",
                expected: self.rows(),
                found: src.len(),
            });
        }
        if col >= self.cols() {
            return Err(OmsiError::IndexOob {
                what: "matrix column",
                index: col,
                len: self.cols(),
            });
        }
        for (i, v) in src.as_slice().iter().enumerate() {
            self.data[(i, col)] = scalar * v;
        }
        Ok(())
    }

    /// Augmented matrix `[A | -b]` of shape `n x (n + 1)`.
    pub fn augmented(&self, rhs: &Vector) -> OmsiResult<Matrix> {
        let mut aug = Matrix::zeros(self.rows(), self.cols() + 1);
        aug.data
            .view_mut((0, 0), (self.rows(), self.cols()))
            .copy_from(&self.data);
        aug.set_column_scaled(self.cols(), -1.0, rhs)?;
        Ok(aug)
    }

    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    fn check_size(rows: usize, cols: usize, len: usize) -> OmsiResult<()> {
        if rows * cols != len {
            return Err(OmsiError::DimensionMismatch {
                what: "matrix storage",
                expected: rows * cols,
                found: len,
            });
        }
        Ok(())
    }

    fn check_index(&self, row: usize, col: usize) -> OmsiResult<()> {
        if row >= self.rows() {
            return Err(OmsiError::IndexOob {
                what: "matrix row",
                index: row,
                len: self.rows(),
            });
        }
        if col >= self.cols() {
            return Err(OmsiError::IndexOob {
                what: "matrix column",
                index: col,
                len: self.cols(),
            });
        }
        Ok(())
    }

    fn check_shape(&self, other: &Matrix, what: &'static str) -> OmsiResult<()> {
        if self.rows() != other.rows() {
            return Err(OmsiError::DimensionMismatch {
                what,
                expected: self.rows(),
                found: other.rows(),
            });
        }
        if self.cols() != other.cols() {
            return Err(OmsiError::DimensionMismatch {
                what,
                expected: self.cols(),
                found: other.cols(),
            });
        }
        Ok(())
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = Real;

    fn index(&self, index: (usize, usize)) -> &Real {
        &self.data[index]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Real {
        &mut self.data[index]
    }
}

impl From<DMatrix<Real>> for Matrix {
    fn from(data: DMatrix<Real>) -> Self {
        Self { data }
    }
}
