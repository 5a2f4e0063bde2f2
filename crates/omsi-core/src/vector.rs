//! Fixed-length dense vector.
//!
//! The length is fixed at construction. Operations between vectors of
//! different length return [`OmsiError::DimensionMismatch`] instead of
//! silently truncating.

use core::ops::{Index, IndexMut};
use nalgebra::DVector;

use crate::error::{OmsiError, OmsiResult};
use crate::numeric::Real;

#[derive(Clone, Debug, PartialEq)]
pub struct Vector {
    data: DVector<Real>,
}

impl Vector {
    /// Vector of `size` zeros.
    pub fn zeros(size: usize) -> Self {
        Self {
            data: DVector::zeros(size),
        }
    }

    pub fn from_element(size: usize, value: Real) -> Self {
        Self {
            data: DVector::from_element(size, value),
        }
    }

    pub fn from_slice(values: &[Real]) -> Self {
        Self {
            data: DVector::from_column_slice(values),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Checked element read.
    pub fn get(&self, index: usize) -> OmsiResult<Real> {
        self.data
            .get(index)
            .copied()
            .ok_or(OmsiError::IndexOob {
                what: "vector element",
                index,
                len: self.len(),
            })
    }

    /// Checked element write.
    pub fn set(&mut self, index: usize, value: Real) -> OmsiResult<()> {
        let len = self.len();
        let slot = self.data.get_mut(index).ok_or(OmsiError::IndexOob {
            what: "vector element",
            index,
            len,
        })?;
        *slot = value;
        Ok(())
    }

    pub fn as_slice(&self) -> &[Real] {
        self.data.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [Real] {
        self.data.as_mut_slice()
    }

    pub fn as_dvector(&self) -> &DVector<Real> {
        &self.data
    }

    pub fn into_inner(self) -> DVector<Real> {
        self.data
    }

    pub fn fill(&mut self, value: Real) {
        self.data.fill(value);
    }

    /// Deep copy of `src` into `self`.
    pub fn copy_from(&mut self, src: &Vector) -> OmsiResult<()> {
        self.check_len(src, "vector copy")?;
        self.data.copy_from(&src.data);
        Ok(())
    }

    /// Copy a plain slice into `self`.
    pub fn copy_from_slice(&mut self, src: &[Real]) -> OmsiResult<()> {
        if src.len() != self.len() {
            return Err(OmsiError::DimensionMismatch {
                what: "vector copy",
                expected: self.len(),
                found: src.len(),
            });
        }
        self.data.as_mut_slice().copy_from_slice(src);
        Ok(())
    }

    pub fn negate(&mut self) {
        self.data.neg_mut();
    }

    pub fn scale(&mut self, factor: Real) {
        self.data.scale_mut(factor);
    }

    /// `self += other`
    pub fn add_vector(&mut self, other: &Vector) -> OmsiResult<()> {
        self.check_len(other, "vector add")?;
        self.data += &other.data;
        Ok(())
    }

    /// `self -= other`
    pub fn sub_vector(&mut self, other: &Vector) -> OmsiResult<()> {
        self.check_len(other, "vector subtract")?;
        self.data -= &other.data;
        Ok(())
    }

    /// `self += alpha * x`
    pub fn axpy(&mut self, alpha: Real, x: &Vector) -> OmsiResult<()> {
        self.check_len(x, "vector axpy")?;
        self.data.axpy(alpha, &x.data, 1.0);
        Ok(())
    }

    pub fn dot(&self, other: &Vector) -> OmsiResult<Real> {
        self.check_len(other, "vector dot")?;
        Ok(self.data.dot(&other.data))
    }

    /// Euclidean norm.
    pub fn norm(&self) -> Real {
        self.data.norm()
    }

    /// Maximum absolute entry (0 for an empty vector).
    pub fn max_norm(&self) -> Real {
        if self.is_empty() {
            0.0
        } else {
            self.data.amax()
        }
    }

    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    fn check_len(&self, other: &Vector, what: &'static str) -> OmsiResult<()> {
        if self.len() != other.len() {
            return Err(OmsiError::DimensionMismatch {
                what,
                expected: self.len(),
                found: other.len(),
            });
        }
        Ok(())
    }
}

impl Index<usize> for Vector {
    type Output = Real;

    fn index(&self, index: usize) -> &Real {
        &self.data[index]
    }
}

impl IndexMut<usize> for Vector {
    fn index_mut(&mut self, index: usize) -> &mut Real {
        &mut self.data[index]
    }
}

impl From<DVector<Real>> for Vector {
    fn from(data: DVector<Real>) -> Self {
        Self { data }
    }
}

impl From<Vec<Real>> for Vector {
    fn from(values: Vec<Real>) -> Self {
        Self {
            data: DVector::from_vec(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_and_norms() {
        let mut a = Vector::from_slice(&[3.0, -4.0]);
        assert!((a.norm() - 5.0).abs() < 1e-15);
        assert_eq!(a.max_norm(), 4.0);

        let b = Vector::from_slice(&[1.0, 1.0]);
        a.add_vector(&b).unwrap();
        assert_eq!(a.as_slice(), &[4.0, -3.0]);

        a.negate();
        assert_eq!(a.as_slice(), &[-4.0, 3.0]);

        a.axpy(2.0, &b).unwrap();
        assert_eq!(a.as_slice(), &[-2.0, 5.0]);
        assert_eq!(a.dot(&b).unwrap(), 3.0);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut a = Vector::zeros(2);
        let b = Vector::zeros(3);
        let err = a.add_vector(&b).unwrap_err();
        assert!(matches!(
            err,
            OmsiError::DimensionMismatch {
                expected: 2,
                found: 3,
                ..
            }
        ));
        assert!(a.copy_from_slice(&[1.0]).is_err());
    }

    #[test]
    fn checked_access() {
        let mut v = Vector::zeros(2);
        v.set(1, 7.0).unwrap();
        assert_eq!(v.get(1).unwrap(), 7.0);
        assert!(v.get(2).is_err());
        assert!(v.set(5, 1.0).is_err());
    }

    #[test]
    fn empty_vector_norms() {
        let v = Vector::zeros(0);
        assert!(v.is_empty());
        assert_eq!(v.norm(), 0.0);
        assert_eq!(v.max_norm(), 0.0);
    }
}
