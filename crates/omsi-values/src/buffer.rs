//! Fixed-size variable storage.

use omsi_core::Real;

use crate::descriptor::{IndexDescriptor, VarType};
use crate::error::{ValuesError, ValuesResult};

/// Number of slots per storage class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferCounts {
    pub reals: usize,
    pub ints: usize,
    pub bools: usize,
    pub externs: usize,
}

impl BufferCounts {
    pub const fn reals(n: usize) -> Self {
        Self {
            reals: n,
            ints: 0,
            bools: 0,
            externs: 0,
        }
    }
}

/// Four homogeneous arrays plus the current simulation time.
///
/// Array lengths are fixed at construction; the buffer is never resized.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableBuffer {
    reals: Box<[Real]>,
    ints: Box<[i32]>,
    bools: Box<[bool]>,
    externs: Box<[String]>,
    time: Real,
}

impl VariableBuffer {
    /// Zero-initialized buffer.
    pub fn new(counts: BufferCounts) -> Self {
        Self {
            reals: vec![0.0; counts.reals].into_boxed_slice(),
            ints: vec![0; counts.ints].into_boxed_slice(),
            bools: vec![false; counts.bools].into_boxed_slice(),
            externs: vec![String::new(); counts.externs].into_boxed_slice(),
            time: 0.0,
        }
    }

    /// Buffer holding only the given reals.
    pub fn from_reals(values: &[Real]) -> Self {
        let mut buffer = Self::new(BufferCounts::reals(values.len()));
        buffer.reals.copy_from_slice(values);
        buffer
    }

    pub fn counts(&self) -> BufferCounts {
        BufferCounts {
            reals: self.reals.len(),
            ints: self.ints.len(),
            bools: self.bools.len(),
            externs: self.externs.len(),
        }
    }

    pub fn len_of(&self, ty: VarType) -> usize {
        match ty {
            VarType::Real => self.reals.len(),
            VarType::Integer => self.ints.len(),
            VarType::Boolean => self.bools.len(),
            VarType::String => self.externs.len(),
            VarType::Unknown => 0,
        }
    }

    pub fn time(&self) -> Real {
        self.time
    }

    pub fn set_time(&mut self, time: Real) {
        self.time = time;
    }

    pub fn reals(&self) -> &[Real] {
        &self.reals
    }

    pub fn reals_mut(&mut self) -> &mut [Real] {
        &mut self.reals
    }

    pub fn ints(&self) -> &[i32] {
        &self.ints
    }

    pub fn ints_mut(&mut self) -> &mut [i32] {
        &mut self.ints
    }

    pub fn bools(&self) -> &[bool] {
        &self.bools
    }

    pub fn bools_mut(&mut self) -> &mut [bool] {
        &mut self.bools
    }

    pub fn externs(&self) -> &[String] {
        &self.externs
    }

    pub fn externs_mut(&mut self) -> &mut [String] {
        &mut self.externs
    }

    /// Check that `desc` names an existing slot.
    pub fn check(&self, desc: IndexDescriptor) -> ValuesResult<()> {
        if desc.ty == VarType::Unknown {
            return Err(ValuesError::UnsupportedType {
                ty: desc.ty,
                what: "dereference",
            });
        }
        let len = self.len_of(desc.ty);
        if desc.index >= len {
            return Err(ValuesError::IndexOob {
                ty: desc.ty,
                index: desc.index,
                len,
            });
        }
        Ok(())
    }

    /// Read a numeric slot widened to `Real` (booleans read as 0 or 1).
    pub fn read_real(&self, desc: IndexDescriptor) -> ValuesResult<Real> {
        self.check(desc)?;
        match desc.ty {
            VarType::Real => Ok(self.reals[desc.index]),
            VarType::Integer => Ok(Real::from(self.ints[desc.index])),
            VarType::Boolean => Ok(if self.bools[desc.index] { 1.0 } else { 0.0 }),
            ty => Err(ValuesError::UnsupportedType {
                ty,
                what: "numeric read",
            }),
        }
    }

    /// Write a numeric slot, narrowing to the slot's type.
    ///
    /// Integers are truncated toward zero; booleans are true for any non-zero value.
    pub fn write_real(&mut self, desc: IndexDescriptor, value: Real) -> ValuesResult<()> {
        self.check(desc)?;
        match desc.ty {
            VarType::Real => self.reals[desc.index] = value,
            VarType::Integer => self.ints[desc.index] = value as i32,
            VarType::Boolean => self.bools[desc.index] = value != 0.0,
            ty => {
                return Err(ValuesError::UnsupportedType {
                    ty,
                    what: "numeric write",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_lengths_follow_counts() {
        let buf = VariableBuffer::new(BufferCounts {
            reals: 3,
            ints: 2,
            bools: 1,
            externs: 4,
        });
        assert_eq!(buf.reals().len(), 3);
        assert_eq!(buf.ints().len(), 2);
        assert_eq!(buf.bools().len(), 1);
        assert_eq!(buf.externs().len(), 4);
        assert_eq!(buf.len_of(VarType::Unknown), 0);
    }

    #[test]
    fn narrowing_writes() {
        let mut buf = VariableBuffer::new(BufferCounts {
            reals: 1,
            ints: 1,
            bools: 1,
            externs: 0,
        });
        buf.write_real(IndexDescriptor::integer(0), 2.9).unwrap();
        buf.write_real(IndexDescriptor::boolean(0), -0.5).unwrap();
        assert_eq!(buf.ints()[0], 2);
        assert!(buf.bools()[0]);
        assert_eq!(buf.read_real(IndexDescriptor::boolean(0)).unwrap(), 1.0);
    }

    #[test]
    fn unknown_and_out_of_range_descriptors_fail() {
        let mut buf = VariableBuffer::from_reals(&[1.0]);
        assert!(matches!(
            buf.read_real(IndexDescriptor::new(VarType::Unknown, 0)),
            Err(ValuesError::UnsupportedType { .. })
        ));
        assert!(matches!(
            buf.write_real(IndexDescriptor::real(1), 0.0),
            Err(ValuesError::IndexOob { index: 1, len: 1, .. })
        ));
    }
}
