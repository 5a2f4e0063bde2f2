//! Typed index descriptors.

use core::fmt;

/// Storage class of a scalar model variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VarType {
    Real,
    Integer,
    Boolean,
    String,
    /// Not yet resolved; dereferencing such a descriptor is an error.
    #[default]
    Unknown,
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VarType::Real => "real",
            VarType::Integer => "integer",
            VarType::Boolean => "boolean",
            VarType::String => "string",
            VarType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Position of one scalar inside a [`crate::VariableBuffer`].
///
/// Created during model setup and never mutated afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexDescriptor {
    pub ty: VarType,
    pub index: usize,
}

impl IndexDescriptor {
    pub const fn new(ty: VarType, index: usize) -> Self {
        Self { ty, index }
    }

    pub const fn real(index: usize) -> Self {
        Self::new(VarType::Real, index)
    }

    pub const fn integer(index: usize) -> Self {
        Self::new(VarType::Integer, index)
    }

    pub const fn boolean(index: usize) -> Self {
        Self::new(VarType::Boolean, index)
    }

    pub const fn string(index: usize) -> Self {
        Self::new(VarType::String, index)
    }

    /// Contiguous real descriptors `start..start + count`.
    pub fn real_range(start: usize, count: usize) -> Vec<Self> {
        (start..start + count).map(Self::real).collect()
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.ty, self.index)
    }
}
