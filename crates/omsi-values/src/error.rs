//! Indirection-layer error types.

use omsi_core::Status;
use thiserror::Error;

use crate::descriptor::VarType;

/// Errors raised while dereferencing index descriptors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValuesError {
    /// The descriptor type was never resolved.
    #[error("Descriptor {position} has unresolved type")]
    UnknownType { position: usize },

    /// The descriptor type cannot take part in this operation.
    #[error("Type {ty} not supported for {what}")]
    UnsupportedType { ty: VarType, what: &'static str },

    #[error("{ty} index {index} out of range (len={len})")]
    IndexOob { ty: VarType, index: usize, len: usize },

    /// More descriptors of one type than the destination buffer can hold.
    #[error("More than {capacity} {ty} descriptors for snapshot")]
    CountExceeded { ty: VarType, capacity: usize },

    #[error("Length mismatch in {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

pub type ValuesResult<T> = Result<T, ValuesError>;

impl ValuesError {
    /// Every indirection failure is structural.
    pub fn status(&self) -> Status {
        Status::Fatal
    }
}
