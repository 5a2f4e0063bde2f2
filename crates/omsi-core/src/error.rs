use thiserror::Error;

use crate::status::Status;

pub type OmsiResult<T> = Result<T, OmsiError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OmsiError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

impl OmsiError {
    /// Severity of this error in the ok / warning / fatal taxonomy.
    ///
    /// Only a non-finite number is recoverable; everything else is a caller bug.
    pub fn status(&self) -> Status {
        match self {
            OmsiError::NonFinite { .. } => Status::Warning,
            OmsiError::IndexOob { .. } | OmsiError::DimensionMismatch { .. } => Status::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_non_finite_is_recoverable() {
        let nan = OmsiError::NonFinite {
            what: "residual",
            value: f64::NAN,
        };
        assert_eq!(nan.status(), Status::Warning);
        let oob = OmsiError::IndexOob {
            what: "vector",
            index: 3,
            len: 2,
        };
        assert_eq!(oob.status(), Status::Fatal);
    }
}
