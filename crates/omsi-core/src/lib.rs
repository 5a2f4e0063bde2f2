//! omsi-core: stable foundation for the algebraic-system runtime.
//!
//! Contains:
//! - vector / matrix (dense containers used by every solver backend)
//! - numeric (Real + tolerances + float helpers)
//! - status (the ok / warning / fatal taxonomy shared by all layers)
//! - error (shared error types)

pub mod error;
pub mod matrix;
pub mod numeric;
pub mod status;
pub mod vector;

// Re-exports: nice ergonomics for downstream crates
pub use error::{OmsiError, OmsiResult};
pub use matrix::Matrix;
pub use numeric::*;
pub use status::Status;
pub use vector::Vector;
