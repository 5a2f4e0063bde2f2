//! Variable storage and index indirection for the algebraic-system runtime.
//!
//! A [`VariableBuffer`] holds the real, integer, boolean and string values of
//! a model (or of one function's private workspace). An [`IndexDescriptor`]
//! names a single scalar inside such a buffer by type and flat index, so
//! solver code can read and write iteration variables without knowing the
//! buffer layout.

pub mod buffer;
pub mod descriptor;
pub mod error;
pub mod indirection;
pub mod model;

pub use buffer::{BufferCounts, VariableBuffer};
pub use descriptor::{IndexDescriptor, VarType};
pub use error::{ValuesError, ValuesResult};
pub use indirection::{
    WriteCounts, read_reals, restore_omsi_values, save_omsi_values, set_omsi_value, write_reals,
};
pub use model::{EquationInfo, ModelCounts};
