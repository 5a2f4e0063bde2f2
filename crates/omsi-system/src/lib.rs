//! Algebraic-system evaluation engine.
//!
//! Ties the variable-indirection layer and the solver backends together:
//! for one algebraic loop it builds the Jacobian column by column from
//! directional derivatives, assembles the right-hand side, runs the selected
//! solver, verifies the residual of the result and commits it to the shared
//! variable buffer. Rejected results are rolled back.

pub mod coloring;
pub mod context;
pub mod error;
pub mod function;
pub mod jacobian;
pub mod linear_loop;
pub mod settings;
pub mod setup;
pub mod solve;
pub mod system;

pub use coloring::{ColumnColoring, SparsityPattern};
pub use context::{LogCategory, RuntimeContext};
pub use error::{SystemError, SystemResult};
pub use function::{Equations, EvalContext, Function, VarStorage, Workspace, ZeroCrossings};
pub use linear_loop::LinearLoop;
pub use settings::{JacobianSettings, SolverSettings};
pub use setup::{
    AlgebraicSystemLayout, FunctionLayout, StorageLayout, TeardownReport, free_function,
    instantiate_algebraic_system_array, instantiate_function, set_default_solvers,
    wire_zerocrossings,
};
pub use solve::{solve_algebraic_system, try_solve};
pub use system::{AlgebraicSystem, JacobianSource};
