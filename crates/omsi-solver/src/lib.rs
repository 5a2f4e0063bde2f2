//! Linear and nonlinear solver backends for algebraic loops.
//!
//! Every backend follows the same lifecycle: allocate, prepare for a problem
//! size, load the matrix and right-hand side element by element, mark the
//! instance ready, solve, read the solution, free. [`SolverInstance`] owns
//! that state machine and dispatches to one of a closed set of backends:
//! dense LU with partial pivoting, Gauss elimination with total pivot search,
//! damped Newton iteration, or an externally supplied linear backend.

pub mod backend;
pub mod dense;
pub mod error;
pub mod instance;
pub mod lapack;
pub mod newton;
pub mod select;
pub mod settings;
pub mod total_pivot;

pub use backend::{LinearBackend, SolverKind, SolverState};
pub use dense::DenseDirect;
pub use error::{SolverError, SolverResult};
pub use instance::{SolverInstance, SolverStats};
pub use newton::{Newton, NewtonConfig, NewtonReport, NonlinearProblem};
pub use select::{DefaultSelector, SolverSelector};
pub use settings::BackendSettings;
pub use total_pivot::{TotalPivot, TotalPivotOutcome, solve_total_pivot};
