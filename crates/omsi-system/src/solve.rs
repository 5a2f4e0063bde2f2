//! Solve orchestration for one algebraic loop.
//!
//! Sequence for a linear loop:
//! 1. snapshot every scope slot the solve may write
//!    ([`AlgebraicSystem::rollback_vars`]),
//! 2. assemble `A` column by column into the solver,
//! 3. zero the iteration variables, evaluate the residual (`F(0) = -b`) and
//!    load `b`,
//! 4. solve, write `x` back and re-evaluate the residual,
//! 5. accept when `||F(x)||_2 <= system_tolerance`, otherwise roll back.
//!
//! Nonlinear loops run a damped Newton iteration seeded from the current
//! iteration values and finish with the same residual check and rollback.

use omsi_core::{Matrix, Real, Status, norm2, residual_accepted};
use omsi_solver::{NonlinearProblem, SolverError, SolverInstance, SolverState};
use omsi_values::{
    BufferCounts, EquationInfo, IndexDescriptor, VarType, VariableBuffer, read_reals,
    restore_omsi_values, save_omsi_values, set_omsi_value, write_reals,
};
use tracing::{debug, debug_span, error, trace, warn};

use crate::coloring::ColumnColoring;
use crate::context::{LogCategory, RuntimeContext};
use crate::error::{SystemError, SystemResult};
use crate::function::Function;
use crate::jacobian::assemble_jacobian;
use crate::system::{AlgebraicSystem, JacobianSource};

/// Solve `system` against `scope` and report the outcome as a status.
///
/// `Ok` means the solution was written to the iteration variables. On
/// `Warning` or `Fatal` every slot in [`AlgebraicSystem::rollback_vars`]
/// (iteration variables, shared Jacobian seeds and outputs, nested loop
/// variables) holds its value from before the call.
pub fn solve_algebraic_system(
    system: &mut AlgebraicSystem,
    runtime: &RuntimeContext,
    scope: &mut VariableBuffer,
) -> Status {
    let span = debug_span!(
        "algebraic_system",
        id = system.id,
        linear = system.is_linear,
        n = system.n_iteration_vars()
    );
    let _guard = span.enter();

    match try_solve(system, runtime, scope) {
        Ok(()) => {
            debug!("solution committed");
            Status::Ok
        }
        Err(e) => {
            let status = e.status();
            let origin = system
                .equation
                .as_ref()
                .map(EquationInfo::describe)
                .unwrap_or_default();
            if status.is_fatal() {
                error!(error = %e, equation = %origin, "algebraic system failed");
            } else {
                warn!(error = %e, equation = %origin, "algebraic system rejected, values restored");
            }
            status
        }
    }
}

/// [`solve_algebraic_system`] with the error kept.
pub fn try_solve(
    system: &mut AlgebraicSystem,
    runtime: &RuntimeContext,
    scope: &mut VariableBuffer,
) -> SystemResult<()> {
    let AlgebraicSystem {
        id,
        is_linear,
        iteration_vars,
        residual,
        jacobian,
        coloring,
        solver,
        rollback_vars,
        ..
    } = system;
    let solver = match solver.as_mut() {
        Some(s) if s.state() != SolverState::Uninitialized => s,
        _ => return Err(SystemError::SolverNotSet { system: *id }),
    };
    if solver.is_linear() && !*is_linear {
        return Err(SolverError::WrongFamily {
            kind: solver.kind(),
            what: "solve a nonlinear loop",
        }
        .into());
    }

    let coloring = coloring
        .as_ref()
        .filter(|_| runtime.settings().jacobian.use_coloring);
    let snapshot = snapshot(scope, rollback_vars)?;

    let mut parts = LoopParts {
        residual,
        jacobian,
        iteration_vars,
        coloring,
        runtime,
        scope,
    };
    let outcome = if solver.is_linear() {
        solve_linear(solver, &mut parts)
    } else {
        solve_nonlinear(solver, &mut parts)
    }
    .and_then(|()| verify(parts.residual, runtime, parts.scope, iteration_vars.len()));

    if let Err(e) = outcome {
        restore_omsi_values(parts.scope, rollback_vars, &snapshot)?;
        return Err(e);
    }
    Ok(())
}

/// Borrowed pieces of an [`AlgebraicSystem`] besides its solver.
struct LoopParts<'a> {
    residual: &'a mut Function,
    jacobian: &'a mut JacobianSource,
    iteration_vars: &'a [IndexDescriptor],
    coloring: Option<&'a ColumnColoring>,
    runtime: &'a RuntimeContext,
    scope: &'a mut VariableBuffer,
}

impl LoopParts<'_> {
    fn assemble<S>(&mut self, sink: S) -> SystemResult<()>
    where
        S: FnMut(usize, usize, Real) -> SystemResult<()>,
    {
        assemble_jacobian(
            self.jacobian,
            self.residual,
            self.iteration_vars,
            self.coloring,
            self.runtime,
            self.scope,
            sink,
        )
    }

    fn evaluate_at(&mut self, x: &[Real], f: &mut [Real]) -> SystemResult<()> {
        write_reals(self.scope, self.iteration_vars, x)?;
        self.residual.evaluate(self.runtime, self.scope, Some(f))
    }
}

impl NonlinearProblem for LoopParts<'_> {
    type Error = SystemError;

    fn residual(&mut self, x: &[Real], f: &mut [Real]) -> SystemResult<()> {
        self.evaluate_at(x, f)
    }

    fn jacobian(&mut self, x: &[Real], jac: &mut Matrix) -> SystemResult<()> {
        write_reals(self.scope, self.iteration_vars, x)?;
        jac.fill(0.0);
        self.assemble(|row, col, value| Ok(jac.set(row, col, value)?))
    }
}

fn solve_linear(solver: &mut SolverInstance, parts: &mut LoopParts<'_>) -> SystemResult<()> {
    let n = parts.iteration_vars.len();
    solver.recover()?;
    solver.prepare(n)?;
    parts.assemble(|row, col, value| Ok(solver.set_matrix_element(row, col, value)?))?;

    set_omsi_value(parts.scope, parts.iteration_vars, n, 0.0)?;
    let mut rhs = vec![0.0; n];
    parts
        .residual
        .evaluate(parts.runtime, parts.scope, Some(rhs.as_mut_slice()))?;
    for (i, v) in rhs.iter_mut().enumerate() {
        *v = -*v;
        solver.set_vector_element(i, *v)?;
    }
    if parts.runtime.logs(LogCategory::Linear) {
        trace!(rhs = ?rhs, "right-hand side");
    }

    solver.mark_ready()?;
    solver.solve()?;
    let x = solver.solution()?.to_vec();
    if parts.runtime.logs(LogCategory::Linear) {
        trace!(solution = ?x, solver = solver.name(), "linear solution");
    }
    write_reals(parts.scope, parts.iteration_vars, &x)?;
    Ok(())
}

fn solve_nonlinear(solver: &mut SolverInstance, parts: &mut LoopParts<'_>) -> SystemResult<()> {
    let n = parts.iteration_vars.len();
    solver.recover()?;
    solver.prepare(n)?;
    let start = read_reals(parts.scope, parts.iteration_vars)?;
    for (i, v) in start.iter().enumerate() {
        solver.set_vector_element(i, *v)?;
    }
    solver.mark_ready()?;

    let report = solver.solve_nonlinear(parts)?;
    let x = solver.solution()?.to_vec();
    if parts.runtime.logs(LogCategory::Nonlinear) {
        trace!(
            iterations = report.iterations,
            residual = report.residual_norm,
            solution = ?x,
            "newton solution"
        );
    }
    write_reals(parts.scope, parts.iteration_vars, &x)?;
    Ok(())
}

/// Re-evaluate the residual at the committed values.
fn verify(
    residual: &mut Function,
    runtime: &RuntimeContext,
    scope: &mut VariableBuffer,
    n: usize,
) -> SystemResult<()> {
    let mut f = vec![0.0; n];
    residual.evaluate(runtime, scope, Some(f.as_mut_slice()))?;
    let norm = norm2(&f);
    let tol = runtime.settings().system_tolerance;
    if !residual_accepted(norm, tol) {
        return Err(SystemError::ResidualCheck { norm, tol });
    }
    trace!(residual = norm, "residual check passed");
    Ok(())
}

fn snapshot(scope: &VariableBuffer, slots: &[IndexDescriptor]) -> SystemResult<VariableBuffer> {
    let mut counts = BufferCounts::default();
    for desc in slots {
        match desc.ty {
            VarType::Real => counts.reals += 1,
            VarType::Integer => counts.ints += 1,
            VarType::Boolean => counts.bools += 1,
            _ => {}
        }
    }
    Ok(save_omsi_values(
        scope,
        slots,
        counts.reals,
        counts.ints,
        counts.bools,
    )?)
}
