//! Jacobian assembly for algebraic loops.
//!
//! Entries are streamed into a sink `(row, col, value)` so the same builder
//! can feed a linear backend directly or fill the matrix of a Newton step.
//! Entries outside the sparsity pattern are never emitted; targets must be
//! zeroed beforehand.

use omsi_core::Real;
use omsi_values::{IndexDescriptor, VariableBuffer, read_reals, set_omsi_value, write_reals};
use tracing::trace;

use crate::coloring::ColumnColoring;
use crate::context::{LogCategory, RuntimeContext};
use crate::error::{SystemError, SystemResult};
use crate::function::Function;
use crate::system::JacobianSource;

/// Build the Jacobian of a loop at the current iteration values in `scope`.
pub fn assemble_jacobian<S>(
    source: &mut JacobianSource,
    residual: &mut Function,
    iteration_vars: &[IndexDescriptor],
    coloring: Option<&ColumnColoring>,
    runtime: &RuntimeContext,
    scope: &mut VariableBuffer,
    sink: S,
) -> SystemResult<()>
where
    S: FnMut(usize, usize, Real) -> SystemResult<()>,
{
    let n = iteration_vars.len();
    if let Some(c) = coloring {
        if c.pattern().n_cols() != n || c.pattern().n_rows() != n {
            return Err(SystemError::Layout {
                what: format!(
                    "coloring pattern is {}x{}, loop has {n} unknowns",
                    c.pattern().n_rows(),
                    c.pattern().n_cols()
                ),
            });
        }
    }
    match source {
        JacobianSource::Directional(jac) => {
            directional_jacobian(jac, n, coloring, runtime, scope, sink)
        }
        JacobianSource::FiniteDifference => {
            let epsilon = runtime.settings().jacobian.fd_epsilon;
            finite_difference_jacobian(
                residual,
                iteration_vars,
                coloring,
                epsilon,
                runtime,
                scope,
                sink,
            )
        }
    }
}

/// Assemble from a directional-derivative function.
///
/// Each column group is seeded with 1, the function is evaluated without an
/// output buffer and the outputs are read back from its workspace. Seeds are
/// zero on return, also when an evaluation fails; the failure is propagated
/// unchanged and no further columns are built.
pub fn directional_jacobian<S>(
    jac: &mut Function,
    n: usize,
    coloring: Option<&ColumnColoring>,
    runtime: &RuntimeContext,
    scope: &mut VariableBuffer,
    mut sink: S,
) -> SystemResult<()>
where
    S: FnMut(usize, usize, Real) -> SystemResult<()>,
{
    if jac.n_input_vars() != n || jac.n_output_vars() != n {
        return Err(SystemError::Layout {
            what: format!(
                "Jacobian function '{}' has {} seeds and {} outputs, loop has {n} unknowns",
                jac.name(),
                jac.n_input_vars(),
                jac.n_output_vars()
            ),
        });
    }
    let seeds = jac.input_vars().to_vec();
    let outputs = jac.output_vars().to_vec();
    let log = runtime.logs(LogCategory::Jacobian);

    set_omsi_value(jac.local_mut(scope), &seeds, n, 0.0)?;
    for group in column_groups(n, coloring) {
        for &col in &group {
            jac.local_mut(scope).write_real(seeds[col], 1.0)?;
        }
        let evaluated = jac.evaluate(runtime, scope, None);
        let local = jac.local_mut(scope);
        for &col in &group {
            local.write_real(seeds[col], 0.0)?;
        }
        evaluated?;

        let column = read_reals(local, &outputs)?;
        if log {
            trace!(columns = ?group, values = ?column, "directional derivative");
        }
        scatter(&group, n, coloring, |row, _| column[row], &mut sink)?;
    }
    Ok(())
}

/// Forward-difference fallback for loops without a derivative function.
///
/// Column `j` uses the step `epsilon * max(|x_j|, 1)`. The iteration
/// variables are restored to their original values on return.
pub fn finite_difference_jacobian<S>(
    residual: &mut Function,
    iteration_vars: &[IndexDescriptor],
    coloring: Option<&ColumnColoring>,
    epsilon: Real,
    runtime: &RuntimeContext,
    scope: &mut VariableBuffer,
    mut sink: S,
) -> SystemResult<()>
where
    S: FnMut(usize, usize, Real) -> SystemResult<()>,
{
    let n = iteration_vars.len();
    let x = read_reals(scope, iteration_vars)?;
    let mut f0 = vec![0.0; n];
    residual.evaluate(runtime, scope, Some(f0.as_mut_slice()))?;

    let steps: Vec<Real> = x.iter().map(|xj| epsilon * xj.abs().max(1.0)).collect();
    let mut f1 = vec![0.0; n];
    for group in column_groups(n, coloring) {
        for &j in &group {
            scope.write_real(iteration_vars[j], x[j] + steps[j])?;
        }
        let evaluated = residual.evaluate(runtime, scope, Some(f1.as_mut_slice()));
        write_reals(scope, iteration_vars, &x)?;
        evaluated?;

        scatter(
            &group,
            n,
            coloring,
            |row, col| (f1[row] - f0[row]) / steps[col],
            &mut sink,
        )?;
    }
    if runtime.logs(LogCategory::Jacobian) {
        trace!(n, "finite-difference Jacobian assembled");
    }
    Ok(())
}

fn column_groups(n: usize, coloring: Option<&ColumnColoring>) -> Vec<Vec<usize>> {
    match coloring {
        Some(c) => c.groups().to_vec(),
        None => (0..n).map(|c| vec![c]).collect(),
    }
}

fn scatter<V, S>(
    group: &[usize],
    n_rows: usize,
    coloring: Option<&ColumnColoring>,
    value: V,
    sink: &mut S,
) -> SystemResult<()>
where
    V: Fn(usize, usize) -> Real,
    S: FnMut(usize, usize, Real) -> SystemResult<()>,
{
    for &col in group {
        match coloring {
            Some(c) => {
                for &row in c.pattern().column_rows(col) {
                    sink(row, col, value(row, col))?;
                }
            }
            None => {
                for row in 0..n_rows {
                    sink(row, col, value(row, col))?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coloring::SparsityPattern;
    use crate::function::{EvalContext, VarStorage};
    use omsi_core::{Matrix, Status};
    use omsi_values::BufferCounts;

    /// Residual of `[x0^2 + x1, 3 x1]` reading x from scope slots 0 and 1.
    fn residual() -> Function {
        let vars = IndexDescriptor::real_range(0, 2);
        Function::from_parts(
            "residual".into(),
            VarStorage::Owned(VariableBuffer::new(BufferCounts::reals(2))),
            Vec::new(),
            IndexDescriptor::real_range(0, 2),
            0,
            0,
            Box::new(move |cx: &mut EvalContext<'_>| {
                let x0 = cx.model_value(vars[0])?;
                let x1 = cx.model_value(vars[1])?;
                cx.set_output(0, x0 * x0 + x1)?;
                cx.set_output(1, 3.0 * x1)
            }),
        )
    }

    /// Directional derivative of the residual above, seeds at 0..2, outputs at 2..4.
    fn derivative(fail_on_second: bool) -> Function {
        let vars = IndexDescriptor::real_range(0, 2);
        Function::from_parts(
            "jacobian".into(),
            VarStorage::Owned(VariableBuffer::new(BufferCounts::reals(4))),
            IndexDescriptor::real_range(0, 2),
            IndexDescriptor::real_range(2, 2),
            0,
            0,
            Box::new(move |cx: &mut EvalContext<'_>| {
                let x0 = cx.model_value(vars[0])?;
                let (s0, s1) = (cx.input(0)?, cx.input(1)?);
                if fail_on_second && s1 != 0.0 {
                    return Err(SystemError::fatal("derivative unavailable"));
                }
                cx.set_output(0, 2.0 * x0 * s0 + s1)?;
                cx.set_output(1, 3.0 * s1)
            }),
        )
    }

    type Sink<'a> = &'a mut dyn FnMut(usize, usize, Real) -> SystemResult<()>;

    fn into_matrix(build: impl FnOnce(Sink<'_>) -> SystemResult<()>) -> SystemResult<Matrix> {
        let mut m = Matrix::zeros(2, 2);
        build(&mut |r, c, v| {
            m.set(r, c, v)?;
            Ok(())
        })?;
        Ok(m)
    }

    #[test]
    fn directional_columns() {
        let rt = RuntimeContext::default();
        let mut scope = VariableBuffer::from_reals(&[2.0, 5.0]);
        let mut jac = derivative(false);
        let m = into_matrix(|sink| directional_jacobian(&mut jac, 2, None, &rt, &mut scope, sink))
            .unwrap();
        assert_eq!(m.get(0, 0).unwrap(), 4.0);
        assert_eq!(m.get(0, 1).unwrap(), 1.0);
        assert_eq!(m.get(1, 0).unwrap(), 0.0);
        assert_eq!(m.get(1, 1).unwrap(), 3.0);
        assert_eq!(&jac.local_mut(&mut scope).reals()[..2], &[0.0, 0.0]);
    }

    #[test]
    fn failing_column_aborts_and_clears_seeds() {
        let rt = RuntimeContext::default();
        let mut scope = VariableBuffer::from_reals(&[2.0, 5.0]);
        let mut jac = derivative(true);
        let mut written = Vec::new();
        let err = directional_jacobian(&mut jac, 2, None, &rt, &mut scope, |r, c, _| {
            written.push((r, c));
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err.status(), Status::Fatal);
        assert!(written.iter().all(|&(_, c)| c == 0));
        assert_eq!(&jac.local_mut(&mut scope).reals()[..2], &[0.0, 0.0]);
    }

    #[test]
    fn finite_difference_matches_directional() {
        let rt = RuntimeContext::default();
        let mut scope = VariableBuffer::from_reals(&[2.0, 5.0]);
        let mut res = residual();
        let vars = IndexDescriptor::real_range(0, 2);
        let m = into_matrix(|sink| {
            finite_difference_jacobian(&mut res, &vars, None, 1e-7, &rt, &mut scope, sink)
        })
        .unwrap();
        assert!((m.get(0, 0).unwrap() - 4.0).abs() < 1e-5);
        assert!((m.get(0, 1).unwrap() - 1.0).abs() < 1e-5);
        assert!(m.get(1, 0).unwrap().abs() < 1e-5);
        assert!((m.get(1, 1).unwrap() - 3.0).abs() < 1e-5);
        assert_eq!(scope.reals(), &[2.0, 5.0]);
    }

    #[test]
    fn colored_finite_difference_uses_pattern() {
        let rt = RuntimeContext::default();
        let mut scope = VariableBuffer::from_reals(&[2.0, 5.0]);
        let mut res = residual();
        let vars = IndexDescriptor::real_range(0, 2);
        let pattern = SparsityPattern::new(2, 2, &[(0, 0), (0, 1), (1, 1)]).unwrap();
        let coloring = ColumnColoring::greedy(pattern);
        let mut entries = Vec::new();
        let sink = |r: usize, c: usize, v: Real| -> SystemResult<()> {
            entries.push((r, c, v));
            Ok(())
        };
        finite_difference_jacobian(&mut res, &vars, Some(&coloring), 1e-7, &rt, &mut scope, sink)
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert!(!entries.iter().any(|&(r, c, _)| r == 1 && c == 0));
    }
}
