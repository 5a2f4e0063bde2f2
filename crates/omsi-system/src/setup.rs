//! Instantiation, solver assignment and teardown of function trees.
//!
//! A function owns its algebraic systems; each system owns its residual and
//! Jacobian functions, which may own further systems. All passes here walk
//! that tree depth-first.

use omsi_solver::{SolverInstance, SolverKind, SolverSelector};
use omsi_values::{EquationInfo, IndexDescriptor, VarType, VariableBuffer};
use tracing::debug;

use crate::coloring::{ColumnColoring, SparsityPattern};
use crate::context::{LogCategory, RuntimeContext};
use crate::error::{SystemError, SystemResult};
use crate::function::{Equations, Function, VarStorage};
use crate::system::{AlgebraicSystem, JacobianSource};

/// Storage request for a new function.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageLayout {
    Shared,
    Owned(omsi_values::BufferCounts),
}

/// Variable layout of one generated function.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionLayout {
    pub name: String,
    pub storage: StorageLayout,
    pub input_vars: Vec<IndexDescriptor>,
    pub output_vars: Vec<IndexDescriptor>,
    pub n_inner_vars: usize,
    pub n_zerocrossings: usize,
}

impl FunctionLayout {
    /// Shared-storage layout without inputs, inner variables or zero-crossings.
    pub fn shared(name: impl Into<String>, output_vars: Vec<IndexDescriptor>) -> Self {
        Self {
            name: name.into(),
            storage: StorageLayout::Shared,
            input_vars: Vec::new(),
            output_vars,
            n_inner_vars: 0,
            n_zerocrossings: 0,
        }
    }
}

/// Everything needed to build one [`AlgebraicSystem`].
#[derive(Debug)]
pub struct AlgebraicSystemLayout {
    pub id: usize,
    pub is_linear: bool,
    pub iteration_vars: Vec<IndexDescriptor>,
    pub residual: Function,
    pub jacobian: JacobianSource,
    /// Enables column coloring of the Jacobian.
    pub sparsity: Option<SparsityPattern>,
    pub equation: Option<EquationInfo>,
}

/// What [`free_function`] released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub functions: usize,
    pub systems: usize,
    pub solvers: usize,
    pub owned_buffers: usize,
}

/// Allocate a function for `layout`.
///
/// Descriptors must be real, integer or boolean. With owned storage they are
/// also range-checked against the new buffer.
pub fn instantiate_function(
    layout: FunctionLayout,
    equations: Box<dyn Equations>,
    runtime: &RuntimeContext,
) -> SystemResult<Function> {
    let storage = match layout.storage {
        StorageLayout::Shared => VarStorage::Shared,
        StorageLayout::Owned(counts) => VarStorage::Owned(VariableBuffer::new(counts)),
    };
    let local = match &storage {
        VarStorage::Owned(buf) => Some(buf),
        VarStorage::Shared => None,
    };
    check_descriptors(&layout.input_vars, local, "input")?;
    check_descriptors(&layout.output_vars, local, "output")?;

    if runtime.logs(LogCategory::Setup) {
        debug!(
            function = %layout.name,
            shared = storage.is_shared(),
            inputs = layout.input_vars.len(),
            outputs = layout.output_vars.len(),
            inner = layout.n_inner_vars,
            "instantiated function"
        );
    }
    Ok(Function::from_parts(
        layout.name,
        storage,
        layout.input_vars,
        layout.output_vars,
        layout.n_inner_vars,
        layout.n_zerocrossings,
        equations,
    ))
}

/// Build the algebraic systems of `owner` and attach them.
///
/// Iteration variables live in the owner's workspace; with owned storage they
/// are range-checked against it.
pub fn instantiate_algebraic_system_array(
    owner: &mut Function,
    layouts: Vec<AlgebraicSystemLayout>,
    runtime: &RuntimeContext,
) -> SystemResult<()> {
    if !owner.algebraic_systems().is_empty() {
        return Err(SystemError::Layout {
            what: format!("function '{}' already has algebraic systems", owner.name()),
        });
    }
    let local = match owner.storage() {
        VarStorage::Owned(buf) => Some(buf),
        VarStorage::Shared => None,
    };

    let mut systems = Vec::with_capacity(layouts.len());
    for layout in layouts {
        let n = layout.iteration_vars.len();
        if n == 0 {
            return Err(SystemError::Layout {
                what: format!("algebraic system {} has no iteration variables", layout.id),
            });
        }
        check_descriptors(&layout.iteration_vars, local, "iteration variable")?;
        if layout.residual.n_output_vars() != n {
            return Err(SystemError::Layout {
                what: format!(
                    "algebraic system {}: residual has {} outputs for {n} unknowns",
                    layout.id,
                    layout.residual.n_output_vars()
                ),
            });
        }
        if let JacobianSource::Directional(jac) = &layout.jacobian {
            if jac.n_input_vars() != n || jac.n_output_vars() != n {
                return Err(SystemError::Layout {
                    what: format!(
                        "algebraic system {}: Jacobian has {} seeds and {} outputs \
                         for {n} unknowns",
                        layout.id,
                        jac.n_input_vars(),
                        jac.n_output_vars()
                    ),
                });
            }
        }
        let coloring = match layout.sparsity {
            Some(pattern) if pattern.n_rows() == n && pattern.n_cols() == n => {
                Some(ColumnColoring::greedy(pattern))
            }
            Some(pattern) => {
                return Err(SystemError::Layout {
                    what: format!(
                        "algebraic system {}: sparsity pattern is {}x{} for {n} unknowns",
                        layout.id,
                        pattern.n_rows(),
                        pattern.n_cols()
                    ),
                });
            }
            None => None,
        };
        if runtime.logs(LogCategory::Setup) {
            debug!(
                system = layout.id,
                n,
                linear = layout.is_linear,
                colors = coloring.as_ref().map(ColumnColoring::n_colors),
                "instantiated algebraic system"
            );
        }
        let mut system = AlgebraicSystem {
            id: layout.id,
            is_linear: layout.is_linear,
            equation: layout.equation,
            iteration_vars: layout.iteration_vars,
            zerocrossing_indices: None,
            residual: layout.residual,
            jacobian: layout.jacobian,
            coloring,
            solver: None,
            rollback_vars: Vec::new(),
        };
        system.rollback_vars = system.scope_writes();
        systems.push(system);
    }
    owner.set_algebraic_systems(systems);
    Ok(())
}

/// Give every system in the tree below `function` a solver chosen by `selector`.
///
/// Systems that already have a solver keep it. The rollback set of every
/// system is recomputed on the way, so loops attached to nested functions
/// after their parent was built are covered. Returns the number of solvers
/// allocated.
pub fn set_default_solvers(
    function: &mut Function,
    selector: &dyn SolverSelector,
    runtime: &RuntimeContext,
) -> SystemResult<usize> {
    let settings = runtime.settings();
    let mut allocated = 0;
    visit_systems(function, &mut |system, _| {
        system.rollback_vars = system.scope_writes();
        if system.solver.is_some() {
            return Ok(());
        }
        let n = system.n_iteration_vars();
        let kind = selector.select(system.is_linear, n);
        let solver = match kind {
            SolverKind::External => {
                let backend = selector.external(n).ok_or_else(|| SystemError::Layout {
                    what: format!(
                        "selector chose an external solver for system {} but provided none",
                        system.id
                    ),
                })?;
                SolverInstance::allocate_external(backend, n)?
            }
            kind => SolverInstance::allocate(kind, n, &settings.backend, &settings.newton)?,
        };
        if runtime.logs(LogCategory::Setup) {
            debug!(system = system.id, n, solver = solver.name(), "assigned solver");
        }
        system.solver = Some(solver);
        allocated += 1;
        Ok(())
    })?;
    Ok(allocated)
}

/// Fill the zero-crossing index arrays once the owning functions are final.
///
/// `indices` is asked once per system; every returned index must address a
/// zero-crossing of the function owning the system.
pub fn wire_zerocrossings<F>(function: &mut Function, mut indices: F) -> SystemResult<()>
where
    F: FnMut(&AlgebraicSystem) -> Vec<usize>,
{
    visit_systems(function, &mut |system, n_zerocrossings| {
        let wanted = indices(system);
        if let Some(&bad) = wanted.iter().find(|&&i| i >= n_zerocrossings) {
            return Err(SystemError::Layout {
                what: format!(
                    "system {} references zero-crossing {bad}, owner declares {n_zerocrossings}",
                    system.id
                ),
            });
        }
        system.zerocrossing_indices = Some(wanted);
        Ok(())
    })
}

/// Tear down a function tree.
///
/// Solvers are freed, owned buffers dropped; shared storage belongs to the
/// enclosing scope and is left alone.
pub fn free_function(mut function: Function, runtime: &RuntimeContext) -> TeardownReport {
    let mut report = TeardownReport::default();
    teardown(&mut function, &mut report);
    if runtime.logs(LogCategory::Setup) {
        debug!(
            function = %function.name(),
            functions = report.functions,
            systems = report.systems,
            solvers = report.solvers,
            buffers = report.owned_buffers,
            "freed function"
        );
    }
    report
}

fn teardown(function: &mut Function, report: &mut TeardownReport) {
    for mut system in function.take_algebraic_systems() {
        if let Some(mut solver) = system.solver.take() {
            solver.free();
            report.solvers += 1;
        }
        teardown(&mut system.residual, report);
        if let JacobianSource::Directional(jac) = &mut system.jacobian {
            teardown(jac, report);
        }
        report.systems += 1;
    }
    if function.release_storage() {
        report.owned_buffers += 1;
    }
    report.functions += 1;
}

/// Depth-first walk over every system below `function`.
///
/// The callback also receives the zero-crossing count of the owning function.
fn visit_systems<F>(function: &mut Function, visit: &mut F) -> SystemResult<()>
where
    F: FnMut(&mut AlgebraicSystem, usize) -> SystemResult<()>,
{
    let n_zerocrossings = function.zerocrossings().len();
    for system in function.algebraic_systems_mut() {
        visit(&mut *system, n_zerocrossings)?;
        for child in system.functions_mut() {
            visit_systems(child, visit)?;
        }
    }
    Ok(())
}

fn check_descriptors(
    descriptors: &[IndexDescriptor],
    local: Option<&VariableBuffer>,
    what: &str,
) -> SystemResult<()> {
    for (position, desc) in descriptors.iter().enumerate() {
        match desc.ty {
            VarType::Real | VarType::Integer | VarType::Boolean => {}
            ty => {
                return Err(SystemError::Layout {
                    what: format!("{what} {position} has unsupported type {ty}"),
                });
            }
        }
        if let Some(buf) = local {
            buf.check(*desc)?;
        }
    }
    Ok(())
}
