//! One algebraic loop: residual, Jacobian source and solver.

use omsi_core::Status;
use omsi_solver::SolverInstance;
use omsi_values::{EquationInfo, IndexDescriptor, VariableBuffer};

use crate::coloring::ColumnColoring;
use crate::context::RuntimeContext;
use crate::function::Function;
use crate::solve::solve_algebraic_system;

/// How the Jacobian of a loop is obtained.
#[derive(Debug)]
pub enum JacobianSource {
    /// Generated directional-derivative function. Its inputs are the seed
    /// variables, its outputs the derivative of the residual along the seed.
    Directional(Function),
    /// Forward differences of the residual function.
    FiniteDifference,
}

impl JacobianSource {
    pub fn function(&self) -> Option<&Function> {
        match self {
            JacobianSource::Directional(f) => Some(f),
            JacobianSource::FiniteDifference => None,
        }
    }

    pub fn function_mut(&mut self) -> Option<&mut Function> {
        match self {
            JacobianSource::Directional(f) => Some(f),
            JacobianSource::FiniteDifference => None,
        }
    }
}

/// A set of simultaneous equations `F(x) = 0` over `n` iteration variables.
///
/// `residual` maps the iteration variables (read from the enclosing scope) to
/// exactly `n` residual outputs.
#[derive(Debug)]
pub struct AlgebraicSystem {
    pub(crate) id: usize,
    pub(crate) is_linear: bool,
    pub(crate) equation: Option<EquationInfo>,
    pub(crate) iteration_vars: Vec<IndexDescriptor>,
    pub(crate) zerocrossing_indices: Option<Vec<usize>>,
    pub(crate) residual: Function,
    pub(crate) jacobian: JacobianSource,
    pub(crate) coloring: Option<ColumnColoring>,
    pub(crate) solver: Option<SolverInstance>,
    /// Scope slots restored when a solve is rejected.
    pub(crate) rollback_vars: Vec<IndexDescriptor>,
}

impl AlgebraicSystem {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_linear(&self) -> bool {
        self.is_linear
    }

    pub fn n_iteration_vars(&self) -> usize {
        self.iteration_vars.len()
    }

    pub fn iteration_vars(&self) -> &[IndexDescriptor] {
        &self.iteration_vars
    }

    pub fn equation(&self) -> Option<&EquationInfo> {
        self.equation.as_ref()
    }

    /// Slots of the enclosing scope snapshotted before each solve and restored
    /// when the result is rejected.
    pub fn rollback_vars(&self) -> &[IndexDescriptor] {
        &self.rollback_vars
    }

    /// Zero-crossings of the owning function this loop depends on.
    pub fn zerocrossing_indices(&self) -> Option<&[usize]> {
        self.zerocrossing_indices.as_deref()
    }

    pub fn residual(&self) -> &Function {
        &self.residual
    }

    pub fn residual_mut(&mut self) -> &mut Function {
        &mut self.residual
    }

    pub fn jacobian(&self) -> &JacobianSource {
        &self.jacobian
    }

    pub fn coloring(&self) -> Option<&ColumnColoring> {
        self.coloring.as_ref()
    }

    pub fn solver(&self) -> Option<&SolverInstance> {
        self.solver.as_ref()
    }

    pub fn solver_mut(&mut self) -> Option<&mut SolverInstance> {
        self.solver.as_mut()
    }

    /// Install a solver, returning the previous one.
    pub fn set_solver(&mut self, solver: SolverInstance) -> Option<SolverInstance> {
        self.solver.replace(solver)
    }

    /// Solve the loop against `scope` and commit the result there.
    pub fn solve(&mut self, runtime: &RuntimeContext, scope: &mut VariableBuffer) -> Status {
        solve_algebraic_system(self, runtime, scope)
    }

    /// Child functions in depth-first order: residual first, then Jacobian.
    pub(crate) fn functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        std::iter::once(&mut self.residual).chain(self.jacobian.function_mut())
    }

    /// Every scope slot a solve may write.
    ///
    /// That is the iteration variables plus, for each shared-storage function
    /// below this loop, its inputs, its outputs and the slots of the loops it
    /// owns. Owned-storage functions write only their private buffer.
    pub(crate) fn scope_writes(&self) -> Vec<IndexDescriptor> {
        let mut slots = Vec::new();
        self.collect_scope_writes(&mut slots);
        slots
    }

    fn collect_scope_writes(&self, slots: &mut Vec<IndexDescriptor>) {
        push_unique(slots, &self.iteration_vars);
        for function in std::iter::once(&self.residual).chain(self.jacobian.function()) {
            if !function.storage().is_shared() {
                continue;
            }
            push_unique(slots, function.input_vars());
            push_unique(slots, function.output_vars());
            for nested in function.algebraic_systems() {
                nested.collect_scope_writes(slots);
            }
        }
    }
}

fn push_unique(slots: &mut Vec<IndexDescriptor>, descriptors: &[IndexDescriptor]) {
    for desc in descriptors {
        if !slots.contains(desc) {
            slots.push(*desc);
        }
    }
}
