//! Generated equation blocks and the context they evaluate in.

use omsi_core::{Real, Status};
use omsi_values::{IndexDescriptor, VariableBuffer};

use crate::context::RuntimeContext;
use crate::error::{SystemError, SystemResult};
use crate::system::AlgebraicSystem;

/// Where a function keeps its local variables.
#[derive(Debug)]
pub enum VarStorage {
    /// Private buffer owned and freed by the function.
    Owned(VariableBuffer),
    /// The function works directly in the buffer of its enclosing scope.
    Shared,
}

impl VarStorage {
    pub fn is_shared(&self) -> bool {
        matches!(self, VarStorage::Shared)
    }
}

/// Current and previous values of the zero-crossing functions of one block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZeroCrossings {
    current: Vec<Real>,
    previous: Vec<Real>,
}

impl ZeroCrossings {
    pub fn new(n: usize) -> Self {
        Self {
            current: vec![0.0; n],
            previous: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn current(&self) -> &[Real] {
        &self.current
    }

    pub fn previous(&self) -> &[Real] {
        &self.previous
    }

    /// Indices whose sign changed between the previous and current values.
    pub fn crossed(&self) -> Vec<usize> {
        self.current
            .iter()
            .zip(&self.previous)
            .enumerate()
            .filter(|(_, (c, p))| (**c >= 0.0) != (**p >= 0.0))
            .map(|(i, _)| i)
            .collect()
    }

    /// Accept the current values as the new reference.
    pub fn swap(&mut self) {
        self.previous.copy_from_slice(&self.current);
    }
}

/// Variable storage seen by one evaluation.
pub enum Workspace<'a> {
    /// Local and enclosing scope are the same buffer.
    Shared(&'a mut VariableBuffer),
    Private {
        local: &'a mut VariableBuffer,
        model: &'a VariableBuffer,
    },
}

impl Workspace<'_> {
    pub fn local(&self) -> &VariableBuffer {
        match self {
            Workspace::Shared(buf) => buf,
            Workspace::Private { local, .. } => local,
        }
    }

    pub fn local_mut(&mut self) -> &mut VariableBuffer {
        match self {
            Workspace::Shared(buf) => buf,
            Workspace::Private { local, .. } => local,
        }
    }

    /// Buffer of the enclosing scope.
    pub fn model(&self) -> &VariableBuffer {
        match self {
            Workspace::Shared(buf) => buf,
            Workspace::Private { model, .. } => model,
        }
    }
}

/// Everything an [`Equations`] implementation may touch during one call.
pub struct EvalContext<'a> {
    pub vars: Workspace<'a>,
    output: Option<&'a mut [Real]>,
    inputs: &'a [IndexDescriptor],
    outputs: &'a [IndexDescriptor],
    systems: &'a mut [AlgebraicSystem],
    zerocrossings: &'a mut ZeroCrossings,
    runtime: &'a RuntimeContext,
}

impl EvalContext<'_> {
    pub fn runtime(&self) -> &RuntimeContext {
        self.runtime
    }

    pub fn time(&self) -> Real {
        self.vars.model().time()
    }

    pub fn n_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn n_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Value of input `k`, read from the local workspace.
    pub fn input(&self, k: usize) -> SystemResult<Real> {
        let desc = self.inputs.get(k).ok_or_else(|| SystemError::Layout {
            what: format!("input {k} out of range ({} inputs)", self.inputs.len()),
        })?;
        Ok(self.vars.local().read_real(*desc)?)
    }

    /// Read any slot of the enclosing scope.
    pub fn model_value(&self, desc: IndexDescriptor) -> SystemResult<Real> {
        Ok(self.vars.model().read_real(desc)?)
    }

    /// Store output `k`.
    ///
    /// Goes to the caller's output buffer when one was supplied, otherwise
    /// to the output slot in the local workspace.
    pub fn set_output(&mut self, k: usize, value: Real) -> SystemResult<()> {
        let Some(desc) = self.outputs.get(k) else {
            return Err(SystemError::Layout {
                what: format!("output {k} out of range ({} outputs)", self.outputs.len()),
            });
        };
        match self.output.as_deref_mut() {
            Some(out) => out[k] = value,
            None => self.vars.local_mut().write_real(*desc, value)?,
        }
        Ok(())
    }

    pub fn set_zerocrossing(&mut self, index: usize, value: Real) -> SystemResult<()> {
        let len = self.zerocrossings.len();
        let slot = self
            .zerocrossings
            .current
            .get_mut(index)
            .ok_or_else(|| SystemError::Layout {
                what: format!("zero-crossing {index} out of range ({len} declared)"),
            })?;
        *slot = value;
        Ok(())
    }

    pub fn n_systems(&self) -> usize {
        self.systems.len()
    }

    /// Solve the nested algebraic system `index` against the local workspace.
    ///
    /// Any non-ok status is returned as [`SystemError::Nested`] carrying the
    /// nested status.
    pub fn solve_nested(&mut self, index: usize) -> SystemResult<()> {
        let n = self.systems.len();
        let system = self.systems.get_mut(index).ok_or_else(|| SystemError::Layout {
            what: format!("nested system {index} out of range ({n} declared)"),
        })?;
        let status = system.solve(self.runtime, self.vars.local_mut());
        if status == Status::Ok {
            Ok(())
        } else {
            Err(SystemError::Nested {
                system: system.id(),
                status,
            })
        }
    }
}

/// Generated equation code of one function.
pub trait Equations {
    fn evaluate(&mut self, cx: &mut EvalContext<'_>) -> SystemResult<()>;
}

impl<F> Equations for F
where
    F: FnMut(&mut EvalContext<'_>) -> SystemResult<()>,
{
    fn evaluate(&mut self, cx: &mut EvalContext<'_>) -> SystemResult<()> {
        self(cx)
    }
}

/// A block of equations with its variable layout and nested loops.
pub struct Function {
    name: String,
    storage: VarStorage,
    input_vars: Vec<IndexDescriptor>,
    output_vars: Vec<IndexDescriptor>,
    n_inner_vars: usize,
    zerocrossings: ZeroCrossings,
    algebraic_systems: Vec<AlgebraicSystem>,
    equations: Box<dyn Equations>,
}

impl Function {
    pub(crate) fn from_parts(
        name: String,
        storage: VarStorage,
        input_vars: Vec<IndexDescriptor>,
        output_vars: Vec<IndexDescriptor>,
        n_inner_vars: usize,
        n_zerocrossings: usize,
        equations: Box<dyn Equations>,
    ) -> Self {
        Self {
            name,
            storage,
            input_vars,
            output_vars,
            n_inner_vars,
            zerocrossings: ZeroCrossings::new(n_zerocrossings),
            algebraic_systems: Vec::new(),
            equations,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &VarStorage {
        &self.storage
    }

    pub fn input_vars(&self) -> &[IndexDescriptor] {
        &self.input_vars
    }

    pub fn output_vars(&self) -> &[IndexDescriptor] {
        &self.output_vars
    }

    pub fn n_input_vars(&self) -> usize {
        self.input_vars.len()
    }

    pub fn n_output_vars(&self) -> usize {
        self.output_vars.len()
    }

    pub fn n_inner_vars(&self) -> usize {
        self.n_inner_vars
    }

    pub fn zerocrossings(&self) -> &ZeroCrossings {
        &self.zerocrossings
    }

    pub fn swap_zerocrossings(&mut self) {
        self.zerocrossings.swap();
    }

    pub fn algebraic_systems(&self) -> &[AlgebraicSystem] {
        &self.algebraic_systems
    }

    pub fn algebraic_systems_mut(&mut self) -> &mut [AlgebraicSystem] {
        &mut self.algebraic_systems
    }

    pub(crate) fn set_algebraic_systems(&mut self, systems: Vec<AlgebraicSystem>) {
        self.algebraic_systems = systems;
    }

    pub(crate) fn take_algebraic_systems(&mut self) -> Vec<AlgebraicSystem> {
        std::mem::take(&mut self.algebraic_systems)
    }

    /// Storage the function evaluates in, given its enclosing scope.
    pub fn local_mut<'a>(&'a mut self, scope: &'a mut VariableBuffer) -> &'a mut VariableBuffer {
        match &mut self.storage {
            VarStorage::Owned(buf) => buf,
            VarStorage::Shared => scope,
        }
    }

    pub(crate) fn release_storage(&mut self) -> bool {
        let owned = !self.storage.is_shared();
        self.storage = VarStorage::Shared;
        owned
    }

    /// Run the equations once.
    ///
    /// With `output` set, outputs land in that slice (which must hold exactly
    /// one value per output variable); without it they are written to the
    /// output slots of the local workspace.
    pub fn evaluate(
        &mut self,
        runtime: &RuntimeContext,
        scope: &mut VariableBuffer,
        output: Option<&mut [Real]>,
    ) -> SystemResult<()> {
        if let Some(len) = output.as_ref().map(|out| out.len()) {
            if len != self.output_vars.len() {
                return Err(SystemError::Layout {
                    what: format!(
                        "function '{}' writes {} outputs, buffer holds {len}",
                        self.name,
                        self.output_vars.len(),
                    ),
                });
            }
        }

        let Function {
            storage,
            input_vars,
            output_vars,
            zerocrossings,
            algebraic_systems,
            equations,
            ..
        } = self;
        let vars = match storage {
            VarStorage::Shared => Workspace::Shared(scope),
            VarStorage::Owned(local) => Workspace::Private {
                local,
                model: &*scope,
            },
        };
        let mut cx = EvalContext {
            vars,
            output,
            inputs: input_vars,
            outputs: output_vars,
            systems: algebraic_systems,
            zerocrossings,
            runtime,
        };
        equations.evaluate(&mut cx)
    }
}

impl core::fmt::Debug for Function {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("shared", &self.storage.is_shared())
            .field("inputs", &self.input_vars.len())
            .field("outputs", &self.output_vars.len())
            .field("inner", &self.n_inner_vars)
            .field("zerocrossings", &self.zerocrossings.len())
            .field("algebraic_systems", &self.algebraic_systems.len())
            .finish()
    }
}
