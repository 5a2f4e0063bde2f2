//! Loop files: an explicit `A x = b` plus optional start values and settings.

use std::path::Path;

use omsi_core::{Matrix, Real, Status, Vector};
use omsi_solver::{SolverKind, SolverSelector, SolverStats};
use omsi_system::{
    EvalContext, FunctionLayout, LinearLoop, RuntimeContext, SolverSettings, free_function,
    instantiate_algebraic_system_array, instantiate_function, set_default_solvers,
};
use omsi_values::{IndexDescriptor, VariableBuffer};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CliError, CliResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JacobianMode {
    #[default]
    Directional,
    FiniteDifference,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoopFile {
    #[serde(default)]
    pub name: Option<String>,
    /// Row-major rows of `A`.
    pub matrix: Vec<Vec<Real>>,
    pub rhs: Vec<Real>,
    #[serde(default)]
    pub initial: Option<Vec<Real>>,
    #[serde(default)]
    pub jacobian: JacobianMode,
    #[serde(default)]
    pub settings: Option<SolverSettings>,
}

impl LoopFile {
    /// JSON for `.json` files, YAML otherwise.
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&text)?),
            _ => Ok(serde_yaml::from_str(&text)?),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SolveReport {
    pub name: String,
    pub status: Status,
    pub solver: String,
    pub solution: Vec<Real>,
    pub residual_norm: Real,
    pub stats: SolverStats,
}

/// Every loop gets the same backend.
struct FixedSelector(SolverKind);

impl SolverSelector for FixedSelector {
    fn select(&self, _is_linear: bool, _n: usize) -> SolverKind {
        self.0
    }
}

/// Build the loop as a one-system model, solve it once and tear it down.
pub fn solve_loop(file: &LoopFile, runtime: &RuntimeContext) -> CliResult<SolveReport> {
    let a = Matrix::from_rows(&file.matrix)?;
    let b = Vector::from_slice(&file.rhs);
    let n = b.len();
    let start = match &file.initial {
        Some(x0) if x0.len() != n => {
            return Err(CliError::Invalid(format!(
                "initial guess has {} values for {n} unknowns",
                x0.len()
            )));
        }
        Some(x0) => x0.clone(),
        None => vec![0.0; n],
    };
    let name = file.name.clone().unwrap_or_else(|| "loop".to_string());

    let layout = LinearLoop::new(a.clone(), b.clone())?.layout(
        0,
        IndexDescriptor::real_range(0, n),
        file.jacobian == JacobianMode::Directional,
        runtime,
    )?;
    let mut model = instantiate_function(
        FunctionLayout::shared(name.clone(), Vec::new()),
        Box::new(|cx: &mut EvalContext<'_>| cx.solve_nested(0)),
        runtime,
    )?;
    instantiate_algebraic_system_array(&mut model, vec![layout], runtime)?;
    set_default_solvers(
        &mut model,
        &FixedSelector(runtime.settings().linear_solver),
        runtime,
    )?;

    let mut scope = VariableBuffer::from_reals(&start);
    let status = match model.evaluate(runtime, &mut scope, None) {
        Ok(()) => Status::Ok,
        Err(e) => e.status(),
    };

    let solution = scope.reals().to_vec();
    let mut residual = a.mul_vector(&Vector::from_slice(&solution))?;
    residual.sub_vector(&b)?;
    let system = &model.algebraic_systems()[0];
    let (solver, stats) = system
        .solver()
        .map(|s| (s.name().to_string(), s.stats()))
        .unwrap_or_default();

    let released = free_function(model, runtime);
    info!(loop_name = %name, %status, solvers = released.solvers, "loop finished");

    Ok(SolveReport {
        name,
        status,
        solver,
        solution,
        residual_norm: residual.norm(),
        stats,
    })
}
