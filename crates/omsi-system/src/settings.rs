//! Runtime configuration for algebraic-system evaluation.

use omsi_core::Real;
use omsi_solver::{BackendSettings, NewtonConfig, SolverKind};

/// How Jacobians are assembled.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct JacobianSettings {
    /// Group structurally independent columns when a sparsity pattern is known.
    pub use_coloring: bool,
    /// Relative perturbation for finite-difference Jacobians.
    pub fd_epsilon: Real,
}

impl Default for JacobianSettings {
    fn default() -> Self {
        Self {
            use_coloring: true,
            fd_epsilon: 1e-7,
        }
    }
}

/// Solver and tolerance configuration.
///
/// Two residual thresholds exist: the backend check inside every linear
/// solve (`backend.residual_tolerance`) and the check on the re-evaluated
/// residual after the solution is written to the model (`system_tolerance`).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverSettings {
    /// Backend chosen for linear loops by the default selector.
    pub linear_solver: SolverKind,
    /// Largest accepted `||F(x)||_2` after committing a solution.
    pub system_tolerance: Real,
    pub backend: BackendSettings,
    pub newton: NewtonConfig,
    pub jacobian: JacobianSettings,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            linear_solver: SolverKind::DenseDirect,
            system_tolerance: 1e-8,
            backend: BackendSettings::default(),
            newton: NewtonConfig::default(),
            jacobian: JacobianSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults() {
        let s = SolverSettings::default();
        assert_eq!(s.linear_solver, SolverKind::DenseDirect);
        assert_eq!(s.system_tolerance, 1e-8);
        assert_eq!(s.backend.residual_tolerance, 1e-4);
        assert!(s.jacobian.use_coloring);
    }
}
