//! Tolerances shared by the linear backends.

use omsi_core::Real;

/// Numerical thresholds for the linear backends.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackendSettings {
    /// Largest accepted `||A x - b||_2` after a linear solve.
    pub residual_tolerance: Real,
    /// Total-pivot search treats a pivot as zero when it is at most this
    /// fraction of the largest entry of `A`.
    pub pivot_epsilon: Real,
    /// A rank-deficient row is consistent when its constant is below this.
    pub underdetermined_tolerance: Real,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            residual_tolerance: 1e-4,
            pivot_epsilon: Real::EPSILON,
            underdetermined_tolerance: 1e-12,
        }
    }
}
