//! Default-solver selection hook.

use crate::backend::{LinearBackend, SolverKind};

/// Chooses a solver family for an algebraic system once, at setup time.
pub trait SolverSelector {
    fn select(&self, is_linear: bool, n: usize) -> SolverKind;

    /// Backend used when [`SolverSelector::select`] returns [`SolverKind::External`].
    fn external(&self, _n: usize) -> Option<Box<dyn LinearBackend>> {
        None
    }
}

/// Linear loops get `linear`, nonlinear loops get Newton.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultSelector {
    pub linear: SolverKind,
}

impl Default for DefaultSelector {
    fn default() -> Self {
        Self {
            linear: SolverKind::DenseDirect,
        }
    }
}

impl SolverSelector for DefaultSelector {
    fn select(&self, is_linear: bool, _n: usize) -> SolverKind {
        if is_linear {
            self.linear
        } else {
            SolverKind::Newton
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selection() {
        let sel = DefaultSelector::default();
        assert_eq!(sel.select(true, 4), SolverKind::DenseDirect);
        assert_eq!(sel.select(false, 4), SolverKind::Newton);
        assert!(sel.external(4).is_none());

        let tp = DefaultSelector {
            linear: SolverKind::TotalPivot,
        };
        assert_eq!(tp.select(true, 1), SolverKind::TotalPivot);
    }
}
