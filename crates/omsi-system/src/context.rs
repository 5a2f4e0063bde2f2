//! Explicit runtime context handed to every setup and solve call.

use crate::settings::SolverSettings;

/// Verbose-logging switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Allocation and teardown of functions, systems and solvers.
    Setup,
    /// Matrix dumps from the Jacobian builder.
    Jacobian,
    /// Right-hand sides and solutions of linear loops.
    Linear,
    /// Newton iterates of nonlinear loops.
    Nonlinear,
}

impl LogCategory {
    const fn bit(self) -> u8 {
        match self {
            LogCategory::Setup => 1,
            LogCategory::Jacobian => 2,
            LogCategory::Linear => 4,
            LogCategory::Nonlinear => 8,
        }
    }
}

/// Settings plus logging switches for one model instance.
#[derive(Clone, Debug, Default)]
pub struct RuntimeContext {
    instance_name: String,
    settings: SolverSettings,
    categories: u8,
}

impl RuntimeContext {
    pub fn new(instance_name: impl Into<String>, settings: SolverSettings) -> Self {
        Self {
            instance_name: instance_name.into(),
            settings,
            categories: 0,
        }
    }

    /// Enable verbose `trace` output for `category`.
    pub fn with_logging(mut self, category: LogCategory) -> Self {
        self.categories |= category.bit();
        self
    }

    pub fn logs(&self, category: LogCategory) -> bool {
        self.categories & category.bit() != 0
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SolverSettings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_independent() {
        let ctx = RuntimeContext::new("model", SolverSettings::default())
            .with_logging(LogCategory::Linear)
            .with_logging(LogCategory::Setup);
        assert!(ctx.logs(LogCategory::Linear));
        assert!(ctx.logs(LogCategory::Setup));
        assert!(!ctx.logs(LogCategory::Jacobian));
        assert!(!ctx.logs(LogCategory::Nonlinear));
        assert_eq!(ctx.instance_name(), "model");
    }
}
