//! Sizing information taken from a parsed model description.

use crate::buffer::BufferCounts;

/// Variable counts per storage class, as read from the model description.
///
/// Aliases share storage with the variable they alias and take no slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModelCounts {
    pub n_states: usize,
    pub n_derivatives: usize,
    pub n_real_vars: usize,
    pub n_int_vars: usize,
    pub n_bool_vars: usize,
    pub n_string_vars: usize,
    pub n_real_parameters: usize,
    pub n_int_parameters: usize,
    pub n_bool_parameters: usize,
    pub n_string_parameters: usize,
    pub n_real_aliases: usize,
    pub n_int_aliases: usize,
    pub n_bool_aliases: usize,
    pub n_string_aliases: usize,
    pub n_zerocrossings: usize,
}

impl ModelCounts {
    /// Slot counts for the global model-variables-and-parameters buffer.
    ///
    /// Reals are laid out as states, derivatives, algebraic variables, parameters.
    pub fn buffer_counts(&self) -> BufferCounts {
        BufferCounts {
            reals: self.n_states + self.n_derivatives + self.n_real_vars + self.n_real_parameters,
            ints: self.n_int_vars + self.n_int_parameters,
            bools: self.n_bool_vars + self.n_bool_parameters,
            externs: self.n_string_vars + self.n_string_parameters,
        }
    }

    /// First real slot of the algebraic variables.
    pub fn real_vars_offset(&self) -> usize {
        self.n_states + self.n_derivatives
    }

    /// First real slot of the parameters.
    pub fn real_parameters_offset(&self) -> usize {
        self.real_vars_offset() + self.n_real_vars
    }
}

/// Per-equation metadata; used for diagnostics only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EquationInfo {
    pub id: usize,
    pub parent: Option<usize>,
    pub defines: Vec<String>,
}

impl EquationInfo {
    /// Short label such as `eq 12 (parent 3) defines x, y`.
    pub fn describe(&self) -> String {
        let mut s = format!("eq {}", self.id);
        if let Some(parent) = self.parent {
            s.push_str(&format!(" (parent {parent})"));
        }
        if !self.defines.is_empty() {
            s.push_str(" defines ");
            s.push_str(&self.defines.join(", "));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_take_no_storage() {
        let counts = ModelCounts {
            n_states: 2,
            n_derivatives: 2,
            n_real_vars: 3,
            n_real_parameters: 1,
            n_real_aliases: 5,
            n_int_vars: 1,
            n_bool_parameters: 2,
            n_string_aliases: 4,
            ..Default::default()
        };
        let b = counts.buffer_counts();
        assert_eq!(b.reals, 8);
        assert_eq!(b.ints, 1);
        assert_eq!(b.bools, 2);
        assert_eq!(b.externs, 0);
        assert_eq!(counts.real_vars_offset(), 4);
        assert_eq!(counts.real_parameters_offset(), 7);
    }

    #[test]
    fn describe_equation() {
        let eq = EquationInfo {
            id: 12,
            parent: Some(3),
            defines: vec!["x".into(), "y".into()],
        };
        assert_eq!(eq.describe(), "eq 12 (parent 3) defines x, y");
        assert_eq!(EquationInfo::default().describe(), "eq 0");
    }
}
