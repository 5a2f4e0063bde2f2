//! Three-level status shared by every layer of the runtime.

use core::fmt;

/// Outcome of an evaluation step.
///
/// Ordered by severity so that combining two outcomes is `max`. A layer may
/// escalate the status it receives but never lowers it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Status {
    /// Success; results were committed.
    #[default]
    Ok,
    /// Recoverable; results were rejected and the previous state retained.
    Warning,
    /// Unrecoverable structural problem; the evaluation must be aborted.
    Fatal,
}

impl Status {
    /// Combine two outcomes, keeping the more severe one.
    pub fn escalate(self, other: Status) -> Status {
        self.max(other)
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    pub fn is_fatal(self) -> bool {
        self == Status::Fatal
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ok => "ok",
            Status::Warning => "warning",
            Status::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_never_lowers() {
        assert_eq!(Status::Ok.escalate(Status::Warning), Status::Warning);
        assert_eq!(Status::Fatal.escalate(Status::Warning), Status::Fatal);
        assert_eq!(Status::Warning.escalate(Status::Ok), Status::Warning);
        assert_eq!(Status::Ok.escalate(Status::Ok), Status::Ok);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(Status::Fatal.to_string(), "fatal");
        assert_eq!(format!("{}", Status::Ok), "ok");
    }
}
