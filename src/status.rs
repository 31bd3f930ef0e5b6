use serde::{Deserialize, Serialize};
use std::fmt;

/// The SZS status vocabulary used to label verdicts.
///
/// Success values describe what the reasoner established; the rest report
/// why it could not run. Printed exactly as the standard spells them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Status {
    Theorem,
    EquiSatisfiable,
    Satisfiable,
    CounterSatisfiable,
    Unknown,
    GaveUp,
    ResourceOut,
    Inappropriate,
    InputError,
    SyntaxError,
    TypeError,
    UsageError,
}

impl Status {
    /// Whether this status reports a result rather than a failure to run.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Status::Theorem
                | Status::EquiSatisfiable
                | Status::Satisfiable
                | Status::CounterSatisfiable
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Status::Inappropriate
                | Status::InputError
                | Status::SyntaxError
                | Status::TypeError
                | Status::UsageError
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Status::Theorem => "Theorem",
            Status::EquiSatisfiable => "EquiSatisfiable",
            Status::Satisfiable => "Satisfiable",
            Status::CounterSatisfiable => "CounterSatisfiable",
            Status::Unknown => "Unknown",
            Status::GaveUp => "GaveUp",
            Status::ResourceOut => "ResourceOut",
            Status::Inappropriate => "Inappropriate",
            Status::InputError => "InputError",
            Status::SyntaxError => "SyntaxError",
            Status::TypeError => "TypeError",
            Status::UsageError => "UsageError",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_vocabulary() {
        assert_eq!(format!("{}", Status::EquiSatisfiable), "EquiSatisfiable");
        assert_eq!(format!("{}", Status::SyntaxError), "SyntaxError");
    }

    #[test]
    fn test_classification() {
        assert!(Status::Theorem.is_success());
        assert!(!Status::GaveUp.is_success());
        assert!(Status::TypeError.is_error());
        assert!(!Status::Unknown.is_error());
    }
}
