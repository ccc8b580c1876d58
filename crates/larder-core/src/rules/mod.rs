//! Data-driven rules: resource flows, preconditions, outcomes, crew events.
//!
//! Every rule kind is a tagged variant with one dispatch function per
//! operation. Kinds are built from config documents through the
//! [`RuleRegistry`].

mod crew_event;
mod flow;
mod outcome;
mod precondition;
mod registry;

pub use crew_event::*;
pub use flow::*;
pub use outcome::*;
pub use precondition::*;
pub use registry::*;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::components::Vessels;
use crate::config::{ResourceLibrary, Settings};
use crate::notifications::NotificationSink;
use crate::roster::Roster;

/// Everything a rule may read or mutate while it runs.
///
/// Built by the engine for each tick from its own fields; rules never reach
/// any state that is not passed in here.
pub struct RuleContext<'a> {
    pub vessels: &'a mut Vessels,
    pub roster: &'a mut Roster,
    pub settings: &'a Settings,
    pub library: &'a ResourceLibrary,
    pub sink: &'a mut dyn NotificationSink,
    pub rng: &'a mut dyn RngCore,
    /// Universal time of the tick being processed
    pub now: f64,
}

/// Comparison operator used by value checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[default]
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
}

impl Comparison {
    /// Accepts `checkEquals`-style names, bare names, and symbols.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let bare = name
            .strip_prefix("check")
            .or_else(|| name.strip_prefix("Check"))
            .unwrap_or(name);
        match bare.to_ascii_lowercase().as_str() {
            "equals" | "equal" | "==" | "=" => Some(Comparison::Equals),
            "notequal" | "notequals" | "!=" => Some(Comparison::NotEquals),
            "greaterthan" | ">" => Some(Comparison::GreaterThan),
            "lesserthan" | "lessthan" | "<" => Some(Comparison::LessThan),
            "greaterorequal" | ">=" => Some(Comparison::GreaterOrEqual),
            "lesserorequal" | "lessorequal" | "<=" => Some(Comparison::LessOrEqual),
            _ => None,
        }
    }

    pub fn compare_f64(self, value: f64, operand: f64) -> bool {
        match self {
            Comparison::Equals => (value - operand).abs() < f64::EPSILON,
            Comparison::NotEquals => (value - operand).abs() >= f64::EPSILON,
            Comparison::GreaterThan => value > operand,
            Comparison::LessThan => value < operand,
            Comparison::GreaterOrEqual => value >= operand,
            Comparison::LessOrEqual => value <= operand,
        }
    }

    /// Ordering comparisons on strings are lexicographic.
    pub fn compare_str(self, value: &str, operand: &str) -> bool {
        match self {
            Comparison::Equals => value == operand,
            Comparison::NotEquals => value != operand,
            Comparison::GreaterThan => value > operand,
            Comparison::LessThan => value < operand,
            Comparison::GreaterOrEqual => value >= operand,
            Comparison::LessOrEqual => value <= operand,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_names() {
        assert_eq!(Comparison::from_name("checkEquals"), Some(Comparison::Equals));
        assert_eq!(Comparison::from_name("checkNotEqual"), Some(Comparison::NotEquals));
        assert_eq!(Comparison::from_name("checkLesserOrEqual"), Some(Comparison::LessOrEqual));
        assert_eq!(Comparison::from_name(">="), Some(Comparison::GreaterOrEqual));
        assert_eq!(Comparison::from_name("sideways"), None);
    }

    #[test]
    fn test_compare_values() {
        assert!(Comparison::GreaterOrEqual.compare_f64(2.0, 2.0));
        assert!(!Comparison::GreaterThan.compare_f64(2.0, 2.0));
        assert!(Comparison::LessThan.compare_f64(0.1, 0.2));
        assert!(Comparison::NotEquals.compare_str("Pilot", "Engineer"));
        assert!(Comparison::Equals.compare_str("Pilot", "Pilot"));
    }
}
