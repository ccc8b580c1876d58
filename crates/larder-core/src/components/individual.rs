//! Crew components: identity, persistent record, assignment, activity state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::resources::ResourcePool;
use super::vessel::VesselId;

pub type IndividualId = u32;

/// Who an individual is. Traits are read by preconditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crewmember {
    pub id: IndividualId,
    pub name: String,
    /// Profession / trait name ("Pilot", "Engineer", "Tourist", ...)
    pub profession: String,
    pub experience_level: u8,
    pub courage: f32,
    pub stupidity: f32,
    pub badass: bool,
    /// Exempt individuals (tourists, passengers on contract) never take part in processing
    pub exempt: bool,
}

impl Crewmember {
    pub fn new(name: impl Into<String>, profession: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            profession: profession.into(),
            experience_level: 0,
            courage: 0.5,
            stupidity: 0.5,
            badass: false,
            exempt: false,
        }
    }

    pub fn with_experience(mut self, level: u8) -> Self {
        self.experience_level = level;
        self
    }

    pub fn with_temperament(mut self, courage: f32, stupidity: f32, badass: bool) -> Self {
        self.courage = courage.clamp(0.0, 1.0);
        self.stupidity = stupidity.clamp(0.0, 1.0);
        self.badass = badass;
        self
    }

    pub fn exempt(mut self) -> Self {
        self.exempt = true;
        self
    }
}

/// Persistent per-individual processing state.
///
/// The success and failure counters for a resource are mutually exclusive:
/// recording one always deletes the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndividualRecord {
    pub id: IndividualId,
    pub success_counters: BTreeMap<String, u32>,
    pub failure_counters: BTreeMap<String, u32>,
    /// Status flags set by outcomes ("Fainted", "OnStrike", ...)
    pub conditions: BTreeSet<String>,
    pub key_values: BTreeMap<String, String>,
    /// Preconditions this individual always fails, by precondition name
    pub disqualified_preconditions: BTreeSet<String>,
    /// The individual's own sub-pools for roster-scoped resources
    pub roster_resources: BTreeMap<String, ResourcePool>,
}

impl IndividualRecord {
    pub fn new(id: IndividualId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Count a successful cycle. Returns true if this ended a failure streak.
    pub fn record_success(&mut self, resource: &str) -> bool {
        let recovered = self.failure_counters.remove(resource).is_some();
        *self.success_counters.entry(resource.to_string()).or_insert(0) += 1;
        recovered
    }

    /// Count a failed cycle, ending any success streak.
    pub fn record_failure(&mut self, resource: &str) {
        self.success_counters.remove(resource);
        *self.failure_counters.entry(resource.to_string()).or_insert(0) += 1;
    }

    pub fn consecutive_successes(&self, resource: &str) -> u32 {
        self.success_counters.get(resource).copied().unwrap_or(0)
    }

    pub fn consecutive_failures(&self, resource: &str) -> u32 {
        self.failure_counters.get(resource).copied().unwrap_or(0)
    }

    pub fn clear_counters(&mut self, resource: &str) {
        self.success_counters.remove(resource);
        self.failure_counters.remove(resource);
    }

    pub fn is_disqualified(&self, precondition: &str) -> bool {
        self.disqualified_preconditions.contains(precondition)
    }

    pub fn disqualify(&mut self, precondition: impl Into<String>) {
        self.disqualified_preconditions.insert(precondition.into());
    }

    pub fn requalify(&mut self, precondition: &str) {
        self.disqualified_preconditions.remove(precondition);
    }

    pub fn has_condition(&self, condition: &str) -> bool {
        self.conditions.contains(condition)
    }

    pub fn set_condition(&mut self, condition: impl Into<String>) {
        self.conditions.insert(condition.into());
    }

    pub fn clear_condition(&mut self, condition: &str) -> bool {
        self.conditions.remove(condition)
    }

    pub fn roster_pool(&self, resource: &str) -> Option<&ResourcePool> {
        self.roster_resources.get(resource)
    }

    pub fn roster_pool_mut(&mut self, resource: &str) -> Option<&mut ResourcePool> {
        self.roster_resources.get_mut(resource)
    }
}

/// Which vessel, if any, currently holds the individual.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub vessel: Option<VesselId>,
}

/// Whether the individual can act.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum CrewState {
    #[default]
    Active,
    /// Fainted, on strike, etc. `until` is a universal time, `None` means
    /// until an outcome is removed.
    Inactive {
        condition: String,
        until: Option<f64>,
    },
}

impl CrewState {
    pub fn is_active(&self) -> bool {
        matches!(self, CrewState::Active)
    }
}
