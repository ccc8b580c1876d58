//! Kind-name to constructor lookup for preconditions and outcomes.

use std::collections::HashMap;

use super::{Outcome, Precondition};
use crate::config::ConfigNode;

pub type PreconditionBuilder = fn(&ConfigNode) -> Precondition;
pub type OutcomeBuilder = fn(&ConfigNode) -> Outcome;

/// Built once at startup and consulted while loading documents. The kind of
/// a `PRECONDITION` or `OUTCOME` node is its `name` value.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    preconditions: HashMap<String, PreconditionBuilder>,
    outcomes: HashMap<String, OutcomeBuilder>,
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register_precondition("CheckResource", Precondition::check_resource);
        registry.register_precondition("CheckKeyValue", Precondition::check_key_value);
        registry.register_precondition("CheckTrait", Precondition::check_trait);
        registry.register_precondition("CheckSituation", Precondition::check_situation);
        registry.register_precondition("CheckBody", Precondition::check_body);
        registry.register_precondition("CheckBreathableAir", Precondition::check_breathable_air);
        registry.register_precondition("CheckGravityLevel", Precondition::check_gravity_level);
        registry.register_precondition("CheckRandomChance", Precondition::check_random_chance);
        registry.register_precondition("CheckCrewCount", Precondition::check_crew_count);
        registry.register_precondition("CheckProcessorResult", Precondition::check_processor_result);
        registry.register_precondition("CheckCondition", Precondition::check_condition);
        registry.register_precondition("CheckSkillLevel", Precondition::check_skill_level);
        registry.register_precondition("CheckCourage", Precondition::check_courage);
        registry.register_precondition("CheckStupidity", Precondition::check_stupidity);
        registry.register_precondition("CheckBadass", Precondition::check_badass);
        registry.register_precondition("CheckConnection", Precondition::check_connection);

        registry.register_outcome("ConsumeResource", Outcome::consume_resource);
        registry.register_outcome("ProduceResource", Outcome::produce_resource);
        registry.register_outcome("SetCondition", Outcome::set_condition);
        registry.register_outcome("ClearCondition", Outcome::clear_condition);
        registry.register_outcome("SetKeyValue", Outcome::set_key_value);
        registry.register_outcome("RepPenalty", Outcome::rep_penalty);
        registry.register_outcome("FundingPenalty", Outcome::funding_penalty);
        registry.register_outcome("SciencePenalty", Outcome::science_penalty);
        registry.register_outcome("FaintPenalty", Outcome::faint_penalty);
        registry.register_outcome("OnStrikePenalty", Outcome::on_strike_penalty);
        registry.register_outcome("DeathPenalty", Outcome::death_penalty);

        registry
    }

    /// Add or replace a precondition kind.
    pub fn register_precondition(&mut self, kind: impl Into<String>, builder: PreconditionBuilder) {
        self.preconditions.insert(kind.into(), builder);
    }

    /// Add or replace an outcome kind.
    pub fn register_outcome(&mut self, kind: impl Into<String>, builder: OutcomeBuilder) {
        self.outcomes.insert(kind.into(), builder);
    }

    pub fn has_precondition(&self, kind: &str) -> bool {
        self.preconditions.contains_key(kind)
    }

    pub fn has_outcome(&self, kind: &str) -> bool {
        self.outcomes.contains_key(kind)
    }

    /// Build a precondition from its node. Unknown kinds are logged and skipped.
    pub fn build_precondition(&self, node: &ConfigNode) -> Option<Precondition> {
        let kind = node.get("name").unwrap_or_default();
        match self.preconditions.get(kind) {
            Some(build) => Some(build(node)),
            None => {
                log::warn!("Unknown precondition kind '{}', skipped", kind);
                None
            }
        }
    }

    /// Build an outcome from its node. Unknown kinds are logged and skipped.
    pub fn build_outcome(&self, node: &ConfigNode) -> Option<Outcome> {
        let kind = node.get("name").unwrap_or_default();
        match self.outcomes.get(kind) {
            Some(build) => Some(build(node)),
            None => {
                log::warn!("Unknown outcome kind '{}', skipped", kind);
                None
            }
        }
    }

    /// Every buildable `PRECONDITION` child of `node`, in order.
    pub fn preconditions_of(&self, node: &ConfigNode) -> Vec<Precondition> {
        node.nodes_named("PRECONDITION")
            .filter_map(|n| self.build_precondition(n))
            .collect()
    }

    /// Every buildable `OUTCOME` child of `node`, in order.
    pub fn outcomes_of(&self, node: &ConfigNode) -> Vec<Outcome> {
        node.nodes_named("OUTCOME")
            .filter_map(|n| self.build_outcome(n))
            .collect()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut preconditions: Vec<_> = self.preconditions.keys().collect();
        let mut outcomes: Vec<_> = self.outcomes.keys().collect();
        preconditions.sort();
        outcomes.sort();
        f.debug_struct("RuleRegistry")
            .field("preconditions", &preconditions)
            .field("outcomes", &outcomes)
            .finish()
    }
}
