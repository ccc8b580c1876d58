//! Resource flows - one consumed or produced resource of a processor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::{IndividualId, ResourceLedger};
use crate::config::ConfigNode;
use crate::roster::Roster;

/// Declarative description of one resource flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceFlow {
    pub resource_name: String,
    /// Output is scaled by how much of this consumed resource was actually served
    pub dependency_resource_name: Option<String>,
    pub amount_per_cycle: f64,
    pub applies_per_crew_member: bool,
    /// Drawn from each individual's own roster pool instead of the vessel
    pub is_per_individual: bool,
    pub failure_triggers_outcomes: bool,
    /// Reverse the processor's outcomes for an individual when the flow recovers
    pub clear_on_recovery: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowKind {
    Consumption,
    Production,
    #[default]
    NotApplicable,
}

/// What happened to one flow in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    pub resource_name: String,
    pub kind: FlowKind,
    pub succeeded: bool,
    /// Individuals served (all of them on success)
    pub affected_count: u32,
    /// Individuals the flow was asked to serve
    pub requested_count: u32,
    pub current_amount: f64,
    pub capacity: f64,
    /// On failure: who went without. On success: who was served.
    pub affected_individuals: Vec<IndividualId>,
    pub served_individuals: Vec<IndividualId>,
}

impl FlowResult {
    pub fn not_applicable(resource: &str) -> Self {
        Self {
            resource_name: resource.to_string(),
            kind: FlowKind::NotApplicable,
            succeeded: true,
            ..Default::default()
        }
    }

    /// Share of the requested individuals that were served.
    pub fn served_fraction(&self) -> f64 {
        if self.succeeded {
            1.0
        } else if self.requested_count == 0 {
            0.0
        } else {
            (self.affected_count as f64 / self.requested_count as f64).clamp(0.0, 1.0)
        }
    }

    /// Individuals that should get a failure counter.
    pub fn failed_individuals(&self) -> &[IndividualId] {
        if self.succeeded {
            &[]
        } else {
            &self.affected_individuals
        }
    }

    /// Spread a pooled result over `participants`: the first
    /// `affected_count` (roster order) are served, the rest went without.
    pub fn attribute(&mut self, participants: &[IndividualId]) {
        let served = (self.affected_count as usize).min(participants.len());
        self.served_individuals = participants[..served].to_vec();
        self.affected_individuals = if self.succeeded {
            self.served_individuals.clone()
        } else {
            participants[served..].to_vec()
        };
    }
}

impl ResourceFlow {
    pub fn new(resource: impl Into<String>, amount_per_cycle: f64) -> Self {
        Self {
            resource_name: resource.into(),
            dependency_resource_name: None,
            amount_per_cycle: amount_per_cycle.max(0.0),
            applies_per_crew_member: true,
            is_per_individual: false,
            failure_triggers_outcomes: true,
            clear_on_recovery: false,
        }
    }

    pub fn flat(mut self) -> Self {
        self.applies_per_crew_member = false;
        self
    }

    pub fn per_individual(mut self) -> Self {
        self.is_per_individual = true;
        self
    }

    pub fn depends_on(mut self, resource: impl Into<String>) -> Self {
        self.dependency_resource_name = Some(resource.into());
        self
    }

    pub fn silent(mut self) -> Self {
        self.failure_triggers_outcomes = false;
        self
    }

    pub fn clears_on_recovery(mut self) -> Self {
        self.clear_on_recovery = true;
        self
    }

    /// Read a flow from an `INPUT_RESOURCE`/`OUTPUT_RESOURCE` node. Missing
    /// or malformed fields keep their defaults.
    pub fn from_node(node: &ConfigNode) -> Self {
        let defaults = ResourceFlow::new(String::new(), 0.0);
        Self {
            resource_name: node.get_string("resourceName").unwrap_or_default(),
            dependency_resource_name: node
                .get_string("dependencyResourceName")
                .filter(|s| !s.is_empty()),
            amount_per_cycle: node.get_f64("amountPerCycle").unwrap_or(0.0).max(0.0),
            applies_per_crew_member: node
                .get_bool("appliesPerCrewMember")
                .unwrap_or(defaults.applies_per_crew_member),
            is_per_individual: node
                .get_bool("isPerIndividual")
                .unwrap_or(defaults.is_per_individual),
            failure_triggers_outcomes: node
                .get_bool("failureTriggersOutcomes")
                .unwrap_or(defaults.failure_triggers_outcomes),
            clear_on_recovery: node
                .get_bool("clearOnRecovery")
                .unwrap_or(defaults.clear_on_recovery),
        }
    }

    pub fn to_node(&self, node_name: &str) -> ConfigNode {
        let mut node = ConfigNode::new(node_name)
            .with_value("resourceName", &self.resource_name)
            .with_value("amountPerCycle", self.amount_per_cycle)
            .with_value("appliesPerCrewMember", self.applies_per_crew_member)
            .with_value("isPerIndividual", self.is_per_individual)
            .with_value("failureTriggersOutcomes", self.failure_triggers_outcomes)
            .with_value("clearOnRecovery", self.clear_on_recovery);
        if let Some(dep) = &self.dependency_resource_name {
            node = node.with_value("dependencyResourceName", dep);
        }
        node
    }

    /// Nominal demand for `crew_count` individuals.
    pub fn demand(&self, crew_count: u32) -> f64 {
        if self.applies_per_crew_member {
            self.amount_per_cycle * crew_count as f64
        } else {
            self.amount_per_cycle
        }
    }

    /// Draw this cycle's demand from a shared ledger.
    ///
    /// When the ledger cannot cover the full demand, as many individuals are
    /// served as whole per-cycle amounts allow and only that much is taken.
    pub fn consume(&self, ledger: &mut dyn ResourceLedger, crew_count: u32) -> FlowResult {
        let demand = self.demand(crew_count);
        let available = ledger.available(&self.resource_name);

        let (succeeded, affected_count) = if available >= demand {
            ledger.withdraw(&self.resource_name, demand);
            (true, crew_count)
        } else {
            let slots = if self.applies_per_crew_member { crew_count } else { 1 };
            let served = if self.amount_per_cycle > 0.0 {
                ((available / self.amount_per_cycle).floor() as u32).min(slots)
            } else {
                0
            };
            ledger.withdraw(&self.resource_name, served as f64 * self.amount_per_cycle);
            let affected = if self.applies_per_crew_member { served } else { 0 };
            (false, affected)
        };

        FlowResult {
            resource_name: self.resource_name.clone(),
            kind: FlowKind::Consumption,
            succeeded,
            affected_count,
            requested_count: crew_count,
            current_amount: ledger.available(&self.resource_name),
            capacity: ledger.capacity(&self.resource_name),
            ..Default::default()
        }
    }

    /// Draw one per-cycle amount from each participant's own pool.
    pub fn consume_from_individuals(
        &self,
        roster: &mut Roster,
        participants: &[IndividualId],
    ) -> FlowResult {
        let mut result = FlowResult {
            resource_name: self.resource_name.clone(),
            kind: FlowKind::Consumption,
            requested_count: participants.len() as u32,
            ..Default::default()
        };

        for &id in participants {
            let served = match roster
                .record_mut(id)
                .and_then(|r| r.roster_pool_mut(&self.resource_name))
            {
                Some(pool) => {
                    let ok = pool.amount >= self.amount_per_cycle;
                    if ok {
                        pool.withdraw(self.amount_per_cycle);
                    }
                    result.current_amount += pool.amount;
                    result.capacity += pool.capacity;
                    ok
                }
                None => false,
            };
            if served {
                result.served_individuals.push(id);
            } else {
                result.affected_individuals.push(id);
            }
        }

        result.affected_count = result.served_individuals.len() as u32;
        result.succeeded = result.affected_individuals.is_empty();
        if result.succeeded {
            result.affected_individuals = result.served_individuals.clone();
        }
        result
    }

    /// Share of nominal output allowed by the dependency's actual result.
    /// Unknown dependency results allow nothing.
    fn dependency_fraction(&self, prior: &BTreeMap<String, FlowResult>) -> f64 {
        match &self.dependency_resource_name {
            Some(dep) => prior.get(dep).map(FlowResult::served_fraction).unwrap_or(0.0),
            None => 1.0,
        }
    }

    /// Deposit this cycle's output into a shared ledger, clamped to capacity.
    ///
    /// Fails only when the ledger has nowhere to put the resource; a full
    /// pool still counts as success.
    pub fn produce(
        &self,
        ledger: &mut dyn ResourceLedger,
        crew_count: u32,
        prior: &BTreeMap<String, FlowResult>,
    ) -> FlowResult {
        let amount = self.demand(crew_count) * self.dependency_fraction(prior);
        let succeeded = ledger.has_resource(&self.resource_name);
        if succeeded {
            ledger.deposit(&self.resource_name, amount);
        }

        FlowResult {
            resource_name: self.resource_name.clone(),
            kind: FlowKind::Production,
            succeeded,
            affected_count: if succeeded { crew_count } else { 0 },
            requested_count: crew_count,
            current_amount: ledger.available(&self.resource_name),
            capacity: ledger.capacity(&self.resource_name),
            ..Default::default()
        }
    }

    /// Deposit one per-cycle amount into each participant's own pool.
    pub fn produce_for_individuals(
        &self,
        roster: &mut Roster,
        participants: &[IndividualId],
        prior: &BTreeMap<String, FlowResult>,
    ) -> FlowResult {
        let amount = self.amount_per_cycle * self.dependency_fraction(prior);
        let mut result = FlowResult {
            resource_name: self.resource_name.clone(),
            kind: FlowKind::Production,
            requested_count: participants.len() as u32,
            ..Default::default()
        };

        for &id in participants {
            match roster
                .record_mut(id)
                .and_then(|r| r.roster_pool_mut(&self.resource_name))
            {
                Some(pool) => {
                    pool.deposit(amount);
                    result.current_amount += pool.amount;
                    result.capacity += pool.capacity;
                    result.served_individuals.push(id);
                }
                None => result.affected_individuals.push(id),
            }
        }

        result.affected_count = result.served_individuals.len() as u32;
        result.succeeded = result.affected_individuals.is_empty();
        if result.succeeded {
            result.affected_individuals = result.served_individuals.clone();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Crewmember, LivePools, ResourcePool};
    use crate::config::{ResourceDefinition, ResourceLibrary};
    use proptest::prelude::*;

    fn ledger(amount: f64, capacity: f64) -> LivePools {
        let mut pools = LivePools::new();
        pools.insert(ResourcePool::new("Food", amount, capacity));
        pools.insert(ResourcePool::new("Soil", 0.0, 100.0));
        pools
    }

    #[test]
    fn test_consume_full_demand() {
        let mut pools = ledger(10.0, 10.0);
        let result = ResourceFlow::new("Food", 1.0).consume(&mut pools, 3);
        assert!(result.succeeded);
        assert_eq!(result.affected_count, 3);
        assert_eq!(pools.available("Food"), 7.0);
        assert_eq!(result.kind, FlowKind::Consumption);
    }

    #[test]
    fn test_consume_partial_service() {
        // 4.5 Food for 5 crew at 1/cycle: four are fed, 0.5 stays behind
        let mut pools = ledger(4.5, 10.0);
        let result = ResourceFlow::new("Food", 1.0).consume(&mut pools, 5);
        assert!(!result.succeeded);
        assert_eq!(result.affected_count, 4);
        assert!((pools.available("Food") - 0.5).abs() < 1e-12);
        assert!((result.served_fraction() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_consume_flat_flow() {
        let mut pools = ledger(0.5, 10.0);
        let result = ResourceFlow::new("Food", 1.0).flat().consume(&mut pools, 5);
        assert!(!result.succeeded);
        assert_eq!(result.affected_count, 0);
        assert_eq!(pools.available("Food"), 0.5);
    }

    #[test]
    fn test_attribute_splits_participants() {
        let mut pools = ledger(2.0, 10.0);
        let mut result = ResourceFlow::new("Food", 1.0).consume(&mut pools, 3);
        result.attribute(&[7, 8, 9]);
        assert_eq!(result.served_individuals, vec![7, 8]);
        assert_eq!(result.affected_individuals, vec![9]);
        assert_eq!(result.failed_individuals(), &[9]);
    }

    #[test]
    fn test_produce_clamps_and_reports_success_when_full() {
        let mut pools = ledger(10.0, 10.0);
        let result = ResourceFlow::new("Food", 5.0).produce(&mut pools, 2, &BTreeMap::new());
        assert!(result.succeeded);
        assert_eq!(pools.available("Food"), 10.0);

        let again = ResourceFlow::new("Food", 5.0).produce(&mut pools, 2, &BTreeMap::new());
        assert!(again.succeeded);
        assert_eq!(pools.available("Food"), 10.0);
    }

    #[test]
    fn test_produce_missing_pool_fails() {
        let mut pools = ledger(10.0, 10.0);
        let result = ResourceFlow::new("Ore", 1.0).produce(&mut pools, 1, &BTreeMap::new());
        assert!(!result.succeeded);
    }

    #[test]
    fn test_produce_follows_actual_consumption() {
        let mut pools = ledger(2.0, 10.0);
        let mut prior = BTreeMap::new();
        let eaten = ResourceFlow::new("Food", 1.0).consume(&mut pools, 4);
        prior.insert("Food".to_string(), eaten);

        let soil = ResourceFlow::new("Soil", 1.0).depends_on("Food");
        soil.produce(&mut pools, 4, &prior);
        // Only two of four were fed, so only two units of soil
        assert!((pools.available("Soil") - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_produce_unknown_dependency_yields_nothing() {
        let mut pools = ledger(2.0, 10.0);
        let soil = ResourceFlow::new("Soil", 1.0).depends_on("Food");
        let result = soil.produce(&mut pools, 4, &BTreeMap::new());
        assert!(result.succeeded);
        assert_eq!(pools.available("Soil"), 0.0);
    }

    #[test]
    fn test_per_individual_consumption() {
        let mut library = ResourceLibrary::new();
        library.define(ResourceDefinition::per_individual("Morale", 1.5, 5.0));
        let mut roster = Roster::new();
        let a = roster.add_individual(Crewmember::new("Jeb", "Pilot"), Some(1), &library);
        let b = roster.add_individual(Crewmember::new("Bill", "Engineer"), Some(1), &library);
        if let Some(pool) = roster.record_mut(b).and_then(|r| r.roster_pool_mut("Morale")) {
            pool.amount = 0.5;
        }

        let flow = ResourceFlow::new("Morale", 1.0).per_individual();
        let result = flow.consume_from_individuals(&mut roster, &[a, b]);
        assert!(!result.succeeded);
        assert_eq!(result.served_individuals, vec![a]);
        assert_eq!(result.affected_individuals, vec![b]);
        let b_pool = roster.record(b).expect("b").roster_pool("Morale").cloned().expect("pool");
        assert_eq!(b_pool.amount, 0.5);
    }

    #[test]
    fn test_node_roundtrip() {
        let flow = ResourceFlow::new("Soil", 0.25)
            .flat()
            .depends_on("Snacks")
            .clears_on_recovery();
        assert_eq!(ResourceFlow::from_node(&flow.to_node("OUTPUT_RESOURCE")), flow);
    }

    #[test]
    fn test_from_node_defaults_on_bad_fields() {
        let node = ConfigNode::new("INPUT_RESOURCE")
            .with_value("resourceName", "Snacks")
            .with_value("amountPerCycle", "a lot");
        let flow = ResourceFlow::from_node(&node);
        assert_eq!(flow.amount_per_cycle, 0.0);
        assert!(flow.applies_per_crew_member);
    }

    proptest! {
        #[test]
        fn prop_consume_conserves_or_floors(
            amount in 0.0f64..500.0,
            per_cycle in 0.01f64..10.0,
            crew in 0u32..40,
        ) {
            let mut pools = ledger(amount, 1000.0);
            let flow = ResourceFlow::new("Food", per_cycle);
            let demand = flow.demand(crew);
            let result = flow.consume(&mut pools, crew);
            let after = pools.available("Food");

            if amount >= demand {
                prop_assert!(result.succeeded);
                prop_assert_eq!(after, amount - demand);
            } else {
                prop_assert!(!result.succeeded);
                let expected = (amount / per_cycle).floor() as u32;
                prop_assert_eq!(result.affected_count, expected.min(crew));
                prop_assert!(after >= 0.0);
                let taken = result.affected_count as f64 * per_cycle;
                prop_assert!((after - (amount - taken)).abs() < 1e-9);
            }
        }

        #[test]
        fn prop_produce_never_exceeds_capacity(
            start in 0.0f64..100.0,
            per_cycle in 0.0f64..50.0,
            crew in 0u32..10,
            repeats in 1usize..6,
        ) {
            let mut pools = ledger(start, 100.0);
            let flow = ResourceFlow::new("Food", per_cycle);
            for _ in 0..repeats {
                let result = flow.produce(&mut pools, crew, &BTreeMap::new());
                prop_assert!(result.succeeded);
                prop_assert!(pools.available("Food") <= 100.0);
            }
        }
    }
}
