//! Resource processor - the per-vessel cycle state machine.
//!
//! Elapsed time accumulates in `remaining_time`; every whole cycle it holds
//! is run synchronously, in order. One cycle:
//!
//! 1. Check every flow's resource is defined (otherwise the cycle is empty)
//! 2. Evaluate preconditions; each (precondition, individual) failure takes
//!    one off the effective crew count. Zero effective crew ends the cycle.
//! 3. Consume inputs in order, applying outcomes at once on failure
//! 4. Produce outputs in order, reading the input results
//! 5. Update success/failure counters, reversing outcomes on recovery

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::components::{IndividualId, VesselId};
use crate::config::{ConfigNode, ResourceLibrary};
use crate::error::ProcessError;
use crate::rules::{FlowResult, Outcome, Precondition, ResourceFlow, RuleContext, RuleRegistry};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceProcessor {
    pub name: String,
    pub cycle_length_seconds: f64,
    /// Time owed that has not yet made up a whole cycle
    pub remaining_time: f64,
    pub inputs: Vec<ResourceFlow>,
    pub outputs: Vec<ResourceFlow>,
    pub preconditions: Vec<Precondition>,
    pub outcomes: Vec<Outcome>,
    /// Results of the most recent cycle, keyed by resource
    #[serde(skip)]
    pub last_results: BTreeMap<String, FlowResult>,
}

impl ResourceProcessor {
    pub fn new(name: impl Into<String>, cycle_length_seconds: f64) -> Self {
        Self {
            name: name.into(),
            cycle_length_seconds,
            ..Default::default()
        }
    }

    pub fn with_input(mut self, flow: ResourceFlow) -> Self {
        self.inputs.push(flow);
        self
    }

    pub fn with_output(mut self, flow: ResourceFlow) -> Self {
        self.outputs.push(flow);
        self
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcomes.push(outcome);
        self
    }

    /// Read a `RESOURCE_PROCESSOR` node. Rule kinds unknown to `registry`
    /// are skipped; a missing or non-positive cycle length leaves the
    /// processor inert.
    pub fn from_node(node: &ConfigNode, registry: &RuleRegistry) -> Self {
        let name = node.get_string("name").unwrap_or_default();
        let cycle_length_seconds = node.get_f64("cycleLengthSeconds").unwrap_or(0.0);
        if cycle_length_seconds <= 0.0 {
            log::warn!("Processor '{}' has no usable cycle length and will never run", name);
        }
        Self {
            name,
            cycle_length_seconds,
            remaining_time: 0.0,
            inputs: node
                .nodes_named("INPUT_RESOURCE")
                .map(ResourceFlow::from_node)
                .collect(),
            outputs: node
                .nodes_named("OUTPUT_RESOURCE")
                .map(ResourceFlow::from_node)
                .collect(),
            preconditions: registry.preconditions_of(node),
            outcomes: registry.outcomes_of(node),
            last_results: BTreeMap::new(),
        }
    }

    /// Add `elapsed` seconds and run every whole cycle now owed.
    /// Returns the number of cycles run.
    pub fn process_resources(
        &mut self,
        ctx: &mut RuleContext<'_>,
        vessel: VesselId,
        elapsed: f64,
    ) -> u32 {
        if self.cycle_length_seconds <= 0.0 || !self.cycle_length_seconds.is_finite() {
            return 0;
        }
        if elapsed.is_finite() && elapsed > 0.0 {
            self.remaining_time += elapsed;
        }

        let mut cycles = 0;
        while self.remaining_time >= self.cycle_length_seconds {
            self.remaining_time -= self.cycle_length_seconds;
            self.run_cycle(ctx, vessel);
            cycles += 1;
        }
        cycles
    }

    /// Every flow must name a defined resource.
    pub fn prepare_recipe(&self, library: &ResourceLibrary) -> Result<(), ProcessError> {
        for flow in self.inputs.iter().chain(&self.outputs) {
            if !library.is_defined(&flow.resource_name) {
                return Err(ProcessError::UnknownResource(flow.resource_name.clone()));
            }
        }
        Ok(())
    }

    /// Run one cycle. Errors are logged and the cycle is treated as empty.
    pub fn run_cycle(&mut self, ctx: &mut RuleContext<'_>, vessel: VesselId) {
        self.last_results.clear();
        // A skipped cycle leaves no result behind for later readers
        if let Some(v) = ctx.vessels.get_mut(&vessel) {
            for flow in self.inputs.iter().chain(&self.outputs) {
                v.latest_results.remove(&flow.resource_name);
            }
        }

        let prepared = if ctx.vessels.contains_key(&vessel) {
            self.prepare_recipe(ctx.library)
        } else {
            Err(ProcessError::UnknownVessel(vessel))
        };
        if let Err(e) = prepared {
            log::warn!("Processor '{}' skipped a cycle: {}", self.name, e);
            return;
        }

        let eligible = ctx.roster.eligible_on(vessel);
        let mut effective = eligible.len();
        for precondition in &self.preconditions {
            for &id in &eligible {
                if !precondition.is_valid(ctx, id, Some(vessel)) {
                    effective = effective.saturating_sub(1);
                }
            }
        }
        if effective == 0 {
            log::debug!(
                "Processor '{}' on vessel {}: no effective crew, cycle skipped",
                self.name,
                vessel
            );
            return;
        }
        let participants = &eligible[..effective];
        let crew_count = effective as u32;

        let mut results: BTreeMap<String, FlowResult> = BTreeMap::new();
        let mut ordered: Vec<(bool, FlowResult)> = Vec::new();

        for flow in &self.inputs {
            let result = if flow.is_per_individual {
                flow.consume_from_individuals(ctx.roster, participants)
            } else {
                let Some(v) = ctx.vessels.get_mut(&vessel) else {
                    return;
                };
                let mut result = flow.consume(&mut v.ledger, crew_count);
                result.attribute(participants);
                result
            };
            if !result.succeeded && flow.failure_triggers_outcomes {
                self.apply_outcomes(ctx, vessel, &result);
            }
            results.insert(flow.resource_name.clone(), result.clone());
            ordered.push((flow.clear_on_recovery, result));
        }

        for flow in &self.outputs {
            let result = if flow.is_per_individual {
                flow.produce_for_individuals(ctx.roster, participants, &results)
            } else {
                let Some(v) = ctx.vessels.get_mut(&vessel) else {
                    return;
                };
                let mut result = flow.produce(&mut v.ledger, crew_count, &results);
                result.attribute(participants);
                result
            };
            if !result.succeeded && flow.failure_triggers_outcomes {
                self.apply_outcomes(ctx, vessel, &result);
            }
            results.insert(flow.resource_name.clone(), result.clone());
            ordered.push((flow.clear_on_recovery, result));
        }

        let mut recovered: Vec<IndividualId> = Vec::new();
        for (clear_on_recovery, result) in &ordered {
            for &id in &result.served_individuals {
                if let Some(record) = ctx.roster.record_mut(id) {
                    if record.record_success(&result.resource_name)
                        && *clear_on_recovery
                        && !recovered.contains(&id)
                    {
                        recovered.push(id);
                    }
                }
            }
            for &id in result.failed_individuals() {
                if let Some(record) = ctx.roster.record_mut(id) {
                    record.record_failure(&result.resource_name);
                }
            }
        }
        if !recovered.is_empty() {
            self.recover(ctx, vessel, &recovered);
        }

        log::debug!(
            "Processor '{}' on vessel {}: cycle ran for {} crew",
            self.name,
            vessel,
            crew_count
        );
        if let Some(v) = ctx.vessels.get_mut(&vessel) {
            v.latest_results
                .extend(results.iter().map(|(k, r)| (k.clone(), r.clone())));
        }
        self.last_results = results;
    }

    /// Apply every unconditional outcome in order, then, with random
    /// penalties enabled, one randomly chosen selectable outcome.
    pub fn apply_outcomes(&self, ctx: &mut RuleContext<'_>, vessel: VesselId, result: &FlowResult) {
        for outcome in self.outcomes.iter().filter(|o| !o.selectable_randomly) {
            outcome.apply(ctx, vessel, result);
        }
        if ctx.settings.random_penalties_enabled {
            let candidates: Vec<&Outcome> =
                self.outcomes.iter().filter(|o| o.selectable_randomly).collect();
            if let Some(outcome) = candidates.choose(&mut *ctx.rng) {
                outcome.apply(ctx, vessel, result);
            }
        }
    }

    /// Reverse every outcome of this processor for `individuals`.
    pub fn recover(&self, ctx: &mut RuleContext<'_>, vessel: VesselId, individuals: &[IndividualId]) {
        log::debug!(
            "Processor '{}' clearing outcomes for {:?}",
            self.name,
            individuals
        );
        for outcome in &self.outcomes {
            outcome.remove(ctx, vessel, individuals);
        }
    }
}
