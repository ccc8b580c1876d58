//! Simulation job - fast-forward prediction of how long resources last.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::SimConverter;
use crate::components::{ResourceLedger, ResourcePool, ResourceRatio, Vessel};
use crate::config::Settings;
use crate::error::SimulationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Continue,
    Finished,
}

/// How long one consumed resource lasted in the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceEstimate {
    pub seconds: f64,
    pub cycles: u32,
    /// False means the run ended first: the duration is a lower bound.
    pub depleted: bool,
}

impl ResourceEstimate {
    pub fn is_lower_bound(&self) -> bool {
        !self.depleted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub durations: BTreeMap<String, ResourceEstimate>,
    pub cycles_run: u32,
    /// Stopped by the cycle cap with resources left
    pub capped: bool,
    /// Stopped by an exit request
    pub cancelled: bool,
}

impl SimulationReport {
    pub fn estimate(&self, resource: &str) -> Option<&ResourceEstimate> {
        self.durations.get(resource)
    }

    /// Every estimate is exact.
    pub fn is_complete(&self) -> bool {
        self.durations.values().all(|e| e.depleted)
    }
}

/// A private snapshot of pools, converters and steady rates, advanced one
/// cycle at a time. Nothing here refers back to live state.
#[derive(Debug, Clone)]
pub struct SimulationJob {
    pub label: String,
    pools: BTreeMap<String, ResourcePool>,
    durations: BTreeMap<String, ResourceEstimate>,
    converters: Vec<SimConverter>,
    steady_consumption: Vec<ResourceRatio>,
    steady_production: Vec<ResourceRatio>,
    produced: BTreeSet<String>,
    cycle_length_seconds: f64,
    max_cycles: u32,
    current_cycle: u32,
    exit_requested: bool,
    last_error: Option<SimulationError>,
    prepared: bool,
    report: Option<SimulationReport>,
}

impl SimulationJob {
    pub fn new(cycle_length_seconds: f64, max_cycles: u32) -> Self {
        Self {
            label: String::new(),
            pools: BTreeMap::new(),
            durations: BTreeMap::new(),
            converters: Vec::new(),
            steady_consumption: Vec::new(),
            steady_production: Vec::new(),
            produced: BTreeSet::new(),
            cycle_length_seconds,
            max_cycles,
            current_cycle: 0,
            exit_requested: false,
            last_error: None,
            prepared: false,
            report: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_pool(mut self, name: &str, amount: f64, capacity: f64) -> Self {
        self.pools
            .insert(name.to_string(), ResourcePool::new(name, amount, capacity));
        self
    }

    pub fn with_converter(mut self, converter: SimConverter) -> Self {
        self.converters.push(converter);
        self
    }

    /// Add steady draw per cycle. Repeated resources add up.
    pub fn with_consumption(mut self, resource: &str, per_cycle: f64) -> Self {
        merge(&mut self.steady_consumption, resource, per_cycle);
        self
    }

    pub fn with_production(mut self, resource: &str, per_cycle: f64) -> Self {
        merge(&mut self.steady_production, resource, per_cycle);
        self
    }

    /// Snapshot a vessel for prediction.
    ///
    /// Pools are copied, active converters are scaled to the simulator
    /// cycle, and every shared-pool processor flow becomes a steady rate:
    /// crew-scaled flows multiplied by `crew_count`, then rescaled from the
    /// processor's cycle to the simulator's.
    pub fn from_vessel(vessel: &Vessel, crew_count: u32, settings: &Settings) -> Self {
        let cycle = settings.simulator_cycle_seconds;
        let mut job = SimulationJob::new(cycle, settings.max_simulator_cycles)
            .with_label(vessel.name.clone());

        for pool in vessel.ledger.totals() {
            job.pools.insert(pool.name.clone(), pool);
        }
        job.converters = vessel
            .converters
            .iter()
            .filter(|c| c.is_active)
            .map(|c| SimConverter::from_spec(c, cycle))
            .collect();

        for processor in &vessel.processors {
            if processor.cycle_length_seconds <= 0.0 {
                continue;
            }
            let scale = cycle / processor.cycle_length_seconds;
            for flow in processor.inputs.iter().filter(|f| !f.is_per_individual) {
                let rate = flow.demand(crew_count) * scale;
                merge(&mut job.steady_consumption, &flow.resource_name, rate);
            }
            for flow in processor.outputs.iter().filter(|f| !f.is_per_individual) {
                let rate = flow.demand(crew_count) * scale;
                merge(&mut job.steady_production, &flow.resource_name, rate);
            }
        }
        job
    }

    pub fn current_cycle(&self) -> u32 {
        self.current_cycle
    }

    pub fn max_cycles(&self) -> u32 {
        self.max_cycles
    }

    pub fn cycle_length_seconds(&self) -> f64 {
        self.cycle_length_seconds
    }

    pub fn last_error(&self) -> Option<&SimulationError> {
        self.last_error.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.report.is_some()
    }

    /// Current amount of a pool, while the job still holds its pools.
    pub fn amount(&self, resource: &str) -> Option<f64> {
        self.pools.get(resource).map(|p| p.amount)
    }

    pub fn converter(&self, name: &str) -> Option<&SimConverter> {
        self.converters.iter().find(|c| c.name == name)
    }

    /// Ask the job to stop at its next cycle.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    /// Record an error and stop.
    pub fn fail(&mut self, error: SimulationError) {
        log::warn!("simulation '{}' failed: {}", self.label, error);
        self.last_error = Some(error);
        self.exit_requested = true;
    }

    fn prepare(&mut self) {
        self.produced = self
            .converters
            .iter()
            .flat_map(|c| c.produces().map(str::to_string).collect::<Vec<_>>())
            .chain(self.steady_production.iter().map(|r| r.resource.clone()))
            .collect();
        self.durations = self
            .steady_consumption
            .iter()
            .filter(|r| r.rate != 0.0)
            .map(|r| (r.resource.clone(), ResourceEstimate::default()))
            .collect();
        self.prepared = true;
    }

    /// Advance one cycle.
    pub fn run_cycle(&mut self) -> Result<CycleStatus, SimulationError> {
        if let Some(error) = &self.last_error {
            return Err(error.clone());
        }
        if self.report.is_some() {
            return Ok(CycleStatus::Finished);
        }
        if !(self.cycle_length_seconds > 0.0 && self.cycle_length_seconds.is_finite()) {
            let error = SimulationError::InvalidCycleLength(self.cycle_length_seconds);
            self.fail(error.clone());
            return Err(error);
        }
        if !self.prepared {
            self.prepare();
        }
        if self.exit_requested || self.current_cycle >= self.max_cycles {
            self.finish();
            return Ok(CycleStatus::Finished);
        }

        let cycle = self.cycle_length_seconds;
        for converter in &mut self.converters {
            converter.run(&mut self.pools, &self.produced, cycle);
        }
        // A draw the pool cannot cover counts as depletion even if steady
        // production tops the pool up again in the same cycle.
        let mut ran_dry: BTreeSet<&str> = BTreeSet::new();
        for ratio in &self.steady_consumption {
            if let Some(pool) = self.pools.get_mut(&ratio.resource) {
                if ratio.rate > 0.0 && pool.amount < ratio.rate {
                    ran_dry.insert(ratio.resource.as_str());
                }
                pool.amount = (pool.amount - ratio.rate).max(0.0);
            }
        }
        for ratio in &self.steady_production {
            if let Some(pool) = self.pools.get_mut(&ratio.resource) {
                pool.deposit(ratio.rate);
            }
        }

        if let Some(pool) = self.pools.values().find(|p| !p.amount.is_finite()) {
            let error = SimulationError::NonFinite {
                resource: pool.name.clone(),
            };
            self.fail(error.clone());
            return Err(error);
        }

        for (resource, estimate) in self.durations.iter_mut() {
            if estimate.depleted {
                continue;
            }
            match self.pools.get(resource) {
                Some(pool) if pool.amount > 0.0 && !ran_dry.contains(resource.as_str()) => {
                    estimate.seconds += cycle;
                    estimate.cycles += 1;
                }
                _ => estimate.depleted = true,
            }
        }
        self.current_cycle += 1;

        let depleted = self.durations.values().filter(|e| e.depleted).count();
        if self.current_cycle >= self.max_cycles
            || self.exit_requested
            || depleted >= self.durations.len()
        {
            self.finish();
            return Ok(CycleStatus::Finished);
        }
        Ok(CycleStatus::Continue)
    }

    fn finish(&mut self) {
        let all_depleted = self.durations.values().all(|e| e.depleted);
        let report = SimulationReport {
            durations: std::mem::take(&mut self.durations),
            cycles_run: self.current_cycle,
            capped: self.current_cycle >= self.max_cycles && !all_depleted,
            cancelled: self.exit_requested && self.last_error.is_none(),
        };
        log::debug!(
            "simulation '{}' finished after {} cycles",
            self.label,
            self.current_cycle
        );
        self.pools.clear();
        self.converters.clear();
        self.steady_consumption.clear();
        self.steady_production.clear();
        self.produced.clear();
        self.report = Some(report);
    }

    /// The final report, once finished.
    pub fn report(&self) -> Option<&SimulationReport> {
        self.report.as_ref()
    }

    pub fn take_report(&mut self) -> Option<SimulationReport> {
        self.report.take()
    }

    /// Drive the job to completion on the calling thread.
    pub fn run_to_completion(&mut self) -> Result<SimulationReport, SimulationError> {
        while self.run_cycle()? == CycleStatus::Continue {}
        Ok(self.report.clone().unwrap_or_default())
    }
}

fn merge(ratios: &mut Vec<ResourceRatio>, resource: &str, rate: f64) {
    match ratios.iter_mut().find(|r| r.resource == resource) {
        Some(existing) => existing.rate += rate,
        None => ratios.push(ResourceRatio::new(resource, rate)),
    }
}
