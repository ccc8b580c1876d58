//! Side-effect-free converter used by the predictive simulator.

use std::collections::{BTreeMap, BTreeSet};

use crate::components::{ConverterSpec, ResourcePool, ResourceRatio};

/// A converter with ratios already scaled to one simulator cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConverter {
    pub name: String,
    pub inputs: Vec<ResourceRatio>,
    pub outputs: Vec<ResourceRatio>,
    /// Delivered whole each time `elapsed_yield_time` reaches `yield_cycle_seconds`
    pub yield_outputs: Vec<ResourceRatio>,
    pub yield_cycle_seconds: f64,
    pub elapsed_yield_time: f64,
    pub is_active: bool,
}

impl SimConverter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            yield_outputs: Vec::new(),
            yield_cycle_seconds: 0.0,
            elapsed_yield_time: 0.0,
            is_active: true,
        }
    }

    pub fn with_input(mut self, resource: &str, per_cycle: f64) -> Self {
        self.inputs.push(ResourceRatio::new(resource, per_cycle));
        self
    }

    pub fn with_output(mut self, resource: &str, per_cycle: f64) -> Self {
        self.outputs.push(ResourceRatio::new(resource, per_cycle));
        self
    }

    pub fn with_yield(mut self, resource: &str, amount: f64, cycle_seconds: f64) -> Self {
        self.yield_outputs.push(ResourceRatio::new(resource, amount));
        self.yield_cycle_seconds = cycle_seconds;
        self
    }

    /// Scale an installed converter's per-second ratios to `cycle_seconds`.
    /// Yield amounts are lumps and keep their size.
    pub fn from_spec(spec: &ConverterSpec, cycle_seconds: f64) -> Self {
        let scale = |ratios: &[ResourceRatio]| {
            ratios
                .iter()
                .map(|r| ResourceRatio::new(r.resource.clone(), r.rate * cycle_seconds))
                .collect()
        };
        Self {
            name: spec.name.clone(),
            inputs: scale(&spec.inputs),
            outputs: scale(&spec.outputs),
            yield_outputs: spec.yield_outputs.clone(),
            yield_cycle_seconds: spec.yield_cycle_seconds,
            elapsed_yield_time: 0.0,
            is_active: spec.is_active,
        }
    }

    /// Resources this converter can put into the pools.
    pub fn produces(&self) -> impl Iterator<Item = &str> {
        self.outputs
            .iter()
            .chain(&self.yield_outputs)
            .map(|r| r.resource.as_str())
    }

    /// Run one cycle against `pools`. Returns true if the converter ran.
    ///
    /// An input that is missing from the pools, or empty with nothing in
    /// the model able to refill it, switches the converter off for the rest
    /// of the run. An input that is merely short skips this cycle.
    pub fn run(
        &mut self,
        pools: &mut BTreeMap<String, ResourcePool>,
        produced: &BTreeSet<String>,
        cycle_seconds: f64,
    ) -> bool {
        if !self.is_active {
            return false;
        }

        let starved = self
            .inputs
            .iter()
            .find(|input| match pools.get(&input.resource) {
                None => true,
                Some(pool) => pool.amount <= 0.0 && !produced.contains(&input.resource),
            })
            .map(|input| input.resource.clone());
        if let Some(resource) = starved {
            self.deactivate(&resource);
            return false;
        }
        let satisfiable = self.inputs.iter().all(|input| {
            pools
                .get(&input.resource)
                .map(|p| p.amount >= input.rate)
                .unwrap_or(false)
        });
        if !satisfiable {
            return false;
        }

        for input in &self.inputs {
            if let Some(pool) = pools.get_mut(&input.resource) {
                pool.withdraw(input.rate);
            }
        }
        deposit_all(pools, &self.outputs);

        if !self.yield_outputs.is_empty() && self.yield_cycle_seconds > 0.0 {
            self.elapsed_yield_time += cycle_seconds;
            if self.elapsed_yield_time >= self.yield_cycle_seconds {
                deposit_all(pools, &self.yield_outputs);
                self.elapsed_yield_time = 0.0;
            }
        }
        true
    }

    fn deactivate(&mut self, resource: &str) {
        log::debug!(
            "converter '{}' can never get {} and is switched off",
            self.name,
            resource
        );
        self.is_active = false;
    }
}

fn deposit_all(pools: &mut BTreeMap<String, ResourcePool>, ratios: &[ResourceRatio]) {
    for ratio in ratios {
        if let Some(pool) = pools.get_mut(&ratio.resource) {
            pool.deposit(ratio.rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools(entries: &[(&str, f64, f64)]) -> BTreeMap<String, ResourcePool> {
        entries
            .iter()
            .map(|(n, a, c)| (n.to_string(), ResourcePool::new(*n, *a, *c)))
            .collect()
    }

    #[test]
    fn test_from_spec_scales_to_cycle() {
        let spec = ConverterSpec::new("Greenhouse")
            .with_input("Soil", 0.001)
            .with_output("Snacks", 0.002)
            .with_yield("Snacks", 25.0, 86_400.0);
        let converter = SimConverter::from_spec(&spec, 3600.0);
        assert!((converter.inputs[0].rate - 3.6).abs() < 1e-9);
        assert!((converter.outputs[0].rate - 7.2).abs() < 1e-9);
        assert_eq!(converter.yield_outputs[0].rate, 25.0);
    }

    #[test]
    fn test_missing_input_switches_off_for_good() {
        let mut pools = pools(&[("Food", 0.0, 10.0)]);
        let mut converter = SimConverter::new("Smelter").with_input("Ore", 2.0).with_output("Food", 1.0);
        assert!(!converter.run(&mut pools, &BTreeSet::new(), 1.0));
        assert!(!converter.is_active);
    }

    #[test]
    fn test_short_but_refillable_input_waits() {
        let mut pools = pools(&[("Soil", 0.0, 10.0), ("Snacks", 0.0, 10.0)]);
        let produced: BTreeSet<String> = ["Soil".to_string()].into_iter().collect();
        let mut converter = SimConverter::new("Greenhouse").with_input("Soil", 1.0).with_output("Snacks", 1.0);

        assert!(!converter.run(&mut pools, &produced, 1.0));
        assert!(converter.is_active);
        if let Some(soil) = pools.get_mut("Soil") {
            soil.amount = 1.0;
        }
        assert!(converter.run(&mut pools, &produced, 1.0));
        assert_eq!(pools["Snacks"].amount, 1.0);
    }

    #[test]
    fn test_yield_delivered_per_yield_cycle() {
        let mut pools = pools(&[("Water", 100.0, 100.0), ("Snacks", 0.0, 100.0)]);
        let mut converter = SimConverter::new("Garden")
            .with_input("Water", 1.0)
            .with_yield("Snacks", 10.0, 3.0);

        for _ in 0..2 {
            converter.run(&mut pools, &BTreeSet::new(), 1.0);
        }
        assert_eq!(pools["Snacks"].amount, 0.0);
        converter.run(&mut pools, &BTreeSet::new(), 1.0);
        assert_eq!(pools["Snacks"].amount, 10.0);
        assert_eq!(converter.elapsed_yield_time, 0.0);
    }
}
