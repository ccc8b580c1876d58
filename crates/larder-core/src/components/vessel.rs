//! Vessel component: environment, ledger, installed processors and converters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::resources::VesselLedger;
use crate::processor::ResourceProcessor;
use crate::rules::FlowResult;

pub type VesselId = u32;

/// All vessels, keyed by id.
pub type Vessels = BTreeMap<VesselId, Vessel>;

/// Where a vessel is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Situation {
    #[default]
    Prelaunch,
    Landed,
    Splashed,
    Flying,
    SubOrbital,
    Orbiting,
    Escaping,
    Docked,
}

impl Situation {
    pub fn all() -> &'static [Situation] {
        &[
            Situation::Prelaunch,
            Situation::Landed,
            Situation::Splashed,
            Situation::Flying,
            Situation::SubOrbital,
            Situation::Orbiting,
            Situation::Escaping,
            Situation::Docked,
        ]
    }

    /// Case-insensitive lookup of a config name.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim();
        Situation::all()
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(wanted))
    }

    pub fn name(self) -> &'static str {
        match self {
            Situation::Prelaunch => "Prelaunch",
            Situation::Landed => "Landed",
            Situation::Splashed => "Splashed",
            Situation::Flying => "Flying",
            Situation::SubOrbital => "SubOrbital",
            Situation::Orbiting => "Orbiting",
            Situation::Escaping => "Escaping",
            Situation::Docked => "Docked",
        }
    }
}

/// A resource and a rate (per second for converter specs, per cycle inside
/// the simulator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRatio {
    pub resource: String,
    pub rate: f64,
}

impl ResourceRatio {
    pub fn new(resource: impl Into<String>, rate: f64) -> Self {
        Self {
            resource: resource.into(),
            rate,
        }
    }
}

/// An installed converter (greenhouse, recycler...) as the simulator sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterSpec {
    pub name: String,
    pub inputs: Vec<ResourceRatio>,
    pub outputs: Vec<ResourceRatio>,
    /// Lump outputs delivered once per `yield_cycle_seconds` of running time
    pub yield_outputs: Vec<ResourceRatio>,
    pub yield_cycle_seconds: f64,
    pub is_active: bool,
}

impl ConverterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            yield_outputs: Vec::new(),
            yield_cycle_seconds: 0.0,
            is_active: true,
        }
    }

    pub fn with_input(mut self, resource: &str, per_second: f64) -> Self {
        self.inputs.push(ResourceRatio::new(resource, per_second));
        self
    }

    pub fn with_output(mut self, resource: &str, per_second: f64) -> Self {
        self.outputs.push(ResourceRatio::new(resource, per_second));
        self
    }

    pub fn with_yield(mut self, resource: &str, amount: f64, cycle_seconds: f64) -> Self {
        self.yield_outputs.push(ResourceRatio::new(resource, amount));
        self.yield_cycle_seconds = cycle_seconds;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// The game object that owns pools, processors and converters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    pub id: VesselId,
    pub name: String,
    pub situation: Situation,
    /// Celestial body the vessel is at
    pub body: String,
    pub has_breathable_air: bool,
    /// Surface gravity in g
    pub gravity: f64,
    /// Has a link home
    pub connected: bool,
    pub crew_capacity: u32,
    pub ledger: VesselLedger,
    pub processors: Vec<ResourceProcessor>,
    pub converters: Vec<ConverterSpec>,
    /// Most recent cycle result per resource, for processors later in the tick
    #[serde(skip)]
    pub latest_results: BTreeMap<String, FlowResult>,
}

impl Vessel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn processor(&self, name: &str) -> Option<&ResourceProcessor> {
        self.processors.iter().find(|p| p.name == name)
    }

    pub fn processor_mut(&mut self, name: &str) -> Option<&mut ResourceProcessor> {
        self.processors.iter_mut().find(|p| p.name == name)
    }
}
