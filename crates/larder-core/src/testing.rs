//! Builders for vessels and crew, used by tests and the harness.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::components::{
    ConverterSpec, Crewmember, IndividualId, LivePools, PartSnapshot, ResourcePool, Situation,
    SnapshotPools, Vessel, VesselId, VesselLedger, Vessels,
};
use crate::config::{ResourceDefinition, ResourceLibrary, Settings};
use crate::notifications::EventLog;
use crate::processor::ResourceProcessor;
use crate::roster::Roster;
use crate::rules::RuleContext;

pub struct VesselBuilder {
    vessel: Vessel,
}

impl VesselBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            vessel: Vessel::new(name),
        }
    }

    /// Add a live pool. Switches a snapshot ledger back to live pools.
    pub fn with_pool(mut self, name: &str, amount: f64, capacity: f64) -> Self {
        let pool = ResourcePool::new(name, amount, capacity);
        match &mut self.vessel.ledger {
            VesselLedger::Live(pools) => pools.insert(pool),
            VesselLedger::Snapshot(_) => {
                let mut pools = LivePools::new();
                pools.insert(pool);
                self.vessel.ledger = VesselLedger::Live(pools);
            }
        }
        self
    }

    /// Add a snapshot part holding `(resource, amount, capacity)` sub-pools.
    pub fn with_part(mut self, part: &str, resources: &[(&str, f64, f64)]) -> Self {
        let part = PartSnapshot {
            name: part.to_string(),
            resources: resources
                .iter()
                .map(|(name, amount, capacity)| ResourcePool::new(*name, *amount, *capacity))
                .collect(),
        };
        match &mut self.vessel.ledger {
            VesselLedger::Snapshot(pools) => pools.add_part(part),
            VesselLedger::Live(_) => {
                let mut pools = SnapshotPools::new();
                pools.add_part(part);
                self.vessel.ledger = VesselLedger::Snapshot(pools);
            }
        }
        self
    }

    pub fn with_situation(mut self, situation: Situation) -> Self {
        self.vessel.situation = situation;
        self
    }

    pub fn at_body(mut self, body: &str) -> Self {
        self.vessel.body = body.to_string();
        self
    }

    pub fn with_breathable_air(mut self, breathable: bool) -> Self {
        self.vessel.has_breathable_air = breathable;
        self
    }

    pub fn with_gravity(mut self, gravity: f64) -> Self {
        self.vessel.gravity = gravity;
        self
    }

    pub fn connected(mut self, connected: bool) -> Self {
        self.vessel.connected = connected;
        self
    }

    pub fn with_crew_capacity(mut self, capacity: u32) -> Self {
        self.vessel.crew_capacity = capacity;
        self
    }

    pub fn with_converter(mut self, converter: ConverterSpec) -> Self {
        self.vessel.converters.push(converter);
        self
    }

    pub fn with_processor(mut self, processor: ResourceProcessor) -> Self {
        self.vessel.processors.push(processor);
        self
    }

    pub fn build(self) -> Vessel {
        self.vessel
    }
}

/// Loose engine state for driving rules directly in tests.
pub struct TestWorld {
    pub vessels: Vessels,
    pub roster: Roster,
    pub settings: Settings,
    pub library: ResourceLibrary,
    pub log: EventLog,
    pub rng: StdRng,
    pub now: f64,
    next_vessel: VesselId,
}

impl TestWorld {
    /// Seeded world with the common shared resources defined.
    pub fn new() -> Self {
        let mut library = ResourceLibrary::new();
        for name in ["Snacks", "Soil", "Food", "Oxygen", "Water", "Ore"] {
            library.define(ResourceDefinition::shared(name));
        }
        Self {
            vessels: Vessels::new(),
            roster: Roster::new(),
            settings: Settings::default(),
            library,
            log: EventLog::new(),
            rng: StdRng::seed_from_u64(42),
            now: 0.0,
            next_vessel: 1,
        }
    }

    /// Add a vessel named "Test Vessel", shaped by `build`.
    pub fn vessel(&mut self, build: impl FnOnce(VesselBuilder) -> VesselBuilder) -> VesselId {
        let id = self.next_vessel;
        self.next_vessel += 1;
        let mut vessel = build(VesselBuilder::new("Test Vessel")).build();
        vessel.id = id;
        self.vessels.insert(id, vessel);
        id
    }

    pub fn crew(&mut self, crewmember: Crewmember, vessel: VesselId) -> IndividualId {
        self.roster
            .add_individual(crewmember, Some(vessel), &self.library)
    }

    pub fn unassigned(&mut self, crewmember: Crewmember) -> IndividualId {
        self.roster.add_individual(crewmember, None, &self.library)
    }

    pub fn context(&mut self) -> RuleContext<'_> {
        RuleContext {
            vessels: &mut self.vessels,
            roster: &mut self.roster,
            settings: &self.settings,
            library: &self.library,
            sink: &mut self.log,
            rng: &mut self.rng,
            now: self.now,
        }
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}
