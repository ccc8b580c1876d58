//! Provisioning engine - main entry point that owns all state and drives ticks

use std::io::{self, Read, Write};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::components::{
    CrewState, Crewmember, IndividualId, Vessel, VesselId, Vessels,
};
use crate::config::{ConfigNode, ResourceLibrary, Settings};
use crate::error::SaveError;
use crate::notifications::{GameEvent, NotificationSink, NullSink};
use crate::persistence;
use crate::processor::ResourceProcessor;
use crate::roster::Roster;
use crate::rules::{CrewEvent, RuleContext, RuleRegistry};
use crate::simulation::{SimulationJob, SimulationScheduler};

/// Owns the roster, vessels and rules. The driver calls [`update`] once per
/// tick with the elapsed time.
///
/// [`update`]: ProvisioningEngine::update
pub struct ProvisioningEngine {
    /// Crew roster (ECS world)
    pub roster: Roster,
    pub vessels: Vessels,
    pub settings: Settings,
    pub library: ResourceLibrary,
    /// Rule kinds available to `load_processor` and `load_crew_events`
    pub registry: RuleRegistry,
    pub crew_events: Vec<CrewEvent>,
    sink: Box<dyn NotificationSink>,
    rng: StdRng,
    universal_time: f64,
    next_vessel_id: VesselId,
}

impl ProvisioningEngine {
    /// Create an engine with an entropy-seeded generator
    pub fn new(settings: Settings, library: ResourceLibrary) -> Self {
        Self::with_rng(settings, library, StdRng::from_entropy())
    }

    /// Create an engine whose random rolls are reproducible
    pub fn with_seed(settings: Settings, library: ResourceLibrary, seed: u64) -> Self {
        Self::with_rng(settings, library, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: Settings, library: ResourceLibrary, rng: StdRng) -> Self {
        Self {
            roster: Roster::new(),
            vessels: Vessels::new(),
            settings,
            library,
            registry: RuleRegistry::with_defaults(),
            crew_events: Vec::new(),
            sink: Box::new(NullSink),
            rng,
            universal_time: 0.0,
            next_vessel_id: 1,
        }
    }

    /// Build from a root document holding `SETTINGS`, `RESOURCE_DEFINITION`
    /// and `CREW_EVENT` nodes. Processors are installed per vessel with
    /// [`load_processor`](Self::load_processor).
    pub fn from_config(root: &ConfigNode, seed: u64) -> Self {
        let settings = root
            .node("SETTINGS")
            .map(Settings::from_node)
            .unwrap_or_default();
        let library = ResourceLibrary::from_node(root);
        let mut engine = Self::with_seed(settings, library, seed);
        engine.load_crew_events(root);
        engine
    }

    /// Route outcome messages and events to `sink`
    pub fn with_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn set_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sink = sink;
    }

    pub fn universal_time(&self) -> f64 {
        self.universal_time
    }

    /// Register a vessel and return its id
    pub fn add_vessel(&mut self, mut vessel: Vessel) -> VesselId {
        let id = self.next_vessel_id;
        self.next_vessel_id += 1;
        vessel.id = id;
        log::debug!("vessel {} registered as {}", vessel.name, id);
        self.vessels.insert(id, vessel);
        id
    }

    /// Unregister a vessel. Anyone aboard is left unassigned.
    pub fn remove_vessel(&mut self, id: VesselId) -> Option<Vessel> {
        for individual in self.roster.aboard(id) {
            self.roster.assign(individual, None);
        }
        self.vessels.remove(&id)
    }

    pub fn vessel(&self, id: VesselId) -> Option<&Vessel> {
        self.vessels.get(&id)
    }

    pub fn vessel_mut(&mut self, id: VesselId) -> Option<&mut Vessel> {
        self.vessels.get_mut(&id)
    }

    pub fn add_individual(
        &mut self,
        crewmember: Crewmember,
        vessel: Option<VesselId>,
    ) -> IndividualId {
        self.roster.add_individual(crewmember, vessel, &self.library)
    }

    /// Build a processor from a `RESOURCE_PROCESSOR` node and install it.
    /// Returns false if the vessel is unknown.
    pub fn load_processor(&mut self, vessel: VesselId, node: &ConfigNode) -> bool {
        let processor = ResourceProcessor::from_node(node, &self.registry);
        match self.vessels.get_mut(&vessel) {
            Some(v) => {
                log::debug!("processor '{}' installed on vessel {}", processor.name, vessel);
                v.processors.push(processor);
                true
            }
            None => {
                log::warn!("processor '{}' not installed: no vessel {}", processor.name, vessel);
                false
            }
        }
    }

    /// Load every `CREW_EVENT` child of `root`. Returns how many loaded.
    pub fn load_crew_events(&mut self, root: &ConfigNode) -> usize {
        let before = self.crew_events.len();
        for node in root.nodes_named("CREW_EVENT") {
            if let Some(event) = CrewEvent::from_node(node, &self.registry) {
                self.crew_events.push(event);
            }
        }
        self.crew_events.len() - before
    }

    /// Advance by `elapsed` seconds: wake anyone whose incapacitation has
    /// run out, then process every vessel in id order.
    pub fn update(&mut self, elapsed: f64) {
        if !elapsed.is_finite() || elapsed < 0.0 {
            log::warn!("ignoring update with elapsed time {}", elapsed);
            return;
        }
        self.universal_time += elapsed;
        self.recover_timed_out();

        let ids: Vec<VesselId> = self.vessels.keys().copied().collect();
        for id in ids {
            self.process_vessel(id, elapsed);
        }
    }

    fn recover_timed_out(&mut self) {
        for (id, condition) in self.roster.due_for_recovery(self.universal_time) {
            self.roster.set_state(id, CrewState::Active);
            if let Some(record) = self.roster.record_mut(id) {
                record.clear_condition(&condition);
            }
            log::info!("individual {} recovered from {}", id, condition);
            self.sink.fire_event(GameEvent::IndividualRecovered {
                individual: id,
                condition,
            });
        }
    }

    /// Run one vessel's processors and crew events for `elapsed` seconds.
    /// Returns the number of processor cycles run.
    pub fn process_vessel(&mut self, id: VesselId, elapsed: f64) -> u32 {
        let Some(vessel) = self.vessels.get_mut(&id) else {
            log::warn!("process_vessel: no vessel {}", id);
            return 0;
        };
        let mut processors = std::mem::take(&mut vessel.processors);

        let mut ctx = RuleContext {
            vessels: &mut self.vessels,
            roster: &mut self.roster,
            settings: &self.settings,
            library: &self.library,
            sink: self.sink.as_mut(),
            rng: &mut self.rng,
            now: self.universal_time,
        };
        let mut cycles = 0;
        for processor in processors.iter_mut() {
            cycles += processor.process_resources(&mut ctx, id, elapsed);
        }
        for event in self.crew_events.iter_mut() {
            event.run(&mut ctx, id, elapsed, cycles);
        }

        if let Some(vessel) = self.vessels.get_mut(&id) {
            vessel.processors = processors;
        }
        cycles
    }

    /// Number of individuals on `vessel` that take part in processing
    pub fn crew_count(&self, vessel: VesselId) -> usize {
        self.roster.eligible_on(vessel).len()
    }

    /// Snapshot a vessel for prediction, with its current crew
    pub fn prediction_job(&self, vessel: VesselId) -> Option<SimulationJob> {
        let v = self.vessels.get(&vessel)?;
        let crew = self.crew_count(vessel) as u32;
        Some(SimulationJob::from_vessel(v, crew, &self.settings))
    }

    /// Start a background scheduler reporting progress at the configured
    /// interval.
    pub fn spawn_scheduler(&self, capacity: usize) -> io::Result<SimulationScheduler> {
        SimulationScheduler::spawn(capacity, self.settings.progress_interval)
    }

    /// Save engine state to a writer
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        persistence::save_game(writer, self)
    }

    /// Replace engine state from a reader. The resource library, registry
    /// and sink are configuration and stay as they are.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let loaded = persistence::load_game(reader)?;

        self.universal_time = loaded.universal_time;
        self.settings = loaded.settings;
        self.vessels = loaded
            .vessels
            .into_iter()
            .map(|v| (v.id, v))
            .collect();
        self.next_vessel_id = self.vessels.keys().max().map_or(1, |id| id + 1);
        self.roster = Roster::new();
        for individual in loaded.individuals {
            self.roster.restore(individual);
        }
        self.crew_events = loaded.crew_events;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ResourceLedger;
    use crate::config::ResourceDefinition;
    use crate::notifications::EventLog;
    use crate::rules::{Effect, Lasting, Outcome, ResourceFlow};
    use crate::testing::VesselBuilder;

    fn library() -> ResourceLibrary {
        let mut library = ResourceLibrary::new();
        library.define(ResourceDefinition::shared("Snacks"));
        library.define(ResourceDefinition::shared("Soil"));
        library
    }

    #[test]
    fn test_update_runs_owed_cycles() {
        let mut engine = ProvisioningEngine::with_seed(Settings::default(), library(), 1);
        let vessel = engine.add_vessel(
            VesselBuilder::new("Outpost")
                .with_pool("Snacks", 20.0, 20.0)
                .with_processor(
                    ResourceProcessor::new("Snacks", 60.0).with_input(ResourceFlow::new("Snacks", 1.0)),
                )
                .build(),
        );
        engine.add_individual(Crewmember::new("Jeb", "Pilot"), Some(vessel));
        engine.add_individual(Crewmember::new("Tim", "Tourist").exempt(), Some(vessel));

        engine.update(30.0);
        engine.update(600.0);
        assert_eq!(engine.universal_time(), 630.0);
        let v = engine.vessel(vessel).expect("vessel");
        assert_eq!(v.ledger.available("Snacks"), 10.0);
        assert!((v.processors[0].remaining_time - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_timed_faint_wears_off() {
        let log = EventLog::shared();
        let mut engine = ProvisioningEngine::with_seed(Settings::default(), library(), 1)
            .with_sink(std::sync::Arc::clone(&log));
        let vessel = engine.add_vessel(
            VesselBuilder::new("Outpost")
                .with_pool("Snacks", 0.0, 20.0)
                .with_processor(
                    ResourceProcessor::new("Snacks", 100.0)
                        .with_input(ResourceFlow::new("Snacks", 1.0))
                        .with_outcome(Outcome::new(Effect::Incapacitate {
                            condition: "Fainted".into(),
                            lasting: Lasting::Timed(250.0),
                        })),
                )
                .build(),
        );
        let jeb = engine.add_individual(Crewmember::new("Jeb", "Pilot"), Some(vessel));

        engine.update(100.0);
        assert!(!engine.roster.state(jeb).expect("state").is_active());
        // Take the processor away so nothing re-faints Jeb
        engine.vessel_mut(vessel).expect("vessel").processors.clear();
        engine.update(200.0);
        assert!(!engine.roster.state(jeb).expect("state").is_active());
        engine.update(100.0);
        assert!(engine.roster.state(jeb).expect("state").is_active());
        assert!(!engine.roster.record(jeb).expect("record").has_condition("Fainted"));

        let log = log.lock().expect("log");
        assert!(log
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::IndividualRecovered { individual, .. } if *individual == jeb)));
    }

    #[test]
    fn test_prediction_job_counts_eligible_crew() {
        let mut engine = ProvisioningEngine::with_seed(Settings::default(), library(), 1);
        let vessel = engine.add_vessel(
            VesselBuilder::new("Outpost")
                .with_pool("Snacks", 12.0, 20.0)
                .with_processor(
                    ResourceProcessor::new("Snacks", 3600.0).with_input(ResourceFlow::new("Snacks", 1.0)),
                )
                .build(),
        );
        engine.add_individual(Crewmember::new("Jeb", "Pilot"), Some(vessel));
        engine.add_individual(Crewmember::new("Bill", "Engineer"), Some(vessel));
        engine.add_individual(Crewmember::new("Tim", "Tourist").exempt(), Some(vessel));

        let mut job = engine.prediction_job(vessel).expect("job");
        let report = job.run_to_completion().expect("report");
        // Two eaters, 12 snacks: five whole hours, gone in the sixth
        assert_eq!(report.estimate("Snacks").expect("snacks").cycles, 5);
        assert!(engine.prediction_job(99).is_none());
    }

    #[test]
    fn test_spawned_scheduler_predicts() {
        let mut engine = ProvisioningEngine::with_seed(Settings::default(), library(), 1);
        let vessel = engine.add_vessel(
            VesselBuilder::new("Outpost")
                .with_pool("Snacks", 4.0, 20.0)
                .with_processor(
                    ResourceProcessor::new("Snacks", 3600.0).with_input(ResourceFlow::new("Snacks", 1.0)),
                )
                .build(),
        );
        engine.add_individual(Crewmember::new("Jeb", "Pilot"), Some(vessel));

        let mut scheduler = engine.spawn_scheduler(2).expect("spawn");
        let job = engine.prediction_job(vessel).expect("job");
        let report = scheduler
            .submit(job, crate::simulation::JobCallbacks::new())
            .expect("submit")
            .wait()
            .expect("report");
        assert_eq!(report.estimate("Snacks").expect("snacks").cycles, 3);
        scheduler.shutdown();
    }

    #[test]
    fn test_load_processor_from_node() {
        let mut engine = ProvisioningEngine::with_seed(Settings::default(), library(), 1);
        let vessel = engine.add_vessel(VesselBuilder::new("Outpost").build());
        let node = ConfigNode::new("RESOURCE_PROCESSOR")
            .with_value("name", "Snacks")
            .with_value("cycleLengthSeconds", 3600);
        assert!(engine.load_processor(vessel, &node));
        assert!(!engine.load_processor(42, &node));
        assert!(engine.vessel(vessel).expect("vessel").processor("Snacks").is_some());
    }

    #[test]
    fn test_save_and_load_restore_state() {
        let mut engine = ProvisioningEngine::with_seed(Settings::default(), library(), 1);
        let vessel = engine.add_vessel(
            VesselBuilder::new("Outpost")
                .with_pool("Snacks", 3.0, 20.0)
                .with_processor(
                    ResourceProcessor::new("Snacks", 100.0).with_input(ResourceFlow::new("Snacks", 1.0)),
                )
                .build(),
        );
        let jeb = engine.add_individual(Crewmember::new("Jeb", "Pilot"), Some(vessel));
        engine.update(450.0);

        let mut buffer = Vec::new();
        engine.save(&mut buffer).expect("save");
        let mut restored = ProvisioningEngine::with_seed(Settings::default(), library(), 1);
        restored.load(&buffer[..]).expect("load");

        assert_eq!(restored.universal_time(), 450.0);
        let record = restored.roster.record(jeb).expect("record");
        assert_eq!(record.consecutive_failures("Snacks"), 1);
        drop(record);
        let v = restored.vessel(vessel).expect("vessel");
        assert!((v.processors[0].remaining_time - 50.0).abs() < 1e-9);
        assert!(restored.add_vessel(Vessel::new("Second")) > vessel);
    }

    #[test]
    fn test_negative_elapsed_ignored() {
        let mut engine = ProvisioningEngine::with_seed(Settings::default(), library(), 1);
        engine.update(-5.0);
        engine.update(f64::NAN);
        assert_eq!(engine.universal_time(), 0.0);
    }
}
