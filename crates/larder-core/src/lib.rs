//! Larder Core - crew provisioning engine
//!
//! Rule-driven periodic resource processing for crewed vessels, plus a
//! side-effect-free predictive simulator that estimates how long each
//! consumed resource will last.
//!
//! # Architecture
//!
//! Two halves share one data model (named resources, ratios, cycle timing):
//! - **Processing**: [`ResourceProcessor`] runs whole cycles out of elapsed
//!   time. Each cycle evaluates [`Precondition`]s, consumes input
//!   [`ResourceFlow`]s, produces outputs, and applies [`Outcome`]s to the
//!   crew who went without.
//! - **Prediction**: [`SimulationJob`] replays the same consumption and
//!   production against a private copy of a vessel's pools, and
//!   [`SimulationScheduler`] drives jobs to completion on a worker thread.
//!
//! Crew live in a [`Roster`] backed by a `hecs` world. Everything is reached
//! through an explicitly owned [`ProvisioningEngine`]; there is no global
//! state.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`components`] | Resource pools and ledgers, vessels, crew components |
//! | [`config`] | Config documents, settings, resource library |
//! | [`engine`] | Context object that owns all state and drives ticks |
//! | [`error`] | Error types |
//! | [`notifications`] | Message/event sink used by outcomes |
//! | [`persistence`] | Versioned bincode save/load |
//! | [`processor`] | Cycle state machine over flows, preconditions, outcomes |
//! | [`roster`] | ECS-backed crew roster |
//! | [`rules`] | Flows, preconditions, outcomes, crew events, registry |
//! | [`simulation`] | Predictive simulator and background scheduler |
//! | [`testing`] | Builders for vessels and crew used by tests and harnesses |
//!
//! # Example
//!
//! ```rust,no_run
//! use larder_core::prelude::*;
//!
//! let mut library = ResourceLibrary::new();
//! library.define(ResourceDefinition::shared("Snacks"));
//!
//! let mut engine = ProvisioningEngine::with_seed(Settings::default(), library, 7);
//! let vessel = engine.add_vessel(
//!     VesselBuilder::new("Outpost").with_pool("Snacks", 50.0, 100.0).build(),
//! );
//! engine.add_individual(Crewmember::new("Jeb", "Pilot"), Some(vessel));
//!
//! loop {
//!     engine.update(60.0);
//! }
//! ```

pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod notifications;
pub mod persistence;
pub mod processor;
pub mod roster;
pub mod rules;
pub mod simulation;
pub mod testing;

pub use components::*;
pub use config::{ConfigNode, ResourceDefinition, ResourceLibrary, Settings};
pub use engine::ProvisioningEngine;
pub use error::{ConfigError, ProcessError, SaveError, SimulationError};
pub use notifications::{EventLog, GameEvent, NotificationSink, NullSink};
pub use processor::ResourceProcessor;
pub use roster::Roster;
pub use rules::{
    Comparison, CrewEvent, FlowKind, FlowResult, Outcome, Precondition, ResourceFlow,
    RuleContext, RuleRegistry,
};
pub use simulation::{
    JobCallbacks, JobHandle, SimConverter, SimulationJob, SimulationReport, SimulationScheduler,
};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::{ConfigNode, ResourceDefinition, ResourceLibrary, Settings};
    pub use crate::engine::ProvisioningEngine;
    pub use crate::error::{ConfigError, ProcessError, SaveError, SimulationError};
    pub use crate::notifications::{EventLog, GameEvent, NotificationSink};
    pub use crate::processor::ResourceProcessor;
    pub use crate::rules::*;
    pub use crate::simulation::*;
    pub use crate::testing::VesselBuilder;
}
