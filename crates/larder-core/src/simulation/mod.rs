//! Predictive simulation.
//!
//! A [`SimulationJob`] is a private snapshot of one vessel's pools,
//! converters and steady crew draw. Each [`SimulationJob::run_cycle`]
//! advances it by one fixed cycle until every consumed resource is gone,
//! the cycle cap is hit, or an exit is requested. The
//! [`SimulationScheduler`] runs jobs on a background thread so prediction
//! never slows the processing tick.

mod converter;
mod job;
mod scheduler;

pub use converter::SimConverter;
pub use job::{CycleStatus, ResourceEstimate, SimulationJob, SimulationReport};
pub use scheduler::{
    JobCallbacks, JobHandle, JobId, JobResult, SimulationProgress, SimulationScheduler,
};
