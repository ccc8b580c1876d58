//! Error types for configuration, persistence, processing, and simulation.

use thiserror::Error;

/// Errors raised while reading config documents.
///
/// Only structural problems surface here. Missing or malformed individual
/// fields never error; the owning rule keeps its default instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config document root must be an object, found {0}")]
    NotAnObject(String),
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Recipe preparation failures inside a processor cycle.
///
/// These never leave the processor: they are logged and the cycle runs as
/// an empty recipe.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessError {
    #[error("resource '{0}' is not defined in the resource library")]
    UnknownResource(String),
    #[error("vessel {0} is not registered")]
    UnknownVessel(u32),
}

/// Failures of a predictive simulation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("simulator cycle length must be positive, got {0}")]
    InvalidCycleLength(f64),
    #[error("resource '{resource}' reached a non-finite amount")]
    NonFinite { resource: String },
    #[error("simulation panicked: {0}")]
    Panicked(String),
    #[error("simulation queue is full")]
    QueueFull,
    #[error("simulation scheduler has shut down")]
    SchedulerClosed,
}
