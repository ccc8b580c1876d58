//! Outcome sink - player messages and typed game events.
//!
//! Outcomes report through a [`NotificationSink`]. Calls are fire-and-forget:
//! a sink must never block the processing tick.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::components::{IndividualId, VesselId};

/// Typed events raised by outcomes and the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    ReputationChanged { delta: f64 },
    FundsChanged { delta: f64 },
    ScienceChanged { delta: f64 },
    IndividualDied {
        individual: IndividualId,
        vessel: Option<VesselId>,
        cause: String,
    },
    IndividualIncapacitated {
        individual: IndividualId,
        condition: String,
        until: Option<f64>,
    },
    IndividualRecovered {
        individual: IndividualId,
        condition: String,
    },
    CrewEventFired {
        event: String,
        individual: IndividualId,
    },
}

/// Receives player-facing messages and typed events.
pub trait NotificationSink {
    fn post_message(&mut self, message: &str);
    fn fire_event(&mut self, event: GameEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn post_message(&mut self, _message: &str) {}
    fn fire_event(&mut self, _event: GameEvent) {}
}

/// Records everything, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    pub messages: Vec<String>,
    pub events: Vec<GameEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that can be handed to the engine and still read afterwards.
    pub fn shared() -> Arc<Mutex<EventLog>> {
        Arc::new(Mutex::new(EventLog::new()))
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.events.clear();
    }

    pub fn deaths(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, GameEvent::IndividualDied { .. }))
            .count()
    }
}

impl NotificationSink for EventLog {
    fn post_message(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }

    fn fire_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }
}

impl NotificationSink for Arc<Mutex<EventLog>> {
    fn post_message(&mut self, message: &str) {
        match self.lock() {
            Ok(mut log) => log.post_message(message),
            Err(poisoned) => poisoned.into_inner().post_message(message),
        }
    }

    fn fire_event(&mut self, event: GameEvent) {
        match self.lock() {
            Ok(mut log) => log.fire_event(event),
            Err(poisoned) => poisoned.into_inner().fire_event(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_log_records_through_clone() {
        let log = EventLog::shared();
        let mut sink: Box<dyn NotificationSink> = Box::new(Arc::clone(&log));
        sink.post_message("Jeb is hungry");
        sink.fire_event(GameEvent::FundsChanged { delta: -100.0 });

        let log = log.lock().expect("log lock");
        assert_eq!(log.messages, vec!["Jeb is hungry".to_string()]);
        assert_eq!(log.events.len(), 1);
    }
}
