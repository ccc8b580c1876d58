//! Save/Load functionality for persisting engine state
//!
//! Uses bincode for a compact binary snapshot. Vessels (ledgers, processors
//! with their accumulated time, converters) and crew events serialize
//! directly; the roster is detached into per-individual snapshots and
//! respawned on load.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::components::Vessel;
use crate::config::Settings;
use crate::engine::ProvisioningEngine;
use crate::error::SaveError;
use crate::roster::IndividualSnapshot;
use crate::rules::CrewEvent;

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the engine state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    pub universal_time: f64,
    pub settings: Settings,
    pub vessels: Vec<Vessel>,
    pub individuals: Vec<IndividualSnapshot>,
    pub crew_events: Vec<CrewEvent>,
}

impl SaveData {
    /// Snapshot `engine`. Per-cycle result caches are not saved.
    pub fn capture(engine: &ProvisioningEngine) -> Self {
        let mut vessels: Vec<Vessel> = engine.vessels.values().cloned().collect();
        for vessel in &mut vessels {
            vessel.latest_results.clear();
            for processor in &mut vessel.processors {
                processor.last_results.clear();
            }
        }
        Self {
            version: SAVE_VERSION,
            universal_time: engine.universal_time(),
            settings: engine.settings.clone(),
            vessels,
            individuals: engine.roster.snapshot(),
            crew_events: engine.crew_events.clone(),
        }
    }
}

/// Save the engine to a writer
pub fn save_game<W: Write>(writer: W, engine: &ProvisioningEngine) -> Result<(), SaveError> {
    bincode::serialize_into(writer, &SaveData::capture(engine))?;
    Ok(())
}

/// Read a save from a reader
pub fn load_game<R: Read>(reader: R) -> Result<SaveData, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }
    Ok(save_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Crewmember, ResourceLedger};
    use crate::config::{ResourceDefinition, ResourceLibrary};
    use crate::processor::ResourceProcessor;
    use crate::rules::{EventCategory, ResourceFlow};
    use crate::testing::VesselBuilder;

    fn engine() -> ProvisioningEngine {
        let mut library = ResourceLibrary::new();
        library.define(ResourceDefinition::shared("Snacks"));
        library.define(ResourceDefinition::per_individual("Stress", 1.0, 10.0));
        let mut engine = ProvisioningEngine::with_seed(Settings::default(), library, 3);
        let vessel = engine.add_vessel(
            VesselBuilder::new("Outpost")
                .with_pool("Snacks", 5.0, 50.0)
                .with_processor(
                    ResourceProcessor::new("Snacks", 100.0).with_input(ResourceFlow::new("Snacks", 1.0)),
                )
                .build(),
        );
        engine.add_individual(Crewmember::new("Jeb", "Pilot"), Some(vessel));
        engine.add_individual(Crewmember::new("Bill", "Engineer"), Some(vessel));
        engine
            .crew_events
            .push(crate::rules::CrewEvent::new("Quiet", EventCategory::Interval { seconds: 500.0 }));
        engine
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut engine = engine();
        engine.update(350.0);
        let before = SaveData::capture(&engine);

        let mut buffer = Vec::new();
        save_game(&mut buffer, &engine).expect("Save failed");
        let loaded = load_game(&buffer[..]).expect("Load failed");
        assert_eq!(loaded, before);

        let vessel = &loaded.vessels[0];
        assert!((vessel.processors[0].remaining_time - 50.0).abs() < 1e-9);
        assert_eq!(vessel.ledger.available("Snacks"), 0.0);
        assert_eq!(loaded.individuals.len(), 2);
    }

    #[test]
    fn test_version_mismatch() {
        let mut data = SaveData::capture(&engine());
        data.version = SAVE_VERSION + 1;
        let buffer = bincode::serialize(&data).expect("encode");
        assert!(matches!(
            load_game(&buffer[..]),
            Err(SaveError::VersionMismatch { found, .. }) if found == SAVE_VERSION + 1
        ));
    }

    #[test]
    fn test_truncated_save_is_error() {
        let mut buffer = Vec::new();
        save_game(&mut buffer, &engine()).expect("Save failed");
        buffer.truncate(buffer.len() / 2);
        assert!(matches!(load_game(&buffer[..]), Err(SaveError::Bincode(_))));
    }
}
