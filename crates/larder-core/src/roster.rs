//! Crew roster backed by a `hecs` world.
//!
//! Each individual is an entity carrying [`Crewmember`], [`IndividualRecord`],
//! [`Assignment`] and [`CrewState`]. Permanent removal despawns the entity.

use std::collections::BTreeMap;

use hecs::{Entity, World};

use crate::components::{
    Assignment, CrewState, Crewmember, IndividualId, IndividualRecord, ResourcePool, VesselId,
};
use crate::config::ResourceLibrary;

/// All components of one individual, detached from the world.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IndividualSnapshot {
    pub crewmember: Crewmember,
    pub record: IndividualRecord,
    pub assignment: Assignment,
    pub state: CrewState,
}

pub struct Roster {
    world: World,
    index: BTreeMap<IndividualId, Entity>,
    next_id: IndividualId,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            index: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Add a new individual. Every roster resource in the library is seeded
    /// onto their record at its default amount.
    pub fn add_individual(
        &mut self,
        mut crewmember: Crewmember,
        vessel: Option<VesselId>,
        library: &ResourceLibrary,
    ) -> IndividualId {
        let id = self.next_id;
        self.next_id += 1;
        crewmember.id = id;

        let mut record = IndividualRecord::new(id);
        for def in library.per_individual() {
            record.roster_resources.insert(
                def.name.clone(),
                ResourcePool::new(def.name.clone(), def.default_amount, def.default_capacity),
            );
        }

        let entity = self.world.spawn((
            crewmember,
            record,
            Assignment { vessel },
            CrewState::Active,
        ));
        self.index.insert(id, entity);
        id
    }

    /// Re-insert a previously saved individual, keeping their id.
    pub fn restore(&mut self, snapshot: IndividualSnapshot) -> IndividualId {
        let id = snapshot.crewmember.id;
        if let Some(old) = self.index.remove(&id) {
            let _ = self.world.despawn(old);
        }
        let entity = self.world.spawn((
            snapshot.crewmember,
            snapshot.record,
            snapshot.assignment,
            snapshot.state,
        ));
        self.index.insert(id, entity);
        self.next_id = self.next_id.max(id + 1);
        id
    }

    /// Permanently remove an individual. Returns false if unknown.
    pub fn remove_individual(&mut self, id: IndividualId) -> bool {
        match self.index.remove(&id) {
            Some(entity) => self.world.despawn(entity).is_ok(),
            None => false,
        }
    }

    pub fn contains(&self, id: IndividualId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// All ids in ascending order.
    pub fn ids(&self) -> Vec<IndividualId> {
        self.index.keys().copied().collect()
    }

    pub fn crewmember(&self, id: IndividualId) -> Option<hecs::Ref<'_, Crewmember>> {
        let entity = *self.index.get(&id)?;
        self.world.get::<&Crewmember>(entity).ok()
    }

    pub fn name(&self, id: IndividualId) -> Option<String> {
        self.crewmember(id).map(|c| c.name.clone())
    }

    pub fn record(&self, id: IndividualId) -> Option<hecs::Ref<'_, IndividualRecord>> {
        let entity = *self.index.get(&id)?;
        self.world.get::<&IndividualRecord>(entity).ok()
    }

    pub fn record_mut(&mut self, id: IndividualId) -> Option<&mut IndividualRecord> {
        let entity = *self.index.get(&id)?;
        self.world
            .query_one_mut::<&mut IndividualRecord>(entity)
            .ok()
    }

    pub fn assignment(&self, id: IndividualId) -> Option<Assignment> {
        let entity = *self.index.get(&id)?;
        self.world.get::<&Assignment>(entity).ok().map(|a| *a)
    }

    /// The vessel currently holding the individual.
    pub fn resolve_vessel(&self, id: IndividualId) -> Option<VesselId> {
        self.assignment(id).and_then(|a| a.vessel)
    }

    pub fn assign(&mut self, id: IndividualId, vessel: Option<VesselId>) -> bool {
        let Some(&entity) = self.index.get(&id) else {
            return false;
        };
        match self.world.query_one_mut::<&mut Assignment>(entity) {
            Ok(assignment) => {
                assignment.vessel = vessel;
                true
            }
            Err(_) => false,
        }
    }

    pub fn state(&self, id: IndividualId) -> Option<CrewState> {
        let entity = *self.index.get(&id)?;
        self.world.get::<&CrewState>(entity).ok().map(|s| (*s).clone())
    }

    pub fn set_state(&mut self, id: IndividualId, state: CrewState) -> bool {
        let Some(&entity) = self.index.get(&id) else {
            return false;
        };
        match self.world.query_one_mut::<&mut CrewState>(entity) {
            Ok(current) => {
                *current = state;
                true
            }
            Err(_) => false,
        }
    }

    /// Everyone assigned to `vessel`, exempt or not, in id order.
    pub fn aboard(&self, vessel: VesselId) -> Vec<IndividualId> {
        let mut ids: Vec<IndividualId> = self
            .world
            .query::<(&Crewmember, &Assignment)>()
            .iter()
            .filter(|(_, (_, assignment))| assignment.vessel == Some(vessel))
            .map(|(_, (member, _))| member.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Individuals on `vessel` that take part in processing, in id order.
    pub fn eligible_on(&self, vessel: VesselId) -> Vec<IndividualId> {
        let mut ids: Vec<IndividualId> = self
            .world
            .query::<(&Crewmember, &Assignment)>()
            .iter()
            .filter(|(_, (member, assignment))| {
                assignment.vessel == Some(vessel) && !member.exempt
            })
            .map(|(_, (member, _))| member.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Individuals whose timed incapacitation has run out by `now`.
    pub fn due_for_recovery(&self, now: f64) -> Vec<(IndividualId, String)> {
        let mut due: Vec<(IndividualId, String)> = self
            .world
            .query::<(&Crewmember, &CrewState)>()
            .iter()
            .filter_map(|(_, (member, state))| match state {
                CrewState::Inactive {
                    condition,
                    until: Some(until),
                } if *until <= now => Some((member.id, condition.clone())),
                _ => None,
            })
            .collect();
        due.sort_unstable_by_key(|(id, _)| *id);
        due
    }

    /// Detach every individual's components, in id order.
    pub fn snapshot(&self) -> Vec<IndividualSnapshot> {
        self.index
            .keys()
            .filter_map(|&id| {
                let entity = *self.index.get(&id)?;
                let crewmember = self.world.get::<&Crewmember>(entity).ok()?;
                let record = self.world.get::<&IndividualRecord>(entity).ok()?;
                let assignment = self.world.get::<&Assignment>(entity).ok()?;
                let state = self.world.get::<&CrewState>(entity).ok()?;
                Some(IndividualSnapshot {
                    crewmember: (*crewmember).clone(),
                    record: (*record).clone(),
                    assignment: *assignment,
                    state: (*state).clone(),
                })
            })
            .collect()
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}
