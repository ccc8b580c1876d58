//! Crew events - chance-driven outcome bundles rolled after processing.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Outcome, Precondition, RuleContext, RuleRegistry};
use crate::components::{IndividualId, VesselId};
use crate::config::ConfigNode;
use crate::notifications::GameEvent;

/// When an event gets a chance to fire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EventCategory {
    /// Once per completed processor cycle on the vessel
    PostProcessCycle,
    /// Once per whole interval of elapsed time
    Interval { seconds: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTargets {
    #[default]
    AllOnVessel,
    RandomOnVessel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewEvent {
    pub name: String,
    pub category: EventCategory,
    pub targets: EventTargets,
    pub chance_percent: f64,
    pub preconditions: Vec<Precondition>,
    pub outcomes: Vec<Outcome>,
    /// Interval time carried over per vessel
    #[serde(default)]
    elapsed: BTreeMap<VesselId, f64>,
}

impl CrewEvent {
    pub fn new(name: impl Into<String>, category: EventCategory) -> Self {
        Self {
            name: name.into(),
            category,
            targets: EventTargets::AllOnVessel,
            chance_percent: 100.0,
            preconditions: Vec::new(),
            outcomes: Vec::new(),
            elapsed: BTreeMap::new(),
        }
    }

    pub fn with_targets(mut self, targets: EventTargets) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_chance(mut self, percent: f64) -> Self {
        self.chance_percent = percent.clamp(0.0, 100.0);
        self
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcomes.push(outcome);
        self
    }

    /// Read a `CREW_EVENT` node. Returns `None` without a name.
    pub fn from_node(node: &ConfigNode, registry: &RuleRegistry) -> Option<Self> {
        let Some(name) = node.get_string("name").filter(|n| !n.is_empty()) else {
            log::warn!("CREW_EVENT without a name ignored");
            return None;
        };
        let category = match node.get("category") {
            Some(c) if c.eq_ignore_ascii_case("interval") => EventCategory::Interval {
                seconds: node.get_f64("intervalSeconds").unwrap_or(0.0),
            },
            _ => EventCategory::PostProcessCycle,
        };
        let targets = match node.get("targets") {
            Some(t) if t.eq_ignore_ascii_case("random") => EventTargets::RandomOnVessel,
            _ => EventTargets::AllOnVessel,
        };

        let mut event = CrewEvent::new(name, category)
            .with_targets(targets)
            .with_chance(node.get_f64("chancePercent").unwrap_or(100.0));
        event.preconditions = registry.preconditions_of(node);
        event.outcomes = registry.outcomes_of(node);
        Some(event)
    }

    /// How many rolls the event gets for this slice of a vessel's update.
    fn rolls(&mut self, vessel: VesselId, elapsed: f64, cycles_completed: u32) -> u32 {
        match self.category {
            EventCategory::PostProcessCycle => cycles_completed,
            EventCategory::Interval { seconds } => {
                if seconds <= 0.0 {
                    return 0;
                }
                let carried = self.elapsed.entry(vessel).or_insert(0.0);
                *carried += elapsed.max(0.0);
                let whole = (*carried / seconds).floor();
                *carried -= whole * seconds;
                whole as u32
            }
        }
    }

    /// Roll the event for a vessel and apply it. Returns how many times it fired.
    pub fn run(
        &mut self,
        ctx: &mut RuleContext<'_>,
        vessel: VesselId,
        elapsed: f64,
        cycles_completed: u32,
    ) -> u32 {
        let mut fired = 0;
        for _ in 0..self.rolls(vessel, elapsed, cycles_completed) {
            let roll: f64 = ctx.rng.gen_range(0.0..100.0);
            if roll >= self.chance_percent {
                continue;
            }
            if self.fire(ctx, vessel) {
                fired += 1;
            }
        }
        fired
    }

    fn fire(&self, ctx: &mut RuleContext<'_>, vessel: VesselId) -> bool {
        let mut candidates: Vec<IndividualId> = Vec::new();
        for id in ctx.roster.eligible_on(vessel) {
            if self
                .preconditions
                .iter()
                .all(|p| p.is_valid(ctx, id, Some(vessel)))
            {
                candidates.push(id);
            }
        }
        let targets = match self.targets {
            EventTargets::AllOnVessel => candidates,
            EventTargets::RandomOnVessel => candidates
                .choose(&mut *ctx.rng)
                .map(|id| vec![*id])
                .unwrap_or_default(),
        };
        if targets.is_empty() {
            return false;
        }

        log::debug!("crew event '{}' fired on vessel {} for {:?}", self.name, vessel, targets);
        for &id in &targets {
            ctx.sink.fire_event(GameEvent::CrewEventFired {
                event: self.name.clone(),
                individual: id,
            });
        }
        for outcome in &self.outcomes {
            outcome.apply_to(ctx, vessel, &self.name, &targets);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Crewmember;
    use crate::rules::{Check, Effect};
    use crate::testing::TestWorld;

    fn homesick() -> Outcome {
        Outcome::new(Effect::SetCondition {
            condition: "Homesick".into(),
        })
    }

    #[test]
    fn test_interval_event_rolls_per_whole_interval() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b);
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let mut event =
            CrewEvent::new("Homesick", EventCategory::Interval { seconds: 100.0 }).with_outcome(homesick());

        assert_eq!(event.run(&mut world.context(), vessel, 60.0, 0), 0);
        assert_eq!(event.run(&mut world.context(), vessel, 60.0, 0), 1);
        assert_eq!(event.run(&mut world.context(), vessel, 250.0, 0), 2);
        assert!(world.roster.record(jeb).expect("record").has_condition("Homesick"));
    }

    #[test]
    fn test_post_cycle_event_respects_preconditions() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b);
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let bill = world.crew(Crewmember::new("Bill", "Engineer"), vessel);
        let mut event = CrewEvent::new("Stargazing", EventCategory::PostProcessCycle)
            .with_precondition(Precondition::new(
                "Pilots",
                Check::Trait {
                    profession: "Pilot".into(),
                    comparison: crate::rules::Comparison::Equals,
                },
            ))
            .with_outcome(homesick());

        assert_eq!(event.run(&mut world.context(), vessel, 0.0, 3), 3);
        assert!(world.roster.record(jeb).expect("jeb").has_condition("Homesick"));
        assert!(!world.roster.record(bill).expect("bill").has_condition("Homesick"));
        assert_eq!(world.log.events.len(), 3);
    }

    #[test]
    fn test_random_target_picks_one() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b);
        for name in ["Jeb", "Bill", "Bob"] {
            world.crew(Crewmember::new(name, "Pilot"), vessel);
        }
        let mut event = CrewEvent::new("Sneeze", EventCategory::PostProcessCycle)
            .with_targets(EventTargets::RandomOnVessel)
            .with_outcome(homesick());
        event.run(&mut world.context(), vessel, 0.0, 1);
        assert_eq!(world.log.events.len(), 1);
    }

    #[test]
    fn test_zero_chance_never_fires() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b);
        world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let mut event = CrewEvent::new("Never", EventCategory::PostProcessCycle)
            .with_chance(0.0)
            .with_outcome(homesick());
        assert_eq!(event.run(&mut world.context(), vessel, 0.0, 50), 0);
    }

    #[test]
    fn test_from_node() {
        let node = ConfigNode::new("CREW_EVENT")
            .with_value("name", "CabinFever")
            .with_value("category", "Interval")
            .with_value("intervalSeconds", 21600)
            .with_value("targets", "random")
            .with_value("chancePercent", 25)
            .with_node(
                ConfigNode::new("OUTCOME")
                    .with_value("name", "SetCondition")
                    .with_value("conditionName", "Stir-crazy"),
            );
        let event = CrewEvent::from_node(&node, &RuleRegistry::with_defaults()).expect("event");
        assert_eq!(event.category, EventCategory::Interval { seconds: 21600.0 });
        assert_eq!(event.targets, EventTargets::RandomOnVessel);
        assert_eq!(event.chance_percent, 25.0);
        assert_eq!(event.outcomes.len(), 1);
        assert!(CrewEvent::from_node(&ConfigNode::new("CREW_EVENT"), &RuleRegistry::new()).is_none());
    }
}
