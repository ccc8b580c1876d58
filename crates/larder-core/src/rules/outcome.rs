//! Outcomes - side effects applied to the individuals a flow failed.

use serde::{Deserialize, Serialize};

use super::{FlowResult, RuleContext};
use crate::components::{CrewState, IndividualId, ResourceLedger, VesselId};
use crate::config::ConfigNode;
use crate::notifications::GameEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PenaltyKind {
    Reputation,
    Funding,
    Science,
}

/// How long an incapacitation lasts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Lasting {
    Timed(f64),
    /// `Settings::faint_duration_seconds`
    SettingsDefault,
    /// Until the outcome is removed
    UntilRemoved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    ConsumeResource {
        resource: String,
        amount: f64,
        per_individual: bool,
    },
    ProduceResource {
        resource: String,
        amount: f64,
        per_individual: bool,
    },
    SetCondition {
        condition: String,
    },
    ClearCondition {
        condition: String,
    },
    SetKeyValue {
        key: String,
        value: String,
    },
    Penalty {
        kind: PenaltyKind,
        amount: f64,
        /// Scale by the number of individuals affected
        per_individual: bool,
    },
    Incapacitate {
        condition: String,
        lasting: Lasting,
    },
    Death {
        cause: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub effect: Effect,
    /// Only a candidate for random selection, never applied unconditionally
    pub selectable_randomly: bool,
    /// Player message; `{name}`, `{vessel}` and `{resource}` are substituted
    pub message: Option<String>,
}

impl Outcome {
    pub fn new(effect: Effect) -> Self {
        Self {
            effect,
            selectable_randomly: false,
            message: None,
        }
    }

    pub fn random(mut self) -> Self {
        self.selectable_randomly = true;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Apply to everyone the failed `result` left without.
    pub fn apply(&self, ctx: &mut RuleContext<'_>, vessel: VesselId, result: &FlowResult) {
        self.apply_to(ctx, vessel, &result.resource_name, &result.affected_individuals);
    }

    pub fn apply_to(
        &self,
        ctx: &mut RuleContext<'_>,
        vessel: VesselId,
        resource: &str,
        targets: &[IndividualId],
    ) {
        if targets.is_empty() {
            return;
        }
        self.post_messages(ctx, vessel, resource, targets);

        match &self.effect {
            Effect::ConsumeResource {
                resource: what,
                amount,
                per_individual,
            } => {
                if *per_individual {
                    for &id in targets {
                        if let Some(pool) =
                            ctx.roster.record_mut(id).and_then(|r| r.roster_pool_mut(what))
                        {
                            pool.withdraw(*amount);
                        }
                    }
                } else if let Some(v) = ctx.vessels.get_mut(&vessel) {
                    v.ledger.withdraw(what, *amount);
                }
            }

            Effect::ProduceResource {
                resource: what,
                amount,
                per_individual,
            } => {
                if *per_individual {
                    for &id in targets {
                        if let Some(pool) =
                            ctx.roster.record_mut(id).and_then(|r| r.roster_pool_mut(what))
                        {
                            pool.deposit(*amount);
                        }
                    }
                } else if let Some(v) = ctx.vessels.get_mut(&vessel) {
                    v.ledger.deposit(what, *amount);
                }
            }

            Effect::SetCondition { condition } => {
                for &id in targets {
                    if let Some(record) = ctx.roster.record_mut(id) {
                        record.set_condition(condition.clone());
                    }
                }
            }

            Effect::ClearCondition { condition } => {
                for &id in targets {
                    if let Some(record) = ctx.roster.record_mut(id) {
                        record.clear_condition(condition);
                    }
                }
            }

            Effect::SetKeyValue { key, value } => {
                for &id in targets {
                    if let Some(record) = ctx.roster.record_mut(id) {
                        record.key_values.insert(key.clone(), value.clone());
                    }
                }
            }

            Effect::Penalty {
                kind,
                amount,
                per_individual,
            } => {
                let scale = if *per_individual { targets.len() as f64 } else { 1.0 };
                let delta = -amount * scale;
                let event = match kind {
                    PenaltyKind::Reputation => GameEvent::ReputationChanged { delta },
                    PenaltyKind::Funding => GameEvent::FundsChanged { delta },
                    PenaltyKind::Science => GameEvent::ScienceChanged { delta },
                };
                ctx.sink.fire_event(event);
            }

            Effect::Incapacitate { condition, lasting } => {
                let until = match lasting {
                    Lasting::Timed(seconds) => Some(ctx.now + seconds),
                    Lasting::SettingsDefault => Some(ctx.now + ctx.settings.faint_duration_seconds),
                    Lasting::UntilRemoved => None,
                };
                for &id in targets {
                    let Some(record) = ctx.roster.record_mut(id) else {
                        continue;
                    };
                    record.set_condition(condition.clone());
                    ctx.roster.set_state(
                        id,
                        CrewState::Inactive {
                            condition: condition.clone(),
                            until,
                        },
                    );
                    log::info!("individual {} is incapacitated ({})", id, condition);
                    ctx.sink.fire_event(GameEvent::IndividualIncapacitated {
                        individual: id,
                        condition: condition.clone(),
                        until,
                    });
                }
            }

            Effect::Death { cause } => {
                let cause = cause.clone().unwrap_or_else(|| format!("lack of {}", resource));
                for &id in targets {
                    if ctx.roster.remove_individual(id) {
                        log::info!("individual {} died on vessel {}: {}", id, vessel, cause);
                        ctx.sink.fire_event(GameEvent::IndividualDied {
                            individual: id,
                            vessel: Some(vessel),
                            cause: cause.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Reverse the durable part of the effect for `targets`. Effects that
    /// cannot be undone leave everything alone.
    pub fn remove(&self, ctx: &mut RuleContext<'_>, _vessel: VesselId, targets: &[IndividualId]) {
        match &self.effect {
            Effect::SetCondition { condition } => {
                for &id in targets {
                    if let Some(record) = ctx.roster.record_mut(id) {
                        record.clear_condition(condition);
                    }
                }
            }

            Effect::SetKeyValue { key, .. } => {
                for &id in targets {
                    if let Some(record) = ctx.roster.record_mut(id) {
                        record.key_values.remove(key);
                    }
                }
            }

            Effect::Incapacitate { condition, .. } => {
                for &id in targets {
                    let cleared = ctx
                        .roster
                        .record_mut(id)
                        .map(|r| r.clear_condition(condition))
                        .unwrap_or(false);
                    let inactive_for_this = matches!(
                        ctx.roster.state(id),
                        Some(CrewState::Inactive { condition: c, .. }) if &c == condition
                    );
                    if inactive_for_this {
                        ctx.roster.set_state(id, CrewState::Active);
                    }
                    if cleared || inactive_for_this {
                        log::info!("individual {} recovered from {}", id, condition);
                        ctx.sink.fire_event(GameEvent::IndividualRecovered {
                            individual: id,
                            condition: condition.clone(),
                        });
                    }
                }
            }

            Effect::ConsumeResource { .. }
            | Effect::ProduceResource { .. }
            | Effect::ClearCondition { .. }
            | Effect::Penalty { .. }
            | Effect::Death { .. } => {}
        }
    }

    fn post_messages(
        &self,
        ctx: &mut RuleContext<'_>,
        vessel: VesselId,
        resource: &str,
        targets: &[IndividualId],
    ) {
        let Some(template) = &self.message else {
            return;
        };
        if !ctx.settings.show_messages {
            return;
        }
        let vessel_name = ctx
            .vessels
            .get(&vessel)
            .map(|v| v.name.clone())
            .unwrap_or_default();
        for &id in targets {
            let name = ctx.roster.name(id).unwrap_or_default();
            let text = template
                .replace("{name}", &name)
                .replace("{vessel}", &vessel_name)
                .replace("{resource}", resource);
            ctx.sink.post_message(&text);
        }
    }

    // ---- Constructors from config nodes ----

    pub fn consume_resource(node: &ConfigNode) -> Self {
        common(
            node,
            Effect::ConsumeResource {
                resource: node.get_string("resourceName").unwrap_or_default(),
                amount: node.get_f64("amount").unwrap_or(0.0).max(0.0),
                per_individual: node.get_bool("isPerIndividual").unwrap_or(false),
            },
        )
    }

    pub fn produce_resource(node: &ConfigNode) -> Self {
        common(
            node,
            Effect::ProduceResource {
                resource: node.get_string("resourceName").unwrap_or_default(),
                amount: node.get_f64("amount").unwrap_or(0.0).max(0.0),
                per_individual: node.get_bool("isPerIndividual").unwrap_or(false),
            },
        )
    }

    pub fn set_condition(node: &ConfigNode) -> Self {
        common(
            node,
            Effect::SetCondition {
                condition: node.get_string("conditionName").unwrap_or_default(),
            },
        )
    }

    pub fn clear_condition(node: &ConfigNode) -> Self {
        common(
            node,
            Effect::ClearCondition {
                condition: node.get_string("conditionName").unwrap_or_default(),
            },
        )
    }

    pub fn set_key_value(node: &ConfigNode) -> Self {
        common(
            node,
            Effect::SetKeyValue {
                key: node.get_string("keyValue").unwrap_or_default(),
                value: node.get_string("stringValue").unwrap_or_default(),
            },
        )
    }

    pub fn rep_penalty(node: &ConfigNode) -> Self {
        penalty(node, PenaltyKind::Reputation)
    }

    pub fn funding_penalty(node: &ConfigNode) -> Self {
        penalty(node, PenaltyKind::Funding)
    }

    pub fn science_penalty(node: &ConfigNode) -> Self {
        penalty(node, PenaltyKind::Science)
    }

    pub fn faint_penalty(node: &ConfigNode) -> Self {
        let lasting = match node.get_f64("faintDurationSeconds") {
            Some(seconds) if seconds > 0.0 => Lasting::Timed(seconds),
            _ => Lasting::SettingsDefault,
        };
        common(
            node,
            Effect::Incapacitate {
                condition: node
                    .get_string("conditionName")
                    .unwrap_or_else(|| "Fainted".to_string()),
                lasting,
            },
        )
    }

    pub fn on_strike_penalty(node: &ConfigNode) -> Self {
        common(
            node,
            Effect::Incapacitate {
                condition: node
                    .get_string("conditionName")
                    .unwrap_or_else(|| "OnStrike".to_string()),
                lasting: Lasting::UntilRemoved,
            },
        )
    }

    pub fn death_penalty(node: &ConfigNode) -> Self {
        common(
            node,
            Effect::Death {
                cause: node.get_string("causeOfDeath"),
            },
        )
    }
}

fn penalty(node: &ConfigNode, kind: PenaltyKind) -> Outcome {
    common(
        node,
        Effect::Penalty {
            kind,
            amount: node.get_f64("amount").unwrap_or(0.0),
            per_individual: node.get_bool("perIndividual").unwrap_or(false),
        },
    )
}

fn common(node: &ConfigNode, effect: Effect) -> Outcome {
    Outcome {
        effect,
        selectable_randomly: node.get_bool("canBeRandomlySelected").unwrap_or(false),
        message: node.get_string("playerMessage").filter(|m| !m.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Crewmember;
    use crate::testing::TestWorld;

    #[test]
    fn test_set_condition_and_remove() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b);
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let outcome = Outcome::new(Effect::SetCondition {
            condition: "Hungry".into(),
        });

        outcome.apply_to(&mut world.context(), vessel, "Snacks", &[jeb]);
        assert!(world.roster.record(jeb).expect("record").has_condition("Hungry"));
        outcome.remove(&mut world.context(), vessel, &[jeb]);
        assert!(!world.roster.record(jeb).expect("record").has_condition("Hungry"));
    }

    #[test]
    fn test_faint_is_timed_and_reversible() {
        let mut world = TestWorld::new();
        world.now = 100.0;
        let vessel = world.vessel(|b| b);
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let faint = Outcome::faint_penalty(
            &ConfigNode::new("OUTCOME").with_value("faintDurationSeconds", 60),
        );

        faint.apply_to(&mut world.context(), vessel, "Snacks", &[jeb]);
        assert_eq!(
            world.roster.state(jeb),
            Some(CrewState::Inactive {
                condition: "Fainted".into(),
                until: Some(160.0),
            })
        );

        faint.remove(&mut world.context(), vessel, &[jeb]);
        assert_eq!(world.roster.state(jeb), Some(CrewState::Active));
        assert!(world
            .log
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::IndividualRecovered { .. })));
    }

    #[test]
    fn test_death_removes_and_cannot_be_undone() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b);
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let death = Outcome::new(Effect::Death { cause: None });

        death.apply_to(&mut world.context(), vessel, "Oxygen", &[jeb]);
        assert!(!world.roster.contains(jeb));
        death.remove(&mut world.context(), vessel, &[jeb]);
        assert!(!world.roster.contains(jeb));
        assert_eq!(world.log.deaths(), 1);
        assert!(matches!(
            &world.log.events[0],
            GameEvent::IndividualDied { cause, .. } if cause == "lack of Oxygen"
        ));
    }

    #[test]
    fn test_penalty_scales_with_targets() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b);
        let a = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let b = world.crew(Crewmember::new("Bill", "Engineer"), vessel);
        let rep = Outcome::rep_penalty(
            &ConfigNode::new("OUTCOME")
                .with_value("amount", 2.5)
                .with_value("perIndividual", true),
        );
        rep.apply_to(&mut world.context(), vessel, "Snacks", &[a, b]);
        assert_eq!(world.log.events, vec![GameEvent::ReputationChanged { delta: -5.0 }]);
    }

    #[test]
    fn test_message_template() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b);
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let outcome = Outcome::new(Effect::SetCondition {
            condition: "Grumpy".into(),
        })
        .with_message("{name} aboard {vessel} wants {resource}");

        outcome.apply_to(&mut world.context(), vessel, "Snacks", &[jeb]);
        assert_eq!(world.log.messages, vec!["Jeb aboard Test Vessel wants Snacks".to_string()]);

        world.log.clear();
        world.settings.show_messages = false;
        outcome.apply_to(&mut world.context(), vessel, "Snacks", &[jeb]);
        assert!(world.log.messages.is_empty());
    }

    #[test]
    fn test_vessel_resource_effects() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b.with_pool("Snacks", 10.0, 20.0));
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let spoil = Outcome::consume_resource(
            &ConfigNode::new("OUTCOME")
                .with_value("resourceName", "Snacks")
                .with_value("amount", 4)
                .with_value("canBeRandomlySelected", true),
        );
        assert!(spoil.selectable_randomly);
        spoil.apply_to(&mut world.context(), vessel, "Snacks", &[jeb]);
        assert_eq!(world.vessels[&vessel].ledger.available("Snacks"), 6.0);
    }
}
