//! Preconditions - named boolean gates evaluated per individual.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Comparison, RuleContext};
use crate::components::{IndividualId, ResourceLedger, Situation, Vessel, VesselId};
use crate::config::ConfigNode;

/// Whether a processor-result check counts successes or failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultType {
    Success,
    #[default]
    Failure,
}

/// The concrete test a precondition performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Check {
    /// Vessel pool or the individual's own pool, as an amount or percent of capacity
    Resource {
        resource: String,
        value: f64,
        as_percentage: bool,
        per_individual: bool,
        comparison: Comparison,
    },
    /// Numeric comparison when `numeric_value` is set, string otherwise
    KeyValue {
        key: String,
        string_value: String,
        numeric_value: Option<f64>,
        comparison: Comparison,
    },
    Trait {
        profession: String,
        comparison: Comparison,
    },
    /// Passes when the vessel's situation is (or, with `NotEquals`, is not) listed
    Situation {
        situations: Vec<Situation>,
        comparison: Comparison,
    },
    Body {
        body: String,
        comparison: Comparison,
    },
    BreathableAir {
        expected: bool,
    },
    Gravity {
        value: f64,
        comparison: Comparison,
    },
    RandomChance {
        chance_percent: f64,
    },
    CrewCount {
        value: u32,
        comparison: Comparison,
    },
    /// Consecutive success/failure counter for a resource compared against
    /// `cycles_to_check`. Zero cycles reads the vessel's latest result instead.
    ProcessorResult {
        resource: String,
        result_type: ResultType,
        cycles_to_check: u32,
        comparison: Comparison,
    },
    Condition {
        condition: String,
        expected: bool,
    },
    SkillLevel {
        value: u8,
        comparison: Comparison,
    },
    Courage {
        value: f64,
        comparison: Comparison,
    },
    Stupidity {
        value: f64,
        comparison: Comparison,
    },
    Badass {
        expected: bool,
    },
    Connection {
        expected: bool,
    },
}

/// A named check. The name is what other systems put into an individual's
/// disqualified set to veto it for that individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precondition {
    pub name: String,
    pub check: Check,
}

impl Precondition {
    pub fn new(name: impl Into<String>, check: Check) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }

    /// Decide whether `individual` passes.
    ///
    /// The vessel is taken from the individual's assignment when not given.
    /// Anything missing (record, assignment, vessel) fails.
    pub fn is_valid(
        &self,
        ctx: &mut RuleContext<'_>,
        individual: IndividualId,
        vessel: Option<VesselId>,
    ) -> bool {
        match ctx.roster.record(individual) {
            Some(record) if !record.is_disqualified(&self.name) => {}
            _ => return false,
        }
        let vessel_id = vessel.or_else(|| ctx.roster.resolve_vessel(individual));

        match &self.check {
            Check::Resource {
                resource,
                value,
                as_percentage,
                per_individual,
                comparison,
            } => {
                let (amount, capacity) = if *per_individual {
                    let Some(record) = ctx.roster.record(individual) else {
                        return false;
                    };
                    match record.roster_pool(resource) {
                        Some(pool) => (pool.amount, pool.capacity),
                        None => return false,
                    }
                } else {
                    let Some(vessel) = lookup(ctx, vessel_id) else {
                        return false;
                    };
                    if !vessel.ledger.has_resource(resource) {
                        return false;
                    }
                    (
                        vessel.ledger.available(resource),
                        vessel.ledger.capacity(resource),
                    )
                };
                let current = if *as_percentage {
                    if capacity <= 0.0 {
                        0.0
                    } else {
                        amount / capacity * 100.0
                    }
                } else {
                    amount
                };
                comparison.compare_f64(current, *value)
            }

            Check::KeyValue {
                key,
                string_value,
                numeric_value,
                comparison,
            } => {
                let Some(record) = ctx.roster.record(individual) else {
                    return false;
                };
                let Some(stored) = record.key_values.get(key) else {
                    return false;
                };
                match numeric_value {
                    Some(operand) => stored
                        .trim()
                        .parse::<f64>()
                        .map(|v| comparison.compare_f64(v, *operand))
                        .unwrap_or(false),
                    None => comparison.compare_str(stored, string_value),
                }
            }

            Check::Trait {
                profession,
                comparison,
            } => ctx
                .roster
                .crewmember(individual)
                .map(|c| comparison.compare_str(&c.profession, profession))
                .unwrap_or(false),

            Check::Situation {
                situations,
                comparison,
            } => {
                let Some(vessel) = lookup(ctx, vessel_id) else {
                    return false;
                };
                let listed = situations.contains(&vessel.situation);
                match comparison {
                    Comparison::NotEquals => !listed,
                    _ => listed,
                }
            }

            Check::Body { body, comparison } => lookup(ctx, vessel_id)
                .map(|v| comparison.compare_str(&v.body, body))
                .unwrap_or(false),

            Check::BreathableAir { expected } => lookup(ctx, vessel_id)
                .map(|v| v.has_breathable_air == *expected)
                .unwrap_or(false),

            Check::Gravity { value, comparison } => lookup(ctx, vessel_id)
                .map(|v| comparison.compare_f64(v.gravity, *value))
                .unwrap_or(false),

            Check::RandomChance { chance_percent } => {
                let roll: f64 = ctx.rng.gen_range(0.0..100.0);
                roll < *chance_percent
            }

            Check::CrewCount { value, comparison } => {
                let Some(id) = vessel_id.filter(|id| ctx.vessels.contains_key(id)) else {
                    return false;
                };
                let count = ctx.roster.eligible_on(id).len();
                comparison.compare_f64(count as f64, *value as f64)
            }

            Check::ProcessorResult {
                resource,
                result_type,
                cycles_to_check,
                comparison,
            } => {
                if *cycles_to_check == 0 {
                    let wanted = *result_type == ResultType::Success;
                    return lookup(ctx, vessel_id)
                        .and_then(|v| v.latest_results.get(resource))
                        .map(|r| r.succeeded == wanted)
                        .unwrap_or(false);
                }
                let Some(record) = ctx.roster.record(individual) else {
                    return false;
                };
                let streak = match result_type {
                    ResultType::Success => record.consecutive_successes(resource),
                    ResultType::Failure => record.consecutive_failures(resource),
                };
                comparison.compare_f64(streak as f64, *cycles_to_check as f64)
            }

            Check::Condition {
                condition,
                expected,
            } => ctx
                .roster
                .record(individual)
                .map(|r| r.has_condition(condition) == *expected)
                .unwrap_or(false),

            Check::SkillLevel { value, comparison } => ctx
                .roster
                .crewmember(individual)
                .map(|c| comparison.compare_f64(c.experience_level as f64, *value as f64))
                .unwrap_or(false),

            Check::Courage { value, comparison } => ctx
                .roster
                .crewmember(individual)
                .map(|c| comparison.compare_f64(c.courage as f64, *value))
                .unwrap_or(false),

            Check::Stupidity { value, comparison } => ctx
                .roster
                .crewmember(individual)
                .map(|c| comparison.compare_f64(c.stupidity as f64, *value))
                .unwrap_or(false),

            Check::Badass { expected } => ctx
                .roster
                .crewmember(individual)
                .map(|c| c.badass == *expected)
                .unwrap_or(false),

            Check::Connection { expected } => lookup(ctx, vessel_id)
                .map(|v| v.connected == *expected)
                .unwrap_or(false),
        }
    }

    // ---- Constructors from config nodes ----
    //
    // Every kind reads an optional `label` as its name (falling back to the
    // kind) and `checkType` as its comparison. Bad fields keep defaults.

    pub fn check_resource(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckResource",
            Check::Resource {
                resource: node.get_string("resourceName").unwrap_or_default(),
                value: node.get_f64("valueToCheck").unwrap_or(0.0),
                as_percentage: node.get_bool("checkAsPercentage").unwrap_or(false),
                per_individual: node.get_bool("isPerIndividual").unwrap_or(false),
                comparison: comparison(node, Comparison::GreaterOrEqual),
            },
        )
    }

    pub fn check_key_value(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckKeyValue",
            Check::KeyValue {
                key: node.get_string("keyValue").unwrap_or_default(),
                string_value: node.get_string("stringValue").unwrap_or_default(),
                numeric_value: node.get_f64("intValue").or_else(|| node.get_f64("numericValue")),
                comparison: comparison(node, Comparison::Equals),
            },
        )
    }

    pub fn check_trait(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckTrait",
            Check::Trait {
                profession: node.get_string("traitToCheck").unwrap_or_default(),
                comparison: comparison(node, Comparison::Equals),
            },
        )
    }

    pub fn check_situation(node: &ConfigNode) -> Self {
        let mut situations = Vec::new();
        for name in node.get_all("situation") {
            match Situation::from_name(name) {
                Some(s) => situations.push(s),
                None => log::warn!("CheckSituation: unknown situation '{}'", name),
            }
        }
        labelled(
            node,
            "CheckSituation",
            Check::Situation {
                situations,
                comparison: comparison(node, Comparison::Equals),
            },
        )
    }

    pub fn check_body(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckBody",
            Check::Body {
                body: node.get_string("bodyName").unwrap_or_default(),
                comparison: comparison(node, Comparison::Equals),
            },
        )
    }

    pub fn check_breathable_air(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckBreathableAir",
            Check::BreathableAir {
                expected: node.get_bool("mustExist").unwrap_or(true),
            },
        )
    }

    pub fn check_gravity_level(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckGravityLevel",
            Check::Gravity {
                value: node.get_f64("valueToCheck").unwrap_or(0.0),
                comparison: comparison(node, Comparison::GreaterOrEqual),
            },
        )
    }

    pub fn check_random_chance(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckRandomChance",
            Check::RandomChance {
                chance_percent: node.get_f64("chanceSuccess").unwrap_or(0.0).clamp(0.0, 100.0),
            },
        )
    }

    pub fn check_crew_count(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckCrewCount",
            Check::CrewCount {
                value: node.get_u32("valueToCheck").unwrap_or(0),
                comparison: comparison(node, Comparison::GreaterOrEqual),
            },
        )
    }

    pub fn check_processor_result(node: &ConfigNode) -> Self {
        let result_type = match node.get("resultType").map(str::to_ascii_lowercase) {
            Some(t) if t == "success" => ResultType::Success,
            _ => ResultType::Failure,
        };
        labelled(
            node,
            "CheckProcessorResult",
            Check::ProcessorResult {
                resource: node.get_string("resourceName").unwrap_or_default(),
                result_type,
                cycles_to_check: node.get_u32("cyclesToCheck").unwrap_or(0),
                comparison: comparison(node, Comparison::GreaterOrEqual),
            },
        )
    }

    pub fn check_condition(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckCondition",
            Check::Condition {
                condition: node.get_string("conditionName").unwrap_or_default(),
                expected: node.get_bool("mustExist").unwrap_or(true),
            },
        )
    }

    pub fn check_skill_level(node: &ConfigNode) -> Self {
        let level = node.get_u32("valueToCheck").unwrap_or(0).min(u8::MAX as u32) as u8;
        labelled(
            node,
            "CheckSkillLevel",
            Check::SkillLevel {
                value: level,
                comparison: comparison(node, Comparison::GreaterOrEqual),
            },
        )
    }

    pub fn check_courage(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckCourage",
            Check::Courage {
                value: node.get_f64("valueToCheck").unwrap_or(0.0),
                comparison: comparison(node, Comparison::GreaterOrEqual),
            },
        )
    }

    pub fn check_stupidity(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckStupidity",
            Check::Stupidity {
                value: node.get_f64("valueToCheck").unwrap_or(0.0),
                comparison: comparison(node, Comparison::GreaterOrEqual),
            },
        )
    }

    pub fn check_badass(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckBadass",
            Check::Badass {
                expected: node.get_bool("mustExist").unwrap_or(true),
            },
        )
    }

    pub fn check_connection(node: &ConfigNode) -> Self {
        labelled(
            node,
            "CheckConnection",
            Check::Connection {
                expected: node.get_bool("mustExist").unwrap_or(true),
            },
        )
    }
}

fn lookup<'c>(ctx: &'c RuleContext<'_>, vessel: Option<VesselId>) -> Option<&'c Vessel> {
    ctx.vessels.get(&vessel?)
}

fn comparison(node: &ConfigNode, default: Comparison) -> Comparison {
    node.get("checkType")
        .and_then(Comparison::from_name)
        .unwrap_or(default)
}

fn labelled(node: &ConfigNode, kind: &str, check: Check) -> Precondition {
    let name = node
        .get_string("label")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| kind.to_string());
    Precondition::new(name, check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Crewmember;
    use crate::testing::TestWorld;

    fn low_gravity() -> Precondition {
        Precondition::new(
            "LowGravity",
            Check::Gravity {
                value: 0.1,
                comparison: Comparison::GreaterOrEqual,
            },
        )
    }

    #[test]
    fn test_disqualified_individual_fails() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b.with_gravity(1.0));
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let bill = world.crew(Crewmember::new("Bill", "Engineer"), vessel);
        if let Some(record) = world.roster.record_mut(jeb) {
            record.disqualify("LowGravity");
        }

        let check = low_gravity();
        let mut ctx = world.context();
        assert!(!check.is_valid(&mut ctx, jeb, None));
        assert!(check.is_valid(&mut ctx, bill, None));
    }

    #[test]
    fn test_disqualification_overrides_resource_check() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b.with_pool("Snacks", 50.0, 100.0));
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let check = Precondition::new(
            "HasSnacks",
            Check::Resource {
                resource: "Snacks".into(),
                value: 10.0,
                as_percentage: false,
                per_individual: false,
                comparison: Comparison::GreaterOrEqual,
            },
        );
        assert!(check.is_valid(&mut world.context(), jeb, None));
        if let Some(record) = world.roster.record_mut(jeb) {
            record.disqualify("HasSnacks");
        }
        assert!(!check.is_valid(&mut world.context(), jeb, None));
    }

    #[test]
    fn test_unassigned_individual_fails_closed() {
        let mut world = TestWorld::new();
        let _vessel = world.vessel(|b| b.with_gravity(1.0));
        let drifter = world.unassigned(Crewmember::new("Val", "Pilot"));
        assert!(!low_gravity().is_valid(&mut world.context(), drifter, None));
        assert!(!low_gravity().is_valid(&mut world.context(), 999, None));
    }

    #[test]
    fn test_explicit_vessel_overrides_assignment() {
        let mut world = TestWorld::new();
        let heavy = world.vessel(|b| b.with_gravity(1.0));
        let drifter = world.unassigned(Crewmember::new("Val", "Pilot"));
        assert!(low_gravity().is_valid(&mut world.context(), drifter, Some(heavy)));
    }

    #[test]
    fn test_percentage_resource_check() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b.with_pool("Snacks", 20.0, 80.0));
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let node = ConfigNode::new("PRECONDITION")
            .with_value("name", "CheckResource")
            .with_value("resourceName", "Snacks")
            .with_value("valueToCheck", 25)
            .with_value("checkAsPercentage", true)
            .with_value("checkType", "checkLesserOrEqual");
        let check = Precondition::check_resource(&node);
        assert_eq!(check.name, "CheckResource");
        assert!(check.is_valid(&mut world.context(), jeb, None));
    }

    #[test]
    fn test_processor_result_streak() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b);
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let starving = Precondition::check_processor_result(
            &ConfigNode::new("PRECONDITION")
                .with_value("label", "Starving")
                .with_value("resourceName", "Snacks")
                .with_value("resultType", "failure")
                .with_value("cyclesToCheck", 3),
        );
        assert_eq!(starving.name, "Starving");

        for _ in 0..2 {
            if let Some(record) = world.roster.record_mut(jeb) {
                record.record_failure("Snacks");
            }
        }
        assert!(!starving.is_valid(&mut world.context(), jeb, None));
        if let Some(record) = world.roster.record_mut(jeb) {
            record.record_failure("Snacks");
        }
        assert!(starving.is_valid(&mut world.context(), jeb, None));
    }

    #[test]
    fn test_trait_and_key_value() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b);
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        if let Some(record) = world.roster.record_mut(jeb) {
            record.key_values.insert("homesick".into(), "4".into());
        }

        let pilot = Precondition::new(
            "IsPilot",
            Check::Trait {
                profession: "Pilot".into(),
                comparison: Comparison::Equals,
            },
        );
        let homesick = Precondition::new(
            "Homesick",
            Check::KeyValue {
                key: "homesick".into(),
                string_value: String::new(),
                numeric_value: Some(3.0),
                comparison: Comparison::GreaterThan,
            },
        );
        let mut ctx = world.context();
        assert!(pilot.is_valid(&mut ctx, jeb, None));
        assert!(homesick.is_valid(&mut ctx, jeb, None));
    }

    #[test]
    fn test_situation_list() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b.with_situation(Situation::Orbiting));
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let node = ConfigNode::new("PRECONDITION")
            .with_value("situation", "Landed")
            .with_value("situation", "Orbiting")
            .with_value("situation", "Sideways");
        let check = Precondition::check_situation(&node);
        assert!(check.is_valid(&mut world.context(), jeb, None));
    }

    #[test]
    fn test_random_chance_extremes() {
        let mut world = TestWorld::new();
        let vessel = world.vessel(|b| b);
        let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
        let never = Precondition::new("Never", Check::RandomChance { chance_percent: 0.0 });
        let always = Precondition::new("Always", Check::RandomChance { chance_percent: 100.0 });
        let mut ctx = world.context();
        for _ in 0..20 {
            assert!(!never.is_valid(&mut ctx, jeb, None));
            assert!(always.is_valid(&mut ctx, jeb, None));
        }
    }
}
