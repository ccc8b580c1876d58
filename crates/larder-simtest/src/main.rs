//! Larder Headless Provisioning Harness
//!
//! Loads the sample rule set and runs the reference scenarios against the
//! engine and the simulator. Runs entirely in-process, no host game.
//!
//! Usage:
//!   cargo run -p larder-simtest
//!   cargo run -p larder-simtest -- --verbose

use std::collections::BTreeMap;

use larder_core::persistence::SaveData;
use larder_core::prelude::*;
use larder_core::testing::TestWorld;

// ── Sample rule set (same JSON the integration tests use) ───────────────
const CONFIG_JSON: &str = include_str!("../../../data/provisioning.json");

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    env_logger::Builder::new()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .format_timestamp(None)
        .init();

    println!("=== Larder Provisioning Harness ===\n");

    let mut results = Vec::new();

    // 1. Sample config validation
    results.extend(validate_config());

    // 2. Flow arithmetic
    results.extend(validate_flows());

    // 3. Processor cycles
    results.extend(validate_processors());

    // 4. Predictive simulator
    results.extend(validate_simulator());

    // 5. Background scheduler
    results.extend(validate_scheduler());

    // 6. Save/load
    results.extend(validate_persistence());

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

fn sample_root() -> Result<ConfigNode, String> {
    ConfigNode::from_json_str("root", CONFIG_JSON).map_err(|e| e.to_string())
}

// ── 1. Sample Config ────────────────────────────────────────────────────

fn validate_config() -> Vec<TestResult> {
    println!("--- Sample Config ---");
    let mut results = Vec::new();

    // The raw document must be a JSON object before it is mapped to nodes
    let top_level: Vec<String> = match serde_json::from_str::<serde_json::Value>(CONFIG_JSON) {
        Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            results.push(check("config_parse", false, format!("JSON parse error: {}", e)));
            return results;
        }
    };
    results.push(check(
        "config_sections",
        ["SETTINGS", "RESOURCE_DEFINITION", "RESOURCE_PROCESSOR"]
            .iter()
            .all(|s| top_level.iter().any(|k| k == s)),
        format!("top-level sections: {}", top_level.join(", ")),
    ));

    let root = match sample_root() {
        Ok(root) => root,
        Err(e) => {
            results.push(check("config_nodes", false, e));
            return results;
        }
    };
    let engine = ProvisioningEngine::from_config(&root, 1);

    results.push(check(
        "config_library",
        engine.library.len() >= 5,
        format!("{} resources defined", engine.library.len()),
    ));

    // Every processor's flows name a defined resource
    let processors: Vec<ResourceProcessor> = root
        .nodes_named("RESOURCE_PROCESSOR")
        .map(|n| ResourceProcessor::from_node(n, &engine.registry))
        .collect();
    let bad_recipes: Vec<String> = processors
        .iter()
        .filter_map(|p| {
            p.prepare_recipe(&engine.library)
                .err()
                .map(|e| format!("{}: {}", p.name, e))
        })
        .collect();
    results.push(check(
        "config_recipes",
        !processors.is_empty() && bad_recipes.is_empty(),
        if bad_recipes.is_empty() {
            format!("{} processors with valid recipes", processors.len())
        } else {
            bad_recipes.join("; ")
        },
    ));

    // Every rule kind is registered
    let mut unknown = Vec::new();
    for node in root
        .nodes_named("RESOURCE_PROCESSOR")
        .chain(root.nodes_named("CREW_EVENT"))
    {
        for p in node.nodes_named("PRECONDITION") {
            let kind = p.get("name").unwrap_or_default();
            if !engine.registry.has_precondition(kind) {
                unknown.push(kind.to_string());
            }
        }
        for o in node.nodes_named("OUTCOME") {
            let kind = o.get("name").unwrap_or_default();
            if !engine.registry.has_outcome(kind) {
                unknown.push(kind.to_string());
            }
        }
    }
    results.push(check(
        "config_rule_kinds",
        unknown.is_empty(),
        if unknown.is_empty() {
            "all rule kinds registered".to_string()
        } else {
            format!("unknown kinds: {}", unknown.join(", "))
        },
    ));

    results.push(check(
        "config_crew_events",
        engine.crew_events.len() == root.nodes_named("CREW_EVENT").count(),
        format!("{} crew events loaded", engine.crew_events.len()),
    ));

    results
}

// ── 2. Flow Arithmetic ──────────────────────────────────────────────────

fn validate_flows() -> Vec<TestResult> {
    println!("--- Flow Arithmetic ---");
    let mut results = Vec::new();

    // Food 4.5 for five eaters at one each
    let mut pools = LivePools::new();
    pools.insert(ResourcePool::new("Food", 4.5, 10.0));
    let result = ResourceFlow::new("Food", 1.0).consume(&mut pools, 5);
    results.push(check(
        "flow_partial_service",
        !result.succeeded
            && result.affected_count == 4
            && (pools.available("Food") - 0.5).abs() < 1e-9,
        format!(
            "served {} of {}, {:.2} left",
            result.affected_count,
            result.requested_count,
            pools.available("Food")
        ),
    ));

    // Exact coverage takes exactly the demand
    let mut pools = LivePools::new();
    pools.insert(ResourcePool::new("Food", 7.0, 10.0));
    let result = ResourceFlow::new("Food", 1.5).consume(&mut pools, 4);
    results.push(check(
        "flow_conservation",
        result.succeeded && (pools.available("Food") - 1.0).abs() < 1e-9,
        format!("{:.2} left after drawing 6.0 from 7.0", pools.available("Food")),
    ));

    // Production clamps at capacity and still succeeds
    let mut pools = LivePools::new();
    pools.insert(ResourcePool::new("Soil", 9.0, 10.0));
    let flow = ResourceFlow::new("Soil", 1.0);
    let first = flow.produce(&mut pools, 3, &BTreeMap::new());
    let second = flow.produce(&mut pools, 3, &BTreeMap::new());
    results.push(check(
        "flow_capacity_clamp",
        first.succeeded && second.succeeded && pools.available("Soil") == 10.0,
        format!("{:.1}/10.0 after two deposits of 3", pools.available("Soil")),
    ));

    results
}

// ── 3. Processor Cycles ─────────────────────────────────────────────────

fn snack_world(snacks: f64) -> (TestWorld, VesselId, ResourceProcessor) {
    let mut world = TestWorld::new();
    let vessel = world.vessel(|b| {
        b.with_pool("Snacks", snacks, 100.0)
            .with_pool("Soil", 0.0, 100.0)
    });
    for (name, job) in [("Jeb", "Pilot"), ("Bill", "Engineer"), ("Bob", "Scientist")] {
        world.crew(Crewmember::new(name, job), vessel);
    }
    let processor = ResourceProcessor::new("Snacks", 100.0)
        .with_input(ResourceFlow::new("Snacks", 1.0))
        .with_output(ResourceFlow::new("Soil", 1.0).depends_on("Snacks"))
        .with_outcome(Outcome::new(Effect::SetCondition {
            condition: "Hungry".into(),
        }));
    (world, vessel, processor)
}

fn validate_processors() -> Vec<TestResult> {
    println!("--- Processor Cycles ---");
    let mut results = Vec::new();

    // One call for five cycles equals five calls for one
    let (mut batched, vessel, mut p1) = snack_world(13.0);
    let (mut stepped, _, mut p2) = snack_world(13.0);
    let batched_cycles = p1.process_resources(&mut batched.context(), vessel, 500.0);
    let mut stepped_cycles = 0;
    for _ in 0..5 {
        stepped_cycles += p2.process_resources(&mut stepped.context(), vessel, 100.0);
    }
    results.push(check(
        "processor_accumulation",
        batched_cycles == 5
            && stepped_cycles == 5
            && batched.vessels == stepped.vessels
            && batched.roster.snapshot() == stepped.roster.snapshot(),
        format!("{} batched vs {} stepped cycles", batched_cycles, stepped_cycles),
    ));

    // Counters never overlap
    let overlapping = batched
        .roster
        .snapshot()
        .iter()
        .filter(|s| {
            s.record
                .success_counters
                .keys()
                .any(|k| s.record.failure_counters.contains_key(k))
        })
        .count();
    results.push(check(
        "processor_counter_exclusion",
        overlapping == 0,
        format!("{} individuals with both counters", overlapping),
    ));

    // Unserved crew get the outcome
    let hungry: Vec<String> = batched
        .roster
        .snapshot()
        .iter()
        .filter(|s| s.record.has_condition("Hungry"))
        .map(|s| s.crewmember.name.clone())
        .collect();
    results.push(check(
        "processor_outcome_targets",
        hungry == ["Bill", "Bob"],
        format!("hungry: {}", hungry.join(", ")),
    ));

    // Disqualification by precondition name overrides the check itself
    let mut world = TestWorld::new();
    let vessel = world.vessel(|b| b.with_gravity(0.1));
    let jeb = world.crew(Crewmember::new("Jeb", "Pilot"), vessel);
    let bill = world.crew(Crewmember::new("Bill", "Engineer"), vessel);
    if let Some(record) = world.roster.record_mut(jeb) {
        record.disqualify("LowGravity");
    }
    let precondition = Precondition::check_gravity_level(
        &ConfigNode::new("PRECONDITION")
            .with_value("label", "LowGravity")
            .with_value("valueToCheck", 0.5)
            .with_value("checkType", "checkLesserThan"),
    );
    let mut ctx = world.context();
    let jeb_ok = precondition.is_valid(&mut ctx, jeb, Some(vessel));
    let bill_ok = precondition.is_valid(&mut ctx, bill, Some(vessel));
    results.push(check(
        "precondition_disqualification",
        !jeb_ok && bill_ok,
        format!("disqualified={}, other={}", jeb_ok, bill_ok),
    ));

    results
}

// ── 4. Predictive Simulator ─────────────────────────────────────────────

fn validate_simulator() -> Vec<TestResult> {
    println!("--- Predictive Simulator ---");
    let mut results = Vec::new();

    // Converter with an empty, unproduced input is switched off for good
    let mut job = SimulationJob::new(3600.0, 20)
        .with_pool("Ore", 0.0, 100.0)
        .with_pool("Food", 5.0, 100.0)
        .with_converter(
            SimConverter::new("Smelter")
                .with_input("Ore", 2.0)
                .with_output("Food", 1.0),
        )
        .with_consumption("Food", 1.0);
    let first = job.run_cycle();
    let switched_off = job.converter("Smelter").map(|c| !c.is_active).unwrap_or(false);
    let report = job.run_to_completion();
    results.push(check(
        "simulator_converter_starvation",
        first.is_ok() && switched_off && report.is_ok(),
        format!("converter off after first cycle: {}", switched_off),
    ));
    let food_cycles = report
        .ok()
        .and_then(|r| r.estimate("Food").map(|e| e.cycles));
    results.push(check(
        "simulator_no_phantom_output",
        food_cycles == Some(4),
        format!("Food lasted {:?} cycles", food_cycles),
    ));

    // Balanced draw runs to the cap and reads as a lower bound
    let balanced = SimulationJob::new(3600.0, 100)
        .with_pool("Food", 10.0, 100.0)
        .with_consumption("Food", 1.0)
        .with_production("Food", 1.0)
        .run_to_completion();
    let (cycles, lower_bound) = match &balanced {
        Ok(r) => (
            r.cycles_run,
            r.estimate("Food").map(|e| e.is_lower_bound()).unwrap_or(false),
        ),
        Err(_) => (0, false),
    };
    results.push(check(
        "simulator_balanced_cap",
        cycles == 100 && lower_bound,
        format!("{} cycles, lower bound: {}", cycles, lower_bound),
    ));

    // Net drain always terminates before the cap
    let draining = SimulationJob::new(3600.0, 10_000)
        .with_pool("Water", 500.0, 500.0)
        .with_consumption("Water", 3.0)
        .with_production("Water", 2.5)
        .run_to_completion();
    let detail = match &draining {
        Ok(r) => format!("finished after {} cycles", r.cycles_run),
        Err(e) => e.to_string(),
    };
    results.push(check(
        "simulator_termination",
        draining
            .map(|r| r.is_complete() && r.cycles_run < 10_000)
            .unwrap_or(false),
        detail,
    ));

    // A bad cycle length is an error, not a hang
    let invalid = SimulationJob::new(0.0, 10).run_to_completion();
    results.push(check(
        "simulator_invalid_cycle",
        matches!(invalid, Err(SimulationError::InvalidCycleLength(_))),
        format!("{:?}", invalid.err()),
    ));

    results
}

// ── 5. Background Scheduler ─────────────────────────────────────────────

fn validate_scheduler() -> Vec<TestResult> {
    println!("--- Background Scheduler ---");
    let mut results = Vec::new();

    let mut scheduler = match SimulationScheduler::spawn(4, 0) {
        Ok(s) => s,
        Err(e) => {
            results.push(check("scheduler_spawn", false, e.to_string()));
            return results;
        }
    };

    let jobs = (1..=3).map(|crew| {
        SimulationJob::new(3600.0, 10_000)
            .with_label(format!("crew of {}", crew))
            .with_pool("Snacks", 60.0, 100.0)
            .with_consumption("Snacks", crew as f64)
    });
    let handles: Result<Vec<JobHandle>, SimulationError> = jobs
        .map(|job| scheduler.submit(job, JobCallbacks::new()))
        .collect();
    let cycles: Vec<Option<u32>> = match handles {
        Ok(handles) => handles
            .into_iter()
            .map(|h| {
                h.wait()
                    .ok()
                    .and_then(|r| r.estimate("Snacks").map(|e| e.cycles))
            })
            .collect(),
        Err(e) => {
            results.push(check("scheduler_submit", false, e.to_string()));
            return results;
        }
    };
    results.push(check(
        "scheduler_results",
        cycles == [Some(59u32), Some(29), Some(19)],
        format!("Snacks lasted {:?} cycles", cycles),
    ));

    scheduler.shutdown();
    let after = scheduler.submit(SimulationJob::new(3600.0, 1), JobCallbacks::new());
    results.push(check(
        "scheduler_shutdown",
        !scheduler.is_running() && matches!(after, Err(SimulationError::SchedulerClosed)),
        "submit after shutdown is refused",
    ));

    results
}

// ── 6. Save/Load ────────────────────────────────────────────────────────

fn validate_persistence() -> Vec<TestResult> {
    println!("--- Save/Load ---");
    let mut results = Vec::new();

    let root = match sample_root() {
        Ok(root) => root,
        Err(e) => {
            results.push(check("persistence_config", false, e));
            return results;
        }
    };
    let mut engine = ProvisioningEngine::from_config(&root, 9);
    let vessel = engine.add_vessel(
        VesselBuilder::new("Outpost")
            .with_pool("Snacks", 4.0, 50.0)
            .with_pool("Soil", 0.0, 50.0)
            .build(),
    );
    if let Some(node) = root
        .nodes_named("RESOURCE_PROCESSOR")
        .find(|n| n.get("name") == Some("Snacks"))
    {
        engine.load_processor(vessel, node);
    }
    engine.add_individual(Crewmember::new("Jeb", "Pilot"), Some(vessel));
    engine.add_individual(Crewmember::new("Bill", "Engineer"), Some(vessel));
    engine.update(3.5 * 3600.0);

    let mut buffer = Vec::new();
    let saved = engine.save(&mut buffer);
    let mut restored = ProvisioningEngine::from_config(&root, 9);
    let loaded = restored.load(&buffer[..]);
    let same = saved.is_ok()
        && loaded.is_ok()
        && SaveData::capture(&restored) == SaveData::capture(&engine);
    results.push(check(
        "persistence_roundtrip",
        same,
        format!("{} bytes, state identical: {}", buffer.len(), same),
    ));

    results
}
