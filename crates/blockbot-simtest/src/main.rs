//! BlockBot Headless Scenario Harness
//!
//! Runs block programs against simulated robots without a renderer or VR
//! host, and checks the execution events they produce.
//!
//! Usage:
//!   cargo run -p blockbot-simtest
//!   cargo run -p blockbot-simtest -- --verbose
//!   cargo run -p blockbot-simtest -- --scenario contention --save target/saves

use std::path::{Path, PathBuf};

use blockbot_core::execution::ExecutionEvent;
use blockbot_core::prelude::SimulationEngine;
use blockbot_logic::chassis::RobotSpec;
use blockbot_logic::config::{validate_config, ExecutionConfig};
use blockbot_logic::graph::BlockGraph;
use clap::Parser;
use log::{info, warn};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

// ── Built-in scenarios (same JSON the lesson content ships) ─────────────
const SCENARIOS: &[(&str, &str)] = &[
    ("move_then_end", include_str!("../../../data/scenarios/move_then_end.json")),
    ("for_loop_wait", include_str!("../../../data/scenarios/for_loop_wait.json")),
    ("contention", include_str!("../../../data/scenarios/contention.json")),
    ("incompatible", include_str!("../../../data/scenarios/incompatible.json")),
    ("pause_step", include_str!("../../../data/scenarios/pause_step.json")),
    ("while_chance", include_str!("../../../data/scenarios/while_chance.json")),
];

#[derive(Parser)]
#[command(name = "blockbot-simtest")]
#[command(author, version, about = "Run BlockBot scenarios headlessly", long_about = None)]
struct Cli {
    /// Print every check, not only failures
    #[arg(short, long)]
    verbose: bool,

    /// Only run scenarios whose name contains this text
    #[arg(short, long)]
    scenario: Option<String>,

    /// JSON file with execution config overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Additional scenario files to run
    #[arg(short, long)]
    file: Vec<PathBuf>,

    /// Directory to write a save snapshot of each finished scenario to
    #[arg(long)]
    save: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    robot: RobotSpec,
    dt: f32,
    max_ticks: usize,
    program: BlockGraph,
    #[serde(default)]
    controls: Vec<Control>,
    expect: Expectations,
}

/// A control call issued before the update with index `tick`.
#[derive(Debug, Deserialize)]
struct Control {
    tick: usize,
    action: ControlAction,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ControlAction {
    Pause,
    Resume,
    ResumeOrRun,
    NextStep,
    Stop,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Expectations {
    /// Run must finish within `max_ticks`.
    ends: bool,
    /// Event names that must appear in this order (other events may interleave).
    events: Vec<String>,
    /// Iteration values reported by `For` blocks, in order.
    iterations: Option<Vec<u32>>,
    /// Number of `walker_advanced` events.
    advances: Option<usize>,
    /// Number of `command_rejected` events.
    rejections: Option<usize>,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    println!("=== BlockBot Scenario Harness ===\n");

    let mut results = Vec::new();

    // 1. Configuration
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(detail) => {
            results.push(TestResult {
                name: "config_parse".into(),
                passed: false,
                detail,
            });
            ExecutionConfig::default()
        }
    };
    results.extend(validate_execution_config(&config));

    // 2. Scenarios
    let mut sources: Vec<(String, String)> = SCENARIOS
        .iter()
        .map(|(name, json)| (name.to_string(), json.to_string()))
        .collect();
    for path in &cli.file {
        match std::fs::read_to_string(path) {
            Ok(json) => sources.push((path.display().to_string(), json)),
            Err(e) => results.push(TestResult {
                name: format!("{}_read", path.display()),
                passed: false,
                detail: format!("cannot read scenario file: {}", e),
            }),
        }
    }

    for (source, json) in &sources {
        let scenario: Scenario = match serde_json::from_str(json) {
            Ok(s) => s,
            Err(e) => {
                results.push(TestResult {
                    name: format!("{}_parse", source),
                    passed: false,
                    detail: format!("JSON parse error: {}", e),
                });
                continue;
            }
        };
        if let Some(filter) = &cli.scenario {
            if !scenario.name.contains(filter.as_str()) {
                continue;
            }
        }
        results.extend(run_scenario(&scenario, config, cli.save.as_deref()));
    }

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || cli.verbose {
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

// ── 1. Configuration ────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> Result<ExecutionConfig, String> {
    let Some(path) = path else {
        return Ok(ExecutionConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let config =
        serde_json::from_str(&json).map_err(|e| format!("JSON parse error: {}", e))?;
    info!("loaded config overrides from {}", path.display());
    Ok(config)
}

fn validate_execution_config(config: &ExecutionConfig) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let errors = validate_config(config);
    vec![TestResult {
        name: "config_valid".into(),
        passed: errors.is_empty(),
        detail: if errors.is_empty() {
            format!(
                "time_scale {}, seed {}, turn {}°/s",
                config.time_scale, config.seed, config.tuning.turn_rate
            )
        } else {
            format!("{:?}", errors)
        },
    }]
}

// ── 2. Scenarios ────────────────────────────────────────────────────────

fn run_scenario(
    scenario: &Scenario,
    config: ExecutionConfig,
    save_dir: Option<&Path>,
) -> Vec<TestResult> {
    println!("--- Scenario: {} ---", scenario.name);
    if !scenario.description.is_empty() {
        println!("    {}", scenario.description);
    }
    let mut results = Vec::new();
    let name = |check: &str| format!("{}_{}", scenario.name, check);

    // Capabilities the program asks for that the chassis lacks. Not a
    // failure by itself: some scenarios exercise rejection on purpose.
    let missing: Vec<String> = scenario
        .program
        .blocks()
        .filter_map(|b| b.command())
        .filter_map(|c| c.required_capability())
        .filter(|cap| !scenario.robot.chassis.has(*cap))
        .map(|cap| cap.to_string())
        .collect();
    if !missing.is_empty() {
        warn!(
            "{}: {:?} robot lacks {}",
            scenario.name,
            scenario.robot.chassis,
            missing.join(", ")
        );
    }

    let mut engine = SimulationEngine::new(config);
    engine.spawn_robot(&scenario.robot);
    engine.load_program(scenario.program.clone());

    match engine.run() {
        Ok(true) => {}
        Ok(false) => {
            results.push(TestResult {
                name: name("run"),
                passed: false,
                detail: "program did not start (no start blocks?)".into(),
            });
            return results;
        }
        Err(e) => {
            results.push(TestResult {
                name: name("run"),
                passed: false,
                detail: format!("run failed: {}", e),
            });
            return results;
        }
    }

    let mut events: Vec<ExecutionEvent> = Vec::new();
    let mut ticks = 0;
    while ticks < scenario.max_ticks && engine.is_running() {
        for control in scenario.controls.iter().filter(|c| c.tick == ticks) {
            apply_control(&mut engine, control.action);
        }
        if let Err(e) = engine.update(scenario.dt) {
            results.push(TestResult {
                name: name("update"),
                passed: false,
                detail: format!("tick {}: {}", ticks, e),
            });
            return results;
        }
        events.extend(engine.drain_events());
        ticks += 1;
    }

    let ended = !engine.is_running();
    if scenario.expect.ends {
        results.push(TestResult {
            name: name("ends"),
            passed: ended,
            detail: format!(
                "{} after {} ticks ({:.2} simulated s)",
                if ended { "ended" } else { "still running" },
                ticks,
                engine.sim_time()
            ),
        });
    }

    if !scenario.expect.events.is_empty() {
        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
        let missing = first_missing(&names, &scenario.expect.events);
        results.push(TestResult {
            name: name("event_order"),
            passed: missing.is_none(),
            detail: match missing {
                None => format!("{} events in expected order", scenario.expect.events.len()),
                Some(m) => format!("'{}' missing or out of order in {:?}", m, names),
            },
        });
    }

    if let Some(expected) = &scenario.expect.iterations {
        let seen: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::IterationChanged { iteration, .. } => Some(*iteration),
                _ => None,
            })
            .collect();
        results.push(TestResult {
            name: name("iterations"),
            passed: &seen == expected,
            detail: format!("{:?} (expected {:?})", seen, expected),
        });
    }

    if let Some(expected) = scenario.expect.advances {
        let count = count_events(&events, "walker_advanced");
        results.push(TestResult {
            name: name("advances"),
            passed: count == expected,
            detail: format!("{} block advances (expected {})", count, expected),
        });
    }

    if let Some(expected) = scenario.expect.rejections {
        let count = count_events(&events, "command_rejected");
        results.push(TestResult {
            name: name("rejections"),
            passed: count == expected,
            detail: format!("{} rejected commands (expected {})", count, expected),
        });
    }

    if let Some(dir) = save_dir {
        let path = dir.join(format!("{}.bin", scenario.name));
        let saved = engine.save_to_file(&path);
        results.push(TestResult {
            name: name("save"),
            passed: saved.is_ok(),
            detail: match saved {
                Ok(()) => format!("snapshot written to {}", path.display()),
                Err(e) => format!("save failed: {}", e),
            },
        });
    }

    results
}

fn apply_control(engine: &mut SimulationEngine, action: ControlAction) {
    let accepted = match action {
        ControlAction::Pause => engine.pause(),
        ControlAction::Resume => engine.resume(),
        ControlAction::NextStep => engine.next_step(),
        ControlAction::Stop => engine.stop(),
        ControlAction::ResumeOrRun => engine.resume_or_run().unwrap_or_else(|e| {
            warn!("resume_or_run failed: {}", e);
            false
        }),
    };
    if !accepted {
        warn!("{:?} ignored in state {:?}", action, engine.state());
    }
}

/// First expected name that is not found, in order, as a subsequence.
fn first_missing<'a>(names: &[&str], expected: &'a [String]) -> Option<&'a str> {
    let mut rest = names.iter();
    expected
        .iter()
        .find(|want| !rest.any(|n| n == want))
        .map(|s| s.as_str())
}

fn count_events(events: &[ExecutionEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}
