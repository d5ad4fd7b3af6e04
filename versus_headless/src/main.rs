// CLI entry point for running the Versus city headless.
//
// Loads a config (or the defaults), seeds a city, steps the sim one second
// at a time for the requested duration and forwards every narrative event to
// an `EventLog` sink, which writes through `tracing`. Diagnostics from the
// sim itself (rejected commands and the like) go through the same
// subscriber, filtered by `RUST_LOG` (default `info`).
//
// Usage:
//   versus [OPTIONS]
//     --seed <N>               PRNG seed (default: 1)
//     --config <PATH>          JSON config file (default: built-in defaults)
//     --seconds <N>            Simulated seconds to run (default: 60)
//     --min-importance <LVL>   low | medium | high (default: medium)
//     --dump-config            Print the default config as JSON and exit

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use versus_sim::config::GameConfig;
use versus_sim::event::{EventLog, EventSink};
use versus_sim::sim::SimState;
use versus_sim::types::{Faction, Importance};

struct RunOptions {
    seed: u64,
    config_path: Option<PathBuf>,
    seconds: u64,
    min_importance: Importance,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            seed: 1,
            config_path: None,
            seconds: 60,
            min_importance: Importance::Medium,
        }
    }
}

fn main() {
    init_tracing();
    let options = parse_args();

    let config = match &options.config_path {
        Some(path) => match GameConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => GameConfig::default(),
    };
    let ticks_per_second = config.ticks_per_second;

    let mut sim = match SimState::with_config(options.seed, config) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Failed to start simulation: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        seed = options.seed,
        cats = sim.population(Faction::Cat),
        dogs = sim.population(Faction::Dog),
        "city seeded"
    );

    let mut log = EventLog::new(options.min_importance);
    let mut total_events = 0usize;
    for second in 1..=options.seconds {
        let result = sim.step(&[], second * ticks_per_second);
        total_events += result.events.len();
        for event in &result.events {
            log.on_event(event);
        }
    }

    print_summary(&sim, total_events, log.forwarded());
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Final standings as JSON on stdout.
fn print_summary(sim: &SimState, total_events: usize, forwarded: usize) {
    let mut held = [0usize; 3];
    for block in sim.city.blocks() {
        held[block.dominant_faction().index()] += 1;
    }
    let factions: Vec<_> = Faction::ALL
        .iter()
        .map(|&faction| {
            let high_priority: Vec<String> = sim
                .director(faction)
                .map(|d| d.high_priority_blocks().iter().map(ToString::to_string).collect())
                .unwrap_or_default();
            serde_json::json!({
                "faction": faction.to_string(),
                "population": sim.population(faction),
                "capacity": sim.max_faction_size(faction),
                "blocks_held": held[faction.index()],
                "high_priority": high_priority,
            })
        })
        .collect();
    let summary = serde_json::json!({
        "tick": sim.tick,
        "events": total_events,
        "events_logged": forwarded,
        "mines": sim.mines.len(),
        "pickups": sim.pickups.len(),
        "factions": factions,
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Failed to encode summary: {e}"),
    }
}

/// Parse command-line arguments. Uses simple `std::env::args()` matching.
fn parse_args() -> RunOptions {
    let mut options = RunOptions::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--seed" => {
                i += 1;
                options.seed = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--seed requires a valid number");
                    std::process::exit(1);
                });
            }
            "--config" => {
                i += 1;
                options.config_path = args.get(i).map(PathBuf::from).or_else(|| {
                    eprintln!("--config requires a path");
                    std::process::exit(1);
                });
            }
            "--seconds" => {
                i += 1;
                options.seconds = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--seconds requires a valid number");
                    std::process::exit(1);
                });
            }
            "--min-importance" => {
                i += 1;
                options.min_importance = args
                    .get(i)
                    .and_then(|s| parse_importance(s))
                    .unwrap_or_else(|| {
                        eprintln!("--min-importance must be one of: low, medium, high");
                        std::process::exit(1);
                    });
            }
            "--dump-config" => {
                match serde_json::to_string_pretty(&GameConfig::default()) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        eprintln!("Failed to encode config: {e}");
                        std::process::exit(1);
                    }
                }
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    options
}

fn parse_importance(s: &str) -> Option<Importance> {
    match s.to_ascii_lowercase().as_str() {
        "low" => Some(Importance::Low),
        "medium" => Some(Importance::Medium),
        "high" => Some(Importance::High),
        _ => None,
    }
}

fn print_usage() {
    println!("Usage: versus [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --seed <N>               PRNG seed (default: 1)");
    println!("  --config <PATH>          JSON config file (default: built-in defaults)");
    println!("  --seconds <N>            Simulated seconds to run (default: 60)");
    println!("  --min-importance <LVL>   low | medium | high (default: medium)");
    println!("  --dump-config            Print the default config as JSON and exit");
    println!("  --help, -h               Show this help");
}
