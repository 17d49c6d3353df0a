//! Fairground Simulator CLI
//!
//! Run deterministic fairness scenarios against the simulated ledger.

use clap::Parser;
use fairground_sim::scenarios::ScenarioId;
use fairground_sim::{ScenarioResult, ScenarioRunner};
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Fairground deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "fairground-sim")]
#[command(about = "Run deterministic fairness scenarios for Fairground", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Participants per round
    #[arg(short, long, default_value = "16")]
    participants: usize,

    /// Scenario to run (honest_round, griefing, front_run, window_edge, history_outage, rate_convergence, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Seeds evaluated by rate_convergence
    #[arg(short, long, default_value = "100")]
    trials: usize,

    /// Elimination rate in basis points (0..=10000)
    #[arg(short, long, default_value = "4000",
          value_parser = clap::value_parser!(u16).range(0..=fairground_core::BPS_DENOMINATOR as i64))]
    rate: u16,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG still wins for per-crate filters
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("Fairground Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: {}, all", ScenarioId::all()
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(", "));
            std::process::exit(1);
        })]
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);

        let runner = ScenarioRunner::new(seed, args.participants)
            .with_trials(args.trials)
            .with_rate(args.rate);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }

            all_results.push(result);
        }
    }

    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "commits": r.metrics.commits,
                    "reveals": r.metrics.reveals,
                    "forfeits": r.metrics.forfeits,
                    // u128 is outside JSON's safe integer range
                    "forfeited_stake": r.metrics.forfeited_stake.to_string(),
                    "extended_lookups": r.metrics.extended_lookups,
                    "unavailable_lookups": r.metrics.unavailable_lookups,
                    "eliminated": r.metrics.eliminated,
                    "avg_fraction": r.metrics.avg_fraction,
                    "report": r.metrics.report,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(out) => println!("{}", out),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} seed={}: {}",
                        result.scenario.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
