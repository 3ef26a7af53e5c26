//! Life simulator CLI
//!
//! Runs generation-synchronised Life scenarios on a virtual clock and
//! checks them against a reference stepper.

use clap::Parser;
use life_core::WorkerConfig;
use life_sim::scenarios::ScenarioId;
use life_sim::{GridSnapshot, ScenarioResult, ScenarioRunner};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Life deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "life-sim")]
#[command(about = "Run deterministic multi-worker Game of Life simulations", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of workers (defaults to the scenario's own)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Grid width (defaults to the scenario's own)
    #[arg(long)]
    width: Option<usize>,

    /// Grid height (defaults to the scenario's own)
    #[arg(long)]
    height: Option<usize>,

    /// Scenario to run (blinker, glider, soup, slow_link, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Generation every cell must reach
    #[arg(short, long, default_value = "10")]
    generations: u64,

    /// Give up after this many ticks
    #[arg(long, default_value = "500")]
    max_ticks: u64,

    /// Link latency in ticks
    #[arg(long)]
    latency: Option<u64>,

    /// Maximum extra random delay per op, in ticks
    #[arg(long)]
    jitter: Option<u64>,

    /// Worker config JSON used as the template for every worker
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the scenario's generation-0 snapshot to this path and exit
    #[arg(long)]
    write_snapshot: Option<PathBuf>,

    /// Run a saved generation-0 snapshot instead of the scenarios
    #[arg(long, conflicts_with = "write_snapshot")]
    snapshot: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins over the flags.
    let default_level = if args.verbose {
        "debug"
    } else if args.json {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    if !args.json {
        info!("Life simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: blinker, glider, soup, slow_link, all");
                return ExitCode::FAILURE;
            }
        }
    };

    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let mut runner = ScenarioRunner::new(seed)
        .with_generations(args.generations)
        .with_max_ticks(args.max_ticks);
    if let Some(workers) = args.workers {
        runner = runner.with_workers(workers);
    }
    if let Some(width) = args.width {
        runner = runner.with_width(width);
    }
    if let Some(height) = args.height {
        runner = runner.with_height(height);
    }
    if let Some(latency) = args.latency {
        runner = runner.with_latency(latency);
    }
    if let Some(jitter) = args.jitter {
        runner = runner.with_jitter(jitter);
    }
    if let Some(path) = &args.config {
        match WorkerConfig::from_json_file(path) {
            Ok(template) => runner = runner.with_worker_template(template),
            Err(e) => {
                error!("Bad worker config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    if let Some(path) = &args.write_snapshot {
        if scenarios.len() > 1 {
            eprintln!("Error: --write-snapshot needs a single scenario, not 'all'");
            return ExitCode::FAILURE;
        }
        let written = runner
            .snapshot(scenarios[0])
            .and_then(|snapshot| snapshot.save_json(path).map(|_| snapshot.len()));
        return match written {
            Ok(cells) => {
                info!("Wrote {} cells to {}", cells, path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to write snapshot: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let mut results: Vec<ScenarioResult> = Vec::new();
    if let Some(path) = &args.snapshot {
        let snapshot = match GridSnapshot::load_json(path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to load snapshot {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        };
        results.push(runner.run_snapshot(&snapshot));
    } else {
        for scenario in &scenarios {
            results.push(runner.run(*scenario));
        }
    }

    if !args.json {
        for result in &results {
            if result.passed {
                info!(
                    "✓ {} (seed={}) PASSED: generation {} in {} ticks",
                    result.scenario, seed, result.min_generation, result.total_ticks
                );
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    result.scenario,
                    seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    let total = results.len();
    let failed = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "results": results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Failed to encode results: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed, total);
        }
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
