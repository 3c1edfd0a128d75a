//! Project every scenario of a CSV table and write the day × scenario
//! matrices for the infected, recovered and exposed compartments.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seir_projection::config::CONFIG_ENV_VAR;
use seir_projection::io::debug_log::write_trajectory_debug_logs;
use seir_projection::io::output::{write_matrices_csv, write_matrices_json, write_run_summary};
use seir_projection::io::scenarios::load_scenarios_csv;
use seir_projection::model::grid::TimeGridKind;
use seir_projection::model::seir::{DEFAULT_ATOL, DEFAULT_RK4_DT, DEFAULT_RTOL};
use seir_projection::{BatchRunner, Compartment, DuplicatePolicy, ResultAggregator, RunConfig, SolverKind};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SolverArg {
    Dopri,
    Rk4,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GridArg {
    Daily,
    Linspace,
}

#[derive(Parser, Debug)]
#[command(name = "seir_batch")]
#[command(about = "Run SEIR projections for every scenario in a CSV table")]
struct Cli {
    /// Scenario table (one row per locality)
    scenarios: String,

    /// Output directory for the matrices and run summary
    #[arg(long, default_value = "output")]
    out: PathBuf,

    /// JSON run configuration (defaults to $SEIR_CONFIG when set)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    solver: Option<SolverArg>,

    /// Relative tolerance for the adaptive solver
    #[arg(long)]
    rtol: Option<f64>,

    /// Absolute tolerance for the adaptive solver
    #[arg(long)]
    atol: Option<f64>,

    /// Step size for the fixed-step solver (days)
    #[arg(long)]
    dt: Option<f64>,

    #[arg(long, value_enum)]
    grid: Option<GridArg>,

    /// Fail instead of summing when a scenario repeats a day
    #[arg(long)]
    strict_duplicates: bool,

    /// Integrate scenarios one after another on the current thread
    #[arg(long)]
    sequential: bool,

    /// Per-scenario wall-clock bound in seconds
    #[arg(long)]
    timeout_secs: Option<f64>,

    /// Write one trajectory dump per scenario into this directory
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Also write all matrices as a single JSON document
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn run_config(&self) -> anyhow::Result<RunConfig> {
        let path = self.config.clone().or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));
        let mut cfg = match path {
            Some(p) => RunConfig::from_json_file(p)?,
            None => RunConfig::default(),
        };

        cfg.solver = match (self.solver, cfg.solver) {
            (None | Some(SolverArg::Dopri), SolverKind::DormandPrince { rtol, atol }) => SolverKind::DormandPrince {
                rtol: self.rtol.unwrap_or(rtol),
                atol: self.atol.unwrap_or(atol),
            },
            (Some(SolverArg::Dopri), SolverKind::Rk4 { .. }) => SolverKind::DormandPrince {
                rtol: self.rtol.unwrap_or(DEFAULT_RTOL),
                atol: self.atol.unwrap_or(DEFAULT_ATOL),
            },
            (None | Some(SolverArg::Rk4), SolverKind::Rk4 { dt }) => SolverKind::Rk4 { dt: self.dt.unwrap_or(dt) },
            (Some(SolverArg::Rk4), SolverKind::DormandPrince { .. }) => {
                SolverKind::Rk4 { dt: self.dt.unwrap_or(DEFAULT_RK4_DT) }
            }
        };

        if let Some(grid) = self.grid {
            cfg.grid = match grid {
                GridArg::Daily => TimeGridKind::Daily,
                GridArg::Linspace => TimeGridKind::Linspace,
            };
        }
        if self.strict_duplicates {
            cfg.duplicate_policy = DuplicatePolicy::Reject;
        }
        if self.sequential {
            cfg.parallel = false;
        }
        if self.timeout_secs.is_some() {
            cfg.scenario_timeout_secs = self.timeout_secs;
        }
        cfg.check()?;
        Ok(cfg)
    }
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let cfg = cli.run_config()?;
    info!(?cfg, "run configuration");

    let scenarios = load_scenarios_csv(&cli.scenarios)?;
    info!(scenarios = scenarios.len(), path = %cli.scenarios, "scenarios loaded");

    let outcome = BatchRunner::from_config(&cfg).run(&scenarios);

    if let Some(dir) = &cli.debug_dir {
        let paths = write_trajectory_debug_logs(dir, &scenarios, &outcome.trajectories)?;
        info!(dir = %dir.display(), count = paths.len(), "trajectory dumps written");
    }

    let result = ResultAggregator::new(cfg.duplicate_policy)
        .aggregate_all(&outcome.trajectories, &Compartment::REPORTED)
        .context("aggregation failed")?;

    let paths = write_matrices_csv(&cli.out, &result)?;
    for p in &paths {
        info!(path = %p.display(), "matrix written");
    }
    if cli.json {
        write_matrices_json(cli.out.join("matrices.json"), &result)?;
    }
    write_run_summary(cli.out.join("summary.json"), &outcome, &result.warnings)?;

    Ok(!outcome.all_failed())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seir_projection=info,seir_batch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("every scenario failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
