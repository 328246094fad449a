//! ---
//! qnet_section: "05-external-interfaces"
//! qnet_subsection: "binary"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Control CLI for solving closed queueing networks."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use qnet_calc_engine::normalization::ScalingPolicy;
use qnet_common::{init_tracing, AppConfig, LoadedAppConfig, SolverConfig, SolverStrategy};
use tracing::debug;

mod analyze;
#[cfg(feature = "rest-api")]
mod serve;
mod solve;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Normalization constants and performance metrics for closed queueing networks",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(Debug, Args)]
pub struct GlobalOptions {
    /// Path to a TOML configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Override the configured numerical strategy (direct, rescale, log-domain).
    #[arg(long, global = true, value_name = "STRATEGY")]
    pub strategy: Option<SolverStrategy>,
    /// Override the configured rescale threshold.
    #[arg(long, global = true, value_name = "VALUE")]
    pub threshold: Option<f64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute G(0..=N) for a list of loads.
    Solve(solve::SolveArgs),
    /// Compute the full performance report for a network file.
    Analyze(analyze::AnalyzeArgs),
    /// Solve every network of a JSON-lines file.
    Batch(solve::BatchArgs),
    /// Print the effective configuration.
    Config,
    /// Serve the calculation REST API.
    #[cfg(feature = "rest-api")]
    Serve(serve::ServeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = load_config(&cli.global)?;
    init_tracing("qnetctl", &loaded.config.logging)?;
    let policy = resolve_policy(&loaded.config.solver, &cli.global)?;
    debug!(policy = %policy, source = ?loaded.source, "configuration resolved");

    match cli.command {
        Commands::Solve(args) => solve::run_solve(args, policy)?,
        Commands::Analyze(args) => analyze::run(args, &loaded.config, policy)?,
        Commands::Batch(args) => solve::run_batch(args, &loaded.config, policy)?,
        Commands::Config => print_config(&loaded)?,
        #[cfg(feature = "rest-api")]
        Commands::Serve(args) => serve::run(args, &loaded.config)?,
    }
    Ok(())
}

fn load_config(options: &GlobalOptions) -> Result<LoadedAppConfig> {
    if let Some(path) = &options.config {
        let config = AppConfig::from_path(path)?;
        return Ok(LoadedAppConfig {
            config,
            source: Some(path.clone()),
        });
    }
    AppConfig::load_with_source(&[PathBuf::from("qnet.toml"), PathBuf::from("configs/qnet.toml")])
}

/// Maps the configured strategy, with command line overrides, onto a scaling policy.
pub fn resolve_policy(solver: &SolverConfig, options: &GlobalOptions) -> Result<ScalingPolicy> {
    let strategy = options.strategy.unwrap_or(solver.strategy);
    let threshold = options.threshold.unwrap_or(solver.rescale_threshold);
    let policy = match strategy {
        SolverStrategy::Direct => ScalingPolicy::Direct,
        SolverStrategy::Rescale => ScalingPolicy::Rescale { threshold },
        SolverStrategy::LogDomain => ScalingPolicy::LogDomain,
    };
    policy
        .validate()
        .with_context(|| format!("invalid solver settings for strategy {policy}"))?;
    Ok(policy)
}

fn print_config(loaded: &LoadedAppConfig) -> Result<()> {
    match &loaded.source {
        Some(path) => println!("# loaded from {}", path.display()),
        None => println!("# built-in defaults"),
    }
    print!("{}", loaded.config.to_toml()?);
    Ok(())
}
