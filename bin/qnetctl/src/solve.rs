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
use clap::Args;
use qnet_calc_engine::{
    api::NormalizationResponse,
    cache::NormalizationCache,
    io::read_network_lines,
    metrics::system_throughput,
    model::Network,
    normalization::{compute_network, NormalizationTable, ScalingPolicy},
};
use qnet_common::AppConfig;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Args)]
pub struct SolveArgs {
    /// Comma separated relative loads, one per queue.
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub loads: Vec<f64>,
    /// Number of circulating jobs.
    #[arg(long, allow_negative_numbers = true)]
    pub population: i64,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// JSON-lines file holding one network per line.
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,
}

pub fn run_solve(args: SolveArgs, policy: ScalingPolicy) -> Result<()> {
    let network = Network::from_loads(&args.loads, args.population)?;
    let table = compute_network(&network, policy)?;
    println!(
        "{}",
        serde_json::to_string(&NormalizationResponse::from_table(&table))?
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct BatchLine {
    index: usize,
    line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    population: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ln_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_throughput: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run_batch(args: BatchArgs, config: &AppConfig, policy: ScalingPolicy) -> Result<()> {
    let entries = read_network_lines(&args.input)
        .with_context(|| format!("failed to read batch file {}", args.input.display()))?;
    let cache = config
        .cache
        .enabled
        .then(|| NormalizationCache::with_capacity(config.cache.capacity));

    let mut failed = 0usize;
    for (index, entry) in entries.into_iter().enumerate() {
        let population = entry.network.as_ref().ok().map(Network::population);
        let outcome = entry.network.and_then(|network| match &cache {
            Some(cache) => cache
                .get_or_compute_network(&network, policy)
                .and_then(|table| summarize(&table)),
            None => compute_network(&network, policy).and_then(|table| summarize(&table)),
        });
        let record = match outcome {
            Ok((ln_g, throughput)) => BatchLine {
                index,
                line: entry.line,
                population,
                ln_g: Some(ln_g),
                system_throughput: Some(throughput),
                error: None,
            },
            Err(err) => {
                failed += 1;
                warn!(index, line = entry.line, error = %err, "batch entry failed");
                BatchLine {
                    index,
                    line: entry.line,
                    population,
                    ln_g: None,
                    system_throughput: None,
                    error: Some(err.to_string()),
                }
            }
        };
        println!("{}", serde_json::to_string(&record)?);
    }

    match &cache {
        Some(cache) => {
            let stats = cache.stats();
            info!(
                failed,
                entries = stats.entries,
                hits = stats.hits,
                misses = stats.misses,
                evictions = stats.evictions,
                "batch completed"
            );
        }
        None => info!(failed, "batch completed"),
    }
    Ok(())
}

fn summarize(table: &NormalizationTable) -> qnet_calc_engine::Result<(f64, f64)> {
    let throughput = system_throughput(table)?;
    Ok((table.ln_g(table.population()), throughput))
}
