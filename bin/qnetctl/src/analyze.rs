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
    analyze_network_with_options, io::load_network_from_file, normalization::ScalingPolicy,
    AnalysisOptions,
};
use qnet_common::AppConfig;

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Network description in JSON or YAML.
    #[arg(long, value_name = "FILE")]
    pub network: PathBuf,
    /// Directory for exported reports; defaults to `reports.directory`.
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,
    /// Skip report export even when enabled in configuration.
    #[arg(long)]
    pub no_export: bool,
}

pub fn run(args: AnalyzeArgs, config: &AppConfig, policy: ScalingPolicy) -> Result<()> {
    let network = load_network_from_file(&args.network)
        .with_context(|| format!("failed to load network {}", args.network.display()))?;

    let mut options = AnalysisOptions::default().with_policy(policy);
    if !args.no_export {
        if let Some(dir) = args.output {
            options = options.with_output_dir(dir);
        } else if config.reports.enabled {
            options = options.with_output_dir(config.reports.directory.clone());
        }
    }

    let summary = analyze_network_with_options(&network, &options)?;
    println!("{}", serde_json::to_string_pretty(&summary.performance)?);
    Ok(())
}
