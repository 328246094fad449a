//! ---
//! qnet_section: "08-queueing-models"
//! qnet_subsection: "module"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Normalization constants and performance metrics for closed queueing networks."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
//! Normalization constants and steady-state metrics for closed product-form
//! queueing networks.
//!
//! [`normalization`] folds per-queue relative loads into `G(0..=N)` in
//! `O(N·M)` time; [`metrics`] reads tail probabilities, mean queue lengths and
//! throughputs off the finished table without touching the state space.
pub mod api;
pub mod cache;
pub mod errors;
pub mod io;
pub mod metrics;
pub mod model;
pub mod normalization;
pub mod reports;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    metrics::{performance_report, PerformanceReport},
    model::Network,
    normalization::{compute_network, NormalizationTable, ScalingPolicy},
    reports::ReportExporter,
};

pub use errors::{CalcEngineError, DomainError, NumericalError, Result};
pub use metrics::{expected_length, prob_at_least, prob_exactly, throughput, utilization};
pub use normalization::{compute_normalization, compute_table};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalcSummary {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub network_version: Option<String>,
    pub policy: ScalingPolicy,
    pub table: NormalizationTable,
    pub performance: PerformanceReport,
}

impl CalcSummary {
    pub fn exporter(&self) -> ReportExporter<'_> {
        ReportExporter::new(self)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub policy: ScalingPolicy,
    /// Reports are only written when a directory is given.
    pub output_dir: Option<PathBuf>,
}

impl AnalysisOptions {
    pub fn with_policy(mut self, policy: ScalingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}

/// Computes the table and the performance report without exporting anything.
pub fn analyze_network(network: &Network, policy: ScalingPolicy) -> Result<CalcSummary> {
    analyze_network_with_options(network, &AnalysisOptions::default().with_policy(policy))
}

/// Runs the recurrence and the metrics layer, then exports reports if requested.
pub fn analyze_network_with_options(
    network: &Network,
    options: &AnalysisOptions,
) -> Result<CalcSummary> {
    info!(
        queues = network.queues().len(),
        population = network.population(),
        "Running normalization recurrence..."
    );
    let table = compute_network(network, options.policy)?;

    info!("Deriving performance metrics...");
    let performance = performance_report(&table, network)?;

    let summary = CalcSummary {
        run_id: Uuid::new_v4(),
        timestamp: Utc::now(),
        network_version: network.version().map(str::to_owned),
        policy: options.policy,
        table,
        performance,
    };

    if let Some(dir) = &options.output_dir {
        summary.exporter().export_all(dir)?;
    }

    Ok(summary)
}
