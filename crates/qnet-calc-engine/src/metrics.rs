//! ---
//! qnet_section: "08-queueing-models"
//! qnet_subsection: "module"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Normalization constants and performance metrics for closed queueing networks."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
//! Steady-state metrics read off a completed [`NormalizationTable`].
//!
//! Every function here is pure: the table is borrowed immutably and no
//! intermediate state survives a call.
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    errors::{DomainError, Result},
    model::Network,
    normalization::NormalizationTable,
};

/// Probability that a queue with load `load` holds at least `k` jobs.
pub fn prob_at_least(table: &NormalizationTable, load: f64, k: usize) -> Result<f64> {
    check_load(load)?;
    if k > table.population() {
        return Ok(0.0);
    }
    table.check_denominator()?;
    Ok(table.weighted_ratio(load, k))
}

/// Probability that a queue holds exactly `k` jobs.
pub fn prob_exactly(table: &NormalizationTable, load: f64, k: usize) -> Result<f64> {
    Ok(prob_at_least(table, load, k)? - prob_at_least(table, load, k + 1)?)
}

/// Mean number of jobs at a queue, `sum_{k>=1} P(n_i >= k)`.
pub fn expected_length(table: &NormalizationTable, load: f64) -> Result<f64> {
    check_load(load)?;
    if table.population() == 0 {
        return Ok(0.0);
    }
    table.check_denominator()?;
    Ok(table.weighted_tail_sum(load))
}

/// Fraction of time a queue is busy, `X_i g[N-1] / g[N]`.
pub fn utilization(table: &NormalizationTable, load: f64) -> Result<f64> {
    prob_at_least(table, load, 1)
}

/// Per-queue throughput `e_i g[N-1] / g[N]`; all zero for an empty population.
pub fn throughput(table: &NormalizationTable, visit_ratios: &[f64]) -> Result<Vec<f64>> {
    for (index, &value) in visit_ratios.iter().enumerate() {
        if !(value.is_finite() && value >= 0.0) {
            return Err(DomainError::InvalidVisitRatio { index, value }.into());
        }
    }
    if table.population() == 0 {
        return Ok(vec![0.0; visit_ratios.len()]);
    }
    let rate = system_throughput(table)?;
    Ok(visit_ratios.iter().map(|e| e * rate).collect())
}

/// Throughput of a reference queue with unit visit ratio, `g[N-1] / g[N]`.
pub fn system_throughput(table: &NormalizationTable) -> Result<f64> {
    if table.population() == 0 {
        return Ok(0.0);
    }
    table.check_denominator()?;
    Ok(table.weighted_ratio(1.0, 1))
}

fn check_load(load: f64) -> Result<()> {
    if !(load.is_finite() && load >= 0.0) {
        return Err(DomainError::InvalidQueryLoad(load).into());
    }
    Ok(())
}

/// Derived, read-only metrics for every queue of a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub population: usize,
    pub system_throughput: f64,
    pub queues: Vec<QueueMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMetrics {
    pub index: usize,
    pub name: String,
    pub load: f64,
    pub visit_ratio: f64,
    pub utilization: f64,
    pub expected_length: f64,
    pub throughput: f64,
    /// Mean time per visit by Little's law; zero when the queue sees no traffic.
    pub response_time: f64,
    /// `P(n_i >= k)` for `k = 0..=N`.
    pub tail: Vec<f64>,
    /// `P(n_i = k)` for `k = 0..=N`.
    pub distribution: Vec<f64>,
}

impl PerformanceReport {
    pub fn queue(&self, index: usize) -> Option<&QueueMetrics> {
        self.queues.get(index)
    }

    pub fn total_expected_length(&self) -> f64 {
        self.queues.iter().map(|q| q.expected_length).sum()
    }
}

/// Evaluates every metric for every queue of `network` against `table`.
pub fn performance_report(
    table: &NormalizationTable,
    network: &Network,
) -> Result<PerformanceReport> {
    let population = table.population();
    let system_throughput = system_throughput(table)?;
    let throughputs = throughput(table, &network.visit_ratios())?;

    let mut queues = Vec::with_capacity(network.queues().len());
    for (index, (queue, throughput)) in network.queues().iter().zip(throughputs).enumerate() {
        let tail = (0..=population)
            .map(|k| prob_at_least(table, queue.load, k))
            .collect::<Result<Vec<_>>>()?;
        let distribution = tail
            .iter()
            .enumerate()
            .map(|(k, p)| p - tail.get(k + 1).copied().unwrap_or(0.0))
            .collect();
        let expected_length = expected_length(table, queue.load)?;
        let response_time = if throughput > 0.0 {
            expected_length / throughput
        } else {
            0.0
        };

        queues.push(QueueMetrics {
            index,
            name: queue.label(index),
            load: queue.load,
            visit_ratio: queue.visit_ratio,
            utilization: tail.get(1).copied().unwrap_or(0.0),
            expected_length,
            throughput,
            response_time,
            tail,
            distribution,
        });
    }

    info!(
        queues = queues.len(),
        population, system_throughput, "performance report derived"
    );

    Ok(PerformanceReport {
        population,
        system_throughput,
        queues,
    })
}
