//! ---
//! qnet_section: "08-queueing-models"
//! qnet_subsection: "module"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Normalization constants and performance metrics for closed queueing networks."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
use std::{fs, path::Path};

use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{errors::Result, CalcSummary};

pub const NORMALIZATION_FILE: &str = "normalization.json";
pub const PERFORMANCE_FILE: &str = "performance.json";

#[derive(Debug)]
pub struct ReportExporter<'a> {
    summary: &'a CalcSummary,
}

impl<'a> ReportExporter<'a> {
    pub fn new(summary: &'a CalcSummary) -> Self {
        Self { summary }
    }

    pub fn export_all(&self, output_dir: &Path) -> Result<()> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
        }

        let timestamp = self.summary.timestamp.to_rfc3339();
        let version = self.summary.network_version.clone();

        let normalization = NormalizationData {
            policy: self.summary.policy.to_string(),
            log_scale: self.summary.table.log_scale(),
            ln_g: (0..=self.summary.table.population())
                .map(|n| self.summary.table.ln_g(n))
                .collect(),
            g: self.summary.table.to_vec(),
        };
        let normalization_report = ReportEnvelope::new(
            &timestamp,
            self.summary.run_id,
            version.clone(),
            normalization_schema(),
            &normalization,
        );
        let performance_report = ReportEnvelope::new(
            &timestamp,
            self.summary.run_id,
            version,
            performance_schema(),
            &self.summary.performance,
        );

        write_json(output_dir.join(NORMALIZATION_FILE), &normalization_report)?;
        write_json(output_dir.join(PERFORMANCE_FILE), &performance_report)?;

        info!(run_id = %self.summary.run_id, "Reports exported to {}", output_dir.display());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct NormalizationData {
    policy: String,
    log_scale: f64,
    g: Vec<f64>,
    ln_g: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct ReportEnvelope<'a, T: Serialize> {
    timestamp: &'a str,
    run_id: Uuid,
    network_version: Option<String>,
    schema: serde_json::Value,
    data: &'a T,
}

impl<'a, T: Serialize> ReportEnvelope<'a, T> {
    fn new(
        timestamp: &'a str,
        run_id: Uuid,
        network_version: Option<String>,
        schema: serde_json::Value,
        data: &'a T,
    ) -> Self {
        Self {
            timestamp,
            run_id,
            network_version,
            schema,
            data,
        }
    }
}

fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)?;
    Ok(())
}

// Non-finite entries (overflowed g, ln 0) serialise as null.
fn normalization_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "NormalizationTable",
        "type": "object",
        "properties": {
            "policy": {"type": "string"},
            "log_scale": {"type": "number"},
            "g": {"type": "array", "items": {"type": ["number", "null"]}},
            "ln_g": {"type": "array", "items": {"type": ["number", "null"]}}
        },
        "required": ["policy", "log_scale", "g", "ln_g"]
    })
}

fn performance_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "PerformanceReport",
        "type": "object",
        "properties": {
            "population": {"type": "integer", "minimum": 0},
            "system_throughput": {"type": "number"},
            "queues": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "index": {"type": "integer"},
                        "name": {"type": "string"},
                        "load": {"type": "number"},
                        "visit_ratio": {"type": "number"},
                        "utilization": {"type": "number"},
                        "expected_length": {"type": "number"},
                        "throughput": {"type": "number"},
                        "response_time": {"type": "number"},
                        "tail": {"type": "array", "items": {"type": "number"}},
                        "distribution": {"type": "array", "items": {"type": "number"}}
                    },
                    "required": [
                        "index",
                        "name",
                        "load",
                        "visit_ratio",
                        "utilization",
                        "expected_length",
                        "throughput",
                        "response_time",
                        "tail",
                        "distribution"
                    ]
                }
            }
        },
        "required": ["population", "system_throughput", "queues"]
    })
}
