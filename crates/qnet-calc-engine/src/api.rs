//! ---
//! qnet_section: "08-queueing-models"
//! qnet_subsection: "module"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Normalization constants and performance metrics for closed queueing networks."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::{
    errors::Result,
    metrics::{performance_report, PerformanceReport},
    model::Network,
    normalization::{compute_network, ScalingPolicy},
};

#[cfg(feature = "rest-api")]
pub use rest::{router, router_with_cache};

#[cfg(feature = "rest-api")]
mod rest {
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde::Deserialize;
    use std::sync::Arc;
    use tracing::warn;

    use crate::{
        cache::NormalizationCache,
        errors::CalcEngineError,
        metrics::performance_report,
        model::{Network, NetworkDocument},
        normalization::{compute_network, NormalizationTable, ScalingPolicy},
    };

    use super::{AnalysisRequest, NormalizationResponse};

    /// Request body before network validation, so invalid parameters surface as
    /// `400` rather than as an extractor rejection.
    #[derive(Debug, Deserialize)]
    struct RawAnalysisRequest {
        network: NetworkDocument,
        #[serde(default)]
        policy: ScalingPolicy,
    }

    impl RawAnalysisRequest {
        fn validate(self) -> Result<AnalysisRequest, CalcEngineError> {
            Ok(AnalysisRequest {
                network: Network::try_from(self.network)?,
                policy: self.policy,
            })
        }
    }

    #[derive(Debug, Default)]
    pub struct CalcEngineState {
        cache: Option<Arc<NormalizationCache>>,
    }

    impl CalcEngineState {
        fn table(
            &self,
            network: &Network,
            policy: ScalingPolicy,
        ) -> crate::errors::Result<Arc<NormalizationTable>> {
            match &self.cache {
                Some(cache) => cache.get_or_compute_network(network, policy),
                None => compute_network(network, policy).map(Arc::new),
            }
        }
    }

    /// Router backed by a cache of default capacity.
    pub fn router() -> Router {
        router_with_cache(Some(Arc::new(NormalizationCache::new())))
    }

    /// Router backed by `cache`, or computing every request afresh when `None`.
    pub fn router_with_cache(cache: Option<Arc<NormalizationCache>>) -> Router {
        Router::new()
            .route("/api/calc/normalization", post(normalization))
            .route("/api/calc/performance", post(performance))
            .with_state(Arc::new(CalcEngineState { cache }))
    }

    async fn normalization(
        State(state): State<Arc<CalcEngineState>>,
        Json(raw): Json<RawAnalysisRequest>,
    ) -> Result<Json<NormalizationResponse>, StatusCode> {
        let payload = raw.validate().map_err(map_err)?;
        state
            .table(&payload.network, payload.policy)
            .map(|table| Json(NormalizationResponse::from_table(&table)))
            .map_err(map_err)
    }

    async fn performance(
        State(state): State<Arc<CalcEngineState>>,
        Json(raw): Json<RawAnalysisRequest>,
    ) -> Result<Json<crate::metrics::PerformanceReport>, StatusCode> {
        let payload = raw.validate().map_err(map_err)?;
        let table = state
            .table(&payload.network, payload.policy)
            .map_err(map_err)?;
        performance_report(&table, &payload.network)
            .map(Json)
            .map_err(map_err)
    }

    fn map_err(err: CalcEngineError) -> StatusCode {
        warn!(error = %err, "calculation request rejected");
        match err {
            CalcEngineError::Domain(_) => StatusCode::BAD_REQUEST,
            CalcEngineError::Numerical(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub network: Network,
    #[serde(default)]
    pub policy: ScalingPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationResponse {
    pub policy: ScalingPolicy,
    pub population: usize,
    pub log_scale: f64,
    pub g: Vec<f64>,
}

impl NormalizationResponse {
    pub fn from_table(table: &crate::normalization::NormalizationTable) -> Self {
        Self {
            policy: table.policy(),
            population: table.population(),
            log_scale: table.log_scale(),
            g: table.to_vec(),
        }
    }
}

impl AnalysisRequest {
    pub fn normalization(&self) -> Result<NormalizationResponse> {
        let table = compute_network(&self.network, self.policy)?;
        Ok(NormalizationResponse::from_table(&table))
    }

    pub fn performance(&self) -> Result<PerformanceReport> {
        let table = compute_network(&self.network, self.policy)?;
        performance_report(&table, &self.network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_to_direct_policy() {
        let request: AnalysisRequest = serde_json::from_str(
            r#"{"network": {"population": 3, "queues": [{"load": 2.0}, {"load": 3.0}]}}"#,
        )
        .unwrap();
        assert_eq!(request.policy, ScalingPolicy::Direct);
        let response = request.normalization().unwrap();
        assert_eq!(response.g, vec![1.0, 5.0, 19.0, 65.0]);
        assert_eq!(response.population, 3);
    }

    #[test]
    fn performance_request_uses_requested_policy() {
        let request: AnalysisRequest = serde_json::from_str(
            r#"{"network": {"population": 2, "queues": [{"load": 1.0}, {"load": 1.0}]},
                "policy": {"strategy": "log-domain"}}"#,
        )
        .unwrap();
        let report = request.performance().unwrap();
        assert_eq!(report.queues.len(), 2);
        assert!((report.queues[0].expected_length - 1.0).abs() < 1e-12);
    }
}
