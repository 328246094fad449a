//! ---
//! qnet_section: "08-queueing-models"
//! qnet_subsection: "module"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Normalization constants and performance metrics for closed queueing networks."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CalcEngineError>;

#[derive(Debug, Error)]
pub enum CalcEngineError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("numerical error: {0}")]
    Numerical(#[from] NumericalError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerializationFailed(#[from] serde_json::Error),
    #[error("yaml serialization error: {0}")]
    YamlSerializationFailed(#[from] serde_yaml::Error),
}

impl CalcEngineError {
    pub fn is_domain(&self) -> bool {
        matches!(self, CalcEngineError::Domain(_))
    }

    pub fn is_numerical(&self) -> bool {
        matches!(self, CalcEngineError::Numerical(_))
    }
}

/// Invalid network parameters, rejected before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("population must be non-negative, got {0}")]
    NegativePopulation(i64),
    #[error("network has no queues but population is {population}")]
    EmptyNetwork { population: usize },
    #[error("load of queue {index} must be non-negative, got {value}")]
    NegativeLoad { index: usize, value: f64 },
    #[error("load of queue {index} must be finite, got {value}")]
    NonFiniteLoad { index: usize, value: f64 },
    #[error("visit ratio of queue {index} must be non-negative and finite, got {value}")]
    InvalidVisitRatio { index: usize, value: f64 },
    #[error("service rate of queue must be positive and finite, got {0}")]
    InvalidServiceRate(f64),
    #[error("rescale threshold must be finite and greater than 1, got {0}")]
    InvalidRescaleThreshold(f64),
    #[error("queried load must be non-negative and finite, got {0}")]
    InvalidQueryLoad(f64),
    #[error("malformed normalization table: {0}")]
    InvalidTable(&'static str),
}

/// Degenerate results detected while deriving metrics from a table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericalError {
    #[error("normalization constant G({population}) is zero")]
    ZeroDenominator { population: usize },
    #[error("normalization constant G({population}) is not finite ({value})")]
    NonFiniteDenominator { population: usize, value: f64 },
    #[error(
        "rescaling after queue {queue} left g[{index}] below the normal f64 range; \
         use the log-domain strategy"
    )]
    ScaleUnderflow { queue: usize, index: usize },
}
