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

use crate::errors::DomainError;

fn default_visit_ratio() -> f64 {
    1.0
}

/// One service center of a closed network, identified only by its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    #[serde(default)]
    pub name: Option<String>,
    /// Relative load `X_i`: visit frequency over service rate.
    pub load: f64,
    #[serde(default = "default_visit_ratio")]
    pub visit_ratio: f64,
}

impl Queue {
    pub fn new(load: f64) -> Self {
        Self {
            name: None,
            load,
            visit_ratio: default_visit_ratio(),
        }
    }

    /// Derives the relative load `e / mu` from a visit ratio and a service rate.
    pub fn from_rates(visit_ratio: f64, service_rate: f64) -> Result<Self, DomainError> {
        if !(service_rate.is_finite() && service_rate > 0.0) {
            return Err(DomainError::InvalidServiceRate(service_rate));
        }
        if !(visit_ratio.is_finite() && visit_ratio >= 0.0) {
            return Err(DomainError::InvalidVisitRatio {
                index: 0,
                value: visit_ratio,
            });
        }
        Ok(Self {
            name: None,
            load: visit_ratio / service_rate,
            visit_ratio,
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_visit_ratio(mut self, visit_ratio: f64) -> Self {
        self.visit_ratio = visit_ratio;
        self
    }

    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("queue-{}", index + 1))
    }
}

/// Queues plus a fixed job population. Constructed only through validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NetworkDocument", into = "NetworkDocument")]
pub struct Network {
    version: Option<String>,
    queues: Vec<Queue>,
    population: usize,
}

/// Unvalidated wire form of a [`Network`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDocument {
    #[serde(default)]
    pub version: Option<String>,
    pub queues: Vec<Queue>,
    pub population: i64,
}

impl Network {
    pub fn new(queues: Vec<Queue>, population: i64) -> Result<Self, DomainError> {
        if population < 0 {
            return Err(DomainError::NegativePopulation(population));
        }
        let population = population as usize;
        validate_loads(queues.iter().map(|q| q.load), population)?;
        for (index, queue) in queues.iter().enumerate() {
            if !(queue.visit_ratio.is_finite() && queue.visit_ratio >= 0.0) {
                return Err(DomainError::InvalidVisitRatio {
                    index,
                    value: queue.visit_ratio,
                });
            }
        }
        Ok(Self {
            version: None,
            queues,
            population,
        })
    }

    /// Builds a network from bare loads, every visit ratio set to one.
    pub fn from_loads(loads: &[f64], population: i64) -> Result<Self, DomainError> {
        Self::new(loads.iter().copied().map(Queue::new).collect(), population)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn queues(&self) -> &[Queue] {
        &self.queues
    }

    pub fn population(&self) -> usize {
        self.population
    }

    pub fn loads(&self) -> Vec<f64> {
        self.queues.iter().map(|q| q.load).collect()
    }

    pub fn visit_ratios(&self) -> Vec<f64> {
        self.queues.iter().map(|q| q.visit_ratio).collect()
    }
}

impl TryFrom<NetworkDocument> for Network {
    type Error = DomainError;

    fn try_from(doc: NetworkDocument) -> Result<Self, Self::Error> {
        let network = Network::new(doc.queues, doc.population)?;
        Ok(Network {
            version: doc.version,
            ..network
        })
    }
}

impl From<Network> for NetworkDocument {
    fn from(network: Network) -> Self {
        NetworkDocument {
            version: network.version,
            queues: network.queues,
            population: network.population as i64,
        }
    }
}

/// Checks the load vector against a population before any recurrence step runs.
pub(crate) fn validate_loads(
    loads: impl IntoIterator<Item = f64>,
    population: usize,
) -> Result<(), DomainError> {
    let mut count = 0usize;
    for (index, value) in loads.into_iter().enumerate() {
        if value.is_nan() || value.is_infinite() {
            return Err(DomainError::NonFiniteLoad { index, value });
        }
        if value < 0.0 {
            return Err(DomainError::NegativeLoad { index, value });
        }
        count += 1;
    }
    if count == 0 && population > 0 {
        return Err(DomainError::EmptyNetwork { population });
    }
    Ok(())
}
