//! ---
//! qnet_section: "08-queueing-models"
//! qnet_subsection: "module"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Normalization constants and performance metrics for closed queueing networks."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
//! Convolution recurrence producing the normalization constants `G(0..=N)`.
//!
//! The table is folded one queue at a time over a single working array,
//! `g[n] += x * g[n - 1]` for increasing `n`. Reading `g[n - 1]` after it has
//! already absorbed the current queue realises `g(n, m) = g(n, m - 1) + X_m g(n - 1, m)`.
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    errors::{DomainError, NumericalError, Result},
    model::{validate_loads, Network},
};

/// Default magnitude above which [`ScalingPolicy::Rescale`] renormalises the table.
pub const DEFAULT_RESCALE_THRESHOLD: f64 = 1e100;

/// How intermediate constants are kept inside floating-point range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum ScalingPolicy {
    /// Plain accumulation; may overflow for large populations or loads.
    #[default]
    Direct,
    /// Divide the table by `g[N]` after any queue pass that pushes it past `threshold`.
    Rescale { threshold: f64 },
    /// Store `ln g[n]` and combine terms with log-sum-exp.
    LogDomain,
}

impl ScalingPolicy {
    pub fn rescale() -> Self {
        ScalingPolicy::Rescale {
            threshold: DEFAULT_RESCALE_THRESHOLD,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), DomainError> {
        match *self {
            ScalingPolicy::Rescale { threshold } if !(threshold.is_finite() && threshold > 1.0) => {
                Err(DomainError::InvalidRescaleThreshold(threshold))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ScalingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalingPolicy::Direct => write!(f, "direct"),
            ScalingPolicy::Rescale { threshold } => write!(f, "rescale(threshold={threshold:e})"),
            ScalingPolicy::LogDomain => write!(f, "log-domain"),
        }
    }
}

/// Final column of the convolution, `g[0..=N]`, in the representation of its policy.
///
/// * `Direct`: `stored[n] == g[n]`.
/// * `Rescale`: `stored[n] * exp(log_scale) == g[n]`.
/// * `LogDomain`: `stored[n] == ln g[n]`.
///
/// Rescaled tables keep every entry in the normal `f64` range; a fold that would
/// push an entry below it fails with [`NumericalError::ScaleUnderflow`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableDocument")]
pub struct NormalizationTable {
    policy: ScalingPolicy,
    stored: Vec<f64>,
    log_scale: f64,
}

/// Unchecked wire form of a [`NormalizationTable`].
#[derive(Debug, Clone, Deserialize)]
pub struct TableDocument {
    #[serde(default)]
    pub policy: ScalingPolicy,
    pub stored: Vec<f64>,
    #[serde(default)]
    pub log_scale: f64,
}

impl TryFrom<TableDocument> for NormalizationTable {
    type Error = DomainError;

    fn try_from(doc: TableDocument) -> std::result::Result<Self, Self::Error> {
        doc.policy.validate()?;
        let first = *doc
            .stored
            .first()
            .ok_or(DomainError::InvalidTable("no entries"))?;
        if doc.stored.iter().any(|v| v.is_nan()) {
            return Err(DomainError::InvalidTable("NaN entry"));
        }
        if !doc.log_scale.is_finite() {
            return Err(DomainError::InvalidTable("log_scale must be finite"));
        }

        match doc.policy {
            ScalingPolicy::Direct => {
                if first != 1.0 || doc.log_scale != 0.0 {
                    return Err(DomainError::InvalidTable("direct table must start at g[0] = 1"));
                }
                if doc.stored.iter().any(|v| *v < 0.0) {
                    return Err(DomainError::InvalidTable("negative entry"));
                }
            }
            ScalingPolicy::Rescale { .. } => {
                if doc
                    .stored
                    .iter()
                    .any(|v| !(v.is_finite() && *v >= f64::MIN_POSITIVE))
                {
                    return Err(DomainError::InvalidTable(
                        "rescaled entries must be positive, normal and finite",
                    ));
                }
                let drift = (first.ln() + doc.log_scale).abs();
                if doc.log_scale < 0.0 || drift > 1e-9 * doc.log_scale.max(1.0) {
                    return Err(DomainError::InvalidTable(
                        "g[0] and log_scale disagree on the scale factor",
                    ));
                }
            }
            ScalingPolicy::LogDomain => {
                if first != 0.0 || doc.log_scale != 0.0 {
                    return Err(DomainError::InvalidTable("log-domain table must start at ln g[0] = 0"));
                }
                if doc.stored.iter().any(|v| *v == f64::INFINITY) {
                    return Err(DomainError::InvalidTable("infinite log entry"));
                }
            }
        }

        Ok(NormalizationTable {
            policy: doc.policy,
            stored: doc.stored,
            log_scale: doc.log_scale,
        })
    }
}

impl NormalizationTable {
    pub fn population(&self) -> usize {
        self.stored.len() - 1
    }

    pub fn policy(&self) -> ScalingPolicy {
        self.policy
    }

    /// Cumulative natural-log factor divided out by rescaling; zero otherwise.
    pub fn log_scale(&self) -> f64 {
        self.log_scale
    }

    /// Raw entries in the policy's representation.
    pub fn stored(&self) -> &[f64] {
        &self.stored
    }

    /// Unscaled `g[n]`. May be infinite when the true value exceeds `f64`.
    pub fn g(&self, n: usize) -> f64 {
        if n == 0 {
            return 1.0;
        }
        let value = self.stored[n];
        match self.policy {
            ScalingPolicy::Direct => value,
            ScalingPolicy::Rescale { .. } if value == 0.0 => 0.0,
            ScalingPolicy::Rescale { .. } => value * self.log_scale.exp(),
            ScalingPolicy::LogDomain => value.exp(),
        }
    }

    /// `ln g[n]`; `-inf` for structurally zero entries.
    pub fn ln_g(&self, n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let value = self.stored[n];
        match self.policy {
            ScalingPolicy::LogDomain => value,
            _ => value.ln() + self.log_scale,
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        (0..self.stored.len()).map(|n| self.g(n)).collect()
    }

    /// Fails when `g[N]` cannot serve as a denominator.
    pub(crate) fn check_denominator(&self) -> std::result::Result<(), NumericalError> {
        let population = self.population();
        let last = self.stored[population];
        match self.policy {
            ScalingPolicy::LogDomain => {
                if last == f64::NEG_INFINITY {
                    Err(NumericalError::ZeroDenominator { population })
                } else if !last.is_finite() {
                    Err(NumericalError::NonFiniteDenominator {
                        population,
                        value: last.exp(),
                    })
                } else {
                    Ok(())
                }
            }
            _ => {
                if last == 0.0 {
                    Err(NumericalError::ZeroDenominator { population })
                } else if !last.is_finite() {
                    Err(NumericalError::NonFiniteDenominator {
                        population,
                        value: last,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    /// `x^k * g[N-k] / g[N]` for `k <= N`. The denominator must already be checked.
    pub(crate) fn weighted_ratio(&self, x: f64, k: usize) -> f64 {
        let population = self.population();
        debug_assert!(k <= population);
        if k == 0 {
            return 1.0;
        }
        if x == 0.0 {
            return 0.0;
        }
        if !matches!(self.policy, ScalingPolicy::LogDomain) {
            let direct =
                x.powi(k as i32) * self.stored[population - k] / self.stored[population];
            if direct.is_finite() {
                return direct;
            }
        }
        (k as f64 * x.ln() + self.ln_g(population - k) - self.ln_g(population)).exp()
    }

    /// `sum_{k=1..=N} x^k g[N-k] / g[N]`, divided once at the end.
    pub(crate) fn weighted_tail_sum(&self, x: f64) -> f64 {
        let population = self.population();
        if population == 0 || x == 0.0 {
            return 0.0;
        }
        if !matches!(self.policy, ScalingPolicy::LogDomain) {
            let mut power = 1.0;
            let mut acc = 0.0;
            for k in 1..=population {
                power *= x;
                acc += power * self.stored[population - k];
            }
            let direct = acc / self.stored[population];
            if direct.is_finite() {
                return direct;
            }
        }
        let ln_x = x.ln();
        let lse = (1..=population)
            .map(|k| k as f64 * ln_x + self.ln_g(population - k))
            .fold(f64::NEG_INFINITY, log_add_exp);
        (lse - self.ln_g(population)).exp()
    }
}

/// `ln(e^a + e^b)` without leaving floating-point range.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Returns `G(0..=N)` for the given loads using plain accumulation.
pub fn compute_normalization(loads: &[f64], population: usize) -> Result<Vec<f64>> {
    Ok(compute_table(loads, population, ScalingPolicy::Direct)?.to_vec())
}

pub fn compute_network(network: &Network, policy: ScalingPolicy) -> Result<NormalizationTable> {
    compute_table(&network.loads(), network.population(), policy)
}

/// Folds every load into a fresh table under the requested policy.
pub fn compute_table(
    loads: &[f64],
    population: usize,
    policy: ScalingPolicy,
) -> Result<NormalizationTable> {
    validate_loads(loads.iter().copied(), population)?;
    policy.validate()?;

    let table = match policy {
        ScalingPolicy::Direct => fold_linear(loads, population, None)?,
        ScalingPolicy::Rescale { threshold } => fold_linear(loads, population, Some(threshold))?,
        ScalingPolicy::LogDomain => fold_log(loads, population),
    };

    info!(
        queues = loads.len(),
        population,
        policy = %policy,
        ln_g = table.ln_g(population),
        "normalization table computed"
    );
    Ok(table)
}

fn fold_linear(
    loads: &[f64],
    population: usize,
    threshold: Option<f64>,
) -> std::result::Result<NormalizationTable, NumericalError> {
    let mut g = vec![0.0f64; population + 1];
    g[0] = 1.0;
    let mut log_scale = 0.0;

    for (queue, &x) in loads.iter().enumerate() {
        for n in 1..=population {
            g[n] += x * g[n - 1];
        }
        if let Some(threshold) = threshold {
            let last = g[population];
            if last > threshold && last.is_finite() {
                for value in g.iter_mut() {
                    *value /= last;
                }
                log_scale += last.ln();
                debug!(queue, factor = last, log_scale, "rescaled normalization table");
            }
            // Once g[N] > 0 every entry is positive; a subnormal or zero one has lost
            // terms that later queues would scale back up.
            if g[population] > 0.0 {
                if let Some(index) = g.iter().position(|v| *v < f64::MIN_POSITIVE) {
                    warn!(queue, index, log_scale, "rescaled normalization table underflowed");
                    return Err(NumericalError::ScaleUnderflow { queue, index });
                }
            }
        }
    }

    Ok(NormalizationTable {
        policy: match threshold {
            Some(threshold) => ScalingPolicy::Rescale { threshold },
            None => ScalingPolicy::Direct,
        },
        stored: g,
        log_scale,
    })
}

fn fold_log(loads: &[f64], population: usize) -> NormalizationTable {
    let mut lg = vec![f64::NEG_INFINITY; population + 1];
    lg[0] = 0.0;

    for &x in loads {
        if x == 0.0 {
            continue;
        }
        let ln_x = x.ln();
        for n in 1..=population {
            lg[n] = log_add_exp(lg[n], ln_x + lg[n - 1]);
        }
    }

    NormalizationTable {
        policy: ScalingPolicy::LogDomain,
        stored: lg,
        log_scale: 0.0,
    }
}
