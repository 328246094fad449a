//! ---
//! qnet_section: "01-core-functionality"
//! qnet_subsection: "module"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Shared primitives and utilities for the qnet tools."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_rescale_threshold() -> f64 {
    1e100
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_reports_enabled() -> bool {
    true
}

fn default_reports_directory() -> PathBuf {
    PathBuf::from("reports")
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    256
}

fn default_api_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Primary configuration object for the qnet tools.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub reports: ReportConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "QNET_CONFIG";

    /// Load configuration from disk, respecting the `QNET_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// An explicit `QNET_CONFIG` path must exist; otherwise the first existing
    /// candidate wins, and defaults apply when none exists.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        let inspected = candidates
            .iter()
            .map(|p| p.as_ref().display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        debug!(%inspected, "no configuration file found, using defaults");
        Ok(LoadedAppConfig {
            config: AppConfig::default(),
            source: None,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.solver.validate()?;
        self.reports.validate()?;
        self.cache.validate()?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialise configuration")
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Numerical strategy used when folding loads into the normalization table.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SolverStrategy {
    #[default]
    Direct,
    Rescale,
    LogDomain,
}

impl std::str::FromStr for SolverStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(SolverStrategy::Direct),
            "rescale" => Ok(SolverStrategy::Rescale),
            "log-domain" | "log" => Ok(SolverStrategy::LogDomain),
            other => Err(format!("unknown solver strategy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub strategy: SolverStrategy,
    #[serde(default = "default_rescale_threshold")]
    pub rescale_threshold: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            strategy: SolverStrategy::default(),
            rescale_threshold: default_rescale_threshold(),
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.rescale_threshold.is_finite() && self.rescale_threshold > 1.0) {
            return Err(anyhow!(
                "solver.rescale_threshold must be finite and greater than 1, got {}",
                self.rescale_threshold
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Rolling log files are written here when set.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            directory: None,
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_reports_enabled")]
    pub enabled: bool,
    #[serde(default = "default_reports_directory")]
    pub directory: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: default_reports_enabled(),
            directory: default_reports_directory(),
        }
    }
}

impl ReportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.directory.as_os_str().is_empty() {
            return Err(anyhow!("reports.directory must be set when reports are enabled"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Tables retained before the least recently used one is evicted.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            capacity: default_cache_capacity(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.capacity == 0 {
            return Err(anyhow!("cache.capacity must be at least 1 when the cache is enabled"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_api_listen(),
        }
    }
}
