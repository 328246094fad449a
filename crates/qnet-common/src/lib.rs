//! ---
//! qnet_section: "01-core-functionality"
//! qnet_subsection: "module"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Shared primitives and utilities for the qnet tools."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
//! Shared primitives for the qnet workspace: configuration loading and
//! tracing initialisation consumed by the CLI and any embedding service.

pub mod config;
pub mod logging;

pub use config::{
    ApiConfig, AppConfig, CacheConfig, LoadedAppConfig, LoggingConfig, ReportConfig,
    SolverConfig, SolverStrategy,
};
pub use logging::{init_tracing, LogFormat};
