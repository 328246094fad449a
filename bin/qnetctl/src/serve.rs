//! ---
//! qnet_section: "05-external-interfaces"
//! qnet_subsection: "binary"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Control CLI for solving closed queueing networks."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::Args;
use qnet_calc_engine::cache::NormalizationCache;
use qnet_common::AppConfig;
use tokio::{net::TcpListener, runtime::Runtime};
use tracing::info;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address; defaults to `api.listen`.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,
}

pub fn run(args: ServeArgs, config: &AppConfig) -> Result<()> {
    let addr = args.listen.unwrap_or(config.api.listen);
    let cache = config
        .cache
        .enabled
        .then(|| Arc::new(NormalizationCache::with_capacity(config.cache.capacity)));
    let app = qnet_calc_engine::api::router_with_cache(cache);
    let runtime = Runtime::new()?;
    runtime.block_on(async move {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind API listener {addr}"))?;
        info!(address = %addr, cache = config.cache.enabled, "calculation api listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .context("api server exited with error")
    })
}
