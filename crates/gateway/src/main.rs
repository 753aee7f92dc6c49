//! Binary entrypoint: parse configuration, build every subsystem in dependency order, then
//! serve until `ctrl_c`.

mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gateway_core::GatewayConfig;
use gateway_core::auth::AuthEngine;
use gateway_core::cache::{CacheManager, CacheManagerConfig};
use gateway_core::certs::FileCertificateProvider;
use gateway_core::freemium::{AlwaysFree, FreemiumLimiter};
use gateway_core::metrics::Metrics;
use gateway_core::registry::Registry;
use gateway_core::secrets::{ClusteredSecretProvider, UnconfiguredClusterBackend};
use gateway_core::transform::TransformEngine;

use crate::state::Components;

const FREEMIUM_FREE_LIMIT: u32 = 100;
const FREEMIUM_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
const FREEMIUM_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const SECRET_CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// CLI overrides for [`GatewayConfig`]; any flag left unset falls through to its env var,
/// then to the built-in default.
#[derive(Parser, Debug)]
#[command(name = "gateway", about = "Declarative integration gateway")]
struct Cli {
    #[arg(long)]
    config_dir: Option<std::path::PathBuf>,
    #[arg(long)]
    certs_dir: Option<std::path::PathBuf>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    environment: Option<String>,
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, mut config: GatewayConfig) -> GatewayConfig {
        if let Some(config_dir) = self.config_dir {
            config.config_dir = config_dir;
        }
        if let Some(certs_dir) = self.certs_dir {
            config.certs_dir = certs_dir;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(environment) = self.environment {
            config.environment = environment;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().apply(GatewayConfig::from_env());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    let registry = Arc::new(Registry::new(config.config_dir.clone()));
    registry.load_all()?;
    tracing::info!(connectors = registry.count(), config_dir = %config.config_dir.display(), "loaded connector registry");

    let secrets = Arc::new(ClusteredSecretProvider::new(Box::new(UnconfiguredClusterBackend)));
    let certificates = Arc::new(FileCertificateProvider::new(&config.certs_dir));
    let auth_engine = Arc::new(AuthEngine::new(secrets.clone(), certificates));
    let transformer = Arc::new(TransformEngine::default());
    let metrics = Arc::new(Metrics::default());
    let cache = Arc::new(CacheManager::new(&CacheManagerConfig::default(), None, None).with_metrics(metrics.clone()));
    let freemium = Arc::new(FreemiumLimiter::new(FREEMIUM_FREE_LIMIT, FREEMIUM_WINDOW, Box::new(AlwaysFree)));

    let components = Components {
        registry,
        auth_engine,
        transformer,
        cache,
        freemium: freemium.clone(),
        metrics,
        environment: config.environment.clone(),
    };
    let state = components.into_state();

    let sweeper = freemium;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FREEMIUM_SWEEP_INTERVAL);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            sweeper.sweep_expired();
        }
    });

    let secret_sweeper = secrets;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SECRET_CACHE_SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            secret_sweeper.sweep_expired();
        }
    });

    let app = routes::router(state).into_make_service_with_connect_info::<SocketAddr>();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to install ctrl_c handler");
    }
    tracing::info!("shutdown signal received");
}
