//! trendd — the iter8 trend exporter daemon.
//!
//! Single binary that assembles:
//! - Experiment store (in memory)
//! - Cluster watcher (kube dynamic API)
//! - Prometheus query client
//! - Scrape server (`iter8_trend` gauge)
//! - Health-check server
//!
//! # Usage
//!
//! ```text
//! trendd --prometheus-url http://prometheus.istio-system:9090 --k8s-freq 30
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use trend_query::PrometheusClient;
use trend_state::ExperimentStore;
use trend_watch::{KubeSource, Watcher};

use crate::config::{LogFormat, Overrides, TrendConfig};

const DEFAULT_LOG_FILTER: &str = "info,trendd=debug,trend=debug";

#[derive(Parser)]
#[command(name = "trendd", about = "Exports candidate metrics of completed iter8 experiments")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = TrendConfig::load(cli.config.as_deref(), cli.overrides)?;

    init_tracing(config.log_format);

    run(config).await
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

async fn run(config: TrendConfig) -> anyhow::Result<()> {
    info!(?config, "trend exporter starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Health check ───────────────────────────────────────────

    let health_addr = SocketAddr::from(([0, 0, 0, 0], config.healthcheck_port));
    let health_listener = TcpListener::bind(health_addr)
        .await
        .with_context(|| format!("binding health-check port {health_addr}"))?;
    info!(addr = %health_addr, "health-check server starting");
    let health_handle = tokio::spawn(serve(
        health_listener,
        trend_api::build_health_router(),
        shutdown_rx.clone(),
    ));

    // ── Watcher + initial load ─────────────────────────────────

    let store = ExperimentStore::new();
    let backend = PrometheusClient::new(&config.prometheus_url, config.query_timeout)?;
    info!(endpoint = %backend.endpoint(), "prometheus client initialized");

    let source = match KubeSource::connect(config.experiment.clone()).await {
        Ok(source) => source,
        Err(e) => {
            let _ = shutdown_tx.send(true);
            let _ = health_handle.await;
            return Err(e).context("connecting to the cluster");
        }
    };
    let watcher = Arc::new(Watcher::new(
        source,
        backend,
        store.clone(),
        config.watcher_config(),
    ));

    let loaded = tokio::select! {
        loaded = watcher.cold_start() => loaded.map(|_| true),
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received during initial load");
            Ok(false)
        }
    };
    match loaded {
        Ok(true) => {}
        Ok(false) => {
            let _ = shutdown_tx.send(true);
            let _ = health_handle.await;
            return Ok(());
        }
        Err(e) => {
            let _ = shutdown_tx.send(true);
            let _ = health_handle.await;
            return Err(e).context("initial experiment load failed");
        }
    }

    // ── Scrape server ──────────────────────────────────────────

    let scrape_addr = SocketAddr::from(([0, 0, 0, 0], config.scrape_port));
    let scrape_listener = match TcpListener::bind(scrape_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            let _ = shutdown_tx.send(true);
            let _ = health_handle.await;
            return Err(e).with_context(|| format!("binding scrape port {scrape_addr}"));
        }
    };
    info!(addr = %scrape_addr, "scrape server starting");
    let scrape_handle = tokio::spawn(serve(
        scrape_listener,
        trend_api::build_scrape_router(store),
        shutdown_rx.clone(),
    ));

    // ── Polling loop ───────────────────────────────────────────

    let watch_shutdown = shutdown_rx.clone();
    let mut watch_handle = tokio::spawn({
        let watcher = Arc::clone(&watcher);
        async move { watcher.run(watch_shutdown).await }
    });

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
            }
            let _ = shutdown_tx.send(true);
            match watch_handle.await {
                Ok(result) => result.map_err(anyhow::Error::from),
                Err(e) => Err(e.into()),
            }
        }
        joined = &mut watch_handle => {
            let _ = shutdown_tx.send(true);
            match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!(error = %e, "watcher gave up, shutting down");
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        }
    };

    for (name, handle) in [("health", health_handle), ("scrape", scrape_handle)] {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(server = name, error = %e, "server error"),
            Err(e) => error!(server = name, error = %e, "server task failed"),
        }
    }

    info!("trend exporter stopped");
    outcome
}

async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
}
