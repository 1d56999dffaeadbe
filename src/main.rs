// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use appgw_ingress::{
    config::{ControllerArgs, LogFormat, OutputTarget},
    constants::{METRICS_SERVER_PATH, TOKIO_WORKER_THREADS},
    controller::{self, FileApplier, LogApplier},
    metrics,
};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use clap::Parser;
use kube::Client;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let config = ControllerArgs::parse().into_config()?;

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("appgw-ingress")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: appgw_ingress::config::ControllerConfig) -> Result<()> {
    // Respects RUST_LOG if set, otherwise defaults to INFO level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!(
        ingress_class = %config.ingress_class,
        "Starting Application Gateway ingress controller"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_server = tokio::spawn(serve_metrics(
        config.metrics_address,
        shutdown_rx.clone(),
    ));

    let controller = async {
        match config.output.clone() {
            OutputTarget::Log => controller::run(client, config, LogApplier::new(), shutdown_rx).await,
            OutputTarget::File { path, format } => {
                info!(path = %path.display(), "Writing gateway configuration to file");
                controller::run(client, config, FileApplier::new(path, format), shutdown_rx).await
            }
        }
    };
    tokio::pin!(controller);

    let result = tokio::select! {
        result = &mut controller => {
            error!("Controller exited unexpectedly: {:?}", result);
            result
        }
        signal = shutdown_signal() => {
            signal?;
            info!("Shutdown signal received, stopping controller");
            let _ = shutdown_tx.send(true);
            controller.await
        }
    };

    let _ = shutdown_tx.send(true);
    match metrics_server.await {
        Ok(Err(e)) => error!("Metrics server failed: {e:?}"),
        Err(e) => error!("Metrics server task panicked: {e}"),
        Ok(Ok(())) => debug!("Metrics server stopped"),
    }

    result
}

/// Resolve on SIGTERM or Ctrl+C.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl+C")?;
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C");
    }
    Ok(())
}

fn metrics_router() -> Router {
    Router::new().route(METRICS_SERVER_PATH, get(metrics_handler))
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to encode metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn serve_metrics(address: SocketAddr, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind metrics server to {address}"))?;
    info!(%address, path = METRICS_SERVER_PATH, "Metrics server listening");

    axum::serve(listener, metrics_router())
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("metrics server error")
}
