/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: observability.rs
 *
 * Ambient logging/metrics/health wiring. Tracing init follows the teacher's
 * `tracing-subscriber` choice; the axum health router is grounded on
 * `examples/bedecarroll-unet/crates/unet-server/src/handlers/health.rs`, and
 * the Prometheus exporter setup on that repo's `metrics`/
 * `metrics-exporter-prometheus` dependency pair.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error::Error;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the global tracing subscriber, honoring `RUST_LOG` with a
/// fallback of "info" so the operator is quiet by default in production.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Installs the Prometheus recorder and returns its handle for rendering.
pub fn install_metrics_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder")
}

#[derive(Clone)]
struct HealthState {
    metrics: PrometheusHandle,
}

/// Serves `/healthz` and `/readyz` on `health_bind_address` and `/metrics`
/// on `metrics_bind_address` (kept on separate ports, matching the CLI
/// surface) until either listener fails or the process is asked to shut
/// down. Liveness is unconditional; readiness is a placeholder hook for a
/// future leader-election/cache-sync gate (none of this operator's
/// reconcilers currently have a meaningful "not ready" state beyond having
/// started).
pub async fn serve(health_bind_address: &str, metrics_bind_address: &str, metrics: PrometheusHandle) -> Result<(), Error> {
    let health_app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http());
    let metrics_app = Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(HealthState { metrics });

    let health_listener = bind(health_bind_address).await?;
    let metrics_listener = bind(metrics_bind_address).await?;

    tokio::try_join!(
        serve_on(health_listener, health_app, health_bind_address),
        serve_on(metrics_listener, metrics_app, metrics_bind_address),
    )?;
    Ok(())
}

async fn bind(bind_address: &str) -> Result<tokio::net::TcpListener, Error> {
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|_| Error::Config(format!("invalid bind address '{bind_address}'")))?;
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| Error::Bind(bind_address.to_string(), err))
}

async fn serve_on(listener: tokio::net::TcpListener, app: Router, bind_address: &str) -> Result<(), Error> {
    axum::serve(listener, app)
        .await
        .map_err(|err| Error::Bind(bind_address.to_string(), err))
}

async fn healthz() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

async fn readyz() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}

async fn metrics_handler(State(state): State<HealthState>) -> String {
    state.metrics.render()
}
