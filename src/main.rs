use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use whats_that_bird::app_state::AppState;
use whats_that_bird::config::AppConfig;
use whats_that_bird::routes;
use whats_that_bird::services::{
    checklist::SpeciesChecklist,
    inference::{HttpInferenceClient, InferenceClient},
    orchestrator::Identifier,
    rate_limit::{KeyedQuota, RateLimitState},
    storage::S3ObjectStore,
};
use whats_that_bird::{build_router, RouterOptions};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing whats-that-bird server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe_metrics();

    tracing::info!(bucket = %config.s3_bucket, "Initializing object storage client");
    let storage = S3ObjectStore::new(
        &config.s3_bucket,
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_access_key,
        &config.s3_secret_key,
        &config.public_base_url,
    )
    .expect("Failed to initialize object storage client");

    tracing::info!(base_url = %config.inference_base_url, "Initializing inference client");
    let inference: Arc<dyn InferenceClient> = Arc::new(
        HttpInferenceClient::new(
            &config.inference_base_url,
            &config.inference_api_key,
            config.inference_request_timeout(),
        )
        .expect("Failed to initialize inference client"),
    );

    tracing::info!(path = %config.checklist_path, "Loading species checklist");
    let checklist =
        SpeciesChecklist::from_path(&config.checklist_path).expect("Failed to load checklist");
    tracing::info!(species = checklist.len(), "Species checklist loaded");

    let rate_limit_max =
        NonZeroU32::new(config.rate_limit_max).expect("RATE_LIMIT_MAX must be greater than zero");
    let quota = KeyedQuota::new(rate_limit_max, config.rate_limit_window())
        .expect("Invalid rate limit configuration");
    let limits = RateLimitState {
        quota: Arc::new(quota),
        trust_forwarded_for: config.trust_forwarded_for,
    };

    let policy = config.poll_policy();
    tracing::info!(
        interval_ms = policy.interval.as_millis() as u64,
        max_attempts = policy.max_attempts.map(NonZeroU32::get),
        deadline_secs = policy.deadline.map(|d| d.as_secs()),
        "Poll policy configured"
    );

    let shutdown = CancellationToken::new();
    let identifier = Identifier::new(Arc::new(storage), inference.clone(), policy);
    let state = AppState::new(
        identifier,
        inference,
        checklist,
        shutdown.clone(),
        config.max_upload_bytes,
    );

    let options = RouterOptions {
        frontend_url: config.frontend_url.clone(),
    };

    let app = build_router(state, limits, &options).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await
    .expect("Server error");
}

/// Wait for Ctrl-C, then cancel every in-flight poll loop.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested, cancelling in-flight identifications");
    shutdown.cancel();
}
