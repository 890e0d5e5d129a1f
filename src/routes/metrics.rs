use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// GET /metrics — Prometheus text exposition of the identification metrics.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for every metric the service records.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "identification_jobs_total",
        "Total identification jobs started"
    );
    metrics::describe_counter!(
        "identification_jobs_completed",
        "Total identification jobs that produced a result"
    );
    metrics::describe_counter!(
        "identification_jobs_failed",
        "Total identification jobs that failed, by error tag"
    );
    metrics::describe_histogram!(
        "identification_processing_seconds",
        "Time from upload to normalized result"
    );
    metrics::describe_histogram!(
        "identification_poll_attempts",
        "Status reads needed before a job completed"
    );
    metrics::describe_counter!(
        "upload_rate_limited_total",
        "Uploads rejected by the rate limiter"
    );
}
