use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;

/// GET /api/ping — liveness probe.
pub async fn ping() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain")], "pong")
}
