pub mod health;
pub mod metrics;
pub mod ping;
pub mod species;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::services::rate_limit::{
    self, RateLimitState, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
};

/// HTTP-layer settings that do not belong to the handlers.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub frontend_url: Option<String>,
}

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_HEADROOM: usize = 64 * 1024;

/// Build the API router. `/metrics` is attached by the binary.
pub fn build_router(state: AppState, limits: RateLimitState, options: &RouterOptions) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    let body_limit = max_upload_bytes + MULTIPART_HEADROOM;

    let uploads = Router::new()
        .route("/api/upload", post(upload::upload_image))
        .route_layer(middleware::from_fn_with_state(limits, rate_limit::enforce_quota));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/ping", get(ping::ping))
        .route("/api/birds", get(species::list_species))
        .route("/api/birds/count", get(species::count_species))
        .route("/api/birds/{species}", get(species::verify_species))
        .merge(uploads)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer(options.frontend_url.as_deref()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(middleware::map_response(move |response: Response| {
            payload_too_large_envelope(response, max_upload_bytes)
        }))
}

/// Re-render the body limit's plain-text 413 as a JSON error envelope.
async fn payload_too_large_envelope(response: Response, limit: usize) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/json"));

    if response.status() == StatusCode::PAYLOAD_TOO_LARGE && !is_json {
        return ApiError::PayloadTooLarge { limit }.into_response();
    }
    response
}

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let origin = match frontend_url.and_then(|url| HeaderValue::from_str(url).ok()) {
        Some(origin) => AllowOrigin::exact(origin),
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .expose_headers([X_RATELIMIT_RESET, X_RATELIMIT_REMAINING, X_RATELIMIT_LIMIT])
}
