use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub inference: ComponentHealth,
    pub checklist: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<usize>,
}

impl ComponentHealth {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            latency_ms: None,
            species: None,
        }
    }

    fn error() -> Self {
        Self {
            status: "error".to_string(),
            latency_ms: None,
            species: None,
        }
    }
}

/// GET /health — health check with dependency status.
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();

    // Check the inference service
    let inference_check = match state.inference.health().await {
        Ok(_) => ComponentHealth {
            latency_ms: Some(start.elapsed().as_millis() as u64),
            ..ComponentHealth::ok()
        },
        Err(e) => {
            tracing::warn!(error = %e, "Inference service health check failed");
            ComponentHealth::error()
        }
    };

    let checklist_check = if state.checklist.is_empty() {
        ComponentHealth::error()
    } else {
        ComponentHealth {
            species: Some(state.checklist.len()),
            ..ComponentHealth::ok()
        }
    };

    let all_healthy = inference_check.status == "ok" && checklist_check.status == "ok";
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            inference: inference_check,
            checklist: checklist_check,
        },
    };

    (status_code, Json(response))
}
