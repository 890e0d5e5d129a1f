use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct SpeciesListResponse {
    pub result: &'static str,
    pub total: usize,
    pub birds: Vec<String>,
}

#[derive(Serialize)]
pub struct SpeciesCountResponse {
    pub result: &'static str,
    pub total: usize,
}

#[derive(Serialize)]
pub struct SpeciesCheckResponse {
    pub result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// GET /api/birds — every species on the checklist.
pub async fn list_species(State(state): State<AppState>) -> Json<SpeciesListResponse> {
    Json(SpeciesListResponse {
        result: "ok",
        total: state.checklist.len(),
        birds: state.checklist.species().to_vec(),
    })
}

/// GET /api/birds/count
pub async fn count_species(State(state): State<AppState>) -> Json<SpeciesCountResponse> {
    Json(SpeciesCountResponse {
        result: "ok",
        total: state.checklist.len(),
    })
}

/// GET /api/birds/{species} — is this species on the checklist?
pub async fn verify_species(
    State(state): State<AppState>,
    Path(species): Path<String>,
) -> (StatusCode, Json<SpeciesCheckResponse>) {
    if state.checklist.contains(&species) {
        return (
            StatusCode::OK,
            Json(SpeciesCheckResponse {
                result: "ok",
                reason: None,
                suggestion: None,
            }),
        );
    }

    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(SpeciesCheckResponse {
            result: "error",
            reason: Some(format!(
                "{species} is not on the California Bird Records Committee checklist."
            )),
            suggestion: state.checklist.closest(&species).map(str::to_string),
        }),
    )
}
