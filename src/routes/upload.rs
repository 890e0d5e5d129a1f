use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::upload::UploadResponse;
use crate::services::orchestrator::ImageUpload;

/// POST /api/upload — identify the birds in an uploaded photo.
///
/// The first file part of the multipart body is used.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let limit = state.max_upload_bytes;
    let mut image_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.file_name().is_none() {
            continue;
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, limit))?;
        if data.len() > limit {
            return Err(ApiError::PayloadTooLarge { limit });
        }
        if !data.is_empty() {
            image_data = Some(data.to_vec());
            break;
        }
    }

    let image_data = image_data.ok_or(ApiError::MissingFile)?;
    let upload = ImageUpload::detect(image_data).ok_or(ApiError::UnsupportedMedia)?;

    // Polling runs in its own task. Dropping this handler (client gone)
    // drops the guard and cancels the token the poll loop watches.
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let identifier = state.identifier.clone();
    let task = tokio::spawn(async move { identifier.identify(&upload, &cancel).await });

    let result = task
        .await
        .map_err(|e| ApiError::Internal(format!("identification task aborted: {e}")))??;

    Ok(Json(result.into()))
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::MalformedUpload(err.to_string())
    }
}
