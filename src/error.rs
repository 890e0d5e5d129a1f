use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::upload::ErrorEnvelope;
use crate::services::orchestrator::IdentifyError;

const TRY_AGAIN: &str = "We couldn't identify your photo right now. Please try again later.";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No image was supplied")]
    MissingFile,

    #[error("Malformed multipart body: {0}")]
    MalformedUpload(String),

    #[error("Uploaded file is not a supported image")]
    UnsupportedMedia,

    #[error("Uploaded file exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error(transparent)]
    Identify(#[from] IdentifyError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFile | ApiError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Identify(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn envelope(&self) -> ErrorEnvelope {
        match self {
            ApiError::MissingFile => ErrorEnvelope::new("missing_file", self.to_string(), None),
            ApiError::MalformedUpload(_) => {
                ErrorEnvelope::new("malformed_upload", "The upload could not be read.", None)
            }
            ApiError::UnsupportedMedia => ErrorEnvelope::new(
                "unsupported_media_type",
                "Please upload a PNG, JPEG or WebP photo.",
                None,
            ),
            ApiError::PayloadTooLarge { limit } => ErrorEnvelope::new(
                "payload_too_large",
                format!("Please upload a photo no larger than {} MB.", limit / (1024 * 1024)),
                None,
            ),
            ApiError::Identify(IdentifyError::JobFailed { reason, .. }) => {
                ErrorEnvelope::new("job_failed", TRY_AGAIN, Some(reason.clone()))
            }
            ApiError::Identify(e) => ErrorEnvelope::new(e.tag(), TRY_AGAIN, None),
            ApiError::Internal(_) => ErrorEnvelope::new("internal_error", TRY_AGAIN, None),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            // Already logged with its tag by the identifier
            ApiError::Identify(_) => tracing::debug!(error = %self, "Identification request failed"),
            _ if status.is_server_error() => tracing::error!(error = %self, "Request failed"),
            _ => tracing::debug!(error = %self, "Request rejected"),
        }

        (status, Json(self.envelope())).into_response()
    }
}
