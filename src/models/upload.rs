use serde::{Deserialize, Serialize};

use crate::models::detection::{Detection, IdentificationResult};

/// Body of a successful `POST /api/upload`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub result: String,
    pub info: Vec<Detection>,
    pub url: String,
}

impl From<IdentificationResult> for UploadResponse {
    fn from(result: IdentificationResult) -> Self {
        Self {
            result: "ok".to_string(),
            info: result.info,
            url: result.url,
        }
    }
}

/// Uniform failure envelope returned by every API route.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub result: String,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Short machine-checkable tag, e.g. `job_failed`
    pub tag: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(tag: &str, message: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            result: "error".to_string(),
            error: ErrorDetail {
                tag: tag.to_string(),
                message: message.into(),
                reason,
            },
        }
    }
}
