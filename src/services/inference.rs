use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::models::job::{JobHandle, JobSnapshot};

/// Longest slice of an error body kept for diagnostics.
const MAX_ERROR_BODY: usize = 512;

/// Remote inference job queue.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Submit a publicly resolvable image URL for identification.
    async fn submit(&self, image_url: &str) -> Result<JobHandle, InferenceError>;

    /// Read the current state of a job. Never mutates the job.
    async fn job_status(&self, job_id: &str) -> Result<JobSnapshot, InferenceError>;

    /// Check that the service is reachable.
    async fn health(&self) -> Result<(), InferenceError>;
}

/// HTTP client for a serverless inference endpoint speaking the
/// `POST /jobs` + `GET /jobs/{id}` protocol.
pub struct HttpInferenceClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpInferenceClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, InferenceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(InferenceError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn submit(&self, image_url: &str) -> Result<JobHandle, InferenceError> {
        let request_body = serde_json::json!({
            "input": { "url": image_url }
        });

        let response = self
            .http
            .post(self.endpoint("jobs"))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(InferenceError::Http)?;

        decode(response).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobSnapshot, InferenceError> {
        let response = self
            .http
            .get(self.endpoint(&format!("jobs/{job_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(InferenceError::Http)?;

        decode(response).await
    }

    async fn health(&self) -> Result<(), InferenceError> {
        let response = self
            .http
            .get(self.endpoint("health"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(InferenceError::Http)?;

        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: Response) -> Result<Response, InferenceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(InferenceError::Status {
        code: status.as_u16(),
        body,
    })
}

/// Bind the response body into `T`; the body is never trusted as pre-typed.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, InferenceError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await.map_err(InferenceError::Http)?;
    serde_json::from_slice(&bytes).map_err(InferenceError::Decode)
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Inference service returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Failed to decode inference service response: {0}")]
    Decode(#[from] serde_json::Error),
}
