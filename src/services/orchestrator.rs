use image::ImageFormat;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::detection::IdentificationResult;
use crate::services::inference::{InferenceClient, InferenceError};
use crate::services::normalizer::{self, MalformedResultError};
use crate::services::poller::{self, PollError, PollPolicy};
use crate::services::storage::{ObjectStore, StorageError};

/// A validated photo ready to be stored.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageUpload {
    /// Sniff the format from the bytes; `None` when they are not a supported image.
    pub fn detect(bytes: Vec<u8>) -> Option<Self> {
        match image::guess_format(&bytes).ok()? {
            format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP) => {
                Some(Self { bytes, format })
            }
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }
}

/// Runs one identification: store, submit, poll, normalize.
pub struct Identifier {
    storage: Arc<dyn ObjectStore>,
    inference: Arc<dyn InferenceClient>,
    policy: PollPolicy,
}

impl Identifier {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        inference: Arc<dyn InferenceClient>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            storage,
            inference,
            policy,
        }
    }

    pub async fn identify(
        &self,
        upload: &ImageUpload,
        cancel: &CancellationToken,
    ) -> Result<IdentificationResult, IdentifyError> {
        let start = Instant::now();
        metrics::counter!("identification_jobs_total").increment(1);

        let outcome = self.run(upload, cancel).await;

        metrics::histogram!("identification_processing_seconds")
            .record(start.elapsed().as_secs_f64());

        match &outcome {
            Ok(result) => {
                metrics::counter!("identification_jobs_completed").increment(1);
                tracing::info!(
                    detections = result.info.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Identification complete"
                );
            }
            Err(e) => {
                metrics::counter!("identification_jobs_failed", "tag" => e.tag()).increment(1);
                tracing::error!(tag = e.tag(), error = %e, "Identification failed");
            }
        }

        outcome
    }

    async fn run(
        &self,
        upload: &ImageUpload,
        cancel: &CancellationToken,
    ) -> Result<IdentificationResult, IdentifyError> {
        let key = format!("uploads/{}.{}", Uuid::new_v4(), upload.extension());

        tracing::debug!(key = %key, bytes = upload.bytes.len(), "Storing upload");
        let image_url = self
            .storage
            .put(&key, &upload.bytes, upload.content_type())
            .await?;

        let handle = self
            .inference
            .submit(&image_url)
            .await
            .map_err(IdentifyError::Submission)?;

        tracing::info!(
            job_id = %handle.id,
            status = %handle.status,
            image_url = %image_url,
            "Submitted identification job"
        );

        let completed =
            poller::poll_until_terminal(self.inference.as_ref(), &handle.id, &self.policy, cancel)
                .await?;

        metrics::histogram!("identification_poll_attempts").record(completed.attempts as f64);

        normalizer::normalize(&completed.output).map_err(|source| IdentifyError::MalformedResult {
            job_id: completed.job_id,
            source,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentifyError {
    #[error("failed to store image: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to submit identification job: {0}")]
    Submission(#[source] InferenceError),

    #[error("status query for job {job_id} failed after {attempts} attempts: {source}")]
    PollTransport {
        job_id: String,
        attempts: u32,
        #[source]
        source: InferenceError,
    },

    #[error("identification job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("identification job {job_id} returned a malformed result: {source}")]
    MalformedResult {
        job_id: String,
        #[source]
        source: MalformedResultError,
    },

    #[error("identification job {job_id} unfinished after {attempts} status checks ({elapsed:?})")]
    PollTimeout {
        job_id: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("identification of job {job_id} was cancelled")]
    Cancelled { job_id: String },
}

impl IdentifyError {
    /// Machine-checkable tag exposed to clients.
    pub fn tag(&self) -> &'static str {
        match self {
            IdentifyError::Storage(_) => "storage_error",
            IdentifyError::Submission(_) => "submission_error",
            IdentifyError::PollTransport { .. } => "poll_transport_error",
            IdentifyError::JobFailed { .. } => "job_failed",
            IdentifyError::MalformedResult { .. } => "malformed_result",
            IdentifyError::PollTimeout { .. } => "poll_timeout",
            IdentifyError::Cancelled { .. } => "cancelled",
        }
    }
}

impl From<PollError> for IdentifyError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Transport {
                job_id,
                attempts,
                source,
            } => IdentifyError::PollTransport {
                job_id,
                attempts,
                source,
            },
            PollError::JobFailed { job_id, reason } => IdentifyError::JobFailed { job_id, reason },
            PollError::Timeout {
                job_id,
                attempts,
                elapsed,
            } => IdentifyError::PollTimeout {
                job_id,
                attempts,
                elapsed,
            },
            PollError::Cancelled { job_id } => IdentifyError::Cancelled { job_id },
        }
    }
}
