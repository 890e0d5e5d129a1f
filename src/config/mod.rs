use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::services::poller::PollPolicy;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Bucket that receives uploaded photos
    pub s3_bucket: String,

    /// S3-compatible endpoint URL
    pub s3_endpoint: String,

    /// Region name passed to the S3 client ("auto" for R2)
    #[serde(default = "default_s3_region")]
    pub s3_region: String,

    /// S3 access key ID
    pub s3_access_key: String,

    /// S3 secret access key
    pub s3_secret_key: String,

    /// Public base URL the stored objects resolve under (CDN or bucket URL)
    pub public_base_url: String,

    /// Base URL of the inference job API (exposes /jobs and /health)
    pub inference_base_url: String,

    /// Bearer token for the inference job API
    pub inference_api_key: String,

    /// Per-request timeout for calls to the inference API
    #[serde(default = "default_inference_request_timeout_secs")]
    pub inference_request_timeout_secs: u64,

    /// Delay between two status reads of the same job
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of status reads per job (0 disables the ceiling)
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,

    /// Wall-clock budget for polling one job (0 disables the deadline)
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Consecutive transport failures tolerated while polling
    #[serde(default = "default_poll_transport_retries")]
    pub poll_transport_retries: u32,

    /// CSV file holding the species checklist
    #[serde(default = "default_checklist_path")]
    pub checklist_path: String,

    /// Uploads allowed per client within one window
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,

    /// Length of the rate-limit window
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Key rate limits on the first X-Forwarded-For entry instead of the peer address
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Allowed CORS origin. Any origin is allowed when unset.
    pub frontend_url: Option<String>,

    /// Largest accepted upload body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_s3_region() -> String {
    "auto".to_string()
}

fn default_inference_request_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_poll_max_attempts() -> u32 {
    150
}

fn default_poll_timeout_secs() -> u64 {
    300
}

fn default_poll_transport_retries() -> u32 {
    3
}

fn default_checklist_path() -> String {
    "california_birds.csv".to_string()
}

fn default_rate_limit_max() -> u32 {
    10
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: NonZeroU32::new(self.poll_max_attempts),
            deadline: (self.poll_timeout_secs > 0)
                .then(|| Duration::from_secs(self.poll_timeout_secs)),
            transport_retries: self.poll_transport_retries,
        }
    }

    pub fn inference_request_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_request_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

/// Settings for the `refresh-checklist` binary.
#[derive(Debug, Deserialize)]
pub struct ChecklistConfig {
    #[serde(default = "default_checklist_url")]
    pub checklist_url: String,

    #[serde(default = "default_checklist_path")]
    pub checklist_path: String,
}

fn default_checklist_url() -> String {
    "https://californiabirds.org/checklist.asp".to_string()
}

impl ChecklistConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
