//! Test helper utilities for router tests

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use whats_that_bird::app_state::AppState;
use whats_that_bird::models::job::{JobHandle, JobSnapshot};
use whats_that_bird::services::checklist::SpeciesChecklist;
use whats_that_bird::services::inference::{InferenceClient, InferenceError};
use whats_that_bird::services::orchestrator::Identifier;
use whats_that_bird::services::poller::PollPolicy;
use whats_that_bird::services::rate_limit::{KeyedQuota, RateLimitState};
use whats_that_bird::services::storage::{ObjectStore, StorageError};
use whats_that_bird::{build_router, RouterOptions};

use crate::fixtures::CHECKLIST_CSV;

const BOUNDARY: &str = "whats-that-bird-test-boundary";

/// Largest image the test router accepts.
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

/// Object store that keeps uploads in memory.
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<Vec<(String, usize, String)>>,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .push((key.to_string(), data.len(), content_type.to_string()));
        Ok(format!("https://cdn.example.com/{key}"))
    }
}

/// Inference service replaying a fixed sequence of status snapshots.
pub struct ScriptedInference {
    steps: Mutex<VecDeque<Value>>,
    status_calls: AtomicUsize,
    pub submitted: Mutex<Vec<String>>,
}

impl ScriptedInference {
    pub fn new(steps: Vec<Value>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            status_calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceClient for ScriptedInference {
    async fn submit(&self, image_url: &str) -> Result<JobHandle, InferenceError> {
        self.submitted.lock().unwrap().push(image_url.to_string());
        Ok(serde_json::from_value(serde_json::json!({"id": "job-1", "status": "IN_QUEUE"}))?)
    }

    async fn job_status(&self, _job_id: &str) -> Result<JobSnapshot, InferenceError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| serde_json::json!({"id": "job-1", "status": "IN_QUEUE"}));
        Ok(serde_json::from_value(step)?)
    }

    async fn health(&self) -> Result<(), InferenceError> {
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub inference: Arc<ScriptedInference>,
    pub shutdown: CancellationToken,
}

/// Build the full router over stub collaborators.
///
/// Polling uses a 1 ms interval so scripted jobs finish quickly.
pub fn test_app(steps: Vec<Value>, uploads_per_minute: u32) -> TestApp {
    let policy = PollPolicy {
        interval: Duration::from_millis(1),
        max_attempts: NonZeroU32::new(20),
        deadline: Some(Duration::from_secs(5)),
        transport_retries: 0,
    };
    test_app_with_policy(steps, uploads_per_minute, policy)
}

pub fn test_app_with_policy(steps: Vec<Value>, uploads_per_minute: u32, policy: PollPolicy) -> TestApp {
    let store = Arc::new(MemoryStore::default());
    let inference = Arc::new(ScriptedInference::new(steps));
    let shutdown = CancellationToken::new();

    let identifier = Identifier::new(store.clone(), inference.clone(), policy);
    let checklist = SpeciesChecklist::from_reader(CHECKLIST_CSV.as_bytes()).unwrap();
    let state = AppState::new(
        identifier,
        inference.clone(),
        checklist,
        shutdown.clone(),
        MAX_UPLOAD_BYTES,
    );

    let quota = KeyedQuota::new(
        NonZeroU32::new(uploads_per_minute).unwrap(),
        Duration::from_secs(60),
    )
    .unwrap();
    let limits = RateLimitState {
        quota: Arc::new(quota),
        trust_forwarded_for: true,
    };

    let options = RouterOptions { frontend_url: None };

    TestApp {
        router: build_router(state, limits, &options),
        store,
        inference,
        shutdown,
    }
}

/// Multipart POST to /api/upload with a single file part.
pub fn upload_request(file: Option<&[u8]>, client_ip: &str) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nbackyard\r\n"
        )
        .as_bytes(),
    );
    if let Some(bytes) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"bird.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("x-forwarded-for", client_ip)
        .header("content-length", body.len())
        .body(Body::from(body))
        .expect("request builder must not fail")
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request builder must not fail")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body must be collected")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    let body_text = String::from_utf8_lossy(&bytes).to_string();
    serde_json::from_slice(&bytes).unwrap_or_else(|err| panic!("invalid json: {err}; body={body_text}"))
}
