use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use strum::EnumString;

/// Status string reported by the inference job queue.
///
/// Only `Completed` is success-terminal. Vendor strings this service does not
/// know are kept verbatim in `Other` and treated as still running.
#[derive(Debug, Clone, PartialEq, Eq, EnumString, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(from = "String")]
pub enum JobStatus {
    InQueue,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
    #[strum(default)]
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::InQueue => "IN_QUEUE",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::TimedOut => "TIMED_OUT",
            JobStatus::Other(s) => s,
        }
    }

    /// Vendor statuses that end a job without output.
    fn is_failure(&self) -> bool {
        matches!(
            self,
            JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut
        )
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or(JobStatus::Other(value))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response to `POST /jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub status: JobStatus,
}

/// Response to `GET /jobs/{id}`: one observation of a remote job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Classification of a snapshot for the poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending(JobStatus),
    Completed(Value),
    Failed(String),
}

impl JobSnapshot {
    /// A present `error` field wins over any status, including `COMPLETED`.
    pub fn into_state(self) -> JobState {
        if let Some(reason) = self.failure_reason() {
            return JobState::Failed(reason);
        }
        match self.status {
            JobStatus::Completed => JobState::Completed(self.output.unwrap_or(Value::Null)),
            status => JobState::Pending(status),
        }
    }

    fn failure_reason(&self) -> Option<String> {
        if let Some(error) = self.error.as_ref().filter(|e| !e.is_null()) {
            return Some(describe_error(error));
        }

        // The inference handler reports bad input as `{"error": ...}` inside
        // an otherwise completed output.
        if let Some(error) = self
            .output
            .as_ref()
            .and_then(|o| o.get("error"))
            .filter(|e| !e.is_null())
        {
            return Some(describe_error(error));
        }

        self.status
            .is_failure()
            .then(|| format!("job ended with status {}", self.status))
    }
}

fn describe_error(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
