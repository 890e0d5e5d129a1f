//! Status polling for remote inference jobs.
//!
//! A job is observed one read at a time: the next status read never starts
//! before the previous one has been answered. The loop ends on the first
//! terminal read, or when the attempt ceiling, the deadline or the
//! cancellation token stops it.

use serde_json::Value;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::models::job::JobState;
use crate::services::inference::{InferenceClient, InferenceError};

/// Timing and retry bounds for one poll loop.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Delay between two status reads
    pub interval: Duration,
    /// Maximum status reads, `None` for no ceiling
    pub max_attempts: Option<NonZeroU32>,
    /// Wall-clock budget measured from the first read, `None` for no deadline
    pub deadline: Option<Duration>,
    /// Consecutive transport failures tolerated before giving up
    pub transport_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_attempts: NonZeroU32::new(150),
            deadline: Some(Duration::from_secs(300)),
            transport_retries: 3,
        }
    }
}

/// Payload of the terminal `COMPLETED` read.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub job_id: String,
    pub output: Value,
    pub attempts: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("status query for job {job_id} failed after {attempts} attempts: {source}")]
    Transport {
        job_id: String,
        attempts: u32,
        #[source]
        source: InferenceError,
    },

    #[error("job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("job {job_id} still running after {attempts} status checks ({elapsed:?})")]
    Timeout {
        job_id: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("polling job {job_id} was cancelled")]
    Cancelled { job_id: String },
}

enum Interrupted {
    Cancelled,
    DeadlineElapsed,
}

/// Suspension guard shared by every await point of one poll loop.
struct PollRun<'a> {
    job_id: &'a str,
    started: Instant,
    deadline: Option<Instant>,
    cancel: &'a CancellationToken,
}

impl PollRun<'_> {
    async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            _ = sleep_until_deadline(self.deadline) => Err(Interrupted::DeadlineElapsed),
            output = fut => Ok(output),
        }
    }

    fn interrupted(&self, reason: Interrupted, attempts: u32) -> PollError {
        match reason {
            Interrupted::Cancelled => PollError::Cancelled {
                job_id: self.job_id.to_string(),
            },
            Interrupted::DeadlineElapsed => self.timeout(attempts),
        }
    }

    fn timeout(&self, attempts: u32) -> PollError {
        PollError::Timeout {
            job_id: self.job_id.to_string(),
            attempts,
            elapsed: self.started.elapsed(),
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Poll `job_id` until it reaches a terminal state.
///
/// The first read is issued immediately, so a job that is already complete
/// costs no delay tick.
pub async fn poll_until_terminal(
    client: &dyn InferenceClient,
    job_id: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<CompletedJob, PollError> {
    let started = Instant::now();
    let run = PollRun {
        job_id,
        started,
        deadline: policy.deadline.map(|budget| started + budget),
        cancel,
    };

    let mut attempts: u32 = 0;
    let mut transport_failures: u32 = 0;

    loop {
        attempts += 1;

        let read = run
            .bounded(client.job_status(job_id))
            .await
            .map_err(|reason| run.interrupted(reason, attempts))?;

        match read {
            Ok(snapshot) => {
                transport_failures = 0;
                match snapshot.into_state() {
                    JobState::Completed(output) => {
                        tracing::debug!(job_id, attempts, "Job completed");
                        return Ok(CompletedJob {
                            job_id: job_id.to_string(),
                            output,
                            attempts,
                        });
                    }
                    JobState::Failed(reason) => {
                        tracing::warn!(job_id, attempts, reason = %reason, "Job reported failure");
                        return Err(PollError::JobFailed {
                            job_id: job_id.to_string(),
                            reason,
                        });
                    }
                    JobState::Pending(status) => {
                        tracing::trace!(job_id, attempts, status = %status, "Job still running");
                    }
                }
            }
            Err(source) => {
                transport_failures += 1;
                if transport_failures > policy.transport_retries {
                    return Err(PollError::Transport {
                        job_id: job_id.to_string(),
                        attempts,
                        source,
                    });
                }
                tracing::warn!(
                    job_id,
                    attempts,
                    error = %source,
                    "Status query failed, will retry"
                );
            }
        }

        if policy.max_attempts.is_some_and(|max| attempts >= max.get()) {
            return Err(run.timeout(attempts));
        }

        run.bounded(sleep(policy.interval))
            .await
            .map_err(|reason| run.interrupted(reason, attempts))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{JobHandle, JobSnapshot};
    use crate::services::inference::stub::ScriptedInference;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(2000),
            max_attempts: None,
            deadline: None,
            transport_retries: 0,
        }
    }

    /// Inference service whose status reads hang for a minute.
    #[derive(Default)]
    struct StalledInference {
        status_calls: AtomicUsize,
    }

    #[async_trait]
    impl InferenceClient for StalledInference {
        async fn submit(&self, _image_url: &str) -> Result<JobHandle, InferenceError> {
            unreachable!("the poll loop never submits")
        }

        async fn job_status(&self, job_id: &str) -> Result<JobSnapshot, InferenceError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_secs(60)).await;
            Ok(serde_json::from_value(json!({"id": job_id, "status": "IN_PROGRESS"}))?)
        }

        async fn health(&self) -> Result<(), InferenceError> {
            Ok(())
        }
    }

    fn completed() -> serde_json::Value {
        json!({
            "id": "job-1",
            "status": "COMPLETED",
            "output": {"url": "https://cdn.example.com/a.png", "predictions": "[]"}
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_completion_skips_delay() {
        let client = ScriptedInference::new(vec![Ok(completed())]);
        let started = Instant::now();

        let done = assert_ok!(
            poll_until_terminal(&client, "job-1", &policy(), &CancellationToken::new()).await
        );

        assert_eq!(done.attempts, 1);
        assert_eq!(client.status_calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_through_non_terminal_statuses() {
        let client = ScriptedInference::new(vec![
            Ok(json!({"id": "job-1", "status": "IN_QUEUE"})),
            Ok(json!({"id": "job-1", "status": "IN_PROGRESS"})),
            Ok(completed()),
        ]);
        let started = Instant::now();

        let done = assert_ok!(
            poll_until_terminal(&client, "job-1", &policy(), &CancellationToken::new()).await
        );

        assert_eq!(done.attempts, 3);
        assert_eq!(done.output["url"], "https://cdn.example.com/a.png");
        assert_eq!(client.status_calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_stops_after_first_read() {
        let client = ScriptedInference::new(vec![
            Ok(json!({"id": "job-1", "status": "FAILED", "error": "no gpu available"})),
            Ok(completed()),
        ]);

        let err = assert_err!(
            poll_until_terminal(&client, "job-1", &policy(), &CancellationToken::new()).await
        );

        match err {
            PollError::JobFailed { reason, .. } => assert_eq!(reason, "no gpu available"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_ceiling_times_out() {
        let client = ScriptedInference::statuses(&["IN_QUEUE"; 10]);
        let policy = PollPolicy {
            max_attempts: NonZeroU32::new(4),
            ..policy()
        };

        let err = assert_err!(
            poll_until_terminal(&client, "job-1", &policy, &CancellationToken::new()).await
        );

        assert!(matches!(err, PollError::Timeout { attempts: 4, .. }));
        assert_eq!(client.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_times_out_between_reads() {
        let client = ScriptedInference::statuses(&[]);
        let policy = PollPolicy {
            deadline: Some(Duration::from_secs(5)),
            ..policy()
        };
        let started = Instant::now();

        let err = assert_err!(
            poll_until_terminal(&client, "job-1", &policy, &CancellationToken::new()).await
        );

        // Reads at t=0s, 2s, 4s; the sleep towards 6s is cut at 5s
        assert!(matches!(err, PollError::Timeout { attempts: 3, .. }));
        assert_eq!(client.status_calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_in_flight_read() {
        let client = StalledInference::default();
        let policy = PollPolicy {
            deadline: Some(Duration::from_secs(5)),
            ..policy()
        };
        let started = Instant::now();

        let err = assert_err!(
            poll_until_terminal(&client, "job-1", &policy, &CancellationToken::new()).await
        );

        assert!(matches!(err, PollError::Timeout { attempts: 1, .. }));
        assert_eq!(client.status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_in_flight_read() {
        let client = Arc::new(StalledInference::default());
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let task = {
            let client = client.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                poll_until_terminal(client.as_ref(), "job-1", &policy(), &cancel).await
            })
        };

        sleep(Duration::from_secs(10)).await;
        cancel.cancel();

        let err = assert_err!(task.await.unwrap());
        assert!(matches!(err, PollError::Cancelled { .. }));
        assert_eq!(client.status_calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_are_retried() {
        let client = ScriptedInference::new(vec![Err(503), Err(502), Ok(completed())]);
        let policy = PollPolicy {
            transport_retries: 2,
            ..policy()
        };

        let done = assert_ok!(
            poll_until_terminal(&client, "job-1", &policy, &CancellationToken::new()).await
        );
        assert_eq!(done.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_exhaust_retries() {
        let client = ScriptedInference::new(vec![Err(503), Err(503), Err(503), Ok(completed())]);
        let policy = PollPolicy {
            transport_retries: 2,
            ..policy()
        };

        let err = assert_err!(
            poll_until_terminal(&client, "job-1", &policy, &CancellationToken::new()).await
        );

        assert!(matches!(err, PollError::Transport { attempts: 3, .. }));
        assert_eq!(client.status_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_counter_resets_on_success() {
        let client = ScriptedInference::new(vec![
            Err(503),
            Ok(json!({"id": "job-1", "status": "IN_PROGRESS"})),
            Err(503),
            Ok(completed()),
        ]);
        let policy = PollPolicy {
            transport_retries: 1,
            ..policy()
        };

        let done = assert_ok!(
            poll_until_terminal(&client, "job-1", &policy, &CancellationToken::new()).await
        );
        assert_eq!(done.attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_read() {
        let client = ScriptedInference::new(vec![Ok(completed())]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = assert_err!(poll_until_terminal(&client, "job-1", &policy(), &cancel).await);

        assert!(matches!(err, PollError::Cancelled { .. }));
        assert_eq!(client.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_loop_during_delay() {
        let client = Arc::new(ScriptedInference::statuses(&[]));
        let cancel = CancellationToken::new();

        let task = {
            let client = client.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                poll_until_terminal(client.as_ref(), "job-1", &policy(), &cancel).await
            })
        };

        // Reads at t=0s and t=2s, cancelled while waiting for t=4s
        sleep(Duration::from_millis(3000)).await;
        cancel.cancel();

        let err = assert_err!(task.await.unwrap());
        assert!(matches!(err, PollError::Cancelled { .. }));
        assert_eq!(client.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_poll_independently() {
        let fast = ScriptedInference::new(vec![Ok(completed())]);
        let slow = ScriptedInference::new(vec![
            Ok(json!({"id": "job-1", "status": "IN_QUEUE"})),
            Ok(completed()),
        ]);
        let cancel = CancellationToken::new();
        let policy = policy();

        let (a, b) = tokio::join!(
            poll_until_terminal(&fast, "job-a", &policy, &cancel),
            poll_until_terminal(&slow, "job-b", &policy, &cancel),
        );

        assert_eq!(assert_ok!(a).attempts, 1);
        assert_eq!(assert_ok!(b).attempts, 2);
        assert_eq!(fast.status_calls(), 1);
        assert_eq!(slow.status_calls(), 2);
    }
}
