use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::StateInformationMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::models::upload::ErrorEnvelope;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Result of asking the limiter for one unit of quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed { limit: u32, remaining: u32 },
    Denied { reset_after: Duration, limit: u32 },
}

/// Admission control for expensive routes, keyed by client.
pub trait QuotaCheck: Send + Sync {
    fn check_quota(&self, key: &str) -> QuotaDecision;
}

type KeyedLimiter =
    RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock, StateInformationMiddleware>;

/// In-memory GCRA limiter allowing `max` requests per `window` per key.
pub struct KeyedQuota {
    limiter: KeyedLimiter,
    limit: u32,
}

impl KeyedQuota {
    pub fn new(max: NonZeroU32, window: Duration) -> Result<Self, RateLimitError> {
        // Replenish one cell every window / max, allow the whole window as burst
        let period = window / max.get();
        let quota = Quota::with_period(period)
            .ok_or(RateLimitError::ZeroPeriod)?
            .allow_burst(max);

        Ok(Self {
            limiter: RateLimiter::keyed(quota).with_middleware::<StateInformationMiddleware>(),
            limit: max.get(),
        })
    }
}

impl QuotaCheck for KeyedQuota {
    fn check_quota(&self, key: &str) -> QuotaDecision {
        match self.limiter.check_key(&key.to_string()) {
            Ok(snapshot) => QuotaDecision::Allowed {
                limit: self.limit,
                remaining: snapshot.remaining_burst_capacity(),
            },
            Err(not_until) => QuotaDecision::Denied {
                reset_after: not_until.wait_time_from(DefaultClock::default().now()),
                limit: self.limit,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit window must be longer than the request limit in nanoseconds")]
    ZeroPeriod,
}

/// Shared state for [`enforce_quota`].
#[derive(Clone)]
pub struct RateLimitState {
    pub quota: Arc<dyn QuotaCheck>,
    pub trust_forwarded_for: bool,
}

/// Reject requests over quota with 429 and advertise the budget on every response.
pub async fn enforce_quota(
    State(state): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(&req, state.trust_forwarded_for);

    match state.quota.check_quota(&key) {
        QuotaDecision::Allowed { limit, remaining } => {
            let mut response = next.run(req).await;
            set_header(response.headers_mut(), X_RATELIMIT_LIMIT, limit as u64);
            set_header(response.headers_mut(), X_RATELIMIT_REMAINING, remaining as u64);
            response
        }
        QuotaDecision::Denied { reset_after, limit } => {
            metrics::counter!("upload_rate_limited_total").increment(1);
            // Round up so clients never retry early
            let secs = std::cmp::max(1, reset_after.as_millis().div_ceil(1000) as u64);
            tracing::info!(client = %key, retry_after_secs = secs, "Upload rate limited");

            let body = ErrorEnvelope::new(
                "rate_limited",
                format!(
                    "You have uploaded too many photos. Please try again in {}.",
                    describe_wait(secs)
                ),
                None,
            );
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            let headers = response.headers_mut();
            set_header(headers, X_RATELIMIT_LIMIT, limit as u64);
            set_header(headers, X_RATELIMIT_REMAINING, 0);
            set_header(headers, X_RATELIMIT_RESET, secs);
            set_header(headers, RETRY_AFTER, secs);
            response
        }
    }
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: u64) {
    headers.insert(name, HeaderValue::from(value));
}

fn describe_wait(secs: u64) -> String {
    match secs {
        1 => "1 second".to_string(),
        s if s < 60 => format!("{s} seconds"),
        s => {
            let minutes = s.div_ceil(60);
            if minutes == 1 {
                "1 minute".to_string()
            } else {
                format!("{minutes} minutes")
            }
        }
    }
}

fn client_key(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
