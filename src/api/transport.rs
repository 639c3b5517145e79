//! HTTP transport with bounded retry for overload and network failures.
//!
//! Retries exactly two failure classes: "service temporarily overloaded"
//! responses and network-level errors. Every other response — success or
//! failure — is returned immediately with its body unread; interpreting
//! status semantics belongs to the caller.

use super::{sanitize_error_body, ApiError};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Non-standard "site overloaded" status some upstreams return alongside 503.
const STATUS_OVERLOADED: u16 = 529;

/// Longest wait a server retry hint may impose, in backoff units.
const MAX_HINT_UNITS: u64 = 30;

/// Retry behavior for one logical request.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Duration of one backoff unit. Production default is one second;
    /// tests shrink it to keep retries fast.
    pub backoff_unit: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Thin wrapper over `reqwest` that owns the retry loop.
pub struct Transport {
    http: Client,
    retry: RetryConfig,
}

impl Transport {
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            http: Client::new(),
            retry: RetryConfig {
                max_attempts: retry.max_attempts.max(1), // Clamp to minimum 1
                backoff_unit: retry.backoff_unit,
            },
        }
    }

    /// POST a JSON body, retrying overload responses and network failures.
    pub async fn post_json(
        &self,
        url: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Result<Response, ApiError> {
        self.execute(|| {
            let mut request = self.http.post(url).json(body);
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            request
        })
        .await
    }

    /// GET with the same retry semantics as [`Transport::post_json`].
    pub async fn get(&self, url: &str, token: Option<&str>) -> Result<Response, ApiError> {
        self.execute(|| {
            let mut request = self.http.get(url);
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            request
        })
        .await
    }

    async fn execute(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response, ApiError> {
        for attempt in 1..=self.retry.max_attempts {
            match build().send().await {
                Ok(response) if is_overloaded(response.status()) => {
                    let body = response.text().await.unwrap_or_default();
                    if attempt == self.retry.max_attempts {
                        return Err(ApiError::Overloaded {
                            attempts: attempt,
                            detail: sanitize_error_body(&body),
                        });
                    }
                    // A server-stated wait takes precedence over the
                    // computed schedule.
                    let units = retry_hint_units(&body)
                        .map(|hint| hint.min(MAX_HINT_UNITS))
                        .unwrap_or_else(|| u64::from(attempt) * 2);
                    tracing::warn!(attempt, wait_units = units, "service overloaded, retrying");
                    tokio::time::sleep(scale(self.retry.backoff_unit, units)).await;
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt == self.retry.max_attempts {
                        return Err(ApiError::Network(e));
                    }
                    let units = 2u64.saturating_pow(attempt);
                    tracing::warn!(
                        attempt,
                        wait_units = units,
                        error = %e,
                        "network failure, retrying"
                    );
                    tokio::time::sleep(scale(self.retry.backoff_unit, units)).await;
                }
            }
        }
        unreachable!("retry loop returns on its final attempt")
    }
}

fn is_overloaded(status: StatusCode) -> bool {
    status == StatusCode::SERVICE_UNAVAILABLE || status.as_u16() == STATUS_OVERLOADED
}

fn scale(unit: Duration, units: u64) -> Duration {
    unit.saturating_mul(u32::try_from(units).unwrap_or(u32::MAX))
}

/// Extract a server-suggested wait (whole backoff units) from an overload
/// body: a JSON `retryAfter` field first, then a `Retry-After:`-style token
/// in plain text.
fn retry_hint_units(body: &str) -> Option<u64> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(seconds) = value.get("retryAfter").and_then(Value::as_u64) {
            return Some(seconds);
        }
    }

    let lower = body.to_lowercase();
    for prefix in &["retry-after:", "retry_after:", "retry-after ", "retry_after "] {
        if let Some(pos) = lower.find(prefix) {
            let digits: String = lower[pos + prefix.len()..]
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if let Ok(seconds) = digits.parse::<u64>() {
                return Some(seconds);
            }
        }
    }
    None
}
