//! Client for the trading-journal AI backend.
//!
//! [`AnalysisClient`] is the single entry point features use to run a named
//! AI operation: it checks the cache, issues the request through the
//! retrying transport, classifies failures, updates the usage-limits
//! service, and returns a normalized [`AnalysisResult`].

pub mod classify;
pub mod transport;

use crate::cache::AnalysisCache;
use crate::limits::{UsageLimits, UsageLimitsService};
use crate::notify::{Notice, NoticeSink, TracingNotices};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use transport::{RetryConfig, Transport};

const MAX_ERROR_CHARS: usize = 500;

/// Errors surfaced to callers.
///
/// Credit exhaustion is NOT an error: it is an expected business outcome,
/// returned as data on [`AnalysisResult`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Server-reported failure that is not a credits problem (validation,
    /// auth, unknown operation). Passed through uninterpreted.
    #[error("AI API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Service stayed overloaded through every retry attempt.
    #[error("AI service overloaded after {attempts} attempts: {detail}")]
    Overloaded { attempts: u32, detail: String },

    /// Network-level failure after exhausting retries.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body was not the JSON shape the server promises.
    #[error("invalid response body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Normalized outcome of one AI operation, in the server's camelCase wire
/// shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub success: bool,
    /// Human-readable message; for credits errors always the friendly
    /// classifier message, never raw server output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when the failure is quota exhaustion rather than a real error.
    #[serde(default)]
    pub is_credits_error: bool,
    /// Updated usage counters, when the server included them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_limits: Option<UsageLimits>,
    /// Operation-specific fields, passed through untouched.
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

impl AnalysisResult {
    /// A recovered credits failure carrying a friendly message.
    fn credits_failure(message: String) -> Self {
        Self {
            success: false,
            error: Some(message),
            is_credits_error: true,
            ai_limits: None,
            payload: serde_json::Map::new(),
        }
    }
}

/// Per-request options for [`AnalysisClient::analyze_with`].
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Reuse and store the result under this key.
    pub cache_key: Option<String>,
    /// Skip the credits-exhausted notice; the caller presents the failure
    /// itself.
    pub suppress_notice: bool,
    /// Ignore an existing cached entry and overwrite it on success.
    pub bypass_cache: bool,
}

impl AnalyzeOptions {
    /// Options with just a cache key set.
    pub fn cached(key: impl Into<String>) -> Self {
        Self {
            cache_key: Some(key.into()),
            ..Self::default()
        }
    }
}

/// Façade for running named AI operations against the backend.
pub struct AnalysisClient {
    transport: Transport,
    base_url: String,
    token: Option<String>,
    cache: Arc<AnalysisCache>,
    limits: Arc<UsageLimitsService>,
    notices: Arc<dyn NoticeSink>,
}

impl AnalysisClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        cache: Arc<AnalysisCache>,
        limits: Arc<UsageLimitsService>,
    ) -> Self {
        Self::with_retry(base_url, token, cache, limits, RetryConfig::default())
    }

    pub fn with_retry(
        base_url: impl Into<String>,
        token: Option<String>,
        cache: Arc<AnalysisCache>,
        limits: Arc<UsageLimitsService>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transport: Transport::new(retry),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            cache,
            limits,
            notices: Arc::new(TracingNotices),
        }
    }

    /// Replace the default tracing notice sink.
    pub fn with_notice_sink(mut self, notices: Arc<dyn NoticeSink>) -> Self {
        self.notices = notices;
        self
    }

    pub fn limits(&self) -> &Arc<UsageLimitsService> {
        &self.limits
    }

    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    /// Run `operation` with default options.
    pub async fn analyze(
        &self,
        operation: &str,
        payload: Value,
    ) -> Result<AnalysisResult, ApiError> {
        self.analyze_with(operation, payload, AnalyzeOptions::default())
            .await
    }

    /// Run a named AI operation.
    ///
    /// A cached result for the given key is returned immediately with no
    /// network call. Otherwise the request goes through the retrying
    /// transport; credits failures come back as recovered
    /// `success == false` results, any other server failure is an error.
    /// A usage snapshot in the response is applied to the limits service
    /// before the result is returned, and true successes are cached under
    /// the key.
    pub async fn analyze_with(
        &self,
        operation: &str,
        payload: Value,
        options: AnalyzeOptions,
    ) -> Result<AnalysisResult, ApiError> {
        if let Some(key) = options.cache_key.as_deref() {
            if !options.bypass_cache {
                if let Some(hit) = self.cache.get(key) {
                    tracing::debug!(operation, key, "analysis cache hit");
                    return Ok(hit);
                }
            }
        }

        let url = format!("{}/api/ai/{operation}", self.base_url);
        let response = self
            .transport
            .post_json(&url, self.token.as_deref(), &payload)
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            let verdict = classify::classify(Some(&message));
            if verdict.is_credits_error {
                let friendly = verdict.message.unwrap_or(message);
                self.notify_credits(&friendly, options.suppress_notice);
                return Ok(AnalysisResult::credits_failure(friendly));
            }
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let mut result: AnalysisResult = serde_json::from_str(&body)?;

        // The server can report a logical failure inside a 200 body; a
        // credits failure there is still a recovered outcome.
        if !result.success {
            let verdict = classify::classify(result.error.as_deref());
            if verdict.is_credits_error {
                result.is_credits_error = true;
                result.error = verdict.message;
                if let Some(message) = result.error.as_deref() {
                    self.notify_credits(message, options.suppress_notice);
                }
            }
        }

        // Server counters are authoritative; apply before handing back.
        if let Some(snapshot) = result.ai_limits.clone() {
            self.limits.apply(Some(snapshot));
        }

        if result.success {
            if let Some(key) = options.cache_key.as_deref() {
                self.cache.put(key, result.clone());
            }
        }

        Ok(result)
    }

    /// Fetch the authoritative usage snapshot (`GET /api/auth/ai-limits`),
    /// apply it to the limits service, and return it.
    ///
    /// Manual refresh is best-effort: any failure logs a warning and
    /// returns `None` without touching held state.
    pub async fn fetch_limits(&self) -> Option<UsageLimits> {
        let url = format!("{}/api/auth/ai-limits", self.base_url);
        let response = match self.transport.get(&url, self.token.as_deref()).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "usage-limits refresh failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "usage-limits refresh rejected");
            return None;
        }

        let envelope: LimitsEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "usage-limits response malformed");
                return None;
            }
        };

        let snapshot = envelope.data.ai_request_limits;
        self.limits.apply(Some(snapshot.clone()));
        Some(snapshot)
    }

    /// Cached result for `key`, if any.
    pub fn cached(&self, key: &str) -> Option<AnalysisResult> {
        self.cache.get(key)
    }

    /// Remove one cached analysis. Returns whether it existed.
    pub fn clear_cached(&self, key: &str) -> bool {
        self.cache.evict(key)
    }

    /// Remove every cached analysis whose key starts with `prefix`.
    pub fn clear_cache_prefix(&self, prefix: &str) -> usize {
        self.cache.evict_by_prefix(prefix)
    }

    fn notify_credits(&self, message: &str, suppress: bool) {
        if !suppress {
            self.notices.publish(Notice::CreditsExhausted {
                message: message.to_string(),
            });
        }
    }
}

#[derive(Debug, Deserialize)]
struct LimitsEnvelope {
    data: LimitsData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LimitsData {
    ai_request_limits: UsageLimits,
}

/// Pull the `error` field out of a JSON failure body, falling back to the
/// sanitized raw text.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return sanitize_error_body(message);
        }
    }
    sanitize_error_body(body)
}

/// Cap error text so messages never embed unbounded payload dumps.
pub(crate) fn sanitize_error_body(input: &str) -> String {
    if input.chars().count() <= MAX_ERROR_CHARS {
        return input.to_string();
    }

    let mut end = MAX_ERROR_CHARS;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &input[..end])
}
