// Resilient reservation client
// Wraps a single reservation endpoint with bearer auth, retries for transient
// failures and a typed error for every status the service is known to return.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::{
    error::{ClientError, ReservationError},
    retry::RetryConfig,
    slot::{Slot, SlotId},
};

pub const AVAILABLE_PATH: &str = "/reservation/available";
pub const HELD_PATH: &str = "/reservation";

// Longest reason taken from a raw response body
const MAX_BODY_REASON_CHARS: usize = 200;

// Immutable for the lifetime of a client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub service_name: String,
    pub base_url: String,
    pub api_key: String,
    // Pacing pause taken before every request attempt
    pub request_delay: Duration,
    pub timeout_ms: u64,
    pub retry_config: RetryConfig,
}

impl ClientConfig {
    pub fn new(
        service_name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            request_delay: Duration::ZERO,
            timeout_ms: 30_000,
            retry_config: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn with_request_delay(mut self, request_delay: Duration) -> Self {
        self.request_delay = request_delay;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::ConfigError(format!(
                "{}: base url is empty",
                self.service_name
            )));
        }
        if self.retry_config.max_attempts == 0 {
            return Err(ClientError::ConfigError(format!(
                "{}: at least one attempt is required",
                self.service_name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ClientStats {
    pub requests_sent: AtomicUsize,
    pub requests_succeeded: AtomicUsize,
    pub requests_failed: AtomicUsize,
    pub requests_retried: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_retried: usize,
}

impl ClientStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::SeqCst),
            requests_succeeded: self.requests_succeeded.load(Ordering::SeqCst),
            requests_failed: self.requests_failed.load(Ordering::SeqCst),
            requests_retried: self.requests_retried.load(Ordering::SeqCst),
        }
    }
}

/// The four operations a reservation service offers.
///
/// The engine only talks to services through this trait, so it runs the same
/// against [`ReservationClient`] and the in-memory mock.
#[async_trait]
pub trait ReservationApi: Send + Sync {
    // Label used in logs
    fn name(&self) -> &str;

    async fn list_available(&self) -> Result<Vec<Slot>, ReservationError>;

    async fn list_held(&self) -> Result<Vec<Slot>, ReservationError>;

    // Ok(false) means the service answered 200 with a falsy body
    async fn reserve(&self, slot_id: &SlotId) -> Result<bool, ReservationError>;

    async fn release(&self, slot_id: &SlotId) -> Result<bool, ReservationError>;

    fn stats(&self) -> StatsSnapshot;
}

pub struct ReservationClient {
    http: reqwest::Client,
    config: ClientConfig,
    stats: ClientStats,
}

impl ReservationClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ClientError::InitError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            stats: ClientStats::default(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ReservationError> {
        let url = self.url(path);
        let retry = &self.config.retry_config;
        let service = self.config.service_name.as_str();
        let mut last_failure = String::from("no attempt completed");

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                self.stats.requests_retried.fetch_add(1, Ordering::SeqCst);
            }
            if !self.config.request_delay.is_zero() {
                tokio::time::sleep(self.config.request_delay).await;
            }

            debug!(service, %method, %url, attempt = attempt + 1, "Sending request");
            self.stats.requests_sent.fetch_add(1, Ordering::SeqCst);

            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.config.api_key);
            if let Some(body) = &body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    match response.bytes().await {
                        Ok(content) if status == StatusCode::OK => {
                            return match serde_json::from_slice(&content) {
                                Ok(value) => {
                                    self.stats.requests_succeeded.fetch_add(1, Ordering::SeqCst);
                                    Ok(value)
                                }
                                Err(e) => {
                                    self.stats.requests_failed.fetch_add(1, Ordering::SeqCst);
                                    Err(ReservationError::Decode(e.to_string()))
                                }
                            };
                        }
                        Ok(content) => {
                            let reason = extract_reason(status, &content);
                            if status.as_u16() >= 500 {
                                warn!(
                                    service,
                                    status = status.as_u16(),
                                    "Server error (attempt {}): {}",
                                    attempt + 1,
                                    reason
                                );
                                last_failure = format!("{} {}", status.as_u16(), reason);
                            } else {
                                self.stats.requests_failed.fetch_add(1, Ordering::SeqCst);
                                return Err(ReservationError::from_status(
                                    status.as_u16(),
                                    reason,
                                ));
                            }
                        }
                        Err(e) => {
                            error!(
                                service,
                                "Failed to read response body (attempt {}): {}",
                                attempt + 1,
                                e
                            );
                            last_failure = e.to_string();
                        }
                    }
                }
                Err(e) => {
                    error!(service, "Request exception (attempt {}): {}", attempt + 1, e);
                    last_failure = e.to_string();
                }
            }

            if attempt + 1 < retry.max_attempts {
                tokio::time::sleep(retry.backoff_for(attempt)).await;
            }
        }

        self.stats.requests_failed.fetch_add(1, Ordering::SeqCst);
        Err(ReservationError::RetriesExhausted {
            attempts: retry.max_attempts,
            last_failure,
        })
    }

    async fn fetch_slots(&self, path: &str) -> Result<Vec<Slot>, ReservationError> {
        let value = self.send(Method::GET, path, None).await?;
        serde_json::from_value(value).map_err(|e| ReservationError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ReservationApi for ReservationClient {
    fn name(&self) -> &str {
        &self.config.service_name
    }

    async fn list_available(&self) -> Result<Vec<Slot>, ReservationError> {
        self.fetch_slots(AVAILABLE_PATH).await
    }

    async fn list_held(&self) -> Result<Vec<Slot>, ReservationError> {
        self.fetch_slots(HELD_PATH).await
    }

    async fn reserve(&self, slot_id: &SlotId) -> Result<bool, ReservationError> {
        let body = json!({ "slot_id": slot_id });
        let value = self
            .send(Method::POST, &format!("{HELD_PATH}/{slot_id}"), Some(body))
            .await?;
        Ok(is_truthy(&value))
    }

    async fn release(&self, slot_id: &SlotId) -> Result<bool, ReservationError> {
        let value = self
            .send(Method::DELETE, &format!("{HELD_PATH}/{slot_id}"), None)
            .await?;
        Ok(is_truthy(&value))
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// Human readable reason for a failed response.
///
/// A `message` field in a JSON body wins; otherwise the status line reason is
/// used, and for codes without a standard phrase the first non-blank line of
/// the body, cut to a bounded length.
pub fn extract_reason(status: StatusCode, body: &Bytes) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) {
        match fields.get("message") {
            Some(Value::String(message)) => return message.clone(),
            Some(Value::Null) | None => {}
            Some(other) => return other.to_string(),
        }
    }

    match status.canonical_reason() {
        Some(reason) => reason.to_string(),
        None => decode_reason_bytes(body)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .chars()
            .take(MAX_BODY_REASON_CHARS)
            .collect(),
    }
}

// UTF-8 first, Latin-1 when the bytes are not valid UTF-8
pub fn decode_reason_bytes(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect(),
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map_or(true, |n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}
