// src/uplink/sender.rs
//! HTTP delivery of fixes with bounded retry

use super::payload::Payload;
use crate::{
    error::{Result, UplinkError},
    gps::Fix,
};
use chrono::Utc;
use reqwest::{StatusCode, Url};
use std::{
    fmt,
    time::{Duration, Instant},
};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Remote collection endpoint settings
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub url: Url,
    pub device_id: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Total tries per fix, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Sent as a bearer token when present
    pub auth_token: Option<String>,
}

impl EndpointConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            device_id: "gps-uplink".to_string(),
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            auth_token: None,
        }
    }

    /// Delay after the given failed attempt (1-based): doubles each time, capped
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Successful delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub status: StatusCode,
    pub attempts: u32,
}

/// Why a single request did not deliver the fix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// Endpoint answered with a non-success status
    Status(StatusCode),
    /// Request did not complete within the timeout
    Timeout,
    /// Connection refused, reset, DNS failure and the like
    Network(String),
    /// Request could not be built or followed; retrying cannot help
    Request(String),
}

impl AttemptFailure {
    fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            AttemptFailure::Timeout
        } else if error.is_builder() || error.is_redirect() {
            AttemptFailure::Request(error.to_string())
        } else {
            AttemptFailure::Network(error.to_string())
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            AttemptFailure::Status(status) => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            AttemptFailure::Timeout | AttemptFailure::Network(_) => true,
            AttemptFailure::Request(_) => false,
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Status(status) => write!(f, "HTTP {}", status),
            AttemptFailure::Timeout => write!(f, "request timed out"),
            AttemptFailure::Network(msg) => write!(f, "network error: {}", msg),
            AttemptFailure::Request(msg) => write!(f, "invalid request: {}", msg),
        }
    }
}

/// Record of one delivery try, kept only for logging
#[derive(Debug)]
pub struct UplinkAttempt<'a> {
    pub target: &'a Url,
    pub attempt: u32,
    pub outcome: std::result::Result<StatusCode, AttemptFailure>,
    pub latency: Duration,
}

/// Delivery failed; the fix is dropped and the loop carries on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Every attempt hit a transient failure
    Exhausted { attempts: u32, last: AttemptFailure },
    /// Endpoint refused the fix (authentication, validation, ...)
    Rejected { status: StatusCode },
    /// Request could not be issued at all
    Request(String),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
            SendError::Rejected { status } => write!(f, "endpoint rejected fix: HTTP {}", status),
            SendError::Request(msg) => write!(f, "invalid request: {}", msg),
        }
    }
}

impl std::error::Error for SendError {}

/// Posts fixes to a single endpoint. Holds no per-fix state between sends.
pub struct UplinkSender {
    client: reqwest::Client,
    config: EndpointConfig,
}

impl UplinkSender {
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gps-uplink/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| UplinkError::Other(format!("HTTP client error: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Deliver one fix and the sentence it came from, retrying transient
    /// failures with exponential backoff
    pub async fn send(&self, fix: &Fix, raw: &str) -> std::result::Result<Ack, SendError> {
        let payload = Payload::from_fix(fix, raw, &self.config.device_id, Utc::now());
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let started = Instant::now();
            let record = UplinkAttempt {
                target: &self.config.url,
                attempt,
                outcome: self.post(&payload).await,
                latency: started.elapsed(),
            };

            match record.outcome {
                Ok(status) => {
                    debug!(
                        "Delivered fix to {} (HTTP {}, attempt {}, {:?})",
                        record.target, status, record.attempt, record.latency
                    );
                    return Ok(Ack { status, attempts: attempt });
                }
                Err(failure) if !failure.is_retryable() => {
                    warn!(
                        "Uplink attempt {} to {} not retryable: {}",
                        attempt, record.target, failure
                    );
                    return Err(match failure {
                        AttemptFailure::Status(status) => SendError::Rejected { status },
                        other => SendError::Request(other.to_string()),
                    });
                }
                Err(failure) if attempt >= max_attempts => {
                    warn!("Uplink attempt {} to {} failed: {}", attempt, record.target, failure);
                    return Err(SendError::Exhausted { attempts: attempt, last: failure });
                }
                Err(failure) => {
                    let delay = self.config.backoff_delay(attempt);
                    warn!(
                        "Uplink attempt {} to {} failed after {:?}: {}; retrying in {:?}",
                        attempt, record.target, record.latency, failure, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn post(&self, payload: &Payload) -> std::result::Result<StatusCode, AttemptFailure> {
        let mut request = self.client.post(self.config.url.clone()).json(payload);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| AttemptFailure::from_reqwest(&e))?;
        let status = response.status();
        if status.is_success() {
            Ok(status)
        } else {
            Err(AttemptFailure::Status(status))
        }
    }

    /// Probe `<origin>/health` once; the result is informational only
    pub async fn health_check(&self) -> Result<StatusCode> {
        let url = self
            .config
            .url
            .join("/health")
            .map_err(|e| UplinkError::Other(format!("Invalid health URL: {}", e)))?;

        let response = self.client.get(url.clone()).send().await?;
        info!("Health check {} responded with HTTP {}", url, response.status());
        Ok(response.status())
    }
}
