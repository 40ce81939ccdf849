//! Delivery strategies for handing a signup to a remote endpoint.
//!
//! Both transports make a single attempt with no retry. They differ in what
//! they can observe about the remote side: the opaque POST can see nothing at
//! all, the hidden channel can see that *a* response arrived but never what
//! it said.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// One email signup, created per user action and discarded after delivery.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub email: String,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionRequest {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// What a transport learned about a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    /// The remote side observably received the request.
    Success,
    /// The request did not reach the remote side.
    Failure(String),
    /// The attempt completed without error but the result is unobservable.
    /// Callers decide whether to treat this as delivered.
    Unknown,
}

/// A single-attempt delivery strategy.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &SubmissionRequest) -> TransportOutcome;
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn send(&self, request: &SubmissionRequest) -> TransportOutcome {
        (**self).send(request).await
    }
}

#[derive(Debug, Serialize)]
struct JsonSubmission<'a> {
    email: &'a str,
    timestamp: String,
}

/// JSON POST that never reads the response.
///
/// Models an opaque cross-origin request: status and body are off limits by
/// construction, so a completed request only ever yields
/// [`TransportOutcome::Unknown`]. "Delivered" and "silently rejected" are
/// indistinguishable here; that trust boundary is the price of skipping the
/// cross-origin preflight.
#[derive(Debug)]
pub struct OpaquePostTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl OpaquePostTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Transport for OpaquePostTransport {
    async fn send(&self, request: &SubmissionRequest) -> TransportOutcome {
        let body = JsonSubmission {
            email: &request.email,
            timestamp: request.submitted_at.to_rfc3339(),
        };
        match self.client.post(&self.endpoint).json(&body).send().await {
            // Deliberately not inspecting status or body.
            Ok(_) => TransportOutcome::Unknown,
            Err(e) => {
                log::debug!("opaque POST failed: {e}");
                TransportOutcome::Failure(e.to_string())
            }
        }
    }
}

/// Form-encoded POST with a fixed deadline, body never parsed.
///
/// Models the hidden-iframe workaround for endpoints that cannot answer a
/// preflight: a single `email` field, fire-and-forget. Any response at all
/// counts as the iframe's load event, so it resolves [`TransportOutcome::Success`]
/// regardless of status. Hitting the deadline yields
/// [`TransportOutcome::Unknown`] rather than an optimistic success: the
/// delivery may well have happened, but nothing observed it.
#[derive(Debug)]
pub struct HiddenChannelTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HiddenChannelTransport {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, crate::error::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Transport for HiddenChannelTransport {
    async fn send(&self, request: &SubmissionRequest) -> TransportOutcome {
        let form = [("email", request.email.as_str())];
        match self.client.post(&self.endpoint).form(&form).send().await {
            Ok(_) => TransportOutcome::Success,
            Err(e) if e.is_timeout() => {
                log::debug!("hidden channel gave no signal before the deadline");
                TransportOutcome::Unknown
            }
            Err(e) => {
                log::debug!("hidden channel POST failed: {e}");
                TransportOutcome::Failure(e.to_string())
            }
        }
    }
}
