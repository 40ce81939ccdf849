//! Relay handlers turning signup requests into upstream API calls or store
//! records.
//!
//! Two independent handlers share the "validate, forward, answer with a small
//! response vocabulary" contract. The proxy handler speaks JSON and reports
//! errors as `{ "error": ... }` with a matching status code; the store
//! handler accepts a single form field and answers with
//! `{ "status": "ok" | "duplicate" | "error" }` the way a spreadsheet-backed
//! script endpoint would.

use crate::config::Config;
use crate::store::{AddOutcome, SignupStore};
use crate::validator::is_valid_email;
use axum::Json;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Proxy relay failure modes, mapped onto the stable status-code set.
///
/// Upstream status and body are logged server-side only; callers get the
/// generic message.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Email is required")]
    MissingEmail,
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Server configuration error")]
    MissingCredential,
    #[error("Newsletter signup failed")]
    Upstream,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::MissingEmail | Self::InvalidEmail => StatusCode::BAD_REQUEST,
            Self::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream => StatusCode::BAD_GATEWAY,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Shared state of the upstream-proxying relay.
#[derive(Debug, Clone)]
pub struct ProxyState {
    pub config: Arc<Config>,
    pub client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct MembershipRequest<'a> {
    email: &'a str,
    status: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ProxyOk {
    success: bool,
}

/// `POST /api/subscribe` — validate and forward to the mailing-list API.
///
/// The body is taken as raw JSON so a missing or non-string `email` field
/// maps to 400 instead of an extractor rejection.
pub async fn proxy_subscribe(
    State(state): State<ProxyState>,
    Json(body): Json<Value>,
) -> Result<Json<ProxyOk>, RelayError> {
    let email = body
        .get("email")
        .and_then(Value::as_str)
        .ok_or(RelayError::MissingEmail)?;
    if !is_valid_email(email.trim()) {
        return Err(RelayError::InvalidEmail);
    }

    let Some(api_key) = state.config.upstream_api_key.as_deref() else {
        log::error!("upstream_api_key is not configured");
        return Err(RelayError::MissingCredential);
    };

    let request = MembershipRequest {
        email: email.trim(),
        status: "1",
    };
    let response = state
        .client
        .post(&state.config.upstream_url)
        .header(header::AUTHORIZATION, api_key)
        .json(&request)
        .send()
        .await
        .map_err(|e| {
            log::error!("upstream API request failed: {e}");
            RelayError::Upstream
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        log::error!("upstream API error: {status} {body}");
        return Err(RelayError::Upstream);
    }

    Ok(Json(ProxyOk { success: true }))
}

/// Shared state of the store-backed relay.
#[derive(Debug, Clone)]
pub struct StoreState {
    pub config: Arc<Config>,
    pub store: Arc<SignupStore>,
}

#[derive(Debug, serde::Deserialize)]
pub struct StoreForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct StoreResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

impl StoreResponse {
    fn new(status: &'static str, message: Option<&'static str>) -> Self {
        Self { status, message }
    }
}

/// `POST /subscribe` — validate, duplicate-check and append to the store.
///
/// Takes a single form-encoded `email` field; callers using the hidden
/// channel never parse the answer, but it is well formed anyway.
// Handlers must be async to satisfy axum even without awaits inside.
#[allow(clippy::unused_async)]
pub async fn store_subscribe(
    State(state): State<StoreState>,
    headers: HeaderMap,
    Form(form): Form<StoreForm>,
) -> (StatusCode, Json<StoreResponse>) {
    log_undeclared_origin(&headers, &state.config.allowed_origins);

    let email = form.email.trim();
    if !is_valid_email(email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(StoreResponse::new("error", Some("Invalid email"))),
        );
    }

    match state.store.add(email) {
        Ok(AddOutcome::Added) => (StatusCode::OK, Json(StoreResponse::new("ok", None))),
        Ok(AddOutcome::Duplicate) => (
            StatusCode::OK,
            Json(StoreResponse::new("duplicate", Some("Already registered"))),
        ),
        Err(e) => {
            log::error!("failed to append signup: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StoreResponse::new("error", Some("Storage error"))),
            )
        }
    }
}

/// `GET /` — liveness probe.
#[allow(clippy::unused_async)]
pub async fn health() -> Json<StoreResponse> {
    Json(StoreResponse::new("ok", Some("Service is running")))
}

/// The origin allow-list is declared configuration only: mismatches are
/// logged for operators but requests are not rejected.
fn log_undeclared_origin(headers: &HeaderMap, allowed_origins: &[String]) {
    if allowed_origins.is_empty() {
        return;
    }
    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok())
        && !allowed_origins.iter().any(|allowed| allowed == origin)
    {
        log::warn!("signup from undeclared origin: {origin}");
    }
}
