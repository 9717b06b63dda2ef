//! HTTP implementation of the answering-service client

use super::{Backend, BackendError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Bound on a single backend call; there is no retry
pub const BACKEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Sentinel used when a JSON error body carries no `message` field
const NO_MESSAGE: &str = "no message";

/// Client for the single configured answering-service endpoint
pub struct HttpBackend {
    client: Client,
    endpoint: String,
}

impl HttpBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(BACKEND_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn send(
        &self,
        session_id: &str,
        interview_id: &str,
        message: &str,
    ) -> Result<String, BackendError> {
        let envelope = Envelope {
            route: "next",
            payload: Payload {
                session_id,
                interview_id,
                user_message: message,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::transport(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    BackendError::transport(format!("connection failed: {e}"))
                } else {
                    BackendError::transport(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::transport(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }

        extract_reply(&body)
    }
}

/// Request envelope for the single-route backend protocol
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    route: &'static str,
    payload: Payload<'a>,
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    session_id: &'a str,
    interview_id: &'a str,
    user_message: &'a str,
}

/// Pull the reply text out of a success body.
///
/// The reply is the `message` string field; a body without one is
/// re-serialized wholesale so the participant always sees something. A
/// body that is not JSON at all counts as a malformed response.
fn extract_reply(body: &str) -> Result<String, BackendError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| BackendError::transport(format!("malformed response body: {e}")))?;

    match value.get("message").and_then(Value::as_str) {
        Some(message) => Ok(message.to_string()),
        None => Ok(value.to_string()),
    }
}

/// Classify a non-success response.
///
/// The gateway usually answers errors with JSON; tolerate anything. A
/// JSON body yields its `message` field (or the fixed sentinel when it
/// has none), a non-JSON body is passed through raw.
fn classify_error(status: u16, body: &str) -> BackendError {
    let detail = match serde_json::from_str::<Value>(body) {
        Ok(value) => value
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| NO_MESSAGE.to_string(), ToString::to_string),
        Err(_) => body.to_string(),
    };

    BackendError::http(status, detail)
}
