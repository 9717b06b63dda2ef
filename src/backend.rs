//! Answering-service abstraction
//!
//! Provides a common interface for the remote answering backend, so the
//! session runtime can run against a mock in tests.

mod error;
mod http;

pub use error::BackendError;
pub use http::{HttpBackend, BACKEND_TIMEOUT};

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for the answering service
#[async_trait]
pub trait Backend: Send + Sync {
    /// Submit one user message and wait for the scripted reply.
    ///
    /// Exactly one of reply or classified error is produced.
    async fn send(
        &self,
        session_id: &str,
        interview_id: &str,
        message: &str,
    ) -> Result<String, BackendError>;
}

#[async_trait]
impl<T: Backend + ?Sized> Backend for Arc<T> {
    async fn send(
        &self,
        session_id: &str,
        interview_id: &str,
        message: &str,
    ) -> Result<String, BackendError> {
        (**self).send(session_id, interview_id, message).await
    }
}

/// Logging wrapper for backend implementations
pub struct LoggingBackend {
    inner: Arc<dyn Backend>,
}

impl LoggingBackend {
    pub fn new(inner: Arc<dyn Backend>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Backend for LoggingBackend {
    async fn send(
        &self,
        session_id: &str,
        interview_id: &str,
        message: &str,
    ) -> Result<String, BackendError> {
        let start = std::time::Instant::now();
        let result = self.inner.send(session_id, interview_id, message).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    session_id = %session_id,
                    interview_id = %interview_id,
                    duration_ms = %duration.as_millis(),
                    reply_len = reply.len(),
                    "Backend call completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    interview_id = %interview_id,
                    duration_ms = %duration.as_millis(),
                    status = ?e.status(),
                    detail = %e.detail(),
                    "Backend call failed"
                );
            }
        }

        result
    }
}
