//! Backend error types

use thiserror::Error;

/// Classified failure from the answering service.
///
/// Either the endpoint answered with a non-success status, or the request
/// never produced a decodable response at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend returned HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("transport failure: {detail}")]
    Transport { detail: String },
}

impl BackendError {
    pub fn http(status: u16, detail: impl Into<String>) -> Self {
        Self::Http {
            status,
            detail: detail.into(),
        }
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self::Transport {
            detail: detail.into(),
        }
    }

    /// HTTP status, when the failure was status-classified
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport { .. } => None,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Http { detail, .. } | Self::Transport { detail } => detail,
        }
    }
}
