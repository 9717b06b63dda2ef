//! Service configuration from environment variables

use crate::session::{ConsentMode, DEFAULT_MAX_TURNS};

/// Fallback endpoint for local development against a stub backend
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:9000/chat";

/// Runtime configuration, read once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Answering-service endpoint URL
    pub backend_url: String,
    /// Port the HTTP server listens on
    pub port: u16,
    /// Turn budget applied to every new session
    pub max_turns: usize,
    /// Whether sessions require an explicit pre-chat consent decision
    pub consent_mode: ConsentMode,
}

impl Config {
    pub fn from_env() -> Self {
        let backend_url = match std::env::var("STUDY_CHAT_BACKEND_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => {
                tracing::warn!(
                    default = DEFAULT_BACKEND_URL,
                    "STUDY_CHAT_BACKEND_URL not set, using local default"
                );
                DEFAULT_BACKEND_URL.to_string()
            }
        };

        let port = std::env::var("STUDY_CHAT_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        let max_turns = std::env::var("STUDY_CHAT_MAX_TURNS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_TURNS);

        let consent_mode = match std::env::var("STUDY_CHAT_CONSENT").as_deref() {
            Ok("banner") => ConsentMode::Banner,
            Ok("explicit") | Err(_) => ConsentMode::Explicit,
            Ok(other) => {
                tracing::warn!(value = other, "Unknown STUDY_CHAT_CONSENT, using explicit");
                ConsentMode::Explicit
            }
        };

        Self {
            backend_url,
            port,
            max_turns,
            consent_mode,
        }
    }
}
