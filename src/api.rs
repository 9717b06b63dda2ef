//! HTTP API for the study-chat service

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::backend::Backend;
use crate::config::Config;
use crate::runtime::SessionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(backend, config)),
        }
    }
}
