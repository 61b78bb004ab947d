//! HTTP front end: chat endpoint plus the bundled web UI

mod assets;
mod handlers;

pub use handlers::create_router;

use crate::agent::{Agent, AgentError};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    /// Keeps concurrent requests from each re-initializing the agent
    init_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self {
            agent,
            init_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Initialize the agent if an earlier attempt failed. Only one request
    /// at a time does the work; the rest wait and reuse a successful result.
    pub async fn ensure_initialized(&self) -> Result<(), AgentError> {
        if self.agent.is_initialized() || self.agent.is_shut_down() {
            return Ok(());
        }
        let _guard = self.init_lock.lock().await;
        if self.agent.is_initialized() {
            return Ok(());
        }
        self.agent.initialize().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Lazy initialization failed");
        })
    }
}
