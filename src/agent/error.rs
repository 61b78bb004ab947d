//! Agent error taxonomy

use crate::assistants::{RemoteError, RunStatus};
use std::time::Duration;
use thiserror::Error;

/// Which half of the identity pair failed to come up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPart {
    Assistant,
    Thread,
}

impl std::fmt::Display for IdentityPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityPart::Assistant => f.write_str("assistant"),
            IdentityPart::Thread => f.write_str("thread"),
        }
    }
}

/// Errors produced by the agent
#[derive(Debug, Error)]
pub enum AgentError {
    /// Missing or empty token/assistant id. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Assistant or thread could not be established; retry `initialize`
    #[error("Failed to initialize the {part}: {source}")]
    Initialization {
        part: IdentityPart,
        #[source]
        source: RemoteError,
    },

    /// Credentials were replaced while an initialization was in flight
    #[error("Credentials changed during initialization; initialize again")]
    CredentialsChanged,

    /// Chat attempted without an assistant/thread pair
    #[error("The assistant or the thread is not initialized")]
    NotInitialized,

    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),

    /// Run reached a failure, cancellation or expiry status
    #[error("The assistant run ended with status {status}{}", detail_suffix(.detail.as_deref()))]
    RunFailed {
        status: RunStatus,
        detail: Option<String>,
    },

    /// Polling exceeded the configured bound
    #[error(
        "The assistant did not finish within {}s ({attempts} status checks)",
        .waited.as_secs()
    )]
    Timeout { waited: Duration, attempts: u32 },

    /// The agent is shutting down
    #[error("The request was cancelled because the agent is shutting down")]
    Cancelled,
}

fn detail_suffix(detail: Option<&str>) -> String {
    match detail {
        Some(d) => format!(": {d}"),
        None => String::new(),
    }
}

impl AgentError {
    /// Text shown to the person on the other end of a chat turn
    pub fn user_message(&self) -> String {
        match self {
            AgentError::NotInitialized => {
                "Error: the assistant or the thread is not initialized correctly.".to_string()
            }
            AgentError::Remote(e) => {
                format!("An error occurred while processing your request: {e}")
            }
            other => format!("Error: {other}"),
        }
    }
}
