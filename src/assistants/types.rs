//! Provider-neutral types for assistants, threads, runs and messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured assistant as returned by the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantRef {
    pub id: String,
    pub name: Option<String>,
    pub model: String,
    pub instructions: Option<String>,
}

/// A conversation thread on the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Remote run status.
///
/// Unrecognised values decode to `Unknown` and are treated as still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn is_success(self) -> bool {
        self == Self::Completed
    }

    /// Statuses the run never leaves on its own, or that this agent cannot
    /// act on. `RequiresAction` belongs here because tool outputs are never
    /// submitted, so such a run would only ever expire.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::RequiresAction
                | Self::Cancelling
                | Self::Cancelled
                | Self::Failed
                | Self::Incomplete
                | Self::Expired
        )
    }

    pub fn is_terminal(self) -> bool {
        self.is_success() || self.is_failure()
    }

    /// Ordering used to keep observed progress monotonic.
    pub fn rank(self) -> u8 {
        match self {
            Self::Unknown | Self::Queued => 0,
            Self::InProgress => 1,
            Self::RequiresAction | Self::Cancelling => 2,
            Self::Cancelled
            | Self::Failed
            | Self::Completed
            | Self::Incomplete
            | Self::Expired => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error attached to a run that ended badly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

/// One submitted turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub id: String,
    pub thread_id: String,
    pub assistant_id: String,
    pub status: RunStatus,
    pub last_error: Option<RunError>,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A content part of a thread message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    /// Image files, image urls, refusals and anything else without plain text
    Other { kind: String },
}

/// Message stored on a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: Vec<MessageContent>,
    /// Run that produced the message; `None` for messages posted by the user
    pub run_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Joined text parts, or `None` when the message carries no text at all
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|c| match c {
                MessageContent::Text(text) => Some(text.as_str()),
                MessageContent::Other { .. } => None,
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}
