//! Assistants API abstraction
//!
//! A capability-level interface over the remote assistant/thread/run/message
//! service. Implementations never retry; that policy belongs to callers.

mod error;
mod openai;
mod types;

#[cfg(test)]
pub mod testing;

pub use error::{RemoteError, RemoteErrorKind};
pub use openai::{OpenAIAssistantsClient, DEFAULT_BASE_URL};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Common interface for assistant/thread-based chat services
#[async_trait]
pub trait AssistantsApi: Send + Sync {
    /// Fetch an existing assistant by id
    async fn fetch_assistant(&self, assistant_id: &str) -> Result<AssistantRef, RemoteError>;

    /// Create an empty conversation thread
    async fn create_thread(&self) -> Result<ThreadRef, RemoteError>;

    /// Append a message to a thread
    async fn post_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, RemoteError>;

    /// Start the assistant against the current thread state
    async fn create_run(&self, thread_id: &str, assistant_id: &str)
        -> Result<RunHandle, RemoteError>;

    /// Fetch the latest state of a run
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunHandle, RemoteError>;

    /// Ask the service to stop a run that is still going
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<RunHandle, RemoteError>;

    /// Messages on the thread, newest first
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, RemoteError>;
}

#[async_trait]
impl<T: AssistantsApi + ?Sized> AssistantsApi for Arc<T> {
    async fn fetch_assistant(&self, assistant_id: &str) -> Result<AssistantRef, RemoteError> {
        (**self).fetch_assistant(assistant_id).await
    }

    async fn create_thread(&self) -> Result<ThreadRef, RemoteError> {
        (**self).create_thread().await
    }

    async fn post_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, RemoteError> {
        (**self).post_message(thread_id, role, content).await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunHandle, RemoteError> {
        (**self).create_run(thread_id, assistant_id).await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunHandle, RemoteError> {
        (**self).get_run(thread_id, run_id).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<RunHandle, RemoteError> {
        (**self).cancel_run(thread_id, run_id).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, RemoteError> {
        (**self).list_messages(thread_id).await
    }
}

/// Builds a client for a given API token.
///
/// Token rotation goes through here so the client is rebuilt rather than
/// mutated in place.
pub trait ClientFactory: Send + Sync {
    fn build(&self, api_token: &str) -> Result<Arc<dyn AssistantsApi>, RemoteError>;
}

/// Factory for the production HTTP client, wrapped with logging
#[derive(Debug, Clone)]
pub struct OpenAIClientFactory {
    base_url: String,
    request_timeout: Duration,
}

impl OpenAIClientFactory {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout,
        }
    }
}

impl ClientFactory for OpenAIClientFactory {
    fn build(&self, api_token: &str) -> Result<Arc<dyn AssistantsApi>, RemoteError> {
        let client =
            OpenAIAssistantsClient::new(api_token, &self.base_url, self.request_timeout)?;
        Ok(Arc::new(LoggingClient::new(Arc::new(client))))
    }
}

/// Logging wrapper for assistants clients
pub struct LoggingClient {
    inner: Arc<dyn AssistantsApi>,
}

impl LoggingClient {
    pub fn new(inner: Arc<dyn AssistantsApi>) -> Self {
        Self { inner }
    }

    fn record<T>(
        operation: &'static str,
        started: std::time::Instant,
        result: &Result<T, RemoteError>,
    ) {
        let duration = started.elapsed();
        match result {
            Ok(_) => {
                tracing::debug!(
                    operation,
                    duration_ms = %duration.as_millis(),
                    "Assistants API call completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    operation,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    retryable = e.kind.is_retryable(),
                    "Assistants API call failed"
                );
            }
        }
    }
}

#[async_trait]
impl AssistantsApi for LoggingClient {
    async fn fetch_assistant(&self, assistant_id: &str) -> Result<AssistantRef, RemoteError> {
        let start = std::time::Instant::now();
        let result = self.inner.fetch_assistant(assistant_id).await;
        Self::record("fetch_assistant", start, &result);
        result
    }

    async fn create_thread(&self) -> Result<ThreadRef, RemoteError> {
        let start = std::time::Instant::now();
        let result = self.inner.create_thread().await;
        Self::record("create_thread", start, &result);
        result
    }

    async fn post_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, RemoteError> {
        let start = std::time::Instant::now();
        let result = self.inner.post_message(thread_id, role, content).await;
        Self::record("post_message", start, &result);
        result
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunHandle, RemoteError> {
        let start = std::time::Instant::now();
        let result = self.inner.create_run(thread_id, assistant_id).await;
        Self::record("create_run", start, &result);
        result
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunHandle, RemoteError> {
        let start = std::time::Instant::now();
        let result = self.inner.get_run(thread_id, run_id).await;
        Self::record("get_run", start, &result);
        result
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<RunHandle, RemoteError> {
        let start = std::time::Instant::now();
        let result = self.inner.cancel_run(thread_id, run_id).await;
        Self::record("cancel_run", start, &result);
        result
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, RemoteError> {
        let start = std::time::Instant::now();
        let result = self.inner.list_messages(thread_id).await;
        Self::record("list_messages", start, &result);
        result
    }
}
