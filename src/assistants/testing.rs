//! Mock assistants service for testing
//!
//! Plays back queued run statuses and replies without any network I/O.

use super::*;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A recorded call against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchAssistant(String),
    CreateThread,
    PostMessage { thread_id: String, content: String },
    CreateRun { thread_id: String, assistant_id: String },
    GetRun { run_id: String },
    CancelRun { run_id: String },
    ListMessages { thread_id: String },
}

/// Mock service with scripted run progress
#[allow(dead_code)]
pub struct MockAssistantsApi {
    fetch_assistant_delay: Duration,
    create_thread_delay: Duration,
    get_run_delay: Duration,
    fetch_assistant_error: Mutex<Option<RemoteError>>,
    create_thread_error: Mutex<Option<RemoteError>>,
    post_message_error: Mutex<Option<RemoteError>>,
    initial_status: Mutex<RunStatus>,
    statuses: Mutex<VecDeque<RunStatus>>,
    run_error: Mutex<Option<RunError>>,
    replies: Mutex<VecDeque<Vec<MessageContent>>>,
    /// Thread contents, oldest first
    thread: Mutex<Vec<Message>>,
    calls: Mutex<Vec<Call>>,
    thread_seq: AtomicU32,
    run_seq: AtomicU32,
    message_seq: AtomicU32,
}

#[allow(dead_code)]
impl MockAssistantsApi {
    pub fn new() -> Self {
        Self {
            fetch_assistant_delay: Duration::ZERO,
            create_thread_delay: Duration::ZERO,
            get_run_delay: Duration::ZERO,
            fetch_assistant_error: Mutex::new(None),
            create_thread_error: Mutex::new(None),
            post_message_error: Mutex::new(None),
            initial_status: Mutex::new(RunStatus::Queued),
            statuses: Mutex::new(VecDeque::new()),
            run_error: Mutex::new(None),
            replies: Mutex::new(VecDeque::new()),
            thread: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            thread_seq: AtomicU32::new(0),
            run_seq: AtomicU32::new(0),
            message_seq: AtomicU32::new(0),
        }
    }

    /// Artificial latency for the two initialization calls
    pub fn with_init_delays(mut self, fetch_assistant: Duration, create_thread: Duration) -> Self {
        self.fetch_assistant_delay = fetch_assistant;
        self.create_thread_delay = create_thread;
        self
    }

    /// Artificial latency for every `get_run`
    pub fn with_get_run_delay(mut self, delay: Duration) -> Self {
        self.get_run_delay = delay;
        self
    }

    /// Status reported by `create_run`
    pub fn with_initial_status(self, status: RunStatus) -> Self {
        *self.initial_status.lock().unwrap() = status;
        self
    }

    pub fn fail_fetch_assistant(&self, error: RemoteError) {
        *self.fetch_assistant_error.lock().unwrap() = Some(error);
    }

    pub fn fail_create_thread(&self, error: RemoteError) {
        *self.create_thread_error.lock().unwrap() = Some(error);
    }

    pub fn fail_post_message(&self, error: RemoteError) {
        *self.post_message_error.lock().unwrap() = Some(error);
    }

    /// Queue statuses returned by successive `get_run` calls. Once the queue
    /// is drained the run reports `in_progress` forever.
    pub fn queue_statuses(&self, statuses: impl IntoIterator<Item = RunStatus>) {
        self.statuses.lock().unwrap().extend(statuses);
    }

    /// Error attached to runs that end in failure
    pub fn set_run_error(&self, code: &str, message: &str) {
        *self.run_error.lock().unwrap() = Some(RunError {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    /// Queue a text reply, appended to the thread when the next run completes
    pub fn queue_reply(&self, text: &str) {
        self.queue_reply_content(vec![MessageContent::Text(text.to_string())]);
    }

    pub fn queue_reply_content(&self, content: Vec<MessageContent>) {
        self.replies.lock().unwrap().push_back(content);
    }

    /// Put a message on the thread directly, as if written by an earlier run
    pub fn push_thread_message(&self, message: Message) {
        self.thread.lock().unwrap().push(message);
    }

    pub fn recorded_calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_message_id(&self) -> String {
        format!("msg_{}", self.message_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn complete_run(&self, thread_id: &str, run_id: &str) {
        if let Some(content) = self.replies.lock().unwrap().pop_front() {
            let message = Message {
                id: self.next_message_id(),
                role: Role::Assistant,
                content,
                run_id: Some(run_id.to_string()),
                created_at: None,
            };
            tracing::trace!(thread_id, run_id, "mock run produced reply");
            self.thread.lock().unwrap().push(message);
        }
    }

    fn run_handle(
        &self,
        thread_id: &str,
        run_id: &str,
        assistant_id: &str,
        status: RunStatus,
    ) -> RunHandle {
        let last_error = if status.is_failure() {
            self.run_error.lock().unwrap().clone()
        } else {
            None
        };
        RunHandle {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            assistant_id: assistant_id.to_string(),
            status,
            last_error,
        }
    }
}

impl Default for MockAssistantsApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssistantsApi for MockAssistantsApi {
    async fn fetch_assistant(&self, assistant_id: &str) -> Result<AssistantRef, RemoteError> {
        self.record(Call::FetchAssistant(assistant_id.to_string()));
        tokio::time::sleep(self.fetch_assistant_delay).await;
        if let Some(err) = self.fetch_assistant_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(AssistantRef {
            id: assistant_id.to_string(),
            name: Some("Mock Assistant".to_string()),
            model: "mock-model".to_string(),
            instructions: None,
        })
    }

    async fn create_thread(&self) -> Result<ThreadRef, RemoteError> {
        self.record(Call::CreateThread);
        tokio::time::sleep(self.create_thread_delay).await;
        if let Some(err) = self.create_thread_error.lock().unwrap().clone() {
            return Err(err);
        }
        let n = self.thread_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ThreadRef {
            id: format!("thread_mock_{n}"),
            created_at: None,
        })
    }

    async fn post_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, RemoteError> {
        self.record(Call::PostMessage {
            thread_id: thread_id.to_string(),
            content: content.to_string(),
        });
        if let Some(err) = self.post_message_error.lock().unwrap().clone() {
            return Err(err);
        }
        let message = Message {
            id: self.next_message_id(),
            role,
            content: vec![MessageContent::Text(content.to_string())],
            run_id: None,
            created_at: None,
        };
        self.thread.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunHandle, RemoteError> {
        self.record(Call::CreateRun {
            thread_id: thread_id.to_string(),
            assistant_id: assistant_id.to_string(),
        });
        let run_id = format!("run_mock_{}", self.run_seq.fetch_add(1, Ordering::SeqCst) + 1);
        let status = *self.initial_status.lock().unwrap();
        if status.is_success() {
            self.complete_run(thread_id, &run_id);
        }
        Ok(self.run_handle(thread_id, &run_id, assistant_id, status))
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunHandle, RemoteError> {
        self.record(Call::GetRun {
            run_id: run_id.to_string(),
        });
        tokio::time::sleep(self.get_run_delay).await;
        let status = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RunStatus::InProgress);
        if status.is_success() {
            self.complete_run(thread_id, run_id);
        }
        Ok(self.run_handle(thread_id, run_id, "asst_mock", status))
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<RunHandle, RemoteError> {
        self.record(Call::CancelRun {
            run_id: run_id.to_string(),
        });
        Ok(self.run_handle(thread_id, run_id, "asst_mock", RunStatus::Cancelling))
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, RemoteError> {
        self.record(Call::ListMessages {
            thread_id: thread_id.to_string(),
        });
        Ok(self.thread.lock().unwrap().iter().rev().cloned().collect())
    }
}

/// Factory handing out one shared mock regardless of token
pub struct MockClientFactory {
    client: Arc<MockAssistantsApi>,
    /// Tokens the factory was asked to build clients for
    pub tokens: Mutex<Vec<String>>,
}

impl MockClientFactory {
    pub fn new(client: Arc<MockAssistantsApi>) -> Self {
        Self {
            client,
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn built_tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

impl ClientFactory for MockClientFactory {
    fn build(&self, api_token: &str) -> Result<Arc<dyn AssistantsApi>, RemoteError> {
        self.tokens.lock().unwrap().push(api_token.to_string());
        Ok(self.client.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_plays_back_statuses_then_reply() {
        let mock = MockAssistantsApi::new();
        mock.queue_statuses([RunStatus::InProgress, RunStatus::Completed]);
        mock.queue_reply("Hello back");

        let thread = mock.create_thread().await.unwrap();
        mock.post_message(&thread.id, Role::User, "Hello").await.unwrap();
        let run = mock.create_run(&thread.id, "asst_1").await.unwrap();
        assert_eq!(run.status, RunStatus::Queued);

        assert_eq!(
            mock.get_run(&thread.id, &run.id).await.unwrap().status,
            RunStatus::InProgress
        );
        // No reply while the run is still going
        assert_eq!(mock.list_messages(&thread.id).await.unwrap().len(), 1);

        assert_eq!(
            mock.get_run(&thread.id, &run.id).await.unwrap().status,
            RunStatus::Completed
        );
        let messages = mock.list_messages(&thread.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].text().as_deref(), Some("Hello back"));
    }

    #[tokio::test]
    async fn test_mock_errors_are_sticky() {
        let mock = MockAssistantsApi::new();
        mock.fail_fetch_assistant(RemoteError::network("down"));

        assert!(mock.fetch_assistant("asst_1").await.is_err());
        assert!(mock.fetch_assistant("asst_1").await.is_err());
        assert_eq!(
            mock.count_calls(|c| matches!(c, Call::FetchAssistant(_))),
            2
        );
    }
}
