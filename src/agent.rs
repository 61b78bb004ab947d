//! Conversation agent
//!
//! One assistant/thread pair per agent. `initialize` establishes the pair,
//! `chat` runs one turn against it and always answers with text.

mod credentials;
mod error;
mod identity;
mod poller;

#[cfg(test)]
mod proptests;

pub use credentials::{CredentialStore, Credentials, Identity};
pub use error::{AgentError, IdentityPart};
pub use poller::{PollConfig, RunPoller};

use crate::assistants::{AssistantsApi, ClientFactory, Message, RemoteError, Role};
use identity::establish_identity;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Reply used when a completed run left no assistant text on the thread
pub const NO_REPLY: &str = "Error: no reply from the assistant was found.";

/// Long-lived orchestrator shared by the HTTP handlers or the console
pub struct Agent {
    store: CredentialStore,
    poll: PollConfig,
    /// Serializes turns: one run in flight per thread
    turn_lock: Mutex<()>,
    shutdown: CancellationToken,
}

impl Agent {
    pub fn new(
        credentials: Credentials,
        factory: Arc<dyn ClientFactory>,
        poll: PollConfig,
    ) -> Result<Self, AgentError> {
        Ok(Self {
            store: CredentialStore::new(credentials, factory)?,
            poll,
            turn_lock: Mutex::new(()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Establish a fresh assistant/thread pair for the current credentials.
    ///
    /// Any previous pair is dropped first; on failure the agent stays
    /// uninitialized until the next successful call.
    pub async fn initialize(&self) -> Result<(), AgentError> {
        if self.shutdown.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        self.store.clear_identity();

        let snapshot = self.store.snapshot();
        let assistant_id = snapshot
            .credentials
            .assistant_id
            .clone()
            .ok_or_else(|| AgentError::Configuration("assistant id is not set".to_string()))?;

        let identity =
            establish_identity(snapshot.client.clone(), &assistant_id, &self.shutdown).await?;

        if self.store.install_identity(snapshot.generation, identity) {
            Ok(())
        } else {
            Err(AgentError::CredentialsChanged)
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.store.snapshot().identity.is_some()
    }

    pub fn identity(&self) -> Option<Arc<Identity>> {
        self.store.snapshot().identity.clone()
    }

    pub fn credentials(&self) -> Credentials {
        self.store.current()
    }

    /// Replace the API token. The agent must be initialized again.
    pub fn set_token(&self, token: impl Into<String>) -> Result<(), AgentError> {
        self.store.set_token(token)
    }

    /// Replace the assistant id. The agent must be initialized again.
    pub fn set_assistant_id(&self, assistant_id: impl Into<String>) -> Result<(), AgentError> {
        self.store.set_assistant_id(assistant_id)
    }

    /// Run one chat turn. Failures come back as reply text.
    pub async fn chat(&self, message: &str) -> String {
        match self.run_turn(message).await {
            Ok(reply) => reply,
            Err(failure) => {
                tracing::warn!(error = %failure.error, "Chat turn failed");
                redact(
                    &failure.error.user_message(),
                    failure.identity.as_deref().map(identity_ids).into_iter().flatten(),
                )
            }
        }
    }

    /// Run one chat turn, keeping the error typed
    pub async fn try_chat(&self, message: &str) -> Result<String, AgentError> {
        self.run_turn(message).await.map_err(|failure| failure.error)
    }

    /// Reply text for an error raised outside a chat turn, such as a failed
    /// lazy initialization
    pub fn failure_reply(&self, error: &AgentError) -> String {
        let snapshot = self.store.snapshot();
        let configured = snapshot.credentials.assistant_id.as_deref();
        let installed = snapshot.identity.as_deref().map(identity_ids);
        redact(
            &error.user_message(),
            configured.into_iter().chain(installed.into_iter().flatten()),
        )
    }

    async fn run_turn(&self, message: &str) -> Result<String, TurnFailure> {
        if self.shutdown.is_cancelled() {
            return Err(AgentError::Cancelled.into());
        }

        let _turn = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Err(AgentError::Cancelled.into()),
            guard = self.turn_lock.lock() => guard,
        };

        // Taken after the lock so a turn never runs on a pair replaced while it waited
        let snapshot = self.store.snapshot();
        let identity = snapshot.identity.clone().ok_or(AgentError::NotInitialized)?;
        let result = self.turn(&*snapshot.client, &identity, message).await;
        result.map_err(|error| TurnFailure {
            error,
            identity: Some(identity),
        })
    }

    async fn turn(
        &self,
        client: &dyn AssistantsApi,
        identity: &Identity,
        message: &str,
    ) -> Result<String, AgentError> {
        let thread_id = identity.thread.id.as_str();
        let turn_id = uuid::Uuid::new_v4();

        tracing::info!(turn_id = %turn_id, chars = message.chars().count(), "Chat turn started");

        self.cancellable(client.post_message(thread_id, Role::User, message))
            .await?;
        let run = self
            .cancellable(client.create_run(thread_id, &identity.assistant.id))
            .await?;

        let outcome = RunPoller::new(client, &self.poll, &self.shutdown)
            .drive(run)
            .await?;

        let messages = self.cancellable(client.list_messages(thread_id)).await?;
        let reply = latest_reply(&messages, &outcome.run.id);

        tracing::info!(
            turn_id = %turn_id,
            ticks = outcome.ticks,
            found_reply = reply.is_some(),
            "Chat turn finished"
        );

        Ok(reply.unwrap_or_else(|| NO_REPLY.to_string()))
    }

    /// Cancel in-flight turns and refuse new ones
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!("Agent shutting down");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    async fn cancellable<T>(
        &self,
        call: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, AgentError> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(AgentError::Cancelled),
            result = call => result.map_err(AgentError::Remote),
        }
    }
}

/// Newest assistant message with text, skipping anything written by other runs.
/// `messages` is newest first.
fn latest_reply(messages: &[Message], run_id: &str) -> Option<String> {
    messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .filter(|m| m.run_id.as_deref().map_or(true, |id| id == run_id))
        .find_map(Message::text)
}

/// A failed turn together with the pair it ran against
struct TurnFailure {
    error: AgentError,
    identity: Option<Arc<Identity>>,
}

impl From<AgentError> for TurnFailure {
    fn from(error: AgentError) -> Self {
        Self {
            error,
            identity: None,
        }
    }
}

fn identity_ids(identity: &Identity) -> [&str; 2] {
    [identity.thread.id.as_str(), identity.assistant.id.as_str()]
}

/// Strip assistant and thread ids from text shown to the user
fn redact<'a>(text: &str, ids: impl IntoIterator<Item = &'a str>) -> String {
    ids.into_iter()
        .filter(|id| !id.is_empty())
        .fold(text.to_string(), |acc, id| acc.replace(id, "[redacted]"))
}
