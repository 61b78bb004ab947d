//! Credentials and the derived agent snapshot
//!
//! The token, the assistant id, the client built from the token and the
//! assistant/thread pair are kept together in one immutable snapshot. Writers
//! build a new snapshot and swap it in whole, so readers never see a fresh
//! thread paired with a stale assistant or the other way around.

use super::error::AgentError;
use crate::assistants::{AssistantRef, AssistantsApi, ClientFactory, ThreadRef};
use std::sync::{Arc, PoisonError, RwLock};

/// API token plus the assistant to talk to
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_token: String,
    pub assistant_id: Option<String>,
}

impl Credentials {
    pub fn new(
        api_token: impl Into<String>,
        assistant_id: Option<String>,
    ) -> Result<Self, AgentError> {
        let api_token = non_empty("API token", api_token.into())?;
        let assistant_id = assistant_id
            .map(|id| non_empty("assistant id", id))
            .transpose()?;
        Ok(Self {
            api_token,
            assistant_id,
        })
    }
}

// Keep the token out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_token", &"<redacted>")
            .field("assistant_id", &self.assistant_id)
            .finish()
    }
}

fn non_empty(what: &str, value: String) -> Result<String, AgentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AgentError::Configuration(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Assistant and thread established together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub assistant: AssistantRef,
    pub thread: ThreadRef,
}

/// Consistent view of everything a chat turn needs
pub struct Snapshot {
    pub credentials: Credentials,
    pub client: Arc<dyn AssistantsApi>,
    pub identity: Option<Arc<Identity>>,
    /// Bumped on every credential change
    pub generation: u64,
}

/// Holder of the current snapshot
pub struct CredentialStore {
    factory: Arc<dyn ClientFactory>,
    current: RwLock<Arc<Snapshot>>,
}

impl CredentialStore {
    pub fn new(
        credentials: Credentials,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self, AgentError> {
        let client = build_client(factory.as_ref(), &credentials.api_token)?;
        Ok(Self {
            factory,
            current: RwLock::new(Arc::new(Snapshot {
                credentials,
                client,
                identity: None,
                generation: 0,
            })),
        })
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current(&self) -> Credentials {
        self.snapshot().credentials.clone()
    }

    /// Replace the token. Rebuilds the client and drops the identity.
    pub fn set_token(&self, token: impl Into<String>) -> Result<(), AgentError> {
        let token = non_empty("API token", token.into())?;
        let client = build_client(self.factory.as_ref(), &token)?;
        self.swap(|old| Snapshot {
            credentials: Credentials {
                api_token: token,
                assistant_id: old.credentials.assistant_id.clone(),
            },
            client,
            identity: None,
            generation: old.generation + 1,
        });
        tracing::info!("API token updated; agent must be re-initialized");
        Ok(())
    }

    /// Replace the assistant id. Drops the identity.
    pub fn set_assistant_id(&self, assistant_id: impl Into<String>) -> Result<(), AgentError> {
        let assistant_id = non_empty("assistant id", assistant_id.into())?;
        tracing::info!(
            assistant_id = %assistant_id,
            "Assistant id updated; agent must be re-initialized"
        );
        self.swap(|old| Snapshot {
            credentials: Credentials {
                api_token: old.credentials.api_token.clone(),
                assistant_id: Some(assistant_id),
            },
            client: old.client.clone(),
            identity: None,
            generation: old.generation + 1,
        });
        Ok(())
    }

    /// Forget the identity without touching credentials
    pub fn clear_identity(&self) {
        self.swap(|old| Snapshot {
            credentials: old.credentials.clone(),
            client: old.client.clone(),
            identity: None,
            generation: old.generation,
        });
    }

    /// Adopt an identity built from the snapshot of `generation`.
    ///
    /// Returns false, leaving the store untouched, when the credentials
    /// changed in the meantime.
    pub fn install_identity(&self, generation: u64, identity: Identity) -> bool {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if guard.generation != generation {
            return false;
        }
        *guard = Arc::new(Snapshot {
            credentials: guard.credentials.clone(),
            client: guard.client.clone(),
            identity: Some(Arc::new(identity)),
            generation,
        });
        true
    }

    fn swap(&self, next: impl FnOnce(&Snapshot) -> Snapshot) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let replacement = next(&guard);
        *guard = Arc::new(replacement);
    }
}

fn build_client(
    factory: &dyn ClientFactory,
    token: &str,
) -> Result<Arc<dyn AssistantsApi>, AgentError> {
    factory
        .build(token)
        .map_err(|e| AgentError::Configuration(format!("cannot build API client: {e}")))
}
