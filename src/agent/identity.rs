//! Concurrent setup of the assistant/thread pair

use super::credentials::Identity;
use super::error::{AgentError, IdentityPart};
use crate::assistants::{AssistantsApi, RemoteError};
use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Fetch the assistant and create a thread at the same time.
///
/// Both calls are spawned as independent tasks and both are awaited before
/// anything is decided. If either fails the whole pair is discarded.
pub async fn establish_identity(
    client: Arc<dyn AssistantsApi>,
    assistant_id: &str,
    cancel: &CancellationToken,
) -> Result<Identity, AgentError> {
    let assistant_task = {
        let client = client.clone();
        let assistant_id = assistant_id.to_string();
        tokio::spawn(async move { client.fetch_assistant(&assistant_id).await })
    };
    let thread_task = tokio::spawn(async move { client.create_thread().await });

    let assistant_abort = assistant_task.abort_handle();
    let thread_abort = thread_task.abort_handle();

    let (assistant, thread) = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            assistant_abort.abort();
            thread_abort.abort();
            return Err(AgentError::Cancelled);
        }
        results = async { tokio::join!(assistant_task, thread_task) } => results,
    };

    let assistant = flatten(assistant);
    let thread = flatten(thread);

    match (assistant, thread) {
        (Ok(assistant), Ok(thread)) => {
            tracing::info!(
                assistant_id = %assistant.id,
                assistant_name = ?assistant.name,
                model = %assistant.model,
                thread_id = %thread.id,
                "Assistant and thread initialized"
            );
            Ok(Identity { assistant, thread })
        }
        (Err(source), thread) => {
            if let Ok(thread) = thread {
                tracing::warn!(
                    thread_id = %thread.id,
                    "Discarding thread created during failed initialization"
                );
            }
            Err(AgentError::Initialization {
                part: IdentityPart::Assistant,
                source,
            })
        }
        (Ok(assistant), Err(source)) => {
            tracing::warn!(
                assistant_id = %assistant.id,
                "Discarding assistant fetched during failed initialization"
            );
            Err(AgentError::Initialization {
                part: IdentityPart::Thread,
                source,
            })
        }
    }
}

fn flatten<T>(joined: Result<Result<T, RemoteError>, JoinError>) -> Result<T, RemoteError> {
    joined.unwrap_or_else(|e| Err(RemoteError::unknown(format!("initialization task failed: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistants::testing::{Call, MockAssistantsApi};
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_initialization_runs_calls_concurrently() {
        let mock = Arc::new(
            MockAssistantsApi::new()
                .with_init_delays(Duration::from_millis(100), Duration::from_millis(200)),
        );

        let start = Instant::now();
        let identity = establish_identity(mock.clone(), "asst_1", &CancellationToken::new())
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(identity.assistant.id, "asst_1");
        assert_eq!(identity.thread.id, "thread_mock_1");
        assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(250), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_assistant_failure_discards_thread() {
        let mock = Arc::new(
            MockAssistantsApi::new()
                .with_init_delays(Duration::from_millis(10), Duration::from_millis(50)),
        );
        mock.fail_fetch_assistant(RemoteError::network("connection refused"));

        let err = establish_identity(mock.clone(), "asst_1", &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            AgentError::Initialization { part, source } => {
                assert_eq!(part, IdentityPart::Assistant);
                assert_eq!(source.message, "connection refused");
            }
            other => panic!("expected initialization error, got {other:?}"),
        }
        // The thread call still ran to completion before the decision was made
        assert_eq!(mock.count_calls(|c| *c == Call::CreateThread), 1);
    }

    #[tokio::test]
    async fn test_thread_failure_is_reported() {
        let mock = Arc::new(MockAssistantsApi::new());
        mock.fail_create_thread(RemoteError::server_error("Server error: boom"));

        let err = establish_identity(mock, "asst_1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::Initialization {
                part: IdentityPart::Thread,
                ..
            }
        ));
        assert_eq!(err.to_string(), "Failed to initialize the thread: Server error: boom");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_initialization() {
        let mock = Arc::new(
            MockAssistantsApi::new()
                .with_init_delays(Duration::from_secs(30), Duration::from_secs(30)),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = establish_identity(mock, "asst_1", &cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
