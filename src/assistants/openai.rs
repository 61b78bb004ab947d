//! `OpenAI` Assistants API (v2) client

use super::types::{
    AssistantRef, Message, MessageContent, Role, RunError, RunHandle, RunStatus, ThreadRef,
};
use super::{AssistantsApi, RemoteError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Page size for message listing. The reply is always among the newest
/// entries, so one page is enough.
const MESSAGE_PAGE_SIZE: u32 = 20;

/// HTTP client for the assistants endpoints
pub struct OpenAIAssistantsClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIAssistantsClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RemoteError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                RemoteError::network(format!("Connection failed: {e}"))
            } else {
                RemoteError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status, &body, retry_after));
        }

        serde_json::from_str(&body)
            .map_err(|e| RemoteError::malformed(format!("Failed to parse response: {e}")))
    }
}

/// Map an HTTP failure to an error kind, preferring the API's own message
fn classify_error(
    status: reqwest::StatusCode,
    body: &str,
    retry_after: Option<Duration>,
) -> RemoteError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status.as_u16() {
        401 | 403 => RemoteError::auth(format!("Authentication failed: {message}")),
        404 => RemoteError::not_found(format!("Not found: {message}")),
        429 => {
            let err = RemoteError::rate_limit(format!("Rate limited: {message}"));
            match retry_after {
                Some(duration) => err.with_retry_after(duration),
                None => err,
            }
        }
        400 => RemoteError::invalid_request(format!("Invalid request: {message}")),
        500..=599 => RemoteError::server_error(format!("Server error: {message}")),
        _ => RemoteError::unknown(format!("HTTP {status}: {message}")),
    }
}

#[async_trait]
impl AssistantsApi for OpenAIAssistantsClient {
    async fn fetch_assistant(&self, assistant_id: &str) -> Result<AssistantRef, RemoteError> {
        let assistant: WireAssistant = self
            .send(self.request(Method::GET, &format!("/assistants/{assistant_id}")))
            .await?;
        Ok(assistant.into())
    }

    async fn create_thread(&self) -> Result<ThreadRef, RemoteError> {
        let thread: WireThread = self
            .send(self.request(Method::POST, "/threads").json(&serde_json::json!({})))
            .await?;
        Ok(thread.into())
    }

    async fn post_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, RemoteError> {
        let request = CreateMessageRequest {
            role: role.as_str(),
            content,
        };
        let message: WireMessage = self
            .send(
                self.request(Method::POST, &format!("/threads/{thread_id}/messages"))
                    .json(&request),
            )
            .await?;
        Ok(message.into())
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunHandle, RemoteError> {
        let run: WireRun = self
            .send(
                self.request(Method::POST, &format!("/threads/{thread_id}/runs"))
                    .json(&CreateRunRequest { assistant_id }),
            )
            .await?;
        Ok(run.into())
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunHandle, RemoteError> {
        let run: WireRun = self
            .send(self.request(Method::GET, &format!("/threads/{thread_id}/runs/{run_id}")))
            .await?;
        Ok(run.into())
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<RunHandle, RemoteError> {
        let run: WireRun = self
            .send(self.request(
                Method::POST,
                &format!("/threads/{thread_id}/runs/{run_id}/cancel"),
            ))
            .await?;
        Ok(run.into())
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, RemoteError> {
        let limit = MESSAGE_PAGE_SIZE.to_string();
        let page: WireList<WireMessage> = self
            .send(
                self.request(Method::GET, &format!("/threads/{thread_id}/messages"))
                    .query(&[("order", "desc"), ("limit", limit.as_str())]),
            )
            .await?;
        Ok(page.data.into_iter().map(Message::from).collect())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct WireAssistant {
    id: String,
    name: Option<String>,
    model: String,
    instructions: Option<String>,
}

impl From<WireAssistant> for AssistantRef {
    fn from(a: WireAssistant) -> Self {
        AssistantRef {
            id: a.id,
            name: a.name,
            model: a.model,
            instructions: a.instructions,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireThread {
    id: String,
    created_at: Option<i64>,
}

impl From<WireThread> for ThreadRef {
    fn from(t: WireThread) -> Self {
        ThreadRef {
            id: t.id,
            created_at: t.created_at.and_then(timestamp),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireRun {
    id: String,
    thread_id: String,
    assistant_id: String,
    status: RunStatus,
    last_error: Option<WireRunError>,
}

#[derive(Debug, Deserialize)]
struct WireRunError {
    code: String,
    message: String,
}

impl From<WireRun> for RunHandle {
    fn from(r: WireRun) -> Self {
        RunHandle {
            id: r.id,
            thread_id: r.thread_id,
            assistant_id: r.assistant_id,
            status: r.status,
            last_error: r.last_error.map(|e| RunError {
                code: e.code,
                message: e.message,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    role: Role,
    #[serde(default)]
    content: Vec<Value>,
    run_id: Option<String>,
    created_at: Option<i64>,
}

impl From<WireMessage> for Message {
    fn from(m: WireMessage) -> Self {
        Message {
            id: m.id,
            role: m.role,
            content: m.content.iter().map(content_part).collect(),
            run_id: m.run_id,
            created_at: m.created_at.and_then(timestamp),
        }
    }
}

/// Content parts are a tagged union that keeps growing; only `text` is
/// interpreted and every other variant is kept as an opaque kind.
fn content_part(part: &Value) -> MessageContent {
    let kind = part.get("type").and_then(Value::as_str).unwrap_or("unknown");
    if kind == "text" {
        if let Some(text) = part.pointer("/text/value").and_then(Value::as_str) {
            return MessageContent::Text(text.to_string());
        }
    }
    MessageContent::Other {
        kind: kind.to_string(),
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}
