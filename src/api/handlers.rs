//! HTTP request handlers

use super::assets::{serve_index, serve_static};
use super::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/chat", post(chat))
        .route("/version", get(get_version))
        // Everything else is a bundled asset
        .fallback(serve_static)
        .with_state(state)
}

/// Plain-text message in, plain-text reply out. Chat-turn and lazy
/// initialization failures are replies too, so they come back with 200.
async fn chat(State(state): State<AppState>, body: String) -> Result<String, AppError> {
    let message = body.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("Message must not be empty".to_string()));
    }
    if state.agent.is_shut_down() {
        return Err(AppError::Unavailable("Server is shutting down".to_string()));
    }

    if let Err(e) = state.ensure_initialized().await {
        return Ok(state.agent.failure_reply(&e));
    }
    Ok(state.agent.chat(message).await)
}

async fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        (status, message).into_response()
    }
}
