//! Embedded static assets for the web UI
//!
//! Falls back to the `static/` directory on disk during development.

use axum::{
    body::Body,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use rust_embed::Embed;
use std::path::{Component, Path, PathBuf};

#[derive(Embed)]
#[folder = "static"]
struct Assets;

const INDEX: &str = "index.html";

/// Serve `index.html` for the root path
pub async fn serve_index() -> Response {
    asset_response(INDEX)
}

/// Serve any other bundled file
pub async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { INDEX } else { path };
    asset_response(path)
}

fn asset_response(path: &str) -> Response {
    match load(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                Body::from(content),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

fn load(path: &str) -> Option<Vec<u8>> {
    if let Some(content) = Assets::get(path) {
        return Some(content.data.into_owned());
    }

    // Only plain relative paths may reach the filesystem
    let relative = Path::new(path);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }
    std::fs::read(PathBuf::from("static").join(relative)).ok()
}
