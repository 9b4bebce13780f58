//! Static asset fallback for the relay's HTTP surface.
//!
//! Serves the conferencing front-end out of the configured document
//! root. Anything that is not a known front-end file gets a landing page
//! confirming the relay is reachable, which doubles as a connectivity
//! check when debugging firewalls.

use crate::signaling::RelayService;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Response};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

const MIME_TYPES: &[(&str, &str)] = &[
    ("ico", "image/x-icon"),
    ("html", "text/html"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("css", "text/css"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("wav", "audio/wav"),
    ("mp3", "audio/mpeg"),
    ("svg", "image/svg+xml"),
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
];

/// Extensions actually served from disk; everything else falls through
/// to the landing page.
const SERVED_EXTENSIONS: &[&str] = &["html", "js", "css"];

const LANDING_PAGE: &str = "<h1>200 - OK</h1>\
    You have successfully reached the rendezvous relay!<br>\
    This page is for connectivity debugging only.<br><br>\
    Click <a href=\"index.html\">here</a> to open the client.";

pub fn mime_for(extension: &str) -> &'static str {
    MIME_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
        .unwrap_or("text/plain")
}

/// Reject any request whose path would escape the document root.
pub fn sanitize_path(path: &str) -> Option<PathBuf> {
    let trimmed = path.trim_start_matches('/');
    let candidate = Path::new(trimmed);

    let mut sanitized = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => sanitized.push(part),
            Component::CurDir => {}
            // `..`, roots and prefixes all point outside the root.
            _ => return None,
        }
    }
    Some(sanitized)
}

pub async fn asset_handler(State(relay): State<RelayService>, uri: Uri) -> Response {
    let path = match uri.path() {
        "/" => "/index.html",
        other => other,
    };

    let Some(relative) = sanitize_path(path) else {
        warn!("Rejected traversal attempt: {path}");
        return (StatusCode::BAD_REQUEST, "invalid path").into_response();
    };

    let extension = relative
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_owned();

    if !SERVED_EXTENSIONS.contains(&extension.as_str()) {
        return Html(LANDING_PAGE).into_response();
    }

    let full_path = relay.config().assets_dir.join(&relative);
    debug!("Serving asset {}", full_path.display());

    match tokio::fs::read(&full_path).await {
        Ok(contents) => {
            ([(header::CONTENT_TYPE, mime_for(&extension))], contents).into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "File not found.").into_response()
        }
        Err(e) => {
            warn!("Could not read {}: {e}", full_path.display());
            (StatusCode::INTERNAL_SERVER_ERROR, "Could not read file.").into_response()
        }
    }
}
