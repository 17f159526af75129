//! HTTP routing for built static files.
//!
//! Requests under the static prefix are resolved against
//! `<public_root>/<prefix>`: files are streamed with [`ServeFile`],
//! directories get an HTML index. Everything else answers 404.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Router,
};
use percent_encoding::percent_decode_str;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::listing;
use super::matcher::StaticMatcher;
use crate::static_url::StaticPrefix;

/// Shared state for the static router
#[derive(Debug, Clone)]
pub struct ServeState {
    pub matcher: StaticMatcher,
    /// Directory matched paths resolve against
    pub document_root: PathBuf,
}

impl ServeState {
    /// Serve `<public_root>/<prefix>` under `prefix`
    pub fn new(public_root: &Path, prefix: StaticPrefix) -> Self {
        let document_root = if prefix.is_root() {
            public_root.to_path_buf()
        } else {
            public_root.join(prefix.as_str())
        };
        Self {
            matcher: StaticMatcher::new(prefix),
            document_root,
        }
    }
}

/// Build the router serving the static output tree
pub fn build_router(state: ServeState) -> Router {
    Router::new()
        .fallback(serve_static)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn serve_static(State(state): State<ServeState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let Some(relative) = state.matcher.match_path(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(target) = resolve(&state.document_root, relative) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if target.is_dir() {
        // Listing links are relative to the directory
        if !path.ends_with('/') {
            return Redirect::permanent(&format!("{path}/")).into_response();
        }
        return match listing::render_listing(&path, &target) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                warn!(path = %target.display(), error = %e, "Failed to list directory");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };
    }

    match ServeFile::new(&target).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

/// Map a matched relative path to an existing file or directory under `root`.
///
/// Rejects parent segments and anything that escapes `root` through links.
fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let decoded: Cow<'_, str> = percent_decode_str(relative).decode_utf8().ok()?;
    let clean = decoded.trim_matches('/');
    if clean.split('/').any(|segment| segment == "..") || clean.contains('\\') {
        return None;
    }

    let root_canonical = root.canonicalize().ok()?;
    let canonical = root.join(clean).canonicalize().ok()?;
    canonical
        .starts_with(&root_canonical)
        .then_some(canonical)
}
