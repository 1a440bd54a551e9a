//! HTTP surface: the annotation engine as a small JSON API behind the gate.
//!
//! Requests are self-contained (text, keywords, pairs and flags travel with
//! each call), so handlers share no mutable state.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use crate::chapters::extract_chapters;
use crate::error::AnnotateError;
use crate::gate::Gate;
use crate::render::render_segments;
use crate::replace::{apply_replacements, ReplacePair};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

pub async fn serve(config: ServerConfig, gate: Gate) -> anyhow::Result<()> {
    let router = app(gate);
    info!(addr = %config.addr, "binding HTTP listener");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

/// The full router: API routes wrapped by the gate.
pub fn app(gate: Gate) -> Router {
    gate.protect(build_router())
}

fn build_router() -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/highlight", post(api_highlight))
        .route("/api/replace", post(api_replace))
        .route("/api/chapters", post(api_chapters))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Debug)]
struct ApiError(AnnotateError);

impl From<AnnotateError> for ApiError {
    fn from(value: AnnotateError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = match &self.0 {
            AnnotateError::EmptyInput { .. } => "empty_input",
            AnnotateError::NoMatch => "no_match",
            AnnotateError::NameConflict { .. } => "name_conflict",
            AnnotateError::ProtectedMode { .. } => "protected_mode",
            AnnotateError::UnknownMode { .. } => "unknown_mode",
            AnnotateError::InvalidIndex { .. } => "invalid_index",
            AnnotateError::InvalidKeyword { .. } => "invalid_keyword",
        };
        let payload = json!({ "error": self.0.to_string(), "kind": kind });
        (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
    }
}

async fn home() -> Html<&'static str> {
    Html(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>rtmark</title></head>\n<body>\n<h1>rtmark</h1>\n<ul>\n<li><code>POST /api/highlight</code> {text, keywords, match_case, whole_words}</li>\n<li><code>POST /api/replace</code> {text, pairs, match_case}</li>\n<li><code>POST /api/chapters</code> {text}</li>\n</ul>\n<p><a href=\"/logout\">Sign out</a></p>\n</body>\n</html>\n",
    )
}

#[derive(Debug, Deserialize)]
struct HighlightRequest {
    text: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    match_case: bool,
    #[serde(default)]
    whole_words: bool,
}

async fn api_highlight(Json(req): Json<HighlightRequest>) -> Result<Json<Value>, ApiError> {
    let mut session = Session::new().with_text(req.text);
    session.set_match_case(req.match_case);
    session.set_whole_words(req.whole_words);
    for keyword in req.keywords.iter().filter(|k| !k.trim().is_empty()) {
        session.add_keyword(keyword)?;
    }
    let spans = session.highlight_spans()?;
    let segments = render_segments(session.text(), &spans);
    Ok(Json(json!({ "spans": spans, "segments": segments })))
}

#[derive(Debug, Deserialize)]
struct ReplaceRequest {
    text: String,
    #[serde(default)]
    pairs: Vec<ReplacePair>,
    #[serde(default)]
    match_case: bool,
}

async fn api_replace(Json(req): Json<ReplaceRequest>) -> Result<Json<Value>, ApiError> {
    let replacement = apply_replacements(&req.text, &req.pairs, req.match_case)?;
    let segments = render_segments(&replacement.text, &replacement.spans);
    Ok(Json(json!({
        "text": replacement.text,
        "count": replacement.count,
        "spans": replacement.spans,
        "segments": segments,
    })))
}

#[derive(Debug, Deserialize)]
struct ChaptersRequest {
    text: String,
}

async fn api_chapters(Json(req): Json<ChaptersRequest>) -> Json<Value> {
    Json(json!({ "chapters": extract_chapters(&req.text) }))
}
