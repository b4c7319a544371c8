//! Shared fixtures: a fake completion provider and server helpers.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use paper_review_assistant::{AssistantConfig, PdfEngine};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// One request as the fake provider saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Local stand-in for an OpenAI- or Claude-compatible provider.
///
/// Routes, relative to `base()`:
/// * `/v1/chat/completions` — OpenAI shape, fenced Markdown answer
/// * `/v1/messages` — legacy Claude `completion` field
/// * `/messages-api/v1/messages` — Claude Messages-API content blocks
/// * `/fail/...` — HTTP 500
/// * `/empty/...` — 200 without the expected field
#[derive(Clone)]
pub struct FakeProvider {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<Seen>>>,
}

pub const OPENAI_ANSWER: &str = "```markdown\n# Overall Evaluation\r\nSolid work.   \n\n\n\n# Final Recommendation\nMinor Revision\n```";
pub const OPENAI_CLEANED: &str = "# Overall Evaluation\nSolid work.\n\n\n# Final Recommendation\nMinor Revision";
pub const CLAUDE_ANSWER: &str = "The results are robust.";

impl FakeProvider {
    pub async fn start() -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/v1/chat/completions", post(record))
            .route("/v1/messages", post(record))
            .route("/messages-api/v1/messages", post(record))
            .route("/fail/v1/chat/completions", post(record))
            .route("/fail/v1/messages", post(record))
            .route("/empty/v1/chat/completions", post(record))
            .route("/empty/v1/messages", post(record))
            .with_state(seen.clone());
        let addr = spawn(app).await;
        Self { addr, seen }
    }

    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last(&self) -> Seen {
        self.seen().pop().expect("provider received no request")
    }
}

async fn record(
    State(seen): State<Arc<Mutex<Vec<Seen>>>>,
    uri: axum::http::Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let path = uri.path().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    seen.lock().unwrap().push(Seen {
        path: path.clone(),
        headers,
        body,
    });

    if path.starts_with("/fail") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }
    if path.starts_with("/empty") {
        return Json(json!({"id": "x", "choices": []})).into_response();
    }
    if path.starts_with("/messages-api") {
        return Json(json!({
            "content": [{"type": "text", "text": CLAUDE_ANSWER}],
            "stop_reason": "end_turn"
        }))
        .into_response();
    }
    if path.ends_with("/messages") {
        return Json(json!({"completion": CLAUDE_ANSWER})).into_response();
    }
    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": OPENAI_ANSWER}}]
    }))
    .into_response()
}

/// Serve `app` on an ephemeral local port.
pub async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Start the PDF engine on the locally available libpdfium.
///
/// Only `#[ignore]`d tests call this, so a missing library fails the run
/// instead of passing silently.
pub fn pdf_engine() -> PdfEngine {
    let lib = paper_review_assistant::pipeline::library::cached_library()
        .expect("libpdfium not available: set PDFIUM_LIB_PATH or run the server once");
    let config = AssistantConfig::builder()
        .pdfium_lib_path(lib)
        .build()
        .unwrap();
    PdfEngine::start(&config).expect("pdfium found but failed to bind")
}
