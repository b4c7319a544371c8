//! HTTP surface: the page's actions as stateless JSON endpoints.
//!
//! | Method | Path | Body | Answer |
//! |--------|------|------|--------|
//! | POST | `/api/extract-pdf-text` | multipart, part `file` | `{text}` |
//! | POST | `/api/review-paper` | review request + `providerConfig` | `{review}` |
//! | POST | `/api/polish-text` | polish request + `providerConfig` | `{polishedText}` |
//! | POST | `/api/generate-pdf` | `{markdown}` | `application/pdf` attachment |
//! | GET  | `/api/check-api-config` | | `{configured}` |
//! | GET  | `/healthz` | | `ok` |
//!
//! Failures answer `{error, details}` with the status given by
//! [`status_for`].

use crate::config::{AssistantConfig, ProviderConfig};
use crate::error::AssistantError;
use crate::pipeline::engine::PdfEngine;
use crate::pipeline::extract;
use crate::pipeline::llm::ModelGateway;
use crate::prompts;
use crate::request::{PolishRequest, ReviewRequest};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Slack on top of the upload limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared, read-only state behind every handler.
#[derive(Clone)]
pub struct AppState {
    gateway: ModelGateway,
    engine: Option<PdfEngine>,
    config: Arc<AssistantConfig>,
}

impl AppState {
    /// Without an `engine` the PDF endpoints answer 503 and everything else
    /// works normally.
    pub fn new(config: AssistantConfig, engine: Option<PdfEngine>) -> Result<Self, AssistantError> {
        Ok(Self {
            gateway: ModelGateway::new(&config)?,
            engine,
            config: Arc::new(config),
        })
    }

    fn engine(&self) -> Result<&PdfEngine, AssistantError> {
        self.engine
            .as_ref()
            .ok_or_else(|| AssistantError::PdfiumBindingFailed("PDF engine not started".into()))
    }

    /// The request's own provider settings, else the server default.
    fn provider(&self, supplied: Option<ProviderConfig>) -> Result<ProviderConfig, AssistantError> {
        supplied
            .filter(ProviderConfig::has_key)
            .or_else(|| self.config.default_provider.clone())
            .ok_or(AssistantError::ConfigMissing)
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;
    Router::new()
        .route("/api/extract-pdf-text", post(extract_pdf_text))
        .route("/api/review-paper", post(review_paper))
        .route("/api/polish-text", post(polish_text))
        .route("/api/generate-pdf", post(generate_pdf))
        .route("/api/check-api-config", get(check_api_config))
        .route("/healthz", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

// ── Bodies ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewPaperBody {
    #[serde(flatten)]
    request: ReviewRequest,
    #[serde(default, alias = "apiConfig")]
    provider_config: Option<ProviderConfig>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolishTextBody {
    #[serde(flatten)]
    request: PolishRequest,
    #[serde(default, alias = "apiConfig")]
    provider_config: Option<ProviderConfig>,
}

#[derive(Deserialize)]
struct GeneratePdfBody {
    markdown: String,
}

#[derive(Serialize)]
struct ExtractAnswer {
    text: String,
}

#[derive(Serialize)]
struct ReviewAnswer {
    review: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PolishAnswer {
    polished_text: String,
}

#[derive(Serialize)]
struct ConfigAnswer {
    configured: bool,
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn extract_pdf_text(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractAnswer>, AssistantError> {
    let mut multipart = multipart.map_err(|e| AssistantError::UploadFailure {
        reason: e.body_text(),
    })?;
    let bytes = read_file_part(&mut multipart, state.config.max_upload_bytes).await?;
    extract::check_signature(&bytes)?;
    let text = state.engine()?.extract(bytes).await?;
    Ok(Json(ExtractAnswer { text }))
}

/// Stream the `file` part, logging progress in 10 % steps when the client
/// declared a length.
async fn read_file_part(multipart: &mut Multipart, limit: usize) -> Result<Vec<u8>, AssistantError> {
    let upload_err = |reason: String| AssistantError::UploadFailure { reason };

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_err(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let declared = field
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        debug!(
            "Receiving '{}' ({} bytes declared)",
            field.file_name().unwrap_or("upload"),
            declared.map_or_else(|| "no".to_string(), |n| n.to_string())
        );

        let mut bytes = Vec::new();
        let mut logged = 0usize;
        while let Some(chunk) = field.chunk().await.map_err(|e| upload_err(e.body_text()))? {
            if bytes.len() + chunk.len() > limit {
                return Err(upload_err(format!(
                    "file exceeds the {} MiB upload limit",
                    limit / (1024 * 1024)
                )));
            }
            bytes.extend_from_slice(&chunk);
            if let Some(total) = declared.filter(|t| *t > 0) {
                let percent = (bytes.len() * 100 / total).min(100);
                if percent >= logged + 10 {
                    logged = percent - percent % 10;
                    debug!("Upload {}%", logged);
                }
            }
        }
        debug!("Upload complete: {} bytes", bytes.len());
        return Ok(bytes);
    }

    Err(upload_err("no `file` part in the request".into()))
}

async fn review_paper(
    State(state): State<AppState>,
    body: Result<Json<ReviewPaperBody>, JsonRejection>,
) -> Result<Json<ReviewAnswer>, AssistantError> {
    let Json(body) = body.map_err(invalid_json)?;
    if body.request.document_text.trim().is_empty() {
        return Err(AssistantError::InvalidRequest("documentText is empty".into()));
    }
    let provider = state.provider(body.provider_config)?;

    let prompt = prompts::review_prompt(&body.request);
    let response = state.gateway.call(&provider, &prompt).await?;
    Ok(Json(ReviewAnswer {
        review: response.text,
    }))
}

async fn polish_text(
    State(state): State<AppState>,
    body: Result<Json<PolishTextBody>, JsonRejection>,
) -> Result<Json<PolishAnswer>, AssistantError> {
    let Json(body) = body.map_err(invalid_json)?;
    if body.request.text.trim().is_empty() {
        return Err(AssistantError::InvalidRequest("text is empty".into()));
    }
    let provider = state.provider(body.provider_config)?;

    let prompt = prompts::polish_prompt(&body.request);
    let response = state.gateway.call(&provider, &prompt).await?;
    Ok(Json(PolishAnswer {
        polished_text: response.text,
    }))
}

async fn generate_pdf(
    State(state): State<AppState>,
    body: Result<Json<GeneratePdfBody>, JsonRejection>,
) -> Result<Response, AssistantError> {
    let Json(body) = body.map_err(invalid_json)?;
    let bytes = state.engine()?.render(body.markdown).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"review.pdf\""),
        ],
        bytes,
    )
        .into_response())
}

async fn check_api_config(State(state): State<AppState>) -> Json<ConfigAnswer> {
    Json(ConfigAnswer {
        configured: state.config.default_provider.is_some(),
    })
}

fn invalid_json(rejection: JsonRejection) -> AssistantError {
    AssistantError::InvalidRequest(rejection.body_text())
}

// ── Errors ───────────────────────────────────────────────────────────────

/// HTTP status for each error kind.
pub fn status_for(err: &AssistantError) -> StatusCode {
    match err {
        AssistantError::ConfigMissing
        | AssistantError::UploadFailure { .. }
        | AssistantError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        AssistantError::EmptyContent | AssistantError::ParseFailure { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AssistantError::UpstreamError { .. } => StatusCode::BAD_GATEWAY,
        AssistantError::PdfiumBindingFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        AssistantError::InvalidConfig(_)
        | AssistantError::Storage { .. }
        | AssistantError::RenderFailure(_)
        | AssistantError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AssistantError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }
        let body = json!({
            "error": self.summary(),
            "details": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
