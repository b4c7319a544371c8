//! Error types for the paper-review-assistant library.
//!
//! Every failure is scoped to the single request that caused it: nothing in
//! this crate is fatal to the process. [`AssistantError`] carries enough
//! detail to log server-side, while [`AssistantError::summary`] gives the
//! short human-readable message shown to the user.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the paper-review-assistant library.
#[derive(Debug, Error)]
pub enum AssistantError {
    // ── Configuration ─────────────────────────────────────────────────────
    /// A model call was attempted without a usable provider configuration.
    #[error("API configuration not found.\nSave a provider and API key in the settings first.")]
    ConfigMissing,

    /// The runtime configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The client-local config store could not be written.
    #[error("Failed to write settings to '{path}': {reason}")]
    Storage { path: PathBuf, reason: String },

    // ── Upload / extraction ───────────────────────────────────────────────
    /// The upload itself failed (missing part, too large, broken stream).
    #[error("File upload failed: {reason}")]
    UploadFailure { reason: String },

    /// The PDF parsed fine but contains no extractable text.
    #[error("PDF file content is empty")]
    EmptyContent,

    /// The uploaded bytes are not a readable PDF.
    #[error("PDF could not be parsed: {detail}")]
    ParseFailure { detail: String },

    // ── Model provider ────────────────────────────────────────────────────
    /// Non-2xx status, transport failure, or malformed body from the provider.
    #[error("Upstream error from '{provider}'{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    UpstreamError {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    // ── PDF generation ────────────────────────────────────────────────────
    /// Markdown could not be turned into a PDF.
    #[error("PDF generation failed: {0}")]
    RenderFailure(String),

    // ── Request validation ────────────────────────────────────────────────
    /// The request body is well-formed JSON but semantically unusable.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AssistantError {
    /// Short message suitable for the `error` field of an API response.
    pub fn summary(&self) -> &'static str {
        match self {
            AssistantError::ConfigMissing => "API configuration not found",
            AssistantError::InvalidConfig(_) => "Invalid configuration",
            AssistantError::Storage { .. } => "Failed to save API configuration",
            AssistantError::UploadFailure { .. } => "File upload failed",
            AssistantError::EmptyContent => "PDF file content is empty",
            AssistantError::ParseFailure { .. } => "PDF processing failed",
            AssistantError::UpstreamError { .. } => "Language model request failed",
            AssistantError::RenderFailure(_) => "PDF generation failed",
            AssistantError::InvalidRequest(_) => "Invalid request",
            AssistantError::PdfiumBindingFailed(_) => "PDF engine unavailable",
            AssistantError::Internal(_) => "Internal error",
        }
    }

    pub(crate) fn upstream(provider: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        AssistantError::UpstreamError {
            provider: provider.to_string(),
            status,
            message: message.into(),
        }
    }
}
