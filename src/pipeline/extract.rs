//! PDF text extraction.
//!
//! Runs on the [`crate::pipeline::engine`] thread. Pages are read in order
//! and joined with a newline; a document whose text is blank once trimmed is
//! reported as [`AssistantError::EmptyContent`] rather than an empty success.

use crate::error::AssistantError;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Bytes searched for the `%PDF-` header. Producers may prepend junk.
const SIGNATURE_WINDOW: usize = 1024;

/// Reject input that cannot be a PDF before it reaches pdfium.
pub fn check_signature(bytes: &[u8]) -> Result<(), AssistantError> {
    if bytes.is_empty() {
        return Err(AssistantError::ParseFailure {
            detail: "uploaded file is empty".into(),
        });
    }
    let window = &bytes[..bytes.len().min(SIGNATURE_WINDOW)];
    if window.windows(5).any(|w| w == b"%PDF-") {
        Ok(())
    } else {
        let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
        Err(AssistantError::ParseFailure {
            detail: format!("missing %PDF header (first bytes: {magic:?})"),
        })
    }
}

/// Blocking extraction; call only from the engine thread.
pub(crate) fn extract_blocking(pdfium: &Pdfium, bytes: &[u8]) -> Result<String, AssistantError> {
    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        let detail = if err_str.contains("Password") || err_str.contains("password") {
            "PDF is encrypted and requires a password".to_string()
        } else {
            err_str
        };
        AssistantError::ParseFailure { detail }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let mut texts = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| AssistantError::ParseFailure {
            detail: format!("page {}: {:?}", idx + 1, e),
        })?;
        let content = text.all();
        debug!("Page {}: {} chars", idx + 1, content.len());
        texts.push(content);
    }

    let text = finish_text(&texts.join("\n"))?;
    info!(
        "Extracted {} chars from {} pages",
        text.len(),
        total_pages
    );
    Ok(text)
}

/// Normalise line endings and reject blank output.
pub fn finish_text(raw: &str) -> Result<String, AssistantError> {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    if text.trim().is_empty() {
        return Err(AssistantError::EmptyContent);
    }
    Ok(text)
}
