//! Pipeline stages behind the review and polish flows.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ extract ──▶ prompts ──▶ llm ──▶ postprocess ──▶ render
//! (bytes)    (pdfium)    (pure)     (HTTP)  (cleanup)       (pdfium)
//! ```
//!
//! 1. [`extract`] — PDF bytes to plain text, rejecting blank documents
//! 2. [`llm`]     — the model gateway; the only stage with network I/O
//! 3. [`postprocess`] — deterministic cleanup of the completion text
//! 4. [`render`]  — Markdown layout and PDF generation
//! 5. [`engine`]  — the single thread that owns pdfium and runs 1 and 4
//!
//! [`library`] finds or downloads the libpdfium the engine binds to.

pub mod engine;
pub mod extract;
pub mod library;
pub mod llm;
pub mod postprocess;
pub mod render;
