//! # paper-review-assistant
//!
//! Peer-review drafting and academic language polishing for PDF papers,
//! backed by any OpenAI- or Claude-compatible completion API.
//!
//! ## Flow
//!
//! ```text
//! settings ──▶ ConfigStore (apiConfig)
//!
//! PDF upload
//!  │
//!  ├─ 1. Extract  pdfium text extraction on the engine thread
//!  ├─ 2. Prompt   review template from field / focus / strictness / …
//!  ├─ 3. Call     one completion request, no retry
//!  ├─ 4. Clean    fence stripping and whitespace normalisation
//!  └─ 5. Render   Markdown review → review.pdf
//!
//! free text ──▶ polish prompt ──▶ call ──▶ polished text
//! ```
//!
//! Two front ends share the pipeline: [`PageController`] keeps one user's
//! page state in process, and [`server`] exposes the same actions as
//! stateless HTTP endpoints.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper_review_assistant::{
//!     AssistantConfig, Field, FileStore, PageController, PdfEngine, ProviderConfig,
//!     ProviderKind, ReviewOptions,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AssistantConfig::default();
//!     let engine = PdfEngine::start(&config)?;
//!     let store = Arc::new(FileStore::new("storage.json"));
//!     let mut page = PageController::new(&config, store, Some(engine))?;
//!
//!     page.save_settings(&ProviderConfig::new(ProviderKind::OpenAi, "sk-..."))?;
//!     let pdf = tokio::fs::File::open("paper.pdf").await?;
//!     let len = pdf.metadata().await?.len();
//!     page.upload(pdf, len).await?;
//!
//!     let review = page.review(ReviewOptions::new(Field::Biology)).await?;
//!     println!("{review}");
//!     page.download_review(std::path::Path::new(".")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `review-assistant` server binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod request;
pub mod server;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AssistantConfig, AssistantConfigBuilder, ProviderConfig, ProviderKind};
pub use controller::PageController;
pub use error::AssistantError;
pub use pipeline::engine::PdfEngine;
pub use pipeline::llm::{CompletionBackend, ModelGateway};
pub use progress::{NoopProgressCallback, ProgressCallback, ProgressHandle, SyntheticProgress, Task};
pub use request::{
    DetailLevel, Field, Language, ModelResponse, PaperType, PolishRequest, ReviewFocus,
    ReviewOptions, ReviewRequest,
};
pub use server::{router, serve, AppState};
pub use store::{ConfigStore, FileStore, MemoryStore};
