//! In-process orchestration of the review page.
//!
//! [`PageController`] holds what a single user's page holds: the saved
//! settings (through a [`ConfigStore`]), the text of the last uploaded
//! document, the last review and the last polished text. Every action runs
//! one sequential chain and either replaces exactly one of those results or
//! leaves all of them untouched.

use crate::config::{AssistantConfig, ProviderConfig};
use crate::error::AssistantError;
use crate::pipeline::engine::PdfEngine;
use crate::pipeline::extract;
use crate::pipeline::llm::ModelGateway;
use crate::progress::{NoopProgressCallback, ProgressHandle, SyntheticProgress, Task};
use crate::prompts;
use crate::request::{PolishRequest, ReviewOptions, ReviewRequest};
use crate::store::ConfigStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info};

/// File name used by [`PageController::download_review`].
pub const REVIEW_FILE_NAME: &str = "review.pdf";

const READ_CHUNK: usize = 64 * 1024;

pub struct PageController {
    store: Arc<dyn ConfigStore>,
    gateway: ModelGateway,
    engine: Option<PdfEngine>,
    progress: ProgressHandle,
    max_upload_bytes: usize,
    document_text: Option<String>,
    review: Option<String>,
    polished: Option<String>,
}

impl PageController {
    /// Create a controller. Without an `engine`, uploads and downloads fail
    /// with [`AssistantError::PdfiumBindingFailed`] while text-only actions
    /// keep working.
    pub fn new(
        config: &AssistantConfig,
        store: Arc<dyn ConfigStore>,
        engine: Option<PdfEngine>,
    ) -> Result<Self, AssistantError> {
        Ok(Self {
            store,
            gateway: ModelGateway::new(config)?,
            engine,
            progress: Arc::new(NoopProgressCallback),
            max_upload_bytes: config.max_upload_bytes,
            document_text: None,
            review: None,
            polished: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressHandle) -> Self {
        self.progress = progress;
        self
    }

    // ── Settings ──────────────────────────────────────────────────────────

    /// Persist the provider settings, replacing any previous ones.
    pub fn save_settings(&self, config: &ProviderConfig) -> Result<(), AssistantError> {
        if !config.has_key() {
            return Err(AssistantError::ConfigMissing);
        }
        self.store.save(config)?;
        info!("Saved {} settings", config.provider);
        Ok(())
    }

    /// The saved settings, pre-filling the settings form.
    pub fn settings(&self) -> Option<ProviderConfig> {
        self.store.load()
    }

    // ── Upload ────────────────────────────────────────────────────────────

    /// Read a PDF from `reader` and extract its text.
    ///
    /// `declared_len` is the size announced by the client and only feeds the
    /// progress percentage; the real limit is `max_upload_bytes`. Upload
    /// progress ends at 100 % whatever the outcome.
    pub async fn upload<R>(&mut self, reader: R, declared_len: u64) -> Result<&str, AssistantError>
    where
        R: AsyncRead + Unpin,
    {
        let read = self.read_upload(reader, declared_len).await;
        self.progress.on_upload_progress(100);
        let bytes = read?;

        let text = self.engine()?.extract(bytes).await.map_err(|e| {
            error!("Extraction failed: {}", e);
            e
        })?;
        self.progress.on_extraction_complete(text.len());
        Ok(self.document_text.insert(text).as_str())
    }

    /// Use text obtained elsewhere as the document to review.
    pub fn set_document_text(&mut self, text: impl Into<String>) -> Result<(), AssistantError> {
        let text = extract::finish_text(&text.into())?;
        self.document_text = Some(text);
        Ok(())
    }

    async fn read_upload<R>(&self, mut reader: R, declared_len: u64) -> Result<Vec<u8>, AssistantError>
    where
        R: AsyncRead + Unpin,
    {
        if declared_len > self.max_upload_bytes as u64 {
            return Err(too_large(self.max_upload_bytes));
        }
        let mut bytes = Vec::with_capacity(declared_len as usize);
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut last_reported = 0u8;

        loop {
            let n = reader
                .read(&mut chunk)
                .await
                .map_err(|e| AssistantError::UploadFailure {
                    reason: e.to_string(),
                })?;
            if n == 0 {
                break;
            }
            if bytes.len() + n > self.max_upload_bytes {
                return Err(too_large(self.max_upload_bytes));
            }
            bytes.extend_from_slice(&chunk[..n]);

            if declared_len > 0 {
                let percent = (bytes.len() as u64 * 100 / declared_len).min(99) as u8;
                if percent > last_reported {
                    last_reported = percent;
                    self.progress.on_upload_progress(percent);
                }
            }
        }

        debug!("Upload read: {} bytes", bytes.len());
        Ok(bytes)
    }

    /// Whether the review form can be shown: a document has been extracted.
    pub fn review_form_ready(&self) -> bool {
        self.document_text.is_some()
    }

    // ── Model calls ───────────────────────────────────────────────────────

    /// Review the extracted document with the saved settings.
    pub async fn review(&mut self, options: ReviewOptions) -> Result<&str, AssistantError> {
        let text = self
            .document_text
            .as_deref()
            .ok_or_else(|| AssistantError::UploadFailure {
                reason: "no document has been uploaded".into(),
            })?;
        let config = self.store.load().ok_or(AssistantError::ConfigMissing)?;

        let prompt = prompts::review_prompt(&ReviewRequest::new(text, options));
        let answer = self.call(Task::Review, &config, &prompt).await?;
        Ok(self.review.insert(answer).as_str())
    }

    /// Polish `request.text` with the saved settings.
    pub async fn polish(&mut self, request: PolishRequest) -> Result<&str, AssistantError> {
        if request.text.trim().is_empty() {
            return Err(AssistantError::InvalidRequest("no text to polish".into()));
        }
        let config = self.store.load().ok_or(AssistantError::ConfigMissing)?;

        let prompt = prompts::polish_prompt(&request);
        let answer = self.call(Task::Polish, &config, &prompt).await?;
        Ok(self.polished.insert(answer).as_str())
    }

    async fn call(
        &self,
        task: Task,
        config: &ProviderConfig,
        prompt: &str,
    ) -> Result<String, AssistantError> {
        let ticker = SyntheticProgress::start(task, Arc::clone(&self.progress));
        let result = self.gateway.call(config, prompt).await;
        ticker.finish(result.is_ok());
        match result {
            Ok(response) => Ok(response.text),
            Err(e) => {
                error!("{} failed: {}", task, e);
                Err(e)
            }
        }
    }

    // ── Download ──────────────────────────────────────────────────────────

    /// Render the last review and write it to `dir/review.pdf`.
    ///
    /// The file appears atomically: readers see either the previous file or
    /// the complete new one.
    pub async fn download_review(&self, dir: &Path) -> Result<PathBuf, AssistantError> {
        let review = self
            .review
            .as_deref()
            .ok_or_else(|| AssistantError::InvalidRequest("no review to download".into()))?;
        let bytes = self.engine()?.render(review).await?;

        let target = dir.join(REVIEW_FILE_NAME);
        let storage_err = |reason: String| AssistantError::Storage {
            path: target.clone(),
            reason,
        };
        std::fs::create_dir_all(dir).map_err(|e| storage_err(e.to_string()))?;
        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| storage_err(e.to_string()))?;
        tmp.write_all(&bytes).map_err(|e| storage_err(e.to_string()))?;
        tmp.persist(&target)
            .map_err(|e| storage_err(e.error.to_string()))?;

        info!("Wrote {} ({} bytes)", target.display(), bytes.len());
        Ok(target)
    }

    // ── State ─────────────────────────────────────────────────────────────

    pub fn document_text(&self) -> Option<&str> {
        self.document_text.as_deref()
    }

    pub fn last_review(&self) -> Option<&str> {
        self.review.as_deref()
    }

    pub fn last_polish(&self) -> Option<&str> {
        self.polished.as_deref()
    }

    fn engine(&self) -> Result<&PdfEngine, AssistantError> {
        self.engine
            .as_ref()
            .ok_or_else(|| AssistantError::PdfiumBindingFailed("PDF engine not started".into()))
    }
}

fn too_large(limit: usize) -> AssistantError {
    AssistantError::UploadFailure {
        reason: format!("file exceeds the {} MiB upload limit", limit / (1024 * 1024)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::request::{Field, Language};
    use crate::store::MemoryStore;

    fn controller(store: Arc<MemoryStore>) -> PageController {
        let config = AssistantConfig::builder()
            .max_upload_bytes(1024)
            .build()
            .unwrap();
        PageController::new(&config, store, None).unwrap()
    }

    #[test]
    fn settings_round_trip_through_store() {
        let store = Arc::new(MemoryStore::new());
        let page = controller(store.clone());
        assert!(page.settings().is_none());

        let cfg = ProviderConfig::new(ProviderKind::Claude, "k");
        page.save_settings(&cfg).unwrap();
        assert_eq!(page.settings(), Some(cfg.clone()));
        assert_eq!(store.load(), Some(cfg));
    }

    #[test]
    fn blank_key_is_not_saved() {
        let page = controller(Arc::new(MemoryStore::new()));
        let err = page
            .save_settings(&ProviderConfig::new(ProviderKind::OpenAi, "  "))
            .unwrap_err();
        assert!(matches!(err, AssistantError::ConfigMissing));
        assert!(page.settings().is_none());
    }

    #[tokio::test]
    async fn review_requires_an_upload() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(&ProviderConfig::new(ProviderKind::OpenAi, "k"))
            .unwrap();
        let mut page = controller(store);
        assert!(!page.review_form_ready());

        let err = page.review(ReviewOptions::new(Field::Biology)).await.unwrap_err();
        assert!(matches!(err, AssistantError::UploadFailure { .. }));
    }

    #[tokio::test]
    async fn review_requires_settings() {
        let mut page = controller(Arc::new(MemoryStore::new()));
        page.set_document_text("Some paper text").unwrap();
        assert!(page.review_form_ready());

        let err = page.review(ReviewOptions::new(Field::Physics)).await.unwrap_err();
        assert!(matches!(err, AssistantError::ConfigMissing));
        assert!(page.last_review().is_none());
    }

    #[tokio::test]
    async fn polish_requires_settings() {
        let mut page = controller(Arc::new(MemoryStore::new()));
        let err = page
            .polish(PolishRequest::new("Text.", Language::English, 40))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::ConfigMissing));
    }

    #[test]
    fn blank_document_text_is_empty_content() {
        let mut page = controller(Arc::new(MemoryStore::new()));
        assert!(matches!(
            page.set_document_text("  \n "),
            Err(AssistantError::EmptyContent)
        ));
        assert!(!page.review_form_ready());
    }

    #[tokio::test]
    async fn oversized_upload_fails_and_pins_progress() {
        use crate::progress::ProgressCallback;
        use std::sync::Mutex;

        #[derive(Default)]
        struct Uploads(Mutex<Vec<u8>>);
        impl ProgressCallback for Uploads {
            fn on_upload_progress(&self, percent: u8) {
                self.0.lock().unwrap().push(percent);
            }
        }

        let uploads = Arc::new(Uploads::default());
        let mut page = controller(Arc::new(MemoryStore::new())).with_progress(uploads.clone());

        let body = vec![b'x'; 4096];
        let err = page.upload(&body[..], 0).await.unwrap_err();
        assert!(matches!(err, AssistantError::UploadFailure { .. }));
        assert_eq!(uploads.0.lock().unwrap().last(), Some(&100));
        assert!(!page.review_form_ready());
    }

    #[tokio::test]
    async fn declared_oversize_is_rejected_before_reading() {
        let mut page = controller(Arc::new(MemoryStore::new()));
        let err = page.upload(&b"%PDF-1.7"[..], 10_000).await.unwrap_err();
        assert!(matches!(err, AssistantError::UploadFailure { .. }));
    }

    #[tokio::test]
    async fn upload_without_engine_is_binding_failure() {
        let mut page = controller(Arc::new(MemoryStore::new()));
        let err = page.upload(&b"%PDF-1.7\n"[..], 9).await.unwrap_err();
        assert!(matches!(err, AssistantError::PdfiumBindingFailed(_)));
    }

    #[tokio::test]
    async fn download_needs_a_review() {
        let page = controller(Arc::new(MemoryStore::new()));
        let dir = tempfile::tempdir().unwrap();
        let err = page.download_review(dir.path()).await.unwrap_err();
        assert!(matches!(err, AssistantError::InvalidRequest(_)));
        assert!(!dir.path().join(REVIEW_FILE_NAME).exists());
    }
}
