//! The PDF engine: one OS thread that owns the pdfium binding.
//!
//! pdfium keeps thread-local state and its handles borrow from the binding,
//! so nothing pdfium-related crosses an `.await`. Instead every extraction or
//! render is shipped as a [`Job`] over a channel to a dedicated thread, and
//! the async caller awaits a oneshot reply. Jobs run strictly one at a time,
//! which also gives each conversion a fresh document and no shared cache.

use crate::config::AssistantConfig;
use crate::error::AssistantError;
use crate::pipeline::{extract, library, render};
use pdfium_render::prelude::Pdfium;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

type Reply<T> = oneshot::Sender<Result<T, AssistantError>>;

enum Job {
    Extract { bytes: Vec<u8>, reply: Reply<String> },
    Render { markdown: String, reply: Reply<Vec<u8>> },
}

/// Handle to the PDF engine thread. Cheap to clone and share.
#[derive(Clone)]
pub struct PdfEngine {
    jobs: mpsc::Sender<Job>,
}

impl std::fmt::Debug for PdfEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfEngine").finish_non_exhaustive()
    }
}

impl PdfEngine {
    /// Bind pdfium and start the engine thread.
    ///
    /// Blocks until the binding succeeded or failed, so call it from startup
    /// code or `spawn_blocking`. Library lookup follows
    /// [`library::bind`]; nothing is downloaded here.
    pub fn start(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let lib_path = config.pdfium_lib_path.clone();
        let font = config.pdf_font.clone();
        let (jobs, inbox) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AssistantError>>();

        std::thread::Builder::new()
            .name("pdfium".into())
            .spawn(move || {
                let pdfium = match library::bind(lib_path.as_deref()) {
                    Ok(p) => {
                        let _ = ready_tx.send(Ok(()));
                        p
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                run(&pdfium, font.as_deref(), inbox);
            })
            .map_err(|e| AssistantError::Internal(format!("Failed to spawn PDF engine: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| AssistantError::Internal("PDF engine exited during startup".into()))??;

        info!("PDF engine ready");
        Ok(Self { jobs })
    }

    /// Extract plain text from PDF bytes.
    ///
    /// # Errors
    /// * [`AssistantError::ParseFailure`] — not a PDF, corrupt, or encrypted
    /// * [`AssistantError::EmptyContent`] — no extractable text
    pub async fn extract(&self, bytes: Vec<u8>) -> Result<String, AssistantError> {
        extract::check_signature(&bytes)?;
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Extract { bytes, reply })?;
        rx.await.map_err(|_| stopped())?
    }

    /// Render Markdown into a new PDF document.
    ///
    /// # Errors
    /// [`AssistantError::RenderFailure`] for blank input or any engine error.
    pub async fn render(&self, markdown: impl Into<String>) -> Result<Vec<u8>, AssistantError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Render {
            markdown: markdown.into(),
            reply,
        })?;
        rx.await.map_err(|_| stopped())?
    }

    fn submit(&self, job: Job) -> Result<(), AssistantError> {
        self.jobs.send(job).map_err(|_| stopped())
    }
}

fn stopped() -> AssistantError {
    AssistantError::Internal("PDF engine has stopped".into())
}

fn run(pdfium: &Pdfium, font: Option<&Path>, inbox: mpsc::Receiver<Job>) {
    for job in inbox {
        match job {
            Job::Extract { bytes, reply } => {
                debug!("Extracting text from {} bytes", bytes.len());
                let result = guarded("extraction", || extract::extract_blocking(pdfium, &bytes));
                let _ = reply.send(result);
            }
            Job::Render { markdown, reply } => {
                debug!("Rendering {} chars of markdown", markdown.len());
                let result = guarded("render", || render::render_blocking(pdfium, &markdown, font));
                let _ = reply.send(result);
            }
        }
    }
    debug!("PDF engine inbox closed");
}

/// Run one job, turning a pdfium panic into an error scoped to that job.
fn guarded<T>(
    what: &str,
    f: impl FnOnce() -> Result<T, AssistantError>,
) -> Result<T, AssistantError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        error!("PDF {what} panicked");
        Err(AssistantError::Internal(format!("PDF {what} panicked")))
    })
}

