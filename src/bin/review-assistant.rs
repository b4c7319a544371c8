//! Server binary for paper-review-assistant.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AssistantConfig`, prepares the PDF engine, and serves the HTTP API.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paper_review_assistant::pipeline::library;
use paper_review_assistant::{serve, AppState, AssistantConfig, PdfEngine, ProviderConfig};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default address with a server-side OpenAI key
  OPENAI_API_KEY=sk-... review-assistant

  # Listen on all interfaces, longer answers, CJK-capable PDF font
  review-assistant --addr 0.0.0.0:8080 --max-tokens 4000 \
      --pdf-font /usr/share/fonts/noto/NotoSansCJK-Regular.ttf

  # Route default traffic through an OpenAI-compatible proxy
  OPENAI_API_KEY=sk-... OPENAI_API_BASE=https://proxy.example review-assistant

ENDPOINTS:
  POST /api/extract-pdf-text   multipart `file`        → {text}
  POST /api/review-paper       review options + text   → {review}
  POST /api/polish-text        text, language, level   → {polishedText}
  POST /api/generate-pdf       {markdown}              → review.pdf
  GET  /api/check-api-config                           → {configured}
  GET  /healthz                                        → ok

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          Server-side default key (used when a request has none)
  OPENAI_API_BASE         Base URL for the default provider
  OPENAI_API_MODEL        Model for the default provider
  PDFIUM_LIB_PATH         Path to an existing libpdfium — skips auto-download
  PDFIUM_CACHE_DIR        Override the default pdfium cache directory
  RUST_LOG                Log filter, overrides --verbose / --quiet
"#;

/// Serve the paper review and polishing API.
#[derive(Parser, Debug)]
#[command(
    name = "review-assistant",
    version,
    about = "Serve AI peer-review drafting and academic polishing for PDF papers",
    long_about = "Serve an HTTP API that extracts text from uploaded PDF papers, drafts a \
structured peer review or polishes academic prose through any OpenAI- or Claude-compatible \
completion endpoint, and renders reviews back to PDF.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "REVIEW_ASSISTANT_ADDR", default_value = "127.0.0.1:3000")]
    addr: SocketAddr,

    /// max_tokens sent with every completion request.
    #[arg(long, env = "REVIEW_ASSISTANT_MAX_TOKENS", default_value_t = 1000)]
    max_tokens: u32,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "REVIEW_ASSISTANT_TEMPERATURE", default_value_t = 0.7)]
    temperature: f64,

    /// Provider call timeout in seconds. Unlimited when unset.
    #[arg(long, env = "REVIEW_ASSISTANT_TIMEOUT")]
    timeout: Option<u64>,

    /// Largest accepted PDF upload in MiB.
    #[arg(long, env = "REVIEW_ASSISTANT_MAX_UPLOAD_MB", default_value_t = 50,
          value_parser = clap::value_parser!(u64).range(1..=1024))]
    max_upload_mb: u64,

    /// TrueType font for generated review PDFs (needed for non-Latin output).
    #[arg(long, env = "REVIEW_ASSISTANT_PDF_FONT")]
    pdf_font: Option<PathBuf>,

    /// Use this libpdfium instead of the auto-managed copy.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "REVIEW_ASSISTANT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "REVIEW_ASSISTANT_QUIET")]
    quiet: bool,
}

impl Cli {
    fn to_config(&self) -> Result<AssistantConfig> {
        let mut builder = AssistantConfig::builder()
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .max_upload_bytes((self.max_upload_mb * 1024 * 1024) as usize);
        if let Some(secs) = self.timeout {
            builder = builder.request_timeout_secs(secs);
        }
        if let Some(ref font) = self.pdf_font {
            builder = builder.pdf_font(font);
        }
        if let Some(ref lib) = self.pdfium_lib_path {
            builder = builder.pdfium_lib_path(lib);
        }
        if let Some(provider) = ProviderConfig::from_env() {
            builder = builder.default_provider(provider);
        }
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.to_config()?;
    match config.default_provider {
        Some(ref p) => info!("Default provider: {} ({})", p.provider, p.model().unwrap_or("default model")),
        None => info!("No server-side provider; requests must carry providerConfig"),
    }

    // ── Ensure PDFium engine is available ───────────────────────────────────
    // On the very first run the library (~30 MB) is downloaded to the cache
    // directory; later startups only check the path.
    if config.pdfium_lib_path.is_none() && library::cached_library().is_none() {
        let dl_bar = if cli.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        dl_bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        dl_bar.set_prefix("PDF engine");
        dl_bar.set_message("Connecting…");
        dl_bar.enable_steady_tick(Duration::from_millis(80));

        let bar = dl_bar.clone();
        let downloaded = library::download_library(move |downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        })
        .await;
        match downloaded {
            Ok(_) => dl_bar.finish_with_message("ready ✓"),
            Err(ref e) => {
                dl_bar.abandon_with_message("failed");
                warn!("PDFium download failed: {}", e);
            }
        }
    }

    // A missing engine disables the PDF endpoints, not the whole server.
    let engine_config = config.clone();
    let engine = match tokio::task::spawn_blocking(move || PdfEngine::start(&engine_config))
        .await
        .context("PDF engine startup task panicked")?
    {
        Ok(engine) => Some(engine),
        Err(e) => {
            error!("{}", e);
            warn!("PDF upload and download endpoints will answer 503");
            None
        }
    };

    let state = AppState::new(config, engine).context("Failed to initialise HTTP client")?;
    serve(cli.addr, state)
        .await
        .with_context(|| format!("Server on {} failed", cli.addr))
}
