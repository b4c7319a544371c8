//! Locating, downloading and binding libpdfium.
//!
//! Resolution order for [`bind`]:
//!
//! 1. an explicit path (`--pdfium-lib-path` / [`AssistantConfig::pdfium_lib_path`])
//! 2. `PDFIUM_LIB_PATH`, when it names an existing file
//! 3. the per-version cache directory filled by [`download_library`]
//! 4. the system library search path
//!
//! Binding never touches the network. The download is a separate async step
//! the binary runs at startup, with its own progress reporting.
//!
//! [`AssistantConfig::pdfium_lib_path`]: crate::config::AssistantConfig::pdfium_lib_path

use crate::error::AssistantError;
use pdfium_render::prelude::Pdfium;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The bblanchon/pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

const RELEASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Release asset and library location for one OS/arch pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Asset name in the release, e.g. `pdfium-linux-x64.tgz`.
    pub archive: &'static str,
    /// Path of the library inside the archive.
    pub member: &'static str,
    /// File name written into the cache directory.
    pub file_name: &'static str,
}

impl Platform {
    /// The platform this binary runs on.
    pub fn current() -> Result<Self, AssistantError> {
        Self::for_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn for_target(os: &str, arch: &str) -> Result<Self, AssistantError> {
        let (archive, member, file_name) = match (os, arch) {
            ("macos", "aarch64") => ("pdfium-mac-arm64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib"),
            ("macos", "x86_64") => ("pdfium-mac-x64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib"),
            ("linux", "x86_64") => ("pdfium-linux-x64.tgz", "lib/libpdfium.so", "libpdfium.so"),
            ("linux", "aarch64") => ("pdfium-linux-arm64.tgz", "lib/libpdfium.so", "libpdfium.so"),
            ("windows", "x86_64") => ("pdfium-win-x64.tgz", "bin/pdfium.dll", "pdfium.dll"),
            ("windows", "aarch64") => ("pdfium-win-arm64.tgz", "bin/pdfium.dll", "pdfium.dll"),
            ("windows", "x86") => ("pdfium-win-x86.tgz", "bin/pdfium.dll", "pdfium.dll"),
            (os, arch) => {
                return Err(AssistantError::PdfiumBindingFailed(format!(
                    "no prebuilt pdfium for {os}/{arch}"
                )))
            }
        };
        Ok(Self {
            archive,
            member,
            file_name,
        })
    }

    fn url(&self) -> String {
        format!("{RELEASE_URL}/chromium%2F{PDFIUM_VERSION}/{}", self.archive)
    }
}

/// Per-version cache directory.
///
/// `$PDFIUM_CACHE_DIR/pdfium-{VERSION}` when set, otherwise
/// `<user cache dir>/paper-review-assistant/pdfium-{VERSION}`.
pub fn cache_dir() -> PathBuf {
    let version_dir = format!("pdfium-{PDFIUM_VERSION}");
    if let Ok(dir) = std::env::var("PDFIUM_CACHE_DIR") {
        return PathBuf::from(dir).join(version_dir);
    }
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("paper-review-assistant")
        .join(version_dir)
}

/// An already-present libpdfium, without any network access.
pub fn cached_library() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        let p = PathBuf::from(p);
        if p.exists() {
            return Some(p);
        }
    }
    let platform = Platform::current().ok()?;
    Some(cache_dir().join(platform.file_name)).filter(|p| p.exists())
}

/// Bind pdfium following the resolution order in the module docs.
pub fn bind(explicit: Option<&Path>) -> Result<Pdfium, AssistantError> {
    if let Some(path) = explicit.map(Path::to_path_buf).or_else(cached_library) {
        debug!("Binding pdfium from {}", path.display());
        return Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| {
                AssistantError::PdfiumBindingFailed(format!("{}: {e}", path.display()))
            });
    }
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| AssistantError::PdfiumBindingFailed(format!("no cached or system library: {e}")))
}

/// Make sure a libpdfium is cached, downloading it when absent.
///
/// `on_progress` receives `(bytes_downloaded, total_bytes)` for every chunk.
/// The library file appears atomically, so an interrupted download leaves
/// no half-written file behind.
pub async fn download_library(
    on_progress: impl Fn(u64, Option<u64>),
) -> Result<PathBuf, AssistantError> {
    if let Some(path) = cached_library() {
        return Ok(path);
    }
    let platform = Platform::current()?;
    let dir = cache_dir();
    let target = dir.join(platform.file_name);
    let fail = |what: String| AssistantError::PdfiumBindingFailed(what);

    let url = platform.url();
    info!("Downloading pdfium from {}", url);
    let client = reqwest::Client::builder()
        .user_agent(concat!("paper-review-assistant/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| fail(e.to_string()))?;
    let mut response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| fail(format!("GET {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(fail(format!("HTTP {} for {url}", response.status())));
    }

    let total = response.content_length();
    let mut archive = Vec::with_capacity(total.unwrap_or(32 * 1024 * 1024) as usize);
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| fail(format!("read error: {e}")))?
    {
        archive.extend_from_slice(&chunk);
        on_progress(archive.len() as u64, total);
    }

    let member = platform.member;
    let library = tokio::task::spawn_blocking(move || extract_member(&archive, member))
        .await
        .map_err(|e| fail(format!("extraction task: {e}")))??;

    std::fs::create_dir_all(&dir).map_err(|e| fail(format!("{}: {e}", dir.display())))?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| fail(e.to_string()))?;
    tmp.write_all(&library).map_err(|e| fail(e.to_string()))?;
    tmp.persist(&target).map_err(|e| fail(e.error.to_string()))?;

    info!("Cached pdfium at {} ({} bytes)", target.display(), library.len());
    Ok(target)
}

/// Read one file out of a gzipped tar archive.
pub fn extract_member(archive: &[u8], member: &str) -> Result<Vec<u8>, AssistantError> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let bad = |e: std::io::Error| AssistantError::PdfiumBindingFailed(format!("archive: {e}"));
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    for entry in tar.entries().map_err(bad)? {
        let mut entry = entry.map_err(bad)?;
        if entry.path().map_err(bad)?.to_string_lossy() == member {
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes).map_err(bad)?;
            return Ok(bytes);
        }
    }
    Err(AssistantError::PdfiumBindingFailed(format!(
        "'{member}' not found in archive"
    )))
}
