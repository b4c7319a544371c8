//! Configuration types: the user's provider credentials and the runtime knobs.
//!
//! Two separate structs reflect two separate owners:
//!
//! * [`ProviderConfig`] belongs to the user. It is created in the settings
//!   form, persisted through a [`crate::store::ConfigStore`], and passed
//!   explicitly into every model call.
//! * [`AssistantConfig`] belongs to the operator. It is built once at startup
//!   via [`AssistantConfigBuilder`] and shared read-only by every request.

use crate::error::AssistantError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The closed set of supported provider protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// `POST {base}/v1/chat/completions`, answer in `choices[0].message.content`.
    #[default]
    #[serde(alias = "openai-compatible")]
    OpenAi,
    /// `POST {base}/v1/messages`, answer in the top-level `completion` field.
    #[serde(alias = "anthropic", alias = "claude-compatible")]
    Claude,
}

impl ProviderKind {
    /// Stable lowercase name, identical to the JSON encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-supplied credentials and endpoint overrides for one provider.
///
/// Blank `api_base` / `api_model` strings are legal on the wire (the settings
/// form submits them) and behave exactly like absent values; use
/// [`ProviderConfig::base_url`] and [`ProviderConfig::model`] to read them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_model: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            api_base: None,
            api_model: None,
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.api_model = Some(model.into());
        self
    }

    /// The base-URL override, if one is set and non-blank.
    pub fn base_url(&self) -> Option<&str> {
        non_blank(self.api_base.as_deref())
    }

    /// The model override, if one is set and non-blank.
    pub fn model(&self) -> Option<&str> {
        non_blank(self.api_model.as_deref())
    }

    /// `false` when the key is missing or whitespace only.
    pub fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Server-side default read from `OPENAI_API_KEY`, `OPENAI_API_BASE`
    /// and `OPENAI_API_MODEL`. Returns `None` when no key is set.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("OPENAI_API_KEY").ok()?;
        if key.trim().is_empty() {
            return None;
        }
        Some(Self {
            provider: ProviderKind::OpenAi,
            api_key: key,
            api_base: std::env::var("OPENAI_API_BASE").ok(),
            api_model: std::env::var("OPENAI_API_MODEL").ok(),
        })
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("api_key", &if self.has_key() { "<redacted>" } else { "<empty>" })
            .field("api_base", &self.api_base)
            .field("api_model", &self.api_model)
            .finish()
    }
}

/// Runtime configuration shared by the gateway, the PDF engine and the server.
///
/// Built via [`AssistantConfig::builder()`] or [`AssistantConfig::default()`].
///
/// # Example
/// ```rust
/// use paper_review_assistant::AssistantConfig;
///
/// let config = AssistantConfig::builder()
///     .max_tokens(2000)
///     .temperature(0.3)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 2000);
/// ```
#[derive(Clone)]
pub struct AssistantConfig {
    /// `max_tokens` sent with every completion request. Default: 1000.
    pub max_tokens: u32,

    /// Sampling temperature sent with every completion request. Default: 0.7.
    pub temperature: f64,

    /// Whole-request timeout for provider calls. Default: none, the
    /// transport's own behaviour applies.
    pub request_timeout_secs: Option<u64>,

    /// Largest accepted PDF upload in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// TrueType font used when rendering review PDFs. Default: built-in
    /// Helvetica, which only covers Latin scripts.
    pub pdf_font: Option<PathBuf>,

    /// Explicit libpdfium location. Default: see [`crate::pipeline::library`].
    pub pdfium_lib_path: Option<PathBuf>,

    /// Provider used when an HTTP request carries no `providerConfig`.
    pub default_provider: Option<ProviderConfig>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
            request_timeout_secs: None,
            max_upload_bytes: 50 * 1024 * 1024,
            pdf_font: None,
            pdfium_lib_path: None,
            default_provider: None,
        }
    }
}

impl fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("pdf_font", &self.pdf_font)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("default_provider", &self.default_provider)
            .finish()
    }
}

impl AssistantConfig {
    /// Create a new builder for `AssistantConfig`.
    pub fn builder() -> AssistantConfigBuilder {
        AssistantConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AssistantConfig`].
#[derive(Debug)]
pub struct AssistantConfigBuilder {
    config: AssistantConfig,
}

impl AssistantConfigBuilder {
    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f64) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn pdf_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdf_font = Some(path.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn default_provider(mut self, provider: ProviderConfig) -> Self {
        self.config.default_provider = Some(provider);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssistantConfig, AssistantError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(AssistantError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(AssistantError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(AssistantError::InvalidConfig(
                "request timeout must be ≥ 1s when set".into(),
            ));
        }
        if let Some(ref p) = c.default_provider {
            if !p.has_key() {
                return Err(AssistantError::InvalidConfig(
                    "default provider has an empty API key".into(),
                ));
            }
        }
        Ok(self.config)
    }
}
