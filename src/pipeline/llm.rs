//! Model gateway: send one prompt to a provider and normalise the answer.
//!
//! The two supported protocols differ only in four places: the default
//! endpoint, the path appended to a base-URL override, the default model,
//! and where the answer lives in the response body. Each protocol is a
//! [`CompletionBackend`] implementation; [`ProviderKind::backend`] maps the
//! closed enum onto them, so supporting a third provider means one new
//! impl plus one new enum arm.
//!
//! Calls are never retried: a failed call surfaces as
//! [`AssistantError::UpstreamError`] immediately.

use crate::config::{AssistantConfig, ProviderConfig, ProviderKind};
use crate::error::AssistantError;
use crate::pipeline::postprocess;
use crate::request::ModelResponse;
use reqwest::RequestBuilder;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One provider protocol: "send prompt, receive text".
pub trait CompletionBackend: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Public endpoint used when no base URL is configured.
    fn default_endpoint(&self) -> &'static str;

    /// Path appended to a configured base URL.
    fn path_suffix(&self) -> &'static str;

    /// Model used when the config names none.
    fn default_model(&self) -> &'static str;

    /// Attach authentication headers.
    fn authorize(&self, request: RequestBuilder, api_key: &str) -> RequestBuilder {
        request.bearer_auth(api_key)
    }

    /// Pull the completion text out of a parsed response body.
    fn extract_text<'a>(&self, body: &'a Value) -> Option<&'a str>;

    /// Human-readable location of the text, for error messages.
    fn expected_field(&self) -> &'static str;

    /// Full URL for this backend given an optional base override.
    fn endpoint(&self, base: Option<&str>) -> String {
        match base {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), self.path_suffix()),
            None => self.default_endpoint().to_string(),
        }
    }
}

/// OpenAI chat-completions protocol (also served by most proxies and local servers).
pub struct OpenAiCompatible;

impl CompletionBackend for OpenAiCompatible {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn default_endpoint(&self) -> &'static str {
        "https://api.openai.com/v1/chat/completions"
    }

    fn path_suffix(&self) -> &'static str {
        "/v1/chat/completions"
    }

    fn default_model(&self) -> &'static str {
        "gpt-3.5-turbo"
    }

    fn extract_text<'a>(&self, body: &'a Value) -> Option<&'a str> {
        body.get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()
    }

    fn expected_field(&self) -> &'static str {
        "choices[0].message.content"
    }
}

/// Anthropic protocol.
///
/// Reads the top-level `completion` field; when that is absent the
/// Messages-API `content` blocks of type `text` are accepted instead.
pub struct ClaudeCompatible;

impl CompletionBackend for ClaudeCompatible {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn default_endpoint(&self) -> &'static str {
        "https://api.anthropic.com/v1/messages"
    }

    fn path_suffix(&self) -> &'static str {
        "/v1/messages"
    }

    fn default_model(&self) -> &'static str {
        "claude-3-opus-20240229"
    }

    fn authorize(&self, request: RequestBuilder, api_key: &str) -> RequestBuilder {
        request
            .bearer_auth(api_key)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
    }

    fn extract_text<'a>(&self, body: &'a Value) -> Option<&'a str> {
        if let Some(text) = body.get("completion") {
            return text.as_str();
        }
        body.get("content")?
            .as_array()?
            .iter()
            .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))?
            .get("text")?
            .as_str()
    }

    fn expected_field(&self) -> &'static str {
        "completion"
    }
}

static OPENAI_COMPATIBLE: OpenAiCompatible = OpenAiCompatible;
static CLAUDE_COMPATIBLE: ClaudeCompatible = ClaudeCompatible;

impl ProviderKind {
    /// The protocol implementation for this provider.
    pub fn backend(&self) -> &'static dyn CompletionBackend {
        match self {
            ProviderKind::OpenAi => &OPENAI_COMPATIBLE,
            ProviderKind::Claude => &CLAUDE_COMPATIBLE,
        }
    }
}

/// Where a call will go, resolved from a [`ProviderConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub endpoint: String,
    pub model: String,
}

/// Resolve endpoint and model for a provider config without any I/O.
pub fn resolve_target(config: &ProviderConfig) -> Target {
    let backend = config.provider.backend();
    Target {
        endpoint: backend.endpoint(config.base_url()),
        model: config
            .model()
            .unwrap_or_else(|| backend.default_model())
            .to_string(),
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f64,
}

/// Longest slice of an error body kept in an [`AssistantError::UpstreamError`].
const ERROR_EXCERPT_CHARS: usize = 300;

/// HTTP client plus the fixed sampling parameters.
///
/// Cheap to clone; the inner `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct ModelGateway {
    client: reqwest::Client,
    max_tokens: u32,
    temperature: f64,
}

impl ModelGateway {
    pub fn new(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| AssistantError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Send `prompt` as a single user turn and return the cleaned answer.
    ///
    /// # Errors
    /// * [`AssistantError::ConfigMissing`] — blank API key
    /// * [`AssistantError::UpstreamError`] — transport failure, non-2xx
    ///   status, unparsable body, missing or blank completion text
    pub async fn call(
        &self,
        config: &ProviderConfig,
        prompt: &str,
    ) -> Result<ModelResponse, AssistantError> {
        if !config.has_key() {
            return Err(AssistantError::ConfigMissing);
        }

        let backend = config.provider.backend();
        let target = resolve_target(config);
        let start = Instant::now();
        info!(
            "Calling {} model '{}' at {} ({} prompt chars)",
            backend.name(),
            target.model,
            target.endpoint,
            prompt.len()
        );

        let body = ChatRequest {
            model: &target.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let request = backend.authorize(self.client.post(&target.endpoint), config.api_key.trim());
        let response = request.json(&body).send().await.map_err(|e| {
            warn!("{} request failed: {}", backend.name(), e);
            AssistantError::upstream(backend.name(), None, e.to_string())
        })?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| AssistantError::upstream(backend.name(), Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            warn!("{} returned HTTP {}", backend.name(), status);
            return Err(AssistantError::upstream(
                backend.name(),
                Some(status.as_u16()),
                excerpt(&raw),
            ));
        }

        let text = parse_completion(backend, &raw)?;
        debug!(
            "{} answered {} chars in {:?}",
            backend.name(),
            text.len(),
            start.elapsed()
        );
        Ok(ModelResponse { text })
    }
}

/// Parse a successful response body into cleaned completion text.
pub fn parse_completion(
    backend: &dyn CompletionBackend,
    raw: &str,
) -> Result<String, AssistantError> {
    let body: Value = serde_json::from_str(raw).map_err(|e| {
        AssistantError::upstream(backend.name(), None, format!("response is not JSON: {e}"))
    })?;

    let text = backend.extract_text(&body).ok_or_else(|| {
        AssistantError::upstream(
            backend.name(),
            None,
            format!("response missing `{}`", backend.expected_field()),
        )
    })?;

    let cleaned = postprocess::clean_response(text);
    if cleaned.trim().is_empty() {
        return Err(AssistantError::upstream(
            backend.name(),
            None,
            "model returned an empty completion",
        ));
    }
    Ok(cleaned)
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() > ERROR_EXCERPT_CHARS {
        let cut: String = body.chars().take(ERROR_EXCERPT_CHARS - 1).collect();
        format!("{cut}\u{2026}")
    } else if body.is_empty() {
        "empty response body".to_string()
    } else {
        body.to_string()
    }
}
