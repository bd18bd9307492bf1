/// LLM Client: the single point of entry for all model calls.
///
/// ARCHITECTURAL RULE: no other module talks to a provider API directly. Handlers and
/// the tailoring pipeline only see the `TextGenerator` trait; `LlmClient` is the one
/// implementation and dispatches on `ProviderKind` to the wire format of each backend.
///
/// Retry policy: exactly one retry after a transient failure (connect error, timeout,
/// 429, 5xx). A second transient failure becomes `LlmError::Unavailable`.
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

mod anthropic;
mod ollama;
mod openai;
pub mod prompts;

const MAX_ATTEMPTS: u32 = 2;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const OLLAMA_HOST: &str = "http://localhost:11434";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured for {0}")]
    MissingApiKey(ProviderKind),

    #[error("{provider} rejected the credentials (status {status}): {message}")]
    Auth {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("{provider} unavailable after {attempts} attempts: {message}")]
    Unavailable {
        provider: ProviderKind,
        attempts: u32,
        message: String,
    },

    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("malformed response from {provider}: {message}")]
    Malformed {
        provider: ProviderKind,
        message: String,
    },

    #[error("{0} returned empty content")]
    EmptyContent(ProviderKind),

    #[error("unknown model or provider {0:?}")]
    UnknownModel(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

// ────────────────────────────────────────────────────────────────────────────
// Provider selection
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    Groq,
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Groq,
        ProviderKind::Local,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    pub fn requires_api_key(self) -> bool {
        !matches!(self, ProviderKind::Local)
    }

    pub fn is_local(self) -> bool {
        matches!(self, ProviderKind::Local)
    }

    /// Models offered in the UI picker. Local installs report their own list.
    pub fn suggested_models(self) -> &'static [&'static str] {
        match self {
            ProviderKind::Local => &["phi3:mini", "mistral", "llama2", "codellama", "neural-chat"],
            ProviderKind::Groq => &["llama3-8b-8192", "llama3-70b-8192", "mixtral-8x7b-32768"],
            ProviderKind::OpenAi => &["gpt-3.5-turbo", "gpt-4", "gpt-4-turbo-preview"],
            ProviderKind::Anthropic => &[
                "claude-3-sonnet-20240229",
                "claude-3-haiku-20240307",
                "claude-3-opus-20240229",
            ],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "ollama" => Ok(ProviderKind::Local),
            "groq" => Ok(ProviderKind::Groq),
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            _ => Err(LlmError::UnknownModel(s.to_string())),
        }
    }
}

/// A provider plus an optional model id overriding the provider default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSelection {
    pub provider: ProviderKind,
    pub model: Option<String>,
}

impl ModelSelection {
    pub fn provider(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: None,
        }
    }

    /// Accepts a provider name (`groq`), an explicit `provider:model` pair
    /// (`ollama:mistral`), or a bare model id whose provider is inferred from its
    /// family (`gpt-4`, `claude-3-haiku-20240307`, `llama3-70b-8192`).
    pub fn parse(input: &str) -> Result<Self, LlmError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(LlmError::UnknownModel(input.to_string()));
        }

        if let Ok(provider) = trimmed.parse::<ProviderKind>() {
            return Ok(Self::provider(provider));
        }

        if let Some((prefix, model)) = trimmed.split_once(':') {
            if let Ok(provider) = prefix.parse::<ProviderKind>() {
                let model = model.trim();
                return Ok(Self {
                    provider,
                    model: (!model.is_empty()).then(|| model.to_string()),
                });
            }
        }

        let lower = trimmed.to_ascii_lowercase();
        let provider = if lower.starts_with("gpt") {
            ProviderKind::OpenAi
        } else if lower.starts_with("claude") {
            ProviderKind::Anthropic
        } else if ["llama", "mixtral", "gemma"].iter().any(|f| lower.starts_with(f)) {
            ProviderKind::Groq
        } else {
            return Err(LlmError::UnknownModel(input.to_string()));
        };

        Ok(Self {
            provider,
            model: Some(trimmed.to_string()),
        })
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{}:{model}", self.provider),
            None => write!(f, "{}", self.provider),
        }
    }
}

/// Process-wide provider configuration, read once at startup.
#[derive(Clone)]
pub struct ProviderSettings {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_model: String,
    pub anthropic_model: String,
    pub groq_model: String,
    pub ollama_model: String,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub groq_base_url: String,
    pub ollama_host: String,
    pub hosted_timeout: Duration,
    pub local_timeout: Duration,
    pub retry_backoff: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            openai_model: "gpt-3.5-turbo".to_string(),
            anthropic_model: "claude-3-sonnet-20240229".to_string(),
            groq_model: "llama3-8b-8192".to_string(),
            ollama_model: "phi3:mini".to_string(),
            openai_base_url: OPENAI_BASE_URL.to_string(),
            anthropic_base_url: ANTHROPIC_BASE_URL.to_string(),
            groq_base_url: GROQ_BASE_URL.to_string(),
            ollama_host: OLLAMA_HOST.to_string(),
            hosted_timeout: Duration::from_secs(60),
            local_timeout: Duration::from_secs(120),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl ProviderSettings {
    pub fn api_key(&self, provider: ProviderKind) -> Option<&str> {
        match provider {
            ProviderKind::Local => None,
            ProviderKind::Groq => self.groq_api_key.as_deref(),
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
            ProviderKind::Anthropic => self.anthropic_api_key.as_deref(),
        }
    }

    pub fn default_model(&self, provider: ProviderKind) -> &str {
        match provider {
            ProviderKind::Local => &self.ollama_model,
            ProviderKind::Groq => &self.groq_model,
            ProviderKind::OpenAi => &self.openai_model,
            ProviderKind::Anthropic => &self.anthropic_model,
        }
    }

    pub fn base_url(&self, provider: ProviderKind) -> &str {
        match provider {
            ProviderKind::Local => &self.ollama_host,
            ProviderKind::Groq => &self.groq_base_url,
            ProviderKind::OpenAi => &self.openai_base_url,
            ProviderKind::Anthropic => &self.anthropic_base_url,
        }
    }

    /// Whether the provider can be called without a user-supplied key.
    pub fn is_configured(&self, provider: ProviderKind) -> bool {
        !provider.requires_api_key() || self.api_key(provider).is_some()
    }
}

// API keys stay out of logs.
impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = |k: &Option<String>| if k.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("ProviderSettings")
            .field("openai_api_key", &key(&self.openai_api_key))
            .field("anthropic_api_key", &key(&self.anthropic_api_key))
            .field("groq_api_key", &key(&self.groq_api_key))
            .field("openai_model", &self.openai_model)
            .field("anthropic_model", &self.anthropic_model)
            .field("groq_model", &self.groq_model)
            .field("ollama_model", &self.ollama_model)
            .field("ollama_host", &self.ollama_host)
            .field("hosted_timeout", &self.hosted_timeout)
            .field("local_timeout", &self.local_timeout)
            .finish_non_exhaustive()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generator traits
// ────────────────────────────────────────────────────────────────────────────

/// Anything that turns a prompt into text. The pipeline depends on this, never on a
/// concrete backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError>;

    async fn list_models(&self) -> Result<Vec<String>, LlmError>;

    /// Sends a short prompt and expects any non-empty answer.
    async fn test_connection(&self) -> Result<(), LlmError> {
        let reply = self.generate(prompts::CONNECTION_TEST_PROMPT, prompts::SYSTEM).await?;
        debug!(chars = reply.len(), "connection test answered");
        Ok(())
    }
}

/// Builds a generator for one request. Carried in `AppState` as
/// `Arc<dyn GeneratorFactory>` so tests can swap in canned generators.
pub trait GeneratorFactory: Send + Sync {
    fn build(
        &self,
        selection: &ModelSelection,
        api_key: Option<&str>,
    ) -> Result<Box<dyn TextGenerator>, LlmError>;
}

/// The production factory: an `LlmClient` per request from the startup settings.
pub struct HttpGeneratorFactory {
    settings: ProviderSettings,
}

impl HttpGeneratorFactory {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

impl GeneratorFactory for HttpGeneratorFactory {
    fn build(
        &self,
        selection: &ModelSelection,
        api_key: Option<&str>,
    ) -> Result<Box<dyn TextGenerator>, LlmError> {
        Ok(Box::new(LlmClient::new(selection, &self.settings, api_key)?))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmClient
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct LlmClient {
    provider: ProviderKind,
    model: String,
    api_key: Option<String>,
    base_url: String,
    http: Client,
    retry_backoff: Duration,
}

impl LlmClient {
    /// A user-supplied key wins over the configured one. Hosted providers without any
    /// key fail here, before a request is made.
    pub fn new(
        selection: &ModelSelection,
        settings: &ProviderSettings,
        api_key: Option<&str>,
    ) -> Result<Self, LlmError> {
        let provider = selection.provider;
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| settings.api_key(provider))
            .map(str::to_string);

        if provider.requires_api_key() && api_key.is_none() {
            return Err(LlmError::MissingApiKey(provider));
        }

        let timeout = if provider.is_local() {
            settings.local_timeout
        } else {
            settings.hosted_timeout
        };

        let model = match provider {
            ProviderKind::Local => selection
                .model
                .as_deref()
                .map(|m| m.strip_prefix("ollama:").unwrap_or(m))
                .unwrap_or(&settings.ollama_model)
                .to_string(),
            _ => selection
                .model
                .clone()
                .unwrap_or_else(|| settings.default_model(provider).to_string()),
        };

        Ok(Self {
            provider,
            model,
            api_key,
            base_url: normalize_base_url(settings.base_url(provider)),
            http: Client::builder()
                .timeout(timeout)
                .build()
                .map_err(LlmError::Client)?,
            retry_backoff: settings.retry_backoff,
        })
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    /// Sends the request built by `build`, retrying once on a transient failure, and
    /// returns the body of the first successful response.
    pub(crate) async fn send_with_retry<F>(&self, build: F) -> Result<String, LlmError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut last_error = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                warn!(
                    provider = %self.provider,
                    "attempt {} failed ({last_error}), retrying after {}ms",
                    attempt - 1,
                    self.retry_backoff.as_millis()
                );
                tokio::time::sleep(self.retry_backoff).await;
            }

            let response = match build(&self.http).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = describe_transport_error(&e);
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!(provider = %self.provider, "API returned {status}: {body}");
                last_error = format!("status {status}");
                continue;
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Auth {
                    provider: self.provider,
                    status: status.as_u16(),
                    message: error_message(&body),
                });
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    provider: self.provider,
                    status: status.as_u16(),
                    message: error_message(&body),
                });
            }

            match response.text().await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    last_error = describe_transport_error(&e);
                    continue;
                }
            }
        }

        Err(LlmError::Unavailable {
            provider: self.provider,
            attempts: MAX_ATTEMPTS,
            message: last_error,
        })
    }

    pub(crate) fn parse_body<T: serde::de::DeserializeOwned>(
        &self,
        body: &str,
    ) -> Result<T, LlmError> {
        serde_json::from_str(body).map_err(|e| LlmError::Malformed {
            provider: self.provider,
            message: e.to_string(),
        })
    }

    pub(crate) fn non_empty(&self, text: Option<&str>) -> Result<String, LlmError> {
        let text = text.map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return Err(LlmError::EmptyContent(self.provider));
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        debug!(
            provider = %self.provider,
            model = %self.model,
            prompt_chars = prompt.len(),
            "LLM call"
        );
        let text = match self.provider {
            ProviderKind::OpenAi | ProviderKind::Groq => {
                openai::complete(self, prompt, system).await?
            }
            ProviderKind::Anthropic => anthropic::complete(self, prompt, system).await?,
            ProviderKind::Local => ollama::generate(self, prompt, system).await?,
        };
        debug!(provider = %self.provider, reply_chars = text.len(), "LLM call succeeded");
        Ok(text)
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        match self.provider {
            ProviderKind::Local => ollama::list_models(self).await,
            provider => Ok(provider
                .suggested_models()
                .iter()
                .map(|m| m.to_string())
                .collect()),
        }
    }
}

fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        // OLLAMA_HOST is commonly given as `host:port`.
        format!("http://{url}")
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed { message: String },
    Plain(String),
}

/// Pulls `error.message` (OpenAI, Groq, Anthropic) or `error` (Ollama) out of an
/// error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: ErrorBody::Detailed { message },
        })
        | Ok(ErrorEnvelope {
            error: ErrorBody::Plain(message),
        }) => message,
        Err(_) => body.trim().to_string(),
    }
}

/// Strips ```lang ... ``` or ``` ... ``` code fences from model output.
pub fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. `text`, `markdown`) on the opening line.
    let rest = match rest.find('\n') {
        Some(newline) if !rest[..newline].contains(' ') => &rest[newline + 1..],
        _ => rest,
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{http::StatusCode as AxumStatus, routing::post, Json, Router};
    use serde_json::{json, Value};

    use super::mock::{serve, settings_for};
    use super::*;

    #[test]
    fn test_strip_fences_with_language_tag() {
        assert_eq!(strip_fences("```text\nRust\nGo\n```"), "Rust\nGo");
    }

    #[test]
    fn test_strip_fences_without_tag() {
        assert_eq!(strip_fences("```\nRust\n```"), "Rust");
    }

    #[test]
    fn test_strip_fences_no_fences() {
        assert_eq!(strip_fences("  Rust, Go  "), "Rust, Go");
    }

    #[test]
    fn test_model_selection_parses_provider_names() {
        assert_eq!(
            ModelSelection::parse("GROQ").unwrap(),
            ModelSelection::provider(ProviderKind::Groq)
        );
        assert_eq!(
            ModelSelection::parse("ollama").unwrap().provider,
            ProviderKind::Local
        );
    }

    #[test]
    fn test_model_selection_infers_provider_from_model_id() {
        let gpt = ModelSelection::parse("gpt-4").unwrap();
        assert_eq!(gpt.provider, ProviderKind::OpenAi);
        assert_eq!(gpt.model.as_deref(), Some("gpt-4"));

        let claude = ModelSelection::parse("claude-3-haiku-20240307").unwrap();
        assert_eq!(claude.provider, ProviderKind::Anthropic);

        let llama = ModelSelection::parse("llama3-70b-8192").unwrap();
        assert_eq!(llama.provider, ProviderKind::Groq);

        let local = ModelSelection::parse("ollama:mistral").unwrap();
        assert_eq!(local.provider, ProviderKind::Local);
        assert_eq!(local.model.as_deref(), Some("mistral"));
        assert_eq!(local.to_string(), "local:mistral");
    }

    #[test]
    fn test_model_selection_rejects_unknown() {
        assert!(matches!(
            ModelSelection::parse("bard"),
            Err(LlmError::UnknownModel(_))
        ));
        assert!(ModelSelection::parse("  ").is_err());
    }

    #[test]
    fn test_missing_api_key_fails_before_any_request() {
        let settings = ProviderSettings::default();
        let err = LlmClient::new(&ModelSelection::provider(ProviderKind::OpenAi), &settings, None)
            .err()
            .unwrap();
        assert!(matches!(err, LlmError::MissingApiKey(ProviderKind::OpenAi)));

        let local = LlmClient::new(&ModelSelection::provider(ProviderKind::Local), &settings, None);
        assert!(local.is_ok());
    }

    #[test]
    fn test_user_key_overrides_configured_key_and_blank_is_ignored() {
        let settings = ProviderSettings {
            groq_api_key: Some("configured".to_string()),
            ..ProviderSettings::default()
        };
        let selection = ModelSelection::provider(ProviderKind::Groq);
        let client = LlmClient::new(&selection, &settings, Some("user")).unwrap();
        assert_eq!(client.api_key(), "user");
        let client = LlmClient::new(&selection, &settings, Some("   ")).unwrap();
        assert_eq!(client.api_key(), "configured");
        assert_eq!(client.model(), "llama3-8b-8192");
    }

    #[test]
    fn test_ollama_host_without_scheme() {
        let settings = ProviderSettings {
            ollama_host: "gpu-box:11434/".to_string(),
            ..ProviderSettings::default()
        };
        let client =
            LlmClient::new(&ModelSelection::provider(ProviderKind::Local), &settings, None)
                .unwrap();
        assert_eq!(client.endpoint("/api/generate"), "http://gpu-box:11434/api/generate");
    }

    #[test]
    fn test_settings_debug_redacts_keys() {
        let settings = ProviderSettings {
            openai_api_key: Some("sk-secret".to_string()),
            ..ProviderSettings::default()
        };
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<set>"));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(
                r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#
            ),
            "Invalid API Key"
        );
        assert_eq!(error_message(r#"{"error":"model not found"}"#), "model not found");
        assert_eq!(error_message("  bad gateway "), "bad gateway");
    }

    #[tokio::test]
    async fn test_retries_once_on_server_error_then_unavailable() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/chat/completions",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (AxumStatus::SERVICE_UNAVAILABLE, "overloaded")
                }
            }),
        );
        let base = serve(router).await;
        let client = LlmClient::new(
            &ModelSelection::provider(ProviderKind::Groq),
            &settings_for(&base),
            None,
        )
        .unwrap();

        let err = client.generate("hi", "sys").await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable { attempts: 2, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_recovers_when_retry_succeeds() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/chat/completions",
            post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (
                            AxumStatus::TOO_MANY_REQUESTS,
                            Json(json!({"error": {"message": "slow down"}})),
                        )
                    } else {
                        (
                            AxumStatus::OK,
                            Json(json!({
                                "choices": [
                                    {"message": {"role": "assistant", "content": " Rust, Go "}}
                                ]
                            })),
                        )
                    }
                }
            }),
        );
        let base = serve(router).await;
        let client = LlmClient::new(
            &ModelSelection::provider(ProviderKind::OpenAi),
            &settings_for(&base),
            None,
        )
        .unwrap();

        assert_eq!(client.generate("hi", "sys").await.unwrap(), "Rust, Go");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_twice_is_unavailable() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/messages",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Json(json!({}))
                }
            }),
        );
        let base = serve(router).await;
        let client = LlmClient::new(
            &ModelSelection::provider(ProviderKind::Anthropic),
            &settings_for(&base),
            None,
        )
        .unwrap();

        let err = client.generate("hi", "sys").await.unwrap_err();
        match err {
            LlmError::Unavailable { message, .. } => assert!(message.contains("timed out")),
            other => panic!("expected Unavailable, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = LlmClient::new(
            &ModelSelection::provider(ProviderKind::Local),
            &settings_for(&base),
            None,
        )
        .unwrap();
        let err = client.generate("hi", "sys").await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable { provider: ProviderKind::Local, .. }));
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error_without_retry() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/chat/completions",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (
                        AxumStatus::UNAUTHORIZED,
                        Json(json!({"error": {"message": "Invalid API Key"}})),
                    )
                }
            }),
        );
        let base = serve(router).await;
        let client = LlmClient::new(
            &ModelSelection::provider(ProviderKind::Groq),
            &settings_for(&base),
            Some("gsk_wrong"),
        )
        .unwrap();

        let err = client.generate("hi", "sys").await.unwrap_err();
        match err {
            LlmError::Auth { status, message, .. } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API Key");
            }
            other => panic!("expected Auth, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bad_request_is_api_error() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    AxumStatus::BAD_REQUEST,
                    Json(json!({"error": {"message": "model `gpt-9` does not exist"}})),
                )
            }),
        );
        let base = serve(router).await;
        let client = LlmClient::new(
            &ModelSelection::parse("gpt-9").unwrap(),
            &settings_for(&base),
            None,
        )
        .unwrap();
        let err = client.generate("hi", "sys").await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_connection_test_uses_generate() {
        let router = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["stream"], json!(false));
                Json(json!({"model": body["model"], "response": "Hello!", "done": true}))
            }),
        );
        let base = serve(router).await;
        let client = LlmClient::new(
            &ModelSelection::provider(ProviderKind::Local),
            &settings_for(&base),
            None,
        )
        .unwrap();
        client.test_connection().await.unwrap();
    }
}
