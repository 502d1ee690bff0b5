use std::time::Duration;

use crate::errors::ProviderError;
use crate::model::{GATEWAY_API_KEY_ENV, GATEWAY_NAMESPACE, ProviderId};

/// Native OpenAI endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// OpenAI-compatible multi-provider gateway.
pub const GATEWAY_BASE_URL: &str = "https://openrouter.ai/api/v1";

const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration for an OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct OpenAiClientConfig {
    /// Provider id reported in logs and errors.
    pub provider: ProviderId,
    /// API key used for bearer auth. Checked on first request, not here.
    pub api_key: Option<String>,
    /// Environment variable named in the missing-key error.
    pub api_key_env: &'static str,
    /// Base URL including the version segment (for example `.../v1`).
    pub base_url: String,
    /// Whole-request HTTP timeout, streaming body included.
    pub timeout: Duration,
}

impl OpenAiClientConfig {
    /// Native OpenAI endpoint with the given key.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            provider: ProviderId::new("openai"),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_key_env: OPENAI_API_KEY_ENV,
            base_url: OPENAI_BASE_URL.to_string(),
            timeout: Duration::from_secs(600),
        }
    }

    /// Native OpenAI endpoint keyed from `OPENAI_API_KEY`. A missing key is
    /// not an error until a request is made.
    pub fn openai_from_env() -> Self {
        Self::new(std::env::var(OPENAI_API_KEY_ENV).ok())
    }

    /// Gateway endpoint with the given key.
    pub fn gateway(api_key: Option<String>) -> Self {
        Self {
            provider: ProviderId::new(GATEWAY_NAMESPACE),
            api_key_env: GATEWAY_API_KEY_ENV,
            base_url: GATEWAY_BASE_URL.to_string(),
            ..Self::new(api_key)
        }
    }

    /// Overrides the API base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the default HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn require_api_key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or_else(|| {
            ProviderError::provider(
                self.provider.clone(),
                format!("missing API key; set {}", self.api_key_env),
                None,
            )
        })
    }
}

impl std::fmt::Debug for OpenAiClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClientConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
