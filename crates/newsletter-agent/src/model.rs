use std::fmt;

/// Environment variable holding the gateway API key.
pub const GATEWAY_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Namespace token prefixed to gateway-routed model identifiers.
pub const GATEWAY_NAMESPACE: &str = "openrouter";

/// Stable identifier for a provider implementation (for example `openai`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    /// Creates a provider id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the provider id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Credentials captured for the multi-provider gateway.
///
/// The key is read once when the model reference is parsed. A missing key is
/// not an error at that point; the request fails on first use instead.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct GatewayCredentials {
    pub api_key: Option<String>,
}

impl GatewayCredentials {
    /// Reads the key from `OPENROUTER_API_KEY`; blank values count as absent.
    pub fn from_env() -> Self {
        let api_key = std::env::var(GATEWAY_API_KEY_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Self { api_key }
    }
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Model selection for an agent.
///
/// Identifiers containing a provider namespace (`vendor/model`) are routed
/// through the gateway; everything else targets the native endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelRef {
    /// Model invoked directly on the native endpoint.
    Direct(String),
    /// Model invoked through the gateway. `model` is fully qualified
    /// (`openrouter/vendor/model`).
    Routed {
        model: String,
        credentials: GatewayCredentials,
    },
}

impl ModelRef {
    /// Parses a model string, reading gateway credentials from the environment
    /// when the string is namespaced.
    pub fn parse(model: &str) -> Self {
        if model.contains('/') {
            Self::parse_with_credentials(model, GatewayCredentials::from_env())
        } else {
            Self::Direct(model.trim().to_string())
        }
    }

    /// Same as [`ModelRef::parse`] with explicit gateway credentials.
    pub fn parse_with_credentials(model: &str, credentials: GatewayCredentials) -> Self {
        let model = model.trim();
        if !model.contains('/') {
            return Self::Direct(model.to_string());
        }
        let prefix = format!("{GATEWAY_NAMESPACE}/");
        let qualified = if model.starts_with(&prefix) {
            model.to_string()
        } else {
            format!("{prefix}{model}")
        };
        Self::Routed {
            model: qualified,
            credentials,
        }
    }

    /// Identifier as configured (fully qualified for routed models).
    pub fn identifier(&self) -> &str {
        match self {
            Self::Direct(model) => model,
            Self::Routed { model, .. } => model,
        }
    }

    /// Identifier sent on the wire: the gateway namespace is stripped.
    pub fn upstream_model(&self) -> &str {
        match self {
            Self::Direct(model) => model,
            Self::Routed { model, .. } => model
                .strip_prefix(GATEWAY_NAMESPACE)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(model),
        }
    }

    pub fn is_routed(&self) -> bool {
        matches!(self, Self::Routed { .. })
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Per-run model behavior settings.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelSettings {
    /// Execute the tool calls of one turn concurrently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelSettings {
    pub fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = Some(enabled);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn runs_tools_in_parallel(&self) -> bool {
        self.parallel_tool_calls.unwrap_or(false)
    }
}

/// Run-level override passed to the runtime.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunConfig {
    pub model_settings: ModelSettings,
}
