use crate::model::ProviderId;

/// Errors returned by a model provider before they are surfaced on the run
/// event feed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Provider returned an application-level failure (HTTP status, auth, etc.).
    #[error("provider error ({provider}): {message}")]
    Provider {
        provider: ProviderId,
        message: String,
        status_code: Option<u16>,
    },
    /// Transport or stream I/O failed.
    #[error("transport error ({provider}): {message}")]
    Transport {
        provider: ProviderId,
        message: String,
    },
    /// Provider response shape or event sequencing was invalid.
    #[error("protocol error ({provider}): {message}")]
    Protocol {
        provider: ProviderId,
        message: String,
    },
}

impl ProviderError {
    /// Creates a provider-level error.
    pub fn provider(
        provider: impl Into<ProviderId>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::Protocol {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Returns the provider associated with this error.
    pub fn provider_id(&self) -> &ProviderId {
        match self {
            Self::Provider { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Protocol { provider, .. } => provider,
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Provider { message, .. }
            | Self::Transport { message, .. }
            | Self::Protocol { message, .. } => message,
        }
    }
}

/// Failure reported by a tool implementation.
///
/// The runtime never aborts a run because of a tool failure; the error text is
/// handed back to the model as the tool's output instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Arguments did not match the tool's schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The tool ran and failed.
    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}

/// Top-level error type for the public agent API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// Invalid runtime/provider configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid agent definition or run input.
    #[error("validation error: {0}")]
    Validation(String),
    /// Provider failure while the run was in flight.
    #[error(transparent)]
    Provider(ProviderError),
    /// The model kept requesting tools past the turn budget.
    #[error("max turns ({max_turns}) exceeded")]
    MaxTurnsExceeded { max_turns: u32 },
    /// The run was cancelled through its handle.
    #[error("run cancelled")]
    Cancelled,
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl AgentError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<ProviderError> for AgentError {
    fn from(value: ProviderError) -> Self {
        AgentError::Provider(value)
    }
}
