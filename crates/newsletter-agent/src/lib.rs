//! Tool-using LLM agent runtime with a normalized, single-pass event stream.
//!
//! An [`Agent`] pairs instructions, a model and a set of [`Tool`]s. Each call
//! to [`Agent::stream`] starts an independent run on the configured
//! [`AgentRuntime`] and returns an [`AgentStream`] that yields
//! [`AgentEvent`]s as the run progresses. Once the stream is exhausted the
//! run's final text is available from [`AgentStream::final_output`].
//!
//! Model strings of the form `vendor/model` are routed through the OpenRouter
//! gateway (keyed from `OPENROUTER_API_KEY`); plain names go to the native
//! OpenAI endpoint (keyed from `OPENAI_API_KEY`).
//!
//! ```no_run
//! use futures::StreamExt as _;
//! use newsletter_agent::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), AgentError> {
//! let agent = Agent::builder(
//!     "assistant",
//!     "Answer briefly.",
//!     "anthropic/claude-haiku-4.5",
//! )
//! .build()?;
//!
//! let mut stream = agent.stream("Say hello", None);
//! while let Some(event) = stream.next().await {
//!     let event = event?;
//!     if let Some(text) = event.text() {
//!         print!("{text}");
//!     }
//! }
//! println!("\nfinal: {:?}", stream.final_output());
//! # Ok(())
//! # }
//! ```

/// Agent definition, builder and run dispatch.
pub mod agent;
/// Chat messages, tool call requests and assembled model turns.
pub mod content;
/// Public error types.
pub mod errors;
/// Runtime-native event shapes.
pub mod events;
/// Model references, gateway routing and run settings.
pub mod model;
/// Common imports for typical usage.
pub mod prelude;
/// Model provider contract used by vendor integrations.
pub mod provider;
/// Run handles and the default tool-calling runtime.
pub mod runtime;
/// Normalized consumer-facing stream.
pub mod stream;
/// Tool contract and closure-backed tools.
pub mod tool;
/// Vendor-specific integrations.
pub mod vendors;

pub use agent::{Agent, AgentBuilder, AgentConfig, DEFAULT_MAX_TURNS};
pub use content::{ChatMessage, ModelResponse, ToolCallRequest};
pub use errors::{AgentError, ProviderError, ToolError};
pub use events::{ProviderEvent, RawResponse, RunItem};
pub use model::{GatewayCredentials, ModelRef, ModelSettings, ProviderId, RunConfig};
pub use provider::{
    ModelEvent, ModelProvider, ModelRequest, ModelStreamHandle, ToolDefinition, complete_text,
};
pub use runtime::{AbortHandle, AgentRuntime, RunController, RunHandle, Runner};
pub use stream::{AgentEvent, AgentEventData, AgentStream, EventKind, normalize};
pub use tool::{FunctionTool, Tool};
