//! OpenAI-compatible chat-completions integration.
//!
//! The same client serves the native OpenAI endpoint and the multi-provider
//! gateway; only the base URL and credentials differ.
mod adapter;
mod config;
pub(crate) mod transport;

pub use adapter::ChatCompletionsProvider;
pub use config::{GATEWAY_BASE_URL, OPENAI_BASE_URL, OpenAiClientConfig};
