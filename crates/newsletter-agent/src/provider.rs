use std::pin::Pin;

use futures::StreamExt as _;

use crate::content::{ChatMessage, ModelResponse};
use crate::errors::ProviderError;
use crate::events::RawResponse;
use crate::model::{ModelSettings, ProviderId};

/// Boxed stream of model events returned by a provider for one turn.
pub type ModelEventStream =
    Pin<Box<dyn futures::Stream<Item = Result<ModelEvent, ProviderError>> + Send + 'static>>;

/// Tool definition advertised to the model.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// Request for a single model turn.
#[derive(Clone, Debug)]
pub struct ModelRequest {
    pub run_id: uuid::Uuid,
    pub turn: u32,
    /// Model identifier as sent on the wire.
    pub model: String,
    pub system_prompt: Option<String>,
    /// Conversation so far, excluding the system prompt.
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub settings: ModelSettings,
}

impl ModelRequest {
    /// One-shot request: a single user message, no tools, no system prompt.
    pub fn single_prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            turn: 1,
            model: model.into(),
            system_prompt: None,
            messages: vec![ChatMessage::User {
                content: prompt.into(),
            }],
            tools: Vec::new(),
            settings: ModelSettings::default(),
        }
    }
}

/// Events produced by a provider while streaming one turn.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelEvent {
    /// A raw stream frame, forwarded to consumers as-is.
    Raw(RawResponse),
    /// The turn finished; carries the assembled assistant output.
    Completed(ModelResponse),
}

/// Streaming response handle returned by a provider.
pub struct ModelStreamHandle {
    pub stream: ModelEventStream,
}

/// Adapter contract implemented by model backends.
#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider id used in logs and errors.
    fn id(&self) -> ProviderId;

    /// Starts one streamed turn. Must end with `ModelEvent::Completed` or an error.
    async fn start_turn(&self, req: ModelRequest) -> Result<ModelStreamHandle, ProviderError>;
}

/// Runs one turn to completion and returns its text (empty when the model
/// produced none).
pub async fn complete_text(
    provider: &dyn ModelProvider,
    req: ModelRequest,
) -> Result<String, ProviderError> {
    let mut stream = provider.start_turn(req).await?.stream;
    while let Some(event) = stream.next().await {
        if let ModelEvent::Completed(response) = event? {
            return Ok(response.text.unwrap_or_default());
        }
    }
    Err(ProviderError::protocol(
        provider.id(),
        "model stream ended without completion",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RawResponse;

    struct Canned(Vec<Result<ModelEvent, ProviderError>>);

    #[async_trait::async_trait]
    impl ModelProvider for Canned {
        fn id(&self) -> ProviderId {
            ProviderId::new("canned")
        }

        async fn start_turn(&self, _req: ModelRequest) -> Result<ModelStreamHandle, ProviderError> {
            Ok(ModelStreamHandle {
                stream: Box::pin(futures::stream::iter(self.0.clone())),
            })
        }
    }

    #[tokio::test]
    async fn complete_text_skips_raw_frames() {
        let provider = Canned(vec![
            Ok(ModelEvent::Raw(RawResponse::OutputTextDelta {
                delta: Some("an".into()),
                payload: serde_json::Value::Null,
            })),
            Ok(ModelEvent::Completed(ModelResponse {
                text: Some("answer".into()),
                ..ModelResponse::default()
            })),
        ]);
        let text = complete_text(&provider, ModelRequest::single_prompt("m", "q"))
            .await
            .expect("text");
        assert_eq!(text, "answer");
    }

    #[tokio::test]
    async fn complete_text_requires_a_completion() {
        let provider = Canned(vec![]);
        let err = complete_text(&provider, ModelRequest::single_prompt("m", "q"))
            .await
            .expect_err("no completion");
        assert!(matches!(err, ProviderError::Protocol { .. }));
    }
}
