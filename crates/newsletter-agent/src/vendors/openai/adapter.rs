use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::content::ChatMessage;
use crate::errors::{AgentError, ProviderError};
use crate::model::ProviderId;
use crate::provider::{ModelEvent, ModelProvider, ModelRequest, ModelStreamHandle};

use super::config::OpenAiClientConfig;
use super::transport::{ChunkAccumulator, SseDecoder, SseFrame};

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Model provider for OpenAI-compatible chat-completions endpoints
/// (streaming), used both for the native endpoint and for the gateway.
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    config: OpenAiClientConfig,
}

impl ChatCompletionsProvider {
    /// Creates a provider from explicit client configuration.
    ///
    /// The API key is not checked here; a missing key fails the first turn.
    pub fn new(config: OpenAiClientConfig) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl ModelProvider for ChatCompletionsProvider {
    fn id(&self) -> ProviderId {
        self.config.provider.clone()
    }

    async fn start_turn(&self, req: ModelRequest) -> Result<ModelStreamHandle, ProviderError> {
        let provider_id = self.id();
        let api_key = self.config.require_api_key()?;
        let body = build_request_body(&req);
        debug!(
            run_id = %req.run_id,
            turn = req.turn,
            provider = %provider_id,
            model = %req.model,
            tools = req.tools.len(),
            "starting chat completions stream"
        );

        let response = self
            .client
            .post(self.config.chat_completions_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ProviderError::transport(provider_id.clone(), format!("request failed: {e}"))
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::provider(
                provider_id,
                format!("chat completions request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }

        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        Ok(ModelStreamHandle {
            stream: Box::pin(chat_event_stream(provider_id, bytes_stream)),
        })
    }
}

pub(crate) fn build_request_body(req: &ModelRequest) -> serde_json::Value {
    let mut messages = Vec::with_capacity(req.messages.len() + 1);
    if let Some(system_prompt) = req
        .system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        messages.push(ChatMessage::System {
            content: system_prompt.to_string(),
        });
    }
    messages.extend(req.messages.iter().cloned());

    let mut body = serde_json::json!({
        "model": req.model,
        "messages": messages,
        "stream": true,
    });

    if !req.tools.is_empty() {
        let tools: Vec<serde_json::Value> = req
            .tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    },
                })
            })
            .collect();
        body["tools"] = serde_json::Value::Array(tools);
        if let Some(parallel) = req.settings.parallel_tool_calls {
            body["parallel_tool_calls"] = serde_json::Value::Bool(parallel);
        }
    }
    if let Some(temperature) = req.settings.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    if let Some(max_tokens) = req.settings.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    body
}

fn chat_event_stream(
    provider_id: ProviderId,
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<ModelEvent, ProviderError>> + Send {
    struct State {
        provider_id: ProviderId,
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        accumulator: Option<ChunkAccumulator>,
        pending: VecDeque<ModelEvent>,
    }

    impl State {
        fn absorb(&mut self, frame: &SseFrame) -> Result<(), ProviderError> {
            let Some(accumulator) = self.accumulator.as_mut() else {
                return Ok(());
            };
            if frame.is_done() {
                self.complete();
                return Ok(());
            }
            if let Some(raw) = accumulator.push_frame(&self.provider_id, frame)? {
                self.pending.push_back(ModelEvent::Raw(raw));
            }
            Ok(())
        }

        fn complete(&mut self) {
            if let Some(accumulator) = self.accumulator.take() {
                self.pending
                    .push_back(ModelEvent::Completed(accumulator.finish()));
            }
        }
    }

    stream::try_unfold(
        State {
            provider_id,
            bytes_stream,
            decoder: SseDecoder::default(),
            accumulator: Some(ChunkAccumulator::default()),
            pending: VecDeque::new(),
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.accumulator.is_none() {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            state.absorb(&frame)?;
                        }
                    }
                    Some(Err(e)) => {
                        return Err(ProviderError::transport(
                            state.provider_id,
                            format!("streaming read failed: {e}"),
                        ));
                    }
                    None => {
                        if let Some(frame) = state.decoder.finish() {
                            state.absorb(&frame)?;
                        }
                        state.complete();
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ToolCallRequest;
    use crate::events::RawResponse;
    use crate::model::ModelSettings;
    use crate::provider::ToolDefinition;

    fn request(tools: Vec<ToolDefinition>, settings: ModelSettings) -> ModelRequest {
        ModelRequest {
            run_id: uuid::Uuid::new_v4(),
            turn: 1,
            model: "anthropic/claude-opus-4.5".into(),
            system_prompt: Some("sys".into()),
            messages: vec![ChatMessage::User {
                content: "hello".into(),
            }],
            tools,
            settings,
        }
    }

    fn search_tool() -> ToolDefinition {
        ToolDefinition {
            name: "search_web".into(),
            description: "Search".into(),
            parameters: serde_json::json!({"type": "object"}),
        }
    }

    #[test]
    fn request_body_has_system_prompt_and_stream_flag() {
        let body = build_request_body(&request(vec![], ModelSettings::default()));
        assert_eq!(body["stream"], true);
        assert_eq!(body["model"], "anthropic/claude-opus-4.5");
        assert_eq!(body["messages"][0], serde_json::json!({"role": "system", "content": "sys"}));
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body.get("tools").is_none());
        assert!(body.get("parallel_tool_calls").is_none());
    }

    #[test]
    fn tools_and_settings_are_sent_in_function_format() {
        let settings = ModelSettings::default()
            .parallel_tool_calls(true)
            .max_tokens(4096);
        let body = build_request_body(&request(vec![search_tool()], settings));
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "search_web");
        assert_eq!(body["parallel_tool_calls"], true);
        assert_eq!(body["max_tokens"], 4096);
        assert!(body.get("temperature").is_none());
    }

    fn body_stream(chunks: Vec<&'static str>) -> ByteStream {
        Box::pin(futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(bytes::Bytes::from_static(c.as_bytes()))),
        ))
    }

    #[tokio::test]
    async fn stream_forwards_frames_then_completes_on_done() {
        let events: Vec<_> = chat_event_stream(
            ProviderId::new("openai"),
            body_stream(vec![
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c1\",",
                "\"function\":{\"name\":\"search_web\",\"arguments\":\"{}\"}}]}}]}\n\n",
                "data: [DONE]\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
            ]),
        )
        .collect()
        .await;

        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0],
            Ok(ModelEvent::Raw(RawResponse::OutputTextDelta { .. }))
        ));
        assert!(matches!(events[1], Ok(ModelEvent::Raw(RawResponse::Other { .. }))));
        let Ok(ModelEvent::Completed(response)) = &events[2] else {
            panic!("expected completion, got {:?}", events[2]);
        };
        assert_eq!(response.text.as_deref(), Some("Hi"));
        assert_eq!(
            response.tool_calls,
            vec![ToolCallRequest {
                call_id: "c1".into(),
                name: "search_web".into(),
                arguments: "{}".into(),
            }]
        );
    }

    #[tokio::test]
    async fn end_of_body_without_done_still_completes() {
        let events: Vec<_> = chat_event_stream(
            ProviderId::new("openai"),
            body_stream(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}"]),
        )
        .collect()
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Ok(ModelEvent::Completed(_))));
    }

    #[tokio::test]
    async fn error_frame_terminates_the_stream() {
        let events: Vec<_> = chat_event_stream(
            ProviderId::new("openrouter"),
            body_stream(vec![
                "data: {\"error\":{\"message\":\"rate limited\",\"code\":429}}\n\n",
            ]),
        )
        .collect()
        .await;

        assert_eq!(
            events,
            vec![Err(ProviderError::provider(
                "openrouter",
                "rate limited",
                Some(429)
            ))]
        );
    }

    #[tokio::test]
    async fn missing_key_fails_the_turn_before_any_request() {
        let provider =
            ChatCompletionsProvider::new(OpenAiClientConfig::gateway(None).base_url("http://127.0.0.1:9"))
                .expect("provider");
        let err = provider
            .start_turn(request(vec![], ModelSettings::default()))
            .await
            .err()
            .expect("missing key");
        assert!(err.message().contains("OPENROUTER_API_KEY"));
    }

    #[tokio::test]
    async fn env_gated_smoke_stream_if_key_present() {
        let Some(key) = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
        else {
            eprintln!("skipping chat completions smoke test (OPENAI_API_KEY missing)");
            return;
        };
        let provider =
            ChatCompletionsProvider::new(OpenAiClientConfig::new(Some(key))).expect("provider");
        let mut req = request(vec![], ModelSettings::default());
        req.model = "gpt-4o-mini".into();
        req.system_prompt = Some("Return exactly the word: ok".into());

        let handle = provider.start_turn(req).await.expect("start");
        let events: Vec<_> = handle.stream.collect().await;
        assert!(
            matches!(events.last(), Some(Ok(ModelEvent::Completed(_)))),
            "smoke failed: {events:?}"
        );
    }
}
