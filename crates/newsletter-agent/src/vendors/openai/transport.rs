use std::collections::BTreeMap;

use serde_json::Value;

use crate::content::{ModelResponse, ToolCallRequest};
use crate::errors::ProviderError;
use crate::events::RawResponse;
use crate::model::ProviderId;

pub(crate) const CHUNK_EVENT_TYPE: &str = "chat.completion.chunk";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Incremental server-sent-events decoder tolerant of arbitrary chunk
/// boundaries.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf) {
            let frame = parse_sse_frame(&self.buf[..idx]);
            self.buf.drain(..idx + delim_len);
            frames.extend(frame);
        }
        frames
    }

    /// Decodes whatever is left once the body ended without a final blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buf);
        parse_sse_frame(&rest)
    }
}

fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    (0..buf.len()).find_map(|i| {
        if buf[i..].starts_with(b"\n\n") {
            Some((i, 2))
        } else if buf[i..].starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else {
            None
        }
    })
}

fn parse_sse_frame(bytes: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(bytes);
    let mut event = None;
    let mut data_lines = Vec::new();
    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        }
    }
    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Folds chat-completion chunks into the turn's [`ModelResponse`].
///
/// Tool-call fragments are keyed by their `index`. A repeated id or name
/// replaces the earlier one; argument text is appended.
#[derive(Default)]
pub(crate) struct ChunkAccumulator {
    text: String,
    tool_calls: BTreeMap<u64, PartialToolCall>,
    finish_reason: Option<String>,
}

impl ChunkAccumulator {
    /// Absorbs one data frame and returns the raw event to forward, if any.
    pub fn push_frame(
        &mut self,
        provider: &ProviderId,
        frame: &SseFrame,
    ) -> Result<Option<RawResponse>, ProviderError> {
        let data = frame.data.trim();
        if data.is_empty() || frame.is_done() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(data).map_err(|e| {
            ProviderError::protocol(provider.clone(), format!("invalid SSE JSON frame: {e}"))
        })?;
        self.push_chunk(provider, value).map(Some)
    }

    pub fn push_chunk(
        &mut self,
        provider: &ProviderId,
        value: Value,
    ) -> Result<RawResponse, ProviderError> {
        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("stream reported an error");
            let status = error
                .get("code")
                .and_then(Value::as_u64)
                .and_then(|c| u16::try_from(c).ok());
            return Err(ProviderError::provider(provider.clone(), message, status));
        }

        let mut content = None;
        if let Some(choice) = value
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
        {
            if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
                self.finish_reason = Some(reason.to_string());
            }
            if let Some(delta) = choice.get("delta") {
                content = delta
                    .get("content")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned);
                if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
                    for call in calls {
                        self.push_tool_call_delta(call);
                    }
                }
            }
        }

        Ok(match content {
            Some(delta) => {
                self.text.push_str(&delta);
                RawResponse::OutputTextDelta {
                    delta: Some(delta),
                    payload: value,
                }
            }
            None => RawResponse::Other {
                event_type: CHUNK_EVENT_TYPE.to_string(),
                payload: value,
            },
        })
    }

    fn push_tool_call_delta(&mut self, call: &Value) {
        let index = call
            .get("index")
            .and_then(Value::as_u64)
            .unwrap_or(self.tool_calls.len() as u64);
        let entry = self.tool_calls.entry(index).or_default();
        if let Some(id) = call.get("id").and_then(Value::as_str) {
            entry.id = id.to_string();
        }
        if let Some(function) = call.get("function") {
            if let Some(name) = function
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
            {
                entry.name = name.to_string();
            }
            if let Some(args) = function.get("arguments").and_then(Value::as_str) {
                entry.arguments.push_str(args);
            }
        }
    }

    pub fn finish(self) -> ModelResponse {
        let tool_calls = self
            .tool_calls
            .into_iter()
            .map(|(index, call)| ToolCallRequest {
                call_id: if call.id.is_empty() {
                    format!("call_{index}")
                } else {
                    call.id
                },
                name: call.name,
                arguments: call.arguments,
            })
            .collect();
        ModelResponse {
            text: Some(self.text).filter(|t| !t.is_empty()),
            tool_calls,
            finish_reason: self.finish_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> ProviderId {
        ProviderId::new("openrouter")
    }

    fn chunk(delta: Value) -> Value {
        json!({"object": "chat.completion.chunk", "choices": [{"index": 0, "delta": delta}]})
    }

    #[test]
    fn sse_decoder_handles_partial_chunk_boundaries() {
        let mut decoder = SseDecoder::default();
        assert!(
            decoder
                .push_chunk(b"data: {\"choices\":[{\"delta\":{\"content\":\"hel")
                .is_empty()
        );
        let frames = decoder.push_chunk(b"lo\"}}]}\r\n\r\ndata: [DONE]\n\n");
        assert_eq!(frames.len(), 2);
        assert!(frames[0].data.contains("hello"));
        assert!(frames[1].is_done());
    }

    #[test]
    fn comments_and_trailing_frames_are_handled() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push_chunk(b": OPENROUTER PROCESSING\n\n").is_empty());
        assert!(decoder.push_chunk(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish().map(|f| f.is_done()), Some(true));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn content_deltas_are_forwarded_and_accumulated() {
        let mut acc = ChunkAccumulator::default();
        let first = acc
            .push_chunk(&provider(), chunk(json!({"role": "assistant", "content": ""})))
            .expect("chunk");
        assert!(matches!(first, RawResponse::OutputTextDelta { delta: Some(ref d), .. } if d.is_empty()));
        acc.push_chunk(&provider(), chunk(json!({"content": "Hello"})))
            .expect("chunk");
        acc.push_chunk(&provider(), chunk(json!({"content": ", world"})))
            .expect("chunk");

        let response = acc.finish();
        assert_eq!(response.text.as_deref(), Some("Hello, world"));
        assert!(!response.wants_tools());
    }

    #[test]
    fn tool_call_fragments_are_joined_by_index() {
        let mut acc = ChunkAccumulator::default();
        let frames = [
            chunk(json!({"tool_calls": [
                {"index": 1, "id": "call_b", "function": {"name": "scrape_webpage", "arguments": ""}},
                {"index": 0, "id": "call_a", "function": {"name": "search_web", "arguments": "{\"qu"}},
            ]})),
            chunk(json!({"tool_calls": [{"index": 0, "function": {"arguments": "ery\":\"rust\"}"}}]})),
            chunk(json!({"tool_calls": [{"index": 1, "function": {"arguments": "{}"}}]})),
            json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
        ];
        for frame in frames {
            let raw = acc.push_chunk(&provider(), frame).expect("chunk");
            assert!(matches!(raw, RawResponse::Other { ref event_type, .. } if event_type == CHUNK_EVENT_TYPE));
        }

        let response = acc.finish();
        assert_eq!(response.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(
            response.tool_calls,
            vec![
                ToolCallRequest {
                    call_id: "call_a".into(),
                    name: "search_web".into(),
                    arguments: r#"{"query":"rust"}"#.into(),
                },
                ToolCallRequest {
                    call_id: "call_b".into(),
                    name: "scrape_webpage".into(),
                    arguments: "{}".into(),
                },
            ]
        );
    }

    #[test]
    fn repeated_tool_call_name_is_not_doubled() {
        let mut acc = ChunkAccumulator::default();
        let frames = [
            chunk(json!({"tool_calls": [
                {"index": 0, "id": "call_a", "function": {"name": "search_web", "arguments": "{\"query\":"}},
            ]})),
            chunk(json!({"tool_calls": [
                {"index": 0, "id": "call_a", "function": {"name": "search_web", "arguments": "\"rust\"}"}},
            ]})),
            chunk(json!({"tool_calls": [{"index": 0, "function": {"name": "", "arguments": ""}}]})),
        ];
        for frame in frames {
            acc.push_chunk(&provider(), frame).expect("chunk");
        }
        assert_eq!(
            acc.finish().tool_calls,
            vec![ToolCallRequest {
                call_id: "call_a".into(),
                name: "search_web".into(),
                arguments: r#"{"query":"rust"}"#.into(),
            }]
        );
    }

    #[test]
    fn error_frames_become_provider_errors() {
        let mut acc = ChunkAccumulator::default();
        let err = acc
            .push_chunk(
                &provider(),
                json!({"error": {"message": "insufficient credits", "code": 402}}),
            )
            .expect_err("error frame");
        assert_eq!(
            err,
            ProviderError::provider("openrouter", "insufficient credits", Some(402))
        );
    }

    #[test]
    fn malformed_json_is_a_protocol_error() {
        let mut acc = ChunkAccumulator::default();
        let frame = SseFrame {
            event: None,
            data: "{not json".into(),
        };
        let err = acc.push_frame(&provider(), &frame).expect_err("bad frame");
        assert!(matches!(err, ProviderError::Protocol { .. }));
    }
}
