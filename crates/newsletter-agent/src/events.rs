//! Runtime-native events produced while a run is in flight.
//!
//! These mirror the loosely typed shapes an agent runtime reports: lifecycle
//! changes, completed run items carrying their raw JSON item, and raw response
//! frames from the model stream. Consumers normally see them only through
//! [`crate::stream::AgentEvent`], which keeps the original event attached.

use serde_json::Value;

use crate::content::ToolCallRequest;

/// A single event reported by the agent runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderEvent {
    /// A new agent became active in the run.
    AgentUpdated { new_agent: String },
    /// A run item was completed (message, tool call, tool output, ...).
    RunItem { name: String, item: RunItem },
    /// A raw frame from the model stream.
    RawResponse(RawResponse),
    /// Any event shape the runtime does not classify.
    Other { event_type: String, payload: Value },
}

/// Completed item attached to [`ProviderEvent::RunItem`].
#[derive(Clone, Debug, PartialEq)]
pub enum RunItem {
    /// Finalized assistant message (`{"type":"message","content":[...]}`).
    MessageOutput { raw_item: Value },
    /// Tool invocation request (`{"type":"function_call",...}`).
    ToolCall { raw_item: Value },
    /// Tool invocation result (`{"type":"function_call_output",...}`).
    ToolCallOutput { raw_item: Value, output: Value },
    /// Handoffs, reasoning items and anything else.
    Other { item_type: String, raw_item: Value },
}

/// Raw model-stream frame attached to [`ProviderEvent::RawResponse`].
#[derive(Clone, Debug, PartialEq)]
pub enum RawResponse {
    /// Incremental assistant text. `delta` may be absent or empty.
    OutputTextDelta {
        delta: Option<String>,
        payload: Value,
    },
    Other {
        event_type: String,
        payload: Value,
    },
}

impl ProviderEvent {
    pub fn agent_updated(name: impl Into<String>) -> Self {
        Self::AgentUpdated {
            new_agent: name.into(),
        }
    }

    /// Finalized assistant message with a single `output_text` part.
    pub fn message_output(text: &str) -> Self {
        Self::RunItem {
            name: "message_output_created".into(),
            item: RunItem::MessageOutput {
                raw_item: serde_json::json!({
                    "type": "message",
                    "role": "assistant",
                    "content": [{"type": "output_text", "text": text}],
                }),
            },
        }
    }

    pub fn tool_called(call: &ToolCallRequest) -> Self {
        Self::RunItem {
            name: "tool_called".into(),
            item: RunItem::ToolCall {
                raw_item: serde_json::json!({
                    "type": "function_call",
                    "name": call.name,
                    "arguments": call.arguments,
                    "call_id": call.call_id,
                }),
            },
        }
    }

    pub fn tool_output(call_id: &str, output: &str) -> Self {
        Self::RunItem {
            name: "tool_output".into(),
            item: RunItem::ToolCallOutput {
                raw_item: serde_json::json!({
                    "type": "function_call_output",
                    "call_id": call_id,
                    "output": output,
                }),
                output: Value::String(output.to_string()),
            },
        }
    }

    pub fn text_delta(delta: impl Into<String>) -> Self {
        let delta = delta.into();
        Self::RawResponse(RawResponse::OutputTextDelta {
            payload: serde_json::json!({"type": "response.output_text.delta", "delta": delta}),
            delta: Some(delta),
        })
    }

    /// Short type tag, useful for logging.
    pub fn event_type(&self) -> &str {
        match self {
            Self::AgentUpdated { .. } => "agent_updated_stream_event",
            Self::RunItem { .. } => "run_item_stream_event",
            Self::RawResponse(_) => "raw_response_event",
            Self::Other { event_type, .. } => event_type,
        }
    }
}
