//! Consumer-facing view of a run.
//!
//! [`AgentStream`] wraps the runtime's [`RunHandle`] and turns each
//! [`ProviderEvent`] into an [`AgentEvent`]: a small closed vocabulary of
//! text deltas, complete messages, tool calls and tool results. Every event
//! keeps the runtime event it was derived from, so nothing is lost for
//! shapes the vocabulary does not cover.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt as _};
use serde_json::Value;

use crate::errors::AgentError;
use crate::events::{ProviderEvent, RawResponse, RunItem};
use crate::runtime::{ProviderEventStream, RunHandle};

/// Discriminant of an [`AgentEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    AgentStarted,
    MessageDelta,
    Message,
    ToolCall,
    ToolResult,
    Raw,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AgentStarted => "agent_started",
            Self::MessageDelta => "message_delta",
            Self::Message => "message",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::Raw => "raw",
        }
    }
}

/// Normalized payload of an [`AgentEvent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentEventData {
    AgentStarted {
        agent_name: String,
    },
    /// Incremental assistant text. Never empty.
    MessageDelta {
        text: String,
    },
    /// A complete assistant message.
    Message {
        text: String,
    },
    ToolCall {
        tool_name: Option<String>,
        arguments: Option<String>,
        call_id: Option<String>,
    },
    ToolResult {
        tool_name: Option<String>,
        call_id: Option<String>,
        output: String,
    },
    /// Anything the vocabulary does not name; inspect `raw_event`.
    Raw,
}

/// One consumer-facing event.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentEvent {
    pub data: AgentEventData,
    /// The runtime event this one was derived from.
    pub raw_event: ProviderEvent,
}

impl AgentEvent {
    pub fn kind(&self) -> EventKind {
        match self.data {
            AgentEventData::AgentStarted { .. } => EventKind::AgentStarted,
            AgentEventData::MessageDelta { .. } => EventKind::MessageDelta,
            AgentEventData::Message { .. } => EventKind::Message,
            AgentEventData::ToolCall { .. } => EventKind::ToolCall,
            AgentEventData::ToolResult { .. } => EventKind::ToolResult,
            AgentEventData::Raw => EventKind::Raw,
        }
    }

    /// Text carried by delta and message events.
    pub fn text(&self) -> Option<&str> {
        match &self.data {
            AgentEventData::MessageDelta { text } | AgentEventData::Message { text } => Some(text),
            _ => None,
        }
    }

    pub fn call_id(&self) -> Option<&str> {
        match &self.data {
            AgentEventData::ToolCall { call_id, .. } | AgentEventData::ToolResult { call_id, .. } => {
                call_id.as_deref()
            }
            _ => None,
        }
    }
}

/// Maps a runtime event to the consumer vocabulary. Total: unknown shapes
/// become [`AgentEventData::Raw`].
pub fn normalize(event: ProviderEvent) -> AgentEvent {
    let data = match &event {
        ProviderEvent::AgentUpdated { new_agent } => AgentEventData::AgentStarted {
            agent_name: new_agent.clone(),
        },
        ProviderEvent::RunItem { item, .. } => normalize_item(item),
        ProviderEvent::RawResponse(RawResponse::OutputTextDelta { delta, .. }) => {
            match delta.as_deref() {
                Some(text) if !text.is_empty() => AgentEventData::MessageDelta {
                    text: text.to_string(),
                },
                _ => AgentEventData::Raw,
            }
        }
        ProviderEvent::RawResponse(RawResponse::Other { .. }) | ProviderEvent::Other { .. } => {
            AgentEventData::Raw
        }
    };
    AgentEvent {
        data,
        raw_event: event,
    }
}

fn normalize_item(item: &RunItem) -> AgentEventData {
    match item {
        RunItem::MessageOutput { raw_item } => AgentEventData::Message {
            text: message_text(raw_item),
        },
        RunItem::ToolCall { raw_item } => AgentEventData::ToolCall {
            tool_name: str_field(raw_item, "name"),
            arguments: raw_item.get("arguments").map(value_text),
            call_id: str_field(raw_item, "call_id"),
        },
        // The tool name is not part of an output item; the item's `type`
        // is the closest label available.
        RunItem::ToolCallOutput { raw_item, output } => AgentEventData::ToolResult {
            tool_name: str_field(raw_item, "type"),
            call_id: str_field(raw_item, "call_id"),
            output: value_text(output),
        },
        RunItem::Other { .. } => AgentEventData::Raw,
    }
}

fn message_text(raw_item: &Value) -> String {
    let Some(parts) = raw_item.get("content").and_then(Value::as_array) else {
        return raw_item
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
    };
    parts
        .iter()
        .filter(|part| {
            matches!(
                part.get("type").and_then(Value::as_str),
                Some("output_text" | "text") | None
            )
        })
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect()
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(ToOwned::to_owned)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Single-pass stream of normalized events for one run.
///
/// The runtime feed is obtained on first poll. Once it is exhausted the
/// stream stays exhausted: further polls return `None` without touching the
/// handle again.
pub struct AgentStream {
    handle: RunHandle,
    feed: Option<ProviderEventStream>,
    consumed: bool,
}

impl AgentStream {
    pub fn new(handle: RunHandle) -> Self {
        Self {
            handle,
            feed: None,
            consumed: false,
        }
    }

    pub fn run_id(&self) -> uuid::Uuid {
        self.handle.run_id()
    }

    /// Awaits the next event. `Err` items are runtime failures, passed
    /// through unchanged.
    pub async fn next_event(&mut self) -> Option<Result<AgentEvent, AgentError>> {
        self.next().await
    }

    /// Final textual output of the run; `None` until it finished successfully.
    pub fn final_output(&self) -> Option<String> {
        self.handle.final_output()
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Requests cancellation of the underlying run.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Stream for AgentStream {
    type Item = Result<AgentEvent, AgentError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.consumed {
            return Poll::Ready(None);
        }
        let feed = this
            .feed
            .get_or_insert_with(|| this.handle.stream_events());
        match feed.poll_next_unpin(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(Some(item.map(normalize))),
            Poll::Ready(None) => {
                this.feed = None;
                this.consumed = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for AgentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentStream")
            .field("run_id", &self.handle.run_id())
            .field("started", &self.feed.is_some())
            .field("consumed", &self.consumed)
            .finish()
    }
}
