/// A tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned id used to correlate the result.
    pub call_id: String,
    pub name: String,
    /// Raw JSON argument text as produced by the model.
    pub arguments: String,
}

/// One message of the chat-completions conversation.
///
/// Serializes directly into the OpenAI-compatible wire shape.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ChatToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ChatFunctionCall,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatFunctionCall {
    pub name: String,
    pub arguments: String,
}

impl From<&ToolCallRequest> for ChatToolCall {
    fn from(call: &ToolCallRequest) -> Self {
        Self {
            id: call.call_id.clone(),
            kind: "function".into(),
            function: ChatFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

impl ChatMessage {
    /// Assistant turn that may carry tool calls. Empty text is sent as `null`.
    pub fn assistant(text: Option<String>, tool_calls: &[ToolCallRequest]) -> Self {
        Self::Assistant {
            content: text.filter(|t| !t.is_empty()),
            tool_calls: tool_calls.iter().map(ChatToolCall::from).collect(),
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: call_id.into(),
            content: content.into(),
        }
    }
}

/// Final assistant turn assembled by a provider stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelResponse {
    /// Concatenated assistant text; `None` when the turn produced no text.
    pub text: Option<String>,
    /// Tool calls in the order the model requested them.
    pub tool_calls: Vec<ToolCallRequest>,
    /// Vendor-specific finish reason when available (for example `stop`).
    pub finish_reason: Option<String>,
}

impl ModelResponse {
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_with_tool_calls_serializes_to_wire_shape() {
        let call = ToolCallRequest {
            call_id: "call_1".into(),
            name: "search_web".into(),
            arguments: r#"{"query":"rust"}"#.into(),
        };
        let value = serde_json::to_value(ChatMessage::assistant(Some(String::new()), &[call]))
            .expect("serialize");
        assert_eq!(value["role"], "assistant");
        assert!(value["content"].is_null());
        assert_eq!(value["tool_calls"][0]["id"], "call_1");
        assert_eq!(value["tool_calls"][0]["type"], "function");
        assert_eq!(value["tool_calls"][0]["function"]["name"], "search_web");
    }

    #[test]
    fn plain_messages_omit_tool_calls() {
        let value = serde_json::to_value(ChatMessage::assistant(Some("hi".into()), &[]))
            .expect("serialize");
        assert_eq!(value, serde_json::json!({"role": "assistant", "content": "hi"}));

        let tool = serde_json::to_value(ChatMessage::tool_result("call_1", "ok")).expect("tool");
        assert_eq!(
            tool,
            serde_json::json!({"role": "tool", "tool_call_id": "call_1", "content": "ok"})
        );
    }
}
