//! Common imports for typical agent usage.
pub use crate::{
    Agent, AgentError, AgentEvent, AgentEventData, AgentStream, EventKind, FunctionTool,
    ModelRef, ModelSettings, Runner, Tool, ToolError,
};
