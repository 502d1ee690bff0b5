use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::errors::ToolError;
use crate::provider::ToolDefinition;

/// A capability the model may call during a run.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> serde_json::Value;

    /// Executes the tool. Remote failures should be reported as text in the
    /// `Ok` value where the model can act on them.
    async fn call(&self, args: serde_json::Value) -> Result<String, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

type ToolFuture = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send>>;
type ToolHandler = dyn Fn(serde_json::Value) -> ToolFuture + Send + Sync;

/// Closure-backed tool with typed arguments.
///
/// ```
/// use newsletter_agent::{FunctionTool, Tool};
///
/// #[derive(serde::Deserialize)]
/// struct Echo {
///     text: String,
/// }
///
/// let tool = FunctionTool::new(
///     "echo",
///     "Echo the input back",
///     serde_json::json!({
///         "type": "object",
///         "properties": {"text": {"type": "string"}},
///         "required": ["text"],
///     }),
///     |args: Echo| async move { Ok(args.text) },
/// );
/// assert_eq!(tool.name(), "echo");
/// ```
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: serde_json::Value,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    pub fn new<A, F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        handler: F,
    ) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |value| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let args: A = serde_json::from_value(value)
                        .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
                    handler(args).await
                })
            }),
        }
    }
}

#[async_trait::async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> serde_json::Value {
        self.parameters.clone()
    }

    async fn call(&self, args: serde_json::Value) -> Result<String, ToolError> {
        (self.handler)(args).await
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
