use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::AgentError;
use crate::model::{ModelRef, ModelSettings, RunConfig};
use crate::runtime::{AgentRuntime, Runner};
use crate::stream::AgentStream;
use crate::tool::Tool;

/// Turn budget used when neither the agent nor the call sets one.
pub const DEFAULT_MAX_TURNS: u32 = 20;

/// Immutable agent definition handed to the runtime.
pub struct AgentConfig {
    name: String,
    instructions: String,
    model: ModelRef,
    tools: Vec<Arc<dyn Tool>>,
    default_max_turns: u32,
    default_model_settings: Option<ModelSettings>,
}

impl AgentConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// System prompt.
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn default_max_turns(&self) -> u32 {
        self.default_max_turns
    }

    pub fn default_model_settings(&self) -> Option<&ModelSettings> {
        self.default_model_settings.as_ref()
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("default_max_turns", &self.default_max_turns)
            .field("default_model_settings", &self.default_model_settings)
            .finish()
    }
}

/// A configured agent bound to a runtime.
///
/// Cheap to clone; every [`Agent::stream`] call starts an independent run.
#[derive(Clone)]
pub struct Agent {
    config: Arc<AgentConfig>,
    runtime: Arc<dyn AgentRuntime>,
}

impl Agent {
    /// Starts building an agent.
    ///
    /// A model string of the form `vendor/model` is routed through the
    /// gateway; anything else targets the native endpoint.
    pub fn builder(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: impl Into<String>,
    ) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            instructions: instructions.into(),
            model: model.into(),
            model_ref: None,
            tools: Vec::new(),
            default_max_turns: DEFAULT_MAX_TURNS,
            default_model_settings: None,
            runtime: None,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn config_arc(&self) -> Arc<AgentConfig> {
        Arc::clone(&self.config)
    }

    /// Starts a run and returns its event stream without waiting on it.
    ///
    /// `max_turns` of `None` or `Some(0)` falls back to the agent default.
    /// Dispatch failures such as a missing API key are reported as the first
    /// `Err` item of the stream, not here.
    pub fn stream(&self, input: impl Into<String>, max_turns: Option<u32>) -> AgentStream {
        let max_turns = max_turns
            .filter(|n| *n > 0)
            .unwrap_or(self.config.default_max_turns);
        let run_config = self
            .config
            .default_model_settings
            .clone()
            .map(|model_settings| RunConfig { model_settings });
        let handle = self.runtime.start_streamed(
            Arc::clone(&self.config),
            input.into(),
            max_turns,
            run_config,
        );
        AgentStream::new(handle)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent").field("config", &self.config).finish()
    }
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    name: String,
    instructions: String,
    model: String,
    model_ref: Option<ModelRef>,
    tools: Vec<Arc<dyn Tool>>,
    default_max_turns: u32,
    default_model_settings: Option<ModelSettings>,
    runtime: Option<Arc<dyn AgentRuntime>>,
}

impl AgentBuilder {
    /// Registers one tool.
    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    /// Registers several shared tools.
    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn default_max_turns(mut self, max_turns: u32) -> Self {
        self.default_max_turns = max_turns;
        self
    }

    pub fn default_model_settings(mut self, settings: ModelSettings) -> Self {
        self.default_model_settings = Some(settings);
        self
    }

    /// Uses an already resolved model instead of parsing the model string.
    pub fn model_ref(mut self, model: ModelRef) -> Self {
        self.model_ref = Some(model);
        self
    }

    /// Overrides the runtime. Defaults to [`Runner::from_env`].
    pub fn runtime(mut self, runtime: Arc<dyn AgentRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        if self.name.trim().is_empty() {
            return Err(AgentError::validation("agent name must not be empty"));
        }
        if self.instructions.trim().is_empty() {
            return Err(AgentError::validation("agent instructions must not be empty"));
        }
        if self.default_max_turns == 0 {
            return Err(AgentError::validation("default_max_turns must be positive"));
        }
        let model = match self.model_ref {
            Some(model) => model,
            None => {
                if self.model.trim().is_empty() {
                    return Err(AgentError::validation("model must not be empty"));
                }
                ModelRef::parse(&self.model)
            }
        };
        let mut names = HashSet::new();
        for tool in &self.tools {
            if !names.insert(tool.name()) {
                return Err(AgentError::validation(format!(
                    "duplicate tool name: {}",
                    tool.name()
                )));
            }
        }
        let runtime = self
            .runtime
            .unwrap_or_else(|| Arc::new(Runner::from_env()));

        Ok(Agent {
            config: Arc::new(AgentConfig {
                name: self.name,
                instructions: self.instructions,
                model,
                tools: self.tools,
                default_max_turns: self.default_max_turns,
                default_model_settings: self.default_model_settings,
            }),
            runtime,
        })
    }
}
