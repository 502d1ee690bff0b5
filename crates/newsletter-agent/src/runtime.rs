use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt as _;
use futures::stream::FuturesUnordered;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

use crate::agent::AgentConfig;
use crate::content::{ChatMessage, ModelResponse, ToolCallRequest};
use crate::errors::{AgentError, ProviderError};
use crate::events::ProviderEvent;
use crate::model::{ModelRef, ModelSettings, RunConfig};
use crate::provider::{ModelEvent, ModelProvider, ModelRequest, ToolDefinition};
use crate::tool::Tool;
use crate::vendors::openai::{ChatCompletionsProvider, OpenAiClientConfig};

type EventItem = Result<ProviderEvent, AgentError>;

/// Live feed of runtime events for one run.
pub type ProviderEventStream = Pin<Box<dyn futures::Stream<Item = EventItem> + Send + 'static>>;

const DEFAULT_STREAM_BUFFER_CAPACITY: usize = 128;

/// Entry point that registers a run and returns its handle without waiting.
pub trait AgentRuntime: Send + Sync {
    fn start_streamed(
        &self,
        agent: Arc<AgentConfig>,
        input: String,
        max_turns: u32,
        run_config: Option<RunConfig>,
    ) -> RunHandle;
}

/// Handle used to request cancellation of a running session.
#[derive(Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Cancellation is best-effort and becomes visible as a terminal
    /// `AgentError::Cancelled` item on the event feed.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }
}

/// Handle to an in-progress or completed run, owned by the runtime.
pub struct RunHandle {
    run_id: uuid::Uuid,
    events: Arc<Mutex<mpsc::Receiver<EventItem>>>,
    final_rx: watch::Receiver<Option<String>>,
    abort_handle: AbortHandle,
}

impl RunHandle {
    /// Creates a handle and the controller that feeds it.
    pub fn channel(capacity: usize) -> (RunHandle, RunController) {
        let run_id = uuid::Uuid::new_v4();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (final_tx, final_rx) = watch::channel(None);
        let (abort_tx, abort_rx) = watch::channel(false);
        let handle = RunHandle {
            run_id,
            events: Arc::new(Mutex::new(rx)),
            final_rx,
            abort_handle: AbortHandle {
                tx: Arc::new(abort_tx),
            },
        };
        let controller = RunController {
            run_id,
            tx,
            final_tx,
            abort_rx,
        };
        (handle, controller)
    }

    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    /// Returns the run's event feed.
    ///
    /// Every call observes the same live feed; events already taken by one
    /// view are not replayed to another.
    pub fn stream_events(&self) -> ProviderEventStream {
        let events = Arc::clone(&self.events);
        Box::pin(futures::stream::unfold(events, |events| async move {
            let next = {
                let mut rx = events.lock().await;
                rx.recv().await
            };
            next.map(|item| (item, events))
        }))
    }

    /// Final textual output. `None` until the run completed successfully.
    pub fn final_output(&self) -> Option<String> {
        self.final_rx.borrow().clone()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    pub fn abort(&self) {
        self.abort_handle.abort();
    }
}

/// Producing side of a [`RunHandle`].
pub struct RunController {
    run_id: uuid::Uuid,
    tx: mpsc::Sender<EventItem>,
    final_tx: watch::Sender<Option<String>>,
    abort_rx: watch::Receiver<bool>,
}

impl RunController {
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    /// Publishes an event. Returns `false` once the consumer is gone.
    pub async fn emit(&self, event: ProviderEvent) -> bool {
        self.tx.send(Ok(event)).await.is_ok()
    }

    /// Publishes a terminal error and closes the feed.
    pub async fn fail(self, error: AgentError) {
        let _ = self.tx.send(Err(error)).await;
    }

    /// Records the final output, then closes the feed.
    pub fn finish(self, output: impl Into<String>) {
        self.final_tx.send_replace(Some(output.into()));
    }

    pub fn abort_signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.abort_rx.clone(),
        }
    }
}

/// Waits for an abort request on a run.
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// Resolves once `abort()` was called. Never resolves if every handle was
    /// dropped without aborting.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[derive(Clone)]
enum ProviderSelection {
    /// Build a chat-completions client per run from the model reference.
    Resolve { direct: OpenAiClientConfig },
    /// Use one provider for every model.
    Fixed(Arc<dyn ModelProvider>),
}

/// Default runtime: drives tool-using runs on a spawned tokio task.
#[derive(Clone)]
pub struct Runner {
    providers: ProviderSelection,
    stream_buffer_capacity: usize,
}

impl Runner {
    /// Direct models use `direct`; gateway models use the credentials carried
    /// by their [`ModelRef`].
    pub fn new(direct: OpenAiClientConfig) -> Self {
        Self {
            providers: ProviderSelection::Resolve { direct },
            stream_buffer_capacity: DEFAULT_STREAM_BUFFER_CAPACITY,
        }
    }

    /// Reads `OPENAI_API_KEY` for direct models. A missing key is reported by
    /// the first run that needs it.
    pub fn from_env() -> Self {
        Self::new(OpenAiClientConfig::openai_from_env())
    }

    /// Routes every run through `provider`, whatever the model reference.
    pub fn with_provider(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            providers: ProviderSelection::Fixed(provider),
            stream_buffer_capacity: DEFAULT_STREAM_BUFFER_CAPACITY,
        }
    }

    /// Sets the bounded buffer between the run task and the consumer.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.stream_buffer_capacity = capacity.max(1);
        self
    }

    fn resolve_provider(&self, model: &ModelRef) -> Result<Arc<dyn ModelProvider>, AgentError> {
        match &self.providers {
            ProviderSelection::Fixed(provider) => Ok(Arc::clone(provider)),
            ProviderSelection::Resolve { direct } => {
                let config = match model {
                    ModelRef::Direct(_) => direct.clone(),
                    ModelRef::Routed { credentials, .. } => {
                        OpenAiClientConfig::gateway(credentials.api_key.clone())
                    }
                };
                Ok(Arc::new(ChatCompletionsProvider::new(config)?))
            }
        }
    }
}

impl AgentRuntime for Runner {
    fn start_streamed(
        &self,
        agent: Arc<AgentConfig>,
        input: String,
        max_turns: u32,
        run_config: Option<RunConfig>,
    ) -> RunHandle {
        let (handle, controller) = RunHandle::channel(self.stream_buffer_capacity);
        let provider = self.resolve_provider(agent.model());
        let settings = run_config.map(|c| c.model_settings).unwrap_or_default();
        debug!(
            run_id = %controller.run_id(),
            agent = agent.name(),
            model = %agent.model(),
            max_turns,
            "registering run"
        );
        tokio::spawn(run_task(
            provider, agent, input, max_turns, settings, controller,
        ));
        handle
    }
}

async fn run_task(
    provider: Result<Arc<dyn ModelProvider>, AgentError>,
    agent: Arc<AgentConfig>,
    input: String,
    max_turns: u32,
    settings: ModelSettings,
    controller: RunController,
) {
    let run_id = controller.run_id();
    let mut abort = controller.abort_signal();
    let outcome = tokio::select! {
        _ = abort.cancelled() => Err(AgentError::Cancelled),
        result = drive_run(provider, &agent, input, max_turns, &settings, &controller) => result,
    };
    match outcome {
        Ok(output) => {
            info!(run_id = %run_id, agent = agent.name(), chars = output.len(), "run completed");
            controller.finish(output);
        }
        Err(err) => {
            warn!(run_id = %run_id, agent = agent.name(), error = %err, "run failed");
            controller.fail(err).await;
        }
    }
}

async fn drive_run(
    provider: Result<Arc<dyn ModelProvider>, AgentError>,
    agent: &AgentConfig,
    input: String,
    max_turns: u32,
    settings: &ModelSettings,
    controller: &RunController,
) -> Result<String, AgentError> {
    emit(controller, ProviderEvent::agent_updated(agent.name())).await?;
    let provider = provider?;
    let run_id = controller.run_id();
    let tool_defs: Vec<ToolDefinition> = agent.tools().iter().map(|t| t.definition()).collect();
    let mut messages = vec![ChatMessage::User { content: input }];

    for turn in 1..=max_turns {
        debug!(run_id = %run_id, turn, provider = %provider.id(), "starting model turn");
        let request = ModelRequest {
            run_id,
            turn,
            model: agent.model().upstream_model().to_string(),
            system_prompt: Some(agent.instructions().to_string()),
            messages: messages.clone(),
            tools: tool_defs.clone(),
            settings: settings.clone(),
        };
        let response = stream_turn(provider.as_ref(), request, controller).await?;

        if let Some(text) = response.text.as_deref().filter(|t| !t.is_empty()) {
            emit(controller, ProviderEvent::message_output(text)).await?;
        }
        if !response.wants_tools() {
            return Ok(response.text.unwrap_or_default());
        }

        for call in &response.tool_calls {
            debug!(run_id = %run_id, turn, tool = %call.name, call_id = %call.call_id, "tool requested");
            emit(controller, ProviderEvent::tool_called(call)).await?;
        }
        messages.push(ChatMessage::assistant(
            response.text.clone(),
            &response.tool_calls,
        ));

        let outputs = run_tools(
            agent.tools(),
            &response.tool_calls,
            settings.runs_tools_in_parallel(),
            controller,
        )
        .await?;
        for (call, output) in response.tool_calls.iter().zip(outputs) {
            messages.push(ChatMessage::tool_result(&call.call_id, output));
        }
    }

    Err(AgentError::MaxTurnsExceeded { max_turns })
}

async fn stream_turn(
    provider: &dyn ModelProvider,
    request: ModelRequest,
    controller: &RunController,
) -> Result<ModelResponse, AgentError> {
    let handle = provider.start_turn(request).await?;
    let mut stream = handle.stream;
    while let Some(next) = stream.next().await {
        match next? {
            ModelEvent::Raw(raw) => emit(controller, ProviderEvent::RawResponse(raw)).await?,
            ModelEvent::Completed(response) => return Ok(response),
        }
    }
    Err(ProviderError::protocol(provider.id(), "model stream ended without completion").into())
}

/// Runs the requested tools and returns outputs in request order.
///
/// Results are published as they finish, so with parallel execution the
/// `tool_output` events follow completion order.
async fn run_tools(
    tools: &[Arc<dyn Tool>],
    calls: &[ToolCallRequest],
    parallel: bool,
    controller: &RunController,
) -> Result<Vec<String>, AgentError> {
    let mut outputs = vec![String::new(); calls.len()];
    if parallel {
        let mut pending: FuturesUnordered<_> = calls
            .iter()
            .enumerate()
            .map(|(idx, call)| async move { (idx, invoke_tool(tools, call).await) })
            .collect();
        while let Some((idx, output)) = pending.next().await {
            emit(
                controller,
                ProviderEvent::tool_output(&calls[idx].call_id, &output),
            )
            .await?;
            outputs[idx] = output;
        }
    } else {
        for (idx, call) in calls.iter().enumerate() {
            let output = invoke_tool(tools, call).await;
            emit(controller, ProviderEvent::tool_output(&call.call_id, &output)).await?;
            outputs[idx] = output;
        }
    }
    Ok(outputs)
}

async fn invoke_tool(tools: &[Arc<dyn Tool>], call: &ToolCallRequest) -> String {
    let Some(tool) = tools.iter().find(|t| t.name() == call.name) else {
        warn!(tool = %call.name, call_id = %call.call_id, "model requested unknown tool");
        return format!("Error: tool '{}' is not available", call.name);
    };
    let args = if call.arguments.trim().is_empty() {
        serde_json::json!({})
    } else {
        match serde_json::from_str(&call.arguments) {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.call_id, error = %e, "unparseable tool arguments");
                return format!("Error: invalid JSON arguments for tool '{}': {e}", call.name);
            }
        }
    };
    match tool.call(args).await {
        Ok(output) => output,
        Err(err) => {
            warn!(tool = %call.name, call_id = %call.call_id, error = %err, "tool failed");
            format!("An error occurred while running the tool. Please try again. Error: {err}")
        }
    }
}

async fn emit(controller: &RunController, event: ProviderEvent) -> Result<(), AgentError> {
    if controller.emit(event).await {
        Ok(())
    } else {
        Err(AgentError::protocol_msg("run event receiver dropped"))
    }
}
