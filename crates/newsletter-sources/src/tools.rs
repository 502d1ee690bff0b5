//! Research tools offered to the newsletter agent.

use std::sync::Arc;
use std::time::Duration;

use newsletter_agent::vendors::openai::{ChatCompletionsProvider, OpenAiClientConfig};
use newsletter_agent::{
    GatewayCredentials, ModelProvider, ModelRequest, Tool, ToolError, complete_text,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::SourceError;
use crate::serper::{SerperClient, scraped_text};

/// Default gateway model behind `ask_perplexity`.
pub const PERPLEXITY_MODEL: &str = "perplexity/sonar-pro";

const SCRAPE_TIMEOUT: Duration = Duration::from_secs(8);
const MAX_SEARCH_RESULTS: i64 = 20;

fn decode<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn tool_failure(e: impl std::fmt::Display) -> ToolError {
    ToolError::execution(e.to_string())
}

/// `search_web`: Google search through Serper.
pub struct SearchWebTool {
    serper: SerperClient,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_num_results")]
    num_results: i64,
}

fn default_num_results() -> i64 {
    5
}

impl SearchWebTool {
    pub fn new(serper: SerperClient) -> Self {
        Self { serper }
    }
}

#[async_trait::async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search Google (via Serper) and return a JSON string of results."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"},
                "num_results": {
                    "type": "integer",
                    "description": "Number of results (1-20)",
                    "default": 5,
                },
            },
            "required": ["query"],
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: SearchArgs = decode(args)?;
        let num = args.num_results.clamp(1, MAX_SEARCH_RESULTS) as u32;
        info!(event = "tool.search_web", query = %args.query, num_results = num, "searching");
        let results = self
            .serper
            .search(&args.query, num)
            .await
            .map_err(tool_failure)?;
        serde_json::to_string(&results).map_err(tool_failure)
    }
}

/// `scrape_webpage`: page text through Serper, bounded by an 8 second
/// timeout.
pub struct ScrapeWebpageTool {
    serper: SerperClient,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ScrapeArgs {
    url: String,
}

impl ScrapeWebpageTool {
    pub fn new(serper: SerperClient) -> Self {
        Self {
            serper,
            timeout: SCRAPE_TIMEOUT,
        }
    }
}

#[async_trait::async_trait]
impl Tool for ScrapeWebpageTool {
    fn name(&self) -> &str {
        "scrape_webpage"
    }

    fn description(&self) -> &str {
        "Return the scraped text content of a webpage (via Serper)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Absolute URL of the page"},
            },
            "required": ["url"],
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: ScrapeArgs = decode(args)?;
        info!(event = "tool.scrape_webpage", url = %args.url, "scraping");
        match self.serper.scrape(&args.url, Some(self.timeout)).await {
            Ok(response) => Ok(scraped_text(&response, &["markdown", "message"])),
            Err(e) if e.is_timeout() => Ok(format!(
                "Error: Timeout after {} seconds while scraping {}",
                self.timeout.as_secs(),
                args.url
            )),
            Err(e) => Err(tool_failure(e)),
        }
    }
}

/// `ask_perplexity`: research question answered by a search-grounded model
/// on the gateway.
pub struct AskPerplexityTool {
    provider: Arc<dyn ModelProvider>,
    model: String,
}

#[derive(Deserialize)]
struct AskArgs {
    query: String,
}

impl AskPerplexityTool {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            model: PERPLEXITY_MODEL.to_string(),
        }
    }

    /// Gateway provider keyed from `OPENROUTER_API_KEY`.
    pub fn from_env() -> Result<Self, SourceError> {
        Ok(Self::new(gateway_provider_from_env()?))
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait::async_trait]
impl Tool for AskPerplexityTool {
    fn name(&self) -> &str {
        "ask_perplexity"
    }

    fn description(&self) -> &str {
        "Ask Perplexity AI for current information and research."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Research question"},
            },
            "required": ["query"],
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: AskArgs = decode(args)?;
        let preview: String = args.query.chars().take(100).collect();
        info!(event = "tool.ask_perplexity", query = %preview, model = %self.model, "asking");
        let prompt = format!("{} Be concise without losing detail.", args.query);
        complete_text(
            self.provider.as_ref(),
            ModelRequest::single_prompt(&self.model, prompt),
        )
        .await
        .map_err(tool_failure)
    }
}

/// The full research tool set, in the order advertised to the model.
pub fn research_tools(
    serper: SerperClient,
    perplexity: Arc<dyn ModelProvider>,
) -> Vec<Arc<dyn Tool>> {
    let search: Arc<dyn Tool> = Arc::new(SearchWebTool::new(serper.clone()));
    let scrape: Arc<dyn Tool> = Arc::new(ScrapeWebpageTool::new(serper));
    let ask: Arc<dyn Tool> = Arc::new(AskPerplexityTool::new(perplexity));
    vec![search, scrape, ask]
}

/// [`research_tools`] with clients configured from the environment.
pub fn research_tools_from_env() -> Result<Vec<Arc<dyn Tool>>, SourceError> {
    Ok(research_tools(
        SerperClient::from_env()?,
        gateway_provider_from_env()?,
    ))
}

fn gateway_provider_from_env() -> Result<Arc<dyn ModelProvider>, SourceError> {
    let config = OpenAiClientConfig::gateway(GatewayCredentials::from_env().api_key);
    let provider =
        ChatCompletionsProvider::new(config).map_err(|e| SourceError::Client(e.to_string()))?;
    Ok(Arc::new(provider))
}
