use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::SourceError;

/// Environment variable holding the Serper API key.
pub const SERPER_API_KEY_ENV: &str = "SERPER_API_KEY";

const SEARCH_URL: &str = "https://google.serper.dev/search";
const SCRAPE_URL: &str = "https://scrape.serper.dev";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the Serper search and scrape endpoints.
#[derive(Clone)]
pub struct SerperClient {
    http: reqwest::Client,
    api_key: Option<String>,
    search_url: String,
    scrape_url: String,
}

impl SerperClient {
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            search_url: SEARCH_URL.to_string(),
            scrape_url: SCRAPE_URL.to_string(),
        })
    }

    /// Reads the key from `SERPER_API_KEY`. A missing key only fails requests.
    pub fn from_env() -> Result<Self, SourceError> {
        Self::new(std::env::var(SERPER_API_KEY_ENV).ok())
    }

    /// Overrides both endpoints (for proxies or test servers).
    pub fn with_endpoints(mut self, search_url: impl Into<String>, scrape_url: impl Into<String>) -> Self {
        self.search_url = search_url.into();
        self.scrape_url = scrape_url.into();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Web search. Returns the organic results, empty when the response has
    /// none.
    pub async fn search(&self, query: &str, num: u32) -> Result<Vec<Value>, SourceError> {
        let body = serde_json::json!({ "q": query, "num": num });
        let response = self.post(&self.search_url, &body, None).await?;
        Ok(match response.get("organic") {
            Some(Value::Array(results)) => results.clone(),
            _ => Vec::new(),
        })
    }

    /// Scrapes a page, asking for markdown. Returns the raw response object.
    pub async fn scrape(&self, url: &str, timeout: Option<Duration>) -> Result<Value, SourceError> {
        let body = serde_json::json!({ "url": url, "includeMarkdown": true });
        self.post(&self.scrape_url, &body, timeout).await
    }

    async fn post(
        &self,
        endpoint: &str,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<Value, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SourceError::MissingApiKey(SERPER_API_KEY_ENV))?;
        let mut request = self
            .http
            .post(endpoint)
            .header("X-API-KEY", api_key)
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        debug!(event = "serper.request", endpoint, "calling serper");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(event = "serper.status", endpoint, status = status.as_u16(), "serper returned an error status");
        }
        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for SerperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerperClient")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("search_url", &self.search_url)
            .field("scrape_url", &self.scrape_url)
            .finish()
    }
}

/// Picks the first non-empty string field of a scrape response, falling
/// back to the serialized response.
pub fn scraped_text(response: &Value, fields: &[&str]) -> String {
    fields
        .iter()
        .find_map(|field| {
            response
                .get(*field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| response.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn requests_without_key_fail_before_any_io() {
        let client = SerperClient::new(None)
            .expect("client")
            .with_endpoints("http://127.0.0.1:9/search", "http://127.0.0.1:9/");
        assert!(!client.has_api_key());
        let err = client.search("rust", 5).await.expect_err("no key");
        assert!(matches!(err, SourceError::MissingApiKey(SERPER_API_KEY_ENV)));
    }

    #[test]
    fn scraped_text_prefers_fields_in_order() {
        let response = serde_json::json!({"markdown": "", "text": "plain", "message": "m"});
        assert_eq!(scraped_text(&response, &["markdown", "text", "message"]), "plain");
        assert_eq!(scraped_text(&response, &["message"]), "m");

        let opaque = serde_json::json!({"statusCode": 500});
        assert_eq!(scraped_text(&opaque, &["markdown"]), r#"{"statusCode":500}"#);
    }

    #[test]
    fn debug_redacts_key() {
        let client = SerperClient::new(Some("secret".into())).expect("client");
        assert!(!format!("{client:?}").contains("secret"));
    }
}
