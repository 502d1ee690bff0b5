//! Pre-scraped non-feed sources for the prompt.

use tracing::{info, warn};

use crate::html::truncate;
use crate::serper::{SerperClient, scraped_text};

/// Scrapes each URL and renders the `<other_sources>` prompt block.
///
/// Without a Serper key nothing is fetched and every source is listed as
/// skipped. Scrape failures are rendered in place of the content.
pub async fn fetch_other_sources_for_prompt(
    serper: &SerperClient,
    urls: &[String],
    max_chars: usize,
) -> String {
    let mut lines = vec!["<other_sources>".to_string()];
    if !serper.has_api_key() {
        warn!(
            event = "other_sources.skipped",
            sources = urls.len(),
            "SERPER_API_KEY is not set; skipping pre-scrape"
        );
        for url in urls {
            lines.push(format!("\n<source url=\"{url}\">"));
            lines.push("<content>Skipped (SERPER_API_KEY not set).</content>".to_string());
            lines.push("</source>".to_string());
        }
        lines.push("\n</other_sources>".to_string());
        return lines.join("\n");
    }

    for url in urls {
        info!(event = "other_sources.scrape", url = %url, "scraping source");
        let content = match serper.scrape(url, None).await {
            Ok(response) => scraped_text(&response, &["markdown", "text", "message"]),
            Err(e) => {
                warn!(event = "other_sources.failed", url = %url, error = %e, "scrape failed");
                format!("Error scraping {url}: {e}")
            }
        };
        lines.extend(source_entry(url, &truncate(&content, max_chars)));
    }
    lines.push("\n</other_sources>".to_string());
    lines.join("\n")
}

fn source_entry(url: &str, content: &str) -> [String; 3] {
    let body = if content.trim().is_empty() {
        "<content>No content fetched.</content>".to_string()
    } else {
        format!("<content>\n{content}\n</content>")
    };
    [format!("\n<source url=\"{url}\">"), body, "</source>".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sources_are_skipped_without_key() {
        let serper = SerperClient::new(None).expect("client");
        let urls = vec!["https://a.example".to_string(), "https://b.example".to_string()];
        let block = fetch_other_sources_for_prompt(&serper, &urls, 100).await;
        assert_eq!(
            block,
            "<other_sources>\n\n<source url=\"https://a.example\">\n\
             <content>Skipped (SERPER_API_KEY not set).</content>\n</source>\n\n\
             <source url=\"https://b.example\">\n\
             <content>Skipped (SERPER_API_KEY not set).</content>\n</source>\n\n</other_sources>"
        );
    }

    #[tokio::test]
    async fn scrape_errors_are_rendered_inline() {
        let serper = SerperClient::new(Some("k".into()))
            .expect("client")
            .with_endpoints("http://127.0.0.1:9/search", "http://127.0.0.1:9/");
        let block =
            fetch_other_sources_for_prompt(&serper, &["https://a.example".to_string()], 10_000)
                .await;
        assert!(block.contains("<content>\nError scraping https://a.example: "));
    }

    #[test]
    fn empty_content_is_marked() {
        let [_, body, _] = source_entry("https://a.example", "  ");
        assert_eq!(body, "<content>No content fetched.</content>");
    }
}
