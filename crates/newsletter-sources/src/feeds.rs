//! RSS and Atom feed fetching, filtering and prompt formatting.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::SourceError;
use crate::html::collapse_html;

const FEED_TIMEOUT: Duration = Duration::from_secs(15);

/// One entry of a feed, reduced to what the prompt needs.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPost {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    /// Plain text with markup removed.
    pub content: String,
    /// Feed title, or the host of the feed URL.
    pub source: String,
}

/// Feeds in configuration order, keyed by source name.
pub type FeedResults = Vec<(String, Vec<FeedPost>)>;

/// Parses an RSS or Atom document. Returns the source name and its posts.
pub fn parse_feed(xml: &[u8], feed_url: &str) -> Result<(String, Vec<FeedPost>), SourceError> {
    let feed = feed_rs::parser::parse(xml).map_err(|e| SourceError::Feed(e.to_string()))?;
    let source = feed
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| url_host(feed_url));

    let posts = feed
        .entries
        .into_iter()
        .map(|entry| {
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let body = entry
                .content
                .as_ref()
                .and_then(|c| c.body.clone())
                .filter(|b| !b.trim().is_empty())
                .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
                .unwrap_or_default();
            FeedPost {
                title,
                link,
                published: entry.published.or(entry.updated),
                content: collapse_html(&body),
                source: source.clone(),
            }
        })
        .collect();
    Ok((source, posts))
}

fn url_host(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(ToOwned::to_owned))
        .unwrap_or_else(|| url.to_string())
}

/// Fetches and parses one feed. Failures are logged and reported as an empty
/// feed named after the URL.
pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> (String, Vec<FeedPost>) {
    match try_fetch_feed(client, url).await {
        Ok(feed) => feed,
        Err(e) => {
            warn!(event = "feed.fetch_failed", url, error = %e, "error fetching feed");
            (url.to_string(), Vec::new())
        }
    }
}

async fn try_fetch_feed(
    client: &reqwest::Client,
    url: &str,
) -> Result<(String, Vec<FeedPost>), SourceError> {
    let body = client
        .get(url)
        .timeout(FEED_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    parse_feed(&body, url)
}

/// Keeps posts published at or after `cutoff` (or undated), at most `max`.
pub fn recent_posts(posts: Vec<FeedPost>, cutoff: DateTime<Utc>, max: usize) -> Vec<FeedPost> {
    posts
        .into_iter()
        .filter(|p| p.published.is_none_or(|published| published >= cutoff))
        .take(max)
        .collect()
}

/// Fetches every feed concurrently and keeps the posts of the last `hours`.
///
/// Results follow `urls` order. A later feed reporting an already seen source
/// name replaces the earlier entry in place.
pub async fn fetch_recent_posts(
    client: &reqwest::Client,
    urls: &[String],
    hours: u32,
    max_per_feed: usize,
) -> FeedResults {
    let cutoff = Utc::now() - chrono::Duration::hours(i64::from(hours));
    let fetched = futures::future::join_all(urls.iter().map(|url| fetch_feed(client, url))).await;

    let mut results: FeedResults = Vec::with_capacity(fetched.len());
    for (source, posts) in fetched {
        let recent = recent_posts(posts, cutoff, max_per_feed);
        info!(event = "feed.fetched", source = %source, posts = recent.len(), "recent posts found");
        match results.iter_mut().find(|(name, _)| *name == source) {
            Some(entry) => entry.1 = recent,
            None => results.push((source, recent)),
        }
    }
    results
}

/// Renders feed results as the `<rss_feeds>` prompt block.
pub fn format_posts_for_prompt(feeds: &[(String, Vec<FeedPost>)], hours: u32) -> String {
    if feeds.is_empty() {
        return "<rss_feeds>\nNo feeds were fetched.\n</rss_feeds>".to_string();
    }
    let mut lines = vec!["<rss_feeds>".to_string()];
    for (source, posts) in feeds {
        lines.push(format!("\n<feed source=\"{source}\">"));
        if posts.is_empty() {
            lines.push(format!(
                "\n<no_recent_posts>No posts from the last {hours} hours.</no_recent_posts>"
            ));
        }
        for post in posts {
            let date = post
                .published
                .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            lines.push("\n<article>".to_string());
            lines.push(format!("<title>{}</title>", post.title));
            lines.push(format!("<link>{}</link>", post.link));
            lines.push(format!("<date>{date}</date>"));
            lines.push(format!("<content>\n{}\n</content>", post.content));
            lines.push("</article>".to_string());
        }
        lines.push("\n</feed>".to_string());
    }
    lines.push("\n</rss_feeds>".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example Blog</title>
  <link>https://blog.example.com</link>
  <item>
    <title>First</title>
    <link>https://blog.example.com/first</link>
    <pubDate>Tue, 10 Jun 2025 08:30:00 GMT</pubDate>
    <description>&lt;p&gt;Short   &lt;b&gt;summary&lt;/b&gt;&lt;/p&gt;</description>
  </item>
  <item>
    <link>https://blog.example.com/untitled</link>
    <description>No title here</description>
  </item>
</channel></rss>"#;

    const ATOM_WITHOUT_TITLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>urn:feed</id>
  <updated>2025-06-10T09:00:00Z</updated>
  <entry>
    <id>urn:e1</id>
    <title>Atom entry</title>
    <link href="https://atom.example.org/e1"/>
    <updated>2025-06-10T09:00:00Z</updated>
    <summary>summary text</summary>
    <content type="html">&lt;p&gt;full   content&lt;/p&gt;</content>
  </entry>
</feed>"#;

    fn post(title: &str, published: Option<DateTime<Utc>>) -> FeedPost {
        FeedPost {
            title: title.into(),
            link: format!("https://example.com/{title}"),
            published,
            content: "body".into(),
            source: "Example".into(),
        }
    }

    #[test]
    fn rss_items_are_parsed_and_cleaned() {
        let (source, posts) =
            parse_feed(RSS.as_bytes(), "https://blog.example.com/feed").expect("parse");
        assert_eq!(source, "Example Blog");
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "First");
        assert_eq!(posts[0].link, "https://blog.example.com/first");
        assert_eq!(posts[0].content, "Short summary");
        assert_eq!(
            posts[0].published,
            Some(Utc.with_ymd_and_hms(2025, 6, 10, 8, 30, 0).unwrap())
        );
        assert_eq!(posts[1].title, "Untitled");
        assert_eq!(posts[1].published, None);
    }

    #[test]
    fn atom_prefers_full_content_and_falls_back_to_host() {
        let (source, posts) =
            parse_feed(ATOM_WITHOUT_TITLE.as_bytes(), "https://atom.example.org/feed.xml")
                .expect("parse");
        assert_eq!(source, "atom.example.org");
        assert_eq!(posts[0].content, "full content");
        assert_eq!(posts[0].source, "atom.example.org");
    }

    #[test]
    fn garbage_is_a_feed_error() {
        let err = parse_feed(b"not a feed", "https://x.example").expect_err("invalid");
        assert!(matches!(err, SourceError::Feed(_)));
    }

    #[test]
    fn recent_posts_keep_undated_and_respect_cap() {
        let cutoff = Utc.with_ymd_and_hms(2025, 6, 9, 0, 0, 0).unwrap();
        let old = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap();
        let kept = recent_posts(
            vec![
                post("old", Some(old)),
                post("new", Some(new)),
                post("undated", None),
                post("edge", Some(cutoff)),
            ],
            cutoff,
            2,
        );
        let titles: Vec<_> = kept.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "undated"]);
    }

    #[test]
    fn prompt_block_lists_articles_and_empty_feeds() {
        let published = Utc.with_ymd_and_hms(2025, 6, 10, 8, 30, 0).unwrap();
        let feeds = vec![
            ("Example".to_string(), vec![post("a", Some(published)), post("b", None)]),
            ("Quiet".to_string(), vec![]),
        ];
        let block = format_posts_for_prompt(&feeds, 48);
        assert!(block.starts_with("<rss_feeds>\n\n<feed source=\"Example\">"));
        assert!(block.contains("<date>2025-06-10 08:30 UTC</date>"));
        assert!(block.contains("<date>Unknown</date>"));
        assert!(block.contains("<content>\nbody\n</content>"));
        assert!(block.contains(
            "<feed source=\"Quiet\">\n\n<no_recent_posts>No posts from the last 48 hours.</no_recent_posts>"
        ));
        assert!(block.ends_with("\n</feed>\n\n</rss_feeds>"));
    }

    #[test]
    fn no_feeds_renders_placeholder() {
        assert_eq!(
            format_posts_for_prompt(&[], 24),
            "<rss_feeds>\nNo feeds were fetched.\n</rss_feeds>"
        );
    }

    #[tokio::test]
    async fn unreachable_feed_is_empty_and_named_after_url() {
        let client = reqwest::Client::new();
        let (source, posts) = fetch_feed(&client, "http://127.0.0.1:9/feed.xml").await;
        assert_eq!(source, "http://127.0.0.1:9/feed.xml");
        assert!(posts.is_empty());
    }
}
