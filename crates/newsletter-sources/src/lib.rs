//! Content sources and delivery for the daily newsletter.
//!
//! Feeds are fetched and windowed by [`feeds`], non-feed pages are
//! pre-scraped through Serper by [`other_sources`], earlier issues are read
//! back from the on-disk [`archive`], and finished issues go out through
//! [`email`]. [`tools`] exposes the research tools the agent may call while
//! writing.

pub mod archive;
pub mod email;
pub mod error;
pub mod feeds;
/// HTML cleanup, tag stripping and truncation helpers.
pub mod html;
pub mod other_sources;
/// Serper search and scrape client.
pub mod serper;
pub mod tools;

pub use archive::{
    list_newsletters, load_recent_newsletters_for_prompt, load_reference_newsletter,
    newsletter_file_name, save_newsletter,
};
pub use email::{SendEmail, SmtpMailer, SmtpSettings};
pub use error::SourceError;
pub use feeds::{FeedPost, FeedResults, fetch_recent_posts, format_posts_for_prompt};
pub use html::{append_footer, clean_html_output};
pub use other_sources::fetch_other_sources_for_prompt;
pub use serper::{SERPER_API_KEY_ENV, SerperClient};
pub use tools::{
    AskPerplexityTool, PERPLEXITY_MODEL, ScrapeWebpageTool, SearchWebTool, research_tools,
    research_tools_from_env,
};
