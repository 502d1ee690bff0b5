//! Instructions handed to the newsletter agent.

use std::path::Path;

use chrono::{DateTime, Local};
use newsletter_sources::{
    SerperClient, fetch_other_sources_for_prompt, fetch_recent_posts, format_posts_for_prompt,
    load_recent_newsletters_for_prompt, load_reference_newsletter,
};
use tracing::{debug, info};

use crate::config::NewsletterConfig;

const MAX_POSTS_PER_FEED: usize = 30;

/// Pre-rendered context blocks for one issue.
pub struct PromptContext<'a> {
    pub config: &'a NewsletterConfig,
    pub now: DateTime<Local>,
    pub rss_block: String,
    pub other_sources_block: String,
    pub recent_newsletters_block: String,
    pub reference_html: String,
}

/// Gathers every source and renders the agent instructions.
pub async fn build_prompt(
    config: &NewsletterConfig,
    data_dir: &Path,
    now: DateTime<Local>,
) -> anyhow::Result<String> {
    info!(event = "prompt.feeds", feeds = config.rss_feeds.len(), hours = config.rss_hours, "fetching feeds");
    let http = reqwest::Client::builder().build()?;
    let feeds = fetch_recent_posts(
        &http,
        &config.rss_feeds,
        config.rss_hours,
        MAX_POSTS_PER_FEED,
    )
    .await;

    info!(event = "prompt.other_sources", sources = config.other_sources.len(), "pre-scraping sources");
    let serper = SerperClient::from_env()?;
    let other_sources_block =
        fetch_other_sources_for_prompt(&serper, &config.other_sources, config.other_source_max_chars)
            .await;

    let context = PromptContext {
        config,
        now,
        rss_block: format_posts_for_prompt(&feeds, config.rss_hours),
        other_sources_block,
        recent_newsletters_block: load_recent_newsletters_for_prompt(
            data_dir,
            config.recent_newsletters_to_include,
        )?,
        reference_html: load_reference_newsletter(data_dir, &config.reference_newsletter_file)?,
    };
    let prompt = render_prompt(&context);
    debug!(event = "prompt.built", chars = prompt.len(), "prompt ready");
    Ok(prompt)
}

pub fn render_prompt(ctx: &PromptContext<'_>) -> String {
    let config = ctx.config;
    let current_date = ctx.now.format("%B %d, %Y");
    let day_of_week = ctx.now.format("%A");
    let name = &config.newsletter_name;
    let rss_hours = config.rss_hours;
    let recent = config.recent_newsletters_to_include;
    format!(
        r#"You are a personalized newsletter curator.

TODAY'S DATE: {day_of_week}, {current_date}

{interests}

=== RECENT POSTS FROM RSS FEEDS (last {rss_hours} hours) ===
{rss}

=== OTHER SOURCES (PRE-SCRAPED CONTENT) ===
{other}

=== RECENT NEWSLETTERS (last {recent} newsletters to avoid repeating information) ===
{recent_block}

=== REFERENCE NEWSLETTER (USE THIS FORMAT/STYLE) ===
<reference_newsletter>
{reference}
</reference_newsletter>

RESEARCH INSTRUCTIONS:
1. Review the RSS feed posts above and the pre-scraped other sources content above.
2. If you need more detail, you should call scrape_webpage / search_web / ask_perplexity for specific followups.
3. Your research should be VERY comprehensive, but the output should be VERY brief and skimmable.
4. ONLY include things from the past 24-48 hours.
5. Do NOT repeat items already covered in <recent_newsletters>. If something is still important, mention only a very short update and link the new source.

HTML OUTPUT:
- Title: "{name} - {day_of_week}, {current_date}"
- Bulleted list broken into sections, very information dense, very concise. Only the most important things.
- EACH bullet MUST include link(s) to the source AND mention which source (e.g. "Zvi", "Transformer News") with hyperlink
- Most important items at the TOP
- Keep it brief: ~40 lines max, fewer if slow news day. Don't pad with old news.
- Use a two-column layout with CSS grid or flexbox, max page width ~900px centered
- Use <h1> for title, <h2> for section headers, <ul>/<li> for items
- No emojis! Use inline SVG icons instead. Use these to make the newsletter more visually interesting.
- Use <mark> around 3-8 key phrases total for the most important parts (not everywhere)
- Use text-fragment URL highlighting when warranted (the #:~:text=... URL parameter)
- Include basic inline CSS for the layout (max-width, columns, padding, readable font). Keep it simple and readable.
- DO NOT wrap in markdown code fences - output raw HTML only, starting with <!DOCTYPE html>

IMAGES:
- For 2-4 of the most visually interesting stories, include an image from the article
- Look inside the article content for compelling images - screenshots, diagrams, product photos, charts, etc.
- Prefer images that show what the story is about (e.g. a screenshot of a new AI feature, a chart from a research paper)
- Embed images using <img src="..." style="max-width: 200px; float: right; margin: 0 0 10px 10px; border-radius: 4px;">
- Skip logos, icons, author headshots, and generic stock photos
- If you can't find a good image for a story, skip it - don't force it
"#,
        interests = config.prompt,
        rss = ctx.rss_block,
        other = ctx.other_sources_block,
        recent_block = ctx.recent_newsletters_block,
        reference = ctx.reference_html,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn june_10() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 6, 10, 7, 0, 0)
            .single()
            .expect("unambiguous")
    }

    #[test]
    fn prompt_embeds_date_interests_and_blocks() {
        let config = NewsletterConfig {
            newsletter_name: "AI Daily".into(),
            prompt: "Tell me about Rust.".into(),
            ..NewsletterConfig::default()
        };
        let prompt = render_prompt(&PromptContext {
            config: &config,
            now: june_10(),
            rss_block: "<rss_feeds>R</rss_feeds>".into(),
            other_sources_block: "<other_sources>O</other_sources>".into(),
            recent_newsletters_block: "<recent_newsletters>N</recent_newsletters>".into(),
            reference_html: "<html>ref</html>".into(),
        });
        assert!(prompt.starts_with("You are a personalized newsletter curator."));
        assert!(prompt.contains("TODAY'S DATE: Tuesday, June 10, 2025"));
        assert!(prompt.contains("Tell me about Rust."));
        assert!(prompt.contains("(last 48 hours) ===\n<rss_feeds>R</rss_feeds>"));
        assert!(prompt.contains("(last 7 newsletters to avoid repeating information)"));
        assert!(prompt.contains("<reference_newsletter>\n<html>ref</html>\n</reference_newsletter>"));
        assert!(prompt.contains("- Title: \"AI Daily - Tuesday, June 10, 2025\""));
    }

    #[tokio::test]
    async fn offline_prompt_uses_placeholders() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = NewsletterConfig {
            prompt: "Interests".into(),
            ..NewsletterConfig::default()
        };
        let prompt = build_prompt(&config, tmp.path(), june_10())
            .await
            .expect("prompt");
        assert!(prompt.contains("<rss_feeds>\nNo feeds were fetched.\n</rss_feeds>"));
        assert!(prompt.contains("<none>No prior newsletters saved.</none>"));
        assert!(prompt.contains("<reference_newsletter>\n\n</reference_newsletter>"));
    }
}
