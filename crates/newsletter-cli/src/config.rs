//! Newsletter settings loaded from a TOML file.

use std::path::Path;

use anyhow::{Context as _, bail};
use serde::Deserialize;

const DEFAULT_FOOTER_HTML: &str = r#"
<div style="margin-top: 30px; padding-top: 20px; border-top: 1px solid #e5e5e5; font-size: 12px; color: #666; text-align: center;">
  Reply to this email to unsubscribe or give feedback.
</div>
"#;

/// One address or a list of addresses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Default for Recipients {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl Recipients {
    /// Non-blank addresses in configuration order.
    pub fn to_vec(&self) -> Vec<String> {
        let all = match self {
            Self::One(address) => std::slice::from_ref(address),
            Self::Many(addresses) => addresses.as_slice(),
        };
        all.iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NewsletterConfig {
    pub newsletter_name: String,
    pub recipient_email: Recipients,
    pub from_email: String,
    /// Falls back to `from_email` when blank.
    pub reply_to_email: String,
    /// Any gateway-compatible model (`vendor/model`) or a native model name.
    pub model: String,
    /// Cheaper model used with `--test`.
    pub test_model: String,
    pub max_turns: u32,
    pub rss_hours: u32,
    pub recent_newsletters_to_include: usize,
    pub other_source_max_chars: usize,
    /// File name inside the data directory; blank disables the reference.
    pub reference_newsletter_file: String,
    pub rss_feeds: Vec<String>,
    /// Non-feed pages scraped before the run.
    pub other_sources: Vec<String>,
    /// Reader interests and priorities, inserted verbatim.
    pub prompt: String,
    pub footer_html: String,
}

impl Default for NewsletterConfig {
    fn default() -> Self {
        Self {
            newsletter_name: "My Daily Newsletter".into(),
            recipient_email: Recipients::default(),
            from_email: "newsletter@example.com".into(),
            reply_to_email: String::new(),
            model: "anthropic/claude-opus-4.5".into(),
            test_model: "anthropic/claude-haiku-4.5".into(),
            max_turns: 30,
            rss_hours: 48,
            recent_newsletters_to_include: 7,
            other_source_max_chars: 20_000,
            reference_newsletter_file: String::new(),
            rss_feeds: Vec::new(),
            other_sources: Vec::new(),
            prompt: String::new(),
            footer_html: DEFAULT_FOOTER_HTML.into(),
        }
    }
}

impl NewsletterConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.newsletter_name.trim().is_empty() {
            bail!("newsletter_name must not be empty");
        }
        if self.model.trim().is_empty() || self.test_model.trim().is_empty() {
            bail!("model and test_model must not be empty");
        }
        if self.max_turns == 0 {
            bail!("max_turns must be positive");
        }
        Ok(())
    }

    pub fn model_for(&self, test_mode: bool) -> &str {
        if test_mode { &self.test_model } else { &self.model }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = NewsletterConfig::from_toml("").expect("defaults");
        assert_eq!(config, NewsletterConfig::default());
        assert_eq!(config.max_turns, 30);
        assert!(config.recipient_email.to_vec().is_empty());
        assert_eq!(config.model_for(true), "anthropic/claude-haiku-4.5");
    }

    #[test]
    fn recipients_accept_one_or_many() {
        let one = NewsletterConfig::from_toml(r#"recipient_email = "a@example.com""#).expect("one");
        assert_eq!(one.recipient_email.to_vec(), vec!["a@example.com"]);

        let many = NewsletterConfig::from_toml(
            r#"recipient_email = ["a@example.com", " ", "b@example.com"]"#,
        )
        .expect("many");
        assert_eq!(
            many.recipient_email.to_vec(),
            vec!["a@example.com", "b@example.com"]
        );
    }

    #[test]
    fn full_file_round_trips_fields() {
        let config = NewsletterConfig::from_toml(
            r#"
newsletter_name = "AI Daily"
model = "gpt-4o"
rss_hours = 24
rss_feeds = ["https://blog.example.com/feed.xml"]
other_sources = ["https://news.example.com"]
prompt = "Tell me about Rust."
footer_html = ""
"#,
        )
        .expect("config");
        assert_eq!(config.newsletter_name, "AI Daily");
        assert_eq!(config.model_for(false), "gpt-4o");
        assert_eq!(config.rss_hours, 24);
        assert_eq!(config.rss_feeds.len(), 1);
        assert_eq!(config.footer_html, "");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(NewsletterConfig::from_toml("max_turns = 0").is_err());
        assert!(NewsletterConfig::from_toml("newsletter_name = \" \"").is_err());
        assert!(NewsletterConfig::from_toml("unknown_key = 1").is_err());
    }

    #[test]
    fn example_file_parses() {
        let config = NewsletterConfig::from_toml(include_str!("../../../newsletter.example.toml"))
            .expect("example config");
        assert_eq!(config.recipient_email.to_vec(), vec!["you@example.com"]);
        assert!(config.prompt.contains("## Priority ranking"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = NewsletterConfig::load(&tmp.path().join("nope.toml")).expect_err("missing");
        assert!(err.to_string().contains("nope.toml"));
    }
}
