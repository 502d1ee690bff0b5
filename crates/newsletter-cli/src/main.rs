//! Generate a personalized newsletter, archive it and optionally email it.

mod config;
mod generate;
mod observability;
mod prompt;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use newsletter_agent::{Agent, ModelSettings};
use newsletter_sources::{
    SendEmail, SmtpMailer, SmtpSettings, append_footer, clean_html_output, research_tools_from_env,
    save_newsletter,
};
use tracing::{error, info};

use crate::config::NewsletterConfig;

/// Personalized AI newsletter curator
#[derive(Parser, Debug)]
#[command(name = "newsletter", version, about)]
struct Cli {
    /// Send the newsletter via email
    #[arg(long)]
    send_email: bool,

    /// Do not open the result in a browser
    #[arg(long)]
    no_open: bool,

    /// Use the cheaper test model and write to a temp file instead of the archive
    #[arg(long)]
    test: bool,

    /// Newsletter settings file
    #[arg(long, value_name = "PATH", default_value = "newsletter.toml")]
    config: PathBuf,

    /// Archive directory for generated issues
    #[arg(long, value_name = "PATH", default_value = "data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    observability::init_observability();
    let cli = Cli::parse();
    let config = NewsletterConfig::load(&cli.config)?;
    let now = chrono::Local::now();
    let model = config.model_for(cli.test);
    let recipients = config.recipient_email.to_vec();

    println!("\n{}", "=".repeat(60));
    println!("Generating {}", config.newsletter_name);
    println!("Date: {}", now.format("%A, %B %d, %Y"));
    println!(
        "Model: {model}{}",
        if cli.test { " [TEST MODE]" } else { "" }
    );
    if cli.send_email {
        println!("Sending to: {}", recipients.join(", "));
    } else {
        println!("Email: Not sending");
    }
    println!("{}\n", "=".repeat(60));

    let instructions = prompt::build_prompt(&config, &cli.data_dir, now).await?;
    let agent = Agent::builder("newsletter_agent", instructions, model)
        .tools(research_tools_from_env()?)
        .default_max_turns(config.max_turns)
        .default_model_settings(ModelSettings::default().parallel_tool_calls(true))
        .build()?;

    println!("Starting agent...");
    println!("{}", "-".repeat(40));
    let content = generate::generate(&agent, config.max_turns).await?;
    println!("\n{}", "-".repeat(40));

    if content.trim().is_empty() {
        error!(event = "newsletter.empty", "no content generated");
        eprintln!("\nERROR: No content generated");
        return Ok(ExitCode::FAILURE);
    }

    let html = append_footer(&clean_html_output(&content), &config.footer_html);
    let path = if cli.test {
        let path = generate::write_test_copy(&html)?;
        println!("\n[TEST MODE] Saved to temp file: {}", path.display());
        path
    } else {
        let path = save_newsletter(&cli.data_dir, &html, &now.format("%Y-%m-%d").to_string())?;
        println!("\nSaved to: {}", path.display());
        path
    };
    info!(event = "newsletter.saved", path = %path.display(), bytes = html.len(), "newsletter written");

    if !cli.no_open {
        println!("Opening in browser...");
        generate::open_in_browser(&path);
    }

    if cli.send_email {
        if recipients.is_empty() {
            eprintln!("ERROR: recipient_email is not set in {}", cli.config.display());
            return Ok(ExitCode::FAILURE);
        }
        let mailer: Arc<dyn SendEmail> = Arc::new(
            SmtpMailer::new(
                SmtpSettings::from_env()?,
                &config.from_email,
                Some(config.newsletter_name.clone()),
                Some(&config.reply_to_email),
            )
            .context("invalid sender configuration")?,
        );
        let subject = format!("{} - {}", config.newsletter_name, now.format("%B %d, %Y"));
        if !generate::send_to_all(mailer, &subject, &html, &recipients).await {
            return Ok(ExitCode::FAILURE);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_default_to_archive_and_browser() {
        let cli = Cli::try_parse_from(["newsletter"]).expect("parse");
        assert!(!cli.send_email && !cli.no_open && !cli.test);
        assert_eq!(cli.config, PathBuf::from("newsletter.toml"));
        assert_eq!(cli.data_dir, PathBuf::from("data"));

        let cli = Cli::try_parse_from(["newsletter", "--test", "--no-open", "--send-email"])
            .expect("parse");
        assert!(cli.send_email && cli.no_open && cli.test);
    }
}
