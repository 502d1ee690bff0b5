//! Agent run, output handling and delivery.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt as _;
use newsletter_agent::{Agent, AgentEventData, AgentStream};
use newsletter_sources::SendEmail;
use tracing::{error, info, warn};

/// User turn that starts every run.
pub const RUN_INPUT: &str =
    "Generate today's newsletter based on the configured sources and interests.";

/// Consumes the run, echoing text deltas and tool calls to `out`.
///
/// Returns the final output when it is non-blank, otherwise the accumulated
/// deltas. A runtime error ends the run early and keeps whatever text was
/// streamed so far.
pub async fn collect_newsletter<W: Write>(
    mut stream: AgentStream,
    out: &mut W,
) -> std::io::Result<String> {
    let mut streamed = String::new();
    while let Some(item) = stream.next().await {
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                error!(event = "agent.failed", run_id = %stream.run_id(), error = %err, "agent run failed");
                break;
            }
        };
        match &event.data {
            AgentEventData::MessageDelta { text } => {
                write!(out, "{text}")?;
                out.flush()?;
                streamed.push_str(text);
            }
            AgentEventData::ToolCall { tool_name, .. } => {
                writeln!(out, "\n[Calling: {}]", tool_name.as_deref().unwrap_or("unknown"))?;
                out.flush()?;
            }
            _ => {}
        }
    }
    Ok(stream
        .final_output()
        .filter(|output| !output.trim().is_empty())
        .unwrap_or(streamed))
}

/// Streams one run of `agent` to stdout and returns the newsletter text.
pub async fn generate(agent: &Agent, max_turns: u32) -> anyhow::Result<String> {
    let stream = agent.stream(RUN_INPUT, Some(max_turns));
    info!(event = "agent.started", run_id = %stream.run_id(), agent = agent.config().name(), "agent run started");
    // `Stdout` locks per write; no lock is held across awaits.
    let mut stdout = std::io::stdout();
    Ok(collect_newsletter(stream, &mut stdout).await?)
}

/// Writes a test issue to a temp file that outlives the process.
pub fn write_test_copy(html: &str) -> anyhow::Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("newsletter_")
        .suffix(".html")
        .tempfile()?;
    file.write_all(html.as_bytes())?;
    let (_, path) = file.keep()?;
    Ok(path)
}

/// Opens `path` with the platform's default handler. Failures are logged.
pub fn open_in_browser(path: &Path) {
    let mut command = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = std::process::Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        std::process::Command::new("xdg-open")
    };
    if let Err(e) = command.arg(path).spawn() {
        warn!(event = "browser.open_failed", path = %path.display(), error = %e, "could not open browser");
    }
}

/// Sends `html` to every recipient. Returns `true` only when all succeeded.
pub async fn send_to_all(
    mailer: Arc<dyn SendEmail>,
    subject: &str,
    html: &str,
    recipients: &[String],
) -> bool {
    let mut all_sent = true;
    for recipient in recipients {
        let mailer = Arc::clone(&mailer);
        let subject = subject.to_string();
        let to = recipient.clone();
        let html = html.to_string();
        let outcome =
            tokio::task::spawn_blocking(move || mailer.send_email(&subject, &to, html)).await;
        match outcome {
            Ok(Ok(())) => println!("\nNewsletter sent to {recipient}"),
            Ok(Err(err)) => {
                error!(event = "email.failed", to = %recipient, error = %err, "send failed");
                println!("\nFailed to send email to {recipient}");
                all_sent = false;
            }
            Err(join_err) => {
                error!(event = "email.failed", to = %recipient, error = %join_err, "send task panicked");
                all_sent = false;
            }
        }
    }
    all_sent
}
