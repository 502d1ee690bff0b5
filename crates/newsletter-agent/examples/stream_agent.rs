use futures::StreamExt as _;
use newsletter_agent::prelude::*;

#[derive(serde::Deserialize)]
struct ClockArgs {
    #[serde(default)]
    timezone: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AgentError> {
    let model = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "gpt-4o-mini".to_string());

    let clock = FunctionTool::new(
        "current_time",
        "Returns the current UNIX time in seconds",
        serde_json::json!({
            "type": "object",
            "properties": {"timezone": {"type": "string"}},
        }),
        |args: ClockArgs| async move {
            let secs = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_err(|e| ToolError::execution(e.to_string()))?
                .as_secs();
            Ok(format!("{secs} ({})", args.timezone.as_deref().unwrap_or("UTC")))
        },
    );

    let agent = Agent::builder(
        "clock_agent",
        "Answer briefly. Use the current_time tool when asked about time.",
        model,
    )
    .tool(clock)
    .build()?;

    let mut stream = agent.stream("What time is it right now?", Some(4));
    while let Some(event) = stream.next().await {
        let event = event?;
        match &event.data {
            AgentEventData::MessageDelta { text } => print!("{text}"),
            AgentEventData::ToolCall { tool_name, arguments, .. } => eprintln!(
                "\n[tool call] {} {}",
                tool_name.as_deref().unwrap_or("?"),
                arguments.as_deref().unwrap_or("")
            ),
            AgentEventData::ToolResult { output, .. } => eprintln!("[tool result] {output}"),
            _ => {}
        }
    }
    println!("\n---\n{}", stream.final_output().unwrap_or_default());
    Ok(())
}
