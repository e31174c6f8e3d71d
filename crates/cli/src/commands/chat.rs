//! `toolpilot chat` — Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use toolpilot_agent::AgentLoop;
use toolpilot_config::AppConfig;
use toolpilot_core::message::Conversation;
use tracing::info;

/// What one line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum ShellInput<'a> {
    Exit,
    Skip,
    Prompt(&'a str),
}

pub fn classify_input(line: &str) -> ShellInput<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        ShellInput::Skip
    } else if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        ShellInput::Exit
    } else {
        ShellInput::Prompt(trimmed)
    }
}

pub async fn run(
    config: AppConfig,
    message: Option<String>,
    max_iterations: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let provider = toolpilot_providers::build_from_config(&config)?;
    let tools = Arc::new(toolpilot_tools::default_registry(&config.tools)?);

    let mut agent = AgentLoop::new(provider, &config.model_name, config.temperature, tools)
        .with_max_iterations(max_iterations.unwrap_or(config.max_iterations).max(1))
        .with_unknown_tool_policy(config.unknown_tools);
    if let Some(max_tokens) = config.max_tokens {
        agent = agent.with_max_tokens(max_tokens);
    }

    let mut conv = Conversation::with_system_prompt(config.system_prompt());
    info!(
        conversation_id = %conv.id,
        model = %config.model_name,
        max_iterations = agent.max_iterations(),
        single_message = message.is_some(),
        "Chat session started"
    );

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let response = agent.run(&mut conv, &msg).await;
        eprint!("\r              \r");
        println!("{}", response?);
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Toolpilot — Interactive Mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Endpoint:  {}", config.base_url);
    println!("  Model:     {}", config.model_name);
    println!("  Tools:     read_file, write_file, execute_command");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or 'quit' to leave.");
    println!();

    interactive(&agent, &mut conv, BufReader::new(tokio::io::stdin())).await?;

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// Read prompts from `input` until `exit`, `quit` or end of input.
///
/// A failed turn is printed and the session carries on with the same
/// conversation.
pub async fn interactive<R>(
    agent: &AgentLoop,
    conv: &mut Conversation,
    input: R,
) -> Result<(), Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let prompt = match classify_input(&line) {
            ShellInput::Exit => break,
            ShellInput::Skip => continue,
            ShellInput::Prompt(prompt) => prompt,
        };

        eprint!("  Thinking...");
        match agent.run(conv, prompt).await {
            Ok(response) => {
                eprint!("\r              \r");
                println!();
                for line in response.lines() {
                    println!("  Assistant > {line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r              \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    Ok(())
}
