//! CLI entry point for Steward.
//!
//! Provides the `steward` command: an interactive chat, one-shot turns, a
//! raw streaming completion and a tool listing.

mod cli;
mod helpers;
mod repl;

use std::io::{self, Write as _};

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;

use steward_agent::{AgentExecutor, Message};

use crate::cli::{Cli, Commands};
use crate::helpers::{CtrlCGuard, build_executor, build_provider, init_tracing, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = init_tracing();
    let config = load_config(cli.config.as_deref())?;
    logging.apply_level(&config.logging.level);

    let session_id = cli
        .session
        .clone()
        .unwrap_or_else(|| config.agent.default_session_id.clone());

    let provider = build_provider(&config)?;
    let executor = build_executor(&config, provider);

    match cli.command {
        Commands::Chat => repl::run_chat(&executor, &session_id).await,
        Commands::Ask { prompt } => cmd_ask(&executor, &session_id, &prompt.join(" ")).await,
        Commands::Stream { prompt } => cmd_stream(&executor, &prompt.join(" ")).await,
        Commands::Tools => {
            cmd_tools(&executor);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_ask(executor: &AgentExecutor, session_id: &str, prompt: &str) -> Result<()> {
    let guard = CtrlCGuard::arm();
    let reply = executor
        .handle_turn(session_id, prompt, guard.token())
        .await
        .context("turn cancelled")?;
    println!("{reply}");
    Ok(())
}

async fn cmd_stream(executor: &AgentExecutor, prompt: &str) -> Result<()> {
    let guard = CtrlCGuard::arm();
    let mut tokens = executor
        .provider()
        .stream(&[Message::user(prompt)], guard.token())
        .await
        .context("failed to start stream")?;

    let mut stdout = io::stdout();
    while let Some(token) = tokens.next().await {
        match token {
            Ok(text) => {
                print!("{text}");
                stdout.flush().ok();
            }
            Err(e) if e.is_cancelled() => {
                println!("\n  (cancelled)");
                return Ok(());
            }
            Err(e) => {
                println!();
                return Err(e).context("stream interrupted");
            }
        }
    }
    println!();
    Ok(())
}

fn cmd_tools(executor: &AgentExecutor) {
    let tools = executor.registry().all();
    if tools.is_empty() {
        println!("  No tools registered.");
        return;
    }
    for tool in tools {
        println!("  {:<12} {}", tool.name(), tool.description());
    }
}
