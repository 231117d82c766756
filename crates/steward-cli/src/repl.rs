//! Subcommand: `steward chat` -- interactive REPL.

use std::io::{self, Write as _};
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use steward_agent::AgentExecutor;

use crate::helpers::CtrlCGuard;

/// Run the chat loop until `exit`, end of input or Ctrl-C at the prompt.
///
/// Ctrl-C during a turn cancels only that turn.
pub async fn run_chat(executor: &AgentExecutor, session_id: &str) -> Result<()> {
    println!();
    println!("  Steward v{}", env!("CARGO_PKG_VERSION"));
    println!("  Provider: {}", executor.provider().name());
    println!("  Tools: {}", executor.registry().len());
    println!("  Session: {session_id}");
    println!("  Type your request, or 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush().ok();

        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read input")?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let Some(line) = line else {
            println!();
            info!("EOF received, exiting");
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") {
            info!("user requested exit");
            break;
        }

        let guard = CtrlCGuard::arm();
        let started = Instant::now();
        match executor.handle_turn(session_id, input, guard.token()).await {
            Ok(reply) => {
                println!("{reply}");
                println!("  ({} ms)", started.elapsed().as_millis());
            }
            Err(e) if e.is_cancelled() => println!("  (cancelled)"),
            Err(e) => eprintln!("  Error: {e}"),
        }
        println!();
    }

    Ok(())
}
