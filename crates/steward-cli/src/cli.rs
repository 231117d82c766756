//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Steward -- a tool-using conversational agent.
#[derive(Debug, Parser)]
#[command(
    name = "steward",
    version,
    about = "Steward -- a tool-using conversational agent",
    long_about = "Plans tool calls with a language model, runs them, and answers \
                  from the tool results."
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Conversation session id (defaults to `agent.default_session_id`).
    #[arg(long, short, global = true)]
    pub session: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start an interactive chat.  Type `exit` to quit.
    Chat,

    /// Run a single turn and print the reply.
    Ask {
        /// The user message.
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// Stream a direct completion, printing tokens as they arrive.
    Stream {
        /// The user message.
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// List the registered tools.
    Tools,
}
