//! Agent runtime for Steward.
//!
//! Steward answers a user turn by asking a language model for a plan of tool
//! calls, running those tools in order and asking the model once more to
//! turn the tool observations into a reply.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌──────────────┐
//! │   Planner   │────>│ AgentExecutor │────>│ ToolRegistry │
//! │ (JSON plan) │     │ (turn loop)   │     │ (tools)      │
//! └──────┬──────┘     └───────┬───────┘     └──────────────┘
//!        │                    │
//!  ┌─────┴──────┐     ┌───────┴──────────┐
//!  │ PlanParser │     │ CompletionProvider│──> SSE decoder
//!  └────────────┘     └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`executor`] -- The plan/execute/observe turn loop.
//! - [`planner`] -- Planner trait, LLM-backed and direct planners.
//! - [`parser`] -- Plan types and the tolerant plan parser.
//! - [`tool`] -- Tool trait and the alias-aware registry.
//! - [`llm`] -- Messages, completion providers and SSE streaming.
//! - [`store`] -- Conversation store trait and in-memory store.
//! - [`observer`] -- Turn lifecycle hooks.
//! - [`config`] -- Runtime configuration.
//! - [`error`] -- Agent error types.

pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod observer;
pub mod parser;
pub mod planner;
pub mod store;
pub mod tool;

pub use config::StewardConfig;
pub use error::{AgentError, Result, ToolError};
pub use executor::{
    AgentExecutor, ERROR_REPLY, EmptyPlanPolicy, ExecutorConfig, FALLBACK_REPLY, NO_TOOLS_REPLY,
};
pub use llm::{
    CompletionProvider, CompletionResult, EchoProvider, Message, OpenAiCompatibleProvider, Role,
    SharedProvider, TokenStream,
};
pub use observer::{SharedObserver, TracingObserver, TurnObserver};
pub use parser::{Plan, PlanParse, PlanStep, parse_plan};
pub use planner::{DirectPlanner, LlmPlanner, Planner, SharedPlanner};
pub use store::{ConversationStore, InMemoryConversationStore, SharedStore};
pub use tool::{SharedTool, Tool, ToolRegistry};
