//! Planners turn conversation history into a [`Plan`].
//!
//! [`LlmPlanner`] asks the completion provider for a JSON plan and recovers
//! it with [`parse_plan`]; it only fails on provider faults or cancellation,
//! never on what the model wrote.  [`DirectPlanner`] never plans any tool
//! calls.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::llm::{Message, Role, SharedProvider};
use crate::parser::{Plan, PlanParse, parse_plan};
use crate::tool::ToolRegistry;

/// System instruction for the planning request.
pub const PLANNER_SYSTEM_PROMPT: &str = "\
You are a planning assistant. Produce a SINGLE JSON object ONLY, no commentary.
Output strictly one object that matches this schema:
{
  \"rationale\": \"string\",
  \"steps\": [ { \"tool\": \"ToolName\", \"input\": \"string\" } ]
}
Do not write any explanations or extra text before or after the JSON.";

/// Rationale of every plan returned by [`DirectPlanner`].
pub const DIRECT_RATIONALE: &str =
    "Baseline planner: no tools used; answer directly via the model.";

/// Produces a plan for the next turn.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Plan tool calls for the last message in `history`.
    async fn create_plan(
        &self,
        history: &[Message],
        registry: &ToolRegistry,
        cancel: &CancellationToken,
    ) -> Result<Plan>;
}

/// Shared handle to a planner.
pub type SharedPlanner = Arc<dyn Planner>;

// ---------------------------------------------------------------------------
// LLM planner
// ---------------------------------------------------------------------------

/// Planner backed by a completion provider.
#[derive(Clone)]
pub struct LlmPlanner {
    provider: SharedProvider,
}

impl LlmPlanner {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }

    /// Messages sent to the provider for planning.
    ///
    /// Tool messages are presented as assistant context since the planning
    /// model has no tool role of its own.
    pub fn build_messages(history: &[Message], registry: &ToolRegistry) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(PLANNER_SYSTEM_PROMPT));

        messages.extend(history.iter().map(|m| match m.role {
            Role::Tool => Message::assistant(m.content.clone()),
            _ => m.clone(),
        }));

        let inventory: Vec<String> = registry
            .all()
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect();
        messages.push(Message::user(format!(
            "Available tools:\n{}\n\nReturn only JSON as specified.",
            inventory.join("\n")
        )));

        messages
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn create_plan(
        &self,
        history: &[Message],
        registry: &ToolRegistry,
        cancel: &CancellationToken,
    ) -> Result<Plan> {
        let messages = Self::build_messages(history, registry);
        let response = self.provider.complete(&messages, cancel).await?;

        let text = response.text.trim();
        let parsed = parse_plan(text);
        match &parsed {
            PlanParse::Parsed(_) => {}
            PlanParse::NoJson => {
                tracing::warn!(raw = %text, "planner response contained no JSON");
            }
            PlanParse::Invalid(reason) => {
                tracing::warn!(raw = %text, reason = %reason, "planner response was not a valid plan");
            }
        }
        let plan = parsed.into_plan();

        tracing::debug!(
            provider = %self.provider.name(),
            step_count = plan.steps.len(),
            "plan parsed"
        );
        Ok(plan)
    }
}

// ---------------------------------------------------------------------------
// Direct planner
// ---------------------------------------------------------------------------

/// Planner that always answers directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectPlanner;

#[async_trait]
impl Planner for DirectPlanner {
    async fn create_plan(
        &self,
        _history: &[Message],
        _registry: &ToolRegistry,
        _cancel: &CancellationToken,
    ) -> Result<Plan> {
        Ok(Plan::empty(DIRECT_RATIONALE))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
