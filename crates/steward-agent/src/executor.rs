//! The turn executor.
//!
//! One call to [`AgentExecutor::handle_turn`] runs a full plan/execute/observe
//! cycle:
//!
//! 1. Append the user message and load the session history.
//! 2. Ask the planner for a [`Plan`].
//! 3. Run every step in order.  Each tool output is wrapped in a labelled
//!    block, persisted as a tool message and kept as an observation.
//! 4. Ask the provider to summarise the observations into the final reply.
//! 5. Persist the reply as the assistant's message.
//!
//! Tool failures, unknown tools and malformed plans never abort a turn.  Any
//! other fault is logged and replaced by [`ERROR_REPLY`].  Only cancellation
//! escapes as an error, and a cancelled turn persists no assistant message.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{AgentError, Result, ToolError};
use crate::llm::{Message, SharedProvider};
use crate::observer::{SharedObserver, TracingObserver};
use crate::parser::{Plan, PlanStep};
use crate::planner::SharedPlanner;
use crate::store::SharedStore;
use crate::tool::{SharedTool, ToolRegistry};

/// Reply for an empty plan under [`EmptyPlanPolicy::Fallback`].
pub const FALLBACK_REPLY: &str = "I couldn't determine an action plan.";

/// Reply when a plan named only unknown tools.
pub const NO_TOOLS_REPLY: &str = "No tools were executed.";

/// Reply for a turn that hit an unexpected fault.
pub const ERROR_REPLY: &str = "Unexpected error occurred.";

/// System instruction for the summarising completion.
pub const SUMMARY_SYSTEM_PROMPT: &str = "\
You are an AI assistant that uses external tools such as WebSearch, Calendar, and Drive.
When a tool result is provided, assume it contains real information from the outside world.

Never apologize or say you cannot access the internet. That has already been handled by the tools.
If the WebSearch tool returns a link, summarize or include it helpfully.
If you get bullet points, summarize them clearly and concisely.
Always provide a confident, factual answer based on tool data.";

/// Wrap a tool's output in the block that is persisted and summarised.
pub fn tool_block(tool: &str, output: &str) -> String {
    format!("[Tool: {tool}]\n{output}\n[/Tool]")
}

/// Observation recorded for a step naming an unregistered tool.
pub fn unknown_tool_observation(tool: &str) -> String {
    format!("[Unknown tool: {tool}]")
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the planner returns no steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPlanPolicy {
    /// Reply with [`FALLBACK_REPLY`].
    #[default]
    Fallback,
    /// Send the history to the provider and reply with its answer.
    AnswerDirectly,
}

/// Executor tuning.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound for a single tool invocation.
    pub tool_timeout: Duration,
    pub empty_plan_policy: EmptyPlanPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tool_timeout: Duration::from_secs(60),
            empty_plan_policy: EmptyPlanPolicy::Fallback,
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs user turns against a planner, a tool registry and a provider.
pub struct AgentExecutor {
    store: SharedStore,
    planner: SharedPlanner,
    registry: ToolRegistry,
    provider: SharedProvider,
    observer: SharedObserver,
    config: ExecutorConfig,
}

impl AgentExecutor {
    /// Create an executor that reports through [`TracingObserver`].
    pub fn new(
        store: SharedStore,
        planner: SharedPlanner,
        registry: ToolRegistry,
        provider: SharedProvider,
    ) -> Self {
        Self {
            store,
            planner,
            registry,
            provider,
            observer: std::sync::Arc::new(TracingObserver),
            config: ExecutorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &SharedProvider {
        &self.provider
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run one user turn and return the assistant's reply.
    ///
    /// Returns `Err` only with [`AgentError::Cancelled`].
    pub async fn handle_turn(
        &self,
        session_id: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let turn_id = Uuid::now_v7().to_string();
        let started = Instant::now();
        self.observer.turn_started(session_id, &turn_id);

        let span = tracing::info_span!("turn", session_id = %session_id, turn_id = %turn_id);
        let outcome = self
            .run_turn(session_id, input, cancel)
            .instrument(span)
            .await;

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) if e.is_cancelled() || cancel.is_cancelled() => {
                self.observer.turn_cancelled(session_id);
                return Err(AgentError::Cancelled);
            }
            Err(e) => {
                self.observer.turn_failed(session_id, &e);
                ERROR_REPLY.to_owned()
            }
        };

        if let Err(e) = self
            .store
            .append(session_id, Message::assistant(reply.clone()))
            .await
        {
            tracing::error!(session_id, error = %e, "failed to persist assistant reply");
        }

        self.observer
            .turn_completed(session_id, started.elapsed(), &reply);
        Ok(reply)
    }

    async fn run_turn(
        &self,
        session_id: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.store.append(session_id, Message::user(input)).await?;
        let history = self.store.load(session_id).await?;

        ensure_active(cancel)?;
        let plan = self
            .planner
            .create_plan(&history, &self.registry, cancel)
            .await?;
        self.observer.plan_created(session_id, &plan);

        if plan.is_empty() {
            return match self.config.empty_plan_policy {
                EmptyPlanPolicy::Fallback => Ok(FALLBACK_REPLY.to_owned()),
                EmptyPlanPolicy::AnswerDirectly => self.complete(&history, cancel).await,
            };
        }

        let (observations, executed) = self.execute_plan(session_id, &plan, cancel).await?;
        if executed == 0 {
            return Ok(NO_TOOLS_REPLY.to_owned());
        }

        let mut messages = history;
        messages.push(Message::system(SUMMARY_SYSTEM_PROMPT));
        messages.push(Message::user(observations.join("\n\n")));
        self.complete(&messages, cancel).await
    }

    /// Run the steps in order.  Returns the observations and how many steps
    /// reached a registered tool.
    async fn execute_plan(
        &self,
        session_id: &str,
        plan: &Plan,
        cancel: &CancellationToken,
    ) -> Result<(Vec<String>, usize)> {
        let mut observations = Vec::with_capacity(plan.steps.len());
        let mut executed = 0;

        for (index, step) in plan.steps.iter().enumerate() {
            ensure_active(cancel)?;

            let Some(tool) = self.registry.try_get(&step.tool) else {
                self.observer.unknown_tool(session_id, index, &step.tool);
                observations.push(unknown_tool_observation(&step.tool));
                continue;
            };

            let output = self
                .run_tool(session_id, index, &tool, step, cancel)
                .await?;
            let block = tool_block(tool.name(), &output);
            self.store
                .append(session_id, Message::tool(tool.name(), block.clone()))
                .await?;

            observations.push(block);
            executed += 1;
        }

        Ok((observations, executed))
    }

    /// Invoke one tool.  Tool failures become the observation text.
    async fn run_tool(
        &self,
        session_id: &str,
        index: usize,
        tool: &SharedTool,
        step: &PlanStep,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.observer.tool_started(session_id, index, tool.name());
        let started = Instant::now();

        let call = tokio::time::timeout(self.config.tool_timeout, tool.execute(&step.input, cancel));
        let result = match cancel.run_until_cancelled(call).await {
            None => return Err(AgentError::Cancelled),
            Some(Ok(result)) => result,
            Some(Err(_elapsed)) => Err(ToolError::Timeout {
                tool: tool.name().to_owned(),
                after: self.config.tool_timeout,
            }),
        };
        let elapsed = started.elapsed();

        match result {
            Ok(output) => {
                self.observer
                    .tool_finished(session_id, index, tool.name(), elapsed, None);
                Ok(output)
            }
            Err(ToolError::Cancelled) if cancel.is_cancelled() => Err(AgentError::Cancelled),
            Err(e) => {
                self.observer
                    .tool_finished(session_id, index, tool.name(), elapsed, Some(&e));
                Ok(e.to_string())
            }
        }
    }

    async fn complete(&self, messages: &[Message], cancel: &CancellationToken) -> Result<String> {
        let result = self.provider.complete(messages, cancel).await?;
        if let Some(usage) = result.usage {
            tracing::debug!(
                provider = %self.provider.name(),
                prompt_tokens = ?usage.prompt_tokens,
                completion_tokens = ?usage.completion_tokens,
                "completion usage"
            );
        }
        Ok(result.text)
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(AgentError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::llm::{CompletionProvider, CompletionResult, Role, TokenStream};
    use crate::planner::Planner;
    use crate::store::{ConversationStore, InMemoryConversationStore};
    use crate::tool::Tool;

    struct FixedPlanner(Plan);

    #[async_trait]
    impl Planner for FixedPlanner {
        async fn create_plan(
            &self,
            _: &[Message],
            _: &ToolRegistry,
            _: &CancellationToken,
        ) -> Result<Plan> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn complete(&self, history: &[Message], _: &CancellationToken) -> Result<CompletionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CompletionResult::text(format!("answered {} messages", history.len())))
        }

        async fn stream(&self, _: &[Message], _: &CancellationToken) -> Result<TokenStream> {
            Err(AgentError::Internal("not used".into()))
        }
    }

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "Sleepy"
        }

        fn description(&self) -> &str {
            "never finishes in time"
        }

        async fn execute(&self, _: &str, _: &CancellationToken) -> std::result::Result<String, ToolError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("late".into())
        }
    }

    fn executor(plan: Plan, provider: Arc<CountingProvider>) -> (AgentExecutor, InMemoryConversationStore) {
        let store = InMemoryConversationStore::new();
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Sleepy));
        let executor = AgentExecutor::new(
            Arc::new(store.clone()),
            Arc::new(FixedPlanner(plan)),
            registry,
            provider,
        );
        (executor, store)
    }

    #[test]
    fn block_format() {
        assert_eq!(tool_block("WebSearch", "hits"), "[Tool: WebSearch]\nhits\n[/Tool]");
        assert_eq!(unknown_tool_observation("Fax"), "[Unknown tool: Fax]");
    }

    #[tokio::test]
    async fn empty_plan_answer_directly_uses_provider() {
        let provider = Arc::new(CountingProvider::default());
        let (executor, store) = executor(Plan::empty(""), provider.clone());
        let executor = executor.with_config(ExecutorConfig {
            empty_plan_policy: EmptyPlanPolicy::AnswerDirectly,
            ..ExecutorConfig::default()
        });

        let reply = executor
            .handle_turn("s", "hello", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply, "answered 1 messages");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.load("s").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn only_unknown_tools_skip_summary() {
        let provider = Arc::new(CountingProvider::default());
        let plan = Plan::new(vec![PlanStep::new("Fax", "x"), PlanStep::new("Pager", "y")], "");
        let (executor, store) = executor(plan, provider.clone());

        let reply = executor
            .handle_turn("s", "send it", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply, NO_TOOLS_REPLY);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        let roles: Vec<Role> = store.load("s").await.unwrap().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out_into_observation() {
        let provider = Arc::new(CountingProvider::default());
        let plan = Plan::new(vec![PlanStep::new("sleepy", "")], "");
        let (executor, store) = executor(plan, provider.clone());
        let executor = executor.with_config(ExecutorConfig {
            tool_timeout: Duration::from_millis(50),
            ..ExecutorConfig::default()
        });

        let reply = executor
            .handle_turn("s", "go", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply, "answered 3 messages");
        let history = store.load("s").await.unwrap();
        assert_eq!(history[1].role, Role::Tool);
        assert!(history[1].content.starts_with("[Tool: Sleepy]\nSleepy timed out after"));
    }
}
