//! Turn observation hooks.
//!
//! The executor reports what happens during a turn through a
//! [`TurnObserver`] handed to it at construction.  [`TracingObserver`] turns
//! every notification into a `tracing` event.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, ToolError};
use crate::parser::Plan;

/// Receives lifecycle notifications from the executor.
///
/// All methods default to no-ops so implementors only override what they
/// care about.
pub trait TurnObserver: Send + Sync {
    /// A turn started for `session_id`.
    fn turn_started(&self, _session_id: &str, _turn_id: &str) {}

    /// The planner returned `plan`.
    fn plan_created(&self, _session_id: &str, _plan: &Plan) {}

    /// Step `index` is about to invoke `tool`.
    fn tool_started(&self, _session_id: &str, _index: usize, _tool: &str) {}

    /// Step `index` finished.  `error` is set when the tool failed.
    fn tool_finished(
        &self,
        _session_id: &str,
        _index: usize,
        _tool: &str,
        _elapsed: Duration,
        _error: Option<&ToolError>,
    ) {
    }

    /// Step `index` named a tool the registry does not know.
    fn unknown_tool(&self, _session_id: &str, _index: usize, _tool: &str) {}

    /// The turn produced `reply`.
    fn turn_completed(&self, _session_id: &str, _elapsed: Duration, _reply: &str) {}

    /// The turn hit a fault and is answering with the fixed error reply.
    fn turn_failed(&self, _session_id: &str, _error: &AgentError) {}

    /// The caller cancelled the turn.
    fn turn_cancelled(&self, _session_id: &str) {}
}

/// Shared handle to an observer.
pub type SharedObserver = Arc<dyn TurnObserver>;

/// Forwards notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TurnObserver for TracingObserver {
    fn turn_started(&self, session_id: &str, turn_id: &str) {
        tracing::debug!(session_id, turn_id, "turn started");
    }

    fn plan_created(&self, session_id: &str, plan: &Plan) {
        tracing::info!(
            session_id,
            step_count = plan.steps.len(),
            rationale = %plan.rationale,
            "plan created"
        );
    }

    fn tool_started(&self, session_id: &str, index: usize, tool: &str) {
        tracing::info!(session_id, step_index = index, tool, "executing tool");
    }

    fn tool_finished(
        &self,
        session_id: &str,
        index: usize,
        tool: &str,
        elapsed: Duration,
        error: Option<&ToolError>,
    ) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match error {
            None => tracing::info!(session_id, step_index = index, tool, elapsed_ms, "tool finished"),
            Some(e) => tracing::warn!(
                session_id,
                step_index = index,
                tool,
                elapsed_ms,
                error = %e,
                "tool failed"
            ),
        }
    }

    fn unknown_tool(&self, session_id: &str, index: usize, tool: &str) {
        tracing::warn!(session_id, step_index = index, tool, "unknown tool in plan");
    }

    fn turn_completed(&self, session_id: &str, elapsed: Duration, reply: &str) {
        tracing::info!(
            session_id,
            elapsed_ms = elapsed.as_millis() as u64,
            reply_len = reply.len(),
            "turn completed"
        );
    }

    fn turn_failed(&self, session_id: &str, error: &AgentError) {
        tracing::error!(session_id, error = %error, "turn failed");
    }

    fn turn_cancelled(&self, session_id: &str) {
        tracing::info!(session_id, "turn cancelled");
    }
}
