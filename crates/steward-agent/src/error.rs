//! Agent error types.
//!
//! Faults that can end a turn surface through [`AgentError`].  Failures that
//! belong to a single tool invocation surface through [`ToolError`] and are
//! folded back into the conversation as text instead of aborting the turn.

use std::time::Duration;

/// Unified error type for the agent runtime.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to the completion provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The provider response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The streaming SSE connection was interrupted.
    #[error("llm stream error: {reason}")]
    LlmStreamError { reason: String },

    // -- Conversation store ----------------------------------------------------
    /// The conversation store rejected an append or load.
    #[error("conversation store error: {reason}")]
    Store { reason: String },

    // -- Configuration errors ------------------------------------------------
    /// Configuration validation or loading failed.
    #[error("config error: {reason}")]
    Config { reason: String },

    // -- Control flow --------------------------------------------------------
    /// The caller's cancellation token fired before the work finished.
    #[error("operation cancelled")]
    Cancelled,

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal agent error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Returns `true` for [`AgentError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}

/// Failure reported by a single tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The tool ran but could not produce a result.
    #[error("{tool} failed: {reason}")]
    Failed { tool: String, reason: String },

    /// The input handed to the tool was unusable.
    #[error("invalid input for {tool}: {reason}")]
    InvalidInput { tool: String, reason: String },

    /// The tool did not finish within the executor's time budget.
    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    /// The tool observed the cancellation token and stopped.
    #[error("tool execution cancelled")]
    Cancelled,

    /// An outbound HTTP call made by the tool failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ToolError {
    /// Shorthand for [`ToolError::Failed`].
    pub fn failed(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}
