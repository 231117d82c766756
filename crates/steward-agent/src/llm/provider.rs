//! The completion provider port.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::llm::streaming::TokenStream;
use crate::llm::types::{CompletionResult, Message};

/// A text-generation service the agent delegates reasoning to.
///
/// Implementations must observe `cancel` for the duration of the network
/// call and return [`crate::AgentError::Cancelled`] once it fires.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short identifier used in logs (usually the model name).
    fn name(&self) -> &str;

    /// Produce a complete response for the given history.
    async fn complete(
        &self,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<CompletionResult>;

    /// Produce a lazy stream of text fragments for the given history.
    async fn stream(&self, history: &[Message], cancel: &CancellationToken)
    -> Result<TokenStream>;
}

/// Shared handle to a provider.
pub type SharedProvider = Arc<dyn CompletionProvider>;
