//! Offline provider that echoes the last message back.
//!
//! Useful for exercising the full loop without a model server.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::llm::provider::CompletionProvider;
use crate::llm::streaming::TokenStream;
use crate::llm::types::{CompletionResult, Message};

/// Delay between streamed characters.
const TOKEN_DELAY: Duration = Duration::from_millis(5);

/// A provider that answers with the content of the last message.
#[derive(Debug, Clone, Default)]
pub struct EchoProvider;

impl EchoProvider {
    fn last_content(history: &[Message]) -> &str {
        history
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or("(empty)")
    }
}

#[async_trait]
impl CompletionProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(
        &self,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<CompletionResult> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        Ok(CompletionResult::text(format!(
            "[echo] {}",
            Self::last_content(history)
        )))
    }

    async fn stream(
        &self,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<TokenStream> {
        let text = format!("[echo-stream] {}", Self::last_content(history));
        let cancel = cancel.clone();

        Ok(Box::pin(async_stream::stream! {
            for ch in text.chars() {
                if cancel.is_cancelled() {
                    yield Err(AgentError::Cancelled);
                    return;
                }
                yield Ok(ch.to_string());
                tokio::time::sleep(TOKEN_DELAY).await;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::llm::streaming::collect_text;

    #[tokio::test]
    async fn complete_echoes_last_message() {
        let history = vec![Message::system("sys"), Message::user("ping")];
        let result = EchoProvider
            .complete(&history, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.text, "[echo] ping");

        let empty = EchoProvider
            .complete(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(empty.text, "[echo] (empty)");
    }

    #[tokio::test]
    async fn stream_yields_one_char_per_token() {
        let stream = EchoProvider
            .stream(&[Message::user("ok")], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(collect_text(stream).await.unwrap(), "[echo-stream] ok");
    }

    #[tokio::test]
    async fn stream_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let mut stream = EchoProvider
            .stream(&[Message::user("long input")], &cancel)
            .await
            .unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "[");
        cancel.cancel();
        assert!(matches!(stream.next().await, Some(Err(AgentError::Cancelled))));
        assert!(stream.next().await.is_none());
    }
}
