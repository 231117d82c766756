//! OpenAI-compatible completion provider.
//!
//! Talks to any server exposing the Chat Completions API (`llama.cpp`,
//! vLLM, Ollama, OpenAI itself) in both non-streaming and streaming SSE
//! modes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::config::LlmSettings;
use crate::error::{AgentError, Result};
use crate::llm::provider::CompletionProvider;
use crate::llm::streaming::{TokenStream, decode_sse};
use crate::llm::types::{CompletionResult, Message, Role, Usage};

/// Value recorded under `provider` in [`CompletionResult::provider_metadata`].
pub const PROVIDER_TAG: &str = "openai-compatible";

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Completion provider for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    settings: LlmSettings,
    http: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Create a provider from validated settings.
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { settings, http })
    }

    /// The endpoint requests are posted to.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    /// Build the JSON body for the Chat Completions API.
    pub fn build_request_body(&self, history: &[Message], stream: bool) -> Value {
        json!({
            "model": self.settings.model,
            "messages": messages_to_openai(history),
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
            "top_p": self.settings.top_p,
            "stream": stream,
        })
    }

    /// Send the request and return the response once a 2xx status arrived.
    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let url = self.endpoint();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = self.settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                    AgentError::LlmRequestFailed {
                        reason: format!("invalid authorization header: {e}"),
                    }
                })?,
            );
        }

        tracing::debug!(
            url = %url,
            model = %self.settings.model,
            stream = body["stream"].as_bool().unwrap_or(false),
            "sending completion request"
        );

        let resp = self
            .http
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::LlmRequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        Ok(resp)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.settings.model
    }

    async fn complete(
        &self,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<CompletionResult> {
        let body = self.build_request_body(history, false);

        let call = async {
            let resp = self.send(&body).await?;
            let text = resp
                .text()
                .await
                .map_err(|e| AgentError::LlmRequestFailed {
                    reason: format!("failed to read response body: {e}"),
                })?;
            let v: Value = serde_json::from_str(&text).map_err(|e| AgentError::LlmParseFailed {
                reason: format!("invalid JSON response: {e}"),
            })?;
            parse_completion(&v)
        };

        cancel
            .run_until_cancelled(call)
            .await
            .unwrap_or(Err(AgentError::Cancelled))
    }

    async fn stream(
        &self,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<TokenStream> {
        let body = self.build_request_body(history, true);

        let resp = cancel
            .run_until_cancelled(self.send(&body))
            .await
            .unwrap_or(Err(AgentError::Cancelled))?;

        Ok(decode_sse(resp.bytes_stream(), cancel.clone()))
    }
}

// ---------------------------------------------------------------------------
// Wire format conversion
// ---------------------------------------------------------------------------

/// Convert messages into the OpenAI Chat Completions wire format.
///
/// Tool-authored messages are sent with the `assistant` role: they carry no
/// `tool_call_id`, which the API requires for the `tool` role.
pub fn messages_to_openai(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant | Role::Tool => "assistant",
            };
            json!({ "role": role, "content": msg.content })
        })
        .collect()
}

/// Parse a non-streaming Chat Completions response.
pub fn parse_completion(v: &Value) -> Result<CompletionResult> {
    let choices = v["choices"]
        .as_array()
        .ok_or_else(|| AgentError::LlmParseFailed {
            reason: "missing `choices` in response".into(),
        })?;

    let first = choices.first();
    let text = first
        .and_then(|c| c["message"]["content"].as_str())
        .unwrap_or_default()
        .to_owned();
    let finish_reason = first
        .and_then(|c| c["finish_reason"].as_str())
        .unwrap_or_default()
        .to_owned();

    let usage = v.get("usage").filter(|u| u.is_object()).map(|u| Usage {
        prompt_tokens: u["prompt_tokens"].as_u64().and_then(|n| u32::try_from(n).ok()),
        completion_tokens: u["completion_tokens"].as_u64().and_then(|n| u32::try_from(n).ok()),
    });

    let mut metadata = HashMap::new();
    metadata.insert("provider".to_owned(), json!(PROVIDER_TAG));
    metadata.insert("finish_reason".to_owned(), json!(finish_reason));

    Ok(CompletionResult {
        text,
        usage,
        provider_metadata: Some(metadata),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
