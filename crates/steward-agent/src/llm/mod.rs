//! LLM integration layer.
//!
//! - [`types`] -- Messages, roles, completion results.
//! - [`provider`] -- The [`CompletionProvider`] port.
//! - [`openai`] -- HTTP provider for OpenAI-compatible endpoints.
//! - [`echo`] -- Offline provider for local runs and tests.
//! - [`streaming`] -- SSE stream decoder.

pub mod echo;
pub mod openai;
pub mod provider;
pub mod streaming;
pub mod types;

pub use echo::EchoProvider;
pub use openai::OpenAiCompatibleProvider;
pub use provider::{CompletionProvider, SharedProvider};
pub use streaming::{SseLine, TokenStream, collect_text, decode_line, decode_sse};
pub use types::{CompletionResult, Message, Role, Usage};
