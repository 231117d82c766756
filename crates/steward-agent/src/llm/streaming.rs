//! SSE stream decoder for OpenAI-compatible chat completion streams.
//!
//! The server sends `data:` lines whose payloads are JSON objects carrying
//! `choices[0].delta.content`, and terminates with a `data: [DONE]`
//! sentinel.  [`decode_line`] classifies a single line; [`decode_sse`] turns
//! a live byte stream into a lazy, cancellable [`TokenStream`].
//!
//! The returned stream owns the underlying byte source.  The source (and
//! with it the HTTP connection) is dropped when the stream finishes, when
//! the consumer drops the stream early, or when the cancellation token
//! fires, whichever comes first.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};

/// The terminator payload that ends a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A lazy, forward-only sequence of text fragments.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

// ---------------------------------------------------------------------------
// Line decoding
// ---------------------------------------------------------------------------

/// Classification of a single SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// A text fragment to hand to the consumer.
    Token(String),
    /// The `[DONE]` sentinel.
    Done,
    /// Not a `data:` line, or a data payload without text content.
    Ignored,
    /// A `data:` payload that is not valid JSON.
    Malformed(String),
}

/// Classify one line of an SSE response.
pub fn decode_line(line: &str) -> SseLine {
    let Some(payload) = line.trim_end().strip_prefix("data:") else {
        return SseLine::Ignored;
    };

    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return SseLine::Done;
    }

    let v: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => return SseLine::Malformed(e.to_string()),
    };

    match v["choices"][0]["delta"]["content"].as_str() {
        Some(content) => SseLine::Token(content.to_owned()),
        None => SseLine::Ignored,
    }
}

// ---------------------------------------------------------------------------
// Line buffering
// ---------------------------------------------------------------------------

/// Splits an arbitrary chunking of bytes into complete lines.
///
/// Bytes are buffered rather than decoded per chunk so that a multi-byte
/// UTF-8 sequence split across two network reads is reassembled intact.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
    closed: bool,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Mark the source as exhausted so the trailing partial line is flushed.
    fn close(&mut self) {
        self.closed = true;
    }

    fn next_line(&mut self) -> Option<String> {
        let line_bytes: Vec<u8> = match self.pending.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                line.pop();
                line
            }
            None if self.closed && !self.pending.is_empty() => std::mem::take(&mut self.pending),
            None => return None,
        };

        let mut line = String::from_utf8_lossy(&line_bytes).into_owned();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }
}

// ---------------------------------------------------------------------------
// Stream decoding
// ---------------------------------------------------------------------------

/// Decode a byte stream of server-sent events into text tokens.
///
/// Malformed `data:` lines are skipped.  The sequence ends at `[DONE]`
/// (nothing after it is read), at the end of the source, on a read error
/// (yielded once as [`AgentError::LlmStreamError`]), or on cancellation
/// (yielded once as [`AgentError::Cancelled`] after the source is dropped).
pub fn decode_sse<S, B, E>(source: S, cancel: CancellationToken) -> TokenStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut source = Box::pin(source);
        let mut buffer = LineBuffer::default();
        let mut emitted: usize = 0;

        loop {
            while let Some(line) = buffer.next_line() {
                if cancel.is_cancelled() {
                    drop(source);
                    tracing::debug!(emitted, "token stream cancelled");
                    yield Err(AgentError::Cancelled);
                    return;
                }

                match decode_line(&line) {
                    SseLine::Token(token) => {
                        emitted += 1;
                        yield Ok(token);
                    }
                    SseLine::Done => {
                        tracing::debug!(emitted, "token stream finished");
                        return;
                    }
                    SseLine::Malformed(reason) => {
                        tracing::debug!(reason = %reason, "skipping malformed SSE chunk");
                    }
                    SseLine::Ignored => {}
                }
            }

            if buffer.closed {
                tracing::debug!(emitted, "token stream closed by server");
                return;
            }

            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                chunk = source.next() => Some(chunk),
            };

            match next {
                None => {
                    drop(source);
                    tracing::debug!(emitted, "token stream cancelled");
                    yield Err(AgentError::Cancelled);
                    return;
                }
                Some(Some(Ok(bytes))) => buffer.push(bytes.as_ref()),
                Some(Some(Err(e))) => {
                    drop(source);
                    yield Err(AgentError::LlmStreamError {
                        reason: format!("stream read error: {e}"),
                    });
                    return;
                }
                Some(None) => buffer.close(),
            }
        }
    })
}

/// Drain a token stream into a single string.
pub async fn collect_text(mut tokens: TokenStream) -> Result<String> {
    let mut text = String::new();
    while let Some(token) = tokens.next().await {
        text.push_str(&token?);
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    use super::*;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = std::result::Result<&'static str, String>> + Send + 'static {
        futures::stream::iter(parts.iter().copied().map(Ok).collect::<Vec<_>>())
    }

    fn delta(text: &str) -> String {
        format!("data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"{text}\"}}}}]}}\n")
    }

    async fn tokens_of(stream: TokenStream) -> Vec<String> {
        stream.map(|t| t.unwrap()).collect().await
    }

    /// Byte source that records how far it has been polled and whether it
    /// has been dropped.
    struct Tracked {
        items: Vec<String>,
        reads: Arc<AtomicUsize>,
        dropped: Arc<AtomicBool>,
    }

    impl Stream for Tracked {
        type Item = std::result::Result<String, String>;

        fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            let read = self.reads.fetch_add(1, Ordering::SeqCst);
            if read < self.items.len() {
                Poll::Ready(Some(Ok(self.items[read].clone())))
            } else {
                Poll::Ready(None)
            }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn decode_line_variants() {
        assert_eq!(
            decode_line(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#),
            SseLine::Token("Hi".into())
        );
        assert_eq!(decode_line("data: [DONE]"), SseLine::Done);
        assert_eq!(decode_line("data:[DONE]\r"), SseLine::Done);
        assert_eq!(decode_line(": keepalive"), SseLine::Ignored);
        assert_eq!(decode_line("event: message"), SseLine::Ignored);
        assert_eq!(decode_line(""), SseLine::Ignored);
        assert_eq!(
            decode_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseLine::Ignored
        );
        assert!(matches!(decode_line("data: {oops"), SseLine::Malformed(_)));
    }

    #[tokio::test]
    async fn tokens_in_order() {
        let body = format!("{}{}data: [DONE]\n", delta("Hello"), delta(" world"));
        let source = futures::stream::iter(vec![Ok::<_, String>(body)]);
        let stream = decode_sse(source, CancellationToken::new());
        assert_eq!(tokens_of(stream).await, vec!["Hello", " world"]);
    }

    #[tokio::test]
    async fn done_ends_sequence_regardless_of_trailing_bytes() {
        let body = format!(
            "{}data: [DONE]\n{}garbage that is never decoded",
            delta("only"),
            delta("after-done")
        );
        let source = futures::stream::iter(vec![Ok::<_, String>(body)]);
        let stream = decode_sse(source, CancellationToken::new());
        assert_eq!(tokens_of(stream).await, vec!["only"]);
    }

    #[tokio::test]
    async fn malformed_line_between_good_lines_is_skipped() {
        let body = format!("{}data: {{not json}}\n{}", delta("a"), delta("b"));
        let source = futures::stream::iter(vec![Ok::<_, String>(body)]);
        let stream = decode_sse(source, CancellationToken::new());
        assert_eq!(tokens_of(stream).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn lines_split_across_chunks() {
        let stream = decode_sse(
            chunks(&[
                "data: {\"choices\":[{\"delta\":",
                "{\"content\":\"joined\"}}]}\r\n\r\n",
                "data: [DO",
                "NE]\n",
            ]),
            CancellationToken::new(),
        );
        assert_eq!(tokens_of(stream).await, vec!["joined"]);
    }

    #[tokio::test]
    async fn multibyte_character_split_across_chunks() {
        let line = delta("héllo");
        let bytes = line.into_bytes();
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let (a, b) = bytes.split_at(split);
        let source = futures::stream::iter(vec![Ok::<_, String>(a.to_vec()), Ok(b.to_vec())]);
        let stream = decode_sse(source, CancellationToken::new());
        assert_eq!(tokens_of(stream).await, vec!["héllo"]);
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_decoded() {
        let body = r#"data: {"choices":[{"delta":{"content":"tail"}}]}"#;
        let stream = decode_sse(chunks(&[body]), CancellationToken::new());
        assert_eq!(tokens_of(stream).await, vec!["tail"]);
    }

    #[tokio::test]
    async fn read_error_is_surfaced_once() {
        let source = futures::stream::iter(vec![
            Ok(delta("first")),
            Err("connection reset".to_owned()),
            Ok(delta("never")),
        ]);
        let results: Vec<Result<String>> = decode_sse(source, CancellationToken::new()).collect().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "first");
        assert!(matches!(results[1], Err(AgentError::LlmStreamError { .. })));
    }

    #[tokio::test]
    async fn cancellation_stops_reads_and_releases_source() {
        let reads = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicBool::new(false));
        let source = Tracked {
            items: vec![delta("one"), delta("two"), delta("three")],
            reads: reads.clone(),
            dropped: dropped.clone(),
        };

        let cancel = CancellationToken::new();
        let mut stream = decode_sse(source, cancel.clone());

        assert_eq!(stream.next().await.unwrap().unwrap(), "one");
        cancel.cancel();

        let next = stream.next().await.unwrap();
        assert!(matches!(next, Err(AgentError::Cancelled)));
        assert!(dropped.load(Ordering::SeqCst), "source must be released");
        assert_eq!(reads.load(Ordering::SeqCst), 1, "no reads after cancellation");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn cancellation_between_lines_of_one_chunk() {
        let reads = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicBool::new(false));
        let source = Tracked {
            items: vec![format!("{}{}{}", delta("a"), delta("b"), delta("c"))],
            reads: reads.clone(),
            dropped: dropped.clone(),
        };

        let cancel = CancellationToken::new();
        let mut stream = decode_sse(source, cancel.clone());

        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        cancel.cancel();

        let next = stream.next().await.unwrap();
        assert!(matches!(next, Err(AgentError::Cancelled)));
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn early_drop_releases_source() {
        let dropped = Arc::new(AtomicBool::new(false));
        let source = Tracked {
            items: vec![delta("one"), delta("two")],
            reads: Arc::new(AtomicUsize::new(0)),
            dropped: dropped.clone(),
        };

        let mut stream = decode_sse(source, CancellationToken::new());
        assert_eq!(stream.next().await.unwrap().unwrap(), "one");
        drop(stream);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn collect_text_joins_tokens() {
        let body = format!("{}{}data: [DONE]\n", delta("foo"), delta("bar"));
        let source = futures::stream::iter(vec![Ok::<_, String>(body)]);
        let text = collect_text(decode_sse(source, CancellationToken::new())).await.unwrap();
        assert_eq!(text, "foobar");
    }
}
