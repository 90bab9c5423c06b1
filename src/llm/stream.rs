//! Streaming generation output
//!
//! A `MessageStream` is a finite, non-restartable sequence of assistant
//! message deltas. Cancelling it ends the sequence at the next poll.

use super::{ContentBlock, LlmError, LlmResponse, Usage};
use crate::session::ToolCall;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

/// Partial assistant message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDelta {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

impl MessageDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Cancellable lazy sequence of message deltas
pub struct MessageStream {
    inner: Option<BoxStream<'static, Result<MessageDelta, LlmError>>>,
    cancel: CancellationToken,
}

impl MessageStream {
    pub fn new(inner: impl Stream<Item = Result<MessageDelta, LlmError>> + Send + 'static) -> Self {
        Self {
            inner: Some(inner.boxed()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_deltas(deltas: Vec<MessageDelta>) -> Self {
        Self::new(stream::iter(deltas.into_iter().map(Ok)))
    }

    /// One-chunk stream carrying a complete response
    pub fn from_response(response: LlmResponse) -> Self {
        let delta = MessageDelta {
            text: response.joined_text(),
            tool_calls: response.tool_calls(),
            usage: Some(response.usage),
        };
        Self::from_deltas(vec![delta])
    }

    pub fn from_error(error: LlmError) -> Self {
        Self::new(stream::once(async move { Err(error) }))
    }

    /// Token that ends the stream when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Next delta, or `None` once the stream is exhausted or cancelled
    pub async fn next(&mut self) -> Option<Result<MessageDelta, LlmError>> {
        let cancel = self.cancel.clone();
        let item = {
            let inner = self.inner.as_mut()?;
            tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                item = inner.next() => item,
            }
        };
        if item.is_none() {
            self.inner = None;
        }
        item
    }

    /// Drain the stream into a full response
    pub async fn collect(self) -> Result<LlmResponse, LlmError> {
        self.collect_with(|_| {}).await
    }

    /// Drain the stream, handing each delta to `on_delta` as it arrives
    pub async fn collect_with(
        mut self,
        mut on_delta: impl FnMut(&MessageDelta) + Send,
    ) -> Result<LlmResponse, LlmError> {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut usage = Usage::default();

        while let Some(item) = self.next().await {
            let delta = item?;
            on_delta(&delta);
            text.push_str(&delta.text);
            tool_calls.extend(delta.tool_calls);
            if let Some(chunk_usage) = delta.usage {
                usage = usage.combine(chunk_usage);
            }
        }

        if self.cancel.is_cancelled() {
            return Err(LlmError::cancelled());
        }

        let mut content = Vec::with_capacity(tool_calls.len() + 1);
        if !text.is_empty() {
            content.push(ContentBlock::Text { text });
        }
        content.extend(
            tool_calls
                .into_iter()
                .map(|call| ContentBlock::tool_use(call.id, call.name, call.arguments)),
        );

        Ok(LlmResponse {
            content,
            end_turn: true,
            usage,
        })
    }
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream")
            .field("exhausted", &self.inner.is_none())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn collects_text_and_tool_calls() {
        let stream = MessageStream::from_deltas(vec![
            MessageDelta::text("Hel"),
            MessageDelta::text("lo"),
            MessageDelta {
                tool_calls: vec![ToolCall::new("t1", "lookup", json!({}))],
                usage: Some(Usage {
                    input_tokens: 3,
                    output_tokens: 2,
                }),
                ..MessageDelta::default()
            },
        ]);

        let mut seen = 0;
        let response = stream.collect_with(|_| seen += 1).await.unwrap();
        assert_eq!(seen, 3);
        assert_eq!(response.joined_text(), "Hello");
        assert_eq!(response.tool_calls().len(), 1);
        assert_eq!(response.usage.output_tokens, 2);
    }

    #[tokio::test]
    async fn stream_is_not_restartable() {
        let mut stream = MessageStream::from_deltas(vec![MessageDelta::text("x")]);
        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_ends_stream() {
        let mut stream = MessageStream::new(stream::iter(
            (0..100).map(|i| Ok(MessageDelta::text(i.to_string()))),
        ));
        assert!(stream.next().await.is_some());
        stream.cancel();
        assert!(stream.next().await.is_none());
        assert!(stream.is_cancelled());
    }

    #[tokio::test]
    async fn collect_reports_cancellation() {
        let stream = MessageStream::from_deltas(vec![MessageDelta::text("x")]);
        let token = stream.cancel_token();
        token.cancel();
        let err = stream.collect().await.unwrap_err();
        assert_eq!(err.kind, super::super::LlmErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn error_item_aborts_collect() {
        let stream = MessageStream::from_error(LlmError::network("reset"));
        let err = stream.collect().await.unwrap_err();
        assert!(err.is_retryable());
    }
}
