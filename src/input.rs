//! User-input collaborator
//!
//! User turns get their text from a `UserInput`: scripted for tests and
//! batch runs, or an interactive terminal prompt.

use crate::error::TemplateError;
use crate::session::Attributes;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// What the input collaborator sees when asked for a turn
#[derive(Debug, Clone, Copy)]
pub struct InputContext<'a> {
    pub attributes: &'a Attributes,
    pub prompt: Option<&'a str>,
    /// Used when the user submits nothing
    pub default: Option<&'a str>,
}

#[async_trait]
pub trait UserInput: Send + Sync {
    async fn get_input(&self, ctx: &InputContext<'_>) -> Result<String, TemplateError>;
}

#[async_trait]
impl<T: UserInput + ?Sized> UserInput for Arc<T> {
    async fn get_input(&self, ctx: &InputContext<'_>) -> Result<String, TemplateError> {
        (**self).get_input(ctx).await
    }
}

/// Replays a fixed list of replies, then falls back to the default
pub struct ScriptedInput {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedInput {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }

    pub async fn remaining(&self) -> usize {
        self.replies.lock().await.len()
    }
}

#[async_trait]
impl UserInput for ScriptedInput {
    async fn get_input(&self, ctx: &InputContext<'_>) -> Result<String, TemplateError> {
        if let Some(reply) = self.replies.lock().await.pop_front() {
            return Ok(reply);
        }
        ctx.default
            .map(str::to_string)
            .ok_or_else(|| TemplateError::Input("scripted input exhausted".to_string()))
    }
}

/// Line-oriented prompt over an async reader/writer pair.
///
/// Empty lines take the default when one exists and re-prompt otherwise.
pub struct TerminalInput<R, W> {
    io: Mutex<(BufReader<R>, W)>,
}

impl TerminalInput<tokio::io::Stdin, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> TerminalInput<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((BufReader::new(reader), writer)),
        }
    }

    pub fn into_inner(self) -> (R, W) {
        let (reader, writer) = self.io.into_inner();
        (reader.into_inner(), writer)
    }
}

fn io_error(e: &std::io::Error) -> TemplateError {
    TemplateError::Input(e.to_string())
}

#[async_trait]
impl<R, W> UserInput for TerminalInput<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn get_input(&self, ctx: &InputContext<'_>) -> Result<String, TemplateError> {
        let mut guard = self.io.lock().await;
        let (reader, writer) = &mut *guard;
        let prompt = match ctx.default {
            Some(default) => format!("{} [{default}] ", ctx.prompt.unwrap_or(">")),
            None => format!("{} ", ctx.prompt.unwrap_or(">")),
        };

        loop {
            writer.write_all(prompt.as_bytes()).await.map_err(|e| io_error(&e))?;
            writer.flush().await.map_err(|e| io_error(&e))?;

            let mut line = String::new();
            let read = reader.read_line(&mut line).await.map_err(|e| io_error(&e))?;
            if read == 0 {
                return ctx
                    .default
                    .map(str::to_string)
                    .ok_or_else(|| TemplateError::Input("input closed".to_string()));
            }

            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
            if let Some(default) = ctx.default {
                return Ok(default.to_string());
            }
            tracing::debug!("Empty input, prompting again");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ctx<'a>(attributes: &'a Attributes, default: Option<&'a str>) -> InputContext<'a> {
        InputContext {
            attributes,
            prompt: Some("you>"),
            default,
        }
    }

    #[tokio::test]
    async fn scripted_replays_then_defaults() {
        let attrs = Attributes::new();
        let input = ScriptedInput::new(["a", "b"]);
        assert_eq!(input.get_input(&ctx(&attrs, None)).await.unwrap(), "a");
        assert_eq!(input.get_input(&ctx(&attrs, None)).await.unwrap(), "b");
        assert_eq!(input.remaining().await, 0);
        assert_eq!(input.get_input(&ctx(&attrs, Some("d"))).await.unwrap(), "d");
        assert!(input.get_input(&ctx(&attrs, None)).await.is_err());
    }

    #[tokio::test]
    async fn terminal_reprompts_on_empty_line() {
        let attrs = Attributes::new();
        let input = TerminalInput::new(Cursor::new(b"\n  \nhello\n".to_vec()), Vec::new());
        let reply = input.get_input(&ctx(&attrs, None)).await.unwrap();
        assert_eq!(reply, "hello");

        let (_, written) = input.into_inner();
        let shown = String::from_utf8(written).unwrap();
        assert_eq!(shown.matches("you>").count(), 3);
    }

    #[tokio::test]
    async fn terminal_uses_default_for_empty_line() {
        let attrs = Attributes::new();
        let input = TerminalInput::new(Cursor::new(b"\n".to_vec()), Vec::new());
        let reply = input.get_input(&ctx(&attrs, Some("yes"))).await.unwrap();
        assert_eq!(reply, "yes");
    }

    #[tokio::test]
    async fn terminal_eof_without_default_is_error() {
        let attrs = Attributes::new();
        let input = TerminalInput::new(Cursor::new(Vec::new()), Vec::new());
        let err = input.get_input(&ctx(&attrs, None)).await.unwrap_err();
        assert!(matches!(err, TemplateError::Input(_)));
    }
}
