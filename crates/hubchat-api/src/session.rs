//! One chat stream session: the read loop over a response body.
//!
//! The session owns the body reader, a streaming UTF-8 decoder and the SSE
//! framer. Each loop iteration suspends on one read (or on cancellation),
//! then frames and dispatches every complete event synchronously.

use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use hubchat_types::{ChatError, ChatHandler};
use tokio_util::sync::CancellationToken;

use crate::decode::Utf8Decoder;
use crate::sse::{SseEvent, SseParser};

/// Upper bound on body reads for one session.
pub const DEFAULT_MAX_ITERATIONS: u64 = 100_000;

/// Where a session stands. Every state except `Streaming` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Streaming,
    /// `on_done` was delivered.
    Completed,
    /// `on_error` was delivered.
    Failed,
    /// Cancelled by the caller; nothing was delivered.
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self != SessionState::Streaming
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub state: SessionState,
    /// Body reads attempted, including the one that tripped the limit.
    pub reads: u64,
    /// Whether a body reader was obtained and released.
    pub reader_released: bool,
}

impl SessionReport {
    /// Report for a session that ended before a body reader existed.
    pub fn before_body(state: SessionState) -> Self {
        Self {
            state,
            reads: 0,
            reader_released: false,
        }
    }
}

/// Single owner of the response body. Releasing drops the underlying
/// stream; releasing again is a no-op.
pub struct ReaderGuard<S> {
    reader: Option<Pin<Box<S>>>,
}

impl<S> ReaderGuard<S> {
    pub fn new(reader: S) -> Self {
        Self {
            reader: Some(Box::pin(reader)),
        }
    }

    pub fn is_released(&self) -> bool {
        self.reader.is_none()
    }

    /// Drop the reader. Returns `true` only for the call that released it.
    pub fn release(&mut self) -> bool {
        match self.reader.take() {
            Some(reader) => {
                drop(reader);
                tracing::debug!("body reader released");
                true
            }
            None => false,
        }
    }

    fn get_mut(&mut self) -> Option<&mut Pin<Box<S>>> {
        self.reader.as_mut()
    }
}

/// Result of one suspension in the read loop.
enum Read {
    Cancelled,
    Item(Option<Result<Bytes, ChatError>>),
}

/// Read loop state for a single streaming response.
pub struct StreamSession<S> {
    reader: ReaderGuard<S>,
    decoder: Utf8Decoder,
    parser: SseParser,
    state: SessionState,
    reads: u64,
    max_iterations: u64,
    cancel: CancellationToken,
}

impl<S> StreamSession<S>
where
    S: Stream<Item = Result<Bytes, ChatError>>,
{
    pub fn new(body: S, cancel: CancellationToken) -> Self {
        Self {
            reader: ReaderGuard::new(body),
            decoder: Utf8Decoder::new(),
            parser: SseParser::new(),
            state: SessionState::Streaming,
            reads: 0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            cancel,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Drive the session to a terminal state, delivering events to `handler`.
    pub async fn run<H>(mut self, handler: &mut H) -> SessionReport
    where
        H: ChatHandler + ?Sized,
    {
        // Error from the previous read, held while one more read is tried.
        let mut read_error: Option<ChatError> = None;

        loop {
            self.reads += 1;
            if self.reads > self.max_iterations {
                tracing::error!(
                    limit = self.max_iterations,
                    "maximum read iterations exceeded, stopping stream processing"
                );
                self.reader.release();
                self.fail(
                    handler,
                    ChatError::IterationLimit {
                        limit: self.max_iterations,
                    },
                );
                break;
            }

            let Some(reader) = self.reader.get_mut() else {
                break;
            };
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Read::Cancelled,
                item = reader.next() => Read::Item(item),
            };

            match read {
                Read::Cancelled | Read::Item(Some(Err(ChatError::Cancelled))) => {
                    self.abort();
                    break;
                }
                Read::Item(Some(Err(e))) => {
                    if let Some(first) = read_error.take() {
                        tracing::warn!("stream read failed again ({e}), giving up");
                        self.reader.release();
                        self.fail(handler, first);
                        break;
                    }
                    tracing::warn!("stream read failed ({e}), trying to drain");
                    read_error = Some(e);
                }
                Read::Item(None) => {
                    if let Some(e) = read_error.take() {
                        self.reader.release();
                        self.fail(handler, e);
                        break;
                    }
                    self.finish(handler);
                    self.reader.release();
                    break;
                }
                Read::Item(Some(Ok(bytes))) => {
                    read_error = None;
                    let text = self.decoder.decode(&bytes);
                    for event in self.parser.feed(&text) {
                        self.dispatch(event, handler);
                    }
                    if self.state.is_terminal() {
                        self.reader.release();
                        break;
                    }
                }
            }
        }

        SessionReport {
            state: self.state,
            reads: self.reads,
            reader_released: self.reader.is_released(),
        }
    }

    /// End of body: flush what is left, then complete if nothing else did.
    fn finish<H>(&mut self, handler: &mut H)
    where
        H: ChatHandler + ?Sized,
    {
        let tail = self.decoder.finish();
        let mut events = self.parser.feed(&tail);
        events.extend(self.parser.finish());
        for event in events {
            self.dispatch(event, handler);
        }

        if self.state == SessionState::Streaming {
            if self.cancel.is_cancelled() {
                self.abort();
            } else {
                self.state = SessionState::Completed;
                handler.on_done();
            }
        }
    }

    fn dispatch<H>(&mut self, event: SseEvent, handler: &mut H)
    where
        H: ChatHandler + ?Sized,
    {
        if self.state.is_terminal() {
            return;
        }
        if self.cancel.is_cancelled() {
            self.abort();
            return;
        }

        match event.event_name.as_deref() {
            Some("connected") => tracing::debug!("chat stream connected"),
            Some("chunk") => handler.on_chunk(event.data()),
            Some("reasoning" | "reasoning_summary") => handler.on_reasoning(event.data()),
            Some("done") => {
                self.state = SessionState::Completed;
                handler.on_done();
            }
            Some("error") => {
                let message = error_event_message(&event.data());
                self.fail(handler, ChatError::Server(message));
            }
            Some(other) => tracing::debug!("Unknown SSE event type: {other}"),
            None => tracing::debug!("SSE event without a name ignored"),
        }
    }

    fn fail<H>(&mut self, handler: &mut H, error: ChatError)
    where
        H: ChatHandler + ?Sized,
    {
        if self.state == SessionState::Streaming {
            self.state = SessionState::Failed;
            handler.on_error(error);
        }
    }

    fn abort(&mut self) {
        if self.state == SessionState::Streaming {
            tracing::debug!("chat stream cancelled");
            self.state = SessionState::Aborted;
        }
        self.reader.release();
    }
}

/// Read the `error` string out of a JSON body such as `{"error":"bad request"}`.
pub(crate) fn json_error_field(body: &str) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.is_empty())
}

/// Message for an SSE `error` event. A JSON object payload yields its
/// `error` field; any other payload is used as-is.
fn error_event_message(data: &str) -> String {
    const FALLBACK: &str = "Unknown error";

    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(serde_json::Value::Object(body)) => body
            .get("error")
            .and_then(|v| v.as_str())
            .filter(|m| !m.is_empty())
            .unwrap_or(FALLBACK)
            .to_string(),
        // Bare JSON strings and numbers are shown as sent, not as "Unknown error".
        _ if !data.is_empty() => data.to_string(),
        _ => FALLBACK.to_string(),
    }
}
