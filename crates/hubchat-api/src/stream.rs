//! Chat stream sessions exposed as an async [`Stream`] of [`ChatEvent`]s.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use hubchat_types::{ChatError, ChatEvent, ChatHandler};
use tokio::sync::mpsc;

use crate::client::StreamHandle;

/// Handler that forwards every callback into a channel.
pub(crate) struct ChannelHandler {
    tx: mpsc::UnboundedSender<ChatEvent>,
}

impl ChannelHandler {
    pub(crate) fn new(tx: mpsc::UnboundedSender<ChatEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: ChatEvent) {
        // The receiver going away means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl ChatHandler for ChannelHandler {
    fn on_chunk(&mut self, text: String) {
        self.send(ChatEvent::Chunk(text));
    }

    fn on_reasoning(&mut self, text: String) {
        self.send(ChatEvent::Reasoning(text));
    }

    fn on_done(&mut self) {
        self.send(ChatEvent::Done);
    }

    fn on_error(&mut self, error: ChatError) {
        self.send(ChatEvent::Error(error));
    }
}

/// A live chat session read as a stream.
///
/// Yields chunks in server order and ends after `Done` or `Error`. An
/// aborted session ends without either. Dropping the stream aborts the
/// session.
pub struct ChatStream {
    rx: mpsc::UnboundedReceiver<ChatEvent>,
    handle: StreamHandle,
}

impl ChatStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<ChatEvent>, handle: StreamHandle) -> Self {
        Self { rx, handle }
    }

    /// Cancel the session. Events already queued are still yielded.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Stream for ChatStream {
    type Item = ChatEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_handler_forwards_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handler = ChannelHandler::new(tx);
        handler.on_chunk("a".into());
        handler.on_reasoning("r".into());
        handler.on_done();

        assert!(matches!(rx.try_recv(), Ok(ChatEvent::Chunk(t)) if t == "a"));
        assert!(matches!(rx.try_recv(), Ok(ChatEvent::Reasoning(t)) if t == "r"));
        assert!(matches!(rx.try_recv(), Ok(ChatEvent::Done)));
    }

    #[test]
    fn channel_handler_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut handler = ChannelHandler::new(tx);
        handler.on_error(ChatError::MissingBody);
    }
}
