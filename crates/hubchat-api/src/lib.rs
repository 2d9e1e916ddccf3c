//! Streaming chat client for the hub's `/api/chat/stream` endpoint.
//!
//! The endpoint answers a JSON POST with a Server-Sent Events body made of
//! `connected`, `chunk`, `done` and `error` events. [`ChatClient`] reads that
//! body incrementally and reports it through a [`ChatHandler`] or as a
//! [`ChatStream`].
//!
//! [`ChatHandler`]: hubchat_types::ChatHandler

mod client;
mod decode;
mod session;
mod sse;
mod stream;

pub use client::{ByteStream, ChatClient, ClientOptions, DEFAULT_STREAM_PATH, StreamHandle};
pub use decode::Utf8Decoder;
pub use session::{
    DEFAULT_MAX_ITERATIONS, ReaderGuard, SessionReport, SessionState, StreamSession,
};
pub use sse::{SseEvent, SseParser};
pub use stream::ChatStream;
