//! Client for the hub's chat streaming endpoint.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::TryStreamExt;
use hubchat_types::{ChatError, ChatHandler, ChatRequest};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::session::{
    DEFAULT_MAX_ITERATIONS, SessionReport, SessionState, StreamSession, json_error_field,
};
use crate::stream::{ChannelHandler, ChatStream};

/// A response body as it arrives off the wire.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ChatError>> + Send>>;

/// Path of the streaming chat endpoint on the hub.
pub const DEFAULT_STREAM_PATH: &str = "/api/chat/stream";

/// Connection settings for [`ChatClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Endpoint path appended to the base URL.
    pub stream_path: String,
    /// API key sent as a bearer token.
    pub api_key: Option<String>,
    /// Limit on establishing the connection. The stream itself is unbounded.
    pub connect_timeout: Option<Duration>,
    /// Body reads allowed per session before it is failed.
    pub max_iterations: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            api_key: None,
            connect_timeout: Some(Duration::from_secs(10)),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Cancellation handle for one running session.
#[derive(Debug)]
pub struct StreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<SessionReport>,
}

impl StreamHandle {
    /// Stop the request and any further reading. No handler callback runs
    /// after the abort takes effect. Calling it again is harmless.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to reach a terminal state.
    pub async fn join(self) -> Result<SessionReport, JoinError> {
        self.task.await
    }
}

/// Client for the hub's streaming chat endpoint.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    options: ClientOptions,
}

impl ChatClient {
    /// Create a client with default options.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChatError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ChatError> {
        // Session cookies set by the hub are sent back on later requests.
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            options,
        })
    }

    pub fn stream_url(&self) -> String {
        format!("{}{}", self.base_url, self.options.stream_path)
    }

    /// Start streaming a chat response into `handler`.
    ///
    /// Returns at once; the request and read loop run on a spawned task, so
    /// no callback runs before this returns. Must be called within a tokio
    /// runtime.
    pub fn stream_chat<H>(&self, request: ChatRequest, handler: H) -> StreamHandle
    where
        H: ChatHandler,
    {
        let cancel = CancellationToken::new();
        let client = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { client.drive(request, handler, token).await });
        StreamHandle { cancel, task }
    }

    /// Start streaming a chat response as a [`ChatStream`].
    pub fn stream_events(&self, request: ChatRequest) -> ChatStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.stream_chat(request, ChannelHandler::new(tx));
        ChatStream::new(rx, handle)
    }

    async fn drive<H>(
        &self,
        request: ChatRequest,
        mut handler: H,
        cancel: CancellationToken,
    ) -> SessionReport
    where
        H: ChatHandler,
    {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChatError::Cancelled),
            result = self.open(&request) => result,
        };

        match opened {
            Ok(body) => {
                StreamSession::new(body, cancel)
                    .with_max_iterations(self.options.max_iterations)
                    .run(&mut handler)
                    .await
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!("chat request cancelled before the response arrived");
                SessionReport::before_body(SessionState::Aborted)
            }
            Err(e) => {
                tracing::debug!("chat request failed: {e}");
                handler.on_error(e);
                SessionReport::before_body(SessionState::Failed)
            }
        }
    }

    /// Send the request and hand back the response body as a byte stream.
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        let url = self.stream_url();
        tracing::debug!("POST {url} ({} history entries)", request.history.len());

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(status, &body));
        }
        if matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT) {
            return Err(ChatError::MissingBody);
        }

        Ok(Box::pin(response.bytes_stream().map_err(transport_error)))
    }

    fn headers(&self) -> Result<HeaderMap, ChatError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        if let Some(key) = &self.options.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|_| ChatError::Request("Invalid API key format".into()))?,
            );
        }
        Ok(headers)
    }
}

fn transport_error(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout
    } else {
        ChatError::Network(e.to_string())
    }
}

/// Build the error for a non-success response from its status and body.
fn http_error(status: StatusCode, body: &str) -> ChatError {
    let message =
        json_error_field(body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    ChatError::Http {
        status: status.as_u16(),
        message,
    }
}
