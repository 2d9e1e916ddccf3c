//! One chat turn: send a message, render the streamed reply, keep history.

use futures_util::StreamExt;
use hubchat_api::ChatClient;
use hubchat_types::{ChatError, ChatEvent, ChatRequest, HistoryEntry};
use std::io::{self, Write};

/// How a turn ended.
#[derive(Debug)]
pub enum TurnEnd {
    Done,
    Failed(ChatError),
    /// Aborted by the user, or the session ended without a terminal event.
    Interrupted,
}

/// The assistant text received during a turn and how the turn ended.
#[derive(Debug)]
pub struct TurnOutcome {
    pub reply: String,
    pub end: TurnEnd,
}

/// Prior turns sent along with every new message.
#[derive(Debug, Default)]
pub struct Conversation {
    history: Vec<HistoryEntry>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, message: &str) -> ChatRequest {
        ChatRequest::new(message).with_history(self.history.clone())
    }

    /// Record a finished turn. Text from an interrupted reply is kept; a
    /// failed reply is recorded empty and so never sent back.
    pub fn record(&mut self, message: &str, outcome: &TurnOutcome) {
        let reply = match outcome.end {
            TurnEnd::Failed(_) => "",
            TurnEnd::Done | TurnEnd::Interrupted => outcome.reply.as_str(),
        };
        self.history.push(HistoryEntry::user(message));
        self.history.push(HistoryEntry::assistant(reply));
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }
}

/// Writes streamed events to the terminal as they arrive.
pub struct Transcript<O, E> {
    out: O,
    err: E,
    show_reasoning: bool,
    reply: String,
}

impl<O: Write, E: Write> Transcript<O, E> {
    pub fn new(out: O, err: E, show_reasoning: bool) -> Self {
        Self {
            out,
            err,
            show_reasoning,
            reply: String::new(),
        }
    }

    /// Render one event. Returns how the turn ended once a terminal event
    /// arrives.
    pub fn apply(&mut self, event: ChatEvent) -> io::Result<Option<TurnEnd>> {
        match event {
            ChatEvent::Chunk(text) => {
                write!(self.out, "{text}")?;
                self.out.flush()?;
                self.reply.push_str(&text);
                Ok(None)
            }
            ChatEvent::Reasoning(text) => {
                if self.show_reasoning {
                    write!(self.err, "\x1b[2m{text}\x1b[0m")?;
                    self.err.flush()?;
                }
                Ok(None)
            }
            ChatEvent::Done => {
                writeln!(self.out)?;
                Ok(Some(TurnEnd::Done))
            }
            ChatEvent::Error(e) => {
                if !self.reply.is_empty() {
                    writeln!(self.out)?;
                }
                writeln!(self.err, "Error: {e}")?;
                Ok(Some(TurnEnd::Failed(e)))
            }
        }
    }

    pub fn into_reply(self) -> String {
        self.reply
    }
}

/// Stream one reply to stdout. Ctrl+C aborts the request and keeps
/// whatever text already arrived.
pub async fn run_turn(
    client: &ChatClient,
    request: ChatRequest,
    show_reasoning: bool,
) -> TurnOutcome {
    let mut stream = client.stream_events(request);
    let mut transcript = Transcript::new(io::stdout(), io::stderr(), show_reasoning);

    let end = loop {
        let event = tokio::select! {
            event = stream.next() => event,
            _ = tokio::signal::ctrl_c() => {
                stream.abort();
                eprintln!("\n[interrupted]");
                break TurnEnd::Interrupted;
            }
        };
        let Some(event) = event else {
            break TurnEnd::Interrupted;
        };
        match transcript.apply(event) {
            Ok(Some(end)) => break end,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Failed to write to terminal: {e}");
                stream.abort();
                break TurnEnd::Interrupted;
            }
        }
    };

    TurnOutcome {
        reply: transcript.into_reply(),
        end,
    }
}
