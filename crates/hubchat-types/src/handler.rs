//! Callback seam between a stream session and its caller.

use crate::ChatError;

/// Receives the outcome of one chat stream session.
///
/// A session calls `on_chunk` / `on_reasoning` zero or more times in server
/// emission order, then at most one of `on_done` or `on_error`. Nothing is
/// called after the terminal callback, and nothing at all after an abort.
pub trait ChatHandler: Send + 'static {
    /// A piece of assistant text, possibly empty.
    fn on_chunk(&mut self, text: String);

    /// A piece of model reasoning. Ignored unless overridden.
    fn on_reasoning(&mut self, _text: String) {}

    fn on_done(&mut self);

    fn on_error(&mut self, error: ChatError);
}

/// Everything a session can deliver, as a single value.
#[derive(Debug)]
pub enum ChatEvent {
    Chunk(String),
    Reasoning(String),
    Done,
    Error(ChatError),
}

impl ChatEvent {
    /// `Done` and `Error` end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Done | ChatEvent::Error(_))
    }
}

type ChunkFn = Box<dyn FnMut(String) + Send>;
type DoneFn = Box<dyn FnMut() + Send>;
type ErrorFn = Box<dyn FnMut(ChatError) + Send>;

/// A [`ChatHandler`] assembled from closures; unset callbacks do nothing.
///
/// ```
/// use hubchat_types::Callbacks;
///
/// let handler = Callbacks::new()
///     .on_chunk(|text| print!("{text}"))
///     .on_done(|| println!())
///     .on_error(|err| eprintln!("error: {err}"));
/// # let _ = handler;
/// ```
#[derive(Default)]
pub struct Callbacks {
    chunk: Option<ChunkFn>,
    reasoning: Option<ChunkFn>,
    done: Option<DoneFn>,
    error: Option<ErrorFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_chunk(mut self, f: impl FnMut(String) + Send + 'static) -> Self {
        self.chunk = Some(Box::new(f));
        self
    }

    pub fn on_reasoning(mut self, f: impl FnMut(String) + Send + 'static) -> Self {
        self.reasoning = Some(Box::new(f));
        self
    }

    pub fn on_done(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.done = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(ChatError) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl ChatHandler for Callbacks {
    fn on_chunk(&mut self, text: String) {
        if let Some(f) = self.chunk.as_mut() {
            f(text);
        }
    }

    fn on_reasoning(&mut self, text: String) {
        if let Some(f) = self.reasoning.as_mut() {
            f(text);
        }
    }

    fn on_done(&mut self) {
        if let Some(f) = self.done.as_mut() {
            f();
        }
    }

    fn on_error(&mut self, error: ChatError) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn callbacks_forward_to_closures() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (c, d, e) = (seen.clone(), seen.clone(), seen.clone());
        let mut handler = Callbacks::new()
            .on_chunk(move |t| c.lock().unwrap().push(format!("chunk:{t}")))
            .on_done(move || d.lock().unwrap().push("done".to_string()))
            .on_error(move |err| e.lock().unwrap().push(format!("error:{err}")));

        ChatHandler::on_chunk(&mut handler, "a".into());
        ChatHandler::on_reasoning(&mut handler, "ignored".into());
        ChatHandler::on_done(&mut handler);
        ChatHandler::on_error(&mut handler, ChatError::Server("boom".into()));

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["chunk:a", "done", "error:boom"]
        );
    }

    #[test]
    fn terminal_events() {
        assert!(ChatEvent::Done.is_terminal());
        assert!(ChatEvent::Error(ChatError::MissingBody).is_terminal());
        assert!(!ChatEvent::Chunk(String::new()).is_terminal());
        assert!(!ChatEvent::Reasoning("r".into()).is_terminal());
    }

    #[test]
    fn handler_is_object_safe() {
        fn _accept(_h: Box<dyn ChatHandler>) {}
    }
}
