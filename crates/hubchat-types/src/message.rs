//! Request model for the chat streaming endpoint.

use serde::{Deserialize, Serialize};

/// Role of a conversation participant.
///
/// The endpoint only understands `user` and `assistant`; any other role in
/// incoming JSON fails to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior turn sent along with a new message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat/stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl ChatRequest {
    /// A request with no prior history.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
        }
    }

    /// Attach conversation history. Assistant turns with no content are
    /// placeholders for responses that never arrived and are left out.
    pub fn with_history(mut self, history: impl IntoIterator<Item = HistoryEntry>) -> Self {
        self.history = history
            .into_iter()
            .filter(|entry| entry.role != Role::Assistant || !entry.content.is_empty())
            .collect();
        self
    }
}
