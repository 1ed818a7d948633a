//! Conversation history sent back to the backend on every request.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One `{role, content}` entry of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
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

/// Tracks the latest assistant text seen while a turn streams.
///
/// Appends accumulate in the registry, so the tracked value is always the
/// cumulative text read back from there, never a single delta.
#[derive(Debug, Default)]
pub struct HistoryTracker {
    last_assistant_text: Option<String>,
}

impl HistoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, text: &str) {
        let latest = self.last_assistant_text.get_or_insert_with(String::new);
        latest.clear();
        latest.push_str(text);
    }

    pub fn latest(&self) -> Option<&str> {
        self.last_assistant_text.as_deref()
    }

    /// Consumes the tracked text, discarding whitespace-only replies.
    pub fn take_reply(&mut self) -> Option<String> {
        self.last_assistant_text
            .take()
            .filter(|text| !text.trim().is_empty())
    }
}
