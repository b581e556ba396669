//! Message and Transcript domain types.
//!
//! A `Transcript` is the conversation state owned by a single reasoning-loop
//! invocation: an ordered, append-only sequence of role-tagged turns. It is
//! built up while the loop runs and discarded when the loop terminates —
//! nothing is shared across requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a turn author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// Human-authored prompt or observation text
    User,
    /// Model output
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single role-tagged turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who authored this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a human turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a model turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// An ordered, append-only sequence of turns.
///
/// Each provider call receives the full transcript so the model always sees
/// a consistent, ordered history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    /// Ordered turns
    pub messages: Vec<Message>,
}

impl Transcript {
    /// Create a new empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn. Turns are never removed or reordered.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript has no turns yet.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Render the transcript as a plain-text document, one `role: content`
    /// block per turn. Useful for providers that take a single prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for m in &self.messages {
            out.push_str(&format!("{}: {}\n", m.role, m.content));
        }
        out
    }
}
