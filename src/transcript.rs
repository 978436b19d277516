//! Append-only conversation transcript
//!
//! Owned by one session; messages are never mutated or removed except by an
//! explicit clear.

use chrono::{DateTime, Utc};

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Transcribed user utterance
    User,
    /// Assistant reply
    Assistant,
    /// Client- or server-authored status message
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One exchange unit in the conversation
#[derive(Debug, Clone)]
pub struct ConversationMessage {
    /// Unique, monotonically increasing within the session
    pub id: u64,
    /// Message author
    pub role: Role,
    /// Transcribed or generated utterance; may be empty for audio-only turns
    pub text: String,
    /// Locator of a playable response clip
    pub audio_ref: Option<String>,
    /// Creation time, for display and FIFO ordering only
    pub created_at: DateTime<Utc>,
}

/// Ordered, append-only message log
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ConversationMessage>,
    next_id: u64,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, returning its id
    pub fn push(&mut self, role: Role, text: impl Into<String>) -> u64 {
        self.push_with_audio(role, text, None)
    }

    /// Append a message carrying an audio locator, returning its id
    pub fn push_with_audio(
        &mut self,
        role: Role,
        text: impl Into<String>,
        audio_ref: Option<String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        self.messages.push(ConversationMessage {
            id,
            role,
            text: text.into(),
            audio_ref,
            created_at: Utc::now(),
        });

        id
    }

    /// Messages in insertion order
    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Most recently appended message
    #[must_use]
    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Empty the log. Idempotent; ids keep increasing across clears so a
    /// message id never repeats within a session.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
