//! The core models for a project scoped tutor conversation.
use serde::{Deserialize, Serialize};

pub const LOST_CONNECTION_MESSAGE: &str = "Error: Lost connection to AI tutor.";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    // Set while the text is still being streamed in
    #[serde(default)]
    pub pending: bool,
}

impl ChatMessage {
    pub fn user(text: &str) -> Self {
        Self {
            role: ChatRole::User,
            text: text.to_string(),
            pending: false,
        }
    }

    pub fn model(text: &str) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.to_string(),
            pending: false,
        }
    }

    fn pending_model() -> Self {
        Self {
            role: ChatRole::Model,
            text: String::new(),
            pending: true,
        }
    }
}

/// One step of a streamed reply.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    Fragment(String),
    End,
    Error(String),
}

/// Ordered chat history. Append only, except that the trailing pending
/// model message grows while its reply streams in. At most one
/// message is pending and it is always the last one.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct Transcript(Vec<ChatMessage>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.0.last()
    }

    pub fn pending(&self) -> Option<&ChatMessage> {
        self.0.last().filter(|m| m.pending)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.0.iter()
    }

    /// Appends a finalized message. Any reply still streaming is
    /// finalized first so the pending message stays the last one.
    pub fn push(&mut self, msg: ChatMessage) {
        self.finalize();
        self.0.push(ChatMessage {
            pending: false,
            ..msg
        });
    }

    /// Starts a turn: the user's message followed by an empty pending
    /// reply.
    pub fn begin_reply(&mut self, user_text: &str) {
        self.push(ChatMessage::user(user_text));
        self.0.push(ChatMessage::pending_model());
    }

    /// Applies one stream event to the pending reply. Returns `true`
    /// once the turn is over.
    pub fn apply(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Fragment(fragment) => {
                match self.0.last_mut().filter(|m| m.pending) {
                    Some(msg) => msg.text.push_str(&fragment),
                    None => tracing::warn!("Dropping fragment with no pending reply"),
                }
                false
            }
            StreamEvent::End => {
                self.finalize();
                true
            }
            StreamEvent::Error(_) => {
                self.finalize();
                self.0.push(ChatMessage::model(LOST_CONNECTION_MESSAGE));
                true
            }
        }
    }

    fn finalize(&mut self) {
        if let Some(msg) = self.0.last_mut() {
            msg.pending = false;
        }
    }
}
