//! Inbound events from the chat platform: delivered to the pipeline orchestrator.

/// One event from the real-time event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A chat message (new or edited).
    Message(MessageEvent),
    /// Non-fatal transport problem (dropped socket, undecodable frame). Logged and ignored.
    TransportError(String),
    /// Credentials were rejected. Fatal: the pipeline stops.
    InvalidAuth,
}

/// A message event, either freshly posted or an edit of an earlier message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEvent {
    Posted {
        channel: String,
        ts: String,
        user: Option<String>,
        text: String,
    },
    /// `message_changed`: the envelope's own ts/user belong to the notification, the
    /// nested `message` carries the edited message's original ts and new text.
    Edited {
        channel: String,
        user: Option<String>,
        message: EditedMessage,
    },
}

/// The nested sub-message of a `message_changed` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditedMessage {
    pub ts: String,
    pub user: Option<String>,
    pub text: String,
}

