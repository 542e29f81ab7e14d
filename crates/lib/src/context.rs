//! Request context: one inbound message plus what the stages need to answer it.

use crate::channels::MessageEvent;
use serde::Serialize;

/// A message as seen by the filter stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub channel: String,
    /// Timestamp of the unedited message; the key replies are correlated by.
    pub original_ts: String,
    pub author: Option<String>,
    /// Raw body, still HTML-entity-escaped.
    pub text: String,
    pub edited: bool,
}

impl RequestContext {
    /// Build a context from a message event. For edits, ts and text come from the nested
    /// edited message rather than the notification envelope.
    pub fn from_event(event: MessageEvent) -> Self {
        match event {
            MessageEvent::Posted {
                channel,
                ts,
                user,
                text,
            } => Self {
                channel,
                original_ts: ts,
                author: user,
                text,
                edited: false,
            },
            MessageEvent::Edited {
                channel,
                user,
                message,
            } => Self {
                channel,
                original_ts: message.ts,
                author: user.or(message.user),
                text: message.text,
                edited: true,
            },
        }
    }

    /// JSON rendering for debug logs.
    pub fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable context: {}>", e))
    }
}

/// A context that passed the filter: it is addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedRequest {
    #[serde(flatten)]
    pub context: RequestContext,
    /// The user id from the leading `<@id>:` mention; resolves to the bot's name.
    pub reply_to_id: String,
}

impl AcceptedRequest {
    pub fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable request: {}>", e))
    }
}
