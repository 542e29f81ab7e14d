//! Chat platform adapters (Slack).
//!
//! The event source feeds `SourceEvent`s to the pipeline; the identity and posting
//! traits are the seams the pipeline stages call back through.

mod inbound;
mod services;
mod slack;

pub use inbound::{EditedMessage, MessageEvent, SourceEvent};
pub use services::{IdentityService, PostOptions, PostingService, UserInfo};
pub use slack::{BotIdentity, SlackChannel, SlackError};
