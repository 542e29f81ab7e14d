//! Chat-platform seams used by the pipeline: user lookups and message posting.
//!
//! The Slack adapter implements both; tests substitute in-memory fakes.

use async_trait::async_trait;

/// Resolved user profile (only what the filter needs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub is_bot: bool,
}

/// Identity lookups against the chat platform.
#[async_trait]
pub trait IdentityService: Send + Sync {
    type Error: std::fmt::Display + Send;

    /// Fetch a user's profile by id.
    async fn user_info(&self, user_id: &str) -> Result<UserInfo, Self::Error>;

    /// True if the user is a bot account (including ourselves).
    async fn is_bot(&self, user_id: &str) -> Result<bool, Self::Error> {
        Ok(self.user_info(user_id).await?.is_bot)
    }
}

/// Options for a new post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOptions {
    pub username: String,
    pub as_user: bool,
}

/// Message writes against the chat platform.
#[async_trait]
pub trait PostingService: Send + Sync {
    type Error: std::fmt::Display + Send;

    /// Post a new message; returns the posted message's timestamp.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<String, Self::Error>;

    /// Replace the text of a message we posted earlier.
    async fn update_message(&self, channel: &str, ts: &str, text: &str) -> Result<(), Self::Error>;
}

#[async_trait]
impl<T: IdentityService + ?Sized> IdentityService for std::sync::Arc<T> {
    type Error = T::Error;

    async fn user_info(&self, user_id: &str) -> Result<UserInfo, Self::Error> {
        (**self).user_info(user_id).await
    }

    async fn is_bot(&self, user_id: &str) -> Result<bool, Self::Error> {
        (**self).is_bot(user_id).await
    }
}

#[async_trait]
impl<T: PostingService + ?Sized> PostingService for std::sync::Arc<T> {
    type Error = T::Error;

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<String, Self::Error> {
        (**self).post_message(channel, text, options).await
    }

    async fn update_message(&self, channel: &str, ts: &str, text: &str) -> Result<(), Self::Error> {
        (**self).update_message(channel, ts, text).await
    }
}
