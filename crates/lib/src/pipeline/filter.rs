//! Filter stage: keep only human messages addressed to the bot.

use crate::channels::IdentityService;
use crate::context::{AcceptedRequest, RequestContext};
use crate::extract;
use tokio::sync::mpsc;

/// Why a context was not forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Posted by a bot account (including ourselves).
    FromBot,
    /// Author could not be resolved (lookup failed or missing).
    AuthorLookup(String),
    /// No leading `<@id>:` mention.
    NotAddressed,
    /// Addressee could not be resolved.
    AddresseeLookup(String),
    /// Addressed to somebody else.
    OtherAddressee(String),
}

pub struct FilterStage<I> {
    identity: I,
    bot_name: String,
}

impl<I: IdentityService> FilterStage<I> {
    pub fn new(identity: I, bot_name: impl Into<String>) -> Self {
        Self {
            identity,
            bot_name: bot_name.into(),
        }
    }

    /// Decide whether `ctx` is a request for us. Lookup errors reject the message.
    pub async fn admit(&self, ctx: RequestContext) -> Result<AcceptedRequest, Rejection> {
        // Edit notifications may not carry an author, so the bot check only runs on new posts.
        if !ctx.edited {
            let author = ctx
                .author
                .as_deref()
                .ok_or_else(|| Rejection::AuthorLookup("message has no author".to_string()))?;
            match self.identity.is_bot(author).await {
                Ok(true) => return Err(Rejection::FromBot),
                Ok(false) => {}
                Err(e) => return Err(Rejection::AuthorLookup(e.to_string())),
            }
        }

        let reply_to_id = extract::reply_to_id(&ctx.text)
            .ok_or(Rejection::NotAddressed)?
            .to_string();
        let addressee = self
            .identity
            .user_info(&reply_to_id)
            .await
            .map_err(|e| Rejection::AddresseeLookup(e.to_string()))?;
        if addressee.name != self.bot_name {
            return Err(Rejection::OtherAddressee(addressee.name));
        }

        Ok(AcceptedRequest {
            context: ctx,
            reply_to_id,
        })
    }

    /// Consume raw contexts in order until the inbound queue closes.
    pub async fn run(
        self,
        mut inbound_rx: mpsc::UnboundedReceiver<RequestContext>,
        accepted_tx: mpsc::UnboundedSender<AcceptedRequest>,
    ) {
        while let Some(ctx) = inbound_rx.recv().await {
            log::debug!("message before filter: {}", ctx.describe());
            let (channel, ts) = (ctx.channel.clone(), ctx.original_ts.clone());
            match self.admit(ctx).await {
                Ok(accepted) => {
                    if accepted_tx.send(accepted).is_err() {
                        log::debug!("filter: accepted queue closed, stopping");
                        return;
                    }
                }
                Err(Rejection::AuthorLookup(e)) | Err(Rejection::AddresseeLookup(e)) => {
                    log::warn!("filter: user lookup failed (channel {} ts {}): {}", channel, ts, e);
                }
                Err(Rejection::FromBot) => {
                    log::debug!("filter: ignoring bot message (channel {} ts {})", channel, ts);
                }
                Err(Rejection::NotAddressed) => {
                    log::debug!(
                        "filter: ignoring message without '<@user>:' prefix (channel {} ts {})",
                        channel,
                        ts
                    );
                }
                Err(Rejection::OtherAddressee(name)) => {
                    log::debug!("filter: {} is not {}", name, self.bot_name);
                }
            }
        }
        log::debug!("filter: inbound queue closed");
    }
}
