//! Compile stage: extract the snippet, run it, and post or update the reply.

use crate::cache::ReplyCache;
use crate::channels::{PostOptions, PostingService};
use crate::context::AcceptedRequest;
use crate::extract;
use crate::playground::Compiler;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Reply for an addressed message without a fenced snippet.
pub const NO_SNIPPET_REPLY: &str = "Error: No code received. Accepted formats are\n\
`single-line code`\n\
```multi-line code```\n";

/// What running one request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    NoSnippet,
    /// Formatting or the compile call itself failed.
    TransportError(String),
    /// The program did not build; diagnostics from the service.
    CompileError(String),
    /// Program output, already fenced.
    Success(String),
}

impl CompileOutcome {
    pub fn reply_text(&self) -> String {
        match self {
            CompileOutcome::NoSnippet => NO_SNIPPET_REPLY.to_string(),
            CompileOutcome::TransportError(detail) => format!("Error compiling: {}\n", detail),
            CompileOutcome::CompileError(diagnostics) => {
                format!("Compile errors from Go Playground: {}", diagnostics)
            }
            CompileOutcome::Success(output) => output.clone(),
        }
    }
}

/// How the reply for one request was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// New message posted and recorded in the cache.
    Posted { reply_ts: String },
    /// Earlier reply updated in place.
    Updated { reply_ts: String },
    /// Edit with no reply on record; nothing sent.
    Skipped,
    /// The post or update call failed; nothing recorded.
    Failed(String),
}

pub struct CompileStage<C, P> {
    compiler: C,
    poster: P,
    cache: Arc<ReplyCache>,
    post_options: PostOptions,
}

impl<C: Compiler, P: PostingService> CompileStage<C, P> {
    pub fn new(compiler: C, poster: P, cache: Arc<ReplyCache>, bot_name: impl Into<String>) -> Self {
        Self {
            compiler,
            poster,
            cache,
            post_options: PostOptions {
                username: bot_name.into(),
                as_user: true,
            },
        }
    }

    /// Extract, format and compile. Never fails; failures become outcomes.
    pub async fn evaluate(&self, req: &AcceptedRequest) -> CompileOutcome {
        let Some(snippet) = extract::extract_snippet(&req.context.text, &req.reply_to_id) else {
            return CompileOutcome::NoSnippet;
        };
        let formatted = match self.compiler.format(&snippet).await {
            Ok(code) => code,
            Err(e) => return CompileOutcome::TransportError(e.to_string()),
        };
        match self.compiler.compile(&formatted).await {
            Err(e) => CompileOutcome::TransportError(e.to_string()),
            Ok(result) if !result.compile_errors.is_empty() => {
                CompileOutcome::CompileError(result.compile_errors)
            }
            Ok(result) => CompileOutcome::Success(result.fenced_output()),
        }
    }

    /// Answer one request. Error replies are always posted; successful output updates the
    /// earlier reply when the request is an edit.
    pub async fn handle(&self, req: AcceptedRequest) -> Delivery {
        log::debug!("message after filter: {}", req.describe());
        let outcome = self.evaluate(&req).await;
        let ctx = &req.context;
        let text = outcome.reply_text();

        if !ctx.edited || !matches!(outcome, CompileOutcome::Success(_)) {
            return self.post_and_record(&req, &text).await;
        }

        let Some(reply_ts) = self.cache.get(&ctx.original_ts) else {
            log::debug!(
                "compile: no reply on record for edited message (channel {} ts {}), skipping",
                ctx.channel,
                ctx.original_ts
            );
            return Delivery::Skipped;
        };
        match self
            .poster
            .update_message(&ctx.channel, &reply_ts, &text)
            .await
        {
            Ok(()) => Delivery::Updated { reply_ts },
            Err(e) => {
                log::warn!(
                    "compile: updating reply {} failed (channel {} ts {}): {}",
                    reply_ts,
                    ctx.channel,
                    ctx.original_ts,
                    e
                );
                Delivery::Failed(e.to_string())
            }
        }
    }

    /// Post a new reply and record it before returning, so an edit queued behind this
    /// request always finds the entry.
    async fn post_and_record(&self, req: &AcceptedRequest, text: &str) -> Delivery {
        let ctx = &req.context;
        match self
            .poster
            .post_message(&ctx.channel, text, &self.post_options)
            .await
        {
            Ok(reply_ts) => {
                self.cache.insert(ctx.original_ts.clone(), reply_ts.clone());
                Delivery::Posted { reply_ts }
            }
            Err(e) => {
                log::warn!(
                    "compile: posting reply failed (channel {} ts {}): {}",
                    ctx.channel,
                    ctx.original_ts,
                    e
                );
                Delivery::Failed(e.to_string())
            }
        }
    }

    /// Consume accepted requests in order until the queue closes.
    pub async fn run(self, mut accepted_rx: mpsc::UnboundedReceiver<AcceptedRequest>) {
        while let Some(req) = accepted_rx.recv().await {
            let (channel, ts) = (req.context.channel.clone(), req.context.original_ts.clone());
            match self.handle(req).await {
                Delivery::Posted { reply_ts } => {
                    log::info!("replied to {} in {} (reply {})", ts, channel, reply_ts)
                }
                Delivery::Updated { reply_ts } => {
                    log::info!("updated reply {} for edited {} in {}", reply_ts, ts, channel)
                }
                Delivery::Skipped | Delivery::Failed(_) => {}
            }
        }
        log::debug!("compile: accepted queue closed");
    }
}
