//! Request pipeline: event source -> filter stage -> compile stage.
//!
//! Two unbounded FIFO queues connect the stages; each stage is one long-lived task, so
//! messages are filtered and compiled in arrival order. Enqueueing never blocks the
//! event source.

mod compile;
mod filter;

pub use compile::{CompileOutcome, CompileStage, Delivery, NO_SNIPPET_REPLY};
pub use filter::{FilterStage, Rejection};

use crate::channels::{IdentityService, PostingService, SourceEvent};
use crate::context::RequestContext;
use crate::playground::Compiler;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("chat platform rejected the credentials")]
    InvalidAuth,
}

/// Run both stages and feed them from `events_rx` until the source ends (Ok) or reports
/// invalid credentials (Err). On a normal end the queues close and both stages drain;
/// on invalid credentials the stages are aborted.
pub async fn run_pipeline<I, C, P>(
    mut events_rx: mpsc::UnboundedReceiver<SourceEvent>,
    filter: FilterStage<I>,
    compile: CompileStage<C, P>,
) -> Result<(), PipelineError>
where
    I: IdentityService + 'static,
    C: Compiler + 'static,
    P: PostingService + 'static,
{
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<RequestContext>();
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();

    let filter_task = tokio::spawn(filter.run(inbound_rx, accepted_tx));
    let compile_task = tokio::spawn(compile.run(accepted_rx));

    while let Some(event) = events_rx.recv().await {
        match event {
            SourceEvent::Message(msg) => {
                let ctx = RequestContext::from_event(msg);
                if inbound_tx.send(ctx).is_err() {
                    log::warn!("pipeline: filter stage is gone, dropping message");
                }
            }
            SourceEvent::TransportError(e) => {
                log::warn!("error receiving event: {}", e);
            }
            SourceEvent::InvalidAuth => {
                log::error!("invalid credentials, stopping pipeline");
                filter_task.abort();
                compile_task.abort();
                return Err(PipelineError::InvalidAuth);
            }
        }
    }

    log::info!("event source closed, draining pipeline");
    drop(inbound_tx);
    if let Err(e) = filter_task.await {
        log::warn!("filter stage ended abnormally: {}", e);
    }
    if let Err(e) = compile_task.await {
        log::warn!("compile stage ended abnormally: {}", e);
    }
    Ok(())
}
