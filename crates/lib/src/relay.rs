//! Relay: wire the Slack connection, Go Playground client and reply cache into the pipeline.

use crate::cache::ReplyCache;
use crate::channels::SlackChannel;
use crate::config::{self, Config};
use crate::pipeline::{run_pipeline, CompileStage, FilterStage};
use crate::playground::PlaygroundClient;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Run until SIGINT/SIGTERM (Ok) or until Slack rejects the credentials (Err).
pub async fn run_relay(config: Config) -> Result<()> {
    config.validate()?;
    let bot_token = config::resolve_slack_bot_token(&config)
        .context("slack bot token not configured (set SLACK_BOT_TOKEN or slack.botToken)")?;
    let app_token = config::resolve_slack_app_token(&config)
        .context("slack app token not configured (set SLACK_APP_TOKEN or slack.appToken)")?;

    let cache = Arc::new(ReplyCache::new(config.cache.size)?);
    let slack = Arc::new(SlackChannel::new(
        config.slack.api_base.clone(),
        bot_token,
        app_token,
    ));
    verify_bot_token(&slack, &config.bot.name).await?;
    let playground = PlaygroundClient::new(config.playground.compile_url.clone(), config.formatter());
    log::info!(
        "relay starting as {} (compile endpoint {}, cache size {})",
        config.bot.name,
        config.playground.compile_url,
        config.cache.size
    );

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let socket_task = slack.clone().start_events(events_tx);

    let filter = FilterStage::new(slack.clone(), config.bot.name.clone());
    let compile = CompileStage::new(playground, slack.clone(), cache, config.bot.name.clone());
    let pipeline = run_pipeline(events_rx, filter, compile);
    tokio::pin!(pipeline);

    let result = tokio::select! {
        res = &mut pipeline => res,
        _ = shutdown_signal() => {
            log::info!("shutdown signal received, closing slack connection and draining pipeline");
            slack.stop();
            socket_task.abort();
            (&mut pipeline).await
        }
    };
    slack.stop();
    socket_task.abort();
    result?;
    log::info!("relay stopped");
    Ok(())
}

/// Check the bot token before any event is consumed. A rejected token is fatal; other failures
/// are logged and left to surface on the first lookup.
async fn verify_bot_token(slack: &SlackChannel, bot_name: &str) -> Result<()> {
    match slack.auth_test().await {
        Ok(identity) => {
            if identity.user != bot_name {
                log::warn!(
                    "bot token belongs to {} ({}), but bot.name is {}",
                    identity.user,
                    identity.user_id,
                    bot_name
                );
            }
            Ok(())
        }
        Err(e) if e.is_auth_failure() => {
            Err(e).context("slack rejected the bot token (check SLACK_BOT_TOKEN or slack.botToken)")
        }
        Err(e) => {
            log::warn!("could not verify slack bot token: {}", e);
            Ok(())
        }
    }
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
