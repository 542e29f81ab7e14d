//! Slack channel: Socket Mode event stream plus the Web API calls the pipeline needs
//! (users.info, chat.postMessage, chat.update).

use crate::channels::inbound::{EditedMessage, MessageEvent, SourceEvent};
use crate::channels::services::{IdentityService, PostOptions, PostingService, UserInfo};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

const SLACK_API_BASE: &str = "https://slack.com/api";
const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const SUBTYPE_MESSAGE_CHANGED: &str = "message_changed";
const SUBTYPE_MESSAGE_DELETED: &str = "message_deleted";

/// Slack `error` codes that mean the token itself is unusable.
const AUTH_FAILURES: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "account_inactive",
    "token_revoked",
    "token_expired",
];

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("slack request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("slack api error: {0}")]
    Api(String),
    #[error("slack socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl SlackError {
    /// True when Slack rejected the credentials (retrying cannot help).
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, SlackError::Api(code) if AUTH_FAILURES.contains(&code.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct OpenSocketResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    ok: bool,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    error: Option<String>,
}

/// Who the bot token belongs to, as reported by `auth.test`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
    pub user: String,
}

#[derive(Debug, Deserialize)]
struct UsersInfoResponse {
    ok: bool,
    user: Option<SlackUser>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_bot: bool,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    ok: bool,
    ts: Option<String>,
    error: Option<String>,
}

/// Socket Mode frame: `{envelope_id, type, payload}`.
#[derive(Debug, Deserialize)]
struct SocketEnvelope {
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EventCallback {
    #[serde(rename = "type")]
    callback_type: String,
    #[serde(default)]
    event: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SlackMessagePayload {
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    message: Option<SlackSubMessage>,
}

#[derive(Debug, Deserialize)]
struct SlackSubMessage {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// What to do with one decoded socket frame.
#[derive(Debug, PartialEq)]
struct FrameOutcome {
    /// Ack text to send back, when the envelope carried an `envelope_id`.
    ack: Option<String>,
    /// Event to forward to the pipeline.
    event: Option<SourceEvent>,
    /// Slack asked us to reconnect.
    disconnect: bool,
}

/// Why one socket connection ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SocketExit {
    /// `disconnect` envelope: Slack has a fresh connection ready.
    Disconnect,
    /// Stream ended or a Close frame arrived.
    Closed,
    /// `stop()` was called or the pipeline went away.
    Stopped,
}

impl SocketExit {
    fn reconnect_delay(self) -> Option<Duration> {
        match self {
            SocketExit::Closed => Some(RECONNECT_DELAY),
            SocketExit::Disconnect | SocketExit::Stopped => None,
        }
    }
}

/// Slack connector: Socket Mode for inbound events, Web API for lookups and replies.
pub struct SlackChannel {
    api_base: String,
    bot_token: String,
    app_token: String,
    running: AtomicBool,
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new(api_base: Option<String>, bot_token: String, app_token: String) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| SLACK_API_BASE.to_string());
        Self {
            api_base,
            bot_token: bot_token.trim().to_string(),
            app_token: app_token.trim().to_string(),
            running: AtomicBool::new(false),
            client: reqwest::Client::new(),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the Socket Mode loop after the current frame.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Start the Socket Mode loop and forward events to the pipeline. Returns a handle to await on shutdown.
    pub fn start_events(
        self: Arc<Self>,
        events_tx: mpsc::UnboundedSender<SourceEvent>,
    ) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("slack channel: starting socket mode loop");
        tokio::spawn(async move {
            run_socket_loop(self, events_tx).await;
        })
    }

    /// apps.connections.open: get a fresh WebSocket URL (app-level token).
    async fn open_socket_url(&self) -> Result<String, SlackError> {
        let url = format!("{}/apps.connections.open", self.api_base);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.app_token)
            .send()
            .await?;
        let data: OpenSocketResponse = decode(res).await?;
        check_ok("apps.connections.open", data.ok, data.error)?;
        data.url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| SlackError::Api("apps.connections.open returned no url".to_string()))
    }

    /// auth.test with the bot token. Fails with an auth error when the token is unusable.
    pub async fn auth_test(&self) -> Result<BotIdentity, SlackError> {
        let url = format!("{}/auth.test", self.api_base);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.bot_token)
            .send()
            .await?;
        let data: AuthTestResponse = decode(res).await?;
        check_ok("auth.test", data.ok, data.error)?;
        Ok(BotIdentity {
            user_id: data.user_id.unwrap_or_default(),
            user: data.user.unwrap_or_default(),
        })
    }

    /// Read one socket connection until Slack asks us to reconnect or the stream ends.
    async fn consume_socket(
        &self,
        socket_url: &str,
        events_tx: &mpsc::UnboundedSender<SourceEvent>,
    ) -> Result<SocketExit, SlackError> {
        let (stream, _) = connect_async(socket_url).await?;
        let (mut sink, mut source) = stream.split();
        while self.running() {
            let Some(frame) = source.next().await else {
                return Ok(SocketExit::Closed);
            };
            let text = match classify_frame(frame?) {
                Frame::Text(text) => text,
                Frame::Close => return Ok(SocketExit::Closed),
                Frame::Skip => continue,
            };
            let outcome = handle_socket_frame(&text);
            if let Some(ack) = outcome.ack {
                sink.send(WsMessage::Text(ack)).await?;
            }
            if let Some(event) = outcome.event {
                if events_tx.send(event).is_err() {
                    log::debug!("slack: events channel closed, stopping loop");
                    self.stop();
                    return Ok(SocketExit::Stopped);
                }
            }
            if outcome.disconnect {
                log::debug!("slack socket: disconnect requested, reconnecting");
                return Ok(SocketExit::Disconnect);
            }
        }
        Ok(SocketExit::Stopped)
    }
}

#[derive(Debug, PartialEq)]
enum Frame {
    Text(String),
    Close,
    Skip,
}

/// Slack only speaks JSON text; binary and control frames carry nothing for us.
fn classify_frame(frame: WsMessage) -> Frame {
    match frame {
        WsMessage::Text(text) => Frame::Text(text),
        WsMessage::Close(_) => Frame::Close,
        _ => Frame::Skip,
    }
}

/// Decode one Socket Mode text frame: ack every envelope that has an id, map `events_api`
/// payloads to message events and report undecodable input as a transport error.
fn handle_socket_frame(text: &str) -> FrameOutcome {
    let envelope: SocketEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            return FrameOutcome {
                ack: None,
                event: Some(SourceEvent::TransportError(format!(
                    "undecodable socket frame: {}",
                    e
                ))),
                disconnect: false,
            }
        }
    };
    let ack = envelope
        .envelope_id
        .as_ref()
        .map(|id| json!({ "envelope_id": id }).to_string());
    let mut outcome = FrameOutcome {
        ack,
        event: None,
        disconnect: false,
    };
    match envelope.envelope_type.as_str() {
        "hello" => log::debug!("slack socket: hello received"),
        "disconnect" => outcome.disconnect = true,
        "events_api" => {
            outcome.event = match message_event_from_payload(envelope.payload) {
                Ok(event) => event.map(SourceEvent::Message),
                Err(e) => Some(SourceEvent::TransportError(format!(
                    "undecodable events_api payload: {}",
                    e
                ))),
            }
        }
        other => log::debug!("slack socket: ignoring envelope type {}", other),
    }
    outcome
}

async fn run_socket_loop(channel: Arc<SlackChannel>, events_tx: mpsc::UnboundedSender<SourceEvent>) {
    while channel.running() {
        let socket_url = match channel.open_socket_url().await {
            Ok(url) => url,
            Err(e) if e.is_auth_failure() => {
                log::error!("slack rejected credentials: {}", e);
                let _ = events_tx.send(SourceEvent::InvalidAuth);
                break;
            }
            Err(e) => {
                if events_tx.send(SourceEvent::TransportError(e.to_string())).is_err() {
                    break;
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };
        match channel.consume_socket(&socket_url, &events_tx).await {
            Ok(exit) => {
                if let Some(delay) = exit.reconnect_delay() {
                    log::debug!("slack socket closed, reconnecting in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => {
                if events_tx.send(SourceEvent::TransportError(e.to_string())).is_err() {
                    break;
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
    log::info!("slack channel: socket mode loop stopped");
}

/// Turn an `events_api` payload into a message event. Non-message events, deletions and
/// edits without a nested message yield `None`.
fn message_event_from_payload(
    payload: serde_json::Value,
) -> Result<Option<MessageEvent>, serde_json::Error> {
    let callback: EventCallback = serde_json::from_value(payload)?;
    let event_type = callback.event.get("type").and_then(|t| t.as_str());
    if callback.callback_type != "event_callback" || event_type != Some("message") {
        return Ok(None);
    }
    let event: SlackMessagePayload = serde_json::from_value(callback.event)?;
    let channel = event.channel.unwrap_or_default();
    match event.subtype.as_deref() {
        Some(SUBTYPE_MESSAGE_CHANGED) => Ok(event.message.map(|sub| MessageEvent::Edited {
            channel,
            user: event.user,
            message: EditedMessage {
                ts: sub.ts.unwrap_or_default(),
                user: sub.user,
                text: sub.text.unwrap_or_default(),
            },
        })),
        Some(SUBTYPE_MESSAGE_DELETED) => Ok(None),
        _ => Ok(Some(MessageEvent::Posted {
            channel,
            ts: event.ts.unwrap_or_default(),
            user: event.user,
            text: event.text.unwrap_or_default(),
        })),
    }
}

async fn decode<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, SlackError> {
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(SlackError::Api(format!("{} {}", status, body)));
    }
    Ok(res.json().await?)
}

fn check_ok(method: &str, ok: bool, error: Option<String>) -> Result<(), SlackError> {
    if ok {
        return Ok(());
    }
    let code = error.unwrap_or_else(|| format!("{} failed", method));
    Err(SlackError::Api(code))
}

#[async_trait]
impl IdentityService for SlackChannel {
    type Error = SlackError;

    async fn user_info(&self, user_id: &str) -> Result<UserInfo, SlackError> {
        let url = format!("{}/users.info", self.api_base);
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.bot_token)
            .query(&[("user", user_id)])
            .send()
            .await?;
        let data: UsersInfoResponse = decode(res).await?;
        check_ok("users.info", data.ok, data.error)?;
        let user = data
            .user
            .ok_or_else(|| SlackError::Api("users.info returned no user".to_string()))?;
        Ok(UserInfo {
            id: user.id,
            name: user.name,
            is_bot: user.is_bot,
        })
    }
}

#[async_trait]
impl PostingService for SlackChannel {
    type Error = SlackError;

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<String, SlackError> {
        let url = format!("{}/chat.postMessage", self.api_base);
        let body = json!({
            "channel": channel,
            "text": text,
            "username": options.username,
            "as_user": options.as_user,
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await?;
        let data: ChatMessageResponse = decode(res).await?;
        check_ok("chat.postMessage", data.ok, data.error)?;
        data.ts
            .ok_or_else(|| SlackError::Api("chat.postMessage returned no ts".to_string()))
    }

    async fn update_message(&self, channel: &str, ts: &str, text: &str) -> Result<(), SlackError> {
        let url = format!("{}/chat.update", self.api_base);
        let body = json!({ "channel": channel, "ts": ts, "text": text });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await?;
        let data: ChatMessageResponse = decode(res).await?;
        check_ok("chat.update", data.ok, data.error)
    }
}
