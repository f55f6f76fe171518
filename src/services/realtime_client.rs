//! Realtime change feed for the hosted backend.
//!
//! Joins the backend's Phoenix-style websocket channel for the `bookmarks`
//! table and forwards `postgres_changes` frames into a [`Subscription`] queue
//! in the same payload shape the local change feed produces.
//!
//! ## Protocol
//!
//! 1. Connect to `{url}/realtime/v1/websocket?apikey=..&vsn=1.0.0`
//! 2. Send `phx_join` for `realtime:bookmarks:{user_id}` with the change filters
//!    and the user's access token
//! 3. Wait for the `phx_reply` to the join
//! 4. Forward change frames, heartbeat every 25s, `phx_leave` on release
//!
//! Each subscription runs on its own thread with a current-thread runtime, so
//! callers stay synchronous. There is no automatic reconnect: a dropped socket
//! ends the feed and the session falls back to refetches.

use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use zeroize::Zeroizing;

use crate::services::remote_store::Subscription;
use crate::types::change::BOOKMARKS_TABLE;
use crate::types::errors::StoreError;
use crate::types::settings::{BackendSettings, RealtimeSettings};

pub const REALTIME_PATH: &str = "/realtime/v1/websocket";
const PROTOCOL_VERSION: &str = "1.0.0";
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const JOIN_REF: &str = "1";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Websocket client for the hosted backend's change feed.
pub struct RealtimeClient {
    socket_url: String,
    access_token: Zeroizing<String>,
    capacity: usize,
    join_timeout: Duration,
}

/// Everything the channel thread needs.
struct Channel {
    socket_url: String,
    topic: String,
    user_id: String,
    join: Value,
    sender: mpsc::Sender<Value>,
}

impl RealtimeClient {
    pub fn new(
        backend: &BackendSettings,
        realtime: &RealtimeSettings,
        access_token: &str,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            socket_url: realtime_endpoint(&backend.url, &backend.anon_key)?,
            access_token: Zeroizing::new(access_token.to_string()),
            capacity: realtime.channel_capacity.max(1),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        })
    }

    /// How long `subscribe` waits for the server to accept the join.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn socket_url(&self) -> &str {
        &self.socket_url
    }

    /// Joins the user's bookmark channel and returns once the server accepts.
    ///
    /// A refused join is `Unauthorized`; a socket that cannot be opened, or a
    /// join that is not answered in time, is `Network`.
    pub fn subscribe(&self, user_id: &str) -> Result<Subscription, StoreError> {
        let topic = channel_topic(user_id);
        let (sender, receiver) = mpsc::channel(self.capacity);
        let channel = Channel {
            socket_url: self.socket_url.clone(),
            join: join_message(&topic, user_id, &self.access_token),
            topic,
            user_id: user_id.to_string(),
            sender,
        };
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        thread::Builder::new()
            .name(format!("realtime-{}", user_id))
            .spawn(move || run_channel(channel, ready_tx, stop_rx))
            .map_err(|e| StoreError::Network(e.to_string()))?;

        match ready_rx.recv_timeout(self.join_timeout) {
            Ok(Ok(())) => {
                tracing::debug!(user_id, "realtime channel joined");
                Ok(Subscription::new(receiver, move || {
                    let _ = stop_tx.send(());
                }))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(StoreError::Network("realtime join timed out".to_string())),
        }
    }
}

/// `ws(s)://{host}/realtime/v1/websocket?apikey={key}&vsn=1.0.0` for a backend base URL.
pub fn realtime_endpoint(base_url: &str, anon_key: &str) -> Result<String, StoreError> {
    let base = base_url.trim_end_matches('/');
    let socket_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    let url = Url::parse_with_params(
        &format!("{}{}", socket_base, REALTIME_PATH),
        &[("apikey", anon_key), ("vsn", PROTOCOL_VERSION)],
    )
    .map_err(|e| StoreError::Network(format!("invalid realtime url {}: {}", base_url, e)))?;
    Ok(url.to_string())
}

pub fn channel_topic(user_id: &str) -> String {
    format!("realtime:{}:{}", BOOKMARKS_TABLE, user_id)
}

/// The `phx_join` frame. Inserts are filtered to the owner server-side;
/// deletes carry only the old id, so they cannot be filtered by owner.
pub fn join_message(topic: &str, user_id: &str, access_token: &str) -> Value {
    json!({
        "topic": topic,
        "event": "phx_join",
        "ref": JOIN_REF,
        "join_ref": JOIN_REF,
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    {
                        "event": "INSERT",
                        "schema": "public",
                        "table": BOOKMARKS_TABLE,
                        "filter": format!("user_id=eq.{}", user_id),
                    },
                    {
                        "event": "DELETE",
                        "schema": "public",
                        "table": BOOKMARKS_TABLE,
                    },
                ],
            },
            "access_token": access_token,
        },
    })
}

fn heartbeat_message(msg_ref: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
}

fn leave_message(topic: &str, msg_ref: u64) -> Value {
    json!({
        "topic": topic,
        "event": "phx_leave",
        "payload": {},
        "ref": msg_ref.to_string(),
        "join_ref": JOIN_REF,
    })
}

/// Converts a `postgres_changes` frame into the `{eventType, table, new, old}`
/// payload shape. Returns `None` for other frames and for inserts owned by
/// another user.
pub fn change_payload(frame: &Value, user_id: &str) -> Option<Value> {
    if frame.get("event")?.as_str()? != "postgres_changes" {
        return None;
    }
    let data = frame.get("payload")?.get("data")?;
    let event_type = data.get("type")?.as_str()?;
    let record = data.get("record").cloned().unwrap_or_else(|| json!({}));
    let old_record = data.get("old_record").cloned().unwrap_or_else(|| json!({}));

    if event_type == "INSERT" && record.get("user_id").and_then(Value::as_str) != Some(user_id) {
        return None;
    }

    Some(json!({
        "eventType": event_type,
        "table": data.get("table").cloned().unwrap_or(Value::Null),
        "new": record,
        "old": old_record,
    }))
}

/// Outcome of the join, if `frame` is the reply to it.
fn join_reply(frame: &Value) -> Option<Result<(), StoreError>> {
    if frame.get("event")?.as_str()? != "phx_reply" || frame.get("ref")?.as_str()? != JOIN_REF {
        return None;
    }
    let payload = frame.get("payload")?;
    let status = payload.get("status").and_then(Value::as_str).unwrap_or("");
    if status == "ok" {
        return Some(Ok(()));
    }
    let reason = payload
        .get("response")
        .and_then(|r| r.get("reason"))
        .and_then(Value::as_str)
        .unwrap_or(status);
    Some(Err(StoreError::Unauthorized(format!(
        "realtime join refused: {}",
        reason
    ))))
}

fn run_channel(
    channel: Channel,
    ready: std_mpsc::Sender<Result<(), StoreError>>,
    stop: oneshot::Receiver<()>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(StoreError::Network(e.to_string())));
            return;
        }
    };

    runtime.block_on(async move {
        let mut socket = match join(&channel).await {
            Ok(socket) => socket,
            Err(err) => {
                tracing::debug!(topic = %channel.topic, "realtime join failed: {err}");
                let _ = ready.send(Err(err));
                return;
            }
        };
        let _ = ready.send(Ok(()));
        forward(&mut socket, &channel, stop).await;
    });
}

async fn join(channel: &Channel) -> Result<Socket, StoreError> {
    let network = |e: tokio_tungstenite::tungstenite::Error| StoreError::Network(e.to_string());

    let (mut socket, _) = connect_async(channel.socket_url.as_str())
        .await
        .map_err(network)?;
    socket
        .send(Message::Text(channel.join.to_string()))
        .await
        .map_err(network)?;

    while let Some(frame) = socket.next().await {
        match frame.map_err(network)? {
            Message::Text(text) => {
                let Ok(value) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                if let Some(reply) = join_reply(&value) {
                    return reply.map(|_| socket);
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err(StoreError::Network(
        "realtime socket closed before the join was answered".to_string(),
    ))
}

/// Pumps frames into the subscription queue until released or disconnected.
async fn forward(socket: &mut Socket, channel: &Channel, mut stop: oneshot::Receiver<()>) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = &mut stop => {
                let leave = leave_message(&channel.topic, next_ref);
                let _ = socket.send(Message::Text(leave.to_string())).await;
                let _ = socket.close(None).await;
                tracing::debug!(topic = %channel.topic, "realtime channel left");
                return;
            }
            _ = heartbeat.tick() => {
                let beat = heartbeat_message(next_ref);
                next_ref += 1;
                if let Err(e) = socket.send(Message::Text(beat.to_string())).await {
                    tracing::warn!(topic = %channel.topic, "realtime heartbeat failed: {e}");
                    return;
                }
            }
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !deliver(&text, channel) {
                        return;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::warn!(topic = %channel.topic, "realtime socket closed by server");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(topic = %channel.topic, "realtime socket error: {e}");
                    return;
                }
            }
        }
    }
}

/// Queues one text frame. Returns false once the channel should stop.
fn deliver(text: &str, channel: &Channel) -> bool {
    let Ok(frame) = serde_json::from_str::<Value>(text) else {
        tracing::debug!(topic = %channel.topic, "ignoring non-JSON realtime frame");
        return true;
    };
    match frame.get("event").and_then(Value::as_str) {
        Some("phx_error") | Some("phx_close") => {
            tracing::warn!(topic = %channel.topic, "realtime channel closed by server");
            return false;
        }
        _ => {}
    }
    let Some(payload) = change_payload(&frame, &channel.user_id) else {
        return true;
    };
    match channel.sender.try_send(payload) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(topic = %channel.topic, "realtime queue full, dropping event");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}
