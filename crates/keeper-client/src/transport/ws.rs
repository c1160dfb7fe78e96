//! Notification stream client for `/api/v1/keeper/ws`, grounded on
//! `nexus-sdk-rs`'s `GatewayClient`/`run_once` (reconnect-with-backoff,
//! broadcast fan-out) but simplified for this protocol: authentication rides
//! the session cookie at connect time, not an in-band identify frame, and
//! the keepalive is a bare text `"ping"`/`"pong"` pair rather than JSON
//! opcodes.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector};
use tracing::{error, warn};

const PING_INTERVAL: Duration = Duration::from_secs(1);
const MAX_RECONNECT: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
struct WireFrame {
    text: String,
    content: String,
}

/// A server push decoded from the notification stream.
#[derive(Debug, Clone)]
pub enum Notification {
    /// A new vault version was pushed by another device; `hash` is its digest.
    NewVersion { hash: String },
    /// An unrecognized PGP key enrolled; `armored` needs confirm or revoke.
    NewUntrustedKey { armored: String },
}

impl From<WireFrame> for Option<Notification> {
    fn from(f: WireFrame) -> Self {
        match f.text.as_str() {
            "new version received" => Some(Notification::NewVersion { hash: f.content }),
            "new client with unknown pgp key" => Some(Notification::NewUntrustedKey { armored: f.content }),
            _ => None,
        }
    }
}

/// Maintains a reconnecting WebSocket subscription to the notification
/// stream. `connect` spawns a background task and returns immediately;
/// `subscribe` hands out a broadcast receiver for decoded notifications.
pub struct NotificationClient {
    ws_url: String,
    cookie_header: String,
    sender: broadcast::Sender<Notification>,
}

impl NotificationClient {
    /// `ws_url` is the full `wss://host/api/v1/keeper/ws` endpoint.
    /// `session_token` is the value of the `token` auth cookie.
    pub fn new(ws_url: impl Into<String>, session_token: &str) -> Self {
        let (sender, _) = broadcast::channel(64);
        NotificationClient {
            ws_url: ws_url.into(),
            cookie_header: format!("token={session_token}"),
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn connect(&self) {
        let url = self.ws_url.clone();
        let cookie = self.cookie_header.clone();
        let tx = self.sender.clone();

        tokio::spawn(async move {
            let mut attempts = 0u32;
            loop {
                match run_once(&url, &cookie, &tx).await {
                    Ok(()) => attempts = 0,
                    Err(e) => {
                        attempts += 1;
                        if attempts > MAX_RECONNECT {
                            error!("notification stream: giving up after {attempts} attempts: {e}");
                            break;
                        }
                        let delay = Duration::from_secs(u64::min(2u64.pow(attempts), 30));
                        warn!("notification stream disconnected ({e}), reconnecting in {delay:?}");
                        sleep(delay).await;
                    }
                }
            }
        });
    }
}

async fn run_once(
    url: &str,
    cookie_header: &str,
    tx: &broadcast::Sender<Notification>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let request = Request::builder()
        .uri(url)
        .header("Cookie", cookie_header)
        .header("Host", host_of(url))
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header("Sec-WebSocket-Key", tokio_tungstenite::tungstenite::handshake::client::generate_key())
        .body(())
        .expect("static request parts");

    // The server's certificate is self-issued, see transport/http.rs; the
    // notification stream accepts it the same way reqwest does there.
    let tls = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .expect("native-tls connector always builds");
    let (ws, _) = connect_async_tls_with_config(request, None, false, Some(Connector::NativeTls(tls))).await?;
    let (mut sink, mut stream) = ws.split();

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                sink.send(Message::Text("ping".into())).await?;
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text == "pong" {
                            continue;
                        }
                        if let Ok(frame) = serde_json::from_str::<WireFrame>(&text) {
                            if let Some(notification) = Option::<Notification>::from(frame) {
                                let _ = tx.send(notification);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e),
                }
            }
        }
    }
}

fn host_of(url: &str) -> String {
    url.split("://").nth(1).and_then(|rest| rest.split('/').next()).unwrap_or("localhost").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_version_frame_decodes() {
        let frame = WireFrame { text: "new version received".into(), content: "abc123".into() };
        let notif: Option<Notification> = frame.into();
        assert!(matches!(notif, Some(Notification::NewVersion { hash }) if hash == "abc123"));
    }

    #[test]
    fn untrusted_key_frame_decodes() {
        let frame = WireFrame { text: "new client with unknown pgp key".into(), content: "KEY-X".into() };
        let notif: Option<Notification> = frame.into();
        assert!(matches!(notif, Some(Notification::NewUntrustedKey { armored }) if armored == "KEY-X"));
    }

    #[test]
    fn unknown_frame_text_is_ignored() {
        let frame = WireFrame { text: "something else".into(), content: "x".into() };
        let notif: Option<Notification> = frame.into();
        assert!(notif.is_none());
    }
}
