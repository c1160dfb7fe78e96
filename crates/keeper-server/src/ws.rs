//! The notification stream at `/api/v1/keeper/ws`.
//!
//! Grounded on `nexus-gateway/src/lib.rs`'s `ws_handler`/`handle_connection`
//! split-sender/receiver pattern. Unlike Nexus, authentication already
//! happened at HTTP-upgrade time via the cookie gate, so there is no in-band
//! `Identify` handshake — the socket is ready to forward notifications the
//! instant it is accepted.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Extension, State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;

use crate::auth_middleware::Caller;
use crate::state::Shared;

#[derive(Serialize)]
struct WireEvent {
    text: &'static str,
    content: String,
}

impl From<keeper_bus::Event> for WireEvent {
    fn from(event: keeper_bus::Event) -> Self {
        match event {
            keeper_bus::Event::NewVersion { hash } => {
                WireEvent { text: "new version received", content: hash }
            }
            keeper_bus::Event::NewUntrustedKey { armored } => {
                WireEvent { text: "new client with unknown pgp key", content: armored }
            }
        }
    }
}

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Shared>,
    Extension(caller): Extension<Caller>,
) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state, caller))
}

async fn handle_connection(socket: WebSocket, state: Shared, caller: Caller) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.bus.subscribe(&caller.username, &caller.token).await;

    let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel::<Message>();

    let forward_tx = out_tx.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let wire: WireEvent = event.into();
            let text = match serde_json::to_string(&wire) {
                Ok(t) => t,
                Err(_) => continue,
            };
            if forward_tx.send(Message::Text(text.into())).is_err() {
                break;
            }
        }
    });

    let writer_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) if text == "ping" => {
                if out_tx.send(Message::Text("pong".into())).is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward_task.abort();
    drop(out_tx);
    let _ = tokio::time::timeout(Duration::from_secs(1), writer_task).await;
}
