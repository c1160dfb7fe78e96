//! Per-user notification fan-out.
//!
//! One process-wide mutex guards a `user -> token -> channel` map, matching
//! spec.md §4.7's "per-user record holding a map: token -> unbounded
//! buffered channel". This crate owns every subscription channel outright;
//! nothing else is allowed to close one — they close only when a session's
//! token goes unparseable or expires and the sweeper drops it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};

/// A notification delivered to every other live session of a user. The
/// server's websocket handler is responsible for translating this into the
/// `{text, content}` wire frame spec.md §6 describes — this type is the
/// bus's internal vocabulary, not the wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    NewVersion { hash: String },
    NewUntrustedKey { armored: String },
}

pub type Subscription = mpsc::UnboundedReceiver<Event>;

struct Inner {
    users: HashMap<String, HashMap<String, mpsc::UnboundedSender<Event>>>,
}

/// Owns every live subscription channel.
pub struct Bus {
    inner: Mutex<Inner>,
}

impl Bus {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { users: HashMap::new() }) }
    }

    /// Create (or replace) the channel for `(username, token)`. Creates the
    /// user record if absent, matching spec.md's `subscribe` contract.
    pub async fn subscribe(&self, username: &str, token: &str) -> Subscription {
        let mut inner = self.inner.lock().await;
        let (tx, rx) = mpsc::unbounded_channel();
        inner.users.entry(username.to_string()).or_default().insert(token.to_string(), tx);
        rx
    }

    /// Deliver `event` to every subscription of `username` except the one
    /// keyed by `originator_token`, so a session never echoes its own action
    /// back to itself.
    pub async fn publish(&self, username: &str, originator_token: &str, event: Event) {
        let inner = self.inner.lock().await;
        if let Some(channels) = inner.users.get(username) {
            for (token, tx) in channels {
                if token != originator_token {
                    let _ = tx.send(event.clone());
                }
            }
        }
    }

    async fn sweep_once(&self) {
        let mut inner = self.inner.lock().await;
        let mut removed = 0usize;
        inner.users.retain(|_, channels| {
            let before = channels.len();
            channels.retain(|token, _tx| is_live(token));
            removed += before - channels.len();
            !channels.is_empty()
        });
        if removed > 0 {
            tracing::debug!(removed, "swept expired notification subscriptions");
        }
    }

    /// Spawn the periodic sweep (every 10s), grounded on the teacher's
    /// rate-limiter cleanup task: `tokio::spawn` plus a `tokio::time::interval`
    /// loop calling back into a shared state handle.
    pub fn spawn_sweeper(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            loop {
                interval.tick().await;
                self.sweep_once().await;
            }
        });
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

fn is_live(token: &str) -> bool {
    match keeper_auth::expiry_from_token(token) {
        Some(exp) => exp > Utc::now().timestamp(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keeper_auth::Auth;

    #[tokio::test]
    async fn publish_excludes_the_originator() {
        let bus = Bus::new();
        let auth = Auth::new();
        let t1 = auth.issue("alice").unwrap();
        let t2 = auth.issue("alice").unwrap();

        let mut sub1 = bus.subscribe("alice", &t1).await;
        let mut sub2 = bus.subscribe("alice", &t2).await;

        bus.publish("alice", &t1, Event::NewVersion { hash: "h1".to_string() }).await;

        assert!(sub1.try_recv().is_err());
        assert_eq!(sub2.try_recv().unwrap(), Event::NewVersion { hash: "h1".to_string() });
    }

    #[tokio::test]
    async fn publish_to_unrelated_user_is_a_no_op() {
        let bus = Bus::new();
        let auth = Auth::new();
        let t1 = auth.issue("alice").unwrap();
        let mut sub1 = bus.subscribe("alice", &t1).await;

        bus.publish("bob", "irrelevant-token", Event::NewVersion { hash: "h1".to_string() }).await;
        assert!(sub1.try_recv().is_err());
    }

    #[tokio::test]
    async fn sweep_drops_unparseable_and_expired_tokens() {
        let bus = Bus::new();
        bus.subscribe("alice", "not-a-jwt").await;
        bus.sweep_once().await;

        let count = bus.inner.lock().await.users.len();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn sweep_keeps_unexpired_subscriptions() {
        let bus = Bus::new();
        let auth = Auth::new();
        let token = auth.issue("alice").unwrap();
        bus.subscribe("alice", &token).await;
        bus.sweep_once().await;

        let count = bus.inner.lock().await.users.len();
        assert_eq!(count, 1);
    }
}
