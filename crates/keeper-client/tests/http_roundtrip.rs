//! Drives `transport::http::HttpTransport` against a real, locally bound
//! `keeper-server` router (plain HTTP, no TLS — TLS bootstrap is exercised
//! by `keeper-server`'s own tests) to cover the spec.md §8 signup/push/pull
//! and enrollment scenarios from the client's side of the wire.

use std::net::SocketAddr;
use std::sync::Arc;

use keeper_client::{HttpTransport, SigninOutcome};
use keeper_server::AppState;
use keeper_store::InMemoryBackend;

async fn spawn_server() -> String {
    let store = Arc::new(InMemoryBackend::new());
    let app = keeper_server::app(AppState::new(store));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn signup_signin_push_pull_round_trip() {
    let base = spawn_server().await;
    let transport = HttpTransport::new(base).unwrap();

    transport.signup("dave", "pw", "KEY-A").await.unwrap();
    let outcome = transport.signin("dave", "pw", "KEY-A").await.unwrap();
    assert_eq!(outcome, SigninOutcome::Trusted);
    assert!(transport.session_token().is_some());

    transport.push("-----BEGIN PGP MESSAGE-----body", "deadbeef").await.unwrap();
    let pulled = transport.pull("deadbeef").await.unwrap().unwrap();
    assert_eq!(pulled.payload, "-----BEGIN PGP MESSAGE-----body");

    let versions = transport.versions().await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].hashsum, "deadbeef");
}

#[tokio::test]
async fn second_device_key_is_registered_unconfirmed_then_confirmable() {
    let base = spawn_server().await;
    let device1 = HttpTransport::new(base.clone()).unwrap();
    device1.signup("erin", "pw", "KEY-A").await.unwrap();
    assert_eq!(device1.signin("erin", "pw", "KEY-A").await.unwrap(), SigninOutcome::Trusted);

    let device2 = HttpTransport::new(base).unwrap();
    assert_eq!(device2.signin("erin", "pw", "KEY-B").await.unwrap(), SigninOutcome::UnknownKeyRegistered);

    let keys = device1.pgp_list().await.unwrap();
    assert!(keys.iter().any(|k| k.publickey == "KEY-B" && !k.confirmed));

    device1.pgp_confirm("KEY-B").await.unwrap();
    assert_eq!(device2.signin("erin", "pw", "KEY-B").await.unwrap(), SigninOutcome::Trusted);
}

#[tokio::test]
async fn revoke_returns_ok_and_drops_the_key_from_the_active_list() {
    let base = spawn_server().await;
    let device1 = HttpTransport::new(base.clone()).unwrap();
    device1.signup("frank", "pw", "KEY-A").await.unwrap();
    device1.signin("frank", "pw", "KEY-A").await.unwrap();

    let device2 = HttpTransport::new(base).unwrap();
    device2.signin("frank", "pw", "KEY-B").await.unwrap();
    device1.pgp_confirm("KEY-B").await.unwrap();

    device1.pgp_revoke("KEY-B").await.unwrap();
    let keys = device1.pgp_list().await.unwrap();
    assert!(keys.iter().all(|k| k.publickey != "KEY-B"));
}
