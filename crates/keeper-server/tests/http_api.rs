//! End-to-end scenarios from spec.md §8, driven in-process against the
//! in-memory store via `tower::ServiceExt::oneshot` (no TLS, no sockets).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use keeper_server::{app, AppState};
use keeper_store::InMemoryBackend;
use tower::ServiceExt;

fn peer() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 4242)
}

fn router() -> axum::Router {
    let store = Arc::new(InMemoryBackend::new());
    app(AppState::new(store))
}

fn request(method: &str, path: &str, cookie: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json");
    if let Some(c) = cookie {
        builder = builder.header("cookie", format!("token={c}"));
    }
    let mut req = builder.body(Body::from(body.to_string())).unwrap();
    req.extensions_mut().insert(ConnectInfo(peer()));
    req
}

fn empty_request(method: &str, path: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(c) = cookie {
        builder = builder.header("cookie", format!("token={c}"));
    }
    let mut req = builder.body(Body::empty()).unwrap();
    req.extensions_mut().insert(ConnectInfo(peer()));
    req
}

fn token_from_set_cookie(headers: &axum::http::HeaderMap) -> String {
    let raw = headers.get("set-cookie").unwrap().to_str().unwrap();
    let pair = raw.split(';').next().unwrap();
    pair.trim_start_matches("token=").to_string()
}

async fn body_json(res: axum::response::Response) -> serde_json::Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn signup_then_push_then_pull_round_trips() {
    let app = router();

    let signup = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/signup",
            None,
            serde_json::json!({"username": "alice", "password": "pw", "publickey": "KEY-A"}),
        ))
        .await
        .unwrap();
    assert_eq!(signup.status(), StatusCode::CREATED);

    let signin = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/signin",
            None,
            serde_json::json!({"username": "alice", "password": "pw", "publickey": "KEY-A"}),
        ))
        .await
        .unwrap();
    assert_eq!(signin.status(), StatusCode::OK);
    let token = token_from_set_cookie(signin.headers());

    let push = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/keeper/push",
            Some(&token),
            serde_json::json!({"payload": "-----BEGIN PGP MESSAGE-----...END", "hashsum": "e3b0c4"}),
        ))
        .await
        .unwrap();
    assert_eq!(push.status(), StatusCode::OK);

    let pull = app
        .clone()
        .oneshot(empty_request("GET", "/api/v1/keeper/pull?checksum=e3b0c4", Some(&token)))
        .await
        .unwrap();
    assert_eq!(pull.status(), StatusCode::OK);
    let body = body_json(pull).await;
    assert_eq!(body["payload"], "-----BEGIN PGP MESSAGE-----...END");
}

#[tokio::test]
async fn enrollment_from_a_second_device_requires_confirmation() {
    let app = router();

    app.clone()
        .oneshot(request(
            "POST",
            "/api/v1/signup",
            None,
            serde_json::json!({"username": "alice", "password": "pw", "publickey": "KEY-A"}),
        ))
        .await
        .unwrap();

    let device1 = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/signin",
            None,
            serde_json::json!({"username": "alice", "password": "pw", "publickey": "KEY-A"}),
        ))
        .await
        .unwrap();
    let token1 = token_from_set_cookie(device1.headers());

    let device2_first = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/signin",
            None,
            serde_json::json!({"username": "alice", "password": "pw", "publickey": "KEY-B"}),
        ))
        .await
        .unwrap();
    assert_eq!(device2_first.status(), StatusCode::FORBIDDEN);

    let list = app
        .clone()
        .oneshot(empty_request("GET", "/api/v1/keeper/pgp/list", Some(&token1)))
        .await
        .unwrap();
    assert_eq!(list.status(), StatusCode::OK);
    let keys = body_json(list).await;
    let key_b = keys.as_array().unwrap().iter().find(|k| k["publickey"] == "KEY-B").unwrap();
    assert_eq!(key_b["confirmed"], false);

    let confirm = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/keeper/pgp/confirm",
            Some(&token1),
            serde_json::json!({"publickey": "KEY-B"}),
        ))
        .await
        .unwrap();
    assert_eq!(confirm.status(), StatusCode::OK);

    let device2_retry = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/signin",
            None,
            serde_json::json!({"username": "alice", "password": "pw", "publickey": "KEY-B"}),
        ))
        .await
        .unwrap();
    assert_eq!(device2_retry.status(), StatusCode::OK);
}

#[tokio::test]
async fn duplicate_push_is_accepted_twice() {
    let app = router();

    app.clone()
        .oneshot(request(
            "POST",
            "/api/v1/signup",
            None,
            serde_json::json!({"username": "bob", "password": "pw", "publickey": "KEY-A"}),
        ))
        .await
        .unwrap();
    let signin = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/signin",
            None,
            serde_json::json!({"username": "bob", "password": "pw", "publickey": "KEY-A"}),
        ))
        .await
        .unwrap();
    let token = token_from_set_cookie(signin.headers());

    let body = serde_json::json!({"payload": "P", "hashsum": "H"});
    let first = app.clone().oneshot(request("POST", "/api/v1/keeper/push", Some(&token), body.clone())).await.unwrap();
    let second = app.clone().oneshot(request("POST", "/api/v1/keeper/push", Some(&token), body)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
}

#[tokio::test]
async fn revoke_returns_gone_and_locks_out_the_key() {
    let app = router();

    app.clone()
        .oneshot(request(
            "POST",
            "/api/v1/signup",
            None,
            serde_json::json!({"username": "carol", "password": "pw", "publickey": "KEY-A"}),
        ))
        .await
        .unwrap();
    let signin = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/signin",
            None,
            serde_json::json!({"username": "carol", "password": "pw", "publickey": "KEY-A"}),
        ))
        .await
        .unwrap();
    let token = token_from_set_cookie(signin.headers());

    app.clone()
        .oneshot(request(
            "POST",
            "/api/v1/signin",
            None,
            serde_json::json!({"username": "carol", "password": "pw", "publickey": "KEY-B"}),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(request(
            "POST",
            "/api/v1/keeper/pgp/confirm",
            Some(&token),
            serde_json::json!({"publickey": "KEY-B"}),
        ))
        .await
        .unwrap();

    let revoke = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/keeper/pgp/revoke",
            Some(&token),
            serde_json::json!({"publickey": "KEY-B"}),
        ))
        .await
        .unwrap();
    assert_eq!(revoke.status(), StatusCode::GONE);

    let list = app.clone().oneshot(empty_request("GET", "/api/v1/keeper/pgp/list", Some(&token))).await.unwrap();
    let keys = body_json(list).await;
    assert!(keys.as_array().unwrap().iter().all(|k| k["publickey"] != "KEY-B"));
}

#[tokio::test]
async fn missing_or_garbage_cookie_is_forbidden() {
    let app = router();
    let res = app.clone().oneshot(empty_request("GET", "/api/v1/keeper/logs", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.oneshot(empty_request("GET", "/api/v1/keeper/logs", Some("not-a-jwt"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn ping_is_public_and_ok() {
    let app = router();
    let res = app.oneshot(empty_request("GET", "/api/v1/ping", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
