//! HTTP handlers for the account/vault/key endpoints in spec.md §4.6.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use keeper_bus::Event;
use keeper_store::StoreError;

use crate::auth_middleware::Caller;
use crate::error::ApiError;
use crate::state::Shared;

#[derive(Deserialize)]
pub struct SignupReq {
    username: String,
    password: String,
    publickey: String,
}

#[derive(Deserialize)]
pub struct SigninReq {
    username: String,
    password: String,
    publickey: String,
}

#[derive(Deserialize)]
pub struct PushReq {
    payload: String,
    hashsum: String,
}

#[derive(Deserialize)]
pub struct PullQuery {
    checksum: String,
}

#[derive(Deserialize)]
pub struct PgpReq {
    publickey: String,
}

#[derive(Serialize)]
struct PullResp {
    payload: String,
    hashsum: String,
}

#[derive(Serialize)]
struct VersionResp {
    time: i64,
    hashsum: String,
}

#[derive(Serialize)]
struct PgpResp {
    time: i64,
    publickey: String,
    confirmed: bool,
}

#[derive(Serialize)]
struct LogResp {
    time: i64,
    action: String,
    detail: Option<String>,
}

/// Liveness probe: exercises the store with a cheap, always-empty lookup so
/// a dead connection pool surfaces as 500 rather than a false-positive 200.
pub async fn ping(State(state): State<Shared>) -> impl IntoResponse {
    match state.store.get_log("keeper-ping-probe", "0.0.0.0").await {
        Err(StoreError::Storage) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    }
}

pub async fn signup(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<SignupReq>,
) -> Result<impl IntoResponse, ApiError> {
    if body.username.is_empty() || body.password.is_empty() || body.publickey.is_empty() {
        return Err(ApiError::BadRequest("username, password and publickey are required".into()));
    }
    let ip = addr.ip().to_string();
    state.store.sign_up(&body.username, &body.password, &ip).await?;
    // The account's founding device is trusted immediately — only keys seen
    // for the first time during *signin* go through the unconfirmed path.
    state.store.add_pgp(&body.username, &body.publickey, true, &ip).await?;
    Ok(StatusCode::CREATED)
}

pub async fn signin(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<SigninReq>,
) -> Result<impl IntoResponse, ApiError> {
    if body.username.is_empty() || body.password.is_empty() || body.publickey.is_empty() {
        return Err(ApiError::BadRequest("username, password and publickey are required".into()));
    }
    let ip = addr.ip().to_string();

    state.store.sign_in(&body.username, &body.password, &ip).await?;

    let active = state.store.list_active_pgp(&body.username, &ip).await?;
    match active.iter().find(|k| k.armored == body.publickey) {
        None => {
            state.store.add_pgp(&body.username, &body.publickey, false, &ip).await?;
            state
                .bus
                .publish(&body.username, "", Event::NewUntrustedKey { armored: body.publickey.clone() })
                .await;
            Ok(StatusCode::FORBIDDEN.into_response())
        }
        Some(entry) if !entry.confirmed => Ok(StatusCode::ALREADY_REPORTED.into_response()),
        Some(_) => {
            let token = state.auth.issue(&body.username)?;
            let mut cookie = Cookie::new("token", token);
            cookie.set_path("/");
            cookie.set_http_only(true);
            cookie.set_same_site(SameSite::Strict);
            let jar = CookieJar::new().add(cookie);
            Ok((jar, StatusCode::OK).into_response())
        }
    }
}

pub async fn remove(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = addr.ip().to_string();
    state.store.delete_user(&caller.username, &ip).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn push(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<PushReq>,
) -> Result<impl IntoResponse, ApiError> {
    if body.payload.is_empty() || body.hashsum.is_empty() {
        return Err(ApiError::BadRequest("payload and hashsum are required".into()));
    }
    let ip = addr.ip().to_string();
    match state.store.push(&caller.username, &body.hashsum, &body.payload, &ip).await {
        Ok(()) => {
            state
                .bus
                .publish(&caller.username, &caller.token, Event::NewVersion { hash: body.hashsum.clone() })
                .await;
            Ok(StatusCode::OK)
        }
        // A duplicate (user, hash, ciphertext) push is a no-op repeat of an
        // already-accepted version — treated as success, see DESIGN.md.
        Err(StoreError::DuplicateVersion) => Ok(StatusCode::OK),
        Err(e) => Err(e.into()),
    }
}

pub async fn pull(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(caller): Extension<Caller>,
    Query(q): Query<PullQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = addr.ip().to_string();
    match state.store.pull(&caller.username, &q.checksum, &ip).await {
        Ok(payload) => Ok((StatusCode::OK, Json(PullResp { payload, hashsum: q.checksum })).into_response()),
        Err(StoreError::NoContent) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => Err(e.into()),
    }
}

pub async fn pull_versions(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = addr.ip().to_string();
    let mut versions = state.store.versions(&caller.username, &ip).await?;
    if versions.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    versions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let body: Vec<VersionResp> = versions
        .into_iter()
        .map(|v| VersionResp { time: v.timestamp, hashsum: v.hash })
        .collect();
    Ok((StatusCode::OK, Json(body)).into_response())
}

pub async fn pgp_list(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = addr.ip().to_string();
    let keys = state.store.list_active_pgp(&caller.username, &ip).await?;
    if keys.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let body: Vec<PgpResp> = keys
        .into_iter()
        .map(|k| PgpResp { time: k.timestamp, publickey: k.armored, confirmed: k.confirmed })
        .collect();
    Ok((StatusCode::OK, Json(body)).into_response())
}

pub async fn pgp_add(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<PgpReq>,
) -> Result<impl IntoResponse, ApiError> {
    if body.publickey.is_empty() {
        return Err(ApiError::BadRequest("publickey is required".into()));
    }
    let ip = addr.ip().to_string();
    // Confirmed=false: a key added outside the signin flow still needs an
    // already-trusted device to confirm it before it can push or pull.
    state.store.add_pgp(&caller.username, &body.publickey, false, &ip).await?;
    Ok(StatusCode::CREATED)
}

pub async fn pgp_confirm(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<PgpReq>,
) -> Result<impl IntoResponse, ApiError> {
    if body.publickey.is_empty() {
        return Err(ApiError::BadRequest("publickey is required".into()));
    }
    let ip = addr.ip().to_string();
    state.store.confirm_pgp(&caller.username, &body.publickey, &ip).await?;
    Ok(StatusCode::OK)
}

pub async fn pgp_revoke(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<PgpReq>,
) -> Result<impl IntoResponse, ApiError> {
    if body.publickey.is_empty() {
        return Err(ApiError::BadRequest("publickey is required".into()));
    }
    let ip = addr.ip().to_string();
    state.store.revoke_pgp(&caller.username, &body.publickey, &ip).await?;
    Ok(StatusCode::GONE)
}

pub async fn logs(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = addr.ip().to_string();
    let entries = state.store.get_log(&caller.username, &ip).await?;
    if entries.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let body: Vec<LogResp> = entries
        .into_iter()
        .map(|e| LogResp { time: e.timestamp, action: e.action, detail: e.detail })
        .collect();
    Ok((StatusCode::OK, Json(body)).into_response())
}
