//! HTTP transport for the account/vault/key endpoints in spec.md §4.6.
//! One `reqwest::Client` per remote, cookie jar enabled so the session
//! token survives across calls the way a browser would carry it.

use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigninOutcome {
    /// 200: credentials and key both accepted, session cookie set.
    Trusted,
    /// 208: key seen before but not yet confirmed by another device.
    PendingConfirmation,
    /// 403: key never seen before; the server registered it unconfirmed.
    UnknownKeyRegistered,
}

#[derive(Debug, Serialize)]
struct SignupReq<'a> {
    username: &'a str,
    password: &'a str,
    publickey: &'a str,
}

#[derive(Debug, Serialize)]
struct SigninReq<'a> {
    username: &'a str,
    password: &'a str,
    publickey: &'a str,
}

#[derive(Debug, Serialize)]
struct PushReq<'a> {
    payload: &'a str,
    hashsum: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct PullResp {
    pub payload: String,
    pub hashsum: String,
}

#[derive(Debug, Deserialize)]
pub struct VersionResp {
    pub time: i64,
    pub hashsum: String,
}

#[derive(Debug, Deserialize)]
pub struct PgpResp {
    pub time: i64,
    pub publickey: String,
    pub confirmed: bool,
}

#[derive(Debug, Deserialize)]
pub struct LogResp {
    pub time: i64,
    pub action: String,
    pub detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct PgpReq<'a> {
    publickey: &'a str,
}

/// A remote keeper-server reached over HTTPS with a self-issued certificate.
/// Accepting that certificate without CA validation is a deliberate
/// consequence of spec.md §6's self-issued TLS bootstrap, not an oversight.
///
/// The session token is tracked explicitly (rather than via reqwest's opaque
/// cookie jar) so it can also be handed to the notification WebSocket, which
/// authenticates at connect time instead of carrying a jar of its own.
pub struct HttpTransport {
    client: reqwest::Client,
    base: String,
    token: RwLock<Option<String>>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(HttpTransport { client, base: base_url.into(), token: RwLock::new(None) })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.read().unwrap().as_ref() {
            Some(t) => builder.header("Cookie", format!("token={t}")),
            None => builder,
        }
    }

    pub fn session_token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        let res = self.client.get(self.url("/api/v1/ping")).send().await?;
        status_to_unit(res.status())
    }

    pub async fn signup(&self, username: &str, password: &str, publickey: &str) -> Result<(), ClientError> {
        let res = self
            .client
            .post(self.url("/api/v1/signup"))
            .json(&SignupReq { username, password, publickey })
            .send()
            .await?;
        match res.status().as_u16() {
            201 => Ok(()),
            400 => Err(ClientError::BadRequest(body_text(res).await)),
            409 => Err(ClientError::BadRequest("username already taken".into())),
            _ => Err(unexpected(res).await),
        }
    }

    /// On a trusted (200) outcome, extracts the session token from the
    /// `Set-Cookie` header and remembers it for every subsequent call.
    pub async fn signin(&self, username: &str, password: &str, publickey: &str) -> Result<SigninOutcome, ClientError> {
        let res = self
            .client
            .post(self.url("/api/v1/signin"))
            .json(&SigninReq { username, password, publickey })
            .send()
            .await?;
        match res.status().as_u16() {
            200 => {
                let token = extract_token_cookie(&res).ok_or_else(|| {
                    ClientError::Transport("signin succeeded but no session cookie was set".into())
                })?;
                *self.token.write().unwrap() = Some(token);
                Ok(SigninOutcome::Trusted)
            }
            208 => Ok(SigninOutcome::PendingConfirmation),
            403 => Ok(SigninOutcome::UnknownKeyRegistered),
            401 => Err(ClientError::BadCredentials),
            400 => Err(ClientError::BadRequest(body_text(res).await)),
            _ => Err(unexpected(res).await),
        }
    }

    pub async fn remove(&self) -> Result<(), ClientError> {
        let res = self.authed(self.client.post(self.url("/api/v1/keeper/remove"))).send().await?;
        match res.status().as_u16() {
            202 => Ok(()),
            403 => Err(ClientError::Unauthorized),
            _ => Err(unexpected(res).await),
        }
    }

    pub async fn push(&self, payload: &str, hashsum: &str) -> Result<(), ClientError> {
        let res = self
            .authed(self.client.post(self.url("/api/v1/keeper/push")))
            .json(&PushReq { payload, hashsum })
            .send()
            .await?;
        match res.status().as_u16() {
            200 => Ok(()),
            403 => Err(ClientError::Unauthorized),
            400 => Err(ClientError::BadRequest(body_text(res).await)),
            _ => Err(unexpected(res).await),
        }
    }

    /// `None` on 204: no content has been pushed for this user yet.
    pub async fn pull(&self, checksum: &str) -> Result<Option<PullResp>, ClientError> {
        let res = self
            .authed(self.client.get(self.url(&format!("/api/v1/keeper/pull?checksum={checksum}"))))
            .send()
            .await?;
        match res.status().as_u16() {
            200 => Ok(Some(res.json().await?)),
            204 => Ok(None),
            403 => Err(ClientError::Unauthorized),
            _ => Err(unexpected(res).await),
        }
    }

    pub async fn versions(&self) -> Result<Vec<VersionResp>, ClientError> {
        let res = self.authed(self.client.get(self.url("/api/v1/keeper/pull/versions"))).send().await?;
        match res.status().as_u16() {
            200 => Ok(res.json().await?),
            204 => Ok(Vec::new()),
            403 => Err(ClientError::Unauthorized),
            _ => Err(unexpected(res).await),
        }
    }

    pub async fn pgp_list(&self) -> Result<Vec<PgpResp>, ClientError> {
        let res = self.authed(self.client.get(self.url("/api/v1/keeper/pgp/list"))).send().await?;
        match res.status().as_u16() {
            200 => Ok(res.json().await?),
            204 => Ok(Vec::new()),
            403 => Err(ClientError::Unauthorized),
            _ => Err(unexpected(res).await),
        }
    }

    pub async fn pgp_add(&self, publickey: &str) -> Result<(), ClientError> {
        let res = self
            .authed(self.client.post(self.url("/api/v1/keeper/pgp/add")))
            .json(&PgpReq { publickey })
            .send()
            .await?;
        match res.status().as_u16() {
            201 => Ok(()),
            403 => Err(ClientError::Unauthorized),
            400 => Err(ClientError::BadRequest(body_text(res).await)),
            _ => Err(unexpected(res).await),
        }
    }

    pub async fn pgp_confirm(&self, publickey: &str) -> Result<(), ClientError> {
        let res = self
            .authed(self.client.post(self.url("/api/v1/keeper/pgp/confirm")))
            .json(&PgpReq { publickey })
            .send()
            .await?;
        match res.status().as_u16() {
            200 => Ok(()),
            403 => Err(ClientError::Unauthorized),
            400 => Err(ClientError::BadRequest(body_text(res).await)),
            _ => Err(unexpected(res).await),
        }
    }

    /// The server answers 410 Gone on a successful revoke, per spec.md's
    /// literal status table; it is not an error here.
    pub async fn pgp_revoke(&self, publickey: &str) -> Result<(), ClientError> {
        let res = self
            .authed(self.client.post(self.url("/api/v1/keeper/pgp/revoke")))
            .json(&PgpReq { publickey })
            .send()
            .await?;
        match res.status().as_u16() {
            410 => Ok(()),
            403 => Err(ClientError::Unauthorized),
            400 => Err(ClientError::BadRequest(body_text(res).await)),
            _ => Err(unexpected(res).await),
        }
    }

    pub async fn logs(&self) -> Result<Vec<LogResp>, ClientError> {
        let res = self.authed(self.client.get(self.url("/api/v1/keeper/logs"))).send().await?;
        match res.status().as_u16() {
            200 => Ok(res.json().await?),
            204 => Ok(Vec::new()),
            403 => Err(ClientError::Unauthorized),
            _ => Err(unexpected(res).await),
        }
    }
}

fn extract_token_cookie(res: &reqwest::Response) -> Option<String> {
    let raw = res.headers().get(reqwest::header::SET_COOKIE)?.to_str().ok()?;
    let pair = raw.split(';').next()?;
    pair.trim_start_matches("token=").to_string().into()
}

fn status_to_unit(status: reqwest::StatusCode) -> Result<(), ClientError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ClientError::Transport(format!("unexpected status {status}")))
    }
}

async fn body_text(res: reqwest::Response) -> String {
    res.text().await.unwrap_or_default()
}

async fn unexpected(res: reqwest::Response) -> ClientError {
    let status = res.status();
    ClientError::Transport(format!("unexpected status {status}: {}", body_text(res).await))
}
