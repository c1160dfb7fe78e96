//! Session gate: reads the `token` cookie, validates it, and stashes the
//! caller's username in request extensions for handlers to pick up.
//!
//! Grounded on the teacher's `auth_middleware` (bearer-header gate backed by
//! an API-key store), generalized to a signed cookie backed by `keeper-auth`.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::CookieJar;

use crate::error::ErrorBody;
use crate::state::Shared;

#[derive(Clone)]
pub struct Caller {
    pub username: String,
    pub token: String,
}

pub async fn auth_middleware(
    State(state): State<Shared>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> impl IntoResponse {
    let token = match jar.get("token") {
        Some(c) => c.value().to_string(),
        None => {
            return (
                StatusCode::FORBIDDEN,
                Json(ErrorBody::from("missing session cookie")),
            )
                .into_response()
        }
    };

    match state.auth.validate(&token) {
        Ok(username) => {
            req.extensions_mut().insert(Caller { username, token });
            next.run(req).await.into_response()
        }
        Err(_) => (
            StatusCode::FORBIDDEN,
            Json(ErrorBody::from("invalid or expired session")),
        )
            .into_response(),
    }
}
