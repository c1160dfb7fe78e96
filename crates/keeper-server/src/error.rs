//! Maps store/auth errors onto the HTTP responses spec.md §4.6 describes
//! for each endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize, Clone)]
pub struct ErrorBody {
    error: String,
}

impl From<&str> for ErrorBody {
    fn from(msg: &str) -> Self {
        ErrorBody { error: msg.to_string() }
    }
}

pub enum ApiError {
    BadCredentials,
    UserExists,
    NotFound,
    Unauthorized,
    BadRequest(String),
    Storage,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::BadCredentials => (StatusCode::UNAUTHORIZED, "bad credentials"),
            ApiError::UserExists => (StatusCode::BAD_REQUEST, "user already exists"),
            ApiError::NotFound => (StatusCode::NO_CONTENT, "not found"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.as_str()),
            ApiError::Storage => (StatusCode::INTERNAL_SERVER_ERROR, "storage error"),
        };
        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }
        (status, Json(ErrorBody { error: msg.to_string() })).into_response()
    }
}

impl From<keeper_store::StoreError> for ApiError {
    fn from(e: keeper_store::StoreError) -> Self {
        use keeper_store::StoreError::*;
        match e {
            UserExists => ApiError::UserExists,
            BadCredentials => ApiError::BadCredentials,
            NoSuchUser | NoSuchKey | NoContent => ApiError::NotFound,
            // push() callers match DuplicateVersion explicitly and treat it
            // as success before this conversion ever runs — see DESIGN.md.
            DuplicateVersion => ApiError::BadRequest("duplicate version".into()),
            Storage => ApiError::Storage,
        }
    }
}

impl From<keeper_auth::AuthError> for ApiError {
    fn from(e: keeper_auth::AuthError) -> Self {
        match e {
            keeper_auth::AuthError::Unauthorized => ApiError::Unauthorized,
            keeper_auth::AuthError::BadCredentials => ApiError::BadCredentials,
        }
    }
}
