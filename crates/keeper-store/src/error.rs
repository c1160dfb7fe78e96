use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    UserExists,
    BadCredentials,
    NoSuchUser,
    NoSuchKey,
    NoContent,
    DuplicateVersion,
    Storage,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UserExists => write!(f, "username is already taken"),
            StoreError::BadCredentials => write!(f, "username or password is incorrect"),
            StoreError::NoSuchUser => write!(f, "no such user"),
            StoreError::NoSuchKey => write!(f, "no matching public-key row"),
            StoreError::NoContent => write!(f, "no content for this request"),
            StoreError::DuplicateVersion => write!(f, "identical vault version already stored"),
            StoreError::Storage => write!(f, "storage backend error"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<keeper_auth::AuthError> for StoreError {
    fn from(_: keeper_auth::AuthError) -> Self {
        StoreError::BadCredentials
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NoContent,
            _ => StoreError::Storage,
        }
    }
}

impl From<tokio::time::error::Elapsed> for StoreError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        StoreError::Storage
    }
}
