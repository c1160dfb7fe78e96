//! The server's relational store: accounts, vault versions, public keys,
//! and the append-only action log, behind one `StorageBackend` trait so the
//! server can run against Postgres in production and an in-memory backend
//! in tests.

mod backend;
mod error;
mod memory;
mod postgres;
mod types;

pub use backend::StorageBackend;
pub use error::StoreError;
pub use memory::InMemoryBackend;
pub use postgres::PostgresBackend;
pub use types::{ActionLogEntry, PgpKey, VaultVersion};
