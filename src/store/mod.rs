//! External realm/profile store boundary.
//!
//! The relational store that owns realm definitions and user profiles is out
//! of scope; the core consumes it through this trait. Backends:
//! - In-memory (default, for development and tests)
//! - PostgreSQL (enable with the `postgres` feature)

mod memory;

#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryRealmStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresRealmStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::realm::RealmRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid realm data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read side of the external store, as seen by the session core.
#[async_trait]
pub trait RealmStore: Send + Sync {
    /// Fetch a realm's current record, `None` if it does not exist.
    async fn fetch_realm(&self, realm_id: &str) -> Result<Option<RealmRecord>>;

    /// Fetch a user's stored skin preference, `None` if they have no profile.
    async fn fetch_skin(&self, uid: &str) -> Result<Option<String>>;

    /// Opportunistic profile upsert at handshake. Callers treat failure as
    /// non-fatal; profile existence is not a precondition for presence.
    async fn upsert_profile(&self, uid: &str, username: &str) -> Result<()>;
}
