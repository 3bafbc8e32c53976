//! Error types for RealmNet.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RealmNetError>;

#[derive(Error, Debug)]
pub enum RealmNetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {reason}")]
    Protocol { reason: String },

    #[error("No live session for realm: {realm_id}")]
    SessionNotFound { realm_id: String },

    #[error("Player not found: {uid}")]
    PlayerNotFound { uid: String },

    #[error("User is not in a realm: {uid}")]
    NotInRealm { uid: String },

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl RealmNetError {
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    pub fn session_not_found(realm_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            realm_id: realm_id.into(),
        }
    }

    pub fn player_not_found(uid: impl Into<String>) -> Self {
        Self::PlayerNotFound { uid: uid.into() }
    }

    pub fn not_in_realm(uid: impl Into<String>) -> Self {
        Self::NotInRealm { uid: uid.into() }
    }
}
