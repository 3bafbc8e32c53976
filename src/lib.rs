//! # RealmNet
//!
//! Realtime session and room coordination core for shared virtual realms.
//!
//! A realm is a 2D tile-based space divided into rooms, defined in an
//! external store. While it has players connected, a realm is backed by one
//! in-memory [`Session`]; the [`Gateway`] dispatches each connection's events
//! into it and fans state changes out to everyone in the same room.
//!
//! ## Features
//!
//! - **Presence**: handshake-scoped user registry
//! - **Sessions**: per-realm rosters with room-local broadcast audiences
//! - **Join guard**: single admission sequence per uid across async lookups
//! - **Single session per user**: a new connection displaces the old one
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use realmnet::{Gateway, MemoryRealmStore};
//!
//! let store = Arc::new(MemoryRealmStore::new());
//! let gateway = Gateway::new(store);
//!
//! let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//! gateway.connect("conn-1", "uid-1", "alice", tx).await?;
//! gateway.dispatch("conn-1", &message).await;
//! ```

pub mod error;
pub mod gateway;
pub mod join;
pub mod manager;
pub mod outbox;
pub mod protocol;
pub mod realm;
pub mod session;
pub mod store;
pub mod users;

// Re-exports
pub use error::{RealmNetError, Result};
pub use gateway::{Gateway, GatewayBuilder, GatewayConfig};
pub use join::JoinCoordinator;
pub use manager::{PlayerExit, SessionManager};
pub use outbox::{EventReceiver, EventSender, Outbox};
pub use protocol::{ClientEvent, ServerEvent, MAX_MESSAGE_LEN};
pub use realm::{MapData, RealmRecord, RoomLayout, SpawnPoint, DEFAULT_SKIN};
pub use session::{Player, Session};
pub use store::{MemoryRealmStore, RealmStore, StoreError};
pub use users::{UserPresence, UserRegistry};

#[cfg(feature = "postgres")]
pub use store::PostgresRealmStore;
