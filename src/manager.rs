//! Process-wide session registry.
//!
//! Three maps, kept mutually consistent: realm id -> session, uid -> realm id
//! (a uid is in at most one session at a time), connection id -> uid. Every
//! admit/evict updates them as a unit with no suspension point in between.
//! The manager owns state only; eviction results are returned to the caller,
//! which performs any notification fan-out.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{RealmNetError, Result};
use crate::realm::MapData;
use crate::session::{Player, Session};

/// Record of a player removed from a session, for caller-side notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerExit {
    pub uid: String,
    pub connection_id: String,
    pub realm_id: String,
    pub room_index: usize,
}

pub struct SessionManager {
    sessions: DashMap<String, Arc<Session>>,
    /// uid -> realm id
    player_realms: DashMap<String, String>,
    /// connection id -> uid
    connections: DashMap<String, String>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            player_realms: DashMap::new(),
            connections: DashMap::new(),
        }
    }

    /// Construct a session for a realm from a map snapshot. Performs no
    /// existence check, so a second call overwrites. Callers serialize this
    /// against concurrent joins via the join coordinator.
    pub fn create_session(&self, realm_id: impl Into<String>, map: MapData) -> Arc<Session> {
        let realm_id = realm_id.into();
        let session = Arc::new(Session::new(realm_id.clone(), map));
        self.sessions.insert(realm_id, session.clone());
        session
    }

    pub fn session(&self, realm_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(realm_id).map(|r| r.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The session a uid currently belongs to, via the reverse index.
    pub fn player_session(&self, uid: &str) -> Option<Arc<Session>> {
        let realm_id = self.player_realms.get(uid)?;
        self.sessions.get(realm_id.value()).map(|r| r.clone())
    }

    pub fn uid_for_connection(&self, connection_id: &str) -> Option<String> {
        self.connections.get(connection_id).map(|r| r.clone())
    }

    /// Admit a player into the named session at its spawn point and update
    /// all three registry maps. Fails if no session exists for the realm;
    /// callers create it first.
    ///
    /// Any previous membership for the uid is dropped first, so a uid can
    /// never be counted in two sessions.
    pub fn add_player(
        &self,
        connection_id: &str,
        realm_id: &str,
        uid: &str,
        username: &str,
        skin: &str,
    ) -> Result<Player> {
        let session = self
            .session(realm_id)
            .ok_or_else(|| RealmNetError::session_not_found(realm_id))?;

        if let Some(prev_realm) = self.player_realms.get(uid).map(|r| r.clone()) {
            if prev_realm != realm_id {
                self.log_out_player(uid);
            } else if let Some(old) = session.player(uid) {
                self.connections.remove(&old.connection_id);
            }
        }

        let player = session.add_player(connection_id, uid, username, skin);
        self.player_realms
            .insert(uid.to_string(), realm_id.to_string());
        self.connections
            .insert(connection_id.to_string(), uid.to_string());
        Ok(player)
    }

    /// Evict a uid from its session, clearing all three maps. Empty sessions
    /// are reaped on the spot.
    pub fn log_out_player(&self, uid: &str) -> Option<PlayerExit> {
        let (_, realm_id) = self.player_realms.remove(uid)?;
        let session = self.session(&realm_id)?;
        let player = session.remove_player(uid)?;
        self.connections.remove(&player.connection_id);
        self.sessions.remove_if(&realm_id, |_, s| s.is_empty());

        Some(PlayerExit {
            uid: player.uid,
            connection_id: player.connection_id,
            realm_id,
            room_index: player.room,
        })
    }

    /// Evict whoever is registered under a connection id. Idempotent: a
    /// second invocation for the same connection returns `None`.
    pub fn log_out_by_connection(&self, connection_id: &str) -> Option<PlayerExit> {
        let uid = self.uid_for_connection(connection_id)?;
        self.log_out_player(&uid)
    }

    /// Connection ids of every player in a room, for audience computation.
    pub fn connection_ids_in_room(&self, realm_id: &str, room_index: usize) -> Vec<String> {
        match self.session(realm_id) {
            Some(session) => session
                .players_in_room(room_index)
                .into_iter()
                .map(|p| p.connection_id)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn player_count(&self, realm_id: &str) -> usize {
        self.session(realm_id)
            .map(|s| s.player_count())
            .unwrap_or(0)
    }

    /// Player counts for a batch of realm ids, order preserved. Unknown
    /// realms report 0 rather than failing.
    pub fn player_counts(&self, realm_ids: &[String]) -> Vec<usize> {
        realm_ids.iter().map(|id| self.player_count(id)).collect()
    }

    /// Discard a realm's session wholesale, returning the evicted players so
    /// the caller can notify each connection with its termination reason.
    pub fn terminate_session(&self, realm_id: &str) -> Vec<PlayerExit> {
        let Some((_, session)) = self.sessions.remove(realm_id) else {
            return Vec::new();
        };

        let mut exits = Vec::new();
        for uid in session.player_ids() {
            let Some(player) = session.remove_player(&uid) else {
                continue;
            };
            self.player_realms.remove_if(&uid, |_, r| r == realm_id);
            self.connections.remove(&player.connection_id);
            exits.push(PlayerExit {
                uid: player.uid,
                connection_id: player.connection_id,
                realm_id: realm_id.to_string(),
                room_index: player.room,
            });
        }
        exits
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_session(realm_id: &str, rooms: usize) -> SessionManager {
        let manager = SessionManager::new();
        manager.create_session(realm_id, MapData::for_tests(rooms));
        manager
    }

    #[test]
    fn test_add_player_requires_session() {
        let manager = SessionManager::new();
        let err = manager
            .add_player("c1", "r1", "u1", "alice", "009")
            .unwrap_err();
        assert!(matches!(err, RealmNetError::SessionNotFound { .. }));
    }

    #[test]
    fn test_add_and_resolve_player() {
        let manager = manager_with_session("r1", 1);
        manager.add_player("c1", "r1", "u1", "alice", "009").unwrap();

        assert_eq!(manager.player_count("r1"), 1);
        assert_eq!(manager.uid_for_connection("c1").unwrap(), "u1");
        assert_eq!(manager.player_session("u1").unwrap().realm_id(), "r1");
        assert_eq!(manager.connection_ids_in_room("r1", 0), vec!["c1"]);
    }

    #[test]
    fn test_single_session_per_uid() {
        let manager = manager_with_session("r1", 1);
        manager.create_session("r2", MapData::for_tests(1));

        manager.add_player("c1", "r1", "u1", "alice", "009").unwrap();
        manager.add_player("c2", "r2", "u1", "alice", "009").unwrap();

        assert_eq!(manager.player_count("r1"), 0);
        assert_eq!(manager.player_count("r2"), 1);
        assert_eq!(manager.player_session("u1").unwrap().realm_id(), "r2");
        // the old connection no longer routes anywhere
        assert!(manager.uid_for_connection("c1").is_none());
    }

    #[test]
    fn test_rejoin_same_realm_drops_stale_connection() {
        let manager = manager_with_session("r1", 1);
        manager.add_player("c1", "r1", "u1", "alice", "009").unwrap();
        manager.add_player("c2", "r1", "u1", "alice", "009").unwrap();

        assert_eq!(manager.player_count("r1"), 1);
        assert!(manager.uid_for_connection("c1").is_none());
        assert_eq!(manager.uid_for_connection("c2").unwrap(), "u1");
    }

    #[test]
    fn test_log_out_by_connection_idempotent() {
        let manager = manager_with_session("r1", 1);
        manager.add_player("c1", "r1", "u1", "alice", "009").unwrap();

        let exit = manager.log_out_by_connection("c1").unwrap();
        assert_eq!(exit.uid, "u1");
        assert_eq!(exit.room_index, 0);
        assert!(manager.log_out_by_connection("c1").is_none());
        assert!(manager.player_session("u1").is_none());
    }

    #[test]
    fn test_empty_session_reaped_on_last_leave() {
        let manager = manager_with_session("r1", 1);
        manager.add_player("c1", "r1", "u1", "alice", "009").unwrap();
        manager.add_player("c2", "r1", "u2", "bob", "009").unwrap();

        manager.log_out_player("u1");
        assert!(manager.session("r1").is_some());

        manager.log_out_player("u2");
        assert!(manager.session("r1").is_none());
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_player_counts_zero_for_unknown() {
        let manager = manager_with_session("r1", 1);
        manager.add_player("c1", "r1", "u1", "alice", "009").unwrap();
        manager.add_player("c2", "r1", "u2", "bob", "009").unwrap();

        let counts =
            manager.player_counts(&["r1".to_string(), "nope".to_string()]);
        assert_eq!(counts, vec![2, 0]);
    }

    #[test]
    fn test_terminate_session_evicts_everyone() {
        let manager = manager_with_session("r1", 2);
        manager.add_player("c1", "r1", "u1", "alice", "009").unwrap();
        manager.add_player("c2", "r1", "u2", "bob", "009").unwrap();

        let mut exits = manager.terminate_session("r1");
        exits.sort_by(|a, b| a.uid.cmp(&b.uid));
        assert_eq!(exits.len(), 2);
        assert_eq!(exits[0].connection_id, "c1");
        assert!(manager.session("r1").is_none());
        assert!(manager.player_session("u1").is_none());
        assert!(manager.uid_for_connection("c2").is_none());

        assert!(manager.terminate_session("r1").is_empty());
    }
}
