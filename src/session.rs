//! Live realm sessions.
//!
//! A [`Session`] is the in-memory instance of one realm: the map snapshot it
//! was created from, every currently connected player, and a per-room
//! membership index used to compute broadcast audiences. Membership and
//! positions live behind a single lock so a room transfer can never be
//! observed half-applied by an audience computation.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::realm::MapData;

/// A connected user's live presence inside a session.
///
/// `uid` is stable across reconnects; `connection_id` identifies the current
/// transport connection and changes when the same user connects again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub uid: String,
    pub username: String,
    pub x: i32,
    pub y: i32,
    pub room: usize,
    #[serde(rename = "socketId")]
    pub connection_id: String,
    pub skin: String,
}

struct SessionInner {
    players: HashMap<String, Player>,
    /// room index -> uids present in that room
    rooms: Vec<HashSet<String>>,
}

/// One live realm instance.
pub struct Session {
    realm_id: String,
    map: MapData,
    inner: RwLock<SessionInner>,
}

impl Session {
    pub fn new(realm_id: impl Into<String>, map: MapData) -> Self {
        let room_slots = map.room_count().max(1);
        Self {
            realm_id: realm_id.into(),
            map,
            inner: RwLock::new(SessionInner {
                players: HashMap::new(),
                rooms: vec![HashSet::new(); room_slots],
            }),
        }
    }

    pub fn realm_id(&self) -> &str {
        &self.realm_id
    }

    pub fn map(&self) -> &MapData {
        &self.map
    }

    pub fn room_count(&self) -> usize {
        self.inner.read().rooms.len()
    }

    /// Admit a player at the map's spawn point. An existing entry for the same
    /// uid is replaced, so a rejoin never leaves a ghost in the old room.
    pub fn add_player(
        &self,
        connection_id: impl Into<String>,
        uid: impl Into<String>,
        username: impl Into<String>,
        skin: impl Into<String>,
    ) -> Player {
        let uid = uid.into();
        let mut inner = self.inner.write();
        Self::evict_locked(&mut inner, &uid);

        let spawn = self.map.spawnpoint;
        let room = spawn.room_index.min(inner.rooms.len() - 1);
        let player = Player {
            uid: uid.clone(),
            username: username.into(),
            x: spawn.x,
            y: spawn.y,
            room,
            connection_id: connection_id.into(),
            skin: skin.into(),
        };

        inner.rooms[room].insert(uid.clone());
        inner.players.insert(uid, player.clone());
        player
    }

    pub fn remove_player(&self, uid: &str) -> Option<Player> {
        let mut inner = self.inner.write();
        Self::evict_locked(&mut inner, uid)
    }

    fn evict_locked(inner: &mut SessionInner, uid: &str) -> Option<Player> {
        let player = inner.players.remove(uid)?;
        inner.rooms[player.room].remove(uid);
        Some(player)
    }

    /// Unconditionally overwrite a player's position. No bounds or speed
    /// validation is applied. Returns the updated player, or `None` if the
    /// uid is not a member.
    pub fn move_player(&self, uid: &str, x: i32, y: i32) -> Option<Player> {
        let mut inner = self.inner.write();
        let player = inner.players.get_mut(uid)?;
        player.x = x;
        player.y = y;
        Some(player.clone())
    }

    /// Transfer a player to another room, updating position and both room
    /// indices under one lock. Returns `None` for an unknown uid or an
    /// out-of-range room index.
    pub fn change_room(&self, uid: &str, room_index: usize, x: i32, y: i32) -> Option<Player> {
        let mut inner = self.inner.write();
        if room_index >= inner.rooms.len() {
            return None;
        }
        let old_room = inner.players.get(uid)?.room;
        inner.rooms[old_room].remove(uid);
        inner.rooms[room_index].insert(uid.to_string());

        let player = inner.players.get_mut(uid)?;
        player.room = room_index;
        player.x = x;
        player.y = y;
        Some(player.clone())
    }

    pub fn set_skin(&self, uid: &str, skin: impl Into<String>) -> Option<Player> {
        let mut inner = self.inner.write();
        let player = inner.players.get_mut(uid)?;
        player.skin = skin.into();
        Some(player.clone())
    }

    pub fn player(&self, uid: &str) -> Option<Player> {
        self.inner.read().players.get(uid).cloned()
    }

    pub fn player_room(&self, uid: &str) -> Option<usize> {
        self.inner.read().players.get(uid).map(|p| p.room)
    }

    /// Players currently in a room, ordered by uid.
    pub fn players_in_room(&self, room_index: usize) -> Vec<Player> {
        let inner = self.inner.read();
        let Some(uids) = inner.rooms.get(room_index) else {
            return Vec::new();
        };
        let mut players: Vec<Player> = uids
            .iter()
            .filter_map(|uid| inner.players.get(uid).cloned())
            .collect();
        players.sort_by(|a, b| a.uid.cmp(&b.uid));
        players
    }

    pub fn player_ids(&self) -> Vec<String> {
        self.inner.read().players.keys().cloned().collect()
    }

    pub fn player_count(&self) -> usize {
        self.inner.read().players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().players.is_empty()
    }
}
