//! Realm map snapshots.
//!
//! A realm's definition (ownership, sharing, map layout) lives in the external
//! store; the core reads a snapshot of it once, when a live session is created.
//! Map edits never reach a running session: the owning CRUD layer terminates
//! the session instead.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Skin token used when a joining user has no stored profile.
pub const DEFAULT_SKIN: &str = "009";

/// Where newly admitted players are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnPoint {
    #[serde(rename = "roomIndex")]
    pub room_index: usize,
    pub x: i32,
    pub y: i32,
}

impl Default for SpawnPoint {
    fn default() -> Self {
        Self {
            room_index: 0,
            x: 0,
            y: 0,
        }
    }
}

/// One room of a realm's map. The tilemap is opaque to the core: coordinates
/// are never validated against it (trust-the-client movement).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomLayout {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tilemap: serde_json::Value,
}

impl RoomLayout {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tilemap: serde_json::Value::Null,
        }
    }
}

/// Immutable snapshot of a realm's map, taken at session creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapData {
    #[serde(default)]
    pub spawnpoint: SpawnPoint,
    pub rooms: Vec<RoomLayout>,
}

impl MapData {
    pub fn new(spawnpoint: SpawnPoint, rooms: Vec<RoomLayout>) -> Self {
        Self { spawnpoint, rooms }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
impl MapData {
    /// Snapshot with `rooms` unnamed rooms and a spawn at (0, 0) in room 0.
    pub(crate) fn for_tests(rooms: usize) -> Self {
        Self {
            spawnpoint: SpawnPoint::default(),
            rooms: (0..rooms)
                .map(|i| RoomLayout::named(format!("room-{i}")))
                .collect(),
        }
    }
}

/// A realm row as read from the external store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealmRecord {
    pub id: String,
    pub owner_id: String,
    pub share_id: String,
    pub only_owner: bool,
    pub map_data: MapData,
}

impl RealmRecord {
    /// New record with generated realm and share ids.
    pub fn new(owner_id: impl Into<String>, map_data: MapData) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            share_id: Uuid::new_v4().to_string(),
            only_owner: false,
            map_data,
        }
    }

    pub fn only_owner(mut self, only_owner: bool) -> Self {
        self.only_owner = only_owner;
        self
    }
}
