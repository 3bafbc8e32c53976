//! Wire protocol for RealmNet.
//!
//! Logical messages carried over the realtime transport, as `{event, data}`
//! envelopes. Both directions are closed enums dispatched by exhaustive
//! match; an inbound envelope that fails to decode is protocol noise and is
//! dropped by the gateway (the join event is the one exception and always
//! gets an explicit rejection).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::session::Player;

/// Longest chat message accepted, in characters.
pub const MAX_MESSAGE_LEN: usize = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRealmData {
    pub realm_id: String,
    pub share_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePlayerData {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeleportData {
    pub room_index: usize,
    pub x: i32,
    pub y: i32,
}

/// Client -> server events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinRealm(JoinRealmData),
    MovePlayer(MovePlayerData),
    Teleport(TeleportData),
    ChangedSkin(String),
    SendMessage(String),
}

impl ClientEvent {
    /// Decode an inbound envelope. `None` means the envelope is not a valid
    /// message of any known kind.
    pub fn decode(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Event name of an envelope, readable even when the payload is invalid.
    pub fn event_name(value: &Value) -> Option<&str> {
        value.get("event").and_then(Value::as_str)
    }
}

/// Server -> client events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    JoinedRealm,
    FailedToJoinRoom(String),
    PlayerJoinedRoom(Player),
    PlayerLeftRoom(String),
    PlayerMoved { uid: String, x: i32, y: i32 },
    PlayerTeleported { uid: String, x: i32, y: i32 },
    PlayerChangedSkin { uid: String, skin: String },
    ReceiveMessage { uid: String, message: String },
    Kicked(String),
}

impl ServerEvent {
    pub fn encode(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Collapse whitespace runs to single spaces and trim the ends.
pub fn normalize_message(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
