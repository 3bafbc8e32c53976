//! Connection protocol handler.
//!
//! The gateway owns every registry the realtime surface touches: user
//! presence, live sessions, the join guard, and the outbound delivery map.
//! Each inbound event is validated, resolved to the caller's session,
//! applied, and fanned out to the audience computed from room membership
//! *after* the mutation, so a room transfer always broadcasts against the
//! destination room's final membership.
//!
//! Events from a connection with no live session are dropped silently;
//! only the join event answers failures explicitly.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::error::{RealmNetError, Result};
use crate::join::JoinCoordinator;
use crate::manager::SessionManager;
use crate::outbox::{EventSender, Outbox};
use crate::protocol::{
    normalize_message, ClientEvent, JoinRealmData, MovePlayerData, ServerEvent, TeleportData,
    MAX_MESSAGE_LEN,
};
use crate::realm::DEFAULT_SKIN;
use crate::session::{Player, Session};
use crate::store::RealmStore;
use crate::users::UserRegistry;

/// Gateway configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub max_players_per_session: usize,
    pub max_message_len: usize,
    pub default_skin: String,
    pub max_count_batch: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_players_per_session: 30,
            max_message_len: MAX_MESSAGE_LEN,
            default_skin: DEFAULT_SKIN.to_string(),
            max_count_batch: 100,
        }
    }
}

pub struct Gateway {
    config: GatewayConfig,
    users: UserRegistry,
    sessions: SessionManager,
    joins: JoinCoordinator,
    outbox: Outbox,
    store: Arc<dyn RealmStore>,
    /// connection id -> handshake uid, live for the whole connection
    handshakes: DashMap<String, String>,
}

impl Gateway {
    pub fn new(store: Arc<dyn RealmStore>) -> Self {
        Self::with_config(store, GatewayConfig::default())
    }

    pub fn with_config(store: Arc<dyn RealmStore>, config: GatewayConfig) -> Self {
        Self {
            config,
            users: UserRegistry::new(),
            sessions: SessionManager::new(),
            joins: JoinCoordinator::new(),
            outbox: Outbox::new(),
            store,
            handshakes: DashMap::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn users(&self) -> &UserRegistry {
        &self.users
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    // ==================== Connection lifecycle ====================

    /// Connection handshake. Both identity fields are required; a missing one
    /// refuses the connection. The profile upsert is opportunistic: its
    /// failure is swallowed and the connection proceeds.
    pub async fn connect(
        &self,
        connection_id: &str,
        uid: &str,
        username: &str,
        sender: EventSender,
    ) -> Result<()> {
        if uid.is_empty() || username.is_empty() {
            tracing::debug!(connection_id, "connection refused: missing identity");
            return Err(RealmNetError::protocol("uid and username are required"));
        }

        self.handshakes
            .insert(connection_id.to_string(), uid.to_string());
        self.outbox.register(connection_id, sender);

        if let Err(err) = self.store.upsert_profile(uid, username).await {
            tracing::debug!(%uid, error = %err, "profile upsert failed");
        }

        self.users.register(uid, username);
        tracing::debug!(connection_id, %uid, "connection accepted");
        Ok(())
    }

    /// Transport-level disconnect. Evicts the player registered under this
    /// connection (if any) and tells the former room. Safe to invoke twice:
    /// only the call that actually removes someone broadcasts.
    pub fn disconnect(&self, connection_id: &str) {
        self.outbox.unregister(connection_id);
        let Some((_, uid)) = self.handshakes.remove(connection_id) else {
            return;
        };
        let Some(session) = self.sessions.player_session(&uid) else {
            return;
        };
        let Some(room_index) = session.player_room(&uid) else {
            return;
        };

        let audience: Vec<String> = self
            .sessions
            .connection_ids_in_room(session.realm_id(), room_index)
            .into_iter()
            .filter(|c| c != connection_id)
            .collect();

        if self.sessions.log_out_by_connection(connection_id).is_some() {
            self.outbox
                .send_to(&audience, &ServerEvent::PlayerLeftRoom(uid.clone()));
            self.users.unregister(&uid);
            tracing::debug!(%uid, "player disconnected");
        }
    }

    // ==================== Event dispatch ====================

    /// Handle one inbound envelope. Unknown or ill-typed messages are
    /// protocol noise and are dropped, except join which always answers.
    pub async fn dispatch(&self, connection_id: &str, message: &Value) {
        match ClientEvent::decode(message) {
            Some(ClientEvent::JoinRealm(data)) => self.join_realm(connection_id, data).await,
            Some(ClientEvent::MovePlayer(data)) => self.move_player(connection_id, data),
            Some(ClientEvent::Teleport(data)) => self.teleport(connection_id, data),
            Some(ClientEvent::ChangedSkin(skin)) => self.changed_skin(connection_id, skin),
            Some(ClientEvent::SendMessage(text)) => self.send_message(connection_id, text),
            None => {
                if ClientEvent::event_name(message) == Some("joinRealm") {
                    let uid = self
                        .handshakes
                        .get(connection_id)
                        .map(|r| r.clone())
                        .unwrap_or_default();
                    self.reject_join(connection_id, &uid, "Invalid request data.");
                }
            }
        }
    }

    // ==================== Join sequence ====================

    /// The join sequence. The join guard is held across the store lookups so
    /// a second join message for the same uid cannot race ahead of this one;
    /// it releases on every exit path.
    pub async fn join_realm(&self, connection_id: &str, data: JoinRealmData) {
        let Some(uid) = self.handshakes.get(connection_id).map(|r| r.clone()) else {
            return;
        };

        let Some(_ticket) = self.joins.begin(&uid) else {
            self.reject_join(connection_id, &uid, "Already joining a space.");
            return;
        };

        if let Some(session) = self.sessions.session(&data.realm_id) {
            if session.player_count() >= self.config.max_players_per_session {
                self.reject_join(connection_id, &uid, "Space is full. It's 30 players max.");
                return;
            }
        }

        let realm = match self.store.fetch_realm(&data.realm_id).await {
            Ok(Some(realm)) => realm,
            Ok(None) => {
                self.reject_join(connection_id, &uid, "Space not found.");
                return;
            }
            Err(err) => {
                tracing::warn!(realm_id = %data.realm_id, error = %err, "realm fetch failed");
                self.reject_join(connection_id, &uid, "Server error.");
                return;
            }
        };

        let skin = match self.store.fetch_skin(&uid).await {
            Ok(Some(skin)) => skin,
            Ok(None) => self.config.default_skin.clone(),
            Err(err) => {
                tracing::warn!(%uid, error = %err, "profile fetch failed");
                self.reject_join(connection_id, &uid, "Server error.");
                return;
            }
        };

        if realm.owner_id != uid {
            if realm.only_owner {
                self.reject_join(
                    connection_id,
                    &uid,
                    "This realm is private right now. Come back later!",
                );
                return;
            }
            if realm.share_id != data.share_id {
                self.reject_join(connection_id, &uid, "The share link has been changed.");
                return;
            }
        }

        let Some(user) = self.users.get(&uid) else {
            self.reject_join(connection_id, &uid, "User not found.");
            return;
        };

        // One active connection per uid: drop any stale one before admitting.
        // Kicking can empty (and reap) the session, so get-or-create after.
        if self.sessions.player_session(&uid).is_some() {
            self.kick_player(&uid, "You have logged in from another location.");
        }

        if self.sessions.session(&data.realm_id).is_none() {
            self.sessions
                .create_session(data.realm_id.clone(), realm.map_data);
        }

        let player = match self.sessions.add_player(
            connection_id,
            &data.realm_id,
            &uid,
            &user.username,
            &skin,
        ) {
            Ok(player) => player,
            Err(err) => {
                tracing::warn!(%uid, error = %err, "admission failed");
                self.reject_join(connection_id, &uid, "Server error.");
                return;
            }
        };

        self.outbox.send(connection_id, ServerEvent::JoinedRealm);
        if let Some(session) = self.sessions.session(&data.realm_id) {
            let audience = self.room_audience(&session, &uid);
            self.outbox
                .send_to(&audience, &ServerEvent::PlayerJoinedRoom(player));
        }
        tracing::info!(%uid, realm_id = %data.realm_id, "player joined realm");
    }

    fn reject_join(&self, connection_id: &str, uid: &str, reason: &str) {
        tracing::debug!(uid, reason, "join rejected");
        self.outbox
            .send(connection_id, ServerEvent::FailedToJoinRoom(reason.to_string()));
    }

    // ==================== In-session events ====================

    pub fn move_player(&self, connection_id: &str, data: MovePlayerData) {
        let Some((uid, session)) = self.resolve(connection_id) else {
            return;
        };
        let Some(player) = session.move_player(&uid, data.x, data.y) else {
            return;
        };

        let audience = self.room_audience(&session, &uid);
        self.outbox.send_to(
            &audience,
            &ServerEvent::PlayerMoved {
                uid,
                x: player.x,
                y: player.y,
            },
        );
    }

    pub fn teleport(&self, connection_id: &str, data: TeleportData) {
        let Some((uid, session)) = self.resolve(connection_id) else {
            return;
        };
        let Some(current_room) = session.player_room(&uid) else {
            return;
        };
        if data.room_index >= session.room_count() {
            return;
        }

        if current_room != data.room_index {
            let old_audience = self.room_audience(&session, &uid);
            let Some(player) = session.change_room(&uid, data.room_index, data.x, data.y) else {
                return;
            };
            self.outbox
                .send_to(&old_audience, &ServerEvent::PlayerLeftRoom(uid.clone()));
            let new_audience = self.room_audience(&session, &uid);
            self.outbox
                .send_to(&new_audience, &ServerEvent::PlayerJoinedRoom(player));
        } else {
            let Some(player) = session.move_player(&uid, data.x, data.y) else {
                return;
            };
            let audience = self.room_audience(&session, &uid);
            self.outbox.send_to(
                &audience,
                &ServerEvent::PlayerTeleported {
                    uid,
                    x: player.x,
                    y: player.y,
                },
            );
        }
    }

    pub fn changed_skin(&self, connection_id: &str, skin: String) {
        let Some((uid, session)) = self.resolve(connection_id) else {
            return;
        };
        let Some(player) = session.set_skin(&uid, skin) else {
            return;
        };

        let audience = self.room_audience(&session, &uid);
        self.outbox.send_to(
            &audience,
            &ServerEvent::PlayerChangedSkin {
                uid,
                skin: player.skin,
            },
        );
    }

    pub fn send_message(&self, connection_id: &str, text: String) {
        let Some((uid, session)) = self.resolve(connection_id) else {
            return;
        };
        if text.chars().count() > self.config.max_message_len || text.trim().is_empty() {
            return;
        }

        let message = normalize_message(&text);
        let audience = self.room_audience(&session, &uid);
        self.outbox
            .send_to(&audience, &ServerEvent::ReceiveMessage { uid, message });
    }

    // ==================== External triggers ====================

    /// Disconnect a uid's current connection with a reason. The kicked
    /// connection gets the reason; its former room sees an ordinary leave.
    pub fn kick_player(&self, uid: &str, reason: &str) {
        let Some(session) = self.sessions.player_session(uid) else {
            return;
        };
        let Some(room_index) = session.player_room(uid) else {
            return;
        };

        for player in session.players_in_room(room_index) {
            if player.uid == uid {
                self.outbox
                    .send(&player.connection_id, ServerEvent::Kicked(reason.to_string()));
            } else {
                self.outbox
                    .send(&player.connection_id, ServerEvent::PlayerLeftRoom(uid.to_string()));
            }
        }

        self.sessions.log_out_player(uid);
        tracing::info!(uid, reason, "player kicked");
    }

    /// Tear down a realm's live session because its definition changed or it
    /// was deleted. Every member is evicted and told why; players must not
    /// keep interacting with a stale map snapshot.
    pub fn terminate_realm(&self, realm_id: &str, reason: &str) {
        let exits = self.sessions.terminate_session(realm_id);
        if exits.is_empty() {
            return;
        }
        for exit in &exits {
            self.outbox
                .send(&exit.connection_id, ServerEvent::Kicked(reason.to_string()));
        }
        tracing::info!(realm_id, players = exits.len(), reason, "session terminated");
    }

    // ==================== Query boundary ====================

    /// Players in one room of the caller's current realm, ordered by uid.
    pub fn players_in_room(&self, uid: &str, room_index: usize) -> Result<Vec<Player>> {
        let session = self
            .sessions
            .player_session(uid)
            .ok_or_else(|| RealmNetError::not_in_realm(uid))?;
        Ok(session.players_in_room(room_index))
    }

    /// Player counts for a batch of realm ids, order preserved; unknown ids
    /// report 0. At most `max_count_batch` ids per request.
    pub fn player_counts(&self, realm_ids: &[String]) -> Result<Vec<usize>> {
        if realm_ids.len() > self.config.max_count_batch {
            return Err(RealmNetError::protocol("too many realm ids"));
        }
        Ok(self.sessions.player_counts(realm_ids))
    }

    // ==================== Internals ====================

    fn resolve(&self, connection_id: &str) -> Option<(String, Arc<Session>)> {
        let uid = self.handshakes.get(connection_id).map(|r| r.clone())?;
        let session = self.sessions.player_session(&uid)?;
        Some((uid, session))
    }

    /// Everyone in the sender's current room except the sender's own
    /// connection. Computed against live membership at call time.
    fn room_audience(&self, session: &Session, uid: &str) -> Vec<String> {
        let Some(room_index) = session.player_room(uid) else {
            return Vec::new();
        };
        session
            .players_in_room(room_index)
            .into_iter()
            .filter(|p| p.uid != uid)
            .map(|p| p.connection_id)
            .collect()
    }
}

/// Gateway builder for configuration
pub struct GatewayBuilder {
    config: GatewayConfig,
    store: Arc<dyn RealmStore>,
}

impl GatewayBuilder {
    pub fn new(store: Arc<dyn RealmStore>) -> Self {
        Self {
            config: GatewayConfig::default(),
            store,
        }
    }

    pub fn max_players(mut self, max: usize) -> Self {
        self.config.max_players_per_session = max;
        self
    }

    pub fn max_message_len(mut self, len: usize) -> Self {
        self.config.max_message_len = len;
        self
    }

    pub fn default_skin(mut self, skin: impl Into<String>) -> Self {
        self.config.default_skin = skin.into();
        self
    }

    pub fn max_count_batch(mut self, max: usize) -> Self {
        self.config.max_count_batch = max;
        self
    }

    pub fn build(self) -> Gateway {
        Gateway::with_config(self.store, self.config)
    }
}
