//! Outbound event delivery.
//!
//! One sender per live connection, registered at handshake and dropped at
//! disconnect. Delivery is fire-and-forget: an event for an unknown or
//! already-closed connection is discarded, never retried.

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::protocol::ServerEvent;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

pub struct Outbox {
    senders: DashMap<String, EventSender>,
}

impl Outbox {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    /// Attach a connection's outbound channel. Reconnects overwrite.
    pub fn register(&self, connection_id: impl Into<String>, sender: EventSender) {
        self.senders.insert(connection_id.into(), sender);
    }

    pub fn unregister(&self, connection_id: &str) -> bool {
        self.senders.remove(connection_id).is_some()
    }

    /// Deliver one event. Returns whether a live sender was found.
    pub fn send(&self, connection_id: &str, event: ServerEvent) -> bool {
        match self.senders.get(connection_id) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Fan an event out to a set of connections.
    pub fn send_to(&self, connection_ids: &[String], event: &ServerEvent) {
        for connection_id in connection_ids {
            self.send(connection_id, event.clone());
        }
    }

    pub fn count(&self) -> usize {
        self.senders.len()
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}
