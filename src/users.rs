//! Connected-user presence registry.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Lightweight presence info for a connected user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPresence {
    pub uid: String,
    pub username: String,
}

/// Process-wide uid -> presence registry, populated by the connection
/// handshake and cleared on disconnect. Identity validation belongs to the
/// handshake, not here: `register` overwrites unconditionally.
pub struct UserRegistry {
    users: DashMap<String, UserPresence>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    pub fn register(&self, uid: impl Into<String>, username: impl Into<String>) {
        let uid = uid.into();
        let presence = UserPresence {
            uid: uid.clone(),
            username: username.into(),
        };
        self.users.insert(uid, presence);
    }

    pub fn get(&self, uid: &str) -> Option<UserPresence> {
        self.users.get(uid).map(|r| r.clone())
    }

    pub fn unregister(&self, uid: &str) -> bool {
        self.users.remove(uid).is_some()
    }

    pub fn count(&self) -> usize {
        self.users.len()
    }
}

impl Default for UserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = UserRegistry::new();
        registry.register("u1", "alice");

        let presence = registry.get("u1").unwrap();
        assert_eq!(presence.uid, "u1");
        assert_eq!(presence.username, "alice");
        assert_eq!(registry.count(), 1);
        assert!(registry.get("u2").is_none());
    }

    #[test]
    fn test_register_overwrites() {
        let registry = UserRegistry::new();
        registry.register("u1", "alice");
        registry.register("u1", "alicia");

        assert_eq!(registry.get("u1").unwrap().username, "alicia");
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = UserRegistry::new();
        registry.register("u1", "alice");

        assert!(registry.unregister("u1"));
        assert!(!registry.unregister("u1"));
        assert_eq!(registry.count(), 0);
    }
}
