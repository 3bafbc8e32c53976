//! In-memory store backend.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{RealmStore, Result};
use crate::realm::RealmRecord;

/// DashMap-backed store for development and tests.
pub struct MemoryRealmStore {
    realms: DashMap<String, RealmRecord>,
    /// uid -> stored username
    profiles: DashMap<String, String>,
    /// uid -> skin preference
    skins: DashMap<String, String>,
}

impl MemoryRealmStore {
    pub fn new() -> Self {
        Self {
            realms: DashMap::new(),
            profiles: DashMap::new(),
            skins: DashMap::new(),
        }
    }

    /// Seed a realm, returning its id.
    pub fn insert_realm(&self, record: RealmRecord) -> String {
        let id = record.id.clone();
        self.realms.insert(id.clone(), record);
        id
    }

    pub fn remove_realm(&self, realm_id: &str) -> bool {
        self.realms.remove(realm_id).is_some()
    }

    pub fn set_skin(&self, uid: impl Into<String>, skin: impl Into<String>) {
        self.skins.insert(uid.into(), skin.into());
    }

    pub fn profile_username(&self, uid: &str) -> Option<String> {
        self.profiles.get(uid).map(|r| r.clone())
    }
}

impl Default for MemoryRealmStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealmStore for MemoryRealmStore {
    async fn fetch_realm(&self, realm_id: &str) -> Result<Option<RealmRecord>> {
        Ok(self.realms.get(realm_id).map(|r| r.clone()))
    }

    async fn fetch_skin(&self, uid: &str) -> Result<Option<String>> {
        Ok(self.skins.get(uid).map(|r| r.clone()))
    }

    async fn upsert_profile(&self, uid: &str, username: &str) -> Result<()> {
        self.profiles
            .insert(uid.to_string(), username.to_string());
        Ok(())
    }
}
