//! PostgreSQL store backend.
//!
//! Enable with the `postgres` feature flag:
//! ```toml
//! realmnet = { version = "0.1", features = ["postgres"] }
//! ```
//!
//! Reads the `realms` and `profiles` tables owned by the CRUD layer; all
//! queries are parameterized.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::{RealmStore, Result, StoreError};
use crate::realm::{MapData, RealmRecord};

pub struct PostgresRealmStore {
    pool: PgPool,
}

impl PostgresRealmStore {
    /// Connect with a connection string.
    pub async fn connect(database_url: &str) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RealmStore for PostgresRealmStore {
    async fn fetch_realm(&self, realm_id: &str) -> Result<Option<RealmRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id::text AS id, owner_id::text AS owner_id, share_id::text AS share_id,
                   only_owner, map_data
            FROM realms
            WHERE id = $1::uuid
            "#,
        )
        .bind(realm_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let map_data: MapData =
            serde_json::from_value(row.get::<serde_json::Value, _>("map_data"))
                .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        Ok(Some(RealmRecord {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            share_id: row.get("share_id"),
            only_owner: row.get("only_owner"),
            map_data,
        }))
    }

    async fn fetch_skin(&self, uid: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT skin FROM profiles WHERE id = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(row.map(|r| r.get("skin")))
    }

    async fn upsert_profile(&self, uid: &str, username: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO profiles (id, username) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET username = $2",
        )
        .bind(uid)
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}
