//! SQLite-backed profile store.

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use bending_game::profile::Binds;
use bending_game::{CooldownSnapshot, Element, PlayerId, PlayerProfile, Preset};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::debug;

use crate::error::StorageError;
use crate::store::ProfileStore;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS bending_players (
        player_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        elements TEXT NOT NULL,
        slots TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS bending_presets (
        player_id TEXT NOT NULL,
        name TEXT NOT NULL,
        binds TEXT NOT NULL,
        PRIMARY KEY (player_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS bending_cooldowns (
        player_id TEXT NOT NULL,
        ability_id TEXT NOT NULL,
        remaining_ms INTEGER NOT NULL,
        PRIMARY KEY (player_id, ability_id)
    )",
];

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and create the schema. The database file is created if missing.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// A private in-memory database, kept alive by a single pinned connection.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

impl ProfileStore for SqliteStore {
    async fn load(&self, player: PlayerId) -> Result<Option<PlayerProfile>, StorageError> {
        let key = player.to_string();
        let Some(row) =
            sqlx::query("SELECT name, elements, slots FROM bending_players WHERE player_id = ?")
                .bind(&key)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };
        let name: String = row.try_get("name")?;
        let elements: Vec<Element> = serde_json::from_str(row.try_get::<&str, _>("elements")?)?;
        let slots: Binds = serde_json::from_str(row.try_get::<&str, _>("slots")?)?;

        let mut profile = PlayerProfile::new(player, &name);
        profile.elements = elements;
        profile.slots = slots;

        let presets = sqlx::query("SELECT name, binds FROM bending_presets WHERE player_id = ?")
            .bind(&key)
            .fetch_all(&self.pool)
            .await?;
        for row in presets {
            let name: String = row.try_get("name")?;
            let binds: Binds = serde_json::from_str(row.try_get::<&str, _>("binds")?)?;
            profile
                .presets
                .insert(name.clone(), Preset { name, binds });
        }

        let cooldowns = sqlx::query(
            "SELECT ability_id, remaining_ms FROM bending_cooldowns WHERE player_id = ? ORDER BY ability_id",
        )
        .bind(&key)
        .fetch_all(&self.pool)
        .await?;
        for row in cooldowns {
            let remaining: i64 = row.try_get("remaining_ms")?;
            profile.cooldowns.push(CooldownSnapshot {
                ability: row.try_get("ability_id")?,
                remaining_ms: remaining.max(0) as u64,
            });
        }

        debug!("Loaded profile for {name} ({player})");
        Ok(Some(profile))
    }

    async fn save(&self, profile: &PlayerProfile) -> Result<(), StorageError> {
        let key = profile.player_id.to_string();
        let elements = serde_json::to_string(&profile.elements)?;
        let slots = serde_json::to_string(&profile.slots)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO bending_players (player_id, name, elements, slots, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (player_id) DO UPDATE SET
                name = excluded.name,
                elements = excluded.elements,
                slots = excluded.slots,
                updated_at = excluded.updated_at",
        )
        .bind(&key)
        .bind(&profile.name)
        .bind(&elements)
        .bind(&slots)
        .bind(unix_timestamp())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM bending_presets WHERE player_id = ?")
            .bind(&key)
            .execute(&mut *tx)
            .await?;
        for preset in profile.presets.values() {
            sqlx::query("INSERT INTO bending_presets (player_id, name, binds) VALUES (?, ?, ?)")
                .bind(&key)
                .bind(&preset.name)
                .bind(serde_json::to_string(&preset.binds)?)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM bending_cooldowns WHERE player_id = ?")
            .bind(&key)
            .execute(&mut *tx)
            .await?;
        for cooldown in &profile.cooldowns {
            sqlx::query(
                "INSERT INTO bending_cooldowns (player_id, ability_id, remaining_ms) VALUES (?, ?, ?)",
            )
            .bind(&key)
            .bind(&cooldown.ability)
            .bind(cooldown.remaining_ms.min(i64::MAX as u64) as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Saved profile for {} ({})", profile.name, profile.player_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample() -> PlayerProfile {
        let mut profile = PlayerProfile::new(Uuid::new_v4(), "Katara");
        profile.elements = vec![Element::Water];
        profile.bind(0, "water-blast").unwrap();
        profile.create_preset("duel").unwrap();
        profile.cooldowns.push(CooldownSnapshot {
            ability: "water-blast".into(),
            remaining_ms: 1200,
        });
        profile
    }

    #[tokio::test]
    async fn save_then_load() {
        let store = SqliteStore::in_memory().await.unwrap();
        let profile = sample();
        store.save(&profile).await.unwrap();
        assert_eq!(store.load(profile.player_id).await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn missing_player_is_none() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(store.load(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_replaces_presets_and_cooldowns() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut profile = sample();
        store.save(&profile).await.unwrap();

        profile.delete_preset("duel").unwrap();
        profile.cooldowns.clear();
        profile.elements.push(Element::Earth);
        store.save(&profile).await.unwrap();

        let loaded = store.load(profile.player_id).await.unwrap().unwrap();
        assert!(loaded.presets.is_empty());
        assert!(loaded.cooldowns.is_empty());
        assert_eq!(loaded.elements, vec![Element::Water, Element::Earth]);
    }

    #[tokio::test]
    async fn corrupt_row_is_serialization_error() {
        let store = SqliteStore::in_memory().await.unwrap();
        let player = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO bending_players (player_id, name, elements, slots, updated_at)
             VALUES (?, 'Bumi', 'not json', '[]', 0)",
        )
        .bind(player.to_string())
        .execute(&store.pool)
        .await
        .unwrap();
        assert!(matches!(
            store.load(player).await,
            Err(StorageError::Serialization(_))
        ));
    }
}
