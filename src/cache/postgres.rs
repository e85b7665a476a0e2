/// PostgreSQL cache backend.
///
/// Table (created on connect by `db::connect_cache_database`):
///
/// ```sql
/// floodrisk.cache_entries (
///     cache_key   TEXT PRIMARY KEY,   -- floodrisk:zone:<id>
///     zone_id     TEXT NOT NULL,
///     payload     JSONB NOT NULL,     -- serialized CacheEntry
///     captured_at TIMESTAMPTZ NOT NULL
/// )
/// ```

use postgres::types::Json;
use postgres::Client;

use crate::cache::CacheStore;
use crate::db;
use crate::model::{CacheEntry, FloodError};

pub struct PostgresCacheStore {
    client: Client,
}

fn db_error(e: postgres::Error) -> FloodError {
    FloodError::Database(e.to_string())
}

impl PostgresCacheStore {
    /// Connects using `DATABASE_URL`.
    pub fn connect() -> Result<Self, FloodError> {
        Ok(Self::from_client(db::connect_cache_database()?))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl CacheStore for PostgresCacheStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn load(&mut self, zone_id: &str) -> Result<Option<CacheEntry>, FloodError> {
        let key = CacheEntry::key_for(zone_id);
        let rows = self
            .client
            .query(
                "SELECT payload FROM floodrisk.cache_entries WHERE cache_key = $1",
                &[&key],
            )
            .map_err(db_error)?;

        match rows.first() {
            Some(row) => {
                let Json(entry): Json<CacheEntry> = row
                    .try_get(0)
                    .map_err(|e| FloodError::Cache(format!("corrupt entry for {}: {}", key, e)))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn save(&mut self, entry: &CacheEntry) -> Result<(), FloodError> {
        let key = CacheEntry::key_for(&entry.zone_id);
        self.client
            .execute(
                "INSERT INTO floodrisk.cache_entries (cache_key, zone_id, payload, captured_at)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (cache_key) DO UPDATE
                 SET zone_id = EXCLUDED.zone_id,
                     payload = EXCLUDED.payload,
                     captured_at = EXCLUDED.captured_at",
                &[&key, &entry.zone_id, &Json(entry), &entry.captured_at],
            )
            .map_err(db_error)?;
        Ok(())
    }
}
