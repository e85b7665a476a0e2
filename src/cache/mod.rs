/// Last-known-good persistence for published zone state.
///
/// One `CacheEntry` per zone under the key `floodrisk:zone:<id>`. The
/// scheduler restores it on start and overwrites it after every
/// successful live refresh. Reads and writes are independent; the cache is
/// best-effort and a failed write never invalidates the published state.
///
/// Backends:
/// - `FileCacheStore`     — one JSON document per key, written atomically
/// - `PostgresCacheStore` — JSONB rows in `floodrisk.cache_entries`
/// - `MemoryCacheStore`   — process-local map, shareable between instances

pub mod postgres;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::config::{CacheBackend, CacheConfig};
use crate::model::{CacheEntry, FloodError};

pub use self::postgres::PostgresCacheStore;

/// Storage for the last-known-good state of each zone.
pub trait CacheStore: Send {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Entry for `zone_id`, or `None` if nothing has been stored yet.
    fn load(&mut self, zone_id: &str) -> Result<Option<CacheEntry>, FloodError>;

    /// Replaces the entry for `entry.zone_id`.
    fn save(&mut self, entry: &CacheEntry) -> Result<(), FloodError>;
}

/// Builds the backend selected in `[cache]`.
pub fn open_cache_store(config: &CacheConfig) -> Result<Box<dyn CacheStore>, FloodError> {
    Ok(match config.backend {
        CacheBackend::File => Box::new(FileCacheStore::new(&config.directory)),
        CacheBackend::Postgres => Box::new(PostgresCacheStore::connect()?),
        CacheBackend::Memory => Box::new(MemoryCacheStore::new()),
    })
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileCacheStore {
    directory: PathBuf,
}

impl FileCacheStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /// File holding `zone_id`'s entry. Key separators become underscores.
    pub fn path_for(&self, zone_id: &str) -> PathBuf {
        let file_name: String = CacheEntry::key_for(zone_id)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.directory.join(format!("{}.json", file_name))
    }
}

fn io_error(path: &Path, e: std::io::Error) -> FloodError {
    FloodError::Cache(format!("{}: {}", path.display(), e))
}

impl CacheStore for FileCacheStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&mut self, zone_id: &str) -> Result<Option<CacheEntry>, FloodError> {
        let path = self.path_for(zone_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        let entry = serde_json::from_str(&contents)
            .map_err(|e| FloodError::Cache(format!("{}: corrupt entry: {}", path.display(), e)))?;
        Ok(Some(entry))
    }

    fn save(&mut self, entry: &CacheEntry) -> Result<(), FloodError> {
        fs::create_dir_all(&self.directory).map_err(|e| io_error(&self.directory, e))?;
        let path = self.path_for(&entry.zone_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(entry)
            .map_err(|e| FloodError::Cache(format!("serialize entry: {}", e)))?;

        fs::write(&tmp, json).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))?;
        debug!(path = %path.display(), "cache entry written");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Memory backend
// ---------------------------------------------------------------------------

/// Clones share the same map, so a "restarted" scheduler in tests can see
/// what the previous instance stored.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&mut self, zone_id: &str) -> Result<Option<CacheEntry>, FloodError> {
        Ok(self.lock().get(&CacheEntry::key_for(zone_id)).cloned())
    }

    fn save(&mut self, entry: &CacheEntry) -> Result<(), FloodError> {
        self.lock()
            .insert(CacheEntry::key_for(&entry.zone_id), entry.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
