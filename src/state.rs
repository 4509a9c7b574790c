use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("Database creation error: {0}")]
    RedbCreate(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

fn deadline_after(ttl: Duration) -> u64 {
    now_millis().saturating_add(ttl.as_millis() as u64)
}

// ============================================================================
// KEY LAYOUT
// ============================================================================

/// Key names shared by the rotator, the pagination cursor and the result store.
pub mod keys {
    pub const LAST_REGION_INDEX: &str = "last_region_index";

    pub fn progress(region: &str) -> String {
        format!("progress_{}", region)
    }

    pub fn results_prefix(region: &str) -> String {
        format!("results_{}_", region)
    }

    pub fn results(region: &str, epoch_millis: u64) -> String {
        format!("results_{}_{}", region, epoch_millis)
    }

    pub fn latest(region: &str) -> String {
        format!("latest_{}", region)
    }

    pub fn error(region: &str, epoch_millis: u64) -> String {
        format!("error_{}_{}", region, epoch_millis)
    }

    /// True when `key` is `prefix` followed only by an epoch-millis suffix.
    /// Guards against one region label being a prefix of another.
    pub fn has_timestamp_suffix(key: &str, prefix: &str) -> bool {
        key.strip_prefix(prefix)
            .map(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or(false)
    }
}

// ============================================================================
// STORE ABSTRACTION
// ============================================================================

/// String key-value store with optional per-key expiry.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StateError>;

    /// Write `value`; `ttl = None` keeps it until overwritten or deleted.
    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StateError>;

    fn delete(&self, key: &str) -> Result<(), StateError>;

    /// Live keys starting with `prefix`, ascending.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StateError>;

    /// Drop expired entries. Returns how many were removed.
    fn purge_expired(&self) -> Result<usize, StateError>;
}

pub fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>, StateError> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn put_json<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), StateError> {
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw, ttl)
}

// ============================================================================
// REDB BACKEND
// ============================================================================

/// Durable store backed by a single redb file.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    // Values and expiry deadlines live in separate tables so counters stay plain strings.
    const VALUES: TableDefinition<'static, &'static str, &'static str> = TableDefinition::new("values");
    const EXPIRY: TableDefinition<'static, &'static str, u64> = TableDefinition::new("expiry");

    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self, StateError> {
        let data_path = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_path)?;

        let db = Database::create(data_path.join("warmer_state.redb"))?;

        // Open each table once so read transactions never hit a missing table.
        let write_txn = db.begin_write()?;
        {
            let _values = write_txn.open_table(Self::VALUES)?;
            let _expiry = write_txn.open_table(Self::EXPIRY)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let read_txn = self.db.begin_read()?;
        let expiry = read_txn.open_table(Self::EXPIRY)?;
        if let Some(deadline) = expiry.get(key)? {
            if deadline.value() <= now_millis() {
                return Ok(None);
            }
        }

        let values = read_txn.open_table(Self::VALUES)?;
        let value = values.get(key)?.map(|v| v.value().to_string());
        Ok(value)
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StateError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut values = write_txn.open_table(Self::VALUES)?;
            values.insert(key, value)?;

            let mut expiry = write_txn.open_table(Self::EXPIRY)?;
            match ttl {
                Some(ttl) => {
                    expiry.insert(key, deadline_after(ttl))?;
                }
                None => {
                    expiry.remove(key)?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StateError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut values = write_txn.open_table(Self::VALUES)?;
            values.remove(key)?;
            let mut expiry = write_txn.open_table(Self::EXPIRY)?;
            expiry.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StateError> {
        let now = now_millis();
        let read_txn = self.db.begin_read()?;
        let values = read_txn.open_table(Self::VALUES)?;
        let expiry = read_txn.open_table(Self::EXPIRY)?;

        let mut keys = Vec::new();
        for entry in values.range::<&str>(prefix..)? {
            let (key, _value) = entry?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            let expired = expiry
                .get(key)?
                .map(|deadline| deadline.value() <= now)
                .unwrap_or(false);
            if !expired {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }

    fn purge_expired(&self) -> Result<usize, StateError> {
        let now = now_millis();
        let write_txn = self.db.begin_write()?;
        let removed;
        {
            let mut expiry = write_txn.open_table(Self::EXPIRY)?;
            let mut stale = Vec::new();
            for entry in expiry.iter()? {
                let (key, deadline) = entry?;
                if deadline.value() <= now {
                    stale.push(key.value().to_string());
                }
            }

            let mut values = write_txn.open_table(Self::VALUES)?;
            for key in &stale {
                values.remove(key.as_str())?;
                expiry.remove(key.as_str())?;
            }
            removed = stale.len();
        }
        write_txn.commit()?;
        Ok(removed)
    }
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<u64>,
}

impl MemoryEntry {
    fn is_live(&self, now: u64) -> bool {
        self.expires_at.map(|deadline| deadline > now).unwrap_or(true)
    }
}

/// Process-local store; state is lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let now = now_millis();
        Ok(self
            .entries
            .read()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StateError> {
        self.entries.write().insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: ttl.map(deadline_after),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StateError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StateError> {
        let now = now_millis();
        Ok(self
            .entries
            .read()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn purge_expired(&self) -> Result<usize, StateError> {
        let now = now_millis();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise_store(store: &dyn KvStore) {
        store.put("progress_Oceania", "40", None).unwrap();
        assert_eq!(store.get("progress_Oceania").unwrap().as_deref(), Some("40"));

        store.put("progress_Oceania", "80", None).unwrap();
        assert_eq!(store.get("progress_Oceania").unwrap().as_deref(), Some("80"));

        store.put("results_Oceania_1000", "{}", Some(Duration::from_secs(60))).unwrap();
        store.put("results_Oceania_2000", "{}", Some(Duration::from_secs(60))).unwrap();
        store.put("results_Other_1000", "{}", None).unwrap();
        assert_eq!(
            store.list_keys("results_Oceania_").unwrap(),
            vec!["results_Oceania_1000", "results_Oceania_2000"]
        );

        store.delete("progress_Oceania").unwrap();
        assert!(store.get("progress_Oceania").unwrap().is_none());
        assert!(store.get("missing").unwrap().is_none());
    }

    fn exercise_expiry(store: &dyn KvStore) {
        store.put("error_Africa_1", "{}", Some(Duration::ZERO)).unwrap();
        store.put("error_Africa_2", "{}", Some(Duration::from_secs(3600))).unwrap();

        assert!(store.get("error_Africa_1").unwrap().is_none());
        assert_eq!(store.list_keys("error_Africa_").unwrap(), vec!["error_Africa_2"]);
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.purge_expired().unwrap(), 0);

        // Rewriting without a TTL clears the old deadline.
        store.put("error_Africa_1", "{}", Some(Duration::ZERO)).unwrap();
        store.put("error_Africa_1", "kept", None).unwrap();
        assert_eq!(store.get("error_Africa_1").unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        exercise_store(&store);
        exercise_expiry(&MemoryStore::new());
    }

    #[test]
    fn test_redb_store() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::new(dir.path()).unwrap();
        exercise_store(&store);
        exercise_expiry(&store);
    }

    #[test]
    fn test_redb_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = RedbStore::new(dir.path()).unwrap();
            store.put(keys::LAST_REGION_INDEX, "3", None).unwrap();
        }
        let store = RedbStore::new(dir.path()).unwrap();
        assert_eq!(store.get(keys::LAST_REGION_INDEX).unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        put_json(&store, "latest_Africa", &vec![1u32, 2, 3], None).unwrap();
        let back: Option<Vec<u32>> = get_json(&store, "latest_Africa").unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));

        store.put("latest_Broken", "not json", None).unwrap();
        let broken: Result<Option<Vec<u32>>, _> = get_json(&store, "latest_Broken");
        assert!(matches!(broken, Err(StateError::Serialization(_))));
    }

    #[test]
    fn test_timestamp_suffix_guard() {
        let prefix = keys::results_prefix("Europe");
        assert!(keys::has_timestamp_suffix("results_Europe_1700000000000", &prefix));
        assert!(!keys::has_timestamp_suffix("results_Europe_West_1700000000000", &prefix));
        assert!(!keys::has_timestamp_suffix("results_Europe_", &prefix));
    }
}
