//! Storage layer for vahanguard.
//!
//! State is kept as a handful of named JSON documents: the `users`,
//! `vehicles` and `emergencyRequests` arrays plus the `currentUser` session
//! record. Every mutation rewrites the whole document; there are no partial
//! updates at this boundary.
//!
//! [`CollectionStore`] is the seam services are built on. [`SqliteStore`] is
//! the durable implementation and [`MemoryStore`] backs tests and throwaway
//! sessions.

pub mod migrations;
pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{EmergencyRequest, RequestStatus};

/// Name of the accounts collection.
pub const USERS: &str = "users";

/// Name of the vehicles collection.
pub const VEHICLES: &str = "vehicles";

/// Name of the emergency requests collection.
pub const EMERGENCY_REQUESTS: &str = "emergencyRequests";

/// Name of the signed-in account record.
pub const CURRENT_USER: &str = "currentUser";

/// A key-value store of whole JSON documents.
pub trait CollectionStore: Send + Sync + std::fmt::Debug {
    /// Read the document stored under `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load(&self, name: &str) -> Result<Option<String>>;

    /// Replace the document stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn save(&self, name: &str, body: &str) -> Result<()>;

    /// Remove the document stored under `name`.
    ///
    /// Returns `true` if a document was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&self, name: &str) -> Result<bool>;
}

/// Load a JSON array collection, treating a missing document as empty.
///
/// # Errors
///
/// Returns an error if the store fails or the document is not a valid array of `T`.
pub fn load_collection<T: DeserializeOwned>(
    store: &dyn CollectionStore,
    name: &str,
) -> Result<Vec<T>> {
    match store.load(name)? {
        Some(body) => Ok(serde_json::from_str(&body)?),
        None => Ok(Vec::new()),
    }
}

/// Serialize and store a whole collection.
///
/// # Errors
///
/// Returns an error if serialization or the store fails.
pub fn save_collection<T: Serialize>(
    store: &dyn CollectionStore,
    name: &str,
    items: &[T],
) -> Result<()> {
    let body = serde_json::to_string(items)?;
    store.save(name, &body)?;
    debug!(collection = name, len = items.len(), "Collection saved");
    Ok(())
}

/// Load a single JSON record.
///
/// # Errors
///
/// Returns an error if the store fails or the document does not decode as `T`.
pub fn load_record<T: DeserializeOwned>(
    store: &dyn CollectionStore,
    name: &str,
) -> Result<Option<T>> {
    store
        .load(name)?
        .map(|body| serde_json::from_str(&body).map_err(Error::from))
        .transpose()
}

/// Serialize and store a single record.
///
/// # Errors
///
/// Returns an error if serialization or the store fails.
pub fn save_record<T: Serialize>(store: &dyn CollectionStore, name: &str, record: &T) -> Result<()> {
    let body = serde_json::to_string(record)?;
    store.save(name, &body)
}

/// Summary of what a store currently holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of registered accounts.
    pub accounts: usize,
    /// Number of registered vehicles.
    pub vehicles: usize,
    /// Number of emergency requests in any state.
    pub requests: usize,
    /// Number of emergency requests still pending.
    pub pending_requests: usize,
    /// Whether a session record is present.
    pub signed_in: bool,
}

/// Gather statistics across the well-known collections.
///
/// # Errors
///
/// Returns an error if any collection cannot be read or decoded.
pub fn stats(store: &dyn CollectionStore) -> Result<StoreStats> {
    let accounts = load_collection::<serde_json::Value>(store, USERS)?.len();
    let vehicles = load_collection::<serde_json::Value>(store, VEHICLES)?.len();
    let requests: Vec<EmergencyRequest> = load_collection(store, EMERGENCY_REQUESTS)?;
    let pending_requests = requests
        .iter()
        .filter(|r| r.status == RequestStatus::Pending)
        .count();

    Ok(StoreStats {
        accounts,
        vehicles,
        requests: requests.len(),
        pending_requests,
        signed_in: store.load(CURRENT_USER)?.is_some(),
    })
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| Error::internal(format!("{what} lock poisoned")))
}

/// `SQLite`-backed document store.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CollectionStore for SqliteStore {
    fn load(&self, name: &str) -> Result<Option<String>> {
        let conn = lock(&self.conn, "database")?;
        let body = conn
            .query_row(
                "SELECT body FROM collections WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body)
    }

    fn save(&self, name: &str, body: &str) -> Result<()> {
        let conn = lock(&self.conn, "database")?;
        conn.execute(
            r"
            INSERT INTO collections (name, body, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            ",
            params![name, body, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool> {
        let conn = lock(&self.conn, "database")?;
        let affected = conn.execute("DELETE FROM collections WHERE name = ?1", [name])?;
        Ok(affected > 0)
    }
}

/// Process-local document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollectionStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<String>> {
        Ok(lock(&self.documents, "memory store")?.get(name).cloned())
    }

    fn save(&self, name: &str, body: &str) -> Result<()> {
        lock(&self.documents, "memory store")?.insert(name.to_string(), body.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool> {
        Ok(lock(&self.documents, "memory store")?.remove(name).is_some())
    }
}

/// Memory store with switchable faults: the next `load` can stall, the next `save` can fail.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FaultyStore {
    inner: MemoryStore,
    pub(crate) stall_next_load: std::sync::atomic::AtomicBool,
    pub(crate) fail_next_save: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl CollectionStore for FaultyStore {
    fn load(&self, name: &str) -> Result<Option<String>> {
        if self.stall_next_load.swap(false, std::sync::atomic::Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        self.inner.load(name)
    }

    fn save(&self, name: &str, body: &str) -> Result<()> {
        if self.fail_next_save.swap(false, std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::internal("disk full"));
        }
        self.inner.save(name, body)
    }

    fn remove(&self, name: &str) -> Result<bool> {
        self.inner.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, RequestCategory};

    fn sample_account(id: &str) -> Account {
        Account {
            id: id.to_string(),
            name: "Asha".to_string(),
            email: format!("{id}@example.com"),
            secret: "pw".to_string(),
        }
    }

    fn exercise_store(store: &dyn CollectionStore) {
        assert!(store.load("missing").unwrap().is_none());

        store.save("doc", "[1,2,3]").unwrap();
        assert_eq!(store.load("doc").unwrap().as_deref(), Some("[1,2,3]"));

        store.save("doc", "[]").unwrap();
        assert_eq!(store.load("doc").unwrap().as_deref(), Some("[]"));

        assert!(store.remove("doc").unwrap());
        assert!(!store.remove("doc").unwrap());
        assert!(store.load("doc").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_roundtrip() {
        exercise_store(&MemoryStore::new());
    }

    #[test]
    fn test_sqlite_store_roundtrip() {
        exercise_store(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let store = MemoryStore::new();
        let accounts: Vec<Account> = load_collection(&store, USERS).unwrap();
        assert!(accounts.is_empty());
    }

    #[test]
    fn test_collection_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let accounts = vec![sample_account("a"), sample_account("b")];

        save_collection(&store, USERS, &accounts).unwrap();
        let loaded: Vec<Account> = load_collection(&store, USERS).unwrap();
        assert_eq!(loaded, accounts);
    }

    #[test]
    fn test_record_roundtrip() {
        let store = MemoryStore::new();
        assert!(load_record::<Account>(&store, CURRENT_USER)
            .unwrap()
            .is_none());

        let account = sample_account("a");
        save_record(&store, CURRENT_USER, &account).unwrap();
        assert_eq!(
            load_record::<Account>(&store, CURRENT_USER).unwrap(),
            Some(account)
        );
    }

    #[test]
    fn test_corrupt_collection_is_an_error() {
        let store = MemoryStore::new();
        store.save(USERS, "{not json").unwrap();

        let result: Result<Vec<Account>> = load_collection(&store, USERS);
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_stats() {
        let store = MemoryStore::new();
        assert_eq!(stats(&store).unwrap(), StoreStats::default());

        save_collection(&store, USERS, &[sample_account("a")]).unwrap();
        let requests = vec![
            EmergencyRequest {
                id: "r1".to_string(),
                vehicle_id: "v1".to_string(),
                request_type: RequestCategory::Parking,
                image_url: "data:x".to_string(),
                timestamp: Utc::now(),
                status: RequestStatus::Pending,
                description: String::new(),
            },
            EmergencyRequest {
                id: "r2".to_string(),
                vehicle_id: "v1".to_string(),
                request_type: RequestCategory::Other,
                image_url: "data:y".to_string(),
                timestamp: Utc::now(),
                status: RequestStatus::Approved,
                description: String::new(),
            },
        ];
        save_collection(&store, EMERGENCY_REQUESTS, &requests).unwrap();
        save_record(&store, CURRENT_USER, &sample_account("a")).unwrap();

        let stats = stats(&store).unwrap();
        assert_eq!(stats.accounts, 1);
        assert_eq!(stats.vehicles, 0);
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.pending_requests, 1);
        assert!(stats.signed_in);
    }

    #[test]
    fn test_open_file_based() {
        let db_path =
            std::env::temp_dir().join(format!("vahanguard_test_{}.db", std::process::id()));

        {
            let store = SqliteStore::open(&db_path).unwrap();
            assert_eq!(store.path(), db_path);
            store.save(VEHICLES, "[]").unwrap();
        }

        // Documents survive a reopen
        let store = SqliteStore::open(&db_path).unwrap();
        assert_eq!(store.load(VEHICLES).unwrap().as_deref(), Some("[]"));

        drop(store);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let nested_path = std::env::temp_dir().join(format!(
            "vahanguard_test_{}/nested/db.sqlite",
            std::process::id()
        ));

        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let store = SqliteStore::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(store);
        if let Some(root) = nested_path.parent().and_then(Path::parent) {
            let _ = std::fs::remove_dir_all(root);
        }
    }
}
