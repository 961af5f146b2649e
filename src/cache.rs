use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::registry::ResultId;
use crate::types::{Row, RowSet};

/// Optional cache collaborator for query results and small key/value slots.
///
/// The driver never assumes a cache is present and never expires entries
/// itself; storage and eviction policy belong to the implementation. Result
/// entries are stored under the exact query text and retrieved by the
/// normalized [`ResultId`] derived from it. A cached result iterates in the
/// engine's original column order with the engine's value types.
pub trait QueryCache: Send + Sync {
    /// Generic key/value slot read, used for memoized metadata such as the
    /// server version string.
    fn get(&self, key: &str) -> Option<String>;

    /// Generic key/value slot write.
    fn put(&self, key: &str, value: &str);

    /// Looks up a stored result by exact query text. A hit yields the id
    /// under which the rows can be iterated, with its cursor rewound.
    fn sql_load(&self, query: &str) -> Option<ResultId>;

    /// Stores a drained result set under the query text with a ttl, and
    /// returns the retrieval id.
    fn sql_save(&self, query: &str, rows: RowSet, ttl: Duration) -> ResultId;

    fn sql_exists(&self, id: ResultId) -> bool;

    /// Next row of a cached result. `None` at end-of-data or unknown id.
    fn sql_fetch_row(&self, id: ResultId) -> Option<Row>;

    /// Releases a cached result. Returns whether an entry was dropped;
    /// unknown ids are a no-op.
    fn sql_free_result(&self, id: ResultId) -> bool;
}

struct CachedResult {
    rows: RowSet,
    cursor: usize,
    expires_at: Instant,
}

impl CachedResult {
    fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process [`QueryCache`] with per-entry time-to-live.
///
/// Suitable for tests and single-process deployments; anything shared goes
/// behind the same trait.
#[derive(Default)]
pub struct MemoryCache {
    slots: Mutex<HashMap<String, String>>,
    results: Mutex<HashMap<ResultId, CachedResult>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueryCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.slots.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) {
        self.slots
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn sql_load(&self, query: &str) -> Option<ResultId> {
        let id = ResultId::from_query(query);
        let mut results = self.results.lock().unwrap();
        match results.get_mut(&id) {
            Some(entry) if entry.expired() => {
                results.remove(&id);
                None
            }
            Some(entry) => {
                // each load restarts iteration from the first row
                entry.cursor = 0;
                Some(id)
            }
            None => None,
        }
    }

    fn sql_save(&self, query: &str, rows: RowSet, ttl: Duration) -> ResultId {
        let id = ResultId::from_query(query);
        self.results.lock().unwrap().insert(
            id,
            CachedResult {
                rows,
                cursor: 0,
                expires_at: Instant::now() + ttl,
            },
        );
        id
    }

    fn sql_exists(&self, id: ResultId) -> bool {
        let results = self.results.lock().unwrap();
        results.get(&id).is_some_and(|entry| !entry.expired())
    }

    fn sql_fetch_row(&self, id: ResultId) -> Option<Row> {
        let mut results = self.results.lock().unwrap();
        let entry = results.get_mut(&id)?;
        if entry.expired() {
            results.remove(&id);
            return None;
        }
        let row = entry.rows.row(entry.cursor);
        if row.is_some() {
            entry.cursor += 1;
        }
        row
    }

    fn sql_free_result(&self, id: ResultId) -> bool {
        self.results.lock().unwrap().remove(&id).is_some()
    }
}
