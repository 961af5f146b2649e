use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::backend::BackendHandle;

/// Normalized identifier for an open or cached query result.
///
/// Live results derive their id from the backend handle; cached results
/// derive it from the exact query text, so a later lookup of the same text
/// lands on the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultId(u64);

impl ResultId {
    pub fn from_handle(handle: BackendHandle) -> Self {
        Self(handle.id())
    }

    pub fn from_query(sql: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        sql.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Per-connection map of open live results.
///
/// Every key corresponds to a handle that has not been released at the
/// backend; entries are added when a live result is produced and removed
/// exactly once, when the result is freed or the connection closes.
#[derive(Debug, Default)]
pub struct OpenQueryRegistry {
    open: HashMap<ResultId, BackendHandle>,
}

impl OpenQueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live handle under its normalized id.
    pub fn insert(&mut self, handle: BackendHandle) -> ResultId {
        let id = ResultId::from_handle(handle);
        self.open.insert(id, handle);
        id
    }

    pub fn get(&self, id: ResultId) -> Option<BackendHandle> {
        self.open.get(&id).copied()
    }

    /// Removes the entry, handing the handle back for release. `None` means
    /// the id was never registered or was already freed.
    pub fn remove(&mut self, id: ResultId) -> Option<BackendHandle> {
        self.open.remove(&id)
    }

    pub fn contains(&self, id: ResultId) -> bool {
        self.open.contains_key(&id)
    }

    /// Empties the registry, yielding every still-open handle. Used when the
    /// connection closes.
    pub fn drain(&mut self) -> Vec<BackendHandle> {
        self.open.drain().map(|(_, handle)| handle).collect()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
