use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::backend::{Backend, BackendHandle, ConnectOptions, TransactionOp};
use crate::cache::QueryCache;
use crate::error::{DbRsError, ErrorRecord, Result};
use crate::limit::is_row_producing;
use crate::profile::{ProfileEvent, ProfileMode, Profiler};
use crate::registry::{OpenQueryRegistry, ResultId};
use crate::types::{Row, RowSet};

/// Where a result's rows come from at fetch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    /// A cursor still open at the backend.
    Live,
    /// A snapshot held by the cache collaborator.
    Cached,
}

/// A handle to an executed query, live or cache-backed. Cheap to copy; the
/// rows live in the registry or the cache, keyed by the normalized id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryResult {
    pub id: ResultId,
    pub source: ResultSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Disconnected,
    Connected,
    Closed,
}

const SERVER_INFO_KEY: &str = "dbrs:server_info";

/// One connection to one backend, and the state machine around it.
///
/// A `Driver` assumes synchronous, one-statement-at-a-time usage; it holds
/// no internal locks, which the `&mut self` receivers encode. Workers that
/// need concurrency each own a private `Driver`.
///
/// Query-path operations follow the sentinel convention: failures come back
/// as `None`, with detail retrievable through [`Driver::report_error`].
/// Connecting is the exception and fails with a typed error.
pub struct Driver {
    backend: Arc<dyn Backend>,
    cache: Option<Arc<dyn QueryCache>>,
    profiler: Option<Arc<dyn Profiler>>,
    mode: ProfileMode,
    state: ConnState,
    address: Option<String>,
    database: Option<String>,
    user: Option<String>,
    connect_error: Option<ErrorRecord>,
    registry: OpenQueryRegistry,
    last_result: Option<QueryResult>,
    query_time: Duration,
}

impl Driver {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            cache: None,
            profiler: None,
            mode: ProfileMode::Off,
            state: ConnState::Disconnected,
            address: None,
            database: None,
            user: None,
            connect_error: None,
            registry: OpenQueryRegistry::new(),
            last_result: None,
            query_time: Duration::ZERO,
        }
    }

    /// Attach a cache collaborator. Without one, every query runs live and
    /// ttl arguments are ignored.
    pub fn with_cache(mut self, cache: Arc<dyn QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attach a profiler in the given mode.
    pub fn with_profiler(mut self, profiler: Arc<dyn Profiler>, mode: ProfileMode) -> Self {
        self.profiler = Some(profiler);
        self.mode = mode;
        self
    }

    /// Establishes the connection. The capability check happens before any
    /// use of the backend; a missing capability is a connectivity error
    /// naming it. Connect-time failure detail is kept as the fallback for
    /// [`Driver::report_error`] on a never-connected instance.
    pub async fn connect(&mut self, options: &ConnectOptions) -> Result<()> {
        if !self.backend.available() {
            let err = DbRsError::CapabilityMissing(self.backend.capability());
            self.connect_error = Some(ErrorRecord::new(err.to_string(), ""));
            return Err(err);
        }
        let address = options.address(self.backend.port_delimiter());
        match self.backend.connect(options).await {
            Ok(()) => {
                self.state = ConnState::Connected;
                self.address = Some(address.clone());
                self.database = Some(options.database.clone());
                self.user = Some(options.user.clone());
                debug!(
                    address = %address,
                    database = %options.database,
                    persistent = options.persistent,
                    "connected"
                );
                Ok(())
            }
            Err(e) => {
                self.connect_error = Some(ErrorRecord::new(e.to_string(), ""));
                warn!(address = %address, error = %e, "connect failed");
                Err(e)
            }
        }
    }

    /// Executes a statement, optionally through the cache.
    ///
    /// Empty text returns `None` without side effects. With a cache attached
    /// and a non-zero ttl, the exact text is looked up first and a hit is
    /// served without touching the backend; a miss executes live and the
    /// drained rows are handed to the cache, the live handle released once
    /// stored. Uncached row-producing statements get a registry entry for
    /// later fetch/free; statements without a row set release their handle
    /// immediately.
    pub async fn execute_query(
        &mut self,
        sql: &str,
        cache_ttl: Duration,
    ) -> Option<QueryResult> {
        if sql.is_empty() {
            return None;
        }
        let caching = !cache_ttl.is_zero() && self.cache.is_some();

        if caching {
            let hit = self.cache.as_ref().and_then(|cache| cache.sql_load(sql));
            if let Some(id) = hit {
                debug!(query = sql, "served from cache");
                self.report_cache_hit(sql);
                let result = QueryResult {
                    id,
                    source: ResultSource::Cached,
                };
                self.last_result = Some(result);
                return Some(result);
            }
        }

        self.report(ProfileEvent::Start { query: sql });
        let started = Instant::now();
        let outcome = self.backend.execute(sql).await;
        let elapsed = started.elapsed();
        self.report(ProfileEvent::Stop {
            query: sql,
            elapsed,
        });
        if self.mode == ProfileMode::Timing {
            self.query_time += elapsed;
        }

        let handle = match outcome {
            Ok(handle) => handle,
            Err(e) => {
                // the backend recorded the engine error; this is the single
                // reporting point that ties it to the query text
                warn!(query = sql, error = %e, "query failed");
                return None;
            }
        };

        let result = if caching {
            let rows = self.drain(handle).await;
            let _ = self.backend.free(handle).await;
            let cache = self.cache.as_ref()?;
            let id = cache.sql_save(sql, rows, cache_ttl);
            QueryResult {
                id,
                source: ResultSource::Cached,
            }
        } else if is_row_producing(sql) {
            let id = self.registry.insert(handle);
            QueryResult {
                id,
                source: ResultSource::Live,
            }
        } else {
            // no row set behind this handle; release it now and keep the id
            // only so fetch/free on it fall through as invalid
            let id = ResultId::from_handle(handle);
            let _ = self.backend.free(handle).await;
            QueryResult {
                id,
                source: ResultSource::Live,
            }
        };
        self.last_result = Some(result);
        Some(result)
    }

    /// Executes with a row window: at most `total` rows after skipping
    /// `offset`. `total == 0` means unbounded and leaves the text verbatim;
    /// otherwise the statement is rewritten to request `total + offset` rows
    /// (saturating) and the cursor is seeked forward `offset` rows before
    /// the result is returned.
    pub async fn execute_query_with_limit(
        &mut self,
        sql: &str,
        total: u64,
        offset: u64,
        cache_ttl: Duration,
    ) -> Option<QueryResult> {
        let text = if total > 0 {
            self.backend.rewrite_limit(sql, total.saturating_add(offset))
        } else {
            sql.to_string()
        };
        let result = self.execute_query(&text, cache_ttl).await?;
        for _ in 0..offset {
            if self.fetch_row(Some(result)).await.is_none() {
                // fewer rows than the offset; the cursor is simply exhausted
                break;
            }
        }
        Some(result)
    }

    /// Fetches the next row of `result`, defaulting to the most recent one.
    /// `None` at end-of-data or for a handle that is no longer open.
    pub async fn fetch_row(&mut self, result: Option<QueryResult>) -> Option<Row> {
        let result = result.or(self.last_result)?;
        match result.source {
            ResultSource::Cached => self.cache.as_ref()?.sql_fetch_row(result.id),
            ResultSource::Live => {
                let handle = self.registry.get(result.id)?;
                self.backend.fetch_row(handle).await.ok().flatten()
            }
        }
    }

    /// Rows touched by the most recent data-modifying statement. `None`
    /// unless connected.
    pub async fn affected_rows(&self) -> Option<u64> {
        if self.state != ConnState::Connected {
            return None;
        }
        self.backend.affected_rows().await.ok()
    }

    /// Reads the identity value of the most recent insert via a dedicated
    /// follow-up query. The temporary handle is released on every exit path.
    pub async fn last_inserted_id(&mut self) -> Option<i64> {
        if self.state != ConnState::Connected {
            return None;
        }
        let handle = match self.backend.execute(self.backend.identity_query()).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "identity query failed");
                return None;
            }
        };
        let fetched = self.backend.fetch_row(handle).await;
        let _ = self.backend.free(handle).await;
        fetched.ok().flatten()?.index(0)?.as_i64()
    }

    /// Idempotent cleanup of a result, defaulting to the most recent one.
    /// Cache-backed results are released at the cache; live ones leave the
    /// registry and their handle is released at the backend. Ids that are
    /// open nowhere are a no-op.
    pub async fn free_result(&mut self, result: Option<QueryResult>) {
        let Some(result) = result.or(self.last_result) else {
            return;
        };
        match result.source {
            ResultSource::Cached => {
                if let Some(cache) = &self.cache {
                    cache.sql_free_result(result.id);
                }
            }
            ResultSource::Live => {
                if let Some(handle) = self.registry.remove(result.id) {
                    if let Err(e) = self.backend.free(handle).await {
                        warn!(error = %e, "failed to release result handle");
                    }
                }
            }
        }
    }

    pub async fn begin_transaction(&mut self) -> bool {
        self.transaction(TransactionOp::Begin).await
    }

    pub async fn commit(&mut self) -> bool {
        self.transaction(TransactionOp::Commit).await
    }

    pub async fn rollback(&mut self) -> bool {
        self.transaction(TransactionOp::Rollback).await
    }

    async fn transaction(&mut self, op: TransactionOp) -> bool {
        if self.state != ConnState::Connected {
            return false;
        }
        let sql = self.backend.transaction_statement(op);
        match self.backend.execute(sql).await {
            Ok(handle) => {
                let _ = self.backend.free(handle).await;
                true
            }
            Err(e) => {
                warn!(statement = sql, error = %e, "transaction statement failed");
                false
            }
        }
    }

    /// Releases the connection unconditionally. Still-open handles are freed
    /// best effort; always reports success.
    pub async fn close(&mut self) -> bool {
        for handle in self.registry.drain() {
            let _ = self.backend.free(handle).await;
        }
        self.backend.close().await;
        self.state = ConnState::Closed;
        self.last_result = None;
        debug!("connection closed");
        true
    }

    /// Human-readable or raw engine version. Version fields are trimmed and
    /// joined with single spaces; an engine that reports nothing yields an
    /// empty string. With a cache attached and `use_cache`, the joined form
    /// is memoized under a fixed key and reused until someone else drops it;
    /// the driver never expires it.
    pub async fn server_info(&mut self, raw: bool, use_cache: bool) -> String {
        if use_cache {
            if let Some(joined) = self.cache.as_ref().and_then(|c| c.get(SERVER_INFO_KEY)) {
                return present_version(&joined, raw);
            }
        }
        let fields = self.backend.server_version().await.unwrap_or_default();
        let joined = fields
            .iter()
            .map(|field| field.trim())
            .filter(|field| !field.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if use_cache && !joined.is_empty() {
            if let Some(cache) = &self.cache {
                cache.put(SERVER_INFO_KEY, &joined);
            }
        }
        present_version(&joined, raw)
    }

    /// Last engine-reported error; a never-connected instance falls back to
    /// the failure captured at connect time.
    pub fn report_error(&self) -> ErrorRecord {
        self.backend
            .last_error()
            .or_else(|| self.connect_error.clone())
            .unwrap_or_default()
    }

    /// Accumulated execution time, populated in timing mode.
    pub fn total_query_time(&self) -> Duration {
        self.query_time
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnState::Connected
    }

    /// Number of live results currently open in the registry.
    pub fn open_results(&self) -> usize {
        self.registry.len()
    }

    pub fn last_result(&self) -> Option<QueryResult> {
        self.last_result
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn report(&self, event: ProfileEvent<'_>) {
        if self.mode == ProfileMode::Off {
            return;
        }
        if let Some(profiler) = &self.profiler {
            profiler.report(event);
        }
    }

    fn report_cache_hit(&self, sql: &str) {
        match self.mode {
            ProfileMode::Off => {}
            ProfileMode::Explain => self.report(ProfileEvent::FromCache { query: sql }),
            ProfileMode::Timing => self.report(ProfileEvent::RecordFromCache { query: sql }),
        }
    }

    /// Materializes every remaining row of a live handle.
    async fn drain(&self, handle: BackendHandle) -> RowSet {
        let mut columns = Vec::new();
        let mut rows = Vec::new();
        while let Ok(Some(row)) = self.backend.fetch_row(handle).await {
            if columns.is_empty() {
                columns = row.columns().to_vec();
            }
            rows.push(row.values().to_vec());
        }
        RowSet::new(columns, rows)
    }
}

fn present_version(joined: &str, raw: bool) -> String {
    if raw {
        return joined.to_string();
    }
    // short form: the first field carrying a digit, e.g. "16.2" out of
    // "PostgreSQL 16.2 on x86_64"
    joined
        .split_whitespace()
        .find(|field| field.chars().any(|c| c.is_ascii_digit()))
        .unwrap_or(joined)
        .to_string()
}
