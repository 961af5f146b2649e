use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage};
use tracing::warn;

use crate::backend::{Backend, BackendHandle, ConnectOptions, TransactionOp};
use crate::error::{DbRsError, ErrorRecord, Result};
use crate::limit;
use crate::types::{Row, RowSet, SqlValue};

struct Cursor {
    rows: RowSet,
    position: usize,
}

/// PostgreSQL capability implementation over tokio-postgres.
///
/// Statements run through the simple-query protocol, so values arrive in
/// text form and the affected-row count comes with each command completion.
/// Result sets are materialized per handle and cursored locally.
pub struct PostgresBackend {
    client: tokio::sync::Mutex<Option<Client>>,
    cursors: Mutex<HashMap<u64, Cursor>>,
    next_handle: AtomicU64,
    last_error: Mutex<Option<ErrorRecord>>,
    affected: Mutex<u64>,
}

impl PostgresBackend {
    pub fn new() -> Self {
        Self {
            client: tokio::sync::Mutex::new(None),
            cursors: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            last_error: Mutex::new(None),
            affected: Mutex::new(0),
        }
    }

    fn record_error(&self, e: &tokio_postgres::Error) {
        let code = e
            .code()
            .map(|state| state.code().to_string())
            .unwrap_or_default();
        *self.last_error.lock().unwrap() = Some(ErrorRecord::new(e.to_string(), code));
    }
}

impl Default for PostgresBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn capability(&self) -> &'static str {
        "tokio-postgres client"
    }

    async fn connect(&self, options: &ConnectOptions) -> Result<()> {
        let mut config = Config::new();
        config
            .host(&options.host)
            .user(&options.user)
            .password(&options.password)
            .dbname(&options.database)
            // persistent mode maps to TCP keepalives on this engine
            .keepalives(options.persistent);
        if let Some(port) = options.port {
            config.port(port);
        }

        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| DbRsError::ConnectionFailed(e.to_string()))?;

        // Drive the connection until it ends
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection error");
            }
        });

        *self.client.lock().await = Some(client);
        Ok(())
    }

    async fn execute(&self, sql: &str) -> Result<BackendHandle> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(DbRsError::NotConnected)?;

        let messages = client.simple_query(sql).await.map_err(|e| {
            self.record_error(&e);
            DbRsError::QueryFailed(e.to_string())
        })?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<SqlValue>> = Vec::new();
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(description) => {
                    columns = description.iter().map(|c| c.name().to_string()).collect();
                }
                SimpleQueryMessage::Row(row) => {
                    rows.push(
                        (0..row.len())
                            .map(|i| match row.get(i) {
                                Some(text) => SqlValue::Text(text.to_string()),
                                None => SqlValue::Null,
                            })
                            .collect(),
                    );
                }
                SimpleQueryMessage::CommandComplete(count) => {
                    *self.affected.lock().unwrap() = count;
                }
                _ => {}
            }
        }

        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.cursors.lock().unwrap().insert(
            id,
            Cursor {
                rows: RowSet::new(columns, rows),
                position: 0,
            },
        );
        Ok(BackendHandle::new(id))
    }

    async fn fetch_row(&self, handle: BackendHandle) -> Result<Option<Row>> {
        let mut cursors = self.cursors.lock().unwrap();
        let cursor = cursors
            .get_mut(&handle.id())
            .ok_or_else(|| DbRsError::QueryFailed("unknown result handle".to_string()))?;
        let row = cursor.rows.row(cursor.position);
        if row.is_some() {
            cursor.position += 1;
        }
        Ok(row)
    }

    async fn affected_rows(&self) -> Result<u64> {
        Ok(*self.affected.lock().unwrap())
    }

    async fn free(&self, handle: BackendHandle) -> Result<()> {
        self.cursors
            .lock()
            .unwrap()
            .remove(&handle.id())
            .map(|_| ())
            .ok_or_else(|| DbRsError::QueryFailed("unknown result handle".to_string()))
    }

    async fn server_version(&self) -> Result<Vec<String>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(DbRsError::NotConnected)?;
        let messages = client
            .simple_query("SHOW server_version")
            .await
            .map_err(|e| {
                self.record_error(&e);
                DbRsError::QueryFailed(e.to_string())
            })?;

        let mut fields = Vec::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                for i in 0..row.len() {
                    if let Some(text) = row.get(i) {
                        fields.push(text.to_string());
                    }
                }
            }
        }
        Ok(fields)
    }

    fn identity_query(&self) -> &'static str {
        "SELECT LASTVAL()"
    }

    fn transaction_statement(&self, op: TransactionOp) -> &'static str {
        match op {
            TransactionOp::Begin => "BEGIN",
            TransactionOp::Commit => "COMMIT",
            TransactionOp::Rollback => "ROLLBACK",
        }
    }

    fn rewrite_limit(&self, sql: &str, n: u64) -> String {
        limit::append_row_limit(sql, n)
    }

    fn last_error(&self) -> Option<ErrorRecord> {
        self.last_error.lock().unwrap().clone()
    }

    async fn close(&self) {
        self.client.lock().await.take();
        self.cursors.lock().unwrap().clear();
    }
}
