use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{Backend, BackendHandle, ConnectOptions};
use crate::error::{DbRsError, ErrorRecord, Result};
use crate::types::{Row, RowSet, SqlValue};

/// Scripted outcome for one `execute` call.
enum Scripted {
    Rows(RowSet),
    Failure(ErrorRecord),
}

struct Cursor {
    rows: RowSet,
    position: usize,
}

struct State {
    connected: bool,
    next_handle: u64,
    cursors: HashMap<u64, Cursor>,
    freed: Vec<u64>,
    recorded: Vec<String>,
    recorded_address: Option<String>,
    last_error: Option<ErrorRecord>,
}

/// An in-memory backend for testing the driver contract.
///
/// Responses are queued in FIFO order and one is consumed per execute;
/// failures can be scripted the same way. Executed statements are recorded
/// for assertion, and handle lifecycle is tracked so tests can verify that
/// cursors are released exactly once.
///
/// # Example
/// ```
/// use dbrs::backends::{InMemoryBackend, ResponseBuilder};
///
/// let backend = InMemoryBackend::new().with_response(
///     ResponseBuilder::new()
///         .columns(&["id", "name"])
///         .row(&["1", "Alice"])
///         .build(),
/// );
/// ```
pub struct InMemoryBackend {
    responses: Mutex<VecDeque<Scripted>>,
    state: Mutex<State>,
    available: bool,
    delimiter: char,
    connect_error: Option<String>,
    version_fields: Vec<String>,
    affected: u64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            state: Mutex::new(State {
                connected: false,
                next_handle: 1,
                cursors: HashMap::new(),
                freed: Vec::new(),
                recorded: Vec::new(),
                recorded_address: None,
                last_error: None,
            }),
            available: true,
            delimiter: ':',
            connect_error: None,
            version_fields: vec!["Test Engine 1.0".to_string()],
            affected: 0,
        }
    }

    /// Queue a row-set response for the next execute. FIFO order.
    pub fn with_response(self, rows: RowSet) -> Self {
        self.responses.lock().unwrap().push_back(Scripted::Rows(rows));
        self
    }

    /// Queue a failure for the next execute.
    pub fn with_failure(self, message: &str, code: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::Failure(ErrorRecord::new(message, code)));
        self
    }

    /// Simulate a missing client capability.
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Engine-specific host/port separator to hand the driver.
    pub fn with_port_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Make the next connect fail with this message.
    pub fn with_connect_error(mut self, message: &str) -> Self {
        self.connect_error = Some(message.to_string());
        self
    }

    /// Version fields reported by `server_version`.
    pub fn with_server_version(mut self, fields: &[&str]) -> Self {
        self.version_fields = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Affected-row count reported after data-modifying statements.
    pub fn with_affected_rows(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    /// All statements executed so far, in order.
    pub fn recorded_queries(&self) -> Vec<String> {
        self.state.lock().unwrap().recorded.clone()
    }

    /// The last executed statement, if any.
    pub fn last_query(&self) -> Option<String> {
        self.state.lock().unwrap().recorded.last().cloned()
    }

    /// Address string the driver handed to connect.
    pub fn recorded_address(&self) -> Option<String> {
        self.state.lock().unwrap().recorded_address.clone()
    }

    /// Handles released so far, in release order.
    pub fn freed_handles(&self) -> Vec<u64> {
        self.state.lock().unwrap().freed.clone()
    }

    /// Handles executed but not yet released.
    pub fn open_handles(&self) -> usize {
        self.state.lock().unwrap().cursors.len()
    }

    /// Assert that the last statement matches `expected_sql` exactly.
    pub fn assert_last_query(&self, expected_sql: &str) {
        let last = self.last_query().expect("no queries were recorded");
        assert_eq!(
            last, expected_sql,
            "SQL mismatch.\nExpected: {}\nActual: {}",
            expected_sql, last
        );
    }

    /// Assert that exactly n statements were executed.
    pub fn assert_query_count(&self, expected: usize) {
        let actual = self.state.lock().unwrap().recorded.len();
        assert_eq!(
            actual, expected,
            "query count mismatch. Expected: {}, Actual: {}",
            expected, actual
        );
    }

    /// Assert that exactly n handles were released.
    pub fn assert_freed_count(&self, expected: usize) {
        let actual = self.state.lock().unwrap().freed.len();
        assert_eq!(
            actual, expected,
            "freed-handle count mismatch. Expected: {}, Actual: {}",
            expected, actual
        );
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    fn capability(&self) -> &'static str {
        "in-memory test client"
    }

    fn available(&self) -> bool {
        self.available
    }

    fn port_delimiter(&self) -> char {
        self.delimiter
    }

    async fn connect(&self, options: &ConnectOptions) -> Result<()> {
        if let Some(message) = &self.connect_error {
            return Err(DbRsError::ConnectionFailed(message.clone()));
        }
        let mut state = self.state.lock().unwrap();
        state.connected = true;
        state.recorded_address = Some(options.address(self.delimiter));
        Ok(())
    }

    async fn execute(&self, sql: &str) -> Result<BackendHandle> {
        let mut state = self.state.lock().unwrap();
        state.recorded.push(sql.to_string());

        let scripted = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::Rows(RowSet::empty()));
        match scripted {
            Scripted::Rows(rows) => {
                let id = state.next_handle;
                state.next_handle += 1;
                state.cursors.insert(id, Cursor { rows, position: 0 });
                Ok(BackendHandle::new(id))
            }
            Scripted::Failure(record) => {
                let message = record.message.clone();
                state.last_error = Some(record);
                Err(DbRsError::QueryFailed(message))
            }
        }
    }

    async fn fetch_row(&self, handle: BackendHandle) -> Result<Option<Row>> {
        let mut state = self.state.lock().unwrap();
        let cursor = state
            .cursors
            .get_mut(&handle.id())
            .ok_or_else(|| DbRsError::QueryFailed("unknown result handle".to_string()))?;
        let row = cursor.rows.row(cursor.position);
        if row.is_some() {
            cursor.position += 1;
        }
        Ok(row)
    }

    async fn affected_rows(&self) -> Result<u64> {
        Ok(self.affected)
    }

    async fn free(&self, handle: BackendHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.cursors.remove(&handle.id()).is_none() {
            return Err(DbRsError::QueryFailed(
                "double free of result handle".to_string(),
            ));
        }
        state.freed.push(handle.id());
        Ok(())
    }

    async fn server_version(&self) -> Result<Vec<String>> {
        Ok(self.version_fields.clone())
    }

    fn identity_query(&self) -> &'static str {
        "SELECT @@IDENTITY"
    }

    fn last_error(&self) -> Option<ErrorRecord> {
        self.state.lock().unwrap().last_error.clone()
    }

    async fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.cursors.clear();
    }
}

/// Builder for scripted row-set responses.
pub struct ResponseBuilder {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Set the column names for the response.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add a row of text values.
    pub fn row(mut self, values: &[&str]) -> Self {
        self.rows
            .push(values.iter().map(|s| SqlValue::from(*s)).collect());
        self
    }

    /// Add a row of typed values.
    pub fn row_values(mut self, values: Vec<SqlValue>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn build(self) -> RowSet {
        RowSet::new(self.columns, self.rows)
    }
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
