use async_trait::async_trait;

use crate::error::{ErrorRecord, Result};
use crate::types::Row;

/// Connection parameters handed to [`crate::Driver::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: Option<u16>,
    pub persistent: bool,
}

impl ConnectOptions {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            port: None,
            persistent: false,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Engine address string. The host/port separator is an engine quirk,
    /// so the backend supplies it via [`Backend::port_delimiter`].
    pub fn address(&self, delimiter: char) -> String {
        match self.port {
            Some(port) => format!("{}{}{}", self.host, delimiter, port),
            None => self.host.clone(),
        }
    }
}

/// Opaque reference to a live backend cursor. Identity only; all state lives
/// behind the backend that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendHandle(u64);

impl BackendHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// The three recognized transaction transitions. Using an enum here means an
/// unrecognized status value is unrepresentable at this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOp {
    Begin,
    Commit,
    Rollback,
}

/// Trait for the raw client capability a driver is built over.
///
/// Backends are responsible for:
/// - Establishing and tearing down the underlying session
/// - Executing statements and exposing cursors as [`BackendHandle`]s
/// - Converting native values into [`crate::SqlValue`] rows
/// - Reporting engine errors as [`ErrorRecord`]s
///
/// All fallible operations return an explicit `Result`; the driver owns the
/// policy of turning failures into sentinel returns plus a retrievable error
/// report.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name of the underlying client capability. Quoted in the connectivity
    /// error when the capability is absent.
    fn capability(&self) -> &'static str;

    /// Whether the capability is usable in this environment. The driver
    /// checks this before any other call.
    fn available(&self) -> bool {
        true
    }

    /// Separator between host and port in the engine's address syntax.
    fn port_delimiter(&self) -> char {
        ':'
    }

    async fn connect(&self, options: &ConnectOptions) -> Result<()>;

    /// Executes `sql`, returning a handle to the live cursor.
    async fn execute(&self, sql: &str) -> Result<BackendHandle>;

    /// Advances the cursor one row. `Ok(None)` at end-of-data.
    async fn fetch_row(&self, handle: BackendHandle) -> Result<Option<Row>>;

    /// Rows touched by the most recent data-modifying statement.
    async fn affected_rows(&self) -> Result<u64>;

    /// Releases a live cursor. The driver's registry guarantees it never
    /// releases the same handle twice.
    async fn free(&self, handle: BackendHandle) -> Result<()>;

    /// Engine version metadata, one string per reported field.
    async fn server_version(&self) -> Result<Vec<String>>;

    /// Statement reading the identity value of the most recent insert within
    /// this session's scope.
    fn identity_query(&self) -> &'static str;

    /// Statement text for a transaction transition.
    fn transaction_statement(&self, op: TransactionOp) -> &'static str {
        match op {
            TransactionOp::Begin => "BEGIN TRANSACTION",
            TransactionOp::Commit => "COMMIT TRANSACTION",
            TransactionOp::Rollback => "ROLLBACK TRANSACTION",
        }
    }

    /// Engine-native rewrite requesting at most `n` rows. The default is the
    /// `TOP n` insertion; engines with a trailing limit clause override.
    fn rewrite_limit(&self, sql: &str, n: u64) -> String {
        crate::limit::insert_row_cap(sql, n)
    }

    /// Most recent engine-reported error, if any.
    fn last_error(&self) -> Option<ErrorRecord>;

    /// Tears the session down. Best effort; never fails.
    async fn close(&self);
}
