//! dbrs - a driver-interface core for SQL backends
//!
//! One [`Driver`] wraps one backend capability and runs the query-result
//! lifecycle around it: optional caching of row sets, open-handle tracking,
//! row-limit rewriting and idempotent cleanup. Backends implement the
//! [`Backend`] trait; everything engine-specific (limit construct, identity
//! query, host/port delimiter) lives behind it.
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use dbrs::{ConnectOptions, Driver};
//! use dbrs::backends::PostgresBackend;
//!
//! let mut driver = Driver::new(Arc::new(PostgresBackend::new()));
//! driver
//!     .connect(&ConnectOptions::new("localhost", "app", "secret", "mydb").port(5432))
//!     .await?;
//!
//! // first 20 rows after skipping 40, no caching
//! let result = driver
//!     .execute_query_with_limit("SELECT id, name FROM users", 20, 40, Duration::ZERO)
//!     .await;
//! while let Some(row) = driver.fetch_row(result).await {
//!     println!("{:?}", row.get("name"));
//! }
//! driver.free_result(result).await;
//! ```

pub mod backend;
pub mod backends;
pub mod cache;
pub mod error;
pub mod limit;
pub mod profile;
pub mod registry;
pub mod types;

mod driver;

// Re-export main types for convenient access
pub use backend::{Backend, BackendHandle, ConnectOptions, TransactionOp};
pub use cache::{MemoryCache, QueryCache};
pub use driver::{Driver, QueryResult, ResultSource};
pub use error::{DbRsError, ErrorRecord, Result};
pub use profile::{ProfileEvent, ProfileMode, Profiler};
pub use registry::{OpenQueryRegistry, ResultId};
pub use types::{Row, RowSet, SqlValue};
