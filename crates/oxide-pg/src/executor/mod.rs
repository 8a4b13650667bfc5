//! Statement execution.
//!
//! [`SqlConnection`] is the capability set of a live connection.
//! [`Connection`] wraps one with a [`PgDialect`](crate::PgDialect) and runs
//! reconciliation, commands and queries through it; [`Cursor`] coerces the
//! scanned rows. [`PgClient`] is the sqlx implementation.

mod connection;
mod cursor;
mod postgres;

pub use connection::Connection;
pub use cursor::Cursor;
pub use postgres::PgClient;

use std::future::Future;

use crate::coder::RawValue;
use crate::error::Result;

/// A live connection that may be inside a transaction.
///
/// Statements run inside the open transaction when there is one and
/// directly otherwise. Implementations may write the methods as plain
/// `async fn` as long as the futures are `Send`.
pub trait SqlConnection: Send {
    /// Runs a query and returns every row.
    fn query_rows(&mut self, sql: &str) -> impl Future<Output = Result<RowSet>> + Send;

    /// Runs a statement and returns the number of affected rows.
    fn exec(&mut self, sql: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Opens a transaction.
    fn begin(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Commits the open transaction.
    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Rolls back the open transaction.
    fn rollback(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Whether a transaction is open.
    fn in_transaction(&self) -> bool;
}

/// Name and declared type of a result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared type, such as `INT8` or `numeric`.
    pub type_name: String,
}

impl ColumnInfo {
    /// Creates a column description.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Scanned result of a query, before coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Result columns.
    pub columns: Vec<ColumnInfo>,
    /// Rows, each with one value per column.
    pub rows: Vec<Vec<RawValue>>,
}
