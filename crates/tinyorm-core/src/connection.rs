//! The database connection contract.
//!
//! A `Connection` executes SQL text with positional `?` bindings. It knows
//! nothing about builders or models; drivers and test doubles implement it,
//! and the query crate's `DatabaseConnection` wraps it with logging and
//! counters.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// Outcome of an insert statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementResult {
    /// Number of rows written.
    pub rows_affected: u64,
    /// Auto-generated key of the last inserted row, when the driver reports one.
    pub last_insert_id: Option<i64>,
}

/// A synchronous database connection.
///
/// Only [`select`](Connection::select) and
/// [`affecting_statement`](Connection::affecting_statement) are required; the
/// other entry points default to them. Drivers override the defaults when they
/// can report more (last insert ids, a cheaper single-row fetch).
pub trait Connection {
    /// Run a query and return every row.
    fn select(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>>;

    /// Run a statement and return the number of affected rows.
    fn affecting_statement(&self, sql: &str, bindings: &[Value]) -> Result<u64>;

    /// Run a query and return the first row.
    fn select_one(&self, sql: &str, bindings: &[Value]) -> Result<Option<Row>> {
        Ok(self.select(sql, bindings)?.into_iter().next())
    }

    /// Run an insert.
    fn insert(&self, sql: &str, bindings: &[Value]) -> Result<StatementResult> {
        Ok(StatementResult {
            rows_affected: self.affecting_statement(sql, bindings)?,
            last_insert_id: None,
        })
    }

    /// Run an update.
    fn update(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        self.affecting_statement(sql, bindings)
    }

    /// Run a delete.
    fn remove(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        self.affecting_statement(sql, bindings)
    }

    /// Run a statement whose result is only success or failure.
    fn statement(&self, sql: &str, bindings: &[Value]) -> Result<bool> {
        self.affecting_statement(sql, bindings).map(|_| true)
    }

    /// Run raw SQL without preparing it.
    fn unprepared(&self, sql: &str) -> Result<bool> {
        self.statement(sql, &[])
    }

    /// Driver name, for diagnostics.
    fn driver_name(&self) -> &'static str {
        "generic"
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn select(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>> {
        (**self).select(sql, bindings)
    }

    fn affecting_statement(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        (**self).affecting_statement(sql, bindings)
    }

    fn select_one(&self, sql: &str, bindings: &[Value]) -> Result<Option<Row>> {
        (**self).select_one(sql, bindings)
    }

    fn insert(&self, sql: &str, bindings: &[Value]) -> Result<StatementResult> {
        (**self).insert(sql, bindings)
    }

    fn update(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        (**self).update(sql, bindings)
    }

    fn remove(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        (**self).remove(sql, bindings)
    }

    fn statement(&self, sql: &str, bindings: &[Value]) -> Result<bool> {
        (**self).statement(sql, bindings)
    }

    fn unprepared(&self, sql: &str) -> Result<bool> {
        (**self).unprepared(sql)
    }

    fn driver_name(&self) -> &'static str {
        (**self).driver_name()
    }
}
