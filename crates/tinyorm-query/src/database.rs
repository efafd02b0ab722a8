//! Database connection wrapper.
//!
//! [`DatabaseConnection`] owns a driver [`Connection`] and the [`Grammar`] used
//! to compile builders for it. Every statement goes through one `run` path that
//!
//! - logs it at `debug` (target `tinyorm::query`),
//! - counts it when statement counting is on,
//! - records it in the query log when logging is on,
//! - skips execution entirely while pretending.
//!
//! # Example
//!
//! ```rust,ignore
//! let db = DatabaseConnection::builder()
//!     .dialect(Dialect::Sqlite)
//!     .table_prefix("app_")
//!     .build_with(connection);
//!
//! let rows = db.table("torrents").where_("size", ">", 10)?.get(&["*"])?;
//! ```

use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tinyorm_core::{Connection, Expression, Result, Row, StatementResult, Value};

use crate::builder::Builder;
use crate::grammar::{Dialect, Grammar, SqlGrammar};
use crate::n1_detection::{N1QueryTracker, N1Stats};

// ============================================================================
// Configuration
// ============================================================================

/// Connection configuration.
///
/// Deserializable so it can live in an application config file; missing
/// fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Connection name, used in logs.
    pub name: String,
    /// SQL dialect for quoting and insert-or-ignore.
    pub dialect: Dialect,
    /// Prefix prepended to table names.
    pub table_prefix: String,
    /// Start in pretend mode (record statements, run nothing).
    pub pretend: bool,
    /// Keep executed statements in the in-memory query log.
    pub log_queries: bool,
    /// Count executed statements.
    pub count_statements: bool,
    /// Lazy loads per relation before an N+1 warning.
    pub n1_threshold: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            dialect: Dialect::default(),
            table_prefix: String::new(),
            pretend: false,
            log_queries: false,
            count_statements: false,
            n1_threshold: 3,
        }
    }
}

/// A statement recorded in the query log.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
    pub elapsed: Duration,
}

/// Executed statement counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementsCounter {
    /// Selects and other statements that return rows or success.
    pub normal: u64,
    /// Statements that report affected rows.
    pub affecting: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    Normal,
    Affecting,
}

// ============================================================================
// DatabaseConnection
// ============================================================================

/// A driver connection plus its grammar, logging and counters.
pub struct DatabaseConnection {
    connection: Box<dyn Connection>,
    grammar: Box<dyn Grammar>,
    config: ConnectionConfig,
    pretending: Cell<bool>,
    logging_queries: Cell<bool>,
    counting: Cell<bool>,
    counter: Cell<StatementsCounter>,
    query_log: RefCell<Vec<LoggedQuery>>,
    n1: RefCell<N1QueryTracker>,
}

impl std::fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("driver", &self.connection.driver_name())
            .field("grammar", &self.grammar)
            .field("config", &self.config)
            .field("pretending", &self.pretending.get())
            .finish_non_exhaustive()
    }
}

impl DatabaseConnection {
    /// Wrap a connection with the default configuration.
    pub fn new(connection: impl Connection + 'static) -> Self {
        Self::builder().build_with(connection)
    }

    /// Start a connection builder.
    #[must_use]
    pub fn builder() -> DatabaseConnectionBuilder {
        DatabaseConnectionBuilder::new()
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn grammar(&self) -> &dyn Grammar {
        self.grammar.as_ref()
    }

    #[must_use]
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    /// A fresh query builder on this connection.
    #[must_use]
    pub fn query(&self) -> Builder<'_> {
        Builder::new(self)
    }

    /// A query builder for `table`.
    #[must_use]
    pub fn table(&self, table: &str) -> Builder<'_> {
        let mut builder = Builder::new(self);
        builder.from(table);
        builder
    }

    /// A raw SQL expression, emitted verbatim and never bound.
    pub fn raw(&self, sql: impl Into<String>) -> Expression {
        Expression::new(sql)
    }

    // ------------------------------------------------------------------
    // Statement execution
    // ------------------------------------------------------------------

    pub fn select(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>> {
        self.run(sql, bindings, StatementKind::Normal, Vec::new(), |c| {
            c.select(sql, bindings)
        })
    }

    pub fn select_one(&self, sql: &str, bindings: &[Value]) -> Result<Option<Row>> {
        self.run(sql, bindings, StatementKind::Normal, None, |c| {
            c.select_one(sql, bindings)
        })
    }

    pub fn insert(&self, sql: &str, bindings: &[Value]) -> Result<StatementResult> {
        self.run(
            sql,
            bindings,
            StatementKind::Affecting,
            StatementResult::default(),
            |c| c.insert(sql, bindings),
        )
    }

    pub fn update(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        self.run(sql, bindings, StatementKind::Affecting, 0, |c| {
            c.update(sql, bindings)
        })
    }

    pub fn remove(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        self.run(sql, bindings, StatementKind::Affecting, 0, |c| {
            c.remove(sql, bindings)
        })
    }

    pub fn statement(&self, sql: &str, bindings: &[Value]) -> Result<bool> {
        self.run(sql, bindings, StatementKind::Normal, true, |c| {
            c.statement(sql, bindings)
        })
    }

    pub fn affecting_statement(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        self.run(sql, bindings, StatementKind::Affecting, 0, |c| {
            c.affecting_statement(sql, bindings)
        })
    }

    pub fn unprepared(&self, sql: &str) -> Result<bool> {
        self.run(sql, &[], StatementKind::Normal, true, |c| c.unprepared(sql))
    }

    fn run<T>(
        &self,
        sql: &str,
        bindings: &[Value],
        kind: StatementKind,
        pretended: T,
        execute: impl FnOnce(&dyn Connection) -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let pretending = self.pretending.get();
        let result = if pretending {
            Ok(pretended)
        } else {
            execute(self.connection.as_ref())
        };
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => tracing::debug!(
                target: "tinyorm::query",
                connection = %self.config.name,
                sql = sql,
                bindings = ?bindings,
                elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
                pretend = pretending,
                "Executed statement"
            ),
            Err(e) => tracing::warn!(
                target: "tinyorm::query",
                connection = %self.config.name,
                sql = sql,
                bindings = ?bindings,
                error = %e,
                "Statement failed"
            ),
        }

        if result.is_ok() && !pretending && self.counting.get() {
            let mut counter = self.counter.get();
            match kind {
                StatementKind::Normal => counter.normal += 1,
                StatementKind::Affecting => counter.affecting += 1,
            }
            self.counter.set(counter);
        }

        if pretending || self.logging_queries.get() {
            self.query_log.borrow_mut().push(LoggedQuery {
                sql: sql.to_string(),
                bindings: bindings.to_vec(),
                elapsed,
            });
        }

        result
    }

    // ------------------------------------------------------------------
    // Pretend mode and query log
    // ------------------------------------------------------------------

    /// Run `callback` without executing anything and return the statements it
    /// would have run.
    pub fn pretend<F>(&self, callback: F) -> Result<Vec<LoggedQuery>>
    where
        F: FnOnce(&Self) -> Result<()>,
    {
        let saved_log = self.query_log.take();
        let was_pretending = self.pretending.replace(true);

        let outcome = callback(self);

        self.pretending.set(was_pretending);
        let recorded = self.query_log.replace(saved_log);
        outcome.map(|()| recorded)
    }

    #[must_use]
    pub fn pretending(&self) -> bool {
        self.pretending.get()
    }

    pub fn enable_query_log(&self) {
        self.logging_queries.set(true);
    }

    pub fn disable_query_log(&self) {
        self.logging_queries.set(false);
    }

    #[must_use]
    pub fn logging(&self) -> bool {
        self.logging_queries.get()
    }

    /// Statements recorded so far.
    #[must_use]
    pub fn query_log(&self) -> Vec<LoggedQuery> {
        self.query_log.borrow().clone()
    }

    pub fn flush_query_log(&self) {
        self.query_log.borrow_mut().clear();
    }

    // ------------------------------------------------------------------
    // Statement counters
    // ------------------------------------------------------------------

    pub fn enable_statements_counter(&self) {
        self.counting.set(true);
    }

    pub fn disable_statements_counter(&self) {
        self.counting.set(false);
    }

    #[must_use]
    pub fn statements_counter(&self) -> StatementsCounter {
        self.counter.get()
    }

    /// Return the counts and reset them to zero.
    pub fn take_statements_counter(&self) -> StatementsCounter {
        self.counter.take()
    }

    pub fn reset_statements_counter(&self) {
        self.counter.set(StatementsCounter::default());
    }

    // ------------------------------------------------------------------
    // N+1 detection
    // ------------------------------------------------------------------

    /// Record one lazy relation load.
    #[track_caller]
    pub fn record_lazy_load(&self, model: &'static str, relation: &'static str) {
        self.n1.borrow_mut().record_load(model, relation);
    }

    #[must_use]
    pub fn lazy_load_count(&self, model: &str, relation: &str) -> usize {
        self.n1.borrow().count_for(model, relation)
    }

    #[must_use]
    pub fn n1_stats(&self) -> N1Stats {
        self.n1.borrow().stats()
    }

    pub fn reset_n1_tracker(&self) {
        self.n1.borrow_mut().reset();
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`DatabaseConnection`].
#[derive(Debug, Default)]
pub struct DatabaseConnectionBuilder {
    config: ConnectionConfig,
    grammar: Option<Box<dyn Grammar>>,
}

impl DatabaseConnectionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    #[must_use]
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.table_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn pretend(mut self, pretend: bool) -> Self {
        self.config.pretend = pretend;
        self
    }

    #[must_use]
    pub fn log_queries(mut self, enabled: bool) -> Self {
        self.config.log_queries = enabled;
        self
    }

    #[must_use]
    pub fn count_statements(mut self, enabled: bool) -> Self {
        self.config.count_statements = enabled;
        self
    }

    #[must_use]
    pub fn n1_threshold(mut self, threshold: usize) -> Self {
        self.config.n1_threshold = threshold;
        self
    }

    /// Use a custom grammar instead of the dialect's stock one.
    #[must_use]
    pub fn grammar(mut self, grammar: impl Grammar + 'static) -> Self {
        self.grammar = Some(Box::new(grammar));
        self
    }

    /// Build the connection wrapper around `connection`.
    pub fn build_with(self, connection: impl Connection + 'static) -> DatabaseConnection {
        let config = self.config;
        let grammar = self.grammar.unwrap_or_else(|| {
            Box::new(
                SqlGrammar::new(config.dialect).with_table_prefix(config.table_prefix.clone()),
            )
        });

        tracing::debug!(
            connection = %config.name,
            driver = connection.driver_name(),
            dialect = ?config.dialect,
            "Created database connection"
        );

        DatabaseConnection {
            connection: Box::new(connection),
            grammar,
            pretending: Cell::new(config.pretend),
            logging_queries: Cell::new(config.log_queries),
            counting: Cell::new(config.count_statements),
            counter: Cell::new(StatementsCounter::default()),
            query_log: RefCell::new(Vec::new()),
            n1: RefCell::new(N1QueryTracker::new().with_threshold(config.n1_threshold)),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"name": "crystal", "dialect": "mysql"}"#).unwrap();
        assert_eq!(config.name, "crystal");
        assert_eq!(config.dialect, Dialect::Mysql);
        assert_eq!(config.n1_threshold, 3);
        assert!(!config.pretend);
    }

    #[test]
    fn test_builder_applies_dialect_and_prefix() {
        let db = DatabaseConnection::builder()
            .dialect(Dialect::Mysql)
            .table_prefix("app_")
            .build_with(MockConnection::default());
        assert_eq!(db.grammar().wrap_table("torrents"), "`app_torrents`");
    }

    #[test]
    fn test_pretend_records_without_executing() {
        let mock = MockConnection::default();
        let executed = mock.executed();
        let db = DatabaseConnection::new(mock);

        let queries = db
            .pretend(|db| {
                db.update("update torrents set size = ?", &[Value::Int(1)])?;
                db.select("select * from torrents", &[])?;
                Ok(())
            })
            .unwrap();

        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].bindings, vec![Value::Int(1)]);
        assert!(executed.borrow().is_empty());
        assert!(!db.pretending());
        assert!(db.query_log().is_empty());
    }

    #[test]
    fn test_statements_counter() {
        let db = DatabaseConnection::builder()
            .count_statements(true)
            .build_with(MockConnection::default());
        db.select("select 1", &[]).unwrap();
        db.affecting_statement("delete from t", &[]).unwrap();
        db.remove("delete from t", &[]).unwrap();

        assert_eq!(
            db.take_statements_counter(),
            StatementsCounter {
                normal: 1,
                affecting: 2
            }
        );
        assert_eq!(db.statements_counter(), StatementsCounter::default());
    }

    #[test]
    fn test_query_log_toggle() {
        let db = DatabaseConnection::new(MockConnection::default());
        db.select("select 1", &[]).unwrap();
        assert!(db.query_log().is_empty());

        db.enable_query_log();
        db.select("select 2", &[]).unwrap();
        assert_eq!(db.query_log()[0].sql, "select 2");

        db.flush_query_log();
        assert!(db.query_log().is_empty());
    }

    #[test]
    fn test_connection_errors_surface_unchanged() {
        let mock = MockConnection::default();
        mock.fail_next("database is locked");
        let db = DatabaseConnection::new(mock);
        let err = db.select("select 1", &[]).unwrap_err();
        assert!(err.is_execution_error());
        assert!(err.to_string().contains("database is locked"));
    }

    #[test]
    fn test_lazy_load_tracking() {
        let db = DatabaseConnection::builder()
            .n1_threshold(2)
            .build_with(MockConnection::default());
        db.record_lazy_load("Torrent", "torrentPeer");
        db.record_lazy_load("Torrent", "torrentPeer");
        assert_eq!(db.lazy_load_count("Torrent", "torrentPeer"), 2);
        assert_eq!(db.n1_stats().potential_n1, 1);
        db.reset_n1_tracker();
        assert_eq!(db.n1_stats().total_loads, 0);
    }
}
