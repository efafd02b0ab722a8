//! A scripted in-memory connection for tests.
//!
//! [`MockConnection`] records every statement it receives and answers selects
//! from a FIFO queue of result sets; an exhausted queue yields no rows. Clones
//! share state, so a test can keep a handle after moving the connection into a
//! [`DatabaseConnection`](crate::DatabaseConnection).

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tinyorm_core::{Connection, QueryError, Result, Row, StatementResult, Value};

/// Executed statements, in order.
pub type Executed = Rc<RefCell<Vec<(String, Vec<Value>)>>>;

#[derive(Debug, Default)]
struct MockState {
    results: RefCell<VecDeque<Vec<Row>>>,
    failure: RefCell<Option<String>>,
    last_insert_id: Cell<Option<i64>>,
    affected: Cell<Option<u64>>,
}

/// Connection double with scripted results.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    executed: Executed,
    state: Rc<MockState>,
}

impl MockConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next unanswered select.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state.results.borrow_mut().push_back(rows);
    }

    /// Make the next statement fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.state.failure.borrow_mut() = Some(message.into());
    }

    /// Id reported by inserts.
    pub fn set_last_insert_id(&self, id: i64) {
        self.state.last_insert_id.set(Some(id));
    }

    /// Row count reported by writes (default 1).
    pub fn set_rows_affected(&self, rows: u64) {
        self.state.affected.set(Some(rows));
    }

    /// Shared handle on the executed statements.
    #[must_use]
    pub fn executed(&self) -> Executed {
        Rc::clone(&self.executed)
    }

    /// SQL of every executed statement.
    #[must_use]
    pub fn executed_sql(&self) -> Vec<String> {
        self.executed
            .borrow()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    fn record(&self, sql: &str, bindings: &[Value]) -> Result<()> {
        self.executed
            .borrow_mut()
            .push((sql.to_string(), bindings.to_vec()));
        match self.state.failure.borrow_mut().take() {
            Some(message) => Err(QueryError::new(sql, bindings.to_vec(), message).into()),
            None => Ok(()),
        }
    }
}

impl Connection for MockConnection {
    fn select(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>> {
        self.record(sql, bindings)?;
        Ok(self
            .state
            .results
            .borrow_mut()
            .pop_front()
            .unwrap_or_default())
    }

    fn affecting_statement(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        self.record(sql, bindings)?;
        Ok(self.state.affected.get().unwrap_or(1))
    }

    fn insert(&self, sql: &str, bindings: &[Value]) -> Result<StatementResult> {
        Ok(StatementResult {
            rows_affected: self.affecting_statement(sql, bindings)?,
            last_insert_id: self.state.last_insert_id.get(),
        })
    }

    fn driver_name(&self) -> &'static str {
        "mock"
    }
}
