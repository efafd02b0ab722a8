//! Join clauses.

use tinyorm_core::{Result, Value};

use crate::clause::{Connective, JoinType, WhereCondition};
use crate::wheres::BuildsWheres;

/// One `join` of a select, with its own `on`/`where` conditions.
///
/// `on` compares columns; the inherited where methods compare against bound
/// values. The join's bindings land in the parent's join compartment.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    kind: JoinType,
    table: String,
    wheres: Vec<WhereCondition>,
    bindings: Vec<Value>,
}

impl JoinClause {
    pub fn new(kind: JoinType, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            wheres: Vec::new(),
            bindings: Vec::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> JoinType {
        self.kind
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    /// `and first op second`
    pub fn on(&mut self, first: &str, operator: &str, second: &str) -> Result<&mut Self> {
        self.add_where_column(first, operator, second, Connective::And)
    }

    /// `or first op second`
    pub fn or_on(&mut self, first: &str, operator: &str, second: &str) -> Result<&mut Self> {
        self.add_where_column(first, operator, second, Connective::Or)
    }
}

impl BuildsWheres for JoinClause {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn wheres(&self) -> &[WhereCondition] {
        &self.wheres
    }

    fn push_where(&mut self, condition: WhereCondition, bindings: Vec<Value>) {
        self.wheres.push(condition);
        self.bindings.extend(bindings);
    }
}
