//! The fluent query builder.
//!
//! A [`Builder`] accumulates a clause model (selected columns, joins, wheres,
//! groups, havings, orders, limit/offset) plus the bound values in their
//! compartments. Terminal methods compile it through the connection's
//! [`Grammar`](crate::Grammar) and run it on the [`DatabaseConnection`].
//!
//! Where-clause methods come from [`BuildsWheres`]; import it (or the prelude)
//! to use them on a builder.
//!
//! # Example
//!
//! ```rust,ignore
//! let rows = db
//!     .table("torrents")
//!     .where_items(
//!         &[WhereItem::new("size", 13), WhereItem::new("size", 14).or()],
//!         Connective::And,
//!     )?
//!     .where_("progress", ">=", 400)?
//!     .order_by("name", "asc")?
//!     .get(&["id", "name"])?;
//! ```
//!
//! Validating methods return `Result<&mut Self>` and leave the builder
//! untouched on error.

use std::fmt;

use tinyorm_core::naming::unqualified;
use tinyorm_core::{AttributeItem, Error, Expression, Result, Row, StatementResult, Value};

use crate::clause::{
    Aggregate, BindingType, Bindings, Connective, HavingCondition, JoinType, OrderBy,
    OrderDirection, UpdateItem, WhereCondition, bindable,
};
use crate::database::DatabaseConnection;
use crate::join::JoinClause;
use crate::wheres::{BuildsWheres, validate_operator};

/// Default column used by `latest` and `oldest`.
pub const CREATED_AT: &str = "created_at";

/// Default page size of [`Builder::for_page`].
pub const DEFAULT_PER_PAGE: u64 = 30;

/// A fluent SQL query builder bound to a connection.
#[derive(Clone)]
pub struct Builder<'db> {
    db: &'db DatabaseConnection,
    distinct: bool,
    aggregate: Option<Aggregate>,
    columns: Vec<String>,
    from: String,
    joins: Vec<JoinClause>,
    wheres: Vec<WhereCondition>,
    groups: Vec<String>,
    havings: Vec<HavingCondition>,
    orders: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    bindings: Bindings,
}

impl fmt::Debug for Builder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("connection", &self.db.name())
            .field("sql", &self.to_sql())
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl<'db> Builder<'db> {
    /// Create an empty builder on `db`.
    #[must_use]
    pub fn new(db: &'db DatabaseConnection) -> Self {
        Self {
            db,
            distinct: false,
            aggregate: None,
            columns: Vec::new(),
            from: String::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            groups: Vec::new(),
            havings: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            bindings: Bindings::default(),
        }
    }

    /// A fresh builder on the same connection.
    #[must_use]
    pub fn new_query(&self) -> Builder<'db> {
        Builder::new(self.db)
    }

    // ========================================================================
    // Table and columns
    // ========================================================================

    pub fn from(&mut self, table: &str) -> &mut Self {
        self.from = table.to_string();
        self
    }

    pub fn table(&mut self, table: &str) -> &mut Self {
        self.from(table)
    }

    /// Replace the selected columns.
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append to the selected columns.
    pub fn add_select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    // ========================================================================
    // Joins
    // ========================================================================

    /// Attach a fully built join; its bindings go to the join compartment.
    pub fn add_join(&mut self, join: JoinClause) -> &mut Self {
        self.bindings
            .extend(BindingType::Join, join.bindings().iter().cloned());
        self.joins.push(join);
        self
    }

    /// Join with one column comparison (`on first op second`).
    pub fn join_with_type(
        &mut self,
        table: &str,
        first: &str,
        operator: &str,
        second: &str,
        kind: JoinType,
    ) -> Result<&mut Self> {
        let mut join = JoinClause::new(kind, table);
        join.on(first, operator, second)?;
        Ok(self.add_join(join))
    }

    /// Join with one value comparison (`on first op ?`).
    pub fn join_where_with_type(
        &mut self,
        table: &str,
        first: &str,
        operator: &str,
        value: impl Into<Value>,
        kind: JoinType,
    ) -> Result<&mut Self> {
        let mut join = JoinClause::new(kind, table);
        join.where_(first, operator, value)?;
        Ok(self.add_join(join))
    }

    /// Join whose conditions are built in a closure.
    pub fn join_using<F>(&mut self, table: &str, kind: JoinType, callback: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut JoinClause) -> Result<()>,
    {
        let mut join = JoinClause::new(kind, table);
        callback(&mut join)?;
        Ok(self.add_join(join))
    }

    pub fn join(
        &mut self,
        table: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Result<&mut Self> {
        self.join_with_type(table, first, operator, second, JoinType::Inner)
    }

    pub fn join_where(
        &mut self,
        table: &str,
        first: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.join_where_with_type(table, first, operator, value, JoinType::Inner)
    }

    pub fn left_join(
        &mut self,
        table: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Result<&mut Self> {
        self.join_with_type(table, first, operator, second, JoinType::Left)
    }

    pub fn left_join_where(
        &mut self,
        table: &str,
        first: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.join_where_with_type(table, first, operator, value, JoinType::Left)
    }

    pub fn right_join(
        &mut self,
        table: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Result<&mut Self> {
        self.join_with_type(table, first, operator, second, JoinType::Right)
    }

    pub fn right_join_where(
        &mut self,
        table: &str,
        first: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.join_where_with_type(table, first, operator, value, JoinType::Right)
    }

    /// Cartesian join without conditions.
    pub fn cross_join(&mut self, table: &str) -> &mut Self {
        self.add_join(JoinClause::new(JoinType::Cross, table))
    }

    // ========================================================================
    // Grouping and having
    // ========================================================================

    pub fn group_by<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn add_having(
        &mut self,
        column: &str,
        operator: &str,
        value: impl Into<Value>,
        connective: Connective,
    ) -> Result<&mut Self> {
        let operator = validate_operator(operator)?;
        let value = value.into();
        self.bindings
            .extend(BindingType::Having, bindable([value.clone()]));
        self.havings.push(HavingCondition {
            connective,
            column: column.to_string(),
            operator,
            value,
        });
        Ok(self)
    }

    pub fn having(
        &mut self,
        column: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.add_having(column, operator, value, Connective::And)
    }

    pub fn or_having(
        &mut self,
        column: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.add_having(column, operator, value, Connective::Or)
    }

    // ========================================================================
    // Ordering and paging
    // ========================================================================

    /// Order by `column`; `direction` is `asc` or `desc` in any case.
    pub fn order_by(&mut self, column: &str, direction: &str) -> Result<&mut Self> {
        let direction: OrderDirection = direction.parse()?;
        self.orders.push(OrderBy {
            column: column.to_string(),
            direction,
        });
        Ok(self)
    }

    pub fn order_by_asc(&mut self, column: &str) -> &mut Self {
        self.push_order(column, OrderDirection::Asc)
    }

    pub fn order_by_desc(&mut self, column: &str) -> &mut Self {
        self.push_order(column, OrderDirection::Desc)
    }

    /// Newest first, by `created_at`.
    pub fn latest(&mut self) -> &mut Self {
        self.latest_by(CREATED_AT)
    }

    pub fn latest_by(&mut self, column: &str) -> &mut Self {
        self.push_order(column, OrderDirection::Desc)
    }

    /// Oldest first, by `created_at`.
    pub fn oldest(&mut self) -> &mut Self {
        self.oldest_by(CREATED_AT)
    }

    pub fn oldest_by(&mut self, column: &str) -> &mut Self {
        self.push_order(column, OrderDirection::Asc)
    }

    /// Drop every order and its bindings.
    pub fn reorder(&mut self) -> &mut Self {
        self.orders.clear();
        self.bindings.clear(BindingType::Order);
        self
    }

    /// Drop every order, then order by `column`.
    pub fn reorder_by(&mut self, column: &str, direction: &str) -> Result<&mut Self> {
        let direction: OrderDirection = direction.parse()?;
        self.reorder();
        Ok(self.push_order(column, direction))
    }

    fn push_order(&mut self, column: &str, direction: OrderDirection) -> &mut Self {
        self.orders.push(OrderBy {
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn limit(&mut self, value: u64) -> &mut Self {
        self.limit = Some(value);
        self
    }

    pub fn take(&mut self, value: u64) -> &mut Self {
        self.limit(value)
    }

    pub fn offset(&mut self, value: u64) -> &mut Self {
        self.offset = Some(value);
        self
    }

    pub fn skip(&mut self, value: u64) -> &mut Self {
        self.offset(value)
    }

    /// Limit and offset for a 1-indexed page.
    pub fn for_page(&mut self, page: u64, per_page: u64) -> &mut Self {
        self.offset(page.saturating_sub(1).saturating_mul(per_page))
            .limit(per_page)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn get_connection(&self) -> &'db DatabaseConnection {
        self.db
    }

    #[must_use]
    pub fn get_distinct(&self) -> bool {
        self.distinct
    }

    #[must_use]
    pub fn get_aggregate(&self) -> Option<&Aggregate> {
        self.aggregate.as_ref()
    }

    #[must_use]
    pub fn get_columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn get_from(&self) -> &str {
        &self.from
    }

    #[must_use]
    pub fn get_joins(&self) -> &[JoinClause] {
        &self.joins
    }

    #[must_use]
    pub fn get_groups(&self) -> &[String] {
        &self.groups
    }

    #[must_use]
    pub fn get_havings(&self) -> &[HavingCondition] {
        &self.havings
    }

    #[must_use]
    pub fn get_orders(&self) -> &[OrderBy] {
        &self.orders
    }

    #[must_use]
    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub fn get_offset(&self) -> Option<u64> {
        self.offset
    }

    /// Bindings flattened in placeholder order.
    #[must_use]
    pub fn get_bindings(&self) -> Vec<Value> {
        self.bindings.flatten()
    }

    /// Bindings per compartment.
    #[must_use]
    pub fn get_raw_bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Append a value to a compartment. Expressions are ignored.
    pub fn add_binding(&mut self, value: impl Into<Value>, ty: BindingType) -> &mut Self {
        self.bindings.extend(ty, bindable([value.into()]));
        self
    }

    /// Compile the select statement without running it.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.db.grammar().compile_select(self)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Run the select. `columns` applies only when nothing was selected yet.
    pub fn get(&self, columns: &[&str]) -> Result<Vec<Row>> {
        if self.columns.is_empty() && !columns.is_empty() && columns != ["*"] {
            let mut query = self.clone();
            query.select(columns.iter().copied());
            return query.run_select();
        }
        self.run_select()
    }

    fn run_select(&self) -> Result<Vec<Row>> {
        self.db.select(&self.to_sql(), &self.get_bindings())
    }

    /// Limit to one row and return it.
    pub fn first(&mut self, columns: &[&str]) -> Result<Option<Row>> {
        Ok(self.take(1).get(columns)?.into_iter().next())
    }

    /// One column of the first row.
    pub fn value(&mut self, column: &str) -> Result<Option<Value>> {
        Ok(self
            .first(&[column])?
            .and_then(|row| row.get(unqualified(column)).cloned()))
    }

    /// First row with `from.id = id`.
    pub fn find(&mut self, id: impl Into<Value>, columns: &[&str]) -> Result<Option<Row>> {
        let column = format!("{}.id", self.from);
        self.where_eq(&column, id);
        self.first(columns)
    }

    /// One column of every row.
    pub fn pluck(&self, column: &str) -> Result<Vec<Value>> {
        let key = unqualified(column);
        Ok(self
            .get(&[column])?
            .into_iter()
            .map(|row| row.get(key).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// One column of every row joined by `glue`.
    pub fn implode(&self, column: &str, glue: &str) -> Result<String> {
        Ok(self
            .pluck(column)?
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(glue))
    }

    pub fn exists(&self) -> Result<bool> {
        let sql = self.db.grammar().compile_exists(self);
        let row = self.db.select_one(&sql, &self.get_bindings())?;
        Ok(row
            .and_then(|r| r.get("exists").and_then(Value::as_bool))
            .unwrap_or(false))
    }

    pub fn doesnt_exist(&self) -> Result<bool> {
        self.exists().map(|e| !e)
    }

    /// Run an aggregate function over `columns`.
    pub fn aggregate(&self, function: &str, columns: &[&str]) -> Result<Value> {
        let mut query = self.clone();
        query.columns.clear();
        query.bindings.clear(BindingType::Select);
        query.aggregate = Some(Aggregate {
            function: function.to_string(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        });
        let row = query.run_select()?.into_iter().next();
        Ok(row
            .and_then(|r| r.get("aggregate").cloned())
            .unwrap_or(Value::Null))
    }

    pub fn count(&self) -> Result<u64> {
        let value = self.aggregate("count", &["*"])?;
        Ok(value
            .as_i64()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0))
    }

    pub fn min(&self, column: &str) -> Result<Value> {
        self.aggregate("min", &[column])
    }

    pub fn max(&self, column: &str) -> Result<Value> {
        self.aggregate("max", &[column])
    }

    pub fn sum(&self, column: &str) -> Result<Value> {
        self.aggregate("sum", &[column])
    }

    pub fn avg(&self, column: &str) -> Result<Value> {
        self.aggregate("avg", &[column])
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Align rows to the union of their keys in first-seen order; absent keys
    /// become NULL.
    fn align_rows(rows: &[Vec<AttributeItem>]) -> (Vec<String>, Vec<Vec<Value>>) {
        let mut columns: Vec<String> = Vec::new();
        for attribute in rows.iter().flatten() {
            if !columns.contains(&attribute.key) {
                columns.push(attribute.key.clone());
            }
        }
        let values = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| {
                        row.iter()
                            .find(|a| &a.key == column)
                            .map_or(Value::Null, |a| a.value.clone())
                    })
                    .collect()
            })
            .collect();
        (columns, values)
    }

    /// Insert one or more rows. Returns `None` when `rows` is empty.
    pub fn insert(&self, rows: &[Vec<AttributeItem>]) -> Result<Option<StatementResult>> {
        if rows.is_empty() {
            return Ok(None);
        }
        let (columns, values) = Self::align_rows(rows);
        let sql = self.db.grammar().compile_insert(self, &columns, &values);
        let bindings = bindable(values.into_iter().flatten());
        self.db.insert(&sql, &bindings).map(Some)
    }

    /// Insert rows, skipping unique violations. Returns affected rows.
    pub fn insert_or_ignore(&self, rows: &[Vec<AttributeItem>]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let (columns, values) = Self::align_rows(rows);
        let sql = self
            .db
            .grammar()
            .compile_insert_or_ignore(self, &columns, &values);
        let bindings = bindable(values.into_iter().flatten());
        self.db.affecting_statement(&sql, &bindings)
    }

    /// Insert one row and return its generated id.
    pub fn insert_get_id(
        &self,
        row: &[AttributeItem],
        sequence: Option<&str>,
    ) -> Result<Option<i64>> {
        if row.is_empty() {
            return Ok(None);
        }
        let (columns, mut values) = Self::align_rows(&[row.to_vec()]);
        let values = values.pop().unwrap_or_default();
        let sql = self
            .db
            .grammar()
            .compile_insert_get_id(self, &columns, &values, sequence);
        let bindings = bindable(values);
        Ok(self.db.insert(&sql, &bindings)?.last_insert_id)
    }

    /// Update matching rows. Returns affected rows.
    pub fn update(&self, values: &[UpdateItem]) -> Result<u64> {
        let grammar = self.db.grammar();
        let sql = grammar.compile_update(self, values);
        let bindings = grammar.prepare_bindings_for_update(&self.bindings, values);
        self.db.update(&sql, &bindings)
    }

    /// Add `amount` to `column`, plus any extra assignments.
    pub fn increment(
        &self,
        column: &str,
        amount: impl Into<Value>,
        extra: &[UpdateItem],
    ) -> Result<u64> {
        self.step(column, "+", amount.into(), extra)
    }

    /// Subtract `amount` from `column`, plus any extra assignments.
    pub fn decrement(
        &self,
        column: &str,
        amount: impl Into<Value>,
        extra: &[UpdateItem],
    ) -> Result<u64> {
        self.step(column, "-", amount.into(), extra)
    }

    fn step(&self, column: &str, sign: &str, amount: Value, extra: &[UpdateItem]) -> Result<u64> {
        if amount.as_f64().is_none() {
            return Err(Error::invalid_argument(
                "Non-numeric value passed to increment method.",
            ));
        }
        let expression = Expression::new(format!(
            "{} {sign} {amount}",
            self.db.grammar().wrap(column)
        ));
        let mut values = vec![UpdateItem::new(column, expression)];
        values.extend_from_slice(extra);
        self.update(&values)
    }

    /// Delete matching rows. Returns affected rows.
    pub fn remove(&self) -> Result<u64> {
        let grammar = self.db.grammar();
        let sql = grammar.compile_delete(self);
        let bindings = grammar.prepare_bindings_for_delete(&self.bindings);
        self.db.remove(&sql, &bindings)
    }

    /// Delete the row with `<table>.id = id`.
    pub fn remove_by_id(&mut self, id: impl Into<Value>) -> Result<u64> {
        let column = format!("{}.id", self.from);
        self.where_eq(&column, id);
        self.remove()
    }

    /// Empty the table.
    pub fn truncate(&self) -> Result<bool> {
        let sql = self.db.grammar().compile_truncate(self);
        self.db.statement(&sql, &[])
    }
}

impl BuildsWheres for Builder<'_> {
    fn table_name(&self) -> &str {
        &self.from
    }

    fn wheres(&self) -> &[WhereCondition] {
        &self.wheres
    }

    fn push_where(&mut self, condition: WhereCondition, bindings: Vec<Value>) {
        self.wheres.push(condition);
        self.bindings.extend(BindingType::Where, bindings);
    }
}
