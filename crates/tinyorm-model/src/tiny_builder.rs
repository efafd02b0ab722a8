//! The model query builder.
//!
//! [`TinyBuilder`] wraps a [`Builder`] on the model's table, hydrates result
//! rows into models and eager loads the requested relations.
//!
//! # Example
//!
//! ```ignore
//! let torrents = Torrent::query(&db)
//!     .with(["torrentFiles.fileProperty", "torrentPeer:id,torrent_id,seeds"])
//!     .where_("size", ">", 10)?
//!     .get(&["*"])?;
//!
//! for torrent in &torrents {
//!     let files = torrent.get_relation::<TorrentPreviewableFile>("torrentFiles")?;
//! }
//! ```

use std::fmt;
use std::marker::PhantomData;

use tinyorm_core::{Error, Result, Row, Value};
use tinyorm_query::{
    Builder, BuildsQueries, BuildsWheres, DatabaseConnection, UpdateItem, WhereCondition,
};

use crate::eager::{EagerLoader, WithItem, add_nested_withs};
use crate::model::{Model, ModelBase};
use crate::registry::resolve_relation;
use crate::relations::Constraints;

/// A query builder bound to model type `M`.
pub struct TinyBuilder<'db, M: Model> {
    query: Builder<'db>,
    eager_load: Vec<WithItem>,
    constraints: Constraints,
    model: PhantomData<M>,
}

impl<M: Model> Clone for TinyBuilder<'_, M> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            eager_load: self.eager_load.clone(),
            constraints: self.constraints.clone(),
            model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for TinyBuilder<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TinyBuilder")
            .field("model", &M::base_name())
            .field("query", &self.query)
            .field("eager_load", &self.eager_load)
            .finish()
    }
}

impl<'db, M: Model> TinyBuilder<'db, M> {
    /// A builder on `M`'s table.
    #[must_use]
    pub fn new(db: &'db DatabaseConnection) -> Self {
        Self {
            query: db.table(M::TABLE),
            eager_load: Vec::new(),
            constraints: Constraints::default(),
            model: PhantomData,
        }
    }

    #[must_use]
    pub fn connection(&self) -> &'db DatabaseConnection {
        self.query.get_connection()
    }

    /// The underlying query builder.
    #[must_use]
    pub fn query(&self) -> &Builder<'db> {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut Builder<'db> {
        &mut self.query
    }

    #[must_use]
    pub fn to_sql(&self) -> String {
        self.query.to_sql()
    }

    #[must_use]
    pub fn get_bindings(&self) -> Vec<Value> {
        self.query.get_bindings()
    }

    // ------------------------------------------------------------------
    // Eager load requests
    // ------------------------------------------------------------------

    /// Request relations to eager load.
    pub fn with<I, W>(&mut self, relations: I) -> &mut Self
    where
        I: IntoIterator<Item = W>,
        W: Into<WithItem>,
    {
        for relation in relations {
            add_nested_withs(&mut self.eager_load, relation.into());
        }
        self
    }

    /// Request one relation whose query is adjusted by `constraints`.
    pub fn with_constrained<F>(&mut self, relation: &str, constraints: F) -> &mut Self
    where
        F: Fn(&mut Builder<'_>) -> Result<()> + 'static,
    {
        add_nested_withs(
            &mut self.eager_load,
            WithItem::constrained(relation, constraints),
        );
        self
    }

    /// Drop requested relations (and everything nested under them).
    pub fn without<I, S>(&mut self, relations: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for relation in relations {
            let relation = relation.as_ref();
            let prefix = format!("{relation}.");
            self.eager_load
                .retain(|item| item.name != relation && !item.name.starts_with(&prefix));
        }
        self
    }

    #[must_use]
    pub fn get_eager_load(&self) -> &[WithItem] {
        &self.eager_load
    }

    pub fn set_eager_load(&mut self, eager_load: Vec<WithItem>) -> &mut Self {
        self.eager_load = eager_load;
        self
    }

    // ------------------------------------------------------------------
    // Query shortcuts
    // ------------------------------------------------------------------

    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.select(columns);
        self
    }

    pub fn order_by(&mut self, column: &str, direction: &str) -> Result<&mut Self> {
        self.query.order_by(column, direction)?;
        Ok(self)
    }

    pub fn latest(&mut self) -> &mut Self {
        self.query.latest();
        self
    }

    pub fn oldest(&mut self) -> &mut Self {
        self.query.oldest();
        self
    }

    pub fn limit(&mut self, value: u64) -> &mut Self {
        self.query.limit(value);
        self
    }

    pub fn offset(&mut self, value: u64) -> &mut Self {
        self.query.offset(value);
        self
    }

    pub fn for_page(&mut self, page: u64, per_page: u64) -> &mut Self {
        self.query.for_page(page, per_page);
        self
    }

    /// Constrain to the model's primary key (`table.id = ?`).
    pub fn where_key(&mut self, id: impl Into<Value>) -> &mut Self {
        self.query.where_eq(&M::qualified_key_name(), id);
        self
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Run the query, hydrate models and eager load the requested relations.
    #[tracing::instrument(level = "debug", skip(self), fields(model = M::base_name()))]
    pub fn get(&self, columns: &[&str]) -> Result<Vec<M>> {
        let rows = self.query.get(columns)?;
        let mut models = self.hydrate(rows);
        if !models.is_empty() {
            self.eager_load_relations(&mut models)?;
        }
        Ok(models)
    }

    pub fn first(&mut self, columns: &[&str]) -> Result<Option<M>> {
        self.query.take(1);
        Ok(self.get(columns)?.into_iter().next())
    }

    pub fn first_or_fail(&mut self, columns: &[&str]) -> Result<M> {
        self.first(columns)?
            .ok_or_else(|| Error::RecordsNotFound(M::base_name().to_string()))
    }

    pub fn find(&mut self, id: impl Into<Value>, columns: &[&str]) -> Result<Option<M>> {
        self.where_key(id);
        self.first(columns)
    }

    pub fn find_or_fail(&mut self, id: impl Into<Value>, columns: &[&str]) -> Result<M> {
        self.find(id, columns)?
            .ok_or_else(|| Error::RecordsNotFound(M::base_name().to_string()))
    }

    pub fn count(&self) -> Result<u64> {
        self.query.count()
    }

    pub fn exists(&self) -> Result<bool> {
        self.query.exists()
    }

    /// One model per row, attributes in result column order.
    #[must_use]
    pub fn hydrate(&self, rows: Vec<Row>) -> Vec<M> {
        rows.into_iter()
            .map(|row| M::from_base(ModelBase::from_row(row)))
            .collect()
    }

    /// Eager load every top-level requested relation onto `models`.
    #[tracing::instrument(level = "debug", skip(self, models), fields(model = M::base_name(), owners = models.len()))]
    pub fn eager_load_relations(&self, models: &mut [M]) -> Result<()> {
        for item in self.eager_load.iter().filter(|item| !item.is_nested()) {
            self.eager_load_relation(models, item)?;
        }
        Ok(())
    }

    /// Eager load one relation; nested requests below it cascade.
    pub fn eager_load_relation(&self, models: &mut [M], item: &WithItem) -> Result<()> {
        resolve_relation::<M, _>(
            &item.name,
            EagerLoader {
                builder: self,
                constraints: &self.constraints,
                models,
                item,
            },
        )
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Update the matching rows. Returns affected rows.
    pub fn update(&self, values: &[UpdateItem]) -> Result<u64> {
        self.query.update(values)
    }

    /// Delete the matching rows. Returns affected rows.
    pub fn remove(&self) -> Result<u64> {
        self.query.remove()
    }
}

impl<M: Model> BuildsWheres for TinyBuilder<'_, M> {
    fn table_name(&self) -> &str {
        self.query.get_from()
    }

    fn wheres(&self) -> &[WhereCondition] {
        self.query.wheres()
    }

    fn push_where(&mut self, condition: WhereCondition, bindings: Vec<Value>) {
        self.query.push_where(condition, bindings);
    }
}

impl<M: Model> BuildsQueries for TinyBuilder<'_, M> {
    type Item = M;

    fn has_orders(&self) -> bool {
        !self.query.get_orders().is_empty()
    }

    fn source_name(&self) -> &str {
        M::base_name()
    }

    fn fetch_page(&self, page: u64, per_page: u64) -> Result<Vec<M>> {
        let mut query = self.clone();
        query.for_page(page, per_page);
        query.get(&["*"])
    }
}
