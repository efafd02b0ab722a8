//! Models, their attribute store and their relation slots.
//!
//! A concrete model is a thin struct around a [`ModelBase`] that implements
//! three traits:
//!
//! - [`HasTable`]: table and primary key names;
//! - [`HasRelationRegistry`]: the relation table plus the visitor that maps a
//!   relation name to its related model type;
//! - [`Model`]: access to the `ModelBase`. Everything else is provided.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Debug, Clone, Default)]
//! struct Torrent {
//!     base: ModelBase,
//! }
//!
//! impl HasTable for Torrent {
//!     const TABLE: &'static str = "torrents";
//! }
//!
//! impl HasRelationRegistry for Torrent {
//!     const RELATIONS: &'static [RelationshipInfo] =
//!         &[RelationshipInfo::has_many("torrentFiles", "TorrentPreviewableFile")];
//!
//!     fn visit_relation<V: RelationVisitor<Self>>(name: &str, visitor: V) -> Result<V::Output> {
//!         match name {
//!             "torrentFiles" => visitor.visit::<TorrentPreviewableFile>(),
//!             _ => Err(relation_not_found::<Self>(name)),
//!         }
//!     }
//! }
//!
//! impl Model for Torrent {
//!     fn base(&self) -> &ModelBase { &self.base }
//!     fn base_mut(&mut self) -> &mut ModelBase { &mut self.base }
//!     fn from_base(base: ModelBase) -> Self { Self { base } }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use tinyorm_core::naming::{class_basename, to_snake};
use tinyorm_core::{
    AttributeItem, Error, RelationshipInfo, Result, Row, Value, attributes_to_json,
    find_attribute, set_attribute,
};
use tinyorm_query::{BuildsWheres, DatabaseConnection, UpdateItem};

use crate::eager::WithItem;
use crate::registry::{RelationVisitor, ensure_related, get_relation_method, relation_not_found};
use crate::relations::{Relation, RelationResults, make_relation};
use crate::tiny_builder::TinyBuilder;

// ============================================================================
// Model traits
// ============================================================================

/// Table metadata of a model.
pub trait HasTable {
    /// Table name.
    const TABLE: &'static str;

    /// Primary key column. An empty name means the model has no primary key.
    const PRIMARY_KEY: &'static str = "id";

    /// Unqualified type name, used for key guessing and diagnostics.
    #[must_use]
    fn base_name() -> &'static str {
        class_basename(std::any::type_name::<Self>())
    }
}

/// The relations a model declares.
///
/// `RELATIONS` and `visit_relation` describe the same names: the table says
/// which kind of relation a name is, the visitor supplies its related type.
pub trait HasRelationRegistry: HasTable + Sized {
    /// Relation table.
    const RELATIONS: &'static [RelationshipInfo] = &[];

    /// Relations eager loaded by every [`Model::query`].
    const WITH: &'static [&'static str] = &[];

    /// Call `visitor.visit::<Related>()` for the relation called `name`.
    fn visit_relation<V: RelationVisitor<Self>>(name: &str, _visitor: V) -> Result<V::Output> {
        Err(relation_not_found::<Self>(name))
    }
}

/// A database model.
pub trait Model: HasRelationRegistry + Clone + Default + 'static {
    fn base(&self) -> &ModelBase;

    fn base_mut(&mut self) -> &mut ModelBase;

    fn from_base(base: ModelBase) -> Self;

    fn into_base(mut self) -> ModelBase {
        std::mem::take(self.base_mut())
    }

    /// Default foreign key pointing at this model (`torrent_id`).
    #[must_use]
    fn foreign_key() -> String {
        format!("{}_{}", to_snake(Self::base_name()), Self::PRIMARY_KEY)
    }

    /// Primary key qualified with the table (`torrents.id`).
    #[must_use]
    fn qualified_key_name() -> String {
        format!("{}.{}", Self::TABLE, Self::PRIMARY_KEY)
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Set several attributes at once.
    fn fill<I, K, V>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in attributes {
            self.base_mut().set_attribute(&key.into(), value.into());
        }
        self
    }

    fn set_attribute(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.base_mut().set_attribute(key, value.into());
        self
    }

    fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.base().get_attribute(key)
    }

    fn get_attributes(&self) -> &[AttributeItem] {
        self.base().attributes()
    }

    fn get_key(&self) -> Option<&Value> {
        self.get_attribute(Self::PRIMARY_KEY)
    }

    fn get_original(&self, key: &str) -> Option<&Value> {
        self.base().get_original(key)
    }

    /// Replace all attributes, optionally marking them as the original state.
    fn set_raw_attributes(&mut self, attributes: Vec<AttributeItem>, sync: bool) -> &mut Self {
        self.base_mut().set_raw_attributes(attributes, sync);
        self
    }

    fn sync_original(&mut self) -> &mut Self {
        self.base_mut().sync_original();
        self
    }

    fn is_dirty(&self) -> bool {
        !self.base().get_dirty().is_empty()
    }

    fn get_dirty(&self) -> Vec<AttributeItem> {
        self.base().get_dirty()
    }

    /// Whether the model was loaded from or saved to the database.
    fn exists(&self) -> bool {
        self.base().exists
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    fn relation_loaded(&self, relation: &str) -> bool {
        self.base().relation_loaded(relation)
    }

    fn set_relation(&mut self, relation: &str, slot: RelationSlot) -> &mut Self {
        self.base_mut().set_relation(relation, slot);
        self
    }

    /// Loaded models of a to-many relation.
    fn get_relation<R: Model>(&self, relation: &str) -> Result<Vec<R>> {
        let info = get_relation_method::<Self>(relation)?;
        ensure_related::<Self, R>(info)?;
        match self.base().relation_slot(relation) {
            Some(RelationSlot::Many(models)) => {
                Ok(models.iter().cloned().map(R::from_base).collect())
            }
            Some(RelationSlot::One(_)) => Err(arity_mismatch::<Self, R>(info, false)),
            None => Err(not_loaded::<Self>(relation)),
        }
    }

    /// Loaded model of a to-one relation.
    fn get_relation_one<R: Model>(&self, relation: &str) -> Result<Option<R>> {
        let info = get_relation_method::<Self>(relation)?;
        ensure_related::<Self, R>(info)?;
        match self.base().relation_slot(relation) {
            Some(RelationSlot::One(model)) => Ok(model.clone().map(R::from_base)),
            Some(RelationSlot::Many(_)) => Err(arity_mismatch::<Self, R>(info, true)),
            None => Err(not_loaded::<Self>(relation)),
        }
    }

    /// To-many relation, loaded lazily on first access.
    #[track_caller]
    fn get_relation_value<R: Model>(
        &mut self,
        db: &DatabaseConnection,
        relation: &str,
    ) -> Result<Vec<R>> {
        if !self.relation_loaded(relation) {
            self.lazy_load::<R>(db, relation)?;
        }
        self.get_relation::<R>(relation)
    }

    /// To-one relation, loaded lazily on first access.
    #[track_caller]
    fn get_relation_value_one<R: Model>(
        &mut self,
        db: &DatabaseConnection,
        relation: &str,
    ) -> Result<Option<R>> {
        if !self.relation_loaded(relation) {
            self.lazy_load::<R>(db, relation)?;
        }
        self.get_relation_one::<R>(relation)
    }

    #[doc(hidden)]
    #[track_caller]
    fn lazy_load<R: Model>(&mut self, db: &DatabaseConnection, relation: &str) -> Result<()> {
        let info = get_relation_method::<Self>(relation)?;
        ensure_related::<Self, R>(info)?;
        let results = make_relation::<Self, R>(db, info, self.clone(), true).get_results()?;
        self.base_mut().set_relation(relation, results.into_slot());
        db.record_lazy_load(Self::base_name(), info.name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Attributes plus loaded relations as JSON.
    fn to_json(&self) -> serde_json::Value {
        self.base().to_json()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// A builder for this model with the default eager loads applied.
    fn query(db: &DatabaseConnection) -> TinyBuilder<'_, Self> {
        let mut builder = TinyBuilder::new(db);
        builder.with(Self::WITH.iter().copied());
        builder
    }

    /// A builder eager loading `relations`.
    fn with<I, W>(db: &DatabaseConnection, relations: I) -> TinyBuilder<'_, Self>
    where
        I: IntoIterator<Item = W>,
        W: Into<WithItem>,
    {
        let mut builder = Self::query(db);
        builder.with(relations);
        builder
    }

    fn all(db: &DatabaseConnection) -> Result<Vec<Self>> {
        Self::query(db).get(&["*"])
    }

    fn find(db: &DatabaseConnection, id: impl Into<Value>) -> Result<Option<Self>> {
        Self::query(db).find(id, &["*"])
    }

    fn find_or_fail(db: &DatabaseConnection, id: impl Into<Value>) -> Result<Self> {
        Self::query(db).find_or_fail(id, &["*"])
    }

    fn first_or_fail(db: &DatabaseConnection) -> Result<Self> {
        Self::query(db).first_or_fail(&["*"])
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Insert a new model or update the dirty attributes of an existing one.
    fn save(&mut self, db: &DatabaseConnection) -> Result<bool> {
        if self.exists() {
            let dirty = self.get_dirty();
            if dirty.is_empty() {
                return Ok(true);
            }
            let key = self.original_key()?;
            let values: Vec<UpdateItem> = dirty
                .into_iter()
                .map(|a| UpdateItem::new(a.key, a.value))
                .collect();
            let mut query = db.table(Self::TABLE);
            query.where_eq(Self::PRIMARY_KEY, key);
            query.update(&values)?;
        } else {
            let attributes = self.get_attributes().to_vec();
            let query = db.table(Self::TABLE);
            if Self::PRIMARY_KEY.is_empty() || self.get_key().is_some() {
                query.insert(&[attributes])?;
            } else if let Some(id) = query.insert_get_id(&attributes, None)? {
                self.set_attribute(Self::PRIMARY_KEY, id);
            }
            self.base_mut().exists = true;
        }
        self.sync_original();
        Ok(true)
    }

    /// Delete the model by its original key. `false` when it does not exist.
    fn remove(&mut self, db: &DatabaseConnection) -> Result<bool> {
        if Self::PRIMARY_KEY.is_empty() {
            return Err(Error::Model("No primary key defined on model.".into()));
        }
        if !self.exists() {
            return Ok(false);
        }
        let key = self.original_key()?;
        let mut query = db.table(Self::TABLE);
        query.where_eq(Self::PRIMARY_KEY, key);
        query.remove()?;
        self.base_mut().exists = false;
        tracing::debug!(
            target: "tinyorm::model",
            model = Self::base_name(),
            "Removed model"
        );
        Ok(true)
    }

    #[doc(hidden)]
    fn original_key(&self) -> Result<Value> {
        self.get_original(Self::PRIMARY_KEY)
            .or_else(|| self.get_key())
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| {
                Error::Model(format!("Model {} has no primary key value.", Self::base_name()))
            })
    }

    /// Fetch the models with the given keys and remove each. Returns the count.
    fn destroy<I, V>(db: &DatabaseConnection, ids: I) -> Result<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(0);
        }
        let mut query = TinyBuilder::<Self>::new(db);
        query.where_in(Self::PRIMARY_KEY, ids);
        let mut count = 0;
        for mut model in query.get(&["*"])? {
            if model.remove(db)? {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn not_loaded<M: HasTable>(relation: &str) -> Error {
    Error::RelationNotLoaded {
        model: M::base_name().to_string(),
        relation: relation.to_string(),
    }
}

fn arity_mismatch<M: HasTable, R: HasTable>(info: &RelationshipInfo, requested_one: bool) -> Error {
    let (expected, requested) = if requested_one {
        (format!("Vec<{}>", info.related), format!("Option<{}>", R::base_name()))
    } else {
        (format!("Option<{}>", info.related), format!("Vec<{}>", R::base_name()))
    };
    Error::RelationTypeMismatch {
        model: M::base_name().to_string(),
        relation: info.name.to_string(),
        expected,
        requested,
    }
}

// ============================================================================
// Attribute store
// ============================================================================

/// The state every model carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelBase {
    attributes: Vec<AttributeItem>,
    original: Vec<AttributeItem>,
    relations: BTreeMap<String, RelationSlot>,
    exists: bool,
}

impl ModelBase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A model state hydrated from a result row.
    #[must_use]
    pub fn from_row(row: Row) -> Self {
        let attributes: Vec<AttributeItem> = row
            .into_pairs()
            .into_iter()
            .map(|(key, value)| AttributeItem { key, value })
            .collect();
        Self {
            original: attributes.clone(),
            attributes,
            relations: BTreeMap::new(),
            exists: true,
        }
    }

    #[must_use]
    pub fn attributes(&self) -> &[AttributeItem] {
        &self.attributes
    }

    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&Value> {
        find_attribute(&self.attributes, key)
    }

    pub fn set_attribute(&mut self, key: &str, value: Value) {
        set_attribute(&mut self.attributes, key, value);
    }

    #[must_use]
    pub fn get_original(&self, key: &str) -> Option<&Value> {
        find_attribute(&self.original, key)
    }

    pub fn set_raw_attributes(&mut self, attributes: Vec<AttributeItem>, sync: bool) {
        self.attributes = attributes;
        if sync {
            self.sync_original();
        }
    }

    pub fn sync_original(&mut self) {
        self.original = self.attributes.clone();
    }

    /// Attributes whose value differs from the original state.
    #[must_use]
    pub fn get_dirty(&self) -> Vec<AttributeItem> {
        self.attributes
            .iter()
            .filter(|a| self.get_original(&a.key) != Some(&a.value))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn set_exists(&mut self, exists: bool) {
        self.exists = exists;
    }

    #[must_use]
    pub fn relation_loaded(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    #[must_use]
    pub fn relation_slot(&self, relation: &str) -> Option<&RelationSlot> {
        self.relations.get(relation)
    }

    pub fn set_relation(&mut self, relation: &str, slot: RelationSlot) {
        self.relations.insert(relation.to_string(), slot);
    }

    pub fn unset_relation(&mut self, relation: &str) -> Option<RelationSlot> {
        self.relations.remove(relation)
    }

    /// Attributes, then loaded relations under snake-cased names.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = attributes_to_json(&self.attributes);
        for (name, slot) in &self.relations {
            map.insert(to_snake(name), slot.to_json());
        }
        serde_json::Value::Object(map)
    }
}

impl Serialize for ModelBase {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// A loaded relation.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationSlot {
    /// To-many: every related model, in result order.
    Many(Vec<ModelBase>),
    /// To-one: the related model, if any.
    One(Option<ModelBase>),
}

impl RelationSlot {
    /// The empty slot for a relation arity.
    #[must_use]
    pub fn empty(many: bool) -> Self {
        if many {
            RelationSlot::Many(Vec::new())
        } else {
            RelationSlot::One(None)
        }
    }

    #[must_use]
    pub fn is_many(&self) -> bool {
        matches!(self, RelationSlot::Many(_))
    }

    /// Number of related models held.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            RelationSlot::Many(models) => models.len(),
            RelationSlot::One(model) => usize::from(model.is_some()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RelationSlot::Many(models) => {
                serde_json::Value::Array(models.iter().map(ModelBase::to_json).collect())
            }
            RelationSlot::One(Some(model)) => model.to_json(),
            RelationSlot::One(None) => serde_json::Value::Null,
        }
    }
}

impl<R: Model> From<RelationResults<R>> for RelationSlot {
    fn from(results: RelationResults<R>) -> Self {
        results.into_slot()
    }
}
