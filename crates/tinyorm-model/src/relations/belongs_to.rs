use std::collections::HashMap;

use tinyorm_core::{Key, Result, Value};
use tinyorm_query::BuildsWheres;

use super::{Relation, RelationResults, model_keys};
use crate::model::{Model, RelationSlot};
use crate::tiny_builder::TinyBuilder;

/// Inverse side of a one-to-one or one-to-many relation.
///
/// The foreign key lives on the child (`P`) and points at the owner key of the
/// related model (`R`).
#[derive(Debug, Clone)]
pub struct BelongsTo<'db, P: Model, R: Model> {
    query: TinyBuilder<'db, R>,
    child: P,
    foreign_key: String,
    owner_key: String,
    relation: &'static str,
}

impl<'db, P: Model, R: Model> BelongsTo<'db, P, R> {
    pub(crate) fn new(
        query: TinyBuilder<'db, R>,
        child: P,
        foreign_key: String,
        owner_key: String,
        relation: &'static str,
    ) -> Self {
        Self {
            query,
            child,
            foreign_key,
            owner_key,
            relation,
        }
    }

    /// Foreign key column on the child.
    #[must_use]
    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    /// Matched column on the related model.
    #[must_use]
    pub fn owner_key(&self) -> &str {
        &self.owner_key
    }

    /// Relation name on the child.
    #[must_use]
    pub fn relation_name(&self) -> &str {
        self.relation
    }

    fn qualified_owner_key(&self) -> String {
        format!("{}.{}", R::TABLE, self.owner_key)
    }

    fn child_key(&self) -> Option<&Value> {
        self.child
            .get_attribute(&self.foreign_key)
            .filter(|v| !v.is_null())
    }
}

impl<'db, P: Model, R: Model> Relation<'db, P, R> for BelongsTo<'db, P, R> {
    fn add_constraints(&mut self) {
        if let Some(key) = self.child_key().cloned() {
            let column = self.qualified_owner_key();
            self.query.where_eq(&column, key);
        }
    }

    fn add_eager_constraints(&mut self, models: &[P]) {
        let keys = model_keys(models, &self.foreign_key);
        let column = self.qualified_owner_key();
        self.query.where_in(&column, keys);
    }

    fn init_relation(&self, models: &mut [P], relation: &str) {
        for model in models {
            model.set_relation(relation, RelationSlot::One(None));
        }
    }

    fn match_models(&self, models: &mut [P], results: Vec<R>, relation: &str) {
        // Later rows with the same owner key replace earlier ones.
        let mut dictionary: HashMap<Key, R> = HashMap::with_capacity(results.len());
        for result in results {
            if let Some(key) = result.get_attribute(&self.owner_key).and_then(Key::from_value) {
                dictionary.insert(key, result);
            }
        }

        for model in models {
            let Some(key) = model
                .get_attribute(&self.foreign_key)
                .and_then(Key::from_value)
            else {
                continue;
            };
            if let Some(owner) = dictionary.get(&key) {
                model.set_relation(relation, RelationSlot::One(Some(owner.base().clone())));
            }
        }
    }

    fn get_results(&self) -> Result<RelationResults<R>> {
        if self.child_key().is_none() {
            return Ok(RelationResults::One(None));
        }
        let mut query = self.query.clone();
        Ok(RelationResults::One(query.first(&["*"])?))
    }

    fn query(&self) -> &TinyBuilder<'db, R> {
        &self.query
    }

    fn query_mut(&mut self) -> &mut TinyBuilder<'db, R> {
        &mut self.query
    }
}
