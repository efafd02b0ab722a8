use std::collections::HashMap;

use tinyorm_core::naming::unqualified;
use tinyorm_core::{Key, Result, Value};
use tinyorm_query::BuildsWheres;

use super::{Relation, RelationResults, model_keys};
use crate::model::{Model, RelationSlot};
use crate::tiny_builder::TinyBuilder;

/// Owning side of a one-to-one or one-to-many relation.
///
/// The foreign key lives on the related model (`R`) and points at the local
/// key of the parent (`P`).
#[derive(Debug, Clone)]
pub struct HasOneOrMany<'db, P: Model, R: Model> {
    query: TinyBuilder<'db, R>,
    parent: P,
    /// Qualified with the related table.
    foreign_key: String,
    local_key: String,
    many: bool,
}

impl<'db, P: Model, R: Model> HasOneOrMany<'db, P, R> {
    pub(crate) fn new(
        query: TinyBuilder<'db, R>,
        parent: P,
        foreign_key: String,
        local_key: String,
        many: bool,
    ) -> Self {
        Self {
            query,
            parent,
            foreign_key,
            local_key,
            many,
        }
    }

    /// Qualified foreign key on the related table.
    #[must_use]
    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    /// Parent key matched by the foreign key.
    #[must_use]
    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    #[must_use]
    pub fn is_many(&self) -> bool {
        self.many
    }

    fn parent_key(&self) -> Option<&Value> {
        self.parent
            .get_attribute(&self.local_key)
            .filter(|v| !v.is_null())
    }
}

impl<'db, P: Model, R: Model> Relation<'db, P, R> for HasOneOrMany<'db, P, R> {
    fn add_constraints(&mut self) {
        if let Some(key) = self.parent_key().cloned() {
            let column = self.foreign_key.clone();
            self.query.where_eq(&column, key).where_not_null(&column);
        }
    }

    fn add_eager_constraints(&mut self, models: &[P]) {
        let keys = model_keys(models, &self.local_key);
        let column = self.foreign_key.clone();
        self.query.where_in(&column, keys);
    }

    fn init_relation(&self, models: &mut [P], relation: &str) {
        for model in models {
            model.set_relation(relation, RelationSlot::empty(self.many));
        }
    }

    fn match_models(&self, models: &mut [P], results: Vec<R>, relation: &str) {
        let foreign = unqualified(&self.foreign_key);

        // Arrival order is kept per key; to-one buckets keep the last row.
        let mut dictionary: HashMap<Key, Vec<R>> = HashMap::new();
        for result in results {
            if let Some(key) = result.get_attribute(foreign).and_then(Key::from_value) {
                dictionary.entry(key).or_default().push(result);
            }
        }

        for model in models {
            let Some(key) = model
                .get_attribute(&self.local_key)
                .and_then(Key::from_value)
            else {
                continue;
            };
            let Some(bucket) = dictionary.get(&key) else {
                continue;
            };
            let slot = if self.many {
                RelationSlot::Many(bucket.iter().map(|r| r.base().clone()).collect())
            } else {
                RelationSlot::One(bucket.last().map(|r| r.base().clone()))
            };
            model.set_relation(relation, slot);
        }
    }

    fn get_results(&self) -> Result<RelationResults<R>> {
        if self.parent_key().is_none() {
            return Ok(if self.many {
                RelationResults::Many(Vec::new())
            } else {
                RelationResults::One(None)
            });
        }
        if self.many {
            Ok(RelationResults::Many(self.query.get(&["*"])?))
        } else {
            let mut query = self.query.clone();
            Ok(RelationResults::One(query.first(&["*"])?))
        }
    }

    fn query(&self) -> &TinyBuilder<'db, R> {
        &self.query
    }

    fn query_mut(&mut self) -> &mut TinyBuilder<'db, R> {
        &mut self.query
    }
}
