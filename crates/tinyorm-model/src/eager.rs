//! Eager load requests and the loader that runs them.
//!
//! `with("torrentFiles.fileProperty")` asks for two levels. The request list
//! is normalized up front: every ancestor path gets its own entry (without
//! constraints) and `name:col1,col2` becomes a column-selection constraint.
//! At load time only top-level names are resolved; the nested remainder is
//! handed to the relation's own builder, so each depth costs one query no
//! matter how many owners it has.

use std::fmt;
use std::rc::Rc;

use tinyorm_core::Result;
use tinyorm_query::Builder;

use crate::model::Model;
use crate::registry::{RelationVisitor, get_relation_method};
use crate::relations::{Constraints, Relation, make_relation};
use crate::tiny_builder::TinyBuilder;

/// Callback constraining the query of an eager loaded relation.
pub type Constraint = Rc<dyn Fn(&mut Builder<'_>) -> Result<()>>;

/// One requested relation path with optional constraints.
#[derive(Clone)]
pub struct WithItem {
    pub name: String,
    pub constraints: Option<Constraint>,
}

impl fmt::Debug for WithItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithItem")
            .field("name", &self.name)
            .field("constrained", &self.constraints.is_some())
            .finish()
    }
}

impl PartialEq for WithItem {
    /// Items compare by name.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl WithItem {
    /// Parse a request; `name:col1,col2` selects only those columns.
    #[must_use]
    pub fn new(relation: &str) -> Self {
        match relation.split_once(':') {
            Some((name, columns)) => Self::constrained(name, select_constraint(columns)),
            None => Self {
                name: relation.to_string(),
                constraints: None,
            },
        }
    }

    /// A request whose query is adjusted by `constraints`.
    pub fn constrained<F>(name: impl Into<String>, constraints: F) -> Self
    where
        F: Fn(&mut Builder<'_>) -> Result<()> + 'static,
    {
        Self {
            name: name.into(),
            constraints: Some(Rc::new(constraints)),
        }
    }

    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.name.contains('.')
    }

    /// Apply the constraints, if any, to `query`.
    pub fn apply(&self, query: &mut Builder<'_>) -> Result<()> {
        match &self.constraints {
            Some(constraint) => constraint(query),
            None => Ok(()),
        }
    }
}

impl From<&str> for WithItem {
    fn from(relation: &str) -> Self {
        Self::new(relation)
    }
}

impl From<String> for WithItem {
    fn from(relation: String) -> Self {
        Self::new(&relation)
    }
}

/// Select `columns`, qualifying bare names with the relation's table.
fn select_constraint(columns: &str) -> impl Fn(&mut Builder<'_>) -> Result<()> + 'static {
    let columns: Vec<String> = columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    move |query| {
        let table = query.get_from().to_string();
        query.select(columns.iter().map(|column| {
            if column.contains('.') {
                column.clone()
            } else {
                format!("{table}.{column}")
            }
        }));
        Ok(())
    }
}

/// Merge `requested` into `eager_load`.
///
/// Ancestors of a dotted path are added without constraints unless already
/// present; a path requested explicitly replaces an earlier entry of the same
/// name.
pub fn add_nested_withs(eager_load: &mut Vec<WithItem>, requested: WithItem) {
    let segments: Vec<&str> = requested.name.split('.').collect();
    for depth in 1..segments.len() {
        let ancestor = segments[..depth].join(".");
        if !eager_load.iter().any(|item| item.name == ancestor) {
            eager_load.push(WithItem {
                name: ancestor,
                constraints: None,
            });
        }
    }

    match eager_load.iter_mut().find(|item| item.name == requested.name) {
        Some(existing) => *existing = requested,
        None => eager_load.push(requested),
    }
}

/// Requests nested under `relation`, with the `relation.` prefix removed.
#[must_use]
pub fn relations_nested_under(eager_load: &[WithItem], relation: &str) -> Vec<WithItem> {
    let prefix = format!("{relation}.");
    eager_load
        .iter()
        .filter_map(|item| {
            item.name.strip_prefix(&prefix).map(|rest| WithItem {
                name: rest.to_string(),
                constraints: item.constraints.clone(),
            })
        })
        .collect()
}

/// Loads one top-level relation onto a page of owners.
pub(crate) struct EagerLoader<'a, 'db, M: Model> {
    pub(crate) builder: &'a TinyBuilder<'db, M>,
    pub(crate) constraints: &'a Constraints,
    pub(crate) models: &'a mut [M],
    pub(crate) item: &'a WithItem,
}

impl<M: Model> RelationVisitor<M> for EagerLoader<'_, '_, M> {
    type Output = ();

    fn visit<R: Model>(self) -> Result<()> {
        let name = self.item.name.as_str();
        let info = get_relation_method::<M>(name)?;
        let db = self.builder.connection();

        let mut relation = self
            .constraints
            .without(|enabled| make_relation::<M, R>(db, info, M::default(), enabled));

        let nested = relations_nested_under(self.builder.get_eager_load(), name);
        relation.query_mut().set_eager_load(nested);
        relation.add_eager_constraints(self.models);
        self.item.apply(relation.query_mut().query_mut())?;

        relation.init_relation(self.models, name);
        let results = relation.get_eager()?;

        tracing::debug!(
            target: "tinyorm::eager",
            model = M::base_name(),
            relation = name,
            related = R::base_name(),
            owners = self.models.len(),
            results = results.len(),
            "Eager loaded relation"
        );

        relation.match_models(self.models, results, name);
        Ok(())
    }
}
