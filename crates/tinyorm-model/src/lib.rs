//! Models, relations and eager loading for TinyORM Rust.
//!
//! `tinyorm-model` binds the query builder to model types and resolves
//! relations between them.
//!
//! # Design
//!
//! - **Static registries**: every model declares its relations as a const
//!   table plus a visitor that names the related type per relation. Relation
//!   names are resolved without reflection or `Any`.
//! - **Closed relation set**: `BelongsTo`, `HasOne` and `HasMany`, built by one
//!   factory from the registry entry.
//! - **One query per depth**: eager loading gathers the keys of a whole page of
//!   owners, runs one bulk query per relation and matches results client side.
//! - **Scoped constraints**: constraints are disabled only for the duration of
//!   one relation lookup and restored by a guard.
//!
//! # Example
//!
//! ```ignore
//! let torrents = Torrent::with(&db, ["torrentFiles", "torrentPeer"]).get(&["*"])?;
//! let files = torrents[0].get_relation::<TorrentPreviewableFile>("torrentFiles")?;
//!
//! // Lazy: one query on first access, cached afterwards.
//! let mut peer = TorrentPeer::find_or_fail(&db, 1)?;
//! let torrent = peer.get_relation_value_one::<Torrent>(&db, "torrent")?;
//! ```

pub mod eager;
pub mod model;
pub mod registry;
pub mod relations;
pub mod tiny_builder;

#[cfg(test)]
mod testing;

pub use eager::{Constraint, WithItem, add_nested_withs, relations_nested_under};
pub use model::{HasRelationRegistry, HasTable, Model, ModelBase, RelationSlot};
pub use registry::{
    RelationVisitor, ensure_related, get_relation_method, relation_not_found, resolve_relation,
};
pub use relations::{
    BelongsTo, Constraints, HasOneOrMany, Relation, RelationObject, RelationResults,
    make_relation,
};
pub use tiny_builder::TinyBuilder;
