//! TinyORM for Rust.
//!
//! A fluent SQL query builder and a relation-aware model layer with eager
//! loading. This crate re-exports the workspace crates:
//!
//! - [`tinyorm_core`]: values, rows, errors, the `Connection` contract and
//!   relation metadata.
//! - [`tinyorm_query`]: the query builder, SQL grammars and the connection
//!   wrapper.
//! - [`tinyorm_model`]: models, relations, `TinyBuilder` and eager loading.
//!
//! # Example
//!
//! ```ignore
//! use tinyorm::prelude::*;
//!
//! let db = DatabaseConnection::new(connection);
//!
//! let rows = db
//!     .table("torrents")
//!     .where_("size", ">", 12)?
//!     .order_by_desc("size")
//!     .get(&["id", "name"])?;
//!
//! let torrents = Torrent::with(&db, ["torrentFiles.fileProperty"]).get(&["*"])?;
//! ```

pub use tinyorm_core as core;
pub use tinyorm_model as model;
pub use tinyorm_query as query;

pub use tinyorm_core::{
    AttributeItem, Connection, Error, Expression, Key, QueryError, RelationshipInfo,
    RelationshipKind, Result, Row, StatementResult, Value,
};
pub use tinyorm_model::{
    BelongsTo, HasOneOrMany, HasRelationRegistry, HasTable, Model, ModelBase, Relation,
    RelationObject, RelationSlot, RelationVisitor, TinyBuilder, WithItem, relation_not_found,
};
pub use tinyorm_query::{
    Builder, BuildsQueries, BuildsWheres, ConnectionConfig, DatabaseConnection, Dialect,
    Grammar, JoinClause, MockConnection, SqlGrammar,
};

/// Everything needed to define models and build queries.
pub mod prelude {
    pub use tinyorm_core::{
        AttributeItem, Connection, Error, Expression, Key, RelationshipInfo, Result, Row,
        Value,
    };
    pub use tinyorm_model::{
        HasRelationRegistry, HasTable, Model, ModelBase, RelationSlot, RelationVisitor,
        TinyBuilder, WithItem, relation_not_found,
    };
    pub use tinyorm_query::{
        Builder, BuildsQueries, BuildsWheres, Connective, DatabaseConnection, JoinType,
        OrderDirection, UpdateItem, WhereItem,
    };
}
