//! Core types and traits for TinyORM Rust.
//!
//! `tinyorm-core` is the **foundation layer** for the workspace. It defines the
//! traits and data types that the query builder and the model layer share.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Connection` is implemented by database drivers and test
//!   doubles.
//! - **Data model**: `Value`, `Key`, `Row` and `AttributeItem` carry bindings,
//!   result cells and model attributes.
//! - **Relation metadata**: `RelationshipInfo` is the per-model static table that
//!   names each relation and its kind.
//!
//! # Who Uses This Crate
//!
//! - `tinyorm-query` compiles builders into SQL plus `Value` bindings and runs them
//!   through a `Connection`.
//! - `tinyorm-model` hydrates `Row`s into models and resolves relations from
//!   `RelationshipInfo` tables.
//!
//! Most applications should use the `tinyorm` facade; reach for `tinyorm-core`
//! directly when writing drivers.

pub mod attribute;
pub mod connection;
pub mod error;
pub mod naming;
pub mod relationship;
pub mod row;
pub mod value;

pub use attribute::{
    AttributeItem, attributes, attributes_from_row, attributes_to_json, find_attribute,
    set_attribute,
};
pub use connection::{Connection, StatementResult};
pub use error::{Error, QueryError, Result};
pub use relationship::{RelationshipInfo, RelationshipKind, find_relationship};
pub use row::Row;
pub use value::{Expression, Key, Value};
