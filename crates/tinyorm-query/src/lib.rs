//! Fluent SQL query builder for TinyORM Rust.
//!
//! `tinyorm-query` turns method chains into SQL text plus ordered `?` bindings
//! and runs them through a [`DatabaseConnection`].
//!
//! # Role In The Architecture
//!
//! - **Clause model**: [`Builder`] keeps columns, joins, wheres, groups, havings
//!   and orders as data; values go to typed binding compartments.
//! - **Grammar**: [`Grammar`] compiles the clause model for a [`Dialect`]. The
//!   flattened bindings always match placeholder order.
//! - **Connection wrapper**: [`DatabaseConnection`] adds logging, pretend mode,
//!   statement counters and N+1 tracking around a core `Connection`.
//!
//! `tinyorm-model` builds relation queries with this crate; most applications
//! use it through the `tinyorm` facade.

pub mod builder;
pub mod builds_queries;
pub mod clause;
pub mod database;
pub mod grammar;
pub mod join;
pub mod n1_detection;
pub mod testing;
pub mod wheres;

pub use builder::{Builder, CREATED_AT, DEFAULT_PER_PAGE};
pub use builds_queries::BuildsQueries;
pub use clause::{
    Aggregate, BindingType, Bindings, Connective, HavingCondition, JoinType, OrderBy,
    OrderDirection, UpdateItem, WhereColumnItem, WhereCondition, WhereItem, WhereKind,
};
pub use database::{
    ConnectionConfig, DatabaseConnection, DatabaseConnectionBuilder, LoggedQuery,
    StatementsCounter,
};
pub use grammar::{Dialect, Grammar, SqlGrammar};
pub use join::JoinClause;
pub use n1_detection::{CallSite, N1QueryTracker, N1Stats};
pub use testing::MockConnection;
pub use wheres::{BuildsWheres, OPERATORS, WhereGroup, validate_operator};
