//! Error types for TinyORM.
//!
//! Every fallible operation in the workspace returns [`Result`]. Validation
//! failures (bad operators, unknown relations, ...) are raised before any SQL is
//! sent; execution failures reported by a [`Connection`](crate::Connection)
//! pass through untouched.

use std::fmt;

use crate::value::Value;

/// The primary error type for all TinyORM operations.
#[derive(Debug)]
pub enum Error {
    /// A caller passed an argument the builder cannot accept.
    InvalidArgument(String),
    /// The relation name is not declared on the model.
    RelationNotFound {
        /// Model base name.
        model: String,
        /// Requested relation.
        relation: String,
    },
    /// The relation exists but was never loaded on this instance.
    RelationNotLoaded {
        /// Model base name.
        model: String,
        /// Requested relation.
        relation: String,
    },
    /// A typed relation accessor was called with the wrong related model.
    RelationTypeMismatch {
        /// Model base name.
        model: String,
        /// Requested relation.
        relation: String,
        /// Related model declared by the registry.
        expected: String,
        /// Related model requested by the caller.
        requested: String,
    },
    /// Statement execution failed.
    Query(QueryError),
    /// Connection-level failure.
    Connection(String),
    /// A query that must return a record returned none.
    RecordsNotFound(String),
    /// A query that must return exactly one record returned more.
    MultipleRecordsFound(usize),
    /// Model-level misuse (missing primary key, ...).
    Model(String),
    /// Serialization failure.
    Serde(String),
    /// Anything else.
    Custom(String),
}

/// A failed statement with the SQL and bindings that produced it.
#[derive(Debug, Clone)]
pub struct QueryError {
    /// SQL text sent to the connection.
    pub sql: String,
    /// Bindings sent with it.
    pub bindings: Vec<Value>,
    /// Driver message.
    pub message: String,
}

impl QueryError {
    /// Create a new query error.
    pub fn new(sql: impl Into<String>, bindings: Vec<Value>, message: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
            message: message.into(),
        }
    }
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Whether this error came from the connection rather than validation.
    #[must_use]
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Error::Query(_) | Error::Connection(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            Error::RelationNotFound { model, relation } => write!(
                f,
                "Undefined relation key (in relations) : {relation}, on model {model}"
            ),
            Error::RelationNotLoaded { model, relation } => {
                write!(f, "Relation '{relation}' is not loaded on model {model}")
            }
            Error::RelationTypeMismatch {
                model,
                relation,
                expected,
                requested,
            } => write!(
                f,
                "Relation '{relation}' on model {model} holds {expected}, not {requested}"
            ),
            Error::Query(e) => write!(f, "{} (SQL: {})", e.message, e.sql),
            Error::Connection(msg) => write!(f, "Connection error: {msg}"),
            Error::RecordsNotFound(model) => {
                write!(f, "No query results for model {model}")
            }
            Error::MultipleRecordsFound(count) => {
                write!(f, "{count} records were found, exactly one expected")
            }
            Error::Model(msg) | Error::Serde(msg) | Error::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for TinyORM operations.
pub type Result<T> = std::result::Result<T, Error>;
