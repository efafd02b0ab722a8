//! Clause model: plain data describing a statement before compilation.
//!
//! Builders accumulate these values; the [`Grammar`](crate::Grammar) turns them
//! into SQL. Nothing here touches a connection.
//!
//! # Bindings
//!
//! Bound values are kept in nine ordered compartments ([`BindingType`]). The
//! grammar emits clauses in the same order, so flattening the compartments in
//! declaration order yields the placeholder order of the compiled SQL.

use std::fmt;
use std::str::FromStr;

use tinyorm_core::{Error, Value};

// ============================================================================
// Binding compartments
// ============================================================================

/// A binding compartment, in SQL emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    Select,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    Order,
    Union,
    UnionOrder,
}

impl BindingType {
    /// Every compartment, in flattening order.
    pub const ALL: [BindingType; 9] = [
        BindingType::Select,
        BindingType::From,
        BindingType::Join,
        BindingType::Where,
        BindingType::GroupBy,
        BindingType::Having,
        BindingType::Order,
        BindingType::Union,
        BindingType::UnionOrder,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// Name used when parsing a compartment from text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            BindingType::Select => "select",
            BindingType::From => "from",
            BindingType::Join => "join",
            BindingType::Where => "where",
            BindingType::GroupBy => "groupBy",
            BindingType::Having => "having",
            BindingType::Order => "order",
            BindingType::Union => "union",
            BindingType::UnionOrder => "unionOrder",
        }
    }
}

impl FromStr for BindingType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BindingType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::invalid_argument(format!("Invalid binding type: {s}")))
    }
}

/// Bound values grouped by compartment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    compartments: [Vec<Value>; 9],
}

impl Bindings {
    /// Values of one compartment.
    #[must_use]
    pub fn get(&self, ty: BindingType) -> &[Value] {
        &self.compartments[ty.index()]
    }

    /// Append one value to a compartment.
    pub fn push(&mut self, ty: BindingType, value: Value) {
        self.compartments[ty.index()].push(value);
    }

    /// Append several values to a compartment.
    pub fn extend(&mut self, ty: BindingType, values: impl IntoIterator<Item = Value>) {
        self.compartments[ty.index()].extend(values);
    }

    /// Replace the contents of a compartment.
    pub fn set(&mut self, ty: BindingType, values: Vec<Value>) {
        self.compartments[ty.index()] = values;
    }

    /// Empty one compartment.
    pub fn clear(&mut self, ty: BindingType) {
        self.compartments[ty.index()].clear();
    }

    /// Whether every compartment is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compartments.iter().all(Vec::is_empty)
    }

    /// All values in compartment order.
    #[must_use]
    pub fn flatten(&self) -> Vec<Value> {
        self.flatten_except(&[])
    }

    /// All values in compartment order, skipping the listed compartments.
    #[must_use]
    pub fn flatten_except(&self, except: &[BindingType]) -> Vec<Value> {
        BindingType::ALL
            .into_iter()
            .filter(|t| !except.contains(t))
            .flat_map(|t| self.get(t).iter().cloned())
            .collect()
    }

    /// Iterate `(compartment, values)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (BindingType, &[Value])> {
        BindingType::ALL.into_iter().map(|t| (t, self.get(t)))
    }
}

/// Values that are actually bound: raw expressions are printed, not bound.
pub(crate) fn bindable(values: impl IntoIterator<Item = Value>) -> Vec<Value> {
    values.into_iter().filter(|v| !v.is_expression()).collect()
}

// ============================================================================
// Where clauses
// ============================================================================

/// Boolean connective placed before a condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Connective {
    #[default]
    And,
    Or,
    AndNot,
    OrNot,
}

impl Connective {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Connective::And => "and",
            Connective::Or => "or",
            Connective::AndNot => "and not",
            Connective::OrNot => "or not",
        }
    }
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shape of one where condition.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereKind {
    /// `column op ?`
    Basic {
        column: String,
        operator: String,
        value: Value,
    },
    /// `first op second`
    Column {
        first: String,
        operator: String,
        second: String,
    },
    /// `column in (...)`
    In { column: String, values: Vec<Value> },
    /// `column not in (...)`
    NotIn { column: String, values: Vec<Value> },
    /// `column is null`
    Null { column: String },
    /// `column is not null`
    NotNull { column: String },
    /// `( ... )`
    Nested { wheres: Vec<WhereCondition> },
    /// Literal SQL.
    Raw { sql: String },
}

/// A where condition and the connective joining it to the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereCondition {
    pub connective: Connective,
    pub kind: WhereKind,
}

impl WhereCondition {
    #[must_use]
    pub fn new(connective: Connective, kind: WhereKind) -> Self {
        Self { connective, kind }
    }
}

/// One entry of the array form of `where`.
///
/// The operator defaults to `=`. A missing connective inherits the connective
/// passed for the whole array.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereItem {
    pub column: String,
    pub value: Value,
    pub operator: String,
    pub connective: Option<Connective>,
}

impl WhereItem {
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            operator: "=".to_string(),
            connective: None,
        }
    }

    #[must_use]
    pub fn operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    #[must_use]
    pub fn connective(mut self, connective: Connective) -> Self {
        self.connective = Some(connective);
        self
    }

    /// Join this item with `or`.
    #[must_use]
    pub fn or(self) -> Self {
        self.connective(Connective::Or)
    }
}

/// One entry of the array form of `where_column`.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereColumnItem {
    pub first: String,
    pub second: String,
    pub operator: String,
    pub connective: Option<Connective>,
}

impl WhereColumnItem {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
            operator: "=".to_string(),
            connective: None,
        }
    }

    #[must_use]
    pub fn operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    #[must_use]
    pub fn connective(mut self, connective: Connective) -> Self {
        self.connective = Some(connective);
        self
    }

    #[must_use]
    pub fn or(self) -> Self {
        self.connective(Connective::Or)
    }
}

// ============================================================================
// Other clauses
// ============================================================================

/// A `having` condition (`column op ?`).
#[derive(Debug, Clone, PartialEq)]
pub struct HavingCondition {
    pub connective: Connective,
    pub column: String,
    pub operator: String,
    pub value: Value,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

impl FromStr for OrderDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(OrderDirection::Asc),
            "desc" => Ok(OrderDirection::Desc),
            _ => Err(Error::invalid_argument(
                r#"Order direction must be "asc" or "desc", case is not important."#,
            )),
        }
    }
}

/// An `order by` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub direction: OrderDirection,
}

/// One `column = value` assignment of an update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItem {
    pub column: String,
    pub value: Value,
}

impl UpdateItem {
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Join flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Cross => "cross",
        }
    }
}

/// An aggregate select (`count(*) as aggregate`).
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub function: String,
    pub columns: Vec<String>,
}
