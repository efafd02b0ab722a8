//! Where-clause construction shared by every builder.
//!
//! [`BuildsWheres`] holds the whole where API as provided methods over two
//! required hooks, so the top-level [`Builder`](crate::Builder), join clauses
//! and nested groups all accept the same calls.
//!
//! Operators are validated against [`OPERATORS`] before anything is pushed; a
//! rejected call leaves the receiver untouched.

use tinyorm_core::{Error, Result, Value};

use crate::clause::{
    Connective, WhereColumnItem, WhereCondition, WhereItem, WhereKind, bindable,
};

/// Comparison operators accepted by `where`, `having` and `on`.
pub const OPERATORS: &[&str] = &[
    "=", "<", ">", "<=", ">=", "<>", "!=", "<=>", "like", "like binary", "not like", "ilike",
    "&", "|", "^", "<<", ">>", "&~", "rlike", "not rlike", "regexp", "not regexp", "~", "~*",
    "!~", "!~*", "similar to", "not similar to", "not ilike", "~~*", "!~~*",
];

/// Normalize and validate a comparison operator.
pub fn validate_operator(operator: &str) -> Result<String> {
    let normalized = operator.trim().to_lowercase();
    if OPERATORS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(Error::invalid_argument(format!(
            "Illegal operator and value combination: {operator}"
        )))
    }
}

fn basic(
    column: &str,
    operator: String,
    value: Value,
    connective: Connective,
) -> (WhereCondition, Vec<Value>) {
    let bindings = bindable([value.clone()]);
    let condition = WhereCondition::new(
        connective,
        WhereKind::Basic {
            column: column.to_string(),
            operator,
            value,
        },
    );
    (condition, bindings)
}

/// Where-clause building.
pub trait BuildsWheres: Sized {
    /// Table that nested groups are scoped to.
    fn table_name(&self) -> &str;

    /// Conditions added so far.
    fn wheres(&self) -> &[WhereCondition];

    /// Append a condition together with the values it binds.
    fn push_where(&mut self, condition: WhereCondition, bindings: Vec<Value>);

    // ------------------------------------------------------------------
    // Basic
    // ------------------------------------------------------------------

    /// Add a `column op value` condition with an explicit connective.
    fn add_where(
        &mut self,
        column: &str,
        operator: &str,
        value: impl Into<Value>,
        connective: Connective,
    ) -> Result<&mut Self> {
        let operator = validate_operator(operator)?;
        let (condition, bindings) = basic(column, operator, value.into(), connective);
        self.push_where(condition, bindings);
        Ok(self)
    }

    /// `and column op value`
    fn where_(
        &mut self,
        column: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.add_where(column, operator, value, Connective::And)
    }

    /// `or column op value`
    fn or_where(
        &mut self,
        column: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.add_where(column, operator, value, Connective::Or)
    }

    /// `and column = value`
    fn where_eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        let (condition, bindings) =
            basic(column, "=".to_string(), value.into(), Connective::And);
        self.push_where(condition, bindings);
        self
    }

    /// `or column = value`
    fn or_where_eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        let (condition, bindings) =
            basic(column, "=".to_string(), value.into(), Connective::Or);
        self.push_where(condition, bindings);
        self
    }

    /// Array form: every item becomes a basic condition inside one nested group.
    ///
    /// Items without their own connective use `connective`.
    fn where_items(&mut self, items: &[WhereItem], connective: Connective) -> Result<&mut Self> {
        let mut operators = Vec::with_capacity(items.len());
        for item in items {
            operators.push(validate_operator(&item.operator)?);
        }

        let mut group = WhereGroup::new(self.table_name());
        for (item, operator) in items.iter().zip(operators) {
            group.add_where(
                &item.column,
                &operator,
                item.value.clone(),
                item.connective.unwrap_or(connective),
            )?;
        }
        Ok(self.add_nested_where(group, connective))
    }

    /// Array form joined with `or`.
    fn or_where_items(&mut self, items: &[WhereItem]) -> Result<&mut Self> {
        self.where_items(items, Connective::Or)
    }

    // ------------------------------------------------------------------
    // Nested
    // ------------------------------------------------------------------

    /// Build a nested group in a closure and attach it with `connective`.
    fn add_where_group<F>(&mut self, connective: Connective, callback: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut WhereGroup) -> Result<()>,
    {
        let mut group = WhereGroup::new(self.table_name());
        callback(&mut group)?;
        Ok(self.add_nested_where(group, connective))
    }

    /// `and ( ... )`
    fn where_group<F>(&mut self, callback: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut WhereGroup) -> Result<()>,
    {
        self.add_where_group(Connective::And, callback)
    }

    /// `or ( ... )`
    fn or_where_group<F>(&mut self, callback: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut WhereGroup) -> Result<()>,
    {
        self.add_where_group(Connective::Or, callback)
    }

    /// `and not ( ... )`
    fn where_not_group<F>(&mut self, callback: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut WhereGroup) -> Result<()>,
    {
        self.add_where_group(Connective::AndNot, callback)
    }

    /// `or not ( ... )`
    fn or_where_not_group<F>(&mut self, callback: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut WhereGroup) -> Result<()>,
    {
        self.add_where_group(Connective::OrNot, callback)
    }

    /// Attach an already built group. An empty group is ignored.
    fn add_nested_where(&mut self, group: WhereGroup, connective: Connective) -> &mut Self {
        if group.wheres.is_empty() {
            return self;
        }
        self.push_where(
            WhereCondition::new(
                connective,
                WhereKind::Nested {
                    wheres: group.wheres,
                },
            ),
            group.bindings,
        );
        self
    }

    // ------------------------------------------------------------------
    // Column comparisons
    // ------------------------------------------------------------------

    /// Compare two columns with an explicit connective.
    fn add_where_column(
        &mut self,
        first: &str,
        operator: &str,
        second: &str,
        connective: Connective,
    ) -> Result<&mut Self> {
        let operator = validate_operator(operator)?;
        self.push_where(
            WhereCondition::new(
                connective,
                WhereKind::Column {
                    first: first.to_string(),
                    operator,
                    second: second.to_string(),
                },
            ),
            Vec::new(),
        );
        Ok(self)
    }

    /// `and first op second`
    fn where_column(&mut self, first: &str, operator: &str, second: &str) -> Result<&mut Self> {
        self.add_where_column(first, operator, second, Connective::And)
    }

    /// `or first op second`
    fn or_where_column(&mut self, first: &str, operator: &str, second: &str) -> Result<&mut Self> {
        self.add_where_column(first, operator, second, Connective::Or)
    }

    /// Array form of `where_column`, grouped like [`where_items`](Self::where_items).
    fn where_columns(
        &mut self,
        items: &[WhereColumnItem],
        connective: Connective,
    ) -> Result<&mut Self> {
        for item in items {
            validate_operator(&item.operator)?;
        }
        let mut group = WhereGroup::new(self.table_name());
        for item in items {
            group.add_where_column(
                &item.first,
                &item.operator,
                &item.second,
                item.connective.unwrap_or(connective),
            )?;
        }
        Ok(self.add_nested_where(group, connective))
    }

    // ------------------------------------------------------------------
    // In / Null / Raw
    // ------------------------------------------------------------------

    /// Add an `in` / `not in` condition.
    fn add_where_in(
        &mut self,
        column: &str,
        values: Vec<Value>,
        connective: Connective,
        not: bool,
    ) -> &mut Self {
        let bindings = bindable(values.iter().cloned());
        let column = column.to_string();
        let kind = if not {
            WhereKind::NotIn { column, values }
        } else {
            WhereKind::In { column, values }
        };
        self.push_where(WhereCondition::new(connective, kind), bindings);
        self
    }

    /// `and column in (...)`
    fn where_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.add_where_in(column, values, Connective::And, false)
    }

    /// `or column in (...)`
    fn or_where_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.add_where_in(column, values, Connective::Or, false)
    }

    /// `and column not in (...)`
    fn where_not_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.add_where_in(column, values, Connective::And, true)
    }

    /// `or column not in (...)`
    fn or_where_not_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.add_where_in(column, values, Connective::Or, true)
    }

    /// Add one `is null` / `is not null` condition per column.
    fn add_where_null(&mut self, columns: &[&str], connective: Connective, not: bool) -> &mut Self {
        for column in columns {
            let column = (*column).to_string();
            let kind = if not {
                WhereKind::NotNull { column }
            } else {
                WhereKind::Null { column }
            };
            self.push_where(WhereCondition::new(connective, kind), Vec::new());
        }
        self
    }

    /// `and column is null`
    fn where_null(&mut self, column: &str) -> &mut Self {
        self.add_where_null(&[column], Connective::And, false)
    }

    /// `or column is null`
    fn or_where_null(&mut self, column: &str) -> &mut Self {
        self.add_where_null(&[column], Connective::Or, false)
    }

    /// `and column is not null`
    fn where_not_null(&mut self, column: &str) -> &mut Self {
        self.add_where_null(&[column], Connective::And, true)
    }

    /// `or column is not null`
    fn or_where_not_null(&mut self, column: &str) -> &mut Self {
        self.add_where_null(&[column], Connective::Or, true)
    }

    /// `and <sql>` with its own bindings.
    fn where_raw(&mut self, sql: &str, bindings: Vec<Value>) -> &mut Self {
        self.push_where(
            WhereCondition::new(
                Connective::And,
                WhereKind::Raw {
                    sql: sql.to_string(),
                },
            ),
            bindable(bindings),
        );
        self
    }

    /// `or <sql>` with its own bindings.
    fn or_where_raw(&mut self, sql: &str, bindings: Vec<Value>) -> &mut Self {
        self.push_where(
            WhereCondition::new(
                Connective::Or,
                WhereKind::Raw {
                    sql: sql.to_string(),
                },
            ),
            bindable(bindings),
        );
        self
    }
}

/// An owned nested where group.
///
/// Built inside `where_group` closures, or composed directly and attached
/// with [`BuildsWheres::add_nested_where`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereGroup {
    table: String,
    wheres: Vec<WhereCondition>,
    bindings: Vec<Value>,
}

impl WhereGroup {
    /// Start an empty group scoped to `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            wheres: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Values bound by the group, in placeholder order.
    #[must_use]
    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    /// Whether nothing was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wheres.is_empty()
    }
}

impl BuildsWheres for WhereGroup {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn wheres(&self) -> &[WhereCondition] {
        &self.wheres
    }

    fn push_where(&mut self, condition: WhereCondition, bindings: Vec<Value>) {
        self.wheres.push(condition);
        self.bindings.extend(bindings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyorm_core::Expression;

    #[test]
    fn test_validate_operator_case_insensitive() {
        assert_eq!(validate_operator("LIKE").unwrap(), "like");
        assert_eq!(validate_operator("Not Similar To").unwrap(), "not similar to");
        assert!(validate_operator("==").is_err());
    }

    #[test]
    fn test_invalid_operator_does_not_mutate() {
        let mut group = WhereGroup::new("torrents");
        assert!(group.where_("size", "===", 1).is_err());
        assert!(group.is_empty());
        assert!(group.bindings().is_empty());
    }

    #[test]
    fn test_where_items_rejects_before_pushing_anything() {
        let mut group = WhereGroup::new("torrents");
        let items = [
            WhereItem::new("size", 13),
            WhereItem::new("size", 14).operator("bogus"),
        ];
        assert!(group.where_items(&items, Connective::And).is_err());
        assert!(group.is_empty());
    }

    #[test]
    fn test_empty_nested_group_is_noop() {
        let mut group = WhereGroup::new("torrents");
        group.where_eq("id", 1);
        group.where_group(|_| Ok(())).unwrap();
        assert_eq!(group.wheres().len(), 1);
        assert_eq!(group.bindings(), &[Value::Int(1)]);
    }

    #[test]
    fn test_nested_group_splices_bindings_in_position() {
        let mut group = WhereGroup::new("torrents");
        group.where_eq("a", 1);
        group
            .or_where_group(|g| {
                g.where_eq("b", 2).where_eq("c", 3);
                Ok(())
            })
            .unwrap();
        group.where_eq("d", 4);
        assert_eq!(
            group.bindings(),
            &[Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]
        );
        assert!(matches!(
            &group.wheres()[1],
            WhereCondition { connective: Connective::Or, kind: WhereKind::Nested { wheres } } if wheres.len() == 2
        ));
    }

    #[test]
    fn test_composed_group_attached_directly() {
        let mut inner = WhereGroup::new("torrents");
        inner.where_null("note");
        let mut outer = WhereGroup::new("torrents");
        outer.add_nested_where(inner, Connective::AndNot);
        assert_eq!(outer.wheres()[0].connective, Connective::AndNot);
    }

    #[test]
    fn test_where_in_skips_expressions_in_bindings() {
        let mut group = WhereGroup::new("torrents");
        group.where_in(
            "id",
            [
                Value::Int(3),
                Value::from(Expression::new("(select 1)")),
                Value::Int(1),
            ],
        );
        assert_eq!(group.bindings(), &[Value::Int(3), Value::Int(1)]);
    }

    #[test]
    fn test_add_where_null_one_condition_per_column() {
        let mut group = WhereGroup::new("torrents");
        group.add_where_null(&["a", "b"], Connective::Or, true);
        assert_eq!(group.wheres().len(), 2);
        assert!(group.bindings().is_empty());
    }
}
