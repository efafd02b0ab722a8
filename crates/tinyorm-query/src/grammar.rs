//! SQL compilation.
//!
//! A [`Grammar`] turns a [`Builder`]'s clause model into SQL text. Every
//! method has a provided implementation producing lowercase, `?`-placeholder
//! SQL; a dialect only changes identifier quoting and the insert-or-ignore
//! spelling. Drivers with special needs override individual methods.
//!
//! Clauses are emitted in binding-compartment order (joins, wheres, groups,
//! havings, orders), which keeps [`Bindings::flatten`] aligned with the
//! placeholders.

use std::fmt;

use serde::{Deserialize, Serialize};
use tinyorm_core::Value;

use crate::builder::Builder;
use crate::clause::{BindingType, Bindings, UpdateItem, WhereCondition, WhereKind};
use crate::join::JoinClause;
use crate::wheres::BuildsWheres;

/// SQL dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
    Mysql,
}

impl Dialect {
    /// Identifier quote character.
    #[must_use]
    pub const fn quote_char(self) -> char {
        match self {
            Dialect::Mysql => '`',
            Dialect::Postgres | Dialect::Sqlite => '"',
        }
    }
}

fn concatenate(parts: impl IntoIterator<Item = String>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip the connective of the first condition (`and a = ?` -> `a = ?`).
#[must_use]
pub fn remove_leading_boolean(sql: &str) -> &str {
    sql.strip_prefix("and ")
        .or_else(|| sql.strip_prefix("or "))
        .unwrap_or(sql)
}

/// Compiles builders into SQL.
pub trait Grammar: fmt::Debug {
    /// Dialect used for quoting and insert-or-ignore.
    fn dialect(&self) -> Dialect;

    /// Prefix prepended to every table name.
    fn table_prefix(&self) -> &str {
        ""
    }

    // ------------------------------------------------------------------
    // Identifiers and parameters
    // ------------------------------------------------------------------

    /// Quote one identifier segment. `*` is left alone.
    fn wrap_segment(&self, segment: &str) -> String {
        if segment == "*" {
            return segment.to_string();
        }
        let quote = self.dialect().quote_char();
        let escaped = segment.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    /// Quote a possibly qualified and aliased column (`t.col as c`).
    fn wrap(&self, value: &str) -> String {
        if let Some((column, alias)) = split_alias(value) {
            return format!("{} as {}", self.wrap(column), self.wrap_segment(alias));
        }
        value
            .split('.')
            .map(|segment| self.wrap_segment(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Quote a table name, applying the table prefix.
    fn wrap_table(&self, table: &str) -> String {
        if let Some((name, alias)) = split_alias(table) {
            return format!(
                "{} as {}",
                self.wrap_table(name),
                self.wrap_segment(&format!("{}{alias}", self.table_prefix()))
            );
        }
        self.wrap(&format!("{}{table}", self.table_prefix()))
    }

    /// Comma separated quoted columns.
    fn columnize(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.wrap(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Placeholder for a value; raw expressions are printed verbatim.
    fn parameter(&self, value: &Value) -> String {
        match value {
            Value::Expression(expr) => expr.as_str().to_string(),
            _ => "?".to_string(),
        }
    }

    /// Comma separated placeholders.
    fn parameterize(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|v| self.parameter(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ------------------------------------------------------------------
    // Where
    // ------------------------------------------------------------------

    /// One condition without its connective.
    fn compile_where(&self, condition: &WhereCondition) -> String {
        match &condition.kind {
            WhereKind::Basic {
                column,
                operator,
                value,
            } => format!("{} {operator} {}", self.wrap(column), self.parameter(value)),
            WhereKind::Column {
                first,
                operator,
                second,
            } => format!("{} {operator} {}", self.wrap(first), self.wrap(second)),
            WhereKind::In { column, values } => {
                if values.is_empty() {
                    "0 = 1".to_string()
                } else {
                    format!("{} in ({})", self.wrap(column), self.parameterize(values))
                }
            }
            WhereKind::NotIn { column, values } => {
                if values.is_empty() {
                    "1 = 1".to_string()
                } else {
                    format!(
                        "{} not in ({})",
                        self.wrap(column),
                        self.parameterize(values)
                    )
                }
            }
            WhereKind::Null { column } => format!("{} is null", self.wrap(column)),
            WhereKind::NotNull { column } => format!("{} is not null", self.wrap(column)),
            WhereKind::Nested { wheres } => format!("({})", self.compile_conditions(wheres)),
            WhereKind::Raw { sql } => sql.clone(),
        }
    }

    /// A condition list with the leading connective removed.
    fn compile_conditions(&self, wheres: &[WhereCondition]) -> String {
        let sql = wheres
            .iter()
            .map(|w| format!("{} {}", w.connective, self.compile_where(w)))
            .collect::<Vec<_>>()
            .join(" ");
        remove_leading_boolean(&sql).to_string()
    }

    /// `where ...`, or nothing.
    fn compile_wheres(&self, wheres: &[WhereCondition]) -> String {
        if wheres.is_empty() {
            return String::new();
        }
        format!("where {}", self.compile_conditions(wheres))
    }

    // ------------------------------------------------------------------
    // Select
    // ------------------------------------------------------------------

    /// Column list, or the aggregate call.
    fn compile_columns(&self, query: &Builder<'_>) -> String {
        if let Some(aggregate) = query.get_aggregate() {
            let mut column = self.columnize(&aggregate.columns);
            if query.get_distinct() && column != "*" {
                column = format!("distinct {column}");
            }
            return format!("select {}({column}) as aggregate", aggregate.function);
        }
        let select = if query.get_distinct() {
            "select distinct"
        } else {
            "select"
        };
        let columns = query.get_columns();
        if columns.is_empty() {
            format!("{select} *")
        } else {
            format!("{select} {}", self.columnize(columns))
        }
    }

    /// `inner join t on ...` for each join.
    fn compile_joins(&self, joins: &[JoinClause]) -> String {
        joins
            .iter()
            .map(|join| {
                let table = self.wrap_table(join.table());
                if join.wheres().is_empty() {
                    format!("{} join {table}", join.kind().as_str())
                } else {
                    format!(
                        "{} join {table} on {}",
                        join.kind().as_str(),
                        self.compile_conditions(join.wheres())
                    )
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Full select statement.
    fn compile_select(&self, query: &Builder<'_>) -> String {
        let groups = if query.get_groups().is_empty() {
            String::new()
        } else {
            format!("group by {}", self.columnize(query.get_groups()))
        };
        let havings = if query.get_havings().is_empty() {
            String::new()
        } else {
            let sql = query
                .get_havings()
                .iter()
                .map(|h| {
                    format!(
                        "{} {} {} {}",
                        h.connective,
                        self.wrap(&h.column),
                        h.operator,
                        self.parameter(&h.value)
                    )
                })
                .collect::<Vec<_>>()
                .join(" ");
            format!("having {}", remove_leading_boolean(&sql))
        };
        let orders = if query.get_orders().is_empty() {
            String::new()
        } else {
            let sql = query
                .get_orders()
                .iter()
                .map(|o| format!("{} {}", self.wrap(&o.column), o.direction.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("order by {sql}")
        };

        concatenate([
            self.compile_columns(query),
            format!("from {}", self.wrap_table(query.get_from())),
            self.compile_joins(query.get_joins()),
            self.compile_wheres(query.wheres()),
            groups,
            havings,
            orders,
            query
                .get_limit()
                .map(|n| format!("limit {n}"))
                .unwrap_or_default(),
            query
                .get_offset()
                .map(|n| format!("offset {n}"))
                .unwrap_or_default(),
        ])
    }

    /// `select exists(<select>) as "exists"`
    fn compile_exists(&self, query: &Builder<'_>) -> String {
        format!(
            "select exists({}) as {}",
            self.compile_select(query),
            self.wrap_segment("exists")
        )
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Multi-row insert. Every row is aligned to `columns`.
    fn compile_insert(
        &self,
        query: &Builder<'_>,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> String {
        let table = self.wrap_table(query.get_from());
        if columns.is_empty() {
            return format!("insert into {table} default values");
        }
        let values = rows
            .iter()
            .map(|row| format!("({})", self.parameterize(row)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "insert into {table} ({}) values {values}",
            self.columnize(columns)
        )
    }

    /// Insert that skips rows violating unique constraints.
    fn compile_insert_or_ignore(
        &self,
        query: &Builder<'_>,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> String {
        let insert = self.compile_insert(query, columns, rows);
        match self.dialect() {
            Dialect::Mysql => insert.replacen("insert", "insert ignore", 1),
            Dialect::Sqlite => insert.replacen("insert", "insert or ignore", 1),
            Dialect::Postgres => format!("{insert} on conflict do nothing"),
        }
    }

    /// Single-row insert that reports the generated key.
    fn compile_insert_get_id(
        &self,
        query: &Builder<'_>,
        columns: &[String],
        row: &[Value],
        sequence: Option<&str>,
    ) -> String {
        let insert = self.compile_insert(query, columns, &[row.to_vec()]);
        match self.dialect() {
            Dialect::Postgres => {
                format!("{insert} returning {}", self.wrap(sequence.unwrap_or("id")))
            }
            Dialect::Mysql | Dialect::Sqlite => insert,
        }
    }

    /// `update t [joins] set ... [where ...]`
    fn compile_update(&self, query: &Builder<'_>, values: &[UpdateItem]) -> String {
        let columns = values
            .iter()
            .map(|item| {
                format!(
                    "{} = {}",
                    self.wrap(&item.column),
                    self.parameter(&item.value)
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        concatenate([
            format!("update {}", self.wrap_table(query.get_from())),
            self.compile_joins(query.get_joins()),
            format!("set {columns}"),
            self.compile_wheres(query.wheres()),
        ])
    }

    /// `delete from t [where ...]`, or `delete alias from t joins [where ...]`.
    fn compile_delete(&self, query: &Builder<'_>) -> String {
        let table = self.wrap_table(query.get_from());
        let wheres = self.compile_wheres(query.wheres());
        if query.get_joins().is_empty() {
            return concatenate([format!("delete from {table}"), wheres]);
        }
        let alias = split_alias(query.get_from()).map_or_else(
            || self.wrap_table(query.get_from()),
            |(_, alias)| self.wrap_segment(&format!("{}{alias}", self.table_prefix())),
        );
        concatenate([
            format!("delete {alias} from {table}"),
            self.compile_joins(query.get_joins()),
            wheres,
        ])
    }

    /// Empty the table.
    fn compile_truncate(&self, query: &Builder<'_>) -> String {
        let table = self.wrap_table(query.get_from());
        match self.dialect() {
            Dialect::Sqlite => format!("delete from {table}"),
            Dialect::Postgres | Dialect::Mysql => format!("truncate table {table}"),
        }
    }

    /// Join bindings, then the assigned values, then everything else except
    /// the select compartment.
    fn prepare_bindings_for_update(
        &self,
        bindings: &Bindings,
        values: &[UpdateItem],
    ) -> Vec<Value> {
        let mut prepared = bindings.get(BindingType::Join).to_vec();
        prepared.extend(
            values
                .iter()
                .filter(|item| !item.value.is_expression())
                .map(|item| item.value.clone()),
        );
        prepared.extend(bindings.flatten_except(&[BindingType::Select, BindingType::Join]));
        prepared
    }

    /// Every compartment except select.
    fn prepare_bindings_for_delete(&self, bindings: &Bindings) -> Vec<Value> {
        bindings.flatten_except(&[BindingType::Select])
    }
}

fn split_alias(value: &str) -> Option<(&str, &str)> {
    let lower = value.to_ascii_lowercase();
    lower
        .find(" as ")
        .map(|pos| (value[..pos].trim(), value[pos + 4..].trim()))
}

/// The stock grammar.
#[derive(Debug, Clone, Default)]
pub struct SqlGrammar {
    dialect: Dialect,
    table_prefix: String,
}

impl SqlGrammar {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            table_prefix: String::new(),
        }
    }

    #[must_use]
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }
}

impl Grammar for SqlGrammar {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn table_prefix(&self) -> &str {
        &self.table_prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_qualified_and_star() {
        let g = SqlGrammar::new(Dialect::Postgres);
        assert_eq!(g.wrap("torrents.id"), r#""torrents"."id""#);
        assert_eq!(g.wrap("torrents.*"), r#""torrents".*"#);
        assert_eq!(g.wrap("name AS n"), r#""name" as "n""#);
    }

    #[test]
    fn test_mysql_quotes_with_backticks() {
        let g = SqlGrammar::new(Dialect::Mysql);
        assert_eq!(g.wrap("a.b"), "`a`.`b`");
        assert_eq!(g.wrap_segment("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_wrap_table_applies_prefix() {
        let g = SqlGrammar::new(Dialect::Sqlite).with_table_prefix("app_");
        assert_eq!(g.wrap_table("torrents"), r#""app_torrents""#);
        assert_eq!(g.wrap_table("torrents as t"), r#""app_torrents" as "app_t""#);
    }

    #[test]
    fn test_remove_leading_boolean() {
        assert_eq!(remove_leading_boolean("and a = ?"), "a = ?");
        assert_eq!(remove_leading_boolean("or not (a = ?)"), "not (a = ?)");
        assert_eq!(remove_leading_boolean("a = ?"), "a = ?");
    }

    #[test]
    fn test_prepare_bindings_for_update_order() {
        let g = SqlGrammar::default();
        let mut b = Bindings::default();
        b.push(BindingType::Select, Value::Int(0));
        b.push(BindingType::Where, Value::Int(3));
        b.push(BindingType::Join, Value::Int(1));
        let values = [
            UpdateItem::new("name", "x"),
            UpdateItem::new("size", Value::from(tinyorm_core::Expression::new("size + 1"))),
        ];
        assert_eq!(
            g.prepare_bindings_for_update(&b, &values),
            vec![Value::Int(1), Value::from("x"), Value::Int(3)]
        );
        assert_eq!(
            g.prepare_bindings_for_delete(&b),
            vec![Value::Int(1), Value::Int(3)]
        );
    }
}
