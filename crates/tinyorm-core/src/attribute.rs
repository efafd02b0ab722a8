//! Ordered model attributes.
//!
//! Attributes are kept as an ordered list of `(key, value)` pairs rather than a
//! map: insertion order drives the column order of batch inserts and keeps
//! hydrated models in result-column order.

use serde::Serialize;

use crate::row::Row;
use crate::value::Value;

/// A single named attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeItem {
    /// Column name.
    pub key: String,
    /// Current value.
    pub value: Value,
}

impl AttributeItem {
    /// Create a new attribute.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> From<(K, V)> for AttributeItem {
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}

/// Build an attribute list from `(key, value)` pairs.
pub fn attributes<I, K, V>(pairs: I) -> Vec<AttributeItem>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(AttributeItem::from).collect()
}

/// Look up an attribute by key.
#[must_use]
pub fn find_attribute<'a>(items: &'a [AttributeItem], key: &str) -> Option<&'a Value> {
    items.iter().find(|a| a.key == key).map(|a| &a.value)
}

/// Set an attribute, replacing the first entry with the same key or appending.
pub fn set_attribute(items: &mut Vec<AttributeItem>, key: &str, value: Value) {
    if let Some(existing) = items.iter_mut().find(|a| a.key == key) {
        existing.value = value;
    } else {
        items.push(AttributeItem {
            key: key.to_string(),
            value,
        });
    }
}

/// Copy every column of a row into an attribute list, in result order.
#[must_use]
pub fn attributes_from_row(row: &Row) -> Vec<AttributeItem> {
    row.iter()
        .map(|(column, value)| AttributeItem::new(column, value.clone()))
        .collect()
}

/// Render attributes as a JSON object, preserving key order of first appearance.
#[must_use]
pub fn attributes_to_json(items: &[AttributeItem]) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for item in items {
        map.entry(item.key.clone())
            .or_insert_with(|| item.value.to_json());
    }
    map
}
