//! Materialized rows and attribute bags.

use rusqlite::types::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Ordered column -> value map used for writes and as row storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: BTreeMap<String, Value>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.values.retain(|column, _| keep(column.as_str()));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.values.iter()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Self::new();
        for (column, value) in iter {
            attributes.insert(column, value);
        }
        attributes
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// One entity row plus any eagerly loaded relations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub attributes: Attributes,
    pub relations: BTreeMap<String, Vec<Record>>,
}

impl Record {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes,
            relations: BTreeMap::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.get(column) {
            Some(Value::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Some(Value::Integer(number)) => Some(*number),
            _ => None,
        }
    }

    /// Loaded rows for `name`; empty when the relation was not eager-loaded.
    pub fn related(&self, name: &str) -> &[Record] {
        self.relations.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Keeps only the listed columns. `None` keeps everything.
    pub fn project(mut self, columns: Option<&[String]>) -> Self {
        if let Some(columns) = columns {
            self.attributes
                .retain(|column| columns.iter().any(|wanted| wanted == column));
        }
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (column, value) in &self.attributes {
            object.insert(column.clone(), value_to_json(value));
        }
        for (name, rows) in &self.relations {
            let rows = rows.iter().map(Record::to_json).collect();
            object.insert(name.clone(), serde_json::Value::Array(rows));
        }
        serde_json::Value::Object(object)
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(number) => serde_json::Value::from(*number),
        Value::Real(number) => serde_json::Value::from(*number),
        Value::Text(text) => serde_json::Value::from(text.as_str()),
        Value::Blob(bytes) => serde_json::Value::from(bytes.clone()),
    }
}
