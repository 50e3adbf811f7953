//! Argument and result shapes of the polymorphic `find`.

use crate::attributes::Attributes;
use serde_json::Value;

/// What `find` was asked for
#[derive(Debug, Clone, PartialEq)]
pub enum Find {
    /// A single identifier
    Id(Value),
    /// Several identifiers, resolved in the order given
    Ids(Vec<Value>),
    /// Every document matching the conditions
    All(Attributes),
    /// The first document matching the conditions
    First(Attributes),
    /// The last document matching the conditions
    Last(Attributes),
}

impl From<&str> for Find {
    fn from(id: &str) -> Self {
        Find::Id(Value::String(id.to_string()))
    }
}

impl From<String> for Find {
    fn from(id: String) -> Self {
        Find::Id(Value::String(id))
    }
}

impl From<Value> for Find {
    fn from(id: Value) -> Self {
        match id {
            Value::Array(ids) => Find::Ids(ids),
            id => Find::Id(id),
        }
    }
}

impl From<Vec<&str>> for Find {
    fn from(ids: Vec<&str>) -> Self {
        Find::Ids(ids.into_iter().map(|id| Value::String(id.to_string())).collect())
    }
}

impl From<Vec<String>> for Find {
    fn from(ids: Vec<String>) -> Self {
        Find::Ids(ids.into_iter().map(Value::String).collect())
    }
}

impl From<Attributes> for Find {
    fn from(conditions: Attributes) -> Self {
        Find::All(conditions)
    }
}

/// What `find` resolved to; the shape follows the request shape
#[derive(Debug, Clone, PartialEq)]
pub enum Found<D> {
    One(D),
    Many(Vec<D>),
    None,
}

impl<D> Found<D> {
    /// The single document, if this is `Found::One`
    pub fn one(self) -> Option<D> {
        match self {
            Found::One(doc) => Some(doc),
            _ => None,
        }
    }

    /// All documents, whatever the shape
    pub fn into_vec(self) -> Vec<D> {
        match self {
            Found::One(doc) => vec![doc],
            Found::Many(docs) => docs,
            Found::None => Vec::new(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Found::None)
    }
}
