//! In-process document store.
//!
//! Collections are insertion-ordered vectors behind an `RwLock`. Used by the
//! test suite and by embedders that want the finders without a database.

use super::{check_changes, generate_id, DocumentStore};
use crate::attributes::Attributes;
use crate::criteria::{Direction, Query};
use crate::document::ID_FIELD;
use crate::error::LifeError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Attributes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents stored in a collection, regardless of any query
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Drop every document in a collection
    pub fn clear(&self, collection: &str) -> Result<(), LifeError> {
        let mut collections = self.write()?;
        collections.remove(collection);
        Ok(())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Vec<Attributes>>>, LifeError> {
        self.collections
            .read()
            .map_err(|_| LifeError::Other("Memory store lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<Attributes>>>, LifeError> {
        self.collections
            .write()
            .map_err(|_| LifeError::Other("Memory store lock poisoned".to_string()))
    }

    /// Positions of matching documents, in query order, before paging
    fn ordered_matches(docs: &[Attributes], query: &Query) -> Vec<usize> {
        let mut positions: Vec<usize> = docs
            .iter()
            .enumerate()
            .filter(|(_, doc)| query.selector.matches(doc))
            .map(|(pos, _)| pos)
            .collect();
        positions.sort_by(|&a, &b| {
            query.compare(&docs[a], &docs[b]).then_with(|| match query.natural {
                Direction::Asc => a.cmp(&b),
                Direction::Desc => b.cmp(&a),
            })
        });
        positions
    }
}

impl DocumentStore for MemoryStore {
    fn select(&self, collection: &str, query: &Query) -> Result<Vec<Attributes>, LifeError> {
        let collections = self.read()?;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let positions = query.page(Self::ordered_matches(docs, query));
        log::debug!("memory select on {collection} matched {} document(s)", positions.len());
        Ok(positions
            .into_iter()
            .map(|pos| query.projection.apply(docs[pos].clone()))
            .collect())
    }

    fn count(&self, collection: &str, query: &Query) -> Result<u64, LifeError> {
        let collections = self.read()?;
        Ok(collections.get(collection).map_or(0, |docs| {
            docs.iter().filter(|doc| query.selector.matches(doc)).count() as u64
        }))
    }

    fn insert(&self, collection: &str, mut document: Attributes) -> Result<Attributes, LifeError> {
        let id = match document.get(ID_FIELD) {
            Some(Value::Null) | None => Value::String(generate_id()),
            Some(id) => id.clone(),
        };
        document.insert(ID_FIELD, id.clone());

        let mut collections = self.write()?;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|doc| doc.get(ID_FIELD) == Some(&id)) {
            return Err(LifeError::QueryError(format!(
                "Duplicate key: {collection} already has a document with _id {id}"
            )));
        }
        docs.push(document.clone());
        log::debug!("memory insert into {collection} with _id {id}");
        Ok(document)
    }

    fn update(
        &self,
        collection: &str,
        query: &Query,
        changes: &Attributes,
        multi: bool,
    ) -> Result<u64, LifeError> {
        check_changes(changes)?;
        let mut collections = self.write()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut positions = query.page(Self::ordered_matches(docs, query));
        if !multi {
            positions.truncate(1);
        }
        for &pos in &positions {
            docs[pos].merge(changes);
        }
        Ok(positions.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use crate::criteria::selector::Condition;
    use serde_json::json;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (name, age) in [("c", 30), ("a", 20), ("b", 20)] {
            store
                .insert("people", attrs! { "name" => name, "age" => age })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_insert_assigns_ids() {
        let store = MemoryStore::new();
        let doc = store.insert("people", attrs! { "name" => "a" }).unwrap();
        assert!(doc.get(ID_FIELD).and_then(Value::as_str).is_some());

        let doc = store
            .insert("people", attrs! { "_id" => "fixed", "name" => "b" })
            .unwrap();
        assert_eq!(doc.get(ID_FIELD), Some(&json!("fixed")));
        assert_eq!(store.len("people"), 2);
    }

    #[test]
    fn test_insert_rejects_duplicate_ids() {
        let store = MemoryStore::new();
        store.insert("people", attrs! { "_id" => "x" }).unwrap();
        let err = store.insert("people", attrs! { "_id" => "x" }).unwrap_err();
        assert!(matches!(err, LifeError::QueryError(_)));
        assert_eq!(store.len("people"), 1);
    }

    #[test]
    fn test_select_orders_by_sort_then_insertion() {
        let store = seeded();
        let query = Query {
            sort: vec![("age".into(), Direction::Asc)],
            ..Query::default()
        };
        let names: Vec<_> = store
            .select("people", &query)
            .unwrap()
            .into_iter()
            .map(|d| d.get("name").cloned().unwrap())
            .collect();
        assert_eq!(names, vec![json!("a"), json!("b"), json!("c")]);

        let names: Vec<_> = store
            .select("people", &query.reversed())
            .unwrap()
            .into_iter()
            .map(|d| d.get("name").cloned().unwrap())
            .collect();
        assert_eq!(names, vec![json!("c"), json!("b"), json!("a")]);
    }

    #[test]
    fn test_count_ignores_paging() {
        let store = seeded();
        let mut query = Query {
            limit: Some(1),
            skip: Some(1),
            ..Query::default()
        };
        query.selector.push(Condition::Eq("age".into(), json!(20)));
        assert_eq!(store.count("people", &query).unwrap(), 2);
        assert_eq!(store.select("people", &query).unwrap().len(), 1);
    }

    #[test]
    fn test_update_single_and_multi() {
        let store = seeded();
        let mut query = Query::default();
        query.selector.push(Condition::Eq("age".into(), json!(20)));

        let changes = attrs! { "status" => "seen" };
        assert_eq!(store.update("people", &query, &changes, false).unwrap(), 1);
        let mut seen = Query::default();
        seen.selector.push(Condition::Eq("status".into(), json!("seen")));
        assert_eq!(store.count("people", &seen).unwrap(), 1);

        assert_eq!(store.update("people", &query, &changes, true).unwrap(), 2);
        assert_eq!(store.count("people", &seen).unwrap(), 2);
    }

    #[test]
    fn test_update_rejects_id_changes() {
        let store = seeded();
        let err = store
            .update("people", &Query::default(), &attrs! { "_id" => "y" }, true)
            .unwrap_err();
        assert!(matches!(err, LifeError::QueryError(_)));
    }

    #[test]
    fn test_unknown_collection_is_empty() {
        let store = MemoryStore::new();
        assert!(store.select("nothing", &Query::default()).unwrap().is_empty());
        assert_eq!(store.count("nothing", &Query::default()).unwrap(), 0);
        assert_eq!(
            store
                .update("nothing", &Query::default(), &attrs! { "a" => 1 }, true)
                .unwrap(),
            0
        );
    }
}
