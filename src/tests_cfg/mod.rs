//! Test documents shared by the unit tests.

#![cfg(test)]

use crate::collection::Collection;
use crate::config::Settings;
use crate::document::Document;
use crate::store::MemoryStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<[f64; 2]>,
}

impl Document for Person {
    const COLLECTION: &'static str = "people";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("name can't be blank".to_string());
        }
        Ok(())
    }
}

pub fn people() -> (Arc<MemoryStore>, Collection<Person>) {
    let store = Arc::new(MemoryStore::new());
    let collection = Collection::new(store.clone(), Arc::new(Settings::default()));
    (store, collection)
}
