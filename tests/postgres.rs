//! Integration tests for the finders over the Postgres document store.
//!
//! These tests require a running PostgreSQL database. Set TEST_DATABASE_URL
//! to run them; they are skipped otherwise.

use lifeguard_finders::{
    attrs, connect, Collection, Document, Finders, LifeError, LifeExecutor, MayPostgresExecutor,
    PostgresStore, Settings,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

// The tests share one table
static DB_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Venue {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    capacity: i64,
    #[serde(default)]
    tags: Vec<String>,
}

impl Document for Venue {
    const COLLECTION: &'static str = "lifeguard_finders_test_venues";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

// Helper to connect, reset the collection table and build a collection
fn setup() -> Option<(MutexGuard<'static, ()>, Collection<Venue>)> {
    let guard = DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping postgres test");
        return None;
    };
    let client = connect(&url).expect("connect to TEST_DATABASE_URL");
    let executor = MayPostgresExecutor::new(client);
    executor
        .execute(&format!("DROP TABLE IF EXISTS {}", Venue::COLLECTION), &[])
        .expect("drop test table");

    let store = PostgresStore::new(executor);
    store.ensure_collection(Venue::COLLECTION).expect("create test table");
    Some((guard, Collection::new(Arc::new(store), Arc::new(Settings::default()))))
}

fn seed(venues: &Collection<Venue>) {
    let rows = [
        ("Arena", "open", 5000),
        ("Barn", "closed", 120),
        ("Cellar", "open", 80),
        ("Dome", "closed", 9000),
        ("Hall", "open", 800),
    ];
    for (name, status, capacity) in rows {
        venues
            .create(attrs! { "name" => name, "status" => status, "capacity" => capacity })
            .unwrap();
    }
}

#[test]
fn test_postgres_finders_end_to_end() {
    let Some((_guard, venues)) = setup() else { return };

    assert_eq!(venues.count().unwrap(), 0);
    assert!(venues.first().unwrap().is_none());
    assert!(!venues.exists().unwrap());

    seed(&venues);
    assert_eq!(venues.filter(attrs! { "status" => "open" }).count().unwrap(), 3);
    assert_eq!(venues.first().unwrap().unwrap().name, "Arena");
    assert_eq!(venues.last().unwrap().unwrap().name, "Hall");

    let largest = venues.desc(&["capacity"]).limit(2).entries().unwrap();
    let names: Vec<_> = largest.into_iter().map(|v| v.name).collect();
    assert_eq!(names, vec!["Dome", "Arena"]);

    let small = venues.filter(attrs! { "capacity" => { "$lt": 500 } }).count().unwrap();
    assert_eq!(small, 2);
    assert_eq!(venues.search("ell").count().unwrap(), 1);
    assert_eq!(venues.max("capacity").unwrap(), Some(9000.0));
}

#[test]
fn test_postgres_find_or_create_and_find_by() {
    let Some((_guard, venues)) = setup() else { return };

    let err = venues.find_by(attrs! { "name" => "Dev" }).unwrap_err();
    assert!(matches!(err, LifeError::DocumentNotFound(_)));

    let first = venues.find_or_create_by(attrs! { "name" => "Dev" }).unwrap();
    let second = venues.find_or_create_by(attrs! { "name" => "Dev" }).unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(venues.count().unwrap(), 1);
    assert_eq!(venues.find_by(attrs! { "name" => "Dev" }).unwrap(), first);

    let duplicate = venues.create(attrs! { "_id" => (first.id.clone()), "name" => "Dup" });
    assert!(matches!(duplicate, Err(LifeError::PostgresError(_))));
}

#[test]
fn test_postgres_updates_and_array_fields() {
    let Some((_guard, venues)) = setup() else { return };
    seed(&venues);

    let changed = venues
        .filter(attrs! { "status" => "open" })
        .asc(&["capacity"])
        .update(attrs! { "tags" => ["small", "cosy"] })
        .unwrap();
    assert_eq!(changed, 1);

    let tagged = venues.filter(attrs! { "tags" => "cosy" }).first().unwrap().unwrap();
    assert_eq!(tagged.name, "Cellar");
    assert_eq!(venues.all_in("tags", ["small", "cosy"]).count().unwrap(), 1);

    assert_eq!(venues.update_all(attrs! { "status" => "archived" }).unwrap(), 5);
    assert_eq!(venues.filter(attrs! { "status" => "archived" }).count().unwrap(), 5);
}
