//! Integration tests for the class-level finders over the in-memory store.

use fake::faker::name::en::Name;
use fake::Fake;
use lifeguard_finders::{
    attrs, Attributes, Collection, Direction, Document, Find, Finders, Found, LifeError, Lookup,
    MemoryStore, Settings,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Issue {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    points: i64,
}

impl Document for Issue {
    const COLLECTION: &'static str = "issues";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

fn issues_with(settings: Settings) -> (Arc<MemoryStore>, Collection<Issue>) {
    let store = Arc::new(MemoryStore::new());
    let issues = Collection::new(store.clone(), Arc::new(settings));
    (store, issues)
}

fn issues() -> (Arc<MemoryStore>, Collection<Issue>) {
    issues_with(Settings::default())
}

fn seed(issues: &Collection<Issue>) {
    let rows = [
        ("a", "open", 3),
        ("b", "closed", 1),
        ("c", "open", 8),
        ("d", "closed", 5),
        ("e", "open", 2),
    ];
    for (title, status, points) in rows {
        issues
            .create(attrs! { "title" => title, "status" => status, "points" => points })
            .unwrap();
    }
}

fn titles(docs: Vec<Issue>) -> Vec<String> {
    docs.into_iter().map(|i| i.title).collect()
}

#[test]
fn test_empty_collection() {
    let (_, issues) = issues();
    assert_eq!(issues.count().unwrap(), 0);
    assert!(issues.is_empty().unwrap());
    assert!(!issues.exists().unwrap());
    assert!(issues.first().unwrap().is_none());
    assert!(issues.last().unwrap().is_none());
}

#[test]
fn test_filter_counts_matching_documents() {
    let (_, issues) = issues();
    seed(&issues);
    assert_eq!(issues.count().unwrap(), 5);
    assert_eq!(issues.filter(attrs! { "status" => "open" }).count().unwrap(), 3);
}

#[test]
fn test_find_by_missing_carries_collection_and_attributes() {
    let (_, issues) = issues();
    seed(&issues);
    let wanted = attrs! { "title" => "zzz" };
    match issues.find_by(wanted.clone()) {
        Err(LifeError::DocumentNotFound(nf)) => {
            assert_eq!(nf.collection, "issues");
            assert_eq!(nf.lookup, Lookup::Attributes(wanted));
        }
        other => panic!("expected DocumentNotFound, got {other:?}"),
    }
}

#[test]
fn test_find_or_create_then_find_by_returns_the_same_document() {
    let (store, issues) = issues();
    let title: String = Name().fake();
    let wanted = attrs! { "title" => (title.clone()) };

    assert!(issues.find_by(wanted.clone()).unwrap_err().is_not_found());
    let created = issues.find_or_create_by(wanted.clone()).unwrap();
    assert!(created.is_persisted());
    assert_eq!(created.title, title);

    let found = issues.find_by(wanted).unwrap();
    assert_eq!(found, created);
    assert_eq!(store.len(Issue::COLLECTION), 1);
}

#[test]
fn test_find_or_create_twice_creates_once() {
    let (store, issues) = issues();
    let first = issues.find_or_create_by(attrs! { "title" => "Dev" }).unwrap();
    let second = issues.find_or_create_by(attrs! { "title" => "Dev" }).unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(store.len(Issue::COLLECTION), 1);
}

#[test]
fn test_find_or_act_on_a_match_creates_nothing() {
    let (store, issues) = issues();
    seed(&issues);
    let existing = issues.find_by(attrs! { "title" => "c" }).unwrap();

    let created = issues
        .find_or_create_by_with(attrs! { "title" => "c" }, |i| i.points = 99)
        .unwrap();
    let initialized = issues
        .find_or_initialize_by_with(attrs! { "title" => "c" }, |i| i.points = 99)
        .unwrap();

    assert_eq!(created, existing);
    assert_eq!(initialized, existing);
    assert_eq!(store.len(Issue::COLLECTION), 5);
}

#[test]
fn test_find_or_initialize_does_not_persist() {
    let (store, issues) = issues();
    let built = issues
        .find_or_initialize_by_with(attrs! { "title" => "draft" }, |i| i.points = 13)
        .unwrap();
    assert_eq!(built.title, "draft");
    assert_eq!(built.points, 13);
    assert!(!built.is_persisted());
    assert!(issues.find_by(attrs! { "title" => "draft" }).unwrap_err().is_not_found());
    assert_eq!(store.len(Issue::COLLECTION), 0);
}

#[test]
fn test_facade_matches_a_fresh_criteria() {
    let (_, issues) = issues();
    seed(&issues);

    let via_facade = issues.filter(attrs! { "status" => "open" }).entries().unwrap();
    let direct = issues.criteria().filter(attrs! { "status" => "open" }).entries().unwrap();
    assert_eq!(via_facade, direct);

    let via_facade = issues.order_by(&[("points", Direction::Desc)]).limit(2).entries().unwrap();
    let direct = issues
        .criteria()
        .order_by(&[("points", Direction::Desc)])
        .limit(2)
        .entries()
        .unwrap();
    assert_eq!(titles(via_facade.clone()), vec!["c", "d"]);
    assert_eq!(via_facade, direct);

    assert_eq!(issues.sum("points").unwrap(), issues.criteria().sum("points").unwrap());
    assert_eq!(issues.max("points").unwrap(), Some(8.0));
    assert_eq!(issues.min("points").unwrap(), Some(1.0));
    assert_eq!(issues.avg("points").unwrap(), Some(19.0 / 5.0));
}

#[test]
fn test_first_and_last_follow_order() {
    let (_, issues) = issues();
    seed(&issues);
    assert_eq!(issues.first().unwrap().unwrap().title, "a");
    assert_eq!(issues.last().unwrap().unwrap().title, "e");
    assert_eq!(issues.asc(&["points"]).last().unwrap().unwrap().title, "c");
    assert_eq!(issues.desc(&["points"]).first().unwrap().unwrap().title, "c");
}

#[test]
fn test_find_by_ids() {
    let (_, issues) = issues();
    seed(&issues);
    let a = issues.find_by(attrs! { "title" => "a" }).unwrap();
    let c = issues.find_by(attrs! { "title" => "c" }).unwrap();
    let (a_id, c_id) = (a.id.clone().unwrap(), c.id.clone().unwrap());

    match issues.find(a_id.as_str()).unwrap() {
        Found::One(doc) => assert_eq!(doc, a),
        other => panic!("expected one document, got {other:?}"),
    }
    let many = issues.find(vec![c_id.clone(), a_id.clone()]).unwrap().into_vec();
    assert_eq!(titles(many), vec!["c", "a"]);
}

#[test]
fn test_find_missing_id_follows_policy() {
    let (_, raising) = issues();
    let err = raising.find("nope").unwrap_err();
    assert!(matches!(
        err,
        LifeError::DocumentNotFound(ref nf) if matches!(nf.lookup, Lookup::Ids(_))
    ));

    let quiet = Settings {
        raise_not_found_error: false,
        ..Settings::default()
    };
    let (_, lenient) = issues_with(quiet);
    assert!(lenient.find("nope").unwrap().is_none());
    assert!(matches!(lenient.find(Find::First(Attributes::new())).unwrap(), Found::None));
}

#[test]
fn test_update_and_update_all() {
    let (_, issues) = issues();
    seed(&issues);

    let changed = issues.filter(attrs! { "status" => "open" }).update(attrs! { "status" => "triaged" });
    assert_eq!(changed.unwrap(), 1);
    assert_eq!(issues.filter(attrs! { "status" => "triaged" }).count().unwrap(), 1);

    assert_eq!(issues.update_all(attrs! { "status" => "archived" }).unwrap(), 5);
    assert_eq!(issues.filter(attrs! { "status" => "archived" }).count().unwrap(), 5);
}

#[test]
fn test_operator_documents_and_projection() {
    let (_, issues) = issues();
    seed(&issues);

    let big = issues.filter(attrs! { "points" => { "$gte": 5 } }).asc(&["title"]).entries().unwrap();
    assert_eq!(titles(big), vec!["c", "d"]);

    let only_titles = issues.only(&["title"]).asc(&["title"]).first().unwrap().unwrap();
    assert_eq!(only_titles.title, "a");
    assert_eq!(only_titles.points, 0);
    assert!(only_titles.id.is_some());

    let bad = issues.filter(attrs! { "points" => { "$regex": "x" } }).count();
    assert!(matches!(bad, Err(LifeError::QueryError(_))));
}

#[test]
fn test_validation_failure_is_not_persisted() {
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Strict {
        #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        code: String,
    }

    impl Document for Strict {
        const COLLECTION: &'static str = "strict";

        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }

        fn validate(&self) -> Result<(), String> {
            if self.code.len() == 3 {
                Ok(())
            } else {
                Err("code must be three characters".to_string())
            }
        }
    }

    let store = Arc::new(MemoryStore::new());
    let strict: Collection<Strict> = Collection::new(store.clone(), Arc::new(Settings::default()));
    let err = strict.find_or_create_by(attrs! { "code" => "toolong" }).unwrap_err();
    assert!(matches!(err, LifeError::Validation(_)));
    assert_eq!(store.len(Strict::COLLECTION), 0);

    let empty: Attributes = Attributes::new();
    assert!(strict.find_or_initialize_by(empty).is_ok());
}

#[test]
fn test_find_or_create_rejects_undeclared_fields() {
    let (store, issues) = issues();
    let wanted = attrs! { "title" => "Dev", "priority" => "high" };

    for _ in 0..2 {
        let err = issues.find_or_create_by(wanted.clone()).unwrap_err();
        assert!(matches!(err, LifeError::ParseError(ref msg) if msg.contains("priority")));
    }
    assert_eq!(store.len(Issue::COLLECTION), 0);
    assert!(issues.find_or_initialize_by(wanted).is_err());

    let nested = issues.find_or_create_by(attrs! { "title" => "Dev", "meta.owner" => "ops" });
    assert!(matches!(nested, Err(LifeError::ParseError(_))));
    assert_eq!(store.len(Issue::COLLECTION), 0);
}
