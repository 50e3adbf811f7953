//! Criteria: chainable, lazily executed queries over one document class.
//!
//! A `Criteria<D>` is a [`Query`] plus the store it runs against. Chaining
//! methods consume the criteria and return a narrowed copy, so a criteria
//! handed out by a finder is never shared or mutated behind the caller's back.
//! Nothing touches the store until an executing method (`entries`, `count`,
//! `first`, `find`, `sum`, `update`, ...) is called.
//!
//! # Examples
//!
//! ```
//! use lifeguard_finders::{attrs, Collection, Document, Finders, MemoryStore, Settings};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Ticket {
//!     #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
//!     id: Option<String>,
//!     #[serde(default)]
//!     status: String,
//!     #[serde(default)]
//!     priority: i64,
//! }
//!
//! impl Document for Ticket {
//!     const COLLECTION: &'static str = "tickets";
//!     fn id(&self) -> Option<&str> {
//!         self.id.as_deref()
//!     }
//! }
//!
//! # fn main() -> Result<(), lifeguard_finders::LifeError> {
//! let tickets: Collection<Ticket> =
//!     Collection::new(Arc::new(MemoryStore::new()), Arc::new(Settings::default()));
//! tickets.create(attrs! { "status" => "open", "priority" => 2 })?;
//! tickets.create(attrs! { "status" => "open", "priority" => 5 })?;
//!
//! let urgent = tickets
//!     .filter(attrs! { "status" => "open" })
//!     .desc(&["priority"])
//!     .first()?;
//! assert_eq!(urgent.map(|t| t.priority), Some(5));
//! # Ok(())
//! # }
//! ```

pub mod find;
pub mod query;
pub mod selector;

#[doc(inline)]
pub use find::{Find, Found};
#[doc(inline)]
pub use query::{Direction, Near, Projection, Query};
#[doc(inline)]
pub use selector::{CompareOp, Condition, Selector};

use crate::attributes::Attributes;
use crate::config::Settings;
use crate::document::{Document, ID_FIELD};
use crate::error::{DocumentNotFound, LifeError};
use crate::store::DocumentStore;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Chainable query over documents of type `D`
pub struct Criteria<D> {
    store: Arc<dyn DocumentStore>,
    settings: Arc<Settings>,
    query: Query,
    // First malformed condition; reported when the criteria executes
    invalid: Option<String>,
    _phantom: PhantomData<fn() -> D>,
}

impl<D> Clone for Criteria<D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: Arc::clone(&self.settings),
            query: self.query.clone(),
            invalid: self.invalid.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<D: Document> fmt::Debug for Criteria<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Criteria")
            .field("collection", &D::COLLECTION)
            .field("query", &self.query)
            .field("invalid", &self.invalid)
            .finish()
    }
}

impl<D: Document> Criteria<D> {
    /// An unconditioned criteria: every document, insertion order
    pub fn new(store: Arc<dyn DocumentStore>, settings: Arc<Settings>) -> Self {
        Self {
            store,
            settings,
            query: Query::default(),
            invalid: None,
            _phantom: PhantomData,
        }
    }

    /// The query this criteria will run
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn with_conditions(mut self, conditions: Result<Vec<Condition>, LifeError>) -> Self {
        match conditions {
            Ok(conditions) => self.query.selector.extend(conditions),
            Err(e) => {
                if self.invalid.is_none() {
                    self.invalid = Some(e.to_string());
                }
            }
        }
        self
    }

    fn with_condition(mut self, condition: Condition) -> Self {
        self.query.selector.push(condition);
        self
    }

    // ---- narrowing ------------------------------------------------------

    /// Narrow by equality on each attribute (operator documents allowed)
    #[doc(alias = "where")]
    pub fn filter(self, attributes: Attributes) -> Self {
        self.with_conditions(selector::conditions_from(&attributes))
    }

    /// Array field contains every value
    pub fn all_in<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.with_condition(Condition::All(field.to_string(), values))
    }

    /// Field equals any of the values
    pub fn any_in<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.with_condition(Condition::In(field.to_string(), values))
    }

    /// Field equals none of the values
    pub fn not_in<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.with_condition(Condition::NotIn(field.to_string(), values))
    }

    /// Every group of attributes must match
    pub fn all_of(self, groups: Vec<Attributes>) -> Self {
        let conditions = groups
            .iter()
            .map(|group| selector::conditions_from(group).map(Condition::And))
            .collect::<Result<Vec<_>, _>>();
        self.with_conditions(conditions)
    }

    /// At least one group of attributes must match
    pub fn any_of(self, groups: Vec<Attributes>) -> Self {
        let alternatives = groups
            .iter()
            .map(|group| selector::conditions_from(group).map(Condition::And))
            .collect::<Result<Vec<_>, _>>()
            .map(|alternatives| vec![Condition::Or(alternatives)]);
        self.with_conditions(alternatives)
    }

    /// Each attribute must not equal the given value
    pub fn excludes(self, attributes: Attributes) -> Self {
        let conditions = attributes
            .into_iter()
            .map(|(field, value)| Condition::Ne(field, value))
            .collect::<Vec<_>>();
        self.with_conditions(Ok(conditions))
    }

    /// Case-insensitive substring match over top-level string fields
    pub fn search(self, term: &str) -> Self {
        self.with_condition(Condition::Search(term.to_string()))
    }

    /// Keep documents whose `field` is an `[x, y]` point, closest first
    pub fn near(mut self, field: &str, point: [f64; 2]) -> Self {
        self.query.near = Some(Near {
            field: field.to_string(),
            point,
            direction: Direction::Asc,
        });
        self.with_condition(Condition::Point(field.to_string()))
    }

    // ---- ordering and paging --------------------------------------------

    pub fn asc(self, fields: &[&str]) -> Self {
        self.order_fields(fields, Direction::Asc)
    }

    pub fn ascending(self, fields: &[&str]) -> Self {
        self.asc(fields)
    }

    pub fn desc(self, fields: &[&str]) -> Self {
        self.order_fields(fields, Direction::Desc)
    }

    pub fn descending(self, fields: &[&str]) -> Self {
        self.desc(fields)
    }

    pub fn order_by(mut self, keys: &[(&str, Direction)]) -> Self {
        self.query
            .sort
            .extend(keys.iter().map(|(field, direction)| (field.to_string(), *direction)));
        self
    }

    fn order_fields(mut self, fields: &[&str], direction: Direction) -> Self {
        self.query
            .sort
            .extend(fields.iter().map(|field| (field.to_string(), direction)));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.query.skip = Some(skip);
        self
    }

    // ---- shaping --------------------------------------------------------

    /// Read only these fields (plus `_id`)
    pub fn only(mut self, fields: &[&str]) -> Self {
        self.query.projection = Projection::Only(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Read every field except these (`_id` is always read)
    pub fn without(mut self, fields: &[&str]) -> Self {
        self.query.projection = Projection::Without(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Record relations to eager load
    pub fn includes(mut self, relations: &[&str]) -> Self {
        for relation in relations {
            if !self.query.inclusions.iter().any(|r| r == relation) {
                self.query.inclusions.push(relation.to_string());
            }
        }
        self
    }

    /// Raw query options. `limit` and `skip` are applied; anything else is
    /// recorded on the query for the store.
    pub fn extras(mut self, options: Attributes) -> Self {
        for (key, value) in options {
            match (key.as_str(), value.as_u64()) {
                ("limit", Some(n)) => self.query.limit = Some(n),
                ("skip", Some(n)) => self.query.skip = Some(n),
                _ => {
                    self.query.extras.insert(key, value);
                }
            }
        }
        self
    }

    // ---- execution ------------------------------------------------------

    fn run<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&dyn DocumentStore, &Query) -> Result<T, LifeError>,
    ) -> Result<T, LifeError> {
        if let Some(reason) = &self.invalid {
            return Err(LifeError::QueryError(reason.clone()));
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::store_span(operation, D::COLLECTION).entered();
        log::debug!("criteria {operation} on {}", D::COLLECTION);

        let start = Instant::now();
        let result = f(self.store.as_ref(), &self.query);

        let _duration = start.elapsed();
        #[cfg(feature = "metrics")]
        METRICS.record_store_duration(D::COLLECTION, _duration);

        result
    }

    fn decode(docs: Vec<Attributes>) -> Result<Vec<D>, LifeError> {
        docs.into_iter().map(D::from_stored).collect()
    }

    /// Execute and return every matching document
    pub fn entries(&self) -> Result<Vec<D>, LifeError> {
        let docs = self.run("select", |store, query| store.select(D::COLLECTION, query))?;
        Self::decode(docs)
    }

    /// Number of matching documents; skip and limit are ignored
    pub fn count(&self) -> Result<u64, LifeError> {
        self.run("count", |store, query| store.count(D::COLLECTION, &query.unpaged()))
    }

    pub fn is_empty(&self) -> Result<bool, LifeError> {
        Ok(self.count()? == 0)
    }

    /// True when at least one document matches
    pub fn exists(&self) -> Result<bool, LifeError> {
        self.run("exists", |store, query| {
            let probe = Query {
                limit: Some(1),
                projection: Projection::Only(Vec::new()),
                ..query.clone()
            };
            Ok(!store.select(D::COLLECTION, &probe)?.is_empty())
        })
    }

    /// First document in criteria order, `None` when nothing matches
    pub fn first(&self) -> Result<Option<D>, LifeError> {
        let docs = self.run("first", |store, query| {
            let probe = Query {
                limit: Some(1),
                ..query.clone()
            };
            store.select(D::COLLECTION, &probe)
        })?;
        docs.into_iter().next().map(D::from_stored).transpose()
    }

    /// Last document in criteria order, `None` when nothing matches
    pub fn last(&self) -> Result<Option<D>, LifeError> {
        let docs = self.run("last", |store, query| {
            let probe = Query {
                limit: Some(1),
                ..query.reversed()
            };
            store.select(D::COLLECTION, &probe)
        })?;
        docs.into_iter().next().map(D::from_stored).transpose()
    }

    /// Resolve identifiers or conditions.
    ///
    /// A missing identifier fails with [`LifeError::DocumentNotFound`] when
    /// [`Settings::raise_not_found_error`] is set, otherwise it is left out
    /// of the result (`Found::None` for a single identifier).
    pub fn find(self, args: impl Into<Find>) -> Result<Found<D>, LifeError> {
        match args.into() {
            Find::Id(id) => {
                let doc = self.clone().filter_id(id.clone()).first()?;
                match doc {
                    Some(doc) => Ok(Found::One(doc)),
                    None => self.missing(vec![id]).map(|_| Found::None),
                }
            }
            Find::Ids(ids) => {
                let mut wanted: Vec<Value> = Vec::with_capacity(ids.len());
                for id in ids {
                    if !wanted.contains(&id) {
                        wanted.push(id);
                    }
                }
                let stored = self
                    .clone()
                    .any_in(ID_FIELD, wanted.clone())
                    .run("find", |store, query| store.select(D::COLLECTION, query))?;

                let mut found = Vec::with_capacity(wanted.len());
                let mut missing = Vec::new();
                for id in wanted {
                    match stored.iter().find(|doc| doc.get(ID_FIELD) == Some(&id)) {
                        Some(doc) => found.push(D::from_stored(doc.clone())?),
                        None => missing.push(id),
                    }
                }
                if !missing.is_empty() {
                    self.missing(missing)?;
                }
                Ok(Found::Many(found))
            }
            Find::All(conditions) => Ok(Found::Many(self.filter(conditions).entries()?)),
            Find::First(conditions) => Ok(self.filter(conditions).first()?.map_or(Found::None, Found::One)),
            Find::Last(conditions) => Ok(self.filter(conditions).last()?.map_or(Found::None, Found::One)),
        }
    }

    fn filter_id(self, id: Value) -> Self {
        self.with_condition(Condition::Eq(ID_FIELD.to_string(), id))
    }

    fn missing(&self, ids: Vec<Value>) -> Result<(), LifeError> {
        if self.settings.raise_not_found_error {
            #[cfg(feature = "metrics")]
            METRICS.record_not_found(D::COLLECTION);
            return Err(DocumentNotFound::by_ids(D::COLLECTION, ids).into());
        }
        Ok(())
    }

    fn numbers(&self, field: &str) -> Result<Vec<f64>, LifeError> {
        let docs = self.run("aggregate", |store, query| {
            let full = Query {
                projection: Projection::Only(vec![field.to_string()]),
                ..query.clone()
            };
            store.select(D::COLLECTION, &full)
        })?;
        Ok(docs
            .iter()
            .filter_map(|doc| doc.get_path(field).and_then(Value::as_f64))
            .collect())
    }

    /// Sum of the numeric values of `field`; 0 when there are none
    pub fn sum(&self, field: &str) -> Result<f64, LifeError> {
        Ok(self.numbers(field)?.into_iter().sum())
    }

    /// Mean of the numeric values of `field`
    pub fn avg(&self, field: &str) -> Result<Option<f64>, LifeError> {
        let numbers = self.numbers(field)?;
        if numbers.is_empty() {
            return Ok(None);
        }
        Ok(Some(numbers.iter().sum::<f64>() / numbers.len() as f64))
    }

    pub fn min(&self, field: &str) -> Result<Option<f64>, LifeError> {
        Ok(self.numbers(field)?.into_iter().reduce(f64::min))
    }

    pub fn max(&self, field: &str) -> Result<Option<f64>, LifeError> {
        Ok(self.numbers(field)?.into_iter().reduce(f64::max))
    }

    /// Merge `changes` into the first matching document
    pub fn update(&self, changes: Attributes) -> Result<u64, LifeError> {
        self.run("update", |store, query| store.update(D::COLLECTION, query, &changes, false))
    }

    /// Merge `changes` into every matching document
    pub fn update_all(&self, changes: Attributes) -> Result<u64, LifeError> {
        self.run("update_all", |store, query| store.update(D::COLLECTION, query, &changes, true))
    }
}
