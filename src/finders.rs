//! Class-level finders.
//!
//! [`Finders`] is the facade a document class exposes: `find`, `first`,
//! `last`, `count`, `find_by`, the find-or-create/initialize family, and a
//! fixed set of query operations forwarded to a fresh criteria.
//!
//! Implementors provide two things: a fresh, unconditioned criteria on every
//! call, and the construction paths (create or initialize). Everything else
//! is provided.
//!
//! # Absence versus failure
//!
//! `first`, `last` and `find_or_initialize_by` report "no match" as `None`
//! (or by building a document). `find_by` is the only finder that fails with
//! [`LifeError::DocumentNotFound`]. `find` defers to the criteria, whose
//! behaviour on a missing identifier is the
//! [`Settings::raise_not_found_error`](crate::Settings) policy. Store errors
//! are never wrapped or retried.

use crate::attributes::Attributes;
use crate::criteria::{Criteria, Direction, Find, Found};
use crate::document::Document;
use crate::error::{DocumentNotFound, LifeError};
use serde_json::Value;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// How a find-or-act call builds a document when nothing matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    /// Build and persist immediately
    Create,
    /// Build without persisting
    Initialize,
}

/// Record a facade call in the logs, metrics and the current trace
macro_rules! finder_call {
    ($op:expr, $collection:expr) => {{
        log::debug!("finder {} on {}", $op, $collection);
        #[cfg(feature = "metrics")]
        METRICS.record_finder_call($op, $collection);
        #[cfg(feature = "tracing")]
        let span = tracing_helpers::finder_span($op, $collection);
        #[cfg(feature = "tracing")]
        let guard = span.entered();
        #[cfg(not(feature = "tracing"))]
        let guard = ();
        guard
    }};
}

pub trait Finders {
    type Document: Document;

    /// A fresh, unconditioned criteria. Must never return a criteria that
    /// was handed out before.
    fn criteria(&self) -> Criteria<Self::Document>;

    /// Build a document from `attributes`, apply `customize`, then persist it
    /// when `strategy` is [`Construct::Create`].
    ///
    /// # Errors
    ///
    /// Propagates decoding, validation and store errors unchanged.
    fn construct<F>(
        &self,
        strategy: Construct,
        attributes: Attributes,
        customize: F,
    ) -> Result<Self::Document, LifeError>
    where
        F: FnOnce(&mut Self::Document);

    // ---- unconditioned finds ----------------------------------------------

    /// Every document, as an unexecuted criteria
    fn all(&self) -> Criteria<Self::Document> {
        self.criteria()
    }

    fn count(&self) -> Result<u64, LifeError> {
        let _call = finder_call!("count", Self::Document::COLLECTION);
        self.criteria().count()
    }

    #[doc(alias = "empty?")]
    fn is_empty(&self) -> Result<bool, LifeError> {
        Ok(self.count()? == 0)
    }

    #[doc(alias = "exists?")]
    fn exists(&self) -> Result<bool, LifeError> {
        let _call = finder_call!("exists", Self::Document::COLLECTION);
        self.criteria().exists()
    }

    /// Delegates to [`Criteria::find`]; the result shape follows the request
    fn find(&self, args: impl Into<Find>) -> Result<Found<Self::Document>, LifeError> {
        let _call = finder_call!("find", Self::Document::COLLECTION);
        self.criteria().find(args)
    }

    fn first(&self) -> Result<Option<Self::Document>, LifeError> {
        let _call = finder_call!("first", Self::Document::COLLECTION);
        self.criteria().first()
    }

    fn last(&self) -> Result<Option<Self::Document>, LifeError> {
        let _call = finder_call!("last", Self::Document::COLLECTION);
        self.criteria().last()
    }

    // ---- attribute finders ------------------------------------------------

    /// First document matching `attributes`.
    ///
    /// # Errors
    ///
    /// [`LifeError::DocumentNotFound`] carrying the collection and the
    /// attributes when nothing matches.
    fn find_by(&self, attributes: Attributes) -> Result<Self::Document, LifeError> {
        let _call = finder_call!("find_by", Self::Document::COLLECTION);
        match self.criteria().filter(attributes.clone()).first()? {
            Some(doc) => Ok(doc),
            None => {
                #[cfg(feature = "metrics")]
                METRICS.record_not_found(Self::Document::COLLECTION);
                Err(DocumentNotFound::by_attributes(Self::Document::COLLECTION, attributes).into())
            }
        }
    }

    /// First document matching `attributes`, or a new persisted one seeded
    /// with them
    fn find_or_create_by(&self, attributes: Attributes) -> Result<Self::Document, LifeError> {
        self.find_or_construct(Construct::Create, attributes, |_| {})
    }

    /// Like [`Finders::find_or_create_by`]; `customize` runs on the new
    /// document before it is persisted, and only when nothing matched
    fn find_or_create_by_with<F>(
        &self,
        attributes: Attributes,
        customize: F,
    ) -> Result<Self::Document, LifeError>
    where
        F: FnOnce(&mut Self::Document),
    {
        self.find_or_construct(Construct::Create, attributes, customize)
    }

    /// First document matching `attributes`, or a new unsaved one seeded with
    /// them
    fn find_or_initialize_by(&self, attributes: Attributes) -> Result<Self::Document, LifeError> {
        self.find_or_construct(Construct::Initialize, attributes, |_| {})
    }

    fn find_or_initialize_by_with<F>(
        &self,
        attributes: Attributes,
        customize: F,
    ) -> Result<Self::Document, LifeError>
    where
        F: FnOnce(&mut Self::Document),
    {
        self.find_or_construct(Construct::Initialize, attributes, customize)
    }

    /// Shared find-or-act step: an existing match is returned untouched,
    /// otherwise the document is built with `strategy`
    fn find_or_construct<F>(
        &self,
        strategy: Construct,
        attributes: Attributes,
        customize: F,
    ) -> Result<Self::Document, LifeError>
    where
        F: FnOnce(&mut Self::Document),
    {
        let operation = match strategy {
            Construct::Create => "find_or_create_by",
            Construct::Initialize => "find_or_initialize_by",
        };
        let _call = finder_call!(operation, Self::Document::COLLECTION);

        if let Some(existing) = self.criteria().filter(attributes.clone()).first()? {
            return Ok(existing);
        }
        self.construct(strategy, attributes, customize)
    }

    // ---- forwarded to a fresh criteria --------------------------------------

    fn all_in<V: Into<Value>>(
        &self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Criteria<Self::Document> {
        self.criteria().all_in(field, values)
    }

    fn all_of(&self, groups: Vec<Attributes>) -> Criteria<Self::Document> {
        self.criteria().all_of(groups)
    }

    fn any_in<V: Into<Value>>(
        &self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Criteria<Self::Document> {
        self.criteria().any_in(field, values)
    }

    fn any_of(&self, groups: Vec<Attributes>) -> Criteria<Self::Document> {
        self.criteria().any_of(groups)
    }

    fn asc(&self, fields: &[&str]) -> Criteria<Self::Document> {
        self.criteria().asc(fields)
    }

    fn ascending(&self, fields: &[&str]) -> Criteria<Self::Document> {
        self.criteria().ascending(fields)
    }

    fn avg(&self, field: &str) -> Result<Option<f64>, LifeError> {
        self.criteria().avg(field)
    }

    fn desc(&self, fields: &[&str]) -> Criteria<Self::Document> {
        self.criteria().desc(fields)
    }

    fn descending(&self, fields: &[&str]) -> Criteria<Self::Document> {
        self.criteria().descending(fields)
    }

    fn excludes(&self, attributes: Attributes) -> Criteria<Self::Document> {
        self.criteria().excludes(attributes)
    }

    fn extras(&self, options: Attributes) -> Criteria<Self::Document> {
        self.criteria().extras(options)
    }

    fn includes(&self, relations: &[&str]) -> Criteria<Self::Document> {
        self.criteria().includes(relations)
    }

    fn limit(&self, limit: u64) -> Criteria<Self::Document> {
        self.criteria().limit(limit)
    }

    fn max(&self, field: &str) -> Result<Option<f64>, LifeError> {
        self.criteria().max(field)
    }

    fn min(&self, field: &str) -> Result<Option<f64>, LifeError> {
        self.criteria().min(field)
    }

    fn not_in<V: Into<Value>>(
        &self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Criteria<Self::Document> {
        self.criteria().not_in(field, values)
    }

    fn only(&self, fields: &[&str]) -> Criteria<Self::Document> {
        self.criteria().only(fields)
    }

    fn order_by(&self, keys: &[(&str, Direction)]) -> Criteria<Self::Document> {
        self.criteria().order_by(keys)
    }

    fn search(&self, term: &str) -> Criteria<Self::Document> {
        self.criteria().search(term)
    }

    fn skip(&self, skip: u64) -> Criteria<Self::Document> {
        self.criteria().skip(skip)
    }

    fn sum(&self, field: &str) -> Result<f64, LifeError> {
        self.criteria().sum(field)
    }

    fn without(&self, fields: &[&str]) -> Criteria<Self::Document> {
        self.criteria().without(fields)
    }

    #[doc(alias = "where")]
    fn filter(&self, attributes: Attributes) -> Criteria<Self::Document> {
        self.criteria().filter(attributes)
    }

    fn update(&self, changes: Attributes) -> Result<u64, LifeError> {
        self.criteria().update(changes)
    }

    fn update_all(&self, changes: Attributes) -> Result<u64, LifeError> {
        self.criteria().update_all(changes)
    }

    fn near(&self, field: &str, point: [f64; 2]) -> Criteria<Self::Document> {
        self.criteria().near(field, point)
    }
}
