//! `Collection<D>`: the class-level handle for a document type.
//!
//! Binds a document type to a store and settings, implements [`Finders`],
//! and owns the two construction paths the find-or-act finders rely on:
//! `initialize` (build, never persist) and `create` (build, validate,
//! persist).

use crate::attributes::Attributes;
use crate::config::Settings;
use crate::criteria::selector::conditions_from;
use crate::criteria::Criteria;
use crate::document::Document;
use crate::error::LifeError;
use crate::finders::{Construct, Finders};
use crate::store::DocumentStore;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

pub struct Collection<D> {
    store: Arc<dyn DocumentStore>,
    settings: Arc<Settings>,
    _phantom: PhantomData<fn() -> D>,
}

impl<D> Clone for Collection<D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: Arc::clone(&self.settings),
            _phantom: PhantomData,
        }
    }
}

impl<D: Document> fmt::Debug for Collection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &D::COLLECTION)
            .field("settings", &self.settings)
            .finish()
    }
}

impl<D: Document> Collection<D> {
    pub fn new(store: Arc<dyn DocumentStore>, settings: Arc<Settings>) -> Self {
        Self {
            store,
            settings,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build an unsaved document
    pub fn initialize(&self, attributes: Attributes) -> Result<D, LifeError> {
        self.initialize_with(attributes, |_| {})
    }

    /// Build an unsaved document and customize it.
    ///
    /// # Errors
    ///
    /// `LifeError::ParseError` when the document type cannot represent one
    /// of the attributes (an undeclared field, a dotted path), since the
    /// built document would no longer match the mapping it came from.
    pub fn initialize_with<F>(&self, attributes: Attributes, customize: F) -> Result<D, LifeError>
    where
        F: FnOnce(&mut D),
    {
        let mut doc = D::instantiate(&attributes)?;
        let dropped = dropped_fields(&attributes, &doc.to_attributes()?)?;
        if !dropped.is_empty() {
            return Err(LifeError::ParseError(format!(
                "{} documents cannot hold attribute(s) {}",
                D::COLLECTION,
                dropped.join(", ")
            )));
        }
        customize(&mut doc);
        Ok(doc)
    }

    /// Build, validate and persist a document
    pub fn create(&self, attributes: Attributes) -> Result<D, LifeError> {
        self.create_with(attributes, |_| {})
    }

    /// Build a document, customize it, then validate and persist it.
    ///
    /// # Errors
    ///
    /// `LifeError::Validation` when [`Document::validate`] rejects the
    /// document; store errors unchanged.
    pub fn create_with<F>(&self, attributes: Attributes, customize: F) -> Result<D, LifeError>
    where
        F: FnOnce(&mut D),
    {
        let doc = self.initialize_with(attributes, customize)?;
        self.insert(&doc)
    }

    /// Validate and persist an already built document, returning the stored
    /// version (with its identifier)
    pub fn insert(&self, doc: &D) -> Result<D, LifeError> {
        doc.validate().map_err(LifeError::Validation)?;
        let stored = self.store.insert(D::COLLECTION, doc.to_attributes()?)?;
        let doc = D::from_stored(stored)?;

        log::info!(
            "created {} document {}",
            D::COLLECTION,
            doc.id().unwrap_or("<no id>")
        );
        #[cfg(feature = "metrics")]
        METRICS.record_document_created(D::COLLECTION);

        Ok(doc)
    }
}

/// Attributes the built document no longer matches
fn dropped_fields(attributes: &Attributes, built: &Attributes) -> Result<Vec<String>, LifeError> {
    let mut dropped = Vec::new();
    for (field, value) in attributes.iter() {
        let single = Attributes::new().with(field.clone(), value.clone());
        if !conditions_from(&single)?.iter().all(|c| c.matches(built)) {
            dropped.push(field.clone());
        }
    }
    Ok(dropped)
}

impl<D: Document> Finders for Collection<D> {
    type Document = D;

    fn criteria(&self) -> Criteria<D> {
        Criteria::new(Arc::clone(&self.store), Arc::clone(&self.settings))
    }

    fn construct<F>(&self, strategy: Construct, attributes: Attributes, customize: F) -> Result<D, LifeError>
    where
        F: FnOnce(&mut D),
    {
        match strategy {
            Construct::Create => self.create_with(attributes, customize),
            Construct::Initialize => self.initialize_with(attributes, customize),
        }
    }
}
