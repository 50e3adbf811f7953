//! Document stores: the execution seam under every criteria.
//!
//! A criteria never talks to a database directly. It builds a [`Query`] and
//! hands it to a [`DocumentStore`], which allows the in-memory store and the
//! Postgres store to be used interchangeably.

use crate::attributes::Attributes;
use crate::config::{Backend, Settings};
use crate::connection::connect;
use crate::criteria::Query;
use crate::error::LifeError;
use crate::executor::MayPostgresExecutor;
use std::sync::Arc;

pub mod memory;
pub mod postgres;

pub(crate) mod value_conversion;

#[doc(inline)]
pub use memory::MemoryStore;
#[doc(inline)]
pub use postgres::PostgresStore;

/// Trait for executing document queries
///
/// Implementations must honour the full [`Query`]: selector, near ordering,
/// sort keys, the insertion-order tie-break, skip/limit and projection.
pub trait DocumentStore: Send + Sync {
    /// Read matching documents in query order, paged and projected
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the read fails.
    fn select(&self, collection: &str, query: &Query) -> Result<Vec<Attributes>, LifeError>;

    /// Count matching documents, ignoring skip and limit
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the count fails.
    fn count(&self, collection: &str, query: &Query) -> Result<u64, LifeError>;

    /// Insert a document, assigning `_id` when absent. Returns the stored document.
    ///
    /// # Errors
    ///
    /// Returns `LifeError` on a duplicate `_id` or a write failure.
    fn insert(&self, collection: &str, document: Attributes) -> Result<Attributes, LifeError>;

    /// Merge `changes` into the first matching document (`multi == false`)
    /// or every matching document, returning how many were modified.
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the write fails.
    fn update(
        &self,
        collection: &str,
        query: &Query,
        changes: &Attributes,
        multi: bool,
    ) -> Result<u64, LifeError>;
}

/// Build the store selected by [`Settings::backend`].
///
/// The Postgres backend connects to `settings.database_url`; collection
/// tables are created with [`PostgresStore::ensure_collection`].
pub fn open(settings: &Settings) -> Result<Arc<dyn DocumentStore>, LifeError> {
    match settings.backend {
        Backend::Memory => Ok(Arc::new(MemoryStore::new())),
        Backend::Postgres => {
            let client = connect(&settings.database_url)
                .map_err(|e| LifeError::Other(format!("Connection error: {e}")))?;
            log::info!("opened postgres document store");
            Ok(Arc::new(PostgresStore::new(MayPostgresExecutor::new(client))))
        }
    }
}

/// Identifier assigned to documents inserted without one
pub(crate) fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Changes may never rewrite a document's identifier
pub(crate) fn check_changes(changes: &Attributes) -> Result<(), LifeError> {
    if changes.contains_key(crate::document::ID_FIELD) {
        return Err(LifeError::QueryError(
            "Updates cannot modify the _id field".to_string(),
        ));
    }
    Ok(())
}
