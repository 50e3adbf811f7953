//! # Lifeguard Finders
//!
//! Class-level finders for document collections: `find`, `first`, `last`,
//! `find_by`, the find-or-create/initialize family, and chainable criteria
//! (`filter`, `asc`, `limit`, `only`, `sum`, `update_all`, ...) executed
//! against an in-memory store or PostgreSQL JSONB tables through
//! `may_postgres`.
//!
//! ```
//! use lifeguard_finders::{attrs, Collection, Document, Finders, Settings};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Band {
//!     #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
//!     id: Option<String>,
//!     name: String,
//! }
//!
//! impl Document for Band {
//!     const COLLECTION: &'static str = "bands";
//!     fn id(&self) -> Option<&str> {
//!         self.id.as_deref()
//!     }
//! }
//!
//! # fn main() -> Result<(), lifeguard_finders::LifeError> {
//! let settings = Settings::default();
//! let bands: Collection<Band> =
//!     Collection::new(lifeguard_finders::store::open(&settings)?, Arc::new(settings));
//!
//! let first = bands.find_or_create_by(attrs! { "name" => "Depeche Mode" })?;
//! let again = bands.find_or_create_by(attrs! { "name" => "Depeche Mode" })?;
//! assert_eq!(first.id, again.id);
//! assert_eq!(bands.count()?, 1);
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod collection;
pub mod config;
pub mod connection;
pub mod criteria;
pub mod document;
pub mod error;
pub mod executor;
pub mod finders;
pub mod metrics;
pub mod store;

mod tests_cfg;

pub use attributes::Attributes;
pub use collection::Collection;
pub use config::{Backend, Settings};
pub use connection::{connect, ConnectionError};
pub use criteria::{Condition, Criteria, Direction, Find, Found, Query};
pub use document::{Document, ID_FIELD};
pub use error::{DocumentNotFound, LifeError, Lookup};
pub use executor::{LifeExecutor, MayPostgresExecutor};
pub use finders::{Construct, Finders};
pub use store::{DocumentStore, MemoryStore, PostgresStore};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
