//! Error types surfaced by finders, criteria and document stores.
//!
//! `LifeError` is the single error type of the crate. Store and execution
//! failures travel through it unchanged; the finder layer adds exactly one
//! typed failure of its own, [`LifeError::DocumentNotFound`].

use crate::attributes::Attributes;
use may_postgres::Error as PostgresError;
use serde_json::Value;
use std::fmt;

/// What a failed lookup was searching for.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Equality attributes passed to `find_by`
    Attributes(Attributes),
    /// Identifiers passed to `find` that had no match
    Ids(Vec<Value>),
}

/// No document matched a lookup that is required to produce one.
///
/// Carries the collection and the searched attributes (or identifiers) so the
/// caller can report a precise message.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentNotFound {
    pub collection: &'static str,
    pub lookup: Lookup,
}

impl DocumentNotFound {
    pub fn by_attributes(collection: &'static str, attributes: Attributes) -> Self {
        Self {
            collection,
            lookup: Lookup::Attributes(attributes),
        }
    }

    pub fn by_ids(collection: &'static str, ids: Vec<Value>) -> Self {
        Self {
            collection,
            lookup: Lookup::Ids(ids),
        }
    }

    /// The attributes searched, when the lookup was attribute based
    pub fn attributes(&self) -> Option<&Attributes> {
        match &self.lookup {
            Lookup::Attributes(attrs) => Some(attrs),
            Lookup::Ids(_) => None,
        }
    }
}

impl fmt::Display for DocumentNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lookup {
            Lookup::Attributes(attrs) => write!(
                f,
                "Document not found for collection {} with attributes {}",
                self.collection, attrs
            ),
            Lookup::Ids(ids) => {
                let ids = ids.iter().map(Value::to_string).collect::<Vec<_>>().join(", ");
                write!(
                    f,
                    "Document not found for collection {} with id(s) {}",
                    self.collection, ids
                )
            }
        }
    }
}

/// `LifeError` error type
#[derive(Debug)]
pub enum LifeError {
    /// `PostgreSQL` error from `may_postgres`
    PostgresError(PostgresError),
    /// Query building or execution error
    QueryError(String),
    /// Document decoding/encoding error
    ParseError(String),
    /// Document rejected by its validation hook on the create path
    Validation(String),
    /// A lookup that must produce a document found none
    DocumentNotFound(DocumentNotFound),
    /// Other execution errors
    Other(String),
}

impl LifeError {
    /// True for [`LifeError::DocumentNotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, LifeError::DocumentNotFound(_))
    }

    /// The not-found context, if this is a not-found failure
    pub fn not_found(&self) -> Option<&DocumentNotFound> {
        match self {
            LifeError::DocumentNotFound(nf) => Some(nf),
            _ => None,
        }
    }
}

impl fmt::Display for LifeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifeError::PostgresError(e) => {
                write!(f, "PostgreSQL error: {e}")
            }
            LifeError::QueryError(s) => {
                write!(f, "Query error: {s}")
            }
            LifeError::ParseError(s) => {
                write!(f, "Parse error: {s}")
            }
            LifeError::Validation(s) => {
                write!(f, "Validation failed: {s}")
            }
            LifeError::DocumentNotFound(nf) => write!(f, "{nf}"),
            LifeError::Other(s) => {
                write!(f, "Execution error: {s}")
            }
        }
    }
}

impl std::error::Error for LifeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LifeError::PostgresError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PostgresError> for LifeError {
    fn from(err: PostgresError) -> Self {
        LifeError::PostgresError(err)
    }
}

impl From<DocumentNotFound> for LifeError {
    fn from(err: DocumentNotFound) -> Self {
        LifeError::DocumentNotFound(err)
    }
}

impl From<serde_json::Error> for LifeError {
    fn from(err: serde_json::Error) -> Self {
        LifeError::ParseError(err.to_string())
    }
}
