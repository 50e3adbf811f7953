//! The entity-type side of the finders: what a document class must provide.

use crate::attributes::Attributes;
use crate::error::LifeError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Name of the identifier field every stored document carries.
pub const ID_FIELD: &str = "_id";

/// A document class stored in one collection.
///
/// Implementors are plain serde structs. Fields that may be absent from an
/// attribute mapping (including the identifier) should carry
/// `#[serde(default)]` so [`Document::instantiate`] can build partial
/// documents.
///
/// # Example
///
/// ```
/// use lifeguard_finders::Document;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Person {
///     #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
///     id: Option<String>,
///     #[serde(default)]
///     name: String,
/// }
///
/// impl Document for Person {
///     const COLLECTION: &'static str = "people";
///
///     fn id(&self) -> Option<&str> {
///         self.id.as_deref()
///     }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Clone + Debug + Send + 'static {
    /// Collection (table) the documents live in
    const COLLECTION: &'static str;

    /// Identifier, `None` until the document is persisted
    fn id(&self) -> Option<&str>;

    /// Build a new, unsaved document from an attribute mapping
    fn instantiate(attributes: &Attributes) -> Result<Self, LifeError> {
        serde_json::from_value(attributes.clone().into_value()).map_err(|e| {
            LifeError::ParseError(format!(
                "Failed to build {} document from {attributes}: {e}",
                Self::COLLECTION
            ))
        })
    }

    /// Hook run on the create path before the document is written
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Serialize to the attribute mapping handed to a store
    fn to_attributes(&self) -> Result<Attributes, LifeError> {
        let value = serde_json::to_value(self)?;
        Attributes::try_from(value)
    }

    /// Decode a document read back from a store
    fn from_stored(attributes: Attributes) -> Result<Self, LifeError> {
        serde_json::from_value(attributes.into_value()).map_err(|e| {
            LifeError::ParseError(format!("Failed to decode {} document: {e}", Self::COLLECTION))
        })
    }

    /// True once the document has been assigned an identifier by a store
    fn is_persisted(&self) -> bool {
        self.id().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_cfg::Person;

    #[test]
    fn test_instantiate_fills_defaults() {
        let person = Person::instantiate(&crate::attrs! { "name" => "Dev" }).unwrap();
        assert_eq!(person.name, "Dev");
        assert_eq!(person.age, None);
        assert!(!person.is_persisted());
    }

    #[test]
    fn test_instantiate_reports_type_errors() {
        let err = Person::instantiate(&crate::attrs! { "name" => 42 }).unwrap_err();
        assert!(matches!(err, LifeError::ParseError(_)));
        assert!(err.to_string().contains("people"));
    }

    #[test]
    fn test_to_attributes_omits_missing_id() {
        let person = Person::instantiate(&crate::attrs! { "name" => "Dev" }).unwrap();
        let attrs = person.to_attributes().unwrap();
        assert!(!attrs.contains_key(ID_FIELD));
        assert_eq!(attrs.get("name"), Some(&serde_json::json!("Dev")));
    }
}
