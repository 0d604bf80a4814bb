//! Operation construction
//!
//! The engine never constructs operations itself. Callers resolve a kind
//! name through an [`OperationFactory`]; [`OperationRegistry`] is the
//! in-process implementation that builds operations from JSON properties.

use crate::errors::{CommandError, Result};
use crate::operation::{Operation, OperationEntry};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Resolves a requested kind into a fresh operation instance
pub trait OperationFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownOperationKind`] for unregistered kinds
    /// and [`CommandError::InvalidProperties`] when `properties` do not fit.
    fn create(&self, kind: &str, properties: Value) -> Result<Box<dyn Operation>>;

    /// Create and wrap in an entry with a fresh identity
    ///
    /// # Errors
    ///
    /// See [`OperationFactory::create`].
    fn create_entry(&self, kind: &str, properties: Value) -> Result<OperationEntry> {
        Ok(OperationEntry::from_boxed(self.create(kind, properties)?))
    }
}

type Constructor = Box<dyn Fn(Value) -> Result<Box<dyn Operation>> + Send + Sync>;

/// Kind-name to constructor map
#[derive(Default)]
pub struct OperationRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, built by deserializing the properties value
    ///
    /// A `null` properties value is treated as an empty object so that
    /// operations with all-default fields can be created without properties.
    pub fn register<T>(&mut self, kind: &str) -> &mut Self
    where
        T: Operation + DeserializeOwned + 'static,
    {
        let kind_name = kind.to_string();
        self.register_with(kind, move |properties| {
            let properties = match properties {
                Value::Null => Value::Object(Default::default()),
                other => other,
            };
            let operation: T = serde_json::from_value(properties).map_err(|e| {
                CommandError::InvalidProperties {
                    kind: kind_name.clone(),
                    reason: e.to_string(),
                }
            })?;
            Ok(Box::new(operation) as Box<dyn Operation>)
        })
    }

    /// Register an arbitrary constructor
    pub fn register_with<F>(&mut self, kind: &str, constructor: F) -> &mut Self
    where
        F: Fn(Value) -> Result<Box<dyn Operation>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(kind.to_string(), Box::new(constructor));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered kinds in sorted order
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl OperationFactory for OperationRegistry {
    fn create(&self, kind: &str, properties: Value) -> Result<Box<dyn Operation>> {
        let constructor =
            self.constructors
                .get(kind)
                .ok_or_else(|| CommandError::UnknownOperationKind {
                    kind: kind.to_string(),
                })?;
        constructor(properties)
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("kinds", &self.kinds().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OperationResult;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct OpenDocument {
        path: String,
        #[serde(default)]
        read_only: bool,
    }

    #[async_trait]
    impl Operation for OpenDocument {
        fn kind(&self) -> &'static str {
            "open_document"
        }

        fn properties(&self) -> Value {
            json!({ "path": self.path, "read_only": self.read_only })
        }

        async fn execute(&mut self) -> OperationResult {
            Ok(())
        }
    }

    #[derive(Debug, Default, Deserialize)]
    struct Refresh {}

    #[async_trait]
    impl Operation for Refresh {
        fn kind(&self) -> &'static str {
            "refresh"
        }

        async fn execute(&mut self) -> OperationResult {
            Ok(())
        }
    }

    fn registry() -> OperationRegistry {
        let mut registry = OperationRegistry::new();
        registry
            .register::<OpenDocument>("open_document")
            .register::<Refresh>("refresh");
        registry
    }

    #[test]
    fn test_create_applies_properties() {
        let op = registry()
            .create("open_document", json!({ "path": "notes.md" }))
            .unwrap();

        assert_eq!(op.kind(), "open_document");
        assert_eq!(op.properties()["path"], "notes.md");
        assert_eq!(op.properties()["read_only"], false);
    }

    #[test]
    fn test_null_properties_build_default_operation() {
        let entry = registry().create_entry("refresh", Value::Null).unwrap();
        assert_eq!(entry.kind(), "refresh");
    }

    #[test]
    fn test_unknown_kind() {
        let err = registry().create("delete_everything", Value::Null).err();
        assert_eq!(
            err,
            Some(CommandError::UnknownOperationKind {
                kind: "delete_everything".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_properties_name_the_kind() {
        let err = registry()
            .create("open_document", json!({ "path": 7 }))
            .err();
        match err {
            Some(CommandError::InvalidProperties { kind, .. }) => assert_eq!(kind, "open_document"),
            other => panic!("expected InvalidProperties, got {:?}", other),
        }
    }

    #[test]
    fn test_kinds_sorted() {
        let registry = registry();
        let kinds: Vec<_> = registry.kinds().collect();
        assert_eq!(kinds, vec!["open_document", "refresh"]);
        assert!(registry.contains("refresh"));
    }
}
