//! In-memory model schema
//!
//! [`ModelSchema`] is the stock [`FieldResolver`]: a map of collection name
//! to declared fields, built up front by the application.

use crate::traits::{FieldDeclarations, FieldResolver};
use crate::types::FieldType;
use std::collections::HashMap;

/// Field declarations for a set of collections
#[derive(Debug, Clone, Default)]
pub struct ModelSchema {
    collections: HashMap<String, FieldDeclarations>,
}

impl ModelSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a typed field (builder style)
    pub fn field(mut self, collection: &str, field: &str, ty: FieldType) -> Self {
        self.declare(collection, field, Some(ty));
        self
    }

    /// Declare a field with no type (builder style)
    ///
    /// Untyped fields may back a search index but not a secondary index.
    pub fn untyped_field(mut self, collection: &str, field: &str) -> Self {
        self.declare(collection, field, None);
        self
    }

    /// Declare a field
    pub fn declare(&mut self, collection: &str, field: &str, ty: Option<FieldType>) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(field.to_string(), ty);
    }

    /// Whether `collection` has any declared field
    pub fn contains(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }
}

impl FieldResolver for ModelSchema {
    fn fields_of(&self, collection: &str) -> Option<FieldDeclarations> {
        self.collections.get(collection).cloned()
    }
}
