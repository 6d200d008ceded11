//! Index specifications, fingerprints, and extension definitions
//!
//! An [`IndexSpec`] or [`SearchIndexSpec`] is what a caller declares. A
//! [`Fingerprint`] is its canonical serialization, persisted in the settings
//! store so a later run can tell whether the declaration changed. An
//! [`ExtensionDefinition`] is what gets registered with the storage engine.
//!
//! # Naming
//!
//! | Kind | Extension name | Settings key |
//! |------|----------------|--------------|
//! | Secondary | `<collection>_IDX` | `<collection>_idx_defn` |
//! | Search | `<collection>_SIDX` | `<collection>_sidx_defn` |

use crate::error::LatticeResult;
use crate::types::{ColumnType, ColumnValue, FieldType, Record};
use std::collections::BTreeMap;
use std::fmt;

/// Version tag attached to every registered extension
pub const EXTENSION_VERSION: &str = "1";

/// Suffix of settings keys holding secondary-index fingerprints
pub const INDEX_SETTINGS_SUFFIX: &str = "_idx_defn";

/// Suffix of settings keys holding search-index fingerprints
pub const SEARCH_SETTINGS_SUFFIX: &str = "_sidx_defn";

/// Extension name of a collection's secondary index
pub fn index_extension_name(collection: &str) -> String {
    format!("{}_IDX", collection)
}

/// Extension name of a collection's search index
pub fn search_extension_name(collection: &str) -> String {
    format!("{}_SIDX", collection)
}

/// Settings key holding a collection's secondary-index fingerprint
pub fn index_settings_key(collection: &str) -> String {
    format!("{}{}", collection, INDEX_SETTINGS_SUFFIX)
}

/// Settings key holding a collection's search-index fingerprint
pub fn search_settings_key(collection: &str) -> String {
    format!("{}{}", collection, SEARCH_SETTINGS_SUFFIX)
}

// ============================================================================
// Specs
// ============================================================================

/// Declared secondary index of one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Collection the index covers
    pub collection: String,
    /// Indexed fields and their declared types
    pub fields: BTreeMap<String, FieldType>,
}

impl IndexSpec {
    /// Create an empty spec
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Merge fields into this spec; later declarations of a field win
    pub fn merge<I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (String, FieldType)>,
    {
        self.fields.extend(fields);
    }

    /// Canonical fingerprint of this spec
    pub fn fingerprint(&self) -> LatticeResult<Fingerprint> {
        Fingerprint::of_index(self)
    }
}

/// Declared full-text search index of one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchIndexSpec {
    /// Collection the index covers
    pub collection: String,
    /// Fields concatenated into the search document, in declaration order
    pub fields: Vec<String>,
}

impl SearchIndexSpec {
    /// Create an empty spec
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            fields: Vec::new(),
        }
    }

    /// Append fields not already present, keeping first-declaration order
    pub fn merge<I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = String>,
    {
        for field in fields {
            if !self.fields.contains(&field) {
                self.fields.push(field);
            }
        }
    }

    /// Canonical fingerprint of this spec
    pub fn fingerprint(&self) -> LatticeResult<Fingerprint> {
        Fingerprint::of_search(self)
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Canonical, order-independent serialization of an index spec
///
/// Secondary indexes serialize as a JSON object with sorted keys
/// (`{"done":"boolean","title":"string"}`); search indexes as a sorted JSON
/// array of field names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of a secondary index spec
    pub fn of_index(spec: &IndexSpec) -> LatticeResult<Self> {
        // BTreeMap serializes with sorted keys
        Ok(Fingerprint(serde_json::to_string(&spec.fields)?))
    }

    /// Fingerprint of a search index spec
    pub fn of_search(spec: &SearchIndexSpec) -> LatticeResult<Self> {
        let mut fields: Vec<&str> = spec.fields.iter().map(String::as_str).collect();
        fields.sort_unstable();
        fields.dedup();
        Ok(Fingerprint(serde_json::to_string(&fields)?))
    }

    /// Wrap a value read back from the settings store
    pub fn from_persisted(value: impl Into<String>) -> Self {
        Fingerprint(value.into())
    }

    /// The serialized form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Extension definitions
// ============================================================================

/// One row of a secondary index: column name to stored value
pub type IndexRow = BTreeMap<String, ColumnValue>;

/// Engine-facing definition of a secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryIndexDefinition {
    /// Collection the index covers
    pub collection: String,
    /// Column name to column type
    pub columns: BTreeMap<String, ColumnType>,
    /// Version tag
    pub version: String,
}

impl SecondaryIndexDefinition {
    /// Build the definition for a spec
    pub fn from_spec(spec: &IndexSpec) -> Self {
        Self {
            collection: spec.collection.clone(),
            columns: spec
                .fields
                .iter()
                .map(|(name, ty)| (name.clone(), ty.column_type()))
                .collect(),
            version: EXTENSION_VERSION.to_string(),
        }
    }

    /// Index row for a record
    ///
    /// Every declared column is present. Missing and null fields are stored
    /// as [`ColumnValue::Null`].
    pub fn row_for(&self, record: &Record) -> IndexRow {
        self.columns
            .keys()
            .map(|column| {
                let value = record
                    .get(column)
                    .map(|v| v.to_column_value())
                    .unwrap_or(ColumnValue::Null);
                (column.clone(), value)
            })
            .collect()
    }
}

/// Engine-facing definition of a full-text search index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchIndexDefinition {
    /// Collection the index covers
    pub collection: String,
    /// Fields concatenated into each document, sorted and unique
    pub fields: Vec<String>,
    /// Version tag
    pub version: String,
}

impl SearchIndexDefinition {
    /// Build the definition for a spec
    ///
    /// Fields are put in the same canonical order the fingerprint uses, so two
    /// specs with equal fingerprints always yield equal definitions.
    pub fn from_spec(spec: &SearchIndexSpec) -> Self {
        let mut fields = spec.fields.clone();
        fields.sort_unstable();
        fields.dedup();
        Self {
            collection: spec.collection.clone(),
            fields,
            version: EXTENSION_VERSION.to_string(),
        }
    }

    /// Search document for a record: stringified non-null values joined by a space
    pub fn document_for(&self, record: &Record) -> String {
        self.fields
            .iter()
            .filter_map(|field| record.get(field).and_then(|v| v.to_search_text()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Definition handed to [`Connection::register_extension`](crate::traits::Connection::register_extension)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionDefinition {
    /// Secondary index over typed columns
    SecondaryIndex(SecondaryIndexDefinition),
    /// Full-text search index
    Search(SearchIndexDefinition),
}

impl ExtensionDefinition {
    /// Collection the extension covers
    pub fn collection(&self) -> &str {
        match self {
            ExtensionDefinition::SecondaryIndex(d) => &d.collection,
            ExtensionDefinition::Search(d) => &d.collection,
        }
    }

    /// Version tag
    pub fn version(&self) -> &str {
        match self {
            ExtensionDefinition::SecondaryIndex(d) => &d.version,
            ExtensionDefinition::Search(d) => &d.version,
        }
    }
}
