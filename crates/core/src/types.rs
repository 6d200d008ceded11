//! Field, column, and record types
//!
//! Declared field types form a closed set. Each maps to exactly one engine
//! column type, so there is no runtime path for an unknown type:
//!
//! | FieldType | ColumnType | Stored as |
//! |-----------|------------|-----------|
//! | String    | Text       | the string |
//! | Integer   | Integer    | the integer |
//! | Time      | Integer    | seconds since the Unix epoch |
//! | Boolean   | Integer    | `0` or `1` |
//!
//! A null field value is stored as [`ColumnValue::Null`], never omitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Declared type of a model field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 text
    String,
    /// Signed 64-bit integer
    Integer,
    /// Point in time (UTC)
    Time,
    /// true / false
    Boolean,
}

impl FieldType {
    /// Engine column type this field is indexed as
    pub fn column_type(self) -> ColumnType {
        match self {
            FieldType::String => ColumnType::Text,
            FieldType::Integer | FieldType::Time | FieldType::Boolean => ColumnType::Integer,
        }
    }

    /// Lowercase name, as used in fingerprints
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Time => "time",
            FieldType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine column vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Text column
    Text,
    /// Integer column
    Integer,
}

/// A value stored in an index column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnValue {
    /// Explicit null marker
    Null,
    /// Text value
    Text(String),
    /// Integer value
    Integer(i64),
}

impl ColumnValue {
    /// Whether this is the explicit null marker
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }
}

/// A field value on a stored object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum FieldValue {
    /// No value
    #[default]
    Null,
    /// Text
    String(String),
    /// Integer
    Integer(i64),
    /// Point in time
    Time(DateTime<Utc>),
    /// Boolean
    Boolean(bool),
}

impl FieldValue {
    /// Convert into the engine's column vocabulary
    pub fn to_column_value(&self) -> ColumnValue {
        match self {
            FieldValue::Null => ColumnValue::Null,
            FieldValue::String(s) => ColumnValue::Text(s.clone()),
            FieldValue::Integer(n) => ColumnValue::Integer(*n),
            FieldValue::Time(t) => ColumnValue::Integer(t.timestamp()),
            FieldValue::Boolean(b) => ColumnValue::Integer(i64::from(*b)),
        }
    }

    /// Stringified form used by full-text search documents
    ///
    /// Returns `None` for null values.
    pub fn to_search_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::Integer(n) => Some(n.to_string()),
            FieldValue::Time(t) => Some(t.to_rfc3339()),
            FieldValue::Boolean(b) => Some(b.to_string()),
        }
    }

    /// Whether this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(t: DateTime<Utc>) -> Self {
        FieldValue::Time(t)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// A stored object: one row of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Collection the object belongs to
    pub collection: String,
    /// Key, unique within the collection
    pub key: String,
    /// Field values by name
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an object with no fields
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a field (builder style)
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Set a field
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Read a field; absent fields read as `None`
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}
