//! Registered extension state
//!
//! Each registered extension keeps one entry per object of its collection:
//! - Secondary index: an [`IndexRow`] with one column per declared field
//! - Search index: the concatenated search document
//!
//! Entries are built wholesale on registration and maintained on commit.

use lattice_core::{ColumnValue, ExtensionDefinition, IndexRow, Record};
use std::collections::BTreeMap;

/// Per-object entry of an extension
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEntry {
    /// Secondary index row
    Row(IndexRow),
    /// Search document
    Document(String),
}

/// An extension registered with a [`MemoryConnection`](crate::MemoryConnection)
#[derive(Debug, Clone)]
pub struct RegisteredExtension {
    definition: ExtensionDefinition,
    entries: BTreeMap<String, IndexEntry>,
}

impl RegisteredExtension {
    /// Build the extension over the existing objects of its collection
    pub fn build<'a, I>(definition: ExtensionDefinition, records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut ext = Self {
            definition,
            entries: BTreeMap::new(),
        };
        for record in records {
            ext.apply_put(record);
        }
        ext
    }

    /// The registered definition
    pub fn definition(&self) -> &ExtensionDefinition {
        &self.definition
    }

    /// Number of indexed objects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no object is indexed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index (or re-index) an object; objects of other collections are ignored
    pub fn apply_put(&mut self, record: &Record) {
        if record.collection != self.definition.collection() {
            return;
        }
        let entry = match &self.definition {
            ExtensionDefinition::SecondaryIndex(def) => IndexEntry::Row(def.row_for(record)),
            ExtensionDefinition::Search(def) => IndexEntry::Document(def.document_for(record)),
        };
        self.entries.insert(record.key.clone(), entry);
    }

    /// Drop an object's entry
    pub fn apply_remove(&mut self, collection: &str, key: &str) {
        if collection == self.definition.collection() {
            self.entries.remove(key);
        }
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Secondary index row of an object
    pub fn row(&self, key: &str) -> Option<&IndexRow> {
        match self.entries.get(key) {
            Some(IndexEntry::Row(row)) => Some(row),
            _ => None,
        }
    }

    /// Keys whose `column` holds `value`
    pub fn query(&self, column: &str, value: &ColumnValue) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| match entry {
                IndexEntry::Row(row) if row.get(column) == Some(value) => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Keys whose search document contains `term` as a whole token (case-insensitive)
    pub fn search(&self, term: &str) -> Vec<String> {
        let needle = term.to_lowercase();
        self.entries
            .iter()
            .filter_map(|(key, entry)| match entry {
                IndexEntry::Document(doc) if tokenize(doc).any(|t| t == needle) => {
                    Some(key.clone())
                }
                _ => None,
            })
            .collect()
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}
