//! Index definition store
//!
//! Holds the secondary and search index specs declared against each
//! collection, and one [`DirtyFlag`] per index kind telling the build
//! coordinator that a pass is needed.
//!
//! Declarations accumulate: declaring more fields for a collection merges
//! them into its existing spec. Validation happens before anything is
//! merged, so a rejected declaration leaves the store untouched.

use lattice_core::{
    index_extension_name, search_extension_name, ExtensionDefinition, FieldResolver,
    Fingerprint, IndexSpec, LatticeError, LatticeResult, SearchIndexDefinition, SearchIndexSpec,
    SecondaryIndexDefinition,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

// ============================================================================
// DirtyFlag
// ============================================================================

/// "A rebuild pass is needed" flag
///
/// Every [`mark`](Self::mark) bumps a generation counter. A pass records
/// the generation before snapshotting the specs and clears the flag only if
/// the generation is still the same afterwards, so a declaration racing a
/// pass is never lost.
#[derive(Debug)]
pub struct DirtyFlag {
    dirty: AtomicBool,
    generation: AtomicU64,
}

impl DirtyFlag {
    /// Create a flag in the given state
    pub fn new(dirty: bool) -> Self {
        Self {
            dirty: AtomicBool::new(dirty),
            generation: AtomicU64::new(0),
        }
    }

    /// Whether a pass is needed
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Request a pass
    pub fn mark(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.dirty.store(true, Ordering::Release);
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Clear the flag unless it was marked after `generation` was read
    ///
    /// Returns whether the flag was cleared.
    pub fn clear_if_unchanged(&self, generation: u64) -> bool {
        if self.generation() != generation {
            return false;
        }
        self.dirty.store(false, Ordering::Release);
        // A mark may have landed between the check and the store
        if self.generation() != generation {
            self.dirty.store(true, Ordering::Release);
            return false;
        }
        true
    }
}

impl Default for DirtyFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

// ============================================================================
// ExtensionPlan
// ============================================================================

/// What one collection's extension should look like after a pass
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionPlan {
    /// Collection the extension covers
    pub collection: String,
    /// Fixed extension name (`<collection>_IDX` / `<collection>_SIDX`)
    pub extension: String,
    /// Fingerprint of the declared spec
    pub fingerprint: Fingerprint,
    /// Definition to register
    pub definition: ExtensionDefinition,
}

// ============================================================================
// IndexDefinitionStore
// ============================================================================

/// Declared index specs of one database instance
///
/// Both flags start dirty so the first `execute` always runs a pass, which
/// re-registers extensions persisted by an earlier process.
#[derive(Debug)]
pub struct IndexDefinitionStore {
    indexes: RwLock<BTreeMap<String, IndexSpec>>,
    search_indexes: RwLock<BTreeMap<String, SearchIndexSpec>>,
    indexes_dirty: DirtyFlag,
    search_indexes_dirty: DirtyFlag,
}

impl Default for IndexDefinitionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexDefinitionStore {
    /// Create an empty store with both flags set
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(BTreeMap::new()),
            search_indexes: RwLock::new(BTreeMap::new()),
            indexes_dirty: DirtyFlag::new(true),
            search_indexes_dirty: DirtyFlag::new(true),
        }
    }

    /// Declare a secondary index over `fields` of `collection`
    ///
    /// # Arguments
    /// * `collection` - Collection to index
    /// * `fields` - Field names; each must be declared with a type
    /// * `resolver` - Source of the collection's field declarations
    ///
    /// # Errors
    /// * `UnknownField` - a field is not declared on the collection
    /// * `MissingType` - a field is declared without a type
    pub fn declare_index<I, S>(
        &self,
        collection: &str,
        fields: I,
        resolver: &dyn FieldResolver,
    ) -> LatticeResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let declared = resolver.fields_of(collection).unwrap_or_default();
        let mut typed = Vec::new();
        for field in fields {
            let field = field.as_ref();
            match declared.get(field) {
                None => {
                    return Err(LatticeError::UnknownField {
                        collection: collection.to_string(),
                        field: field.to_string(),
                    })
                }
                Some(None) => {
                    return Err(LatticeError::MissingType {
                        collection: collection.to_string(),
                        field: field.to_string(),
                    })
                }
                Some(Some(ty)) => typed.push((field.to_string(), *ty)),
            }
        }

        debug!(target: "lattice::index", collection = %collection, fields = typed.len(), "Secondary index declared");
        self.indexes
            .write()
            .entry(collection.to_string())
            .or_insert_with(|| IndexSpec::new(collection))
            .merge(typed);
        self.indexes_dirty.mark();
        Ok(())
    }

    /// Declare a full-text search index over `fields` of `collection`
    ///
    /// Fields are concatenated in declaration order. Untyped fields are
    /// accepted.
    ///
    /// # Errors
    /// * `UnknownField` - a field is not declared on the collection
    pub fn declare_search_index<I, S>(
        &self,
        collection: &str,
        fields: I,
        resolver: &dyn FieldResolver,
    ) -> LatticeResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let declared = resolver.fields_of(collection).unwrap_or_default();
        let mut names = Vec::new();
        for field in fields {
            let field = field.as_ref();
            if !declared.contains_key(field) {
                return Err(LatticeError::UnknownField {
                    collection: collection.to_string(),
                    field: field.to_string(),
                });
            }
            names.push(field.to_string());
        }

        debug!(target: "lattice::index", collection = %collection, fields = names.len(), "Search index declared");
        self.search_indexes
            .write()
            .entry(collection.to_string())
            .or_insert_with(|| SearchIndexSpec::new(collection))
            .merge(names);
        self.search_indexes_dirty.mark();
        Ok(())
    }

    /// Declared secondary index of `collection`
    pub fn index_spec(&self, collection: &str) -> Option<IndexSpec> {
        self.indexes.read().get(collection).cloned()
    }

    /// Declared search index of `collection`
    pub fn search_index_spec(&self, collection: &str) -> Option<SearchIndexSpec> {
        self.search_indexes.read().get(collection).cloned()
    }

    /// Collections with a declared secondary index
    pub fn indexed_collections(&self) -> Vec<String> {
        self.indexes.read().keys().cloned().collect()
    }

    /// Collections with a declared search index
    pub fn search_indexed_collections(&self) -> Vec<String> {
        self.search_indexes.read().keys().cloned().collect()
    }

    /// Secondary index plans, one per declared collection
    pub fn index_plans(&self) -> LatticeResult<Vec<ExtensionPlan>> {
        self.indexes
            .read()
            .values()
            .map(|spec| {
                Ok(ExtensionPlan {
                    collection: spec.collection.clone(),
                    extension: index_extension_name(&spec.collection),
                    fingerprint: spec.fingerprint()?,
                    definition: ExtensionDefinition::SecondaryIndex(
                        SecondaryIndexDefinition::from_spec(spec),
                    ),
                })
            })
            .collect()
    }

    /// Search index plans, one per declared collection
    pub fn search_index_plans(&self) -> LatticeResult<Vec<ExtensionPlan>> {
        self.search_indexes
            .read()
            .values()
            .map(|spec| {
                Ok(ExtensionPlan {
                    collection: spec.collection.clone(),
                    extension: search_extension_name(&spec.collection),
                    fingerprint: spec.fingerprint()?,
                    definition: ExtensionDefinition::Search(SearchIndexDefinition::from_spec(
                        spec,
                    )),
                })
            })
            .collect()
    }

    /// Flag of the secondary indexes
    pub fn indexes_dirty(&self) -> &DirtyFlag {
        &self.indexes_dirty
    }

    /// Flag of the search indexes
    pub fn search_indexes_dirty(&self) -> &DirtyFlag {
        &self.search_indexes_dirty
    }

    /// Force a pass of both kinds
    pub fn mark_all_dirty(&self) {
        self.indexes_dirty.mark();
        self.search_indexes_dirty.mark();
    }
}
