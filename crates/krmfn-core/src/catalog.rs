//! In-memory aggregation of loaded catalogs.
//!
//! The manager keeps two maps in lock step: catalog URI to document, and a
//! flattened qualified-name to function-definition index across every
//! loaded catalog. Qualified names are unique across the whole index; a
//! catalog that would collide is rejected before any state changes.

use crate::krm::{FunctionCatalog, FunctionDefinition};
use crate::name::FunctionName;
use crate::store::{CatalogStore, StoreError};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors from catalog index operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The catalog URI is already loaded.
    #[error("catalog '{uri}' already present")]
    AlreadyPresent { uri: String },

    /// The catalog URI is not loaded.
    #[error("catalog '{uri}' not present")]
    NotPresent { uri: String },

    /// A catalog contributed a qualified name the index already holds.
    #[error("catalog contains conflicting function name '{name}'")]
    NameConflict { name: String },

    /// A catalog contained a definition with an empty version list.
    #[error("function '{name}' has no versions")]
    NoVersions { name: String },

    /// Underlying cache or fetch failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The catalog index: loaded documents plus the flattened function map.
pub struct CatalogManager {
    store: CatalogStore,
    catalogs: BTreeMap<String, FunctionCatalog>,
    functions: BTreeMap<String, FunctionDefinition>,
    strict_update_conflicts: bool,
}

impl CatalogManager {
    /// Open the index backed by the catalog cache under `state_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be opened.
    pub fn open(state_dir: &Path) -> Result<Self, CatalogError> {
        Ok(Self {
            store: CatalogStore::open(state_dir)?,
            catalogs: BTreeMap::new(),
            functions: BTreeMap::new(),
            strict_update_conflicts: false,
        })
    }

    /// When set, [`update`](Self::update) also rejects names that collide
    /// with the outgoing document itself, not only with the rest of the
    /// index. Off by default: a catalog may redefine its own names across
    /// versions.
    pub fn set_strict_update_conflicts(&mut self, strict: bool) {
        self.strict_update_conflicts = strict;
    }

    /// The backing store, for persistence.
    #[must_use]
    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Loaded catalogs, keyed by URI.
    #[must_use]
    pub fn catalogs(&self) -> &BTreeMap<String, FunctionCatalog> {
        &self.catalogs
    }

    /// The flattened function index, keyed by qualified name.
    #[must_use]
    pub fn functions(&self) -> &BTreeMap<String, FunctionDefinition> {
        &self.functions
    }

    /// Load the catalog at `uri` into the index, trying the filesystem
    /// cache first and fetching on a cache miss.
    ///
    /// # Errors
    ///
    /// Fails with [`CatalogError::AlreadyPresent`] if the URI is loaded,
    /// with the fetch error if both cache and fetch fail, or with a
    /// validation error from [`add_from_document`](Self::add_from_document).
    pub fn add_from_uri(&mut self, uri: &str) -> Result<(), CatalogError> {
        if self.catalogs.contains_key(uri) {
            return Err(CatalogError::AlreadyPresent { uri: uri.to_string() });
        }

        let catalog = match self.store.load(uri) {
            Ok(catalog) => catalog,
            Err(_) => self.store.fetch(uri)?,
        };

        self.add_from_document(uri, catalog)
    }

    /// Merge an already-decoded catalog into the index.
    ///
    /// Validation is all-or-nothing: every contributed qualified name must
    /// be absent from the index and every definition must carry at least
    /// one version, checked in full before any map write.
    ///
    /// # Errors
    ///
    /// Fails with [`CatalogError::NameConflict`] or
    /// [`CatalogError::NoVersions`] naming the offending function; the
    /// index is left untouched on failure.
    pub fn add_from_document(
        &mut self,
        uri: &str,
        catalog: FunctionCatalog,
    ) -> Result<(), CatalogError> {
        for def in &catalog.spec.krm_functions {
            let name = def.qualified_name();
            if self.functions.contains_key(&name) {
                return Err(CatalogError::NameConflict { name });
            }
            if def.versions.is_empty() {
                return Err(CatalogError::NoVersions { name });
            }
        }

        for def in &catalog.spec.krm_functions {
            self.functions.insert(def.qualified_name(), def.clone());
        }
        self.catalogs.insert(uri.to_string(), catalog);

        Ok(())
    }

    /// Remove the catalog at `uri`, deleting every qualified name it
    /// contributed, and return the removed document.
    ///
    /// # Errors
    ///
    /// Fails with [`CatalogError::NotPresent`] if the URI is not loaded.
    pub fn remove(&mut self, uri: &str) -> Result<FunctionCatalog, CatalogError> {
        let catalog = self
            .catalogs
            .remove(uri)
            .ok_or_else(|| CatalogError::NotPresent { uri: uri.to_string() })?;

        for def in &catalog.spec.krm_functions {
            self.functions.remove(&def.qualified_name());
        }

        Ok(catalog)
    }

    /// Refetch the catalog at `uri` and replace it in the index.
    ///
    /// On any refetch or validation failure the previously loaded document
    /// is reinstated, leaving the index exactly as before the call. The
    /// pre-update document is returned on success.
    ///
    /// # Errors
    ///
    /// Fails with [`CatalogError::NotPresent`] if the URI is not loaded,
    /// or with the refetch/validation error after rolling back.
    pub fn update(&mut self, uri: &str) -> Result<FunctionCatalog, CatalogError> {
        let old = self.remove(uri)?;

        let result = self.store.fetch(uri).map_err(CatalogError::from).and_then(|new| {
            if self.strict_update_conflicts {
                for def in &new.spec.krm_functions {
                    let name = def.qualified_name();
                    if old.spec.krm_functions.iter().any(|o| o.qualified_name() == name) {
                        return Err(CatalogError::NameConflict { name });
                    }
                }
            }
            self.add_from_document(uri, new)
        });

        match result {
            Ok(()) => Ok(old),
            Err(err) => {
                // The old document validated when it was first added, so
                // reinstating it cannot fail against the same index.
                let _ = self.add_from_document(uri, old);
                Err(err)
            }
        }
    }

    /// Update every loaded catalog, best effort.
    ///
    /// Iterates URIs in sorted order; one catalog's failure never blocks
    /// the others. Returns the per-URI outcome for every catalog.
    pub fn update_all(&mut self) -> Vec<(String, Result<FunctionCatalog, CatalogError>)> {
        let uris: Vec<String> = self.catalogs.keys().cloned().collect();
        uris.into_iter()
            .map(|uri| {
                let result = self.update(&uri);
                (uri, result)
            })
            .collect()
    }

    /// Search the index for functions whose qualified name contains the
    /// query's `group/name` as a substring.
    ///
    /// If the query carries a version, each match is returned with its
    /// version list filtered to exact label matches; matches with no
    /// surviving version are dropped. The containment check is optionally
    /// case-insensitive, the version match never is.
    #[must_use]
    pub fn search(&self, query: &str, case_insensitive: bool) -> Vec<FunctionDefinition> {
        let target = FunctionName::parse(query);
        let needle = if case_insensitive {
            target.qualified().to_lowercase()
        } else {
            target.qualified()
        };

        let mut results = Vec::new();
        for def in self.functions.values() {
            let haystack = if case_insensitive {
                def.qualified_name().to_lowercase()
            } else {
                def.qualified_name()
            };
            if !haystack.contains(&needle) {
                continue;
            }

            let mut def = def.clone();
            if target.has_version() {
                def.versions.retain(|v| v.name == target.version);
                if def.versions.is_empty() {
                    continue;
                }
            }
            results.push(def);
        }

        results
    }
}
