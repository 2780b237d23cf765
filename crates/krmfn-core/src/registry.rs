//! The installed-function set and its persistence.
//!
//! A `FunctionManager` owns the catalog index, the config document, and
//! the map of installed functions. Installed entries are trimmed to a
//! single selected version and carry typed install state (pinned flag,
//! artifact locations) that is folded back into annotations at the
//! serialization boundary so the on-disk manifest format stays stable.

use crate::catalog::{CatalogError, CatalogManager};
use crate::config::{Config, ConfigError};
use crate::krm::{
    FunctionCatalog, FunctionDefinition, IGNORE_AUTO_UPDATES, LOCAL_BINARY_LOCATION,
    ORIGIN_BINARY_LOCATION,
};
use crate::name::FunctionName;
use crate::store::StoreError;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Subdirectory of the state directory holding per-function manifests.
pub const FUNCTIONS_DIR: &str = "functions";

/// Filename of the aggregated installed-catalog view.
pub const INSTALLED_FILE: &str = "installed.yaml";

/// Title of the aggregated installed-catalog view.
const INSTALLED_TITLE: &str = "krmfn managed functions";

/// Errors from installed-set operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The function is already in the installed set.
    #[error("function '{name}' already installed")]
    AlreadyInstalled { name: String },

    /// The function is not in the installed set.
    #[error("function '{name}' not installed")]
    NotInstalled { name: String },

    /// No indexed function matched the query.
    #[error("no function matches '{query}'")]
    NotFound { query: String },

    /// More than one indexed function matched the query.
    #[error("more than one function matches '{query}'")]
    AmbiguousMatch { query: String },

    /// The matched function has no release with the requested label.
    #[error("function '{name}' has no version '{version}'")]
    VersionNotFound { name: String, version: String },

    /// The per-function cache entry exists but is unusable.
    #[error("cached manifest for '{name}' is invalid: {reason}")]
    InvalidCache { name: String, reason: String },

    /// Downloading a binary artifact failed.
    #[error("failed to download artifact '{uri}': {reason}")]
    Artifact { uri: String, reason: String },

    /// Catalog index failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Config document failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Catalog cache failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Filesystem failure.
    #[error("function registry IO error: {0}")]
    Io(#[from] io::Error),

    /// A manifest failed to encode or decode.
    #[error("function manifest YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// An installed function: one selected version plus install state.
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledFunction {
    /// The definition, trimmed to exactly one version.
    pub definition: FunctionDefinition,
    /// True when the install named an explicit version; pinned entries are
    /// excluded from automatic updates.
    pub pinned: bool,
    /// `file://` path of the downloaded binary artifact, if any.
    pub local_artifact: Option<String>,
    /// The remote URI the artifact was originally downloaded from.
    pub origin_artifact: Option<String>,
}

impl InstalledFunction {
    /// Build an installed entry from a single-version definition.
    ///
    /// If the definition carries artifact bookkeeping annotations (as
    /// cached manifests do), the primary platform URI is restored to the
    /// origin and the local path is kept aside, so the in-memory entry
    /// always points at the canonical remote location.
    fn from_definition(mut definition: FunctionDefinition, pinned: bool) -> Self {
        let mut local_artifact = None;
        let mut origin_artifact = None;

        let origin = definition
            .annotation(ORIGIN_BINARY_LOCATION)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string);
        if let Some(origin) = origin {
            if let Some(platform) = definition.versions.get_mut(0).and_then(|v| {
                v.runtime.exec.as_mut().and_then(|e| e.platforms.get_mut(0))
            }) {
                local_artifact = Some(platform.uri.clone());
                platform.uri = origin.clone();
            }
            origin_artifact = Some(origin);
        }

        if let Some(meta) = definition.metadata.as_mut() {
            meta.annotations.remove(IGNORE_AUTO_UPDATES);
            meta.annotations.remove(ORIGIN_BINARY_LOCATION);
            meta.annotations.remove(LOCAL_BINARY_LOCATION);
        }

        Self {
            definition,
            pinned,
            local_artifact,
            origin_artifact,
        }
    }

    /// The entry's on-disk manifest form: install state folded back into
    /// annotations, the primary platform URI pointing at the local
    /// artifact when one exists.
    #[must_use]
    pub fn to_manifest(&self) -> FunctionDefinition {
        let mut def = self.definition.clone();
        def.set_annotation(IGNORE_AUTO_UPDATES, if self.pinned { "true" } else { "false" });
        if let (Some(local), Some(origin)) = (&self.local_artifact, &self.origin_artifact) {
            def.set_annotation(LOCAL_BINARY_LOCATION, local);
            def.set_annotation(ORIGIN_BINARY_LOCATION, origin);
            if let Some(platform) = def
                .versions
                .get_mut(0)
                .and_then(|v| v.runtime.exec.as_mut().and_then(|e| e.platforms.get_mut(0)))
            {
                platform.uri = local.clone();
            }
        }
        def
    }

    /// The qualified name this entry is keyed by.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        self.definition.qualified_name()
    }
}

/// The state handle for one command: index, config, and installed set.
pub struct FunctionManager {
    directory: PathBuf,
    catalogs: CatalogManager,
    config: Config,
    installed: BTreeMap<String, InstalledFunction>,
    warnings: Vec<String>,
}

impl FunctionManager {
    /// Open the manager rooted at `directory`, creating the state layout
    /// on first use and loading prior state from `config.yaml`.
    ///
    /// Configured catalogs are loaded cache-first with a network fallback,
    /// and configured dependencies are re-installed from the per-function
    /// cache the same way. Per-item failures do not abort the open; they
    /// are collected and available via [`take_warnings`](Self::take_warnings).
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be created or the
    /// config document is unreadable.
    pub fn open(directory: &Path) -> Result<Self, RegistryError> {
        // A manifest swap interrupted between its two renames leaves the
        // previous tree stranded as `functions.bak`; restore it. A `.bak`
        // next to a live tree is leftover from a completed swap.
        let live = directory.join(FUNCTIONS_DIR);
        let bak = directory.join("functions.bak");
        if bak.exists() {
            if live.exists() {
                fs::remove_dir_all(&bak)?;
            } else {
                fs::rename(&bak, &live)?;
            }
        }
        fs::create_dir_all(&live)?;

        let config = Config::load(directory)?;
        let catalogs = CatalogManager::open(directory)?;

        let mut manager = Self {
            directory: directory.to_path_buf(),
            catalogs,
            config: config.clone(),
            installed: BTreeMap::new(),
            warnings: Vec::new(),
        };

        for uri in &config.catalogs {
            if let Err(err) = manager.catalogs.add_from_uri(uri) {
                manager.warnings.push(format!("failed to load catalog '{uri}': {err}"));
            }
        }

        for query in &config.dependencies.krm_functions {
            if let Err(err) = manager.install(query) {
                manager.warnings.push(format!("failed to load function '{query}': {err}"));
            }
        }

        Ok(manager)
    }

    /// The state directory this manager persists into.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The catalog index.
    #[must_use]
    pub fn catalogs(&self) -> &CatalogManager {
        &self.catalogs
    }

    /// Mutable access to the catalog index, for catalog add/remove/update.
    pub fn catalogs_mut(&mut self) -> &mut CatalogManager {
        &mut self.catalogs
    }

    /// The installed set, keyed by qualified name.
    #[must_use]
    pub fn installed(&self) -> &BTreeMap<String, InstalledFunction> {
        &self.installed
    }

    /// Drain the warnings collected while opening prior state.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Install the function named by `query`.
    ///
    /// Tries the per-function cache first, then resolves the query against
    /// the catalog index, requiring exactly one match. An explicit
    /// `@version` selects that release and pins the entry; otherwise the
    /// highest release by lexicographic label is selected unpinned.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistryError::AlreadyInstalled`], or with
    /// [`RegistryError::NotFound`] / [`RegistryError::AmbiguousMatch`] /
    /// [`RegistryError::VersionNotFound`] from resolution.
    pub fn install(&mut self, query: &str) -> Result<InstalledFunction, RegistryError> {
        let name = FunctionName::parse(query);
        if self.installed.contains_key(&name.qualified()) {
            return Err(RegistryError::AlreadyInstalled { name: name.qualified() });
        }

        let entry = match self.load_cached(&name) {
            Ok(entry) => entry,
            Err(_) => self.resolve_external(&name)?,
        };

        // A partial query can resolve to a different qualified name than
        // it was typed as; re-check under the resolved key.
        let key = entry.qualified_name();
        if self.installed.contains_key(&key) {
            return Err(RegistryError::AlreadyInstalled { name: key });
        }

        self.installed.insert(key, entry.clone());
        Ok(entry)
    }

    /// Remove the function named by `query` and return the removed entry.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistryError::NotInstalled`] if the qualified name is
    /// absent.
    pub fn remove(&mut self, query: &str) -> Result<InstalledFunction, RegistryError> {
        let name = FunctionName::parse(query);
        self.installed
            .remove(&name.qualified())
            .ok_or_else(|| RegistryError::NotInstalled { name: name.qualified() })
    }

    /// Update the function named by `query` to its latest release.
    ///
    /// Pinned entries are deliberately excluded: the call succeeds with
    /// `None` and leaves the entry untouched. For unpinned entries the
    /// query is re-resolved against the index; on failure the prior entry
    /// is restored unchanged and the error surfaced. Returns the replaced
    /// entry on success.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistryError::NotInstalled`], or with a resolution
    /// error after restoring the prior entry.
    pub fn update(&mut self, query: &str) -> Result<Option<InstalledFunction>, RegistryError> {
        let name = FunctionName::parse(query);
        let key = name.qualified();
        let old = self
            .installed
            .remove(&key)
            .ok_or_else(|| RegistryError::NotInstalled { name: key.clone() })?;

        if old.pinned {
            self.installed.insert(key, old);
            return Ok(None);
        }

        let unpinned = FunctionName::parse(&key);
        match self.resolve_external(&unpinned) {
            Ok(new) => {
                self.installed.insert(new.qualified_name(), new);
                Ok(Some(old))
            }
            Err(err) => {
                self.installed.insert(key, old);
                Err(err)
            }
        }
    }

    /// Update every installed function, best effort.
    ///
    /// Iterates qualified names in sorted order; one entry's failure never
    /// blocks the others. Returns the per-entry outcome.
    pub fn update_all(
        &mut self,
    ) -> Vec<(String, Result<Option<InstalledFunction>, RegistryError>)> {
        let names: Vec<String> = self.installed.keys().cloned().collect();
        names
            .into_iter()
            .map(|name| {
                let result = self.update(&name);
                (name, result)
            })
            .collect()
    }

    /// Case-insensitive catalog search, wrapped in a synthetic catalog
    /// document titled with the query.
    #[must_use]
    pub fn search(&self, query: &str) -> FunctionCatalog {
        let mut catalog = FunctionCatalog::titled(&format!("Search results for '{query}'"));
        catalog.spec.krm_functions = self.catalogs.search(query, true);
        catalog
    }

    /// The aggregated view of the installed set as a catalog document.
    ///
    /// Entries with a downloaded artifact display the local path, never
    /// the remote origin.
    #[must_use]
    pub fn installed_catalog(&self) -> FunctionCatalog {
        let mut catalog = FunctionCatalog::titled(INSTALLED_TITLE);
        catalog.spec.krm_functions =
            self.installed.values().map(InstalledFunction::to_manifest).collect();
        catalog
    }

    /// Persist all state: regenerate the derived config, atomically
    /// replace the per-function manifest tree, write the aggregated
    /// installed view, the config document, and the catalog cache.
    ///
    /// Stages run in that order and the first failure aborts the rest;
    /// earlier completed stages are not rolled back.
    ///
    /// # Errors
    ///
    /// Returns the first persistence error encountered.
    pub fn persist(&mut self) -> Result<(), RegistryError> {
        self.config = self.derived_config();

        self.save_functions()?;

        let installed = serde_yaml::to_string(&self.installed_catalog())?;
        fs::write(self.directory.join(INSTALLED_FILE), installed)?;

        self.config.save(&self.directory)?;
        self.catalogs.store().save_all(self.catalogs.catalogs())?;

        Ok(())
    }

    /// The config document regenerated from the live managers: catalog
    /// URIs from the index, dependency strings from the installed set
    /// with `@version` appended for pinned entries.
    #[must_use]
    pub fn derived_config(&self) -> Config {
        Config {
            catalogs: self.catalogs.catalogs().keys().cloned().collect(),
            dependencies: crate::config::Dependencies {
                krm_functions: self
                    .installed
                    .iter()
                    .map(|(name, entry)| {
                        if entry.pinned {
                            format!("{name}@{}", entry.definition.versions[0].name)
                        } else {
                            name.clone()
                        }
                    })
                    .collect(),
            },
        }
    }

    /// Atomically replace `functions/` with the current installed set.
    ///
    /// Manifests (and any binary artifacts) are written into a sibling
    /// temp directory first, then swapped into place, so a failed write
    /// never corrupts the previous tree.
    fn save_functions(&mut self) -> Result<(), RegistryError> {
        let live = self.directory.join(FUNCTIONS_DIR);
        let tmp = self.directory.join("functions.tmp");
        let bak = self.directory.join("functions.bak");

        if tmp.exists() {
            fs::remove_dir_all(&tmp)?;
        }
        fs::create_dir_all(&tmp)?;

        let keys: Vec<String> = self.installed.keys().cloned().collect();
        for key in keys {
            self.save_function_into(&tmp, &live, &key)?;
        }

        if bak.exists() {
            fs::remove_dir_all(&bak)?;
        }
        if live.exists() {
            fs::rename(&live, &bak)?;
        }
        fs::rename(&tmp, &live)?;
        if bak.exists() {
            fs::remove_dir_all(&bak)?;
        }

        Ok(())
    }

    /// Write one installed entry under `tmp`, materializing its binary
    /// artifact on the first save.
    fn save_function_into(&mut self, tmp: &Path, live: &Path, key: &str) -> Result<(), RegistryError> {
        let Some(mut entry) = self.installed.get(key).cloned() else {
            return Ok(());
        };
        let group_dir = tmp.join(&entry.definition.group);
        fs::create_dir_all(&group_dir)?;

        let origin_uri = entry.definition.versions[0]
            .runtime
            .exec
            .as_ref()
            .and_then(|e| e.platforms.first())
            .map(|p| p.uri.clone());

        if let Some(origin) = origin_uri {
            let file_name = artifact_file_name(&entry.definition);
            let tmp_target = group_dir.join(&file_name);
            let final_target = live.join(&entry.definition.group).join(&file_name);

            let cached = entry.local_artifact.as_deref().and_then(|local| {
                let path = local.strip_prefix("file://").unwrap_or(local);
                Path::new(path).exists().then(|| PathBuf::from(path))
            });

            if let Some(cached) = cached {
                // Already downloaded on a prior save; carry the artifact
                // over into the new tree.
                fs::copy(cached, &tmp_target)?;
            } else {
                // First save, or the cached copy vanished from disk;
                // fetch from the origin so the manifest never points at
                // a file that does not exist.
                let bytes = self.catalogs.store().fetch_bytes(&origin).map_err(|e| {
                    RegistryError::Artifact { uri: origin.clone(), reason: e.to_string() }
                })?;
                fs::write(&tmp_target, bytes)?;

                entry.origin_artifact = Some(origin);
                entry.local_artifact = Some(format!("file://{}", final_target.display()));
            }
        }

        let manifest = serde_yaml::to_string(&entry.to_manifest())?;
        fs::write(group_dir.join(format!("{}.yaml", entry.definition.names.kind)), manifest)?;
        self.installed.insert(key.to_string(), entry);

        Ok(())
    }

    /// Load a single-version manifest from the per-function cache.
    fn load_cached(&self, name: &FunctionName) -> Result<InstalledFunction, RegistryError> {
        let path = self
            .directory
            .join(FUNCTIONS_DIR)
            .join(&name.group)
            .join(format!("{}.yaml", name.name));

        if !path.exists() {
            return Err(RegistryError::NotFound { query: name.to_string() });
        }

        let text = fs::read_to_string(&path)?;
        let definition: FunctionDefinition = serde_yaml::from_str(&text)?;

        if definition.versions.len() != 1 {
            return Err(RegistryError::InvalidCache {
                name: name.qualified(),
                reason: format!("expected exactly 1 version, found {}", definition.versions.len()),
            });
        }

        if name.has_version() && definition.versions[0].name != name.version {
            return Err(RegistryError::VersionNotFound {
                name: name.qualified(),
                version: name.version.clone(),
            });
        }

        Ok(InstalledFunction::from_definition(definition, name.has_version()))
    }

    /// Resolve a query against the catalog index, requiring exactly one
    /// match, and trim the result to the selected version.
    fn resolve_external(&self, name: &FunctionName) -> Result<InstalledFunction, RegistryError> {
        let mut matches = self.catalogs.search(&name.qualified(), false).into_iter();
        let mut definition = match (matches.next(), matches.next()) {
            (None, _) => return Err(RegistryError::NotFound { query: name.to_string() }),
            (Some(def), None) => def,
            (Some(_), Some(_)) => {
                return Err(RegistryError::AmbiguousMatch { query: name.to_string() })
            }
        };

        let selected = if name.has_version() {
            definition.version(&name.version).cloned().ok_or_else(|| {
                RegistryError::VersionNotFound {
                    name: definition.qualified_name(),
                    version: name.version.clone(),
                }
            })?
        } else {
            // The index rejects zero-version definitions, so a highest
            // version always exists.
            definition.highest_version().cloned().ok_or_else(|| RegistryError::NotFound {
                query: name.to_string(),
            })?
        };

        definition.versions = vec![selected];
        Ok(InstalledFunction::from_definition(definition, name.has_version()))
    }
}

/// The local filename for a definition's primary binary artifact: the
/// kind name plus the origin URI's extension, if it has one.
fn artifact_file_name(definition: &FunctionDefinition) -> String {
    let kind = &definition.names.kind;
    let uri = definition.versions[0]
        .runtime
        .exec
        .as_ref()
        .and_then(|e| e.platforms.first())
        .map_or("", |p| p.uri.as_str());

    match Path::new(uri).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{kind}.{ext}"),
        None => kind.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::krm::{ExecPlatform, ExecRuntime, FunctionNames, FunctionRuntime, FunctionVersion};
    use tempfile::TempDir;

    fn version(label: &str) -> FunctionVersion {
        FunctionVersion {
            name: label.to_string(),
            idempotent: false,
            usage: String::new(),
            examples: Vec::new(),
            license: String::new(),
            runtime: FunctionRuntime::default(),
            maintainers: Vec::new(),
        }
    }

    fn definition(group: &str, kind: &str, labels: &[&str]) -> FunctionDefinition {
        FunctionDefinition {
            group: group.to_string(),
            description: String::new(),
            publisher: String::new(),
            names: FunctionNames { kind: kind.to_string() },
            versions: labels.iter().map(|l| version(l)).collect(),
            home: String::new(),
            maintainers: Vec::new(),
            tags: Vec::new(),
            metadata: None,
        }
    }

    /// A manager with one indexed catalog of the given definitions.
    fn manager_with(defs: Vec<FunctionDefinition>) -> (TempDir, FunctionManager) {
        let dir = TempDir::new().unwrap();
        let mut fm = FunctionManager::open(dir.path()).unwrap();
        let mut catalog = FunctionCatalog::titled("fixture");
        catalog.spec.krm_functions = defs;
        fm.catalogs_mut().add_from_document("uri-fixture", catalog).unwrap();
        (dir, fm)
    }

    #[test]
    fn test_install_unpinned_selects_highest_version() {
        let (_dir, mut fm) = manager_with(vec![definition("acme", "Logger", &["v1", "v3", "v2"])]);

        let entry = fm.install("acme/Logger").unwrap();
        assert!(!entry.pinned);
        assert_eq!(entry.definition.versions.len(), 1);
        assert_eq!(entry.definition.versions[0].name, "v3");
        assert!(fm.installed().contains_key("acme/Logger"));
    }

    #[test]
    fn test_install_with_version_pins() {
        let (_dir, mut fm) = manager_with(vec![definition("acme", "Logger", &["v1", "v2"])]);

        let entry = fm.install("acme/Logger@v1").unwrap();
        assert!(entry.pinned);
        assert_eq!(entry.definition.versions[0].name, "v1");
    }

    #[test]
    fn test_install_missing_version_fails() {
        let (_dir, mut fm) = manager_with(vec![definition("acme", "Logger", &["v1"])]);
        let err = fm.install("acme/Logger@v9").unwrap_err();
        assert!(matches!(err, RegistryError::VersionNotFound { .. }));
        assert!(fm.installed().is_empty());
    }

    #[test]
    fn test_install_not_found_and_ambiguous() {
        let (_dir, mut fm) = manager_with(vec![
            definition("acme", "Logger", &["v1"]),
            definition("acme", "LoggerPro", &["v1"]),
        ]);

        assert!(matches!(
            fm.install("acme/Missing").unwrap_err(),
            RegistryError::NotFound { .. }
        ));
        // Substring resolution matches both Logger and LoggerPro.
        assert!(matches!(
            fm.install("acme/Log").unwrap_err(),
            RegistryError::AmbiguousMatch { .. }
        ));
    }

    #[test]
    fn test_install_twice_fails() {
        let (_dir, mut fm) = manager_with(vec![definition("acme", "Logger", &["v1"])]);
        fm.install("acme/Logger").unwrap();
        assert!(matches!(
            fm.install("acme/Logger").unwrap_err(),
            RegistryError::AlreadyInstalled { .. }
        ));
    }

    #[test]
    fn test_remove_round_trip() {
        let (_dir, mut fm) = manager_with(vec![definition("acme", "Logger", &["v1"])]);
        fm.install("acme/Logger").unwrap();

        let removed = fm.remove("acme/Logger").unwrap();
        assert_eq!(removed.qualified_name(), "acme/Logger");
        assert!(fm.installed().is_empty());

        assert!(matches!(
            fm.remove("acme/Logger").unwrap_err(),
            RegistryError::NotInstalled { .. }
        ));
    }

    #[test]
    fn test_update_pinned_is_a_no_op() {
        let (_dir, mut fm) = manager_with(vec![definition("acme", "Logger", &["v1", "v2"])]);
        fm.install("acme/Logger@v1").unwrap();
        let before = fm.installed()["acme/Logger"].clone();

        let result = fm.update("acme/Logger").unwrap();
        assert!(result.is_none());
        assert_eq!(fm.installed()["acme/Logger"], before);
    }

    #[test]
    fn test_update_unpinned_replaces_entry() {
        let (_dir, mut fm) = manager_with(vec![definition("acme", "Logger", &["v1"])]);
        fm.install("acme/Logger").unwrap();

        // The catalog gains a newer release.
        fm.catalogs_mut().remove("uri-fixture").unwrap();
        let mut catalog = FunctionCatalog::titled("fixture");
        catalog.spec.krm_functions = vec![definition("acme", "Logger", &["v1", "v2"])];
        fm.catalogs_mut().add_from_document("uri-fixture", catalog).unwrap();

        let old = fm.update("acme/Logger").unwrap().unwrap();
        assert_eq!(old.definition.versions[0].name, "v1");
        assert_eq!(fm.installed()["acme/Logger"].definition.versions[0].name, "v2");
    }

    #[test]
    fn test_update_restores_entry_on_failure() {
        let (_dir, mut fm) = manager_with(vec![definition("acme", "Logger", &["v1"])]);
        fm.install("acme/Logger").unwrap();
        let before = fm.installed()["acme/Logger"].clone();

        // The index loses the function entirely.
        fm.catalogs_mut().remove("uri-fixture").unwrap();

        let err = fm.update("acme/Logger").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
        assert_eq!(fm.installed()["acme/Logger"], before);
    }

    #[test]
    fn test_update_all_isolates_failures() {
        let (_dir, mut fm) = manager_with(vec![
            definition("acme", "Logger", &["v1", "v2"]),
            definition("acme", "Scanner", &["v1"]),
        ]);
        fm.install("acme/Logger").unwrap();
        fm.install("acme/Scanner").unwrap();

        // Scanner disappears from the index; Logger still updates.
        fm.catalogs_mut().remove("uri-fixture").unwrap();
        let mut catalog = FunctionCatalog::titled("fixture");
        catalog.spec.krm_functions = vec![definition("acme", "Logger", &["v1", "v2"])];
        fm.catalogs_mut().add_from_document("uri-fixture", catalog).unwrap();

        let results = fm.update_all();
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|(n, r)| n == "acme/Logger" && r.is_ok()));
        assert!(results.iter().any(|(n, r)| n == "acme/Scanner" && r.is_err()));
        // The failed entry survives unchanged.
        assert!(fm.installed().contains_key("acme/Scanner"));
    }

    #[test]
    fn test_search_wraps_results_in_catalog() {
        let (_dir, fm) = manager_with(vec![
            definition("acme", "Logger", &["v1"]),
            definition("acme", "Scanner", &["v1"]),
        ]);

        let results = fm.search("log");
        let meta = results.metadata.as_ref().unwrap();
        assert_eq!(meta.name.as_deref(), Some("Search results for 'log'"));
        assert_eq!(results.spec.krm_functions.len(), 1);
        assert_eq!(results.spec.krm_functions[0].qualified_name(), "acme/Logger");
    }

    #[test]
    fn test_persist_writes_layout_and_reopens() {
        let (dir, mut fm) = manager_with(vec![definition("acme", "Logger", &["v1", "v2"])]);
        fm.install("acme/Logger@v1").unwrap();
        fm.persist().unwrap();

        assert!(dir.path().join("functions/acme/Logger.yaml").exists());
        assert!(dir.path().join(INSTALLED_FILE).exists());
        assert!(dir.path().join("config.yaml").exists());
        assert!(!dir.path().join("functions.tmp").exists());
        assert!(!dir.path().join("functions.bak").exists());

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.catalogs, vec!["uri-fixture".to_string()]);
        // Pinned entries keep their @version suffix in the config.
        assert_eq!(config.dependencies.krm_functions, vec!["acme/Logger@v1".to_string()]);

        // Reopening restores the installed set from the cache, pinned.
        let mut reopened = FunctionManager::open(dir.path()).unwrap();
        assert!(reopened.take_warnings().is_empty());
        let entry = &reopened.installed()["acme/Logger"];
        assert!(entry.pinned);
        assert_eq!(entry.definition.versions[0].name, "v1");
    }

    #[test]
    fn test_persist_downloads_binary_artifact_once() {
        let dir = TempDir::new().unwrap();

        // A fake binary artifact served over a file URI.
        let artifact = dir.path().join("tool.bin");
        fs::write(&artifact, b"#!binary").unwrap();
        let origin = format!("file://{}", artifact.display());

        let state = dir.path().join("state");
        let mut fm = FunctionManager::open(&state).unwrap();

        let mut def = definition("acme", "Tool", &["v1"]);
        def.versions[0].runtime.exec = Some(ExecRuntime {
            platforms: vec![ExecPlatform {
                bin: "tool".to_string(),
                os: "linux".to_string(),
                arch: "amd64".to_string(),
                uri: origin.clone(),
                sha256: String::new(),
            }],
        });
        let mut catalog = FunctionCatalog::titled("fixture");
        catalog.spec.krm_functions = vec![def];
        fm.catalogs_mut().add_from_document("uri-fixture", catalog).unwrap();

        fm.install("acme/Tool").unwrap();
        fm.persist().unwrap();

        let local_bin = state.join("functions/acme/Tool.bin");
        assert!(local_bin.exists());
        assert_eq!(fs::read(&local_bin).unwrap(), b"#!binary");

        let entry = &fm.installed()["acme/Tool"];
        assert_eq!(entry.origin_artifact.as_deref(), Some(origin.as_str()));
        assert_eq!(
            entry.local_artifact.as_deref(),
            Some(format!("file://{}", local_bin.display()).as_str())
        );
        // The in-memory definition still points at the origin URI.
        let uri = &entry.definition.versions[0].runtime.exec.as_ref().unwrap().platforms[0].uri;
        assert_eq!(uri, &origin);

        // The installed view displays the local path instead.
        let view = fm.installed_catalog();
        let shown = &view.spec.krm_functions[0].versions[0].runtime.exec.as_ref().unwrap()
            .platforms[0]
            .uri;
        assert!(shown.starts_with("file://"));
        assert!(shown.ends_with("Tool.bin"));

        // A second persist keeps the artifact without re-downloading:
        // remove the origin file and save again.
        fs::remove_file(&artifact).unwrap();
        fm.persist().unwrap();
        assert!(local_bin.exists());

        // Reopening restores the origin URI in memory from annotations.
        let reopened = FunctionManager::open(&state).unwrap();
        let entry = &reopened.installed()["acme/Tool"];
        assert_eq!(entry.origin_artifact.as_deref(), Some(origin.as_str()));
        let uri = &entry.definition.versions[0].runtime.exec.as_ref().unwrap().platforms[0].uri;
        assert_eq!(uri, &origin);
    }

    #[test]
    fn test_persist_surfaces_catalog_cache_failure() {
        let (dir, mut fm) = manager_with(vec![definition("acme", "Logger", &["v1"])]);
        fm.install("acme/Logger").unwrap();

        // A plain file squatting on the cache temp path makes the final
        // catalog-save stage fail.
        fs::write(dir.path().join("catalogs.tmp"), "not a directory").unwrap();

        let err = fm.persist().unwrap_err();
        assert!(matches!(err, RegistryError::Store(_)));
    }

    #[test]
    fn test_persist_redownloads_missing_artifact() {
        let dir = TempDir::new().unwrap();

        let artifact = dir.path().join("tool.bin");
        fs::write(&artifact, b"#!binary").unwrap();
        let origin = format!("file://{}", artifact.display());

        let state = dir.path().join("state");
        let mut fm = FunctionManager::open(&state).unwrap();

        let mut def = definition("acme", "Tool", &["v1"]);
        def.versions[0].runtime.exec = Some(ExecRuntime {
            platforms: vec![ExecPlatform {
                bin: "tool".to_string(),
                os: "linux".to_string(),
                arch: "amd64".to_string(),
                uri: origin.clone(),
                sha256: String::new(),
            }],
        });
        let mut catalog = FunctionCatalog::titled("fixture");
        catalog.spec.krm_functions = vec![def];
        fm.catalogs_mut().add_from_document("uri-fixture", catalog).unwrap();

        fm.install("acme/Tool").unwrap();
        fm.persist().unwrap();
        let local_bin = state.join("functions/acme/Tool.bin");
        assert!(local_bin.exists());

        // The cached binary vanishes; the next save must fetch it again
        // rather than write a manifest pointing at a missing file.
        fs::remove_file(&local_bin).unwrap();
        fm.persist().unwrap();
        assert!(local_bin.exists());
        assert_eq!(fs::read(&local_bin).unwrap(), b"#!binary");

        // With the origin gone too, the save fails instead of papering
        // over the missing artifact, and the previous tree survives.
        fs::remove_file(&local_bin).unwrap();
        fs::remove_file(&artifact).unwrap();
        let err = fm.persist().unwrap_err();
        assert!(matches!(err, RegistryError::Artifact { .. }));
        assert!(state.join("functions/acme/Tool.yaml").exists());
    }

    #[test]
    fn test_open_recovers_interrupted_manifest_swap() {
        let (dir, mut fm) = manager_with(vec![definition("acme", "Logger", &["v1"])]);
        fm.install("acme/Logger@v1").unwrap();
        fm.persist().unwrap();
        drop(fm);

        // Simulate a crash between the two swap renames: only the backup
        // directory survives.
        fs::rename(dir.path().join(FUNCTIONS_DIR), dir.path().join("functions.bak")).unwrap();

        let mut reopened = FunctionManager::open(dir.path()).unwrap();
        assert!(reopened.take_warnings().is_empty());
        assert!(!dir.path().join("functions.bak").exists());
        assert!(dir.path().join("functions/acme/Logger.yaml").exists());
        assert_eq!(reopened.installed()["acme/Logger"].definition.versions[0].name, "v1");
    }

    #[test]
    fn test_open_collects_warnings_for_dead_catalogs() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            catalogs: vec!["file:///gone/catalog.yaml".to_string()],
            dependencies: crate::config::Dependencies {
                krm_functions: vec!["acme/Missing".to_string()],
            },
        };
        fs::create_dir_all(dir.path()).unwrap();
        config.save(dir.path()).unwrap();

        let mut fm = FunctionManager::open(dir.path()).unwrap();
        let warnings = fm.take_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("file:///gone/catalog.yaml"));
        assert!(warnings[1].contains("acme/Missing"));
        assert!(fm.installed().is_empty());
    }
}
