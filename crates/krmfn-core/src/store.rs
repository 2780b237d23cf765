//! Durable cache of raw catalog documents.
//!
//! One file per catalog URI under `<state>/catalogs/`, named by the hex
//! SHA-256 of the URI so arbitrary URIs map to stable filenames. Bulk
//! saves replace the whole directory through a temp-dir-then-rename swap,
//! so a crash or a failed write never clobbers the previous cache.

use crate::krm::FunctionCatalog;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Subdirectory of the state directory holding cached catalogs.
pub const CATALOGS_DIR: &str = "catalogs";

/// Timeout applied to every catalog fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from loading, fetching, or saving cached catalogs.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The catalog is not present in the filesystem cache.
    #[error("catalog '{uri}' not present in cache")]
    NotCached { uri: String },

    /// Fetching the catalog from its URI failed.
    #[error("failed to fetch catalog '{uri}': {reason}")]
    Fetch { uri: String, reason: String },

    /// IO error while reading or replacing the cache.
    #[error("catalog cache IO error: {0}")]
    Io(#[from] io::Error),

    /// A catalog document failed to encode or decode.
    #[error("catalog YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Filesystem cache of catalog documents plus the fetch capability.
pub struct CatalogStore {
    directory: PathBuf,
    http: reqwest::blocking::Client,
}

impl CatalogStore {
    /// Open the store rooted at `<state_dir>/catalogs`, creating the
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the HTTP
    /// client cannot be built.
    pub fn open(state_dir: &Path) -> Result<Self, StoreError> {
        let directory = state_dir.join(CATALOGS_DIR);

        // A swap interrupted between its two renames leaves the previous
        // cache stranded as `.bak`; restore it. A `.bak` next to a live
        // directory is leftover from a completed swap.
        let bak = directory.with_extension("bak");
        if bak.exists() {
            if directory.exists() {
                fs::remove_dir_all(&bak)?;
            } else {
                fs::rename(&bak, &directory)?;
            }
        }
        fs::create_dir_all(&directory)?;

        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("krmfn/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Fetch {
                uri: String::new(),
                reason: e.to_string(),
            })?;

        Ok(Self { directory, http })
    }

    /// The cache directory this store writes into.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The cache filename for a catalog URI: hex SHA-256 plus `.yaml`.
    #[must_use]
    pub fn cache_file_name(uri: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(uri.as_bytes());
        format!("{}.yaml", hex::encode(hasher.finalize()))
    }

    /// Load a catalog from the filesystem cache.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::NotCached`] if no file exists for the URI,
    /// or with an IO/YAML error if the cached file is unreadable.
    pub fn load(&self, uri: &str) -> Result<FunctionCatalog, StoreError> {
        let path = self.directory.join(Self::cache_file_name(uri));
        if !path.exists() {
            return Err(StoreError::NotCached { uri: uri.to_string() });
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&data)?)
    }

    /// Fetch a catalog from its URI, bypassing the cache.
    ///
    /// `file:` URIs read the local filesystem; anything else is a single
    /// blocking GET with a fixed timeout. No redirect, retry, or auth
    /// handling beyond what the client defaults provide.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::Fetch`] on any read or transport failure,
    /// or a YAML error if the fetched bytes do not decode.
    pub fn fetch(&self, uri: &str) -> Result<FunctionCatalog, StoreError> {
        let data = self.fetch_bytes(uri)?;
        Ok(serde_yaml::from_slice(&data)?)
    }

    /// Fetch raw bytes from a `file:` or network URI.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::Fetch`] on any read or transport failure.
    pub fn fetch_bytes(&self, uri: &str) -> Result<Vec<u8>, StoreError> {
        if let Some(path) = local_path(uri) {
            return fs::read(path).map_err(|e| StoreError::Fetch {
                uri: uri.to_string(),
                reason: e.to_string(),
            });
        }

        let response = self.http.get(uri).send().map_err(|e| StoreError::Fetch {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(StoreError::Fetch {
                uri: uri.to_string(),
                reason: format!("server returned status {}", response.status()),
            });
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| StoreError::Fetch {
                uri: uri.to_string(),
                reason: e.to_string(),
            })
    }

    /// Atomically replace the whole cache with the given catalog set.
    ///
    /// Every catalog is serialized into a fresh sibling temp directory
    /// first; only once all writes succeed is the live directory swapped
    /// out (rename to `.bak`, rename temp into place, delete `.bak`). A
    /// failure while writing leaves the live directory untouched.
    ///
    /// # Errors
    ///
    /// Returns the first IO or serialization error encountered.
    pub fn save_all(&self, catalogs: &BTreeMap<String, FunctionCatalog>) -> Result<(), StoreError> {
        let tmp = self.directory.with_extension("tmp");
        let bak = self.directory.with_extension("bak");

        if tmp.exists() {
            fs::remove_dir_all(&tmp)?;
        }
        fs::create_dir_all(&tmp)?;

        for (uri, catalog) in catalogs {
            let text = serde_yaml::to_string(catalog)?;
            fs::write(tmp.join(Self::cache_file_name(uri)), text)?;
        }

        // All writes landed; swap the populated temp dir into place.
        if bak.exists() {
            fs::remove_dir_all(&bak)?;
        }
        if self.directory.exists() {
            fs::rename(&self.directory, &bak)?;
        }
        fs::rename(&tmp, &self.directory)?;
        if bak.exists() {
            fs::remove_dir_all(&bak)?;
        }

        Ok(())
    }
}

/// Interpret `file:`-scheme URIs as local filesystem paths.
fn local_path(uri: &str) -> Option<&str> {
    uri.strip_prefix("file://").or_else(|| uri.strip_prefix("file:"))
}
