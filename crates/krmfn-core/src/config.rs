//! The persisted preferences document, `config.yaml`.
//!
//! The config is derived state, not authoritative: it is read once at
//! startup to seed the catalog index and the installed set, and rewritten
//! from the live managers before every save.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Filename of the preferences document inside the state directory.
pub const CONFIG_FILE: &str = "config.yaml";

/// Errors from reading or writing the config document.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] io::Error),

    #[error("config YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// The `config.yaml` document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Catalog URIs to manage. Regenerated from the index keys on save.
    #[serde(default)]
    pub catalogs: Vec<String>,

    /// Managed dependencies. Regenerated from the installed set on save.
    #[serde(default)]
    pub dependencies: Dependencies,
}

/// The `dependencies` block of the config document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependencies {
    /// Installed functions as `group/name`, with `@version` appended for
    /// version-pinned entries.
    #[serde(default)]
    pub krm_functions: Vec<String>,
}

impl Config {
    /// Load the config from `<state_dir>/config.yaml`.
    ///
    /// An absent file yields the default empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load(state_dir: &Path) -> Result<Self, ConfigError> {
        let path = state_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Write the config to `<state_dir>/config.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, state_dir: &Path) -> Result<(), ConfigError> {
        let text = serde_yaml::to_string(self)?;
        fs::write(state_dir.join(CONFIG_FILE), text)?;
        Ok(())
    }
}
