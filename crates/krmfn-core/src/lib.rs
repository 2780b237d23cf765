//! Catalog and installed-function state management for KRM function
//! manifests.
//!
//! This crate provides:
//! - Parsing of `group/name@version` function queries
//! - The `KRMFunctionCatalog` document model
//! - A URI-addressed filesystem cache of catalog documents
//! - The in-memory catalog index with conflict detection
//! - The installed-function set with pinning and artifact handling
//! - Crash-safe persistence of all of the above

mod catalog;
mod config;
mod krm;
mod name;
mod registry;
mod store;
mod workspace;

pub use catalog::{CatalogError, CatalogManager};
pub use config::{Config, ConfigError, Dependencies, CONFIG_FILE};
pub use krm::{
    CatalogSpec, ContainerRuntime, ExecPlatform, ExecRuntime, FunctionCatalog,
    FunctionDefinition, FunctionNames, FunctionRuntime, FunctionVersion, ObjectMeta,
    CATALOG_API_VERSION, CATALOG_KIND, IGNORE_AUTO_UPDATES, LOCAL_BINARY_LOCATION,
    ORIGIN_BINARY_LOCATION,
};
pub use name::FunctionName;
pub use registry::{
    FunctionManager, InstalledFunction, RegistryError, FUNCTIONS_DIR, INSTALLED_FILE,
};
pub use store::{CatalogStore, StoreError, CATALOGS_DIR};
pub use workspace::{find_state_dir, find_state_dir_from, STATE_DIR_NAME};
