//! The KRM function catalog document model.
//!
//! These types mirror the `config.kubernetes.io/v1alpha1` catalog wire
//! format: a `KRMFunctionCatalog` document carrying a list of function
//! definitions, each with one or more versioned releases whose runtime is
//! either a container image or a set of per-platform binaries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API version stamped on every catalog document.
pub const CATALOG_API_VERSION: &str = "config.kubernetes.io/v1alpha1";

/// Kind stamped on every catalog document.
pub const CATALOG_KIND: &str = "KRMFunctionCatalog";

/// Annotation key marking an installed function as version-pinned.
pub const IGNORE_AUTO_UPDATES: &str = "krmfn.dev/ignore-auto-updates";

/// Annotation key recording the remote URI a binary was downloaded from.
pub const ORIGIN_BINARY_LOCATION: &str = "krmfn.dev/origin-binary-location";

/// Annotation key recording the local path a binary was downloaded to.
pub const LOCAL_BINARY_LOCATION: &str = "krmfn.dev/local-binary-location";

/// A catalog document listing function definitions.
///
/// For management purposes a catalog's identity is the URI it was fetched
/// from, not its content; the URI is carried externally by the managers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCatalog {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,
    #[serde(default)]
    pub spec: CatalogSpec,
}

/// The `spec` block of a catalog document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSpec {
    #[serde(default)]
    pub krm_functions: Vec<FunctionDefinition>,
}

impl FunctionCatalog {
    /// Create an empty catalog titled `name`, stamped with the current time.
    #[must_use]
    pub fn titled(name: &str) -> Self {
        Self {
            api_version: CATALOG_API_VERSION.to_string(),
            kind: CATALOG_KIND.to_string(),
            metadata: Some(ObjectMeta {
                name: Some(name.to_string()),
                creation_timestamp: Some(chrono::Utc::now()),
                annotations: BTreeMap::new(),
            }),
            spec: CatalogSpec::default(),
        }
    }
}

/// Free-form object metadata: name, creation time, annotations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// A single KRM function: an executable plugin with versioned releases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    /// Dotted namespace; may itself contain slashes.
    pub group: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub publisher: String,
    pub names: FunctionNames,
    /// Releases, newest not necessarily first. A definition with zero
    /// versions is invalid and rejected when it enters the index.
    #[serde(default)]
    pub versions: Vec<FunctionVersion>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub home: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,
}

/// The `names` block of a function definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionNames {
    /// Display and lookup name.
    pub kind: String,
}

impl FunctionDefinition {
    /// The globally unique key for this definition: `group + "/" + kind`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.group, self.names.kind)
    }

    /// The highest version by lexicographic ordering of version labels.
    ///
    /// Labels are opaque strings, not semver; `"v10"` sorts below `"v9"`.
    /// Returns `None` for a definition with no versions.
    #[must_use]
    pub fn highest_version(&self) -> Option<&FunctionVersion> {
        self.versions.iter().max_by(|a, b| a.name.cmp(&b.name))
    }

    /// Look up a release by its exact version label.
    #[must_use]
    pub fn version(&self, label: &str) -> Option<&FunctionVersion> {
        self.versions.iter().find(|v| v.name == label)
    }

    /// Annotation lookup on the optional metadata block.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.annotations.get(key))
            .map(String::as_str)
    }

    /// Set an annotation, creating the metadata block if absent.
    pub fn set_annotation(&mut self, key: &str, value: &str) {
        self.metadata
            .get_or_insert_with(ObjectMeta::default)
            .annotations
            .insert(key.to_string(), value.to_string());
    }
}

/// One release of a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionVersion {
    /// Opaque version label.
    pub name: String,
    #[serde(default)]
    pub idempotent: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub usage: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub license: String,
    #[serde(default)]
    pub runtime: FunctionRuntime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<String>,
}

/// How a release executes: a container image or per-platform binaries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRuntime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerRuntime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecRuntime>,
}

/// Container image runtime.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRuntime {
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sha256: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub require_network: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub require_storage_mount: bool,
}

/// Downloadable binary runtime, one descriptor per OS/arch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecRuntime {
    #[serde(default)]
    pub platforms: Vec<ExecPlatform>,
}

/// One downloadable binary artifact.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecPlatform {
    pub bin: String,
    pub os: String,
    pub arch: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sha256: String,
}
