use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::NamespacedName;
use crate::metadata;

/// An AppCatalogEntry CR publishes a single `(catalog, app, version)` tuple
/// together with the restrictions it imposes on installations.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "application.giantswarm.io",
    version = "v1alpha1",
    kind = "AppCatalogEntry",
    plural = "appcatalogentries",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AppCatalogEntrySpec {
    #[serde(default)]
    pub app_name: String,

    /// Upstream version of the packaged app.
    #[serde(default)]
    pub app_version: String,

    #[serde(default)]
    pub catalog: NamespacedName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<AppCatalogEntryRestrictions>,

    /// Version of the chart.
    #[serde(default)]
    pub version: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppCatalogEntryRestrictions {
    /// Providers the app may be installed on. Empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compatible_providers: Vec<String>,

    /// When true the app may exist only once per cluster.
    #[serde(default)]
    pub cluster_singleton: bool,

    /// The only target namespace the app may be installed into.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fixed_namespace: String,

    /// When true the app may exist only once per target namespace.
    #[serde(default)]
    pub namespace_singleton: bool,
}

/// Deterministic name of the entry publishing the given chart version.
pub fn app_catalog_entry_name(catalog: &str, app: &str, version: &str) -> String {
    format!("{catalog}-{app}-{version}")
}

/// Value of the managed-by label placed on entries owned by the unique
/// instance of the given project.
pub fn app_catalog_entry_managed_by(project_name: &str) -> String {
    format!("{project_name}-unique")
}

impl AppCatalogEntry {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn compatible_providers(&self) -> &[String] {
        self.spec
            .restrictions
            .as_ref()
            .map(|restrictions| restrictions.compatible_providers.as_slice())
            .unwrap_or_default()
    }

    fn annotation(&self, key: &str) -> &str {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Teams owning the app, from the owners annotation.
    pub fn owners(&self) -> &str {
        self.annotation(metadata::APP_OWNERS)
    }

    /// Single team owning the app, from the team annotation.
    pub fn team(&self) -> &str {
        self.annotation(metadata::APP_TEAM)
    }
}
