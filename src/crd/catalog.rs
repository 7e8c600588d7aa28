use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::NamespacedName;
use crate::metadata;

/// Storage URL of the default catalog.
pub const DEFAULT_CATALOG_STORAGE_URL: &str = "https://giantswarm.github.io/default-catalog";

/// A Catalog CR names a source of chart artifacts, optionally carrying
/// default configuration applied to every app installed from it.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "application.giantswarm.io",
    version = "v1alpha1",
    kind = "Catalog",
    plural = "catalogs",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSpec {
    /// Optional default configuration merged below all app-level values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<CatalogConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Where the chart artifacts are served from.
    #[serde(default)]
    pub storage: CatalogStorage,

    /// Display title of the catalog.
    #[serde(default)]
    pub title: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<NamespacedName>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<NamespacedName>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStorage {
    #[serde(default, rename = "type")]
    pub storage_type: String,

    #[serde(default, rename = "URL")]
    pub url: String,
}

impl Catalog {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    fn label(&self, key: &str) -> &str {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Type of the catalog, e.g. stable or test.
    pub fn catalog_type(&self) -> &str {
        self.label(metadata::CATALOG_TYPE)
    }

    /// How the catalog is displayed in the UX, e.g. public or internal.
    pub fn visibility(&self) -> &str {
        self.label(metadata::CATALOG_VISIBILITY)
    }

    pub fn config_map_name(&self) -> &str {
        self.config_map().map(|r| r.name.as_str()).unwrap_or_default()
    }

    pub fn config_map_namespace(&self) -> &str {
        self.config_map()
            .map(|r| r.namespace.as_str())
            .unwrap_or_default()
    }

    pub fn secret_name(&self) -> &str {
        self.secret().map(|r| r.name.as_str()).unwrap_or_default()
    }

    pub fn secret_namespace(&self) -> &str {
        self.secret()
            .map(|r| r.namespace.as_str())
            .unwrap_or_default()
    }

    fn config_map(&self) -> Option<&NamespacedName> {
        self.spec.config.as_ref()?.config_map.as_ref()
    }

    fn secret(&self) -> Option<&NamespacedName> {
        self.spec.config.as_ref()?.secret.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn config_accessors_default_to_empty() {
        let catalog = Catalog::new("test-catalog", CatalogSpec::default());

        assert_eq!(catalog.config_map_name(), "");
        assert_eq!(catalog.config_map_namespace(), "");
        assert_eq!(catalog.secret_name(), "");
    }

    #[test]
    fn config_accessors_resolve_references() {
        let catalog = testing::catalog_with_sources(
            "test-catalog",
            Some(("test-catalog-values", "giantswarm")),
            Some(("test-catalog-secrets", "giantswarm")),
        );

        assert_eq!(catalog.config_map_name(), "test-catalog-values");
        assert_eq!(catalog.config_map_namespace(), "giantswarm");
        assert_eq!(catalog.secret_name(), "test-catalog-secrets");
        assert_eq!(catalog.secret_namespace(), "giantswarm");
    }
}
