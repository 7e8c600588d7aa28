//! In-memory stores and fixture helpers for tests.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;

use crate::{
    client::{self, AppSelector, NameSelector, ResourceClient, SourceClient},
    crd::{
        App, AppCatalogEntry, AppSpec, Catalog, CatalogConfig, CatalogSpec, NamespacedName,
    },
};

type Result<T> = std::result::Result<T, client::Error>;

/// An App CR in the given namespace with an otherwise empty spec.
pub(crate) fn app(name: &str, namespace: &str) -> App {
    let mut app = App::new(name, AppSpec::default());
    app.metadata.namespace = Some(namespace.to_owned());
    app
}

/// A Catalog CR with the given config map and secret references.
pub(crate) fn catalog_with_sources(
    name: &str,
    config_map: Option<(&str, &str)>,
    secret: Option<(&str, &str)>,
) -> Catalog {
    let config = if config_map.is_none() && secret.is_none() {
        None
    } else {
        Some(CatalogConfig {
            config_map: config_map.map(|(name, namespace)| NamespacedName {
                name: name.to_owned(),
                namespace: namespace.to_owned(),
            }),
            secret: secret.map(|(name, namespace)| NamespacedName {
                name: name.to_owned(),
                namespace: namespace.to_owned(),
            }),
        })
    };

    Catalog::new(
        name,
        CatalogSpec {
            config,
            title: name.to_owned(),
            ..CatalogSpec::default()
        },
    )
}

/// In-memory implementation of both store traits.
#[derive(Default)]
pub(crate) struct FakeCluster {
    pub apps: Vec<App>,
    pub catalogs: Vec<Catalog>,
    pub entries: Vec<AppCatalogEntry>,
    config_maps: HashMap<(String, String), BTreeMap<String, String>>,
    secrets: HashMap<(String, String), BTreeMap<String, Vec<u8>>>,
    denied: HashSet<(String, String)>,
}

impl FakeCluster {
    pub fn add_config_map(&mut self, namespace: &str, name: &str, entries: &[(&str, &str)]) {
        self.config_maps.insert(
            (namespace.to_owned(), name.to_owned()),
            entries
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        );
    }

    pub fn add_secret(&mut self, namespace: &str, name: &str, entries: &[(&str, &[u8])]) {
        self.secrets.insert(
            (namespace.to_owned(), name.to_owned()),
            entries
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_vec()))
                .collect(),
        );
    }

    /// Marks a blob as existing but inaccessible, like RBAC would.
    pub fn deny(&mut self, namespace: &str, name: &str) {
        self.denied.insert((namespace.to_owned(), name.to_owned()));
    }

    fn check_access(&self, kind: &'static str, namespace: &str, name: &str) -> Result<()> {
        if self.denied.contains(&(namespace.to_owned(), name.to_owned())) {
            return Err(client::Error::Forbidden {
                kind,
                name: name.to_owned(),
                namespace: namespace.to_owned(),
            });
        }

        Ok(())
    }
}

fn not_found(kind: &'static str, namespace: &str, name: &str) -> client::Error {
    client::Error::NotFound {
        kind,
        name: name.to_owned(),
        namespace: namespace.to_owned(),
    }
}

fn matches(app: &App, selector: &AppSelector) -> bool {
    if let Some(namespace) = &selector.namespace {
        if app.namespace() != namespace {
            return false;
        }
    }

    match &selector.name {
        Some(NameSelector::Equals(name)) if app.name() != name.as_str() => return false,
        Some(NameSelector::NotEquals(name)) if app.name() == name.as_str() => return false,
        _ => {}
    }

    let labels = app.metadata.labels.clone().unwrap_or_default();
    selector
        .labels
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

#[async_trait]
impl ResourceClient for FakeCluster {
    async fn get_catalog(&self, namespace: &str, name: &str) -> Result<Catalog> {
        self.catalogs
            .iter()
            .find(|catalog| {
                catalog.metadata.namespace.as_deref() == Some(namespace)
                    && catalog.name() == name
            })
            .cloned()
            .ok_or_else(|| not_found("catalog", namespace, name))
    }

    async fn get_app_catalog_entry(&self, namespace: &str, name: &str) -> Result<AppCatalogEntry> {
        self.entries
            .iter()
            .find(|entry| {
                entry.metadata.namespace.as_deref() == Some(namespace) && entry.name() == name
            })
            .cloned()
            .ok_or_else(|| not_found("appcatalogentry", namespace, name))
    }

    async fn list_apps(&self, selector: &AppSelector) -> Result<Vec<App>> {
        Ok(self
            .apps
            .iter()
            .filter(|app| matches(app, selector))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SourceClient for FakeCluster {
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>> {
        self.check_access("configmap", namespace, name)?;

        self.config_maps
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
            .ok_or_else(|| not_found("configmap", namespace, name))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        self.check_access("secret", namespace, name)?;

        self.secrets
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
            .ok_or_else(|| not_found("secret", namespace, name))
    }
}
