//! Typed read access to the stores the core depends on.
//!
//! [`ResourceClient`] covers the app platform custom resources and
//! [`SourceClient`] the configuration blobs (config maps and secrets). Both
//! are implemented by [`KubeClient`] against a real API server; tests swap in
//! in-memory fakes. The traits carry exactly the operations the validator and
//! the values merger exercise.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{api::ListParams, Api};
use snafu::{ResultExt, Snafu};

use crate::crd::{App, AppCatalogEntry, Catalog};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{kind} {name:?} in namespace {namespace:?} not found"))]
    NotFound {
        kind: &'static str,
        name: String,
        namespace: String,
    },

    #[snafu(display("{kind} {name:?} in namespace {namespace:?} forbidden"))]
    Forbidden {
        kind: &'static str,
        name: String,
        namespace: String,
    },

    #[snafu(display("Kubernetes API request failed"))]
    KubeRequest { source: kube::Error },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Forbidden { .. })
    }
}

/// Equality or inequality requirement on `metadata.name`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NameSelector {
    Equals(String),
    NotEquals(String),
}

/// Filter for listing App CRs.
///
/// Stores that cannot express the inequality form natively must post-filter
/// their results.
#[derive(Clone, Debug, Default)]
pub struct AppSelector {
    /// Namespace to list in. `None` means all namespaces.
    pub namespace: Option<String>,

    /// Requirement on `metadata.name`.
    pub name: Option<NameSelector>,

    /// Label equality requirements, all of which must match.
    pub labels: BTreeMap<String, String>,
}

/// Read access to App, Catalog and AppCatalogEntry resources.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn get_catalog(&self, namespace: &str, name: &str) -> Result<Catalog>;

    async fn get_app_catalog_entry(&self, namespace: &str, name: &str)
        -> Result<AppCatalogEntry>;

    async fn list_apps(&self, selector: &AppSelector) -> Result<Vec<App>>;
}

/// Read access to the configuration blobs referenced by Apps and Catalogs.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn get_config_map(&self, namespace: &str, name: &str)
        -> Result<BTreeMap<String, String>>;

    async fn get_secret(&self, namespace: &str, name: &str)
        -> Result<BTreeMap<String, Vec<u8>>>;
}

/// [`ResourceClient`] and [`SourceClient`] backed by a Kubernetes API server.
#[derive(Clone)]
pub struct KubeClient {
    client: kube::Client,
}

impl KubeClient {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    async fn get<K>(&self, kind: &'static str, namespace: &str, name: &str) -> Result<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|err| classify(err, kind, name, namespace))
    }
}

#[async_trait]
impl ResourceClient for KubeClient {
    async fn get_catalog(&self, namespace: &str, name: &str) -> Result<Catalog> {
        self.get("catalog", namespace, name).await
    }

    async fn get_app_catalog_entry(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<AppCatalogEntry> {
        self.get("appcatalogentry", namespace, name).await
    }

    async fn list_apps(&self, selector: &AppSelector) -> Result<Vec<App>> {
        let api: Api<App> = match &selector.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };

        let apps = api
            .list(&list_params(selector))
            .await
            .context(KubeRequestSnafu)?;

        Ok(apps.items)
    }
}

#[async_trait]
impl SourceClient for KubeClient {
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>> {
        let config_map: ConfigMap = self.get("configmap", namespace, name).await?;
        Ok(config_map.data.unwrap_or_default())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        let secret: Secret = self.get("secret", namespace, name).await?;

        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect())
    }
}

fn list_params(selector: &AppSelector) -> ListParams {
    let mut params = ListParams::default();

    if let Some(name) = &selector.name {
        params = params.fields(&match name {
            NameSelector::Equals(name) => format!("metadata.name={name}"),
            NameSelector::NotEquals(name) => format!("metadata.name!={name}"),
        });
    }

    if !selector.labels.is_empty() {
        let labels: Vec<String> = selector
            .labels
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        params = params.labels(&labels.join(","));
    }

    params
}

fn classify(err: kube::Error, kind: &'static str, name: &str, namespace: &str) -> Error {
    match err {
        kube::Error::Api(response) if response.code == 404 => Error::NotFound {
            kind,
            name: name.to_owned(),
            namespace: namespace.to_owned(),
        },
        kube::Error::Api(response) if response.code == 403 => Error::Forbidden {
            kind,
            name: name.to_owned(),
            namespace: namespace.to_owned(),
        },
        source => Error::KubeRequest { source },
    }
}
