use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use super::{Error, NamespacedName, ParseCordonUntilSnafu};
use crate::{duration::Duration, metadata};

/// Prefix of organization-managed namespaces.
pub const ORG_NAMESPACE_PREFIX: &str = "org-";

/// Chart name of the NGINX ingress controller, which keeps a dedicated
/// cluster values config map for legacy compatibility.
const NGINX_INGRESS_CONTROLLER_APP: &str = "nginx-ingress-controller-app";
const INGRESS_CONTROLLER_VALUES: &str = "ingress-controller-values";

/// Only the admission controller honors the Flux managed-by escape hatch.
const APP_ADMISSION_CONTROLLER: &str = "app-admission-controller";

/// Lowest merge priority, the band of catalog-level values.
pub const CONFIG_PRIORITY_CATALOG: i32 = 0;

/// Gap between two adjacent named priorities, used to form mid-band values.
pub const CONFIG_PRIORITY_DISTANCE: i32 = 50;

/// Priority assigned to extra configs that do not specify one. Sits in the
/// middle of the pre-cluster band.
pub const CONFIG_PRIORITY_DEFAULT: i32 = CONFIG_PRIORITY_CATALOG + CONFIG_PRIORITY_DISTANCE / 2;

/// Priority of the cluster-level values layer.
pub const CONFIG_PRIORITY_CLUSTER: i32 = CONFIG_PRIORITY_CATALOG + CONFIG_PRIORITY_DISTANCE;

/// Priority of the user-level values layer.
pub const CONFIG_PRIORITY_USER: i32 = CONFIG_PRIORITY_CLUSTER + CONFIG_PRIORITY_DISTANCE;

/// Highest merge priority an extra config may carry.
pub const CONFIG_PRIORITY_MAXIMUM: i32 = CONFIG_PRIORITY_USER + CONFIG_PRIORITY_DISTANCE;

/// An App CR declares the installation of a chart from a catalog into a
/// target namespace on a target cluster.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "application.giantswarm.io",
    version = "v1alpha1",
    kind = "App",
    plural = "apps",
    status = "AppStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    /// Name of the catalog the chart is drawn from.
    #[serde(default)]
    pub catalog: String,

    /// Namespace of the catalog. When empty the well-known catalog namespaces
    /// are searched.
    #[serde(default)]
    pub catalog_namespace: String,

    /// Configuration layered on top of the catalog values.
    #[serde(default)]
    pub config: AppConfig,

    /// Per-phase installation settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<AppInstall>,

    /// How to reach the target cluster.
    #[serde(default)]
    pub kube_config: AppKubeConfig,

    /// Name of the chart to install.
    #[serde(default)]
    pub name: String,

    /// Target namespace the chart is installed into.
    #[serde(default)]
    pub namespace: String,

    /// Metadata applied to the target namespace on install.
    #[serde(default)]
    pub namespace_config: AppNamespaceConfig,

    /// Extra configuration sources layered into the merged values by
    /// priority.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_configs: Vec<AppExtraConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<AppTimeout>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall: Option<AppTimeout>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<AppTimeout>,

    /// User supplied configuration, layered on top of everything but the
    /// post-user extra configs.
    #[serde(default)]
    pub user_config: AppUserConfig,

    /// Version of the chart. A leading `v` is stripped on read.
    #[serde(default)]
    pub version: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub config_map: NamespacedName,

    #[serde(default)]
    pub secret: NamespacedName,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppKubeConfig {
    /// When true the chart is installed into the cluster the App CR lives in
    /// and no kubeconfig secret is required.
    #[serde(default)]
    pub in_cluster: bool,

    #[serde(default)]
    pub context: AppKubeConfigContext,

    /// Secret holding the kubeconfig of the target cluster.
    #[serde(default)]
    pub secret: NamespacedName,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppKubeConfigContext {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUserConfig {
    #[serde(default)]
    pub config_map: NamespacedName,

    #[serde(default)]
    pub secret: NamespacedName,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppNamespaceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstall {
    /// Skip the installation of CRDs shipped with the chart.
    #[serde(default, rename = "skipCRDs")]
    pub skip_crds: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppTimeout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

/// Reference from an App to an external config source participating in the
/// values layering.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppExtraConfig {
    /// Kind of the referenced source. Defaults to a config map.
    #[serde(default)]
    pub kind: ExtraConfigKind,

    pub name: String,

    pub namespace: String,

    /// Merge priority. Zero means [`CONFIG_PRIORITY_DEFAULT`].
    #[serde(default)]
    pub priority: i32,
}

impl AppExtraConfig {
    /// The priority with the zero value defaulted.
    pub fn effective_priority(&self) -> i32 {
        if self.priority == 0 {
            CONFIG_PRIORITY_DEFAULT
        } else {
            self.priority
        }
    }
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize, strum::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "lowercase")]
pub enum ExtraConfigKind {
    #[default]
    ConfigMap,
    Secret,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    /// Upstream version of the app as reported by the chart.
    #[serde(default)]
    pub app_version: String,

    #[serde(default)]
    pub release: AppStatusRelease,

    /// Version of the deployed chart.
    #[serde(default)]
    pub version: String,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatusRelease {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default)]
    pub status: String,
}

impl App {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    fn label(&self, key: &str) -> &str {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
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

    /// The chart version with a single leading `v` removed, so Flux-managed
    /// image tag versions like `v1.2.3` read as semver.
    pub fn version(&self) -> &str {
        self.spec.version.strip_prefix('v').unwrap_or(&self.spec.version)
    }

    /// Value of the app-operator version label.
    pub fn version_label(&self) -> &str {
        self.label(metadata::APP_OPERATOR_VERSION)
    }

    /// Workload cluster ID from the cluster label.
    pub fn cluster_id(&self) -> &str {
        self.label(metadata::CLUSTER)
    }

    /// Whether the App CR lives in an organization-managed namespace.
    pub fn is_in_org_namespace(&self) -> bool {
        self.namespace().starts_with(ORG_NAMESPACE_PREFIX)
    }

    /// Whether the chart is installed into the cluster the App CR lives in.
    pub fn in_cluster(&self) -> bool {
        self.spec.kube_config.in_cluster
    }

    /// Value of the app-namespace guard annotation.
    pub fn app_namespace_annotation(&self) -> &str {
        self.annotation(metadata::APP_NAMESPACE)
    }

    pub fn cordon_reason(&self) -> &str {
        self.annotation(metadata::CORDON_REASON)
    }

    pub fn cordon_until(&self) -> &str {
        self.annotation(metadata::CORDON_UNTIL)
    }

    /// Whether updates to this App are refused at `now`. The cordon-until
    /// annotation holds the RFC 3339 expiration of the cordon rule; an absent
    /// annotation means not cordoned.
    pub fn is_cordoned_at(&self, now: DateTime<Utc>) -> Result<bool, Error> {
        let until = self.cordon_until();
        if until.is_empty() {
            return Ok(false);
        }

        let until = DateTime::parse_from_rfc3339(until)
            .context(ParseCordonUntilSnafu { value: until })?;

        Ok(now < until)
    }

    pub fn is_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// True if the admission controller should skip config naming rules
    /// because the App CR is managed by Flux. Only the admission controller
    /// may skip; app-operator still validates when it sets the CR status.
    pub fn is_managed_by_flux(&self, project_name: &str) -> bool {
        if project_name != APP_ADMISSION_CONTROLLER {
            return false;
        }

        self.label(metadata::MANAGED_BY) == "flux"
    }

    /// Name of the cluster values config map this App consumes.
    pub fn cluster_config_map_name(&self) -> String {
        if self.is_in_org_namespace() {
            return format!("{}-cluster-values", self.cluster_id());
        }

        // A separate config map is used for the NGINX ingress controller.
        if self.spec.name == NGINX_INGRESS_CONTROLLER_APP {
            return INGRESS_CONTROLLER_VALUES.to_owned();
        }

        format!("{}-cluster-values", self.namespace())
    }

    /// Name of the kubeconfig secret of the cluster this App targets.
    pub fn cluster_kube_config_secret_name(&self) -> String {
        if self.is_in_org_namespace() {
            return format!("{}-kubeconfig", self.cluster_id());
        }

        format!("{}-kubeconfig", self.namespace())
    }

    /// Finalizer app-operator places on the kubeconfig secret.
    pub fn kube_config_finalizer(&self) -> String {
        format!("app-operator.giantswarm.io/app-{}", self.name())
    }

    /// Name of the downstream Chart CR. The cluster ID is stripped from the
    /// App CR name as a prefix or suffix to keep the Chart name
    /// cluster-agnostic in the remote cluster.
    pub fn chart_name(&self, cluster_id: &str) -> String {
        if self.in_cluster() {
            return self.name().to_owned();
        }

        let name = self.name();
        let name = name
            .strip_prefix(&format!("{cluster_id}-"))
            .unwrap_or(name);
        let name = name
            .strip_suffix(&format!("-{cluster_id}"))
            .unwrap_or(name);

        name.to_owned()
    }

    pub fn chart_config_map_name(&self) -> String {
        format!("{}-chart-values", self.name())
    }

    pub fn chart_secret_name(&self) -> String {
        format!("{}-chart-secrets", self.name())
    }

    pub fn install_skip_crds(&self) -> bool {
        self.spec.install.as_ref().is_some_and(|install| install.skip_crds)
    }

    pub fn install_timeout(&self) -> Option<Duration> {
        self.spec.install.as_ref().and_then(|install| install.timeout)
    }

    pub fn upgrade_timeout(&self) -> Option<Duration> {
        self.spec.upgrade.as_ref().and_then(|upgrade| upgrade.timeout)
    }

    pub fn rollback_timeout(&self) -> Option<Duration> {
        self.spec.rollback.as_ref().and_then(|rollback| rollback.timeout)
    }

    pub fn uninstall_timeout(&self) -> Option<Duration> {
        self.spec.uninstall.as_ref().and_then(|uninstall| uninstall.timeout)
    }

    /// Extra configs of the given kind whose effective priority falls into
    /// the band `(min_exclusive, max_inclusive]`, ordered by ascending
    /// priority with ties keeping their list order.
    pub fn extra_configs(
        &self,
        kind: ExtraConfigKind,
        min_exclusive: i32,
        max_inclusive: i32,
    ) -> Vec<AppExtraConfig> {
        let mut configs: Vec<AppExtraConfig> = self
            .spec
            .extra_configs
            .iter()
            .filter(|config| config.kind == kind)
            .filter(|config| {
                let priority = config.effective_priority();
                min_exclusive < priority && priority <= max_inclusive
            })
            .cloned()
            .collect();

        // sort_by_key is stable, equal priorities keep their list order.
        configs.sort_by_key(AppExtraConfig::effective_priority);
        configs
    }
}
