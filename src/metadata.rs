//! Well-known label and annotation keys used on app platform resources.
//!
//! These are defined in
//! <https://github.com/giantswarm/fmt/blob/master/kubernetes/annotations_and_labels.md>.

/// Label holding the app-operator version responsible for an App CR.
pub const APP_OPERATOR_VERSION: &str = "app-operator.giantswarm.io/version";

/// Sentinel value of [`APP_OPERATOR_VERSION`] for in-cluster apps handled by
/// the unique operator instance.
pub const UNIQUE_APP_VERSION: &str = "0.0.0";

/// Legacy [`APP_OPERATOR_VERSION`] value used for App CRs deployed with
/// Helm 2. The value is always defaulted now and must no longer appear.
pub const LEGACY_APP_VERSION: &str = "1.0.0";

/// Label holding the workload cluster ID an App CR belongs to.
pub const CLUSTER: &str = "giantswarm.io/cluster";

/// Label naming the component managing a resource.
pub const MANAGED_BY: &str = "giantswarm.io/managed-by";

/// Standard Kubernetes name label.
pub const APP_KUBERNETES_NAME: &str = "app.kubernetes.io/name";

/// Label with the type of a catalog, e.g. stable or test.
pub const CATALOG_TYPE: &str = "application.giantswarm.io/catalog-type";

/// Label controlling how a catalog is displayed, e.g. public or internal.
pub const CATALOG_VISIBILITY: &str = "application.giantswarm.io/catalog-visibility";

/// Annotation pinning the namespace an App CR claims to originate from.
/// Guards against selecting another namespace's elevated client.
pub const APP_NAMESPACE: &str = "chart-operator.giantswarm.io/app-namespace";

/// Annotation with the reason why operators must not update this App.
pub const CORDON_REASON: &str = "app-operator.giantswarm.io/cordon-reason";

/// Annotation with the expiration date of the cordon rule, RFC 3339.
pub const CORDON_UNTIL: &str = "app-operator.giantswarm.io/cordon-until";

/// Annotation listing the teams owning an app, set on AppCatalogEntry CRs.
pub const APP_OWNERS: &str = "application.giantswarm.io/owners";

/// Annotation naming the single team owning an app, set on AppCatalogEntry CRs.
pub const APP_TEAM: &str = "application.giantswarm.io/team";
