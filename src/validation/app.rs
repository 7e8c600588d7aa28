use std::collections::BTreeMap;

use snafu::ResultExt;
use tracing::debug;

use super::{
    error::{AppConfigMapNotFoundSnafu, GetSnafu, KubeConfigNotFoundSnafu, ListAppsSnafu,
        ValidationSnafu},
    Result, Validator,
};
use crate::{
    client::{AppSelector, NameSelector},
    crd::{app_catalog_entry_name, App},
    metadata,
};

/// Namespace of the management cluster components. Apps installed here share
/// the name space of in-cluster apps everywhere.
const PRIVILEGED_NAMESPACE: &str = "giantswarm";

/// Catalog of the managed default apps.
const DEFAULT_CATALOG_NAME: &str = "default";

/// Namespace searched for published catalog entries.
const DEFAULT_NAMESPACE: &str = "default";

/// Namespaces searched for a catalog when the App CR does not name one.
const DEFAULT_CATALOG_NAMESPACES: [&str; 2] = ["default", "giantswarm"];

/// Maximum length of an App CR name, bounded by Helm release names.
const NAME_MAX_LENGTH: usize = 53;

impl Validator {
    /// Runs the full rule suite against the App CR, returning the first
    /// failure.
    pub async fn validate_app(&self, app: &App) -> Result<()> {
        self.validate_annotations(app)?;
        self.validate_catalog(app).await?;
        self.validate_labels(app)?;
        self.validate_config(app).await?;
        self.validate_kube_config(app).await?;
        self.validate_metadata_constraints(app).await?;
        self.validate_name(app)?;
        self.validate_namespace_config(app).await?;
        self.validate_target_namespace(app)?;
        self.validate_user_config(app).await?;
        self.validate_unique_in_cluster_app_name(app).await?;

        Ok(())
    }

    /// Validates an update of an App CR against its current state.
    pub async fn validate_app_update(&self, app: &App, current_app: &App) -> Result<()> {
        self.validate_namespace_update(app, current_app)
    }

    // Prevents chart-operator from selecting the elevated client of another
    // namespace for this app by claiming a different origin.
    fn validate_annotations(&self, app: &App) -> Result<()> {
        let namespace_annotation = app.app_namespace_annotation();

        if !namespace_annotation.is_empty() && namespace_annotation != app.namespace() {
            return ValidationSnafu {
                reason: format!(
                    "wrong {namespace_annotation:?} namespace for the `{}` annotation",
                    metadata::APP_NAMESPACE
                ),
            }
            .fail();
        }

        Ok(())
    }

    async fn validate_catalog(&self, app: &App) -> Result<()> {
        if app.spec.catalog.is_empty() {
            return Ok(());
        }

        let namespaces: Vec<&str> = if app.spec.catalog_namespace.is_empty() {
            DEFAULT_CATALOG_NAMESPACES.to_vec()
        } else {
            vec![app.spec.catalog_namespace.as_str()]
        };

        for namespace in namespaces {
            match self.resources.get_catalog(namespace, &app.spec.catalog).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_not_found() => continue,
                Err(source) => {
                    return Err(source).context(GetSnafu {
                        kind: "catalog",
                        name: app.spec.catalog.as_str(),
                        namespace,
                    });
                }
            }
        }

        ValidationSnafu {
            reason: format!("catalog {:?} not found", app.spec.catalog),
        }
        .fail()
    }

    fn validate_labels(&self, app: &App) -> Result<()> {
        // App CRs are migrating to org namespaces. App CRs in cluster
        // namespaces must keep working for the transition period.
        let managed_in_org = !app.in_cluster() && app.is_in_org_namespace();

        if managed_in_org {
            self.validate_org_labels(app)
        } else {
            self.validate_cluster_labels(app)
        }
    }

    fn validate_cluster_labels(&self, app: &App) -> Result<()> {
        if app.version_label().is_empty() {
            return ValidationSnafu {
                reason: format!("label {:?} not found", metadata::APP_OPERATOR_VERSION),
            }
            .fail();
        }

        if app.version_label() == metadata::LEGACY_APP_VERSION {
            return ValidationSnafu {
                reason: format!(
                    "label {:?} has invalid value {:?}",
                    metadata::APP_OPERATOR_VERSION,
                    app.version_label()
                ),
            }
            .fail();
        }

        self.validate_in_cluster_version_label(app)
    }

    fn validate_org_labels(&self, app: &App) -> Result<()> {
        if app.cluster_id().is_empty() {
            return ValidationSnafu {
                reason: format!("label {:?} not found", metadata::CLUSTER),
            }
            .fail();
        }

        self.validate_in_cluster_version_label(app)
    }

    fn validate_in_cluster_version_label(&self, app: &App) -> Result<()> {
        if app.in_cluster() && app.version_label() != metadata::UNIQUE_APP_VERSION {
            return ValidationSnafu {
                reason: format!(
                    "label {:?} must be set to `0.0.0` for in-cluster app",
                    metadata::APP_OPERATOR_VERSION
                ),
            }
            .fail();
        }

        Ok(())
    }

    async fn validate_config(&self, app: &App) -> Result<()> {
        let config_map = &app.spec.config.config_map;
        if !config_map.name.is_empty() {
            self.validate_name_and_namespace_are_set(
                &config_map.name,
                &config_map.namespace,
                "configmap",
            )?;

            if self.is_admission_controller {
                debug!(
                    namespace = app.namespace(),
                    name = app.name(),
                    "skipping '.spec.config.configMap' validation in admission controllers"
                );
            } else {
                match self
                    .sources
                    .get_config_map(&config_map.namespace, &config_map.name)
                    .await
                {
                    Ok(_) => {}
                    // During cluster creation there is a short delay while
                    // the config map is generated, so callers get a
                    // retryable kind instead of a hard validation failure.
                    Err(err) if err.is_not_found() => {
                        return AppConfigMapNotFoundSnafu {
                            name: config_map.name.as_str(),
                            namespace: config_map.namespace.as_str(),
                        }
                        .fail();
                    }
                    Err(source) => {
                        return Err(source).context(GetSnafu {
                            kind: "configmap",
                            name: config_map.name.as_str(),
                            namespace: config_map.namespace.as_str(),
                        });
                    }
                }
            }
        }

        let secret = &app.spec.config.secret;
        if !secret.name.is_empty() {
            self.validate_name_and_namespace_are_set(&secret.name, &secret.namespace, "secret")?;

            if self.is_admission_controller {
                debug!(
                    namespace = app.namespace(),
                    name = app.name(),
                    "skipping '.spec.config.secret' validation in admission controllers"
                );
            } else {
                match self.sources.get_secret(&secret.namespace, &secret.name).await {
                    Ok(_) => {}
                    Err(err) if err.is_not_found() => {
                        return ValidationSnafu {
                            reason: format!(
                                "secret {:?} in namespace {:?} not found",
                                secret.name, secret.namespace
                            ),
                        }
                        .fail();
                    }
                    Err(source) => {
                        return Err(source).context(GetSnafu {
                            kind: "secret",
                            name: secret.name.as_str(),
                            namespace: secret.namespace.as_str(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    async fn validate_kube_config(&self, app: &App) -> Result<()> {
        if app.in_cluster() {
            return Ok(());
        }

        let secret = &app.spec.kube_config.secret;
        self.validate_name_and_namespace_are_set(
            &secret.name,
            &secret.namespace,
            "kubeconfig secret",
        )?;

        if self.is_admission_controller {
            debug!(
                namespace = app.namespace(),
                name = app.name(),
                "skipping '.spec.kubeConfig.secret' validation in admission controllers"
            );
            return Ok(());
        }

        match self.sources.get_secret(&secret.namespace, &secret.name).await {
            Ok(_) => Ok(()),
            // During cluster creation there is a short delay while the
            // kubeconfig secret is generated, so callers get a retryable kind
            // instead of a hard validation failure.
            Err(err) if err.is_not_found() => KubeConfigNotFoundSnafu {
                name: secret.name.as_str(),
                namespace: secret.namespace.as_str(),
            }
            .fail(),
            Err(source) => Err(source).context(GetSnafu {
                kind: "kubeconfig secret",
                name: secret.name.as_str(),
                namespace: secret.namespace.as_str(),
            }),
        }
    }

    async fn validate_metadata_constraints(&self, app: &App) -> Result<()> {
        let name = app_catalog_entry_name(&app.spec.catalog, &app.spec.name, app.version());

        let entry = match self
            .resources
            .get_app_catalog_entry(DEFAULT_NAMESPACE, &name)
            .await
        {
            Ok(entry) => entry,
            Err(err) if err.is_not_found() => {
                debug!(name, "appcatalogentry not found, skipping metadata validation");
                return Ok(());
            }
            Err(source) => {
                return Err(source).context(GetSnafu {
                    kind: "appcatalogentry",
                    name,
                    namespace: DEFAULT_NAMESPACE,
                });
            }
        };

        let Some(restrictions) = &entry.spec.restrictions else {
            return Ok(());
        };

        if !restrictions.compatible_providers.is_empty()
            && !restrictions.compatible_providers.contains(&self.provider)
        {
            return ValidationSnafu {
                reason: format!(
                    "app {:?} can only be installed for providers {:?} not {:?}",
                    app.spec.name, restrictions.compatible_providers, self.provider
                ),
            }
            .fail();
        }

        if !restrictions.fixed_namespace.is_empty()
            && restrictions.fixed_namespace != app.spec.namespace
        {
            return ValidationSnafu {
                reason: format!(
                    "app {:?} can only be installed in namespace {:?} only, not {:?}",
                    app.spec.name, restrictions.fixed_namespace, app.spec.namespace
                ),
            }
            .fail();
        }

        if !restrictions.cluster_singleton && !restrictions.namespace_singleton {
            return Ok(());
        }

        let mut selector = AppSelector {
            namespace: Some(app.namespace().to_owned()),
            name: Some(NameSelector::NotEquals(app.name().to_owned())),
            labels: BTreeMap::new(),
        };
        // Org namespaces hold the apps of many clusters, only the peers of
        // the same cluster count as singleton conflicts.
        if app.is_in_org_namespace() {
            selector
                .labels
                .insert(metadata::CLUSTER.to_owned(), app.cluster_id().to_owned());
        }

        let apps = self
            .resources
            .list_apps(&selector)
            .await
            .context(ListAppsSnafu {
                namespace: app.namespace(),
            })?;

        for peer in apps {
            if peer.spec.name != app.spec.name {
                continue;
            }

            if restrictions.cluster_singleton {
                let mut cluster_id = app.cluster_id();
                if cluster_id.is_empty() {
                    cluster_id = app.namespace();
                }

                return ValidationSnafu {
                    reason: format!(
                        "app {:?} can only be installed once in cluster {:?}",
                        app.spec.name, cluster_id
                    ),
                }
                .fail();
            }

            if restrictions.namespace_singleton && peer.spec.namespace == app.spec.namespace {
                return ValidationSnafu {
                    reason: format!(
                        "app {:?} can only be installed only once in namespace {:?}",
                        app.spec.name, app.spec.namespace
                    ),
                }
                .fail();
            }
        }

        Ok(())
    }

    fn validate_name(&self, app: &App) -> Result<()> {
        if app.name().len() > NAME_MAX_LENGTH {
            return ValidationSnafu {
                reason: format!(
                    "name {:?} is {} chars and exceeds max length of {} chars",
                    app.name(),
                    app.name().len(),
                    NAME_MAX_LENGTH
                ),
            }
            .fail();
        }

        Ok(())
    }

    async fn validate_namespace_config(&self, app: &App) -> Result<()> {
        let annotations = app.spec.namespace_config.annotations.as_ref();
        let labels = app.spec.namespace_config.labels.as_ref();

        if annotations.is_none() && labels.is_none() {
            return Ok(());
        }

        let selector = AppSelector {
            namespace: Some(app.namespace().to_owned()),
            name: Some(NameSelector::NotEquals(app.name().to_owned())),
            labels: BTreeMap::new(),
        };

        let apps = self
            .resources
            .list_apps(&selector)
            .await
            .context(ListAppsSnafu {
                namespace: app.namespace(),
            })?;

        for peer in apps {
            if peer.spec.namespace != app.spec.namespace {
                continue;
            }

            if let (Some(annotations), Some(peer_annotations)) =
                (annotations, peer.spec.namespace_config.annotations.as_ref())
            {
                for (key, value) in peer_annotations {
                    if annotations.get(key).is_some_and(|own| own != value) {
                        return ValidationSnafu {
                            reason: format!(
                                "app {:?} annotation {:?} for target namespace {:?} collides with value {:?} for app {:?}",
                                app.spec.name,
                                key,
                                app.spec.namespace,
                                value,
                                peer.name()
                            ),
                        }
                        .fail();
                    }
                }
            }

            if let (Some(labels), Some(peer_labels)) =
                (labels, peer.spec.namespace_config.labels.as_ref())
            {
                for (key, value) in peer_labels {
                    if labels.get(key).is_some_and(|own| own != value) {
                        return ValidationSnafu {
                            reason: format!(
                                "app {:?} label {:?} for target namespace {:?} collides with value {:?} for app {:?}",
                                app.spec.name,
                                key,
                                app.spec.namespace,
                                value,
                                peer.name()
                            ),
                        }
                        .fail();
                    }
                }
            }
        }

        Ok(())
    }

    // In-cluster apps outside the privileged namespace must target their own
    // namespace, otherwise `.spec.namespace` could be used to escalate
    // permissions.
    fn validate_target_namespace(&self, app: &App) -> Result<()> {
        let not_privileged = app.namespace() != PRIVILEGED_NAMESPACE;
        let outside_own = app.namespace() != app.spec.namespace;

        if app.in_cluster() && not_privileged && outside_own {
            return ValidationSnafu {
                reason: format!(
                    "target namespace {} is not allowed for in-cluster apps",
                    app.spec.namespace
                ),
            }
            .fail();
        }

        Ok(())
    }

    async fn validate_user_config(&self, app: &App) -> Result<()> {
        let config_map = &app.spec.user_config.config_map;
        if !config_map.name.is_empty() {
            if app.spec.catalog == DEFAULT_CATALOG_NAME {
                self.validate_default_catalog_name(
                    app,
                    &config_map.name,
                    "user configmap",
                    "user-values",
                )?;
            }

            self.validate_name_and_namespace_are_set(
                &config_map.name,
                &config_map.namespace,
                "configmap",
            )?;

            if self.is_admission_controller {
                debug!(
                    namespace = app.namespace(),
                    name = app.name(),
                    "skipping '.spec.userConfig.configMap' validation in admission controllers"
                );
            } else {
                match self
                    .sources
                    .get_config_map(&config_map.namespace, &config_map.name)
                    .await
                {
                    Ok(_) => {}
                    Err(err) if err.is_not_found() => {
                        return ValidationSnafu {
                            reason: format!(
                                "configmap {:?} in namespace {:?} not found",
                                config_map.name, config_map.namespace
                            ),
                        }
                        .fail();
                    }
                    Err(source) => {
                        return Err(source).context(GetSnafu {
                            kind: "configmap",
                            name: config_map.name.as_str(),
                            namespace: config_map.namespace.as_str(),
                        });
                    }
                }
            }
        }

        let secret = &app.spec.user_config.secret;
        if !secret.name.is_empty() {
            if app.spec.catalog == DEFAULT_CATALOG_NAME {
                self.validate_default_catalog_name(app, &secret.name, "user secret", "user-secrets")?;
            }

            self.validate_name_and_namespace_are_set(&secret.name, &secret.namespace, "secret")?;

            if self.is_admission_controller {
                debug!(
                    namespace = app.namespace(),
                    name = app.name(),
                    "skipping '.spec.userConfig.secret' validation in admission controllers"
                );
            } else {
                match self.sources.get_secret(&secret.namespace, &secret.name).await {
                    Ok(_) => {}
                    Err(err) if err.is_not_found() => {
                        return ValidationSnafu {
                            reason: format!(
                                "secret {:?} in namespace {:?} not found",
                                secret.name, secret.namespace
                            ),
                        }
                        .fail();
                    }
                    Err(source) => {
                        return Err(source).context(GetSnafu {
                            kind: "secret",
                            name: secret.name.as_str(),
                            namespace: secret.namespace.as_str(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    // Apps in the default catalog are managed by cluster-operator, which
    // derives the user config names from the app name. Bundles installed on
    // behalf of a workload cluster carry the cluster ID as a name prefix the
    // derived name does not have, so the prefix-stripped form is accepted
    // too.
    fn validate_default_catalog_name(
        &self,
        app: &App,
        configured: &str,
        kind: &str,
        suffix: &str,
    ) -> Result<()> {
        let mut expected = format!("{}-{}", app.name(), suffix);
        let mut mismatch = configured != expected;

        if !app.is_in_org_namespace() && !app.cluster_id().is_empty() {
            let prefix = format!("{}-", app.cluster_id());
            if let Some(stripped) = expected.strip_prefix(&prefix) {
                expected = stripped.to_owned();
            }

            mismatch = mismatch && configured != expected;
        }

        if mismatch {
            return ValidationSnafu {
                reason: format!("{kind} must be named {expected:?} for app in default catalog"),
            }
            .fail();
        }

        Ok(())
    }

    fn validate_name_and_namespace_are_set(
        &self,
        name: &str,
        namespace: &str,
        kind: &str,
    ) -> Result<()> {
        if namespace.is_empty() {
            return ValidationSnafu {
                reason: format!("namespace is not specified for {kind} {name:?}"),
            }
            .fail();
        }

        if name.is_empty() {
            return ValidationSnafu {
                reason: format!("name is not specified for {kind}"),
            }
            .fail();
        }

        Ok(())
    }

    // Only in-cluster apps and apps in the privileged namespace can collide
    // by name, all other apps are isolated by their namespaces.
    async fn validate_unique_in_cluster_app_name(&self, app: &App) -> Result<()> {
        if !app.in_cluster() && app.namespace() != PRIVILEGED_NAMESPACE {
            return Ok(());
        }

        let selector = AppSelector {
            namespace: None,
            name: Some(NameSelector::Equals(app.name().to_owned())),
            labels: BTreeMap::new(),
        };

        let apps = match self.resources.list_apps(&selector).await {
            Ok(apps) => apps,
            Err(err) => {
                return ValidationSnafu {
                    reason: format!(
                        "failed to list apps with {:?} set to {:?} to validate unique in-cluster app name rule, {err}",
                        "metadata.name",
                        app.name(),
                    ),
                }
                .fail();
            }
        };

        for peer in apps {
            // The same app showing up for an update event.
            if peer.namespace() == app.namespace() {
                continue;
            }

            if peer.namespace() == PRIVILEGED_NAMESPACE {
                return ValidationSnafu {
                    reason: format!(
                        "found another app named {:?} installed into the {:?} namespace",
                        peer.name(),
                        PRIVILEGED_NAMESPACE
                    ),
                }
                .fail();
            }

            if peer.in_cluster() {
                if app.namespace() == PRIVILEGED_NAMESPACE {
                    return ValidationSnafu {
                        reason: format!(
                            "there is in-cluster app named {:?} already installed in the {:?} namespace that would cause name collision with the currently submitted app named {:?} in the {:?} namespace",
                            peer.name(),
                            peer.namespace(),
                            app.name(),
                            app.namespace()
                        ),
                    }
                    .fail();
                }

                return ValidationSnafu {
                    reason: format!(
                        "in-cluster apps must be given a unique name, found an app named {:?} as well in the {:?} namespace",
                        peer.name(),
                        peer.namespace()
                    ),
                }
                .fail();
            }
        }

        Ok(())
    }

    fn validate_namespace_update(&self, app: &App, current_app: &App) -> Result<()> {
        if app.spec.namespace != current_app.spec.namespace {
            return ValidationSnafu {
                reason: format!(
                    "target namespace for app {:?} cannot be changed from {:?} to {:?}",
                    app.name(),
                    current_app.spec.namespace,
                    app.spec.namespace
                ),
            }
            .fail();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc};

    use super::super::{Config, Validator};
    use crate::{
        crd::{
            App, AppCatalogEntry, AppCatalogEntryRestrictions, AppCatalogEntrySpec,
            NamespacedName,
        },
        metadata,
        testing::{self, FakeCluster},
    };

    fn validator(cluster: FakeCluster) -> Validator {
        validator_with(cluster, false)
    }

    fn validator_with(cluster: FakeCluster, is_admission_controller: bool) -> Validator {
        let cluster = Arc::new(cluster);

        Validator::new(Config {
            resource_client: cluster.clone(),
            source_client: cluster,
            provider: "aws".to_owned(),
            is_admission_controller,
        })
        .unwrap()
    }

    /// An app with every reference the rule suite inspects, matching the
    /// fixtures of [`cluster`].
    fn kiam_app() -> App {
        let mut app = testing::app("kiam", "eggs2");
        app.metadata.labels = Some(BTreeMap::from([(
            metadata::APP_OPERATOR_VERSION.to_owned(),
            "2.6.0".to_owned(),
        )]));
        app.spec.catalog = "giantswarm".to_owned();
        app.spec.name = "kiam".to_owned();
        app.spec.namespace = "kube-system".to_owned();
        app.spec.version = "1.4.0".to_owned();
        app.spec.config.config_map = NamespacedName {
            name: "eggs2-cluster-values".to_owned(),
            namespace: "eggs2".to_owned(),
        };
        app.spec.kube_config.secret = NamespacedName {
            name: "eggs2-kubeconfig".to_owned(),
            namespace: "eggs2".to_owned(),
        };
        app.spec.user_config.config_map = NamespacedName {
            name: "kiam-user-values".to_owned(),
            namespace: "eggs2".to_owned(),
        };
        app
    }

    fn cluster() -> FakeCluster {
        let mut cluster = FakeCluster::default();

        let mut catalog = testing::catalog_with_sources("giantswarm", None, None);
        catalog.metadata.namespace = Some("default".to_owned());
        cluster.catalogs.push(catalog);

        cluster.add_config_map("eggs2", "eggs2-cluster-values", &[]);
        cluster.add_secret("eggs2", "eggs2-kubeconfig", &[]);
        cluster.add_config_map("eggs2", "kiam-user-values", &[]);
        cluster
    }

    fn restricted_entry(restrictions: AppCatalogEntryRestrictions) -> AppCatalogEntry {
        let mut entry = AppCatalogEntry::new(
            "giantswarm-kiam-1.4.0",
            AppCatalogEntrySpec {
                app_name: "kiam".to_owned(),
                version: "1.4.0".to_owned(),
                restrictions: Some(restrictions),
                ..AppCatalogEntrySpec::default()
            },
        );
        entry.metadata.namespace = Some("default".to_owned());
        entry
    }

    #[tokio::test]
    async fn flawless_app_passes_and_validation_is_idempotent() {
        let validator = validator(cluster());
        let app = kiam_app();

        validator.validate_app(&app).await.unwrap();
        validator.validate_app(&app).await.unwrap();
    }

    #[tokio::test]
    async fn spoofed_app_namespace_annotation_is_rejected() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        app.metadata.annotations = Some(BTreeMap::from([(
            metadata::APP_NAMESPACE.to_owned(),
            "garply".to_owned(),
        )]));

        let err = validator.validate_app(&app).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "wrong \"garply\" namespace for the `chart-operator.giantswarm.io/app-namespace` annotation"
        );
    }

    #[tokio::test]
    async fn matching_app_namespace_annotation_passes() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        app.metadata.annotations = Some(BTreeMap::from([(
            metadata::APP_NAMESPACE.to_owned(),
            "eggs2".to_owned(),
        )]));

        validator.validate_app(&app).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_catalog_is_rejected() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        app.spec.catalog = "missing".to_owned();

        let err = validator.validate_app(&app).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "catalog \"missing\" not found");
    }

    #[tokio::test]
    async fn catalog_found_in_second_default_namespace() {
        let mut cluster = cluster();
        let mut catalog = testing::catalog_with_sources("cluster-catalog", None, None);
        catalog.metadata.namespace = Some("giantswarm".to_owned());
        cluster.catalogs.push(catalog);

        let validator = validator(cluster);
        let mut app = kiam_app();
        app.spec.catalog = "cluster-catalog".to_owned();

        validator.validate_app(&app).await.unwrap();
    }

    #[tokio::test]
    async fn explicit_catalog_namespace_limits_the_search() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        // The giantswarm catalog only exists in the default namespace.
        app.spec.catalog_namespace = "org-acme".to_owned();

        let err = validator.validate_app(&app).await.unwrap_err();
        assert_eq!(err.to_string(), "catalog \"giantswarm\" not found");
    }

    #[tokio::test]
    async fn empty_catalog_skips_the_catalog_rule() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        app.spec.catalog = String::new();

        validator.validate_app(&app).await.unwrap();
    }

    #[tokio::test]
    async fn missing_version_label_is_rejected() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        app.metadata.labels = None;

        let err = validator.validate_app(&app).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "label \"app-operator.giantswarm.io/version\" not found"
        );
    }

    #[tokio::test]
    async fn legacy_version_label_is_rejected() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        app.metadata.labels = Some(BTreeMap::from([(
            metadata::APP_OPERATOR_VERSION.to_owned(),
            "1.0.0".to_owned(),
        )]));

        let err = validator.validate_app(&app).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "label \"app-operator.giantswarm.io/version\" has invalid value \"1.0.0\""
        );
    }

    #[tokio::test]
    async fn in_cluster_app_requires_the_unique_version_label() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        app.spec.kube_config.in_cluster = true;
        app.spec.namespace = "eggs2".to_owned();

        let err = validator.validate_app(&app).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "label \"app-operator.giantswarm.io/version\" must be set to `0.0.0` for in-cluster app"
        );
    }

    #[tokio::test]
    async fn org_namespaced_app_requires_the_cluster_label() {
        let mut cluster = cluster();
        cluster.add_config_map("org-acme", "demo01-cluster-values", &[]);
        cluster.add_secret("org-acme", "demo01-kubeconfig", &[]);
        cluster.add_config_map("org-acme", "kiam-user-values", &[]);

        let validator = validator(cluster);
        let mut app = testing::app("kiam", "org-acme");
        app.spec.catalog = "giantswarm".to_owned();
        app.spec.name = "kiam".to_owned();
        app.spec.namespace = "kube-system".to_owned();
        app.spec.version = "1.4.0".to_owned();
        app.spec.config.config_map = NamespacedName {
            name: "demo01-cluster-values".to_owned(),
            namespace: "org-acme".to_owned(),
        };
        app.spec.kube_config.secret = NamespacedName {
            name: "demo01-kubeconfig".to_owned(),
            namespace: "org-acme".to_owned(),
        };
        app.spec.user_config.config_map = NamespacedName {
            name: "kiam-user-values".to_owned(),
            namespace: "org-acme".to_owned(),
        };

        let err = validator.validate_app(&app).await.unwrap_err();
        assert_eq!(err.to_string(), "label \"giantswarm.io/cluster\" not found");

        app.metadata.labels = Some(BTreeMap::from([(
            metadata::CLUSTER.to_owned(),
            "demo01".to_owned(),
        )]));
        validator.validate_app(&app).await.unwrap();
    }

    #[tokio::test]
    async fn config_map_reference_requires_a_namespace() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        app.spec.config.config_map.namespace = String::new();

        let err = validator.validate_app(&app).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "namespace is not specified for configmap \"eggs2-cluster-values\""
        );
    }

    #[tokio::test]
    async fn missing_config_map_is_a_retryable_failure() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        app.spec.config.config_map.name = "dns-cluster-values".to_owned();

        let err = validator.validate_app(&app).await.unwrap_err();
        assert!(err.is_app_config_map_not_found());
        assert_eq!(
            err.to_string(),
            "configmap \"dns-cluster-values\" in namespace \"eggs2\" not found"
        );
    }

    #[tokio::test]
    async fn missing_config_map_is_tolerated_in_admission_mode() {
        let validator = validator_with(cluster(), true);
        let mut app = kiam_app();
        app.spec.config.config_map.name = "dns-cluster-values".to_owned();

        validator.validate_app(&app).await.unwrap();
    }

    #[tokio::test]
    async fn missing_config_secret_is_a_hard_failure() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        app.spec.config.secret = NamespacedName {
            name: "dns-cluster-secrets".to_owned(),
            namespace: "eggs2".to_owned(),
        };

        let err = validator.validate_app(&app).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "secret \"dns-cluster-secrets\" in namespace \"eggs2\" not found"
        );
    }

    #[tokio::test]
    async fn missing_kube_config_secret_is_a_retryable_failure() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        app.spec.kube_config.secret.name = "missing-kubeconfig".to_owned();

        let err = validator.validate_app(&app).await.unwrap_err();
        assert!(err.is_kube_config_not_found());
        assert_eq!(
            err.to_string(),
            "kubeconfig secret \"missing-kubeconfig\" in namespace \"eggs2\" not found"
        );
    }

    #[tokio::test]
    async fn kube_config_secret_reference_requires_a_namespace() {
        let validator = validator(cluster());
        let mut app = kiam_app();
        app.spec.kube_config.secret.namespace = String::new();

        let err = validator.validate_app(&app).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "namespace is not specified for kubeconfig secret \"eggs2-kubeconfig\""
        );
    }

    #[tokio::test]
    async fn incompatible_provider_is_rejected() {
        let mut cluster = cluster();
        cluster.entries.push(restricted_entry(AppCatalogEntryRestrictions {
            compatible_providers: vec!["azure".to_owned(), "gcp".to_owned()],
            ..AppCatalogEntryRestrictions::default()
        }));

        let validator = validator(cluster);

        let err = validator.validate_app(&kiam_app()).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "app \"kiam\" can only be installed for providers [\"azure\", \"gcp\"] not \"aws\""
        );
    }

    #[tokio::test]
    async fn compatible_provider_passes() {
        let mut cluster = cluster();
        cluster.entries.push(restricted_entry(AppCatalogEntryRestrictions {
            compatible_providers: vec!["aws".to_owned()],
            ..AppCatalogEntryRestrictions::default()
        }));

        let validator = validator(cluster);
        validator.validate_app(&kiam_app()).await.unwrap();
    }

    #[tokio::test]
    async fn fixed_namespace_mismatch_is_rejected() {
        let mut cluster = cluster();
        cluster.entries.push(restricted_entry(AppCatalogEntryRestrictions {
            fixed_namespace: "monitoring".to_owned(),
            ..AppCatalogEntryRestrictions::default()
        }));

        let validator = validator(cluster);

        let err = validator.validate_app(&kiam_app()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "app \"kiam\" can only be installed in namespace \"monitoring\" only, not \"kube-system\""
        );
    }

    #[tokio::test]
    async fn cluster_singleton_conflicts_with_a_peer() {
        let mut cluster = cluster();
        cluster.entries.push(restricted_entry(AppCatalogEntryRestrictions {
            cluster_singleton: true,
            ..AppCatalogEntryRestrictions::default()
        }));

        let mut peer = testing::app("kiam-second", "eggs2");
        peer.spec.name = "kiam".to_owned();
        peer.spec.namespace = "monitoring".to_owned();
        cluster.apps.push(peer);

        let validator = validator(cluster);

        let err = validator.validate_app(&kiam_app()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "app \"kiam\" can only be installed once in cluster \"eggs2\""
        );
    }

    #[tokio::test]
    async fn namespace_singleton_conflicts_only_on_the_same_target() {
        let mut cluster = cluster();
        cluster.entries.push(restricted_entry(AppCatalogEntryRestrictions {
            namespace_singleton: true,
            ..AppCatalogEntryRestrictions::default()
        }));

        let mut peer = testing::app("kiam-second", "eggs2");
        peer.spec.name = "kiam".to_owned();
        peer.spec.namespace = "monitoring".to_owned();
        cluster.apps.push(peer);

        let validator = validator(cluster);
        validator.validate_app(&kiam_app()).await.unwrap();
    }

    #[tokio::test]
    async fn namespace_singleton_conflict_is_rejected() {
        let mut cluster = cluster();
        cluster.entries.push(restricted_entry(AppCatalogEntryRestrictions {
            namespace_singleton: true,
            ..AppCatalogEntryRestrictions::default()
        }));

        let mut peer = testing::app("kiam-second", "eggs2");
        peer.spec.name = "kiam".to_owned();
        peer.spec.namespace = "kube-system".to_owned();
        cluster.apps.push(peer);

        let validator = validator(cluster);

        let err = validator.validate_app(&kiam_app()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "app \"kiam\" can only be installed only once in namespace \"kube-system\""
        );
    }

    #[tokio::test]
    async fn name_length_is_bounded_by_release_names() {
        let mut cluster = cluster();
        let max_name = "a".repeat(53);
        cluster.add_config_map("eggs2", &format!("{max_name}-user-values"), &[]);

        let validator = validator(cluster);

        let mut app = kiam_app();
        app.metadata.name = Some(max_name.clone());
        app.spec.user_config.config_map.name = format!("{max_name}-user-values");
        validator.validate_app(&app).await.unwrap();

        let mut app = kiam_app();
        app.metadata.name = Some("a".repeat(54));
        let err = validator.validate_app(&app).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "name {:?} is 54 chars and exceeds max length of 53 chars",
                "a".repeat(54)
            )
        );
    }

    #[tokio::test]
    async fn namespace_config_collision_is_rejected() {
        let mut cluster = cluster();

        let mut peer = testing::app("cert-manager", "eggs2");
        peer.spec.name = "cert-manager".to_owned();
        peer.spec.namespace = "kube-system".to_owned();
        peer.spec.namespace_config.labels = Some(BTreeMap::from([(
            "monitoring".to_owned(),
            "enabled".to_owned(),
        )]));
        cluster.apps.push(peer);

        let validator = validator(cluster);

        let mut app = kiam_app();
        app.spec.namespace_config.labels = Some(BTreeMap::from([(
            "monitoring".to_owned(),
            "disabled".to_owned(),
        )]));

        let err = validator.validate_app(&app).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "app \"kiam\" label \"monitoring\" for target namespace \"kube-system\" collides with value \"enabled\" for app \"cert-manager\""
        );
    }

    #[tokio::test]
    async fn equal_namespace_config_does_not_collide() {
        let mut cluster = cluster();

        let mut peer = testing::app("cert-manager", "eggs2");
        peer.spec.name = "cert-manager".to_owned();
        peer.spec.namespace = "kube-system".to_owned();
        peer.spec.namespace_config.labels = Some(BTreeMap::from([(
            "monitoring".to_owned(),
            "enabled".to_owned(),
        )]));
        cluster.apps.push(peer);

        let validator = validator(cluster);

        let mut app = kiam_app();
        app.spec.namespace_config.labels = Some(BTreeMap::from([(
            "monitoring".to_owned(),
            "enabled".to_owned(),
        )]));

        validator.validate_app(&app).await.unwrap();
    }

    #[tokio::test]
    async fn in_cluster_app_must_target_its_own_namespace() {
        let validator = validator(cluster());

        let mut app = kiam_app();
        app.spec.kube_config.in_cluster = true;
        app.metadata.labels = Some(BTreeMap::from([(
            metadata::APP_OPERATOR_VERSION.to_owned(),
            "0.0.0".to_owned(),
        )]));

        let err = validator.validate_app(&app).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "target namespace kube-system is not allowed for in-cluster apps"
        );
    }

    #[tokio::test]
    async fn in_cluster_app_in_the_privileged_namespace_may_target_any_namespace() {
        let mut cluster = cluster();
        cluster.add_config_map("giantswarm", "kiam-user-values", &[]);
        cluster.add_config_map("giantswarm", "eggs2-cluster-values", &[]);

        let validator = validator(cluster);

        let mut app = kiam_app();
        app.metadata.namespace = Some("giantswarm".to_owned());
        app.metadata.labels = Some(BTreeMap::from([(
            metadata::APP_OPERATOR_VERSION.to_owned(),
            "0.0.0".to_owned(),
        )]));
        app.spec.kube_config.in_cluster = true;
        app.spec.config.config_map.namespace = "giantswarm".to_owned();
        app.spec.user_config.config_map.namespace = "giantswarm".to_owned();

        validator.validate_app(&app).await.unwrap();
    }

    fn add_default_catalog(cluster: &mut FakeCluster) {
        let mut catalog = testing::catalog_with_sources("default", None, None);
        catalog.metadata.namespace = Some("default".to_owned());
        cluster.catalogs.push(catalog);
    }

    #[tokio::test]
    async fn default_catalog_user_config_map_must_follow_the_name_contract() {
        let mut cluster = cluster();
        add_default_catalog(&mut cluster);
        cluster.add_config_map("eggs2", "user-values", &[]);

        let validator = validator(cluster);

        let mut app = kiam_app();
        app.spec.catalog = "default".to_owned();
        app.spec.user_config.config_map.name = "user-values".to_owned();

        let err = validator.validate_app(&app).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "user configmap must be named \"kiam-user-values\" for app in default catalog"
        );
    }

    #[tokio::test]
    async fn default_catalog_accepts_the_cluster_prefix_stripped_name() {
        let mut cluster = cluster();
        add_default_catalog(&mut cluster);
        cluster.add_config_map("eggs2", "observability-bundle-user-values", &[]);

        let validator = validator(cluster);

        let mut app = kiam_app();
        app.metadata.name = Some("demo01-observability-bundle".to_owned());
        app.metadata.labels = Some(BTreeMap::from([
            (metadata::APP_OPERATOR_VERSION.to_owned(), "2.6.0".to_owned()),
            (metadata::CLUSTER.to_owned(), "demo01".to_owned()),
        ]));
        app.spec.catalog = "default".to_owned();
        app.spec.user_config.config_map.name = "observability-bundle-user-values".to_owned();

        validator.validate_app(&app).await.unwrap();
    }

    #[tokio::test]
    async fn default_catalog_user_secret_must_follow_the_name_contract() {
        let mut cluster = cluster();
        add_default_catalog(&mut cluster);
        let validator = validator(cluster);

        let mut app = kiam_app();
        app.spec.catalog = "default".to_owned();
        app.spec.user_config.config_map.name = String::new();
        app.spec.user_config.secret = NamespacedName {
            name: "user-secrets".to_owned(),
            namespace: "eggs2".to_owned(),
        };

        let err = validator.validate_app(&app).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "user secret must be named \"kiam-user-secrets\" for app in default catalog"
        );
    }

    #[tokio::test]
    async fn missing_user_config_map_is_a_hard_failure() {
        let validator = validator(cluster());

        let mut app = kiam_app();
        app.spec.user_config.config_map.name = "absent-user-values".to_owned();

        let err = validator.validate_app(&app).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "configmap \"absent-user-values\" in namespace \"eggs2\" not found"
        );
    }

    #[tokio::test]
    async fn in_cluster_names_are_globally_unique() {
        let mut cluster = cluster();

        let mut peer = testing::app("security-pack", "abc01");
        peer.spec.kube_config.in_cluster = true;
        cluster.apps.push(peer);

        let validator = validator(cluster);

        let mut app = testing::app("security-pack", "another-ns");
        app.metadata.labels = Some(BTreeMap::from([(
            metadata::APP_OPERATOR_VERSION.to_owned(),
            "0.0.0".to_owned(),
        )]));
        app.spec.name = "security-pack".to_owned();
        app.spec.namespace = "another-ns".to_owned();
        app.spec.kube_config.in_cluster = true;

        let err = validator.validate_app(&app).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "in-cluster apps must be given a unique name, found an app named \"security-pack\" as well in the \"abc01\" namespace"
        );
    }

    #[tokio::test]
    async fn peer_in_the_privileged_namespace_blocks_the_name() {
        let mut cluster = cluster();
        cluster.apps.push(testing::app("security-pack", "giantswarm"));

        let validator = validator(cluster);

        let mut app = testing::app("security-pack", "abc01");
        app.metadata.labels = Some(BTreeMap::from([(
            metadata::APP_OPERATOR_VERSION.to_owned(),
            "0.0.0".to_owned(),
        )]));
        app.spec.name = "security-pack".to_owned();
        app.spec.namespace = "abc01".to_owned();
        app.spec.kube_config.in_cluster = true;

        let err = validator.validate_app(&app).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "found another app named \"security-pack\" installed into the \"giantswarm\" namespace"
        );
    }

    #[tokio::test]
    async fn privileged_namespace_app_collides_with_remote_in_cluster_peer() {
        let mut cluster = cluster();

        let mut peer = testing::app("security-pack", "abc01");
        peer.spec.kube_config.in_cluster = true;
        cluster.apps.push(peer);

        cluster.add_secret("giantswarm", "gs-kubeconfig", &[]);

        let validator = validator(cluster);

        let mut app = testing::app("security-pack", "giantswarm");
        app.metadata.labels = Some(BTreeMap::from([(
            metadata::APP_OPERATOR_VERSION.to_owned(),
            "2.6.0".to_owned(),
        )]));
        app.spec.name = "security-pack".to_owned();
        app.spec.namespace = "security".to_owned();
        app.spec.kube_config.secret = NamespacedName {
            name: "gs-kubeconfig".to_owned(),
            namespace: "giantswarm".to_owned(),
        };

        let err = validator.validate_app(&app).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "there is in-cluster app named \"security-pack\" already installed in the \"abc01\" namespace that would cause name collision with the currently submitted app named \"security-pack\" in the \"giantswarm\" namespace"
        );
    }

    #[tokio::test]
    async fn remote_cluster_apps_may_share_names() {
        let mut cluster = cluster();
        cluster.apps.push(testing::app("kiam", "other-ns"));

        let validator = validator(cluster);

        // Not in-cluster and not in the privileged namespace, so the unique
        // name rule does not apply.
        validator.validate_app(&kiam_app()).await.unwrap();
    }

    #[tokio::test]
    async fn target_namespace_is_immutable_on_update() {
        let validator = validator(cluster());

        let current = kiam_app();
        let mut updated = kiam_app();
        updated.spec.namespace = "monitoring".to_owned();

        let err = validator
            .validate_app_update(&updated, &current)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "target namespace for app \"kiam\" cannot be changed from \"kube-system\" to \"monitoring\""
        );

        validator
            .validate_app_update(&kiam_app(), &current)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn construction_rejects_an_empty_provider() {
        let cluster = Arc::new(FakeCluster::default());

        let err = Validator::new(Config {
            resource_client: cluster.clone(),
            source_client: cluster,
            provider: String::new(),
            is_admission_controller: false,
        })
        .unwrap_err();

        assert!(err.is_invalid_config());
    }
}
