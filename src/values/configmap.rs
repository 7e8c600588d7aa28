use std::collections::BTreeMap;

use snafu::ResultExt;
use tracing::debug;

use super::{
    deep_merge,
    error::{ForbiddenSnafu, GetSourceSnafu, NotFoundSnafu},
    parse_layer, Result, ValueData, Values, VALUES_KEY,
};
use crate::{
    client,
    crd::{
        App, AppExtraConfig, Catalog, ExtraConfigKind, CONFIG_PRIORITY_CATALOG,
        CONFIG_PRIORITY_CLUSTER, CONFIG_PRIORITY_MAXIMUM, CONFIG_PRIORITY_USER,
    },
};

const KIND: ExtraConfigKind = ExtraConfigKind::ConfigMap;

impl Values {
    /// Merges the data of the catalog, app, user and extra config maps into a
    /// single set of values. Returns `None` when no config map source is
    /// configured for the app at all.
    pub async fn merge_config_map_data(
        &self,
        app: &App,
        catalog: &Catalog,
    ) -> Result<Option<ValueData>> {
        let extra_configs =
            app.extra_configs(KIND, CONFIG_PRIORITY_CATALOG, CONFIG_PRIORITY_MAXIMUM);

        if app.spec.config.config_map.name.is_empty()
            && catalog.config_map_name().is_empty()
            && app.spec.user_config.config_map.name.is_empty()
            && extra_configs.is_empty()
        {
            // No config at all for this family.
            return Ok(None);
        }

        let raw = self
            .config_map(catalog.config_map_name(), catalog.config_map_namespace())
            .await?;
        // An absent catalog layer merges as an empty mapping, otherwise the
        // first present layer would merge into nothing and be lost.
        let mut data = layer_values("catalog", raw)?.unwrap_or_default();

        self.merge_extra_config_maps(
            app.extra_configs(KIND, CONFIG_PRIORITY_CATALOG, CONFIG_PRIORITY_CLUSTER),
            &mut data,
        )
        .await?;

        let raw = self
            .config_map(
                &app.spec.config.config_map.name,
                &app.spec.config.config_map.namespace,
            )
            .await?;
        if let Some(values) = layer_values("app", raw)? {
            deep_merge(&mut data, values);
        }

        self.merge_extra_config_maps(
            app.extra_configs(KIND, CONFIG_PRIORITY_CLUSTER, CONFIG_PRIORITY_USER),
            &mut data,
        )
        .await?;

        let raw = self
            .config_map(
                &app.spec.user_config.config_map.name,
                &app.spec.user_config.config_map.namespace,
            )
            .await?;
        if let Some(values) = layer_values("user", raw)? {
            deep_merge(&mut data, values);
        }

        self.merge_extra_config_maps(
            app.extra_configs(KIND, CONFIG_PRIORITY_USER, CONFIG_PRIORITY_MAXIMUM),
            &mut data,
        )
        .await?;

        Ok(Some(data))
    }

    async fn merge_extra_config_maps(
        &self,
        entries: Vec<AppExtraConfig>,
        data: &mut ValueData,
    ) -> Result<()> {
        for entry in entries {
            let raw = self.config_map(&entry.name, &entry.namespace).await?;
            if let Some(values) = layer_values(&entry.name, raw)? {
                deep_merge(data, values);
            }
        }

        Ok(())
    }

    async fn config_map(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<BTreeMap<String, String>>> {
        if name.is_empty() {
            // No source configured for this layer.
            return Ok(None);
        }

        debug!(name, namespace, "looking for configmap");

        match self.sources.get_config_map(namespace, name).await {
            Ok(data) => {
                debug!(name, namespace, "found configmap");
                Ok(Some(data))
            }
            Err(client::Error::NotFound { .. }) => NotFoundSnafu {
                kind: KIND,
                name,
                namespace,
            }
            .fail(),
            Err(client::Error::Forbidden { .. }) => ForbiddenSnafu {
                kind: KIND,
                name,
                namespace,
            }
            .fail(),
            Err(source) => Err(source).context(GetSourceSnafu {
                kind: KIND,
                name,
                namespace,
            }),
        }
    }
}

fn layer_values(layer: &str, data: Option<BTreeMap<String, String>>) -> Result<Option<ValueData>> {
    let Some(data) = data else { return Ok(None) };

    let text = data.get(VALUES_KEY).map(String::as_str).unwrap_or_default();
    parse_layer(KIND, layer, text).map(Some)
}
