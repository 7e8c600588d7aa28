//! Priority-ordered merging of all configuration sources of an App.
//!
//! For each source family (config maps and secrets) up to six layers are
//! applied, later layers overriding earlier ones per top-level key:
//!
//! 1. the catalog-level source,
//! 2. extra configs in the pre-cluster band,
//! 3. the app-level (cluster) source,
//! 4. extra configs in the post-cluster band,
//! 5. the user-level source,
//! 6. extra configs in the post-user band.
//!
//! [`Values::merge_all`] overlays the merged secret values on top of the
//! merged config map values to produce the tree handed to the release.
//!
//! Every participating source stores a YAML document under its `values` key;
//! the document must parse to a mapping. Layer application is strictly
//! ordered and any fetch or parse failure aborts the merge.

use std::sync::Arc;

use serde_yaml::{mapping::Entry, Value};
use snafu::ResultExt;

use crate::{
    client::SourceClient,
    crd::{App, Catalog, ExtraConfigKind},
};

mod configmap;
mod error;
mod secret;

pub use error::Error;

use error::{NotAMappingSnafu, ParseValuesSnafu};

/// Key every participating source stores its YAML document under.
pub const VALUES_KEY: &str = "values";

/// A merged tree of configuration values.
pub type ValueData = serde_yaml::Mapping;

type Result<T, E = Error> = std::result::Result<T, E>;

/// Merges the layered configuration sources of an App into value trees.
///
/// The service is stateless; every call fetches fresh snapshots from the
/// source store and returns a newly allocated tree.
pub struct Values {
    sources: Arc<dyn SourceClient>,
}

impl Values {
    pub fn new(sources: Arc<dyn SourceClient>) -> Self {
        Self { sources }
    }

    /// Merges both the config map and the secret values of the app into a
    /// single tree. Secret values win on conflicting keys.
    pub async fn merge_all(&self, app: &App, catalog: &Catalog) -> Result<ValueData> {
        let config_map_data = self.merge_config_map_data(app, catalog).await?;
        let secret_data = self.merge_secret_data(app, catalog).await?;

        let mut merged = config_map_data.unwrap_or_default();
        deep_merge(&mut merged, secret_data.unwrap_or_default());

        Ok(merged)
    }
}

/// Recursively merges `overlay` into `base`. Mappings are merged key by key;
/// scalars and sequences are replaced as whole values by the later layer.
pub(crate) fn deep_merge(base: &mut ValueData, overlay: ValueData) {
    for (key, value) in overlay {
        match (base.entry(key), value) {
            (Entry::Occupied(mut existing), Value::Mapping(overlay_map))
                if existing.get().is_mapping() =>
            {
                if let Some(base_map) = existing.get_mut().as_mapping_mut() {
                    deep_merge(base_map, overlay_map);
                }
            }
            (Entry::Occupied(mut existing), value) => {
                existing.insert(value);
            }
            (Entry::Vacant(slot), value) => {
                slot.insert(value);
            }
        }
    }
}

/// Parses the `values` document of a single layer. An empty document yields
/// an empty mapping, anything but a mapping is a parsing failure.
pub(crate) fn parse_layer(kind: ExtraConfigKind, layer: &str, text: &str) -> Result<ValueData> {
    let value: Value = serde_yaml::from_str(text).context(ParseValuesSnafu { kind, layer })?;

    match value {
        Value::Null => Ok(ValueData::new()),
        Value::Mapping(mapping) => Ok(mapping),
        _ => NotAMappingSnafu { kind, layer }.fail(),
    }
}
