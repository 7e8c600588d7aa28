//! Custom resources of the app platform.
//!
//! [`App`] declares the installation of a chart, [`Catalog`] names the source
//! of chart artifacts and [`AppCatalogEntry`] publishes a single
//! `(catalog, app, version)` tuple together with its installation
//! restrictions. All types follow the `application.giantswarm.io/v1alpha1`
//! API group.

use kube::core::DynamicObject;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};

mod app;
mod catalog;
mod entry;

pub use app::*;
pub use catalog::*;
pub use entry::*;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("empty value cannot be converted to {expected}"))]
    EmptyValue { expected: &'static str },

    #[snafu(display("expected {expected}, got {found}"))]
    WrongKind { expected: &'static str, found: String },

    #[snafu(display("object cannot be parsed as {expected}"))]
    WrongType {
        source: kube::core::dynamic::ParseDynamicObjectError,
        expected: &'static str,
    },

    #[snafu(display("failed to parse cordon-until annotation {value:?} as RFC 3339"))]
    ParseCordonUntil {
        source: chrono::ParseError,
        value: String,
    },
}

impl Error {
    pub fn is_empty_value(&self) -> bool {
        matches!(self, Error::EmptyValue { .. })
    }

    pub fn is_wrong_type(&self) -> bool {
        matches!(self, Error::WrongKind { .. } | Error::WrongType { .. })
    }

    pub fn is_parsing(&self) -> bool {
        matches!(self, Error::ParseCordonUntil { .. })
    }
}

/// Reference to a namespaced object by name. Empty fields mean the reference
/// is not configured.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedName {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,
}

/// Converts an admission payload object into an [`App`].
pub fn to_app(object: Option<DynamicObject>) -> Result<App, Error> {
    convert(object, "App")
}

/// Converts an admission payload object into a [`Catalog`].
pub fn to_catalog(object: Option<DynamicObject>) -> Result<Catalog, Error> {
    convert(object, "Catalog")
}

fn convert<K>(object: Option<DynamicObject>, expected: &'static str) -> Result<K, Error>
where
    K: kube::Resource<DynamicType = ()> + serde::de::DeserializeOwned,
{
    let object = object.context(EmptyValueSnafu { expected })?;

    if let Some(types) = &object.types {
        if types.api_version != K::api_version(&()) || types.kind != K::kind(&()) {
            return WrongKindSnafu {
                expected,
                found: format!("{}/{}", types.api_version, types.kind),
            }
            .fail();
        }
    }

    object.try_parse().context(WrongTypeSnafu { expected })
}
