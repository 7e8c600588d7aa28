use snafu::Snafu;

use crate::{client, crd::ExtraConfigKind};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{kind} {name:?} in namespace {namespace:?} not found"))]
    NotFound {
        kind: ExtraConfigKind,
        name: String,
        namespace: String,
    },

    #[snafu(display("{kind} {name:?} in namespace {namespace:?} forbidden"))]
    Forbidden {
        kind: ExtraConfigKind,
        name: String,
        namespace: String,
    },

    #[snafu(display("failed to parse values of the {layer:?} {kind} as YAML"))]
    ParseValues {
        source: serde_yaml::Error,
        kind: ExtraConfigKind,
        layer: String,
    },

    #[snafu(display("values of the {layer:?} {kind} are not a YAML mapping"))]
    NotAMapping {
        kind: ExtraConfigKind,
        layer: String,
    },

    #[snafu(display("values of the {layer:?} secret are not valid UTF-8"))]
    DecodeSecretValues {
        source: std::string::FromUtf8Error,
        layer: String,
    },

    #[snafu(display("failed to get {kind} {name:?} in namespace {namespace:?}"))]
    GetSource {
        source: client::Error,
        kind: ExtraConfigKind,
        name: String,
        namespace: String,
    },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Forbidden { .. })
    }

    pub fn is_parsing(&self) -> bool {
        matches!(
            self,
            Error::ParseValues { .. } | Error::NotAMapping { .. } | Error::DecodeSecretValues { .. }
        )
    }
}
