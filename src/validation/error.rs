use snafu::Snafu;

use crate::client;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{reason}"))]
    Validation { reason: String },

    /// Separate from [`Error::Validation`] because the config map is expected
    /// to appear shortly after cluster creation; callers may retry.
    #[snafu(display("configmap {name:?} in namespace {namespace:?} not found"))]
    AppConfigMapNotFound { name: String, namespace: String },

    /// Separate from [`Error::Validation`] because the kubeconfig secret is
    /// expected to appear shortly after cluster creation; callers may retry.
    #[snafu(display("kubeconfig secret {name:?} in namespace {namespace:?} not found"))]
    KubeConfigNotFound { name: String, namespace: String },

    #[snafu(display("invalid configuration: {reason}"))]
    InvalidConfig { reason: String },

    /// Raised by admission glue when an operation is refused outright, e.g.
    /// an update hitting a cordoned App.
    #[snafu(display("{reason}"))]
    NotAllowed { reason: String },

    #[snafu(display("failed to get {kind} {name:?} in namespace {namespace:?}"))]
    Get {
        source: client::Error,
        kind: &'static str,
        name: String,
        namespace: String,
    },

    #[snafu(display("failed to list apps in namespace {namespace:?}"))]
    ListApps {
        source: client::Error,
        namespace: String,
    },
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    pub fn is_app_config_map_not_found(&self) -> bool {
        matches!(self, Error::AppConfigMapNotFound { .. })
    }

    pub fn is_kube_config_not_found(&self) -> bool {
        matches!(self, Error::KubeConfigNotFound { .. })
    }

    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Error::InvalidConfig { .. })
    }

    pub fn is_not_allowed(&self) -> bool {
        matches!(self, Error::NotAllowed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_exclusively() {
        let err = NotAllowedSnafu {
            reason: "app is cordoned",
        }
        .build();
        assert!(err.is_not_allowed());
        assert!(!err.is_validation());

        let err = ValidationSnafu {
            reason: "catalog \"missing\" not found",
        }
        .build();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "catalog \"missing\" not found");
    }
}
