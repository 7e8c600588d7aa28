//! Admission validation of App CRs.
//!
//! [`Validator::validate_app`] runs a fixed sequence of rules against an App
//! CR and the live cluster state, returning on the first failure. Soft
//! failures expected to heal during cluster bootstrap surface as dedicated
//! error kinds ([`Error::AppConfigMapNotFound`], [`Error::KubeConfigNotFound`])
//! so callers can retry them instead of rejecting the App outright.

use std::sync::Arc;

use crate::client::{ResourceClient, SourceClient};

mod app;
mod error;

pub use error::Error;

use error::InvalidConfigSnafu;

type Result<T, E = Error> = std::result::Result<T, E>;

/// Configuration of a [`Validator`].
pub struct Config {
    pub resource_client: Arc<dyn ResourceClient>,

    pub source_client: Arc<dyn SourceClient>,

    /// Provider of the installation, e.g. `aws`, checked against the
    /// compatible providers of published catalog entries.
    pub provider: String,

    /// In admission-controller mode existence checks of referenced config
    /// maps and secrets are skipped, as they may legitimately not exist yet
    /// while a cluster is being created. Shape checks still run.
    pub is_admission_controller: bool,
}

/// Validates App CRs against the rule suite. Stateless between calls; the
/// configuration is immutable after construction.
pub struct Validator {
    resources: Arc<dyn ResourceClient>,
    sources: Arc<dyn SourceClient>,
    provider: String,
    is_admission_controller: bool,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("provider", &self.provider)
            .field("is_admission_controller", &self.is_admission_controller)
            .finish_non_exhaustive()
    }
}

impl Validator {
    pub fn new(config: Config) -> Result<Self> {
        if config.provider.is_empty() {
            return InvalidConfigSnafu {
                reason: "provider must not be empty",
            }
            .fail();
        }

        Ok(Self {
            resources: config.resource_client,
            sources: config.source_client,
            provider: config.provider,
            is_admission_controller: config.is_admission_controller,
        })
    }
}
