//! Config store port — durable representation of areas and rules.

use std::future::Future;

use serde::{Deserialize, Serialize};

use geohub_domain::area::GeofenceArea;
use geohub_domain::error::GeohubError;
use geohub_domain::rule::GeofenceRule;
use geohub_domain::time::{self, Timestamp};

/// The persisted document: every area and rule, without containment state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceConfig {
    #[serde(default)]
    pub areas: Vec<GeofenceArea>,
    #[serde(default)]
    pub rules: Vec<GeofenceRule>,
    #[serde(default = "time::now", alias = "lastUpdated")]
    pub last_updated: Timestamp,
}

/// Loads and saves the whole [`GeofenceConfig`] at once.
pub trait ConfigStore: Send + Sync {
    /// Read the stored configuration, `None` when nothing was saved yet.
    fn load(&self) -> impl Future<Output = Result<Option<GeofenceConfig>, GeohubError>> + Send;

    /// Overwrite the stored configuration.
    fn save(&self, config: GeofenceConfig) -> impl Future<Output = Result<(), GeohubError>> + Send;
}

impl<T: ConfigStore> ConfigStore for std::sync::Arc<T> {
    fn load(&self) -> impl Future<Output = Result<Option<GeofenceConfig>, GeohubError>> + Send {
        (**self).load()
    }

    fn save(&self, config: GeofenceConfig) -> impl Future<Output = Result<(), GeohubError>> + Send {
        (**self).save(config)
    }
}
