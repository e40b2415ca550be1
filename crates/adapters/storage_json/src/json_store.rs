//! JSON file implementation of [`ConfigStore`].

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use geohub_app::ports::{ConfigStore, GeofenceConfig};
use geohub_domain::error::GeohubError;

use crate::error::JsonStoreError;

/// Default file name, relative to the working directory.
pub const DEFAULT_PATH: &str = "geofence_config.json";

/// Stores the configuration as one pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    /// Create a store backed by the file at `path`. The file is not touched yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for JsonConfigStore {
    fn default() -> Self {
        Self::new(DEFAULT_PATH)
    }
}

async fn read(path: &Path) -> Result<Option<GeofenceConfig>, JsonStoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

async fn write(path: &Path, temp: &Path, config: &GeofenceConfig) -> Result<(), JsonStoreError> {
    let encoded = serde_json::to_vec_pretty(config)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(temp, encoded).await?;
    tokio::fs::rename(temp, path).await?;
    Ok(())
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> impl Future<Output = Result<Option<GeofenceConfig>, GeohubError>> + Send {
        let path = self.path.clone();
        async move {
            let config = read(&path).await?;
            tracing::debug!(path = %path.display(), found = config.is_some(), "config file read");
            Ok(config)
        }
    }

    fn save(&self, config: GeofenceConfig) -> impl Future<Output = Result<(), GeohubError>> + Send {
        let path = self.path.clone();
        let temp = self.temp_path();
        async move {
            write(&path, &temp, &config).await?;
            tracing::debug!(
                path = %path.display(),
                areas = config.areas.len(),
                rules = config.rules.len(),
                "config file written"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use geohub_domain::area::GeofenceArea;
    use geohub_domain::geometry::GeoPoint;
    use geohub_domain::rule::{Action, ActionType, GeofenceRule, TriggerType};
    use geohub_domain::time;

    pub(crate) fn temp_file() -> PathBuf {
        std::env::temp_dir()
            .join(format!("geohub-{}", uuid::Uuid::new_v4()))
            .join("geofence_config.json")
    }

    pub(crate) fn sample_config(rule_name: &str) -> GeofenceConfig {
        let area = GeofenceArea::builder()
            .id("home")
            .name("Home")
            .circle(GeoPoint::new(48.85, 2.35), 150.0)
            .build()
            .unwrap();
        let rule = GeofenceRule::builder()
            .id("r1")
            .name(rule_name)
            .area_id("home")
            .trigger_type(TriggerType::Exit)
            .action(Action::new("porch", ActionType::Off).with_delay(30.0))
            .build()
            .unwrap();
        GeofenceConfig {
            areas: vec![area],
            rules: vec![rule],
            last_updated: time::now(),
        }
    }

    #[tokio::test]
    async fn should_return_none_when_file_is_missing() {
        let store = JsonConfigStore::new(temp_file());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_save_and_load_back() {
        let store = JsonConfigStore::new(temp_file());
        let config = sample_config("Leaving");

        store.save(config.clone()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded.areas, config.areas);
        assert_eq!(loaded.rules, config.rules);
        assert_eq!(loaded.rules[0].actions[0].delay_seconds, 30.0);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn should_overwrite_previous_document() {
        let store = JsonConfigStore::new(temp_file());
        store.save(sample_config("first")).await.unwrap();
        store.save(sample_config("second")).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.rules[0].name, "second");
    }

    #[tokio::test]
    async fn should_read_document_without_containment_or_timestamp() {
        let path = temp_file();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"areas":[{"id":"a","name":"A","type":"circle","center":{"lat":0.0,"lng":0.0},"radius":10.0}],
                "rules":[{"id":"r","name":"R","areaId":"a","triggerType":"both","actions":[]}]}"#,
        )
        .unwrap();

        let loaded = JsonConfigStore::new(path).load().await.unwrap().unwrap();

        assert_eq!(loaded.areas.len(), 1);
        assert_eq!(loaded.rules[0].trigger_type, TriggerType::Both);
        assert!(loaded.rules[0].enabled);
    }

    #[tokio::test]
    async fn should_fail_on_corrupted_file() {
        let path = temp_file();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonConfigStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, GeohubError::Storage(_)));
    }
}
