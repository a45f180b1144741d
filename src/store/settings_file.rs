//! Runtime settings persisted as a flat TOML table.
//!
//! ```toml
//! serial_port = "/dev/ttyACM0"
//! simulation_mode = "true"
//! ```
//!
//! Every `set` rewrites the whole file through a temporary sibling and a rename,
//! so a crash never leaves a half-written file behind.

use async_trait::async_trait;
use freshtrack_core::{AppResult, FreshError, SettingsStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// [`SettingsStore`] backed by a TOML file.
#[derive(Debug)]
pub struct TomlSettingsStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
    // Serializes file rewrites.
    write_lock: tokio::sync::Mutex<()>,
}

impl TomlSettingsStore {
    /// Open the store, reading `path` if it exists.
    ///
    /// # Errors
    ///
    /// [`FreshError::Storage`] when the file exists but is not a flat table of strings.
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(text) => toml::from_str::<BTreeMap<String, String>>(&text).map_err(|e| {
                FreshError::Storage(format!("invalid settings file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = values.len(), "Loaded settings file");
        Ok(Self {
            path,
            values: RwLock::new(values),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, snapshot: &BTreeMap<String, String>) -> AppResult<()> {
        let text = toml::to_string(snapshot)
            .map_err(|e| FreshError::Storage(format!("cannot encode settings: {}", e)))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for TomlSettingsStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.values.read().clone();
        snapshot.insert(key.to_string(), value.to_string());
        self.persist(&snapshot).await?;
        // Readers only see values that reached the disk.
        *self.values.write() = snapshot;
        debug!(key, value, "Persisted setting");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshtrack_core::settings_keys;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = TomlSettingsStore::open(dir.path().join("settings.toml"))
            .await
            .unwrap();
        assert_eq!(store.get(settings_keys::SERIAL_PORT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("settings.toml");

        let store = TomlSettingsStore::open(&path).await.unwrap();
        store.set(settings_keys::SIMULATION_MODE, "true").await.unwrap();
        store.set(settings_keys::SERIAL_PORT, "/dev/ttyUSB1").await.unwrap();
        drop(store);

        let reopened = TomlSettingsStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get(settings_keys::SIMULATION_MODE).await.unwrap().as_deref(),
            Some("true")
        );
        assert_eq!(
            reopened.get(settings_keys::SERIAL_PORT).await.unwrap().as_deref(),
            Some("/dev/ttyUSB1")
        );
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_storage_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "serial_port = [1, 2").unwrap();

        let err = TomlSettingsStore::open(&path).await.unwrap_err();
        assert!(matches!(err, FreshError::Storage(_)));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let store = TomlSettingsStore::open(&path).await.unwrap();
        store.set(settings_keys::SERIAL_PORT, "COM7").await.unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let err = store
            .set(settings_keys::SERIAL_PORT, "/dev/ttyUSB9")
            .await
            .unwrap_err();
        assert!(matches!(err, FreshError::Io(_)));
        assert_eq!(
            store.get(settings_keys::SERIAL_PORT).await.unwrap().as_deref(),
            Some("COM7")
        );
        assert_eq!(store.get(settings_keys::SIMULATION_MODE).await.unwrap(), None);
    }
}
