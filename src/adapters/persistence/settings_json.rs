//! Implements SettingsStore using a JSON file.
//!
//! Flat key -> JSON value map, cached in memory and rewritten on every change.

use crate::domain::DomainError;
use crate::ports::SettingsStore;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// JSON file-based settings storage.
pub struct JsonSettingsStore {
    path: PathBuf,
    cache: RwLock<Map<String, Value>>,
}

impl JsonSettingsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: RwLock::new(Map::new()),
        }
    }

    /// Load settings from disk. A missing or unreadable file yields empty settings.
    pub async fn load(&self) -> Result<(), DomainError> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
            Err(_) => Map::new(),
        };
        *self.cache.write().await = data;
        Ok(())
    }

    /// Atomic save: write temp file, fsync, rename over the target.
    async fn save(&self) -> Result<(), DomainError> {
        let data = self.cache.read().await;
        let json =
            serde_json::to_string_pretty(&*data).map_err(|e| DomainError::Settings(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Settings(format!("create settings dir: {}", e)))?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::Settings(format!("create temp file: {}", e)))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::Settings(format!("write temp file: {}", e)))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::Settings(format!("sync temp file: {}", e)))?;
        drop(f);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| DomainError::Settings(format!("atomic rename failed: {}", e)))?;
        Ok(())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), DomainError> {
        {
            let mut cache = self.cache.write().await;
            cache.insert(key.to_string(), value);
        }
        self.save().await
    }
}

#[async_trait::async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, DomainError> {
        let cache = self.cache.read().await;
        Ok(cache.get(key).and_then(Value::as_str).map(str::to_string))
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), DomainError> {
        self.set(key, Value::String(value.to_string())).await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>, DomainError> {
        let cache = self.cache.read().await;
        Ok(cache.get(key).and_then(Value::as_bool))
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), DomainError> {
        self.set(key, Value::Bool(value)).await
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        let removed = self.cache.write().await.remove(key).is_some();
        if removed {
            self.save().await?;
        }
        Ok(())
    }
}
