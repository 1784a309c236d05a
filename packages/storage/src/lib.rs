#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! File-backed incident collection storage.
//!
//! Each collection is one pretty-printed JSON array under the data
//! directory (`incidents_<category>.json`, or `incidents.json` for the
//! unkeyed collection). Writes replace the whole file; there is no locking,
//! so concurrent writers to the same collection race and the last write
//! wins.
//!
//! Reads never fail: a missing, unreadable, or corrupt file is logged and
//! presented as an empty collection.

pub mod merge;
pub mod paths;

use std::path::{Path, PathBuf};

use incident_map_incident_models::{CollectionKey, InvalidKeyError, KNOWN_CATEGORIES};
use serde_json::Value;

/// Errors that can occur while writing collections.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error (directory creation, file write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The storage key can't be used as a file name.
    #[error("{0}")]
    InvalidKey(#[from] InvalidKeyError),
}

/// Normalizes a request payload to a sequence of records.
///
/// An array is used as-is; any other value becomes a one-element sequence.
#[must_use]
pub fn normalize_payload(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(records) => records,
        other => vec![other],
    }
}

/// Store of named incident collections and culture documents.
#[derive(Debug, Clone)]
pub struct IncidentStore {
    data_dir: PathBuf,
}

impl IncidentStore {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Opens the store at [`paths::data_dir`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(paths::data_dir())
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the file backing a collection.
    #[must_use]
    pub fn collection_path(&self, key: &CollectionKey) -> PathBuf {
        self.data_dir.join(key.file_name())
    }

    /// Returns the file backing a culture document.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidKeyError`] if `key` can't be embedded in a file name.
    pub fn culture_path(&self, key: &str) -> Result<PathBuf, InvalidKeyError> {
        incident_map_incident_models::validate_key(key)?;
        Ok(self.data_dir.join(format!("culture_{key}.json")))
    }

    /// Creates the data directory and an empty file for every known
    /// category that doesn't have one yet.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the directory or a file can't be created.
    pub async fn ensure_known_collections(&self) -> Result<(), StorageError> {
        paths::ensure_dir(&self.data_dir).await?;

        for category in KNOWN_CATEGORIES {
            let key = CollectionKey::category(category)?;
            let path = self.collection_path(&key);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                self.create_empty(&path).await?;
                log::info!("Created empty {category} incidents file");
            }
        }

        log::info!("Incident files ready in {}", self.data_dir.display());
        Ok(())
    }

    /// Replaces a collection with `records` and returns how many were
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the data directory can't be created or
    /// the file can't be written.
    pub async fn save(
        &self,
        key: &CollectionKey,
        records: &[Value],
    ) -> Result<usize, StorageError> {
        paths::ensure_dir(&self.data_dir).await?;
        write_records(&self.collection_path(key), records).await?;
        log::info!(
            "Saved {} {key} incidents (replaced old data)",
            records.len()
        );
        Ok(records.len())
    }

    /// Loads a collection.
    ///
    /// A collection that was never written is created empty on first read.
    /// Any read or parse failure yields an empty collection.
    pub async fn load(&self, key: &CollectionKey) -> Vec<Value> {
        let path = self.collection_path(key);

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            match self.create_empty(&path).await {
                Ok(()) => log::info!("Created empty {key} incidents file"),
                Err(e) => log::warn!("Failed to create empty {key} incidents file: {e}"),
            }
            return Vec::new();
        }

        match read_records(&path).await {
            Ok(records) => records,
            Err(e) => {
                log::warn!("Error reading {key} incidents from {}: {e}", path.display());
                Vec::new()
            }
        }
    }

    /// Replaces a collection with an empty sequence.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the file can't be written.
    pub async fn clear(&self, key: &CollectionKey) -> Result<(), StorageError> {
        self.create_empty(&self.collection_path(key)).await?;
        log::info!("All {key} incidents cleared");
        Ok(())
    }

    /// Clears every known category.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on the first collection that can't be
    /// written; collections before it stay cleared.
    pub async fn clear_all(&self) -> Result<(), StorageError> {
        for category in KNOWN_CATEGORIES {
            self.clear(&CollectionKey::category(category)?).await?;
        }
        log::info!("All incidents cleared");
        Ok(())
    }

    /// Loads a culture document, or `null` if it is missing or unreadable.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidKeyError`] if `key` can't be embedded in a file name.
    pub async fn load_culture(&self, key: &str) -> Result<Value, InvalidKeyError> {
        let path = self.culture_path(key)?;
        let document = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                log::warn!("Corrupt culture document {}: {e}", path.display());
                Value::Null
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Null,
            Err(e) => {
                log::warn!("Error reading culture document {}: {e}", path.display());
                Value::Null
            }
        };
        Ok(document)
    }

    /// Replaces a culture document.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the key is invalid or the file can't be
    /// written.
    pub async fn save_culture(&self, key: &str, document: &Value) -> Result<(), StorageError> {
        let path = self.culture_path(key)?;
        paths::ensure_dir(&self.data_dir).await?;
        tokio::fs::write(&path, serde_json::to_string_pretty(document)?).await?;
        log::info!("Saved {key} culture document");
        Ok(())
    }

    async fn create_empty(&self, path: &Path) -> Result<(), StorageError> {
        paths::ensure_dir(&self.data_dir).await?;
        write_records(path, &[]).await
    }
}

async fn write_records(path: &Path, records: &[Value]) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(records)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

async fn read_records(path: &Path) -> Result<Vec<Value>, StorageError> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("incident_map_storage_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn criminal() -> CollectionKey {
        CollectionKey::category("criminal").unwrap()
    }

    #[test]
    fn single_record_normalizes_to_one_element() {
        let record = serde_json::json!({"latitude": 50.06, "longitude": 19.94});
        assert_eq!(normalize_payload(record.clone()), vec![record]);
        assert!(normalize_payload(serde_json::json!([])).is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = scratch("round_trip");
        let store = IncidentStore::new(&dir);
        let records = vec![serde_json::json!({
            "latitude": 50.06,
            "longitude": 19.94,
            "location": "Rynek",
            "type_of_threat": "criminal",
            "extra": {"kept": true}
        })];

        let written = store.save(&criminal(), &records).await.unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.load(&criminal()).await, records);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn save_replaces_previous_contents() {
        let dir = scratch("replace");
        let store = IncidentStore::new(&dir);

        store
            .save(&criminal(), &[serde_json::json!({"n": 1}), serde_json::json!({"n": 2})])
            .await
            .unwrap();
        store
            .save(&criminal(), &[serde_json::json!({"n": 3})])
            .await
            .unwrap();

        assert_eq!(store.load(&criminal()).await, vec![serde_json::json!({"n": 3})]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_collection_loads_empty_and_is_created() {
        let dir = scratch("missing");
        let store = IncidentStore::new(&dir);
        let key = CollectionKey::category("never_written").unwrap();

        assert!(store.load(&key).await.is_empty());
        assert!(store.collection_path(&key).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn corrupt_collection_loads_empty() {
        let dir = scratch("corrupt");
        let store = IncidentStore::new(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.collection_path(&criminal()), "{ not json").unwrap();

        assert!(store.load(&criminal()).await.is_empty());

        std::fs::write(store.collection_path(&criminal()), r#"{"items": []}"#).unwrap();
        assert!(store.load(&criminal()).await.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn externally_deleted_collection_loads_empty() {
        let dir = scratch("deleted");
        let store = IncidentStore::new(&dir);
        store
            .save(&criminal(), &[serde_json::json!({"n": 1})])
            .await
            .unwrap();
        std::fs::remove_file(store.collection_path(&criminal())).unwrap();

        assert!(store.load(&criminal()).await.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn clear_and_clear_all() {
        let dir = scratch("clear");
        let store = IncidentStore::new(&dir);
        let road = CollectionKey::category("road").unwrap();
        let record = [serde_json::json!({"n": 1})];

        store.save(&criminal(), &record).await.unwrap();
        store.save(&road, &record).await.unwrap();

        store.clear(&criminal()).await.unwrap();
        assert!(store.load(&criminal()).await.is_empty());
        assert_eq!(store.load(&road).await.len(), 1);

        store.save(&criminal(), &record).await.unwrap();
        store.clear_all().await.unwrap();
        assert!(store.load(&criminal()).await.is_empty());
        assert!(store.load(&road).await.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn ensure_known_collections_keeps_existing_data() {
        let dir = scratch("ensure");
        let store = IncidentStore::new(&dir);
        store
            .save(&criminal(), &[serde_json::json!({"n": 1})])
            .await
            .unwrap();

        store.ensure_known_collections().await.unwrap();

        assert_eq!(store.load(&criminal()).await.len(), 1);
        let road = CollectionKey::category("road").unwrap();
        assert!(store.collection_path(&road).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn culture_round_trip_and_missing_is_null() {
        let dir = scratch("culture");
        let store = IncidentStore::new(&dir);

        assert_eq!(store.load_culture("krakow").await.unwrap(), Value::Null);

        let doc = serde_json::json!({"events": [{"name": "Wianki"}]});
        store.save_culture("krakow", &doc).await.unwrap();
        assert_eq!(store.load_culture("krakow").await.unwrap(), doc);

        assert!(store.load_culture("../x").await.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
