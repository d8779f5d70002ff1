//! JSON-backed metadata catalog.
//!
//! The catalog is one artifact: a JSON array of [`ObjectMetadata`] records at
//! `<storage root>/metadata.json`, mutated only by full-read, in-memory
//! modify, full-rewrite. Mutations are serialized behind a single-writer
//! mutex; searches read without it. Writers in *other processes* are not
//! coordinated — last full rewrite wins.

use crate::models::metadata::ObjectMetadata;
use std::{
    collections::HashMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{fs, sync::Mutex};
use uuid::Uuid;

/// Catalog filename beneath the storage root.
pub const CATALOG_FILE: &str = "metadata.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("metadata record `{0}` not found")]
    RecordNotFound(Uuid),
    #[error("unknown metadata action `{0}`, expected add, update, or delete")]
    InvalidAction(String),
    #[error("catalog is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Durable record store mapping object identity to descriptive attributes.
pub struct MetadataCatalog {
    path: PathBuf,
    writer: Mutex<()>,
}

impl MetadataCatalog {
    pub fn new(storage_root: impl AsRef<Path>) -> Self {
        Self {
            path: storage_root.as_ref().join(CATALOG_FILE),
            writer: Mutex::new(()),
        }
    }

    /// Read the full catalog. An absent file is an empty catalog, not an
    /// error; a present but undecodable file is.
    pub async fn load(&self) -> Result<Vec<ObjectMetadata>, CatalogError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn persist(&self, records: &[ObjectMetadata]) -> Result<(), CatalogError> {
        let encoded = serde_json::to_vec(records)?;
        fs::write(&self.path, encoded).await?;
        Ok(())
    }

    /// Append one record and rewrite the full catalog.
    pub async fn append(&self, record: ObjectMetadata) -> Result<(), CatalogError> {
        let _guard = self.writer.lock().await;
        let mut records = self.load().await?;
        records.push(record);
        self.persist(&records).await
    }

    /// Patch the custom-metadata mapping of the record with matching `id`.
    ///
    /// `add` and `update` insert-or-overwrite every pair in `changes`;
    /// `delete` removes the listed keys if present. Returns the updated
    /// record.
    pub async fn patch_custom_metadata(
        &self,
        id: Uuid,
        changes: &HashMap<String, String>,
        action: &str,
    ) -> Result<ObjectMetadata, CatalogError> {
        if !matches!(action, "add" | "update" | "delete") {
            return Err(CatalogError::InvalidAction(action.to_string()));
        }

        let _guard = self.writer.lock().await;
        let mut records = self.load().await?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(CatalogError::RecordNotFound(id))?;

        match action {
            "add" | "update" => {
                for (key, value) in changes {
                    record
                        .custom_metadata
                        .insert(key.clone(), value.clone());
                }
            }
            _ => {
                for key in changes.keys() {
                    record.custom_metadata.remove(key);
                }
            }
        }

        let updated = record.clone();
        self.persist(&records).await?;
        Ok(updated)
    }

    /// Every record whose `filename` or `bucket_name` equals `query` exactly.
    /// No substring matching, no ranking.
    pub async fn search(&self, query: &str) -> Result<Vec<ObjectMetadata>, CatalogError> {
        let records = self.load().await?;
        Ok(records
            .into_iter()
            .filter(|r| r.filename == query || r.bucket_name == query)
            .collect())
    }

    /// The most recently appended record for a (bucket, filename) key, if any.
    pub async fn latest_record(
        &self,
        bucket: &str,
        filename: &str,
    ) -> Result<Option<ObjectMetadata>, CatalogError> {
        let records = self.load().await?;
        Ok(records
            .into_iter()
            .rev()
            .find(|r| r.bucket_name == bucket && r.filename == filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn record(filename: &str, bucket: &str) -> ObjectMetadata {
        ObjectMetadata {
            id: Uuid::new_v4(),
            filename: filename.into(),
            bucket_name: bucket.into(),
            upload_time: Utc::now(),
            content_type: "text/plain".into(),
            size: 5,
            hash: "abc123".into(),
            owner: "anonymous".into(),
            tags: vec!["t1".into()],
            description: String::new(),
            version: "1.0".into(),
            permissions: "rw-r--r--".into(),
            checksum: "abc123".into(),
            last_accessed: Utc::now(),
            expiration: None,
            custom_metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn append_then_search_by_filename_and_bucket() {
        let dir = tempdir().unwrap();
        let catalog = MetadataCatalog::new(dir.path());

        let rec = record("a.txt", "docs");
        catalog.append(rec.clone()).await.unwrap();

        assert_eq!(catalog.search("a.txt").await.unwrap(), vec![rec.clone()]);
        assert_eq!(catalog.search("docs").await.unwrap(), vec![rec]);
        assert!(catalog.search("b.txt").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_on_missing_catalog_is_empty() {
        let dir = tempdir().unwrap();
        let catalog = MetadataCatalog::new(dir.path());
        assert!(catalog.search("anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_catalog_surfaces_decode_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CATALOG_FILE), b"not json").unwrap();
        let catalog = MetadataCatalog::new(dir.path());
        assert!(matches!(
            catalog.append(record("a.txt", "docs")).await,
            Err(CatalogError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn patch_add_update_delete_semantics() {
        let dir = tempdir().unwrap();
        let catalog = MetadataCatalog::new(dir.path());

        let mut rec = record("a.txt", "docs");
        rec.custom_metadata.insert("a".into(), "1".into());
        let id = rec.id;
        catalog.append(rec).await.unwrap();

        let changes = HashMap::from([("b".to_string(), "2".to_string())]);
        let patched = catalog.patch_custom_metadata(id, &changes, "add").await.unwrap();
        assert_eq!(patched.custom_metadata.get("a").unwrap(), "1");
        assert_eq!(patched.custom_metadata.get("b").unwrap(), "2");

        let changes = HashMap::from([("a".to_string(), "9".to_string())]);
        let patched = catalog
            .patch_custom_metadata(id, &changes, "update")
            .await
            .unwrap();
        assert_eq!(patched.custom_metadata.get("a").unwrap(), "9");
        assert_eq!(patched.custom_metadata.get("b").unwrap(), "2");

        let changes = HashMap::from([("a".to_string(), String::new())]);
        let patched = catalog
            .patch_custom_metadata(id, &changes, "delete")
            .await
            .unwrap();
        assert!(!patched.custom_metadata.contains_key("a"));
        assert_eq!(patched.custom_metadata.get("b").unwrap(), "2");

        // Patches are durable, not just in-memory.
        let reloaded = catalog.search("a.txt").await.unwrap();
        assert_eq!(reloaded[0].custom_metadata, patched.custom_metadata);
    }

    #[tokio::test]
    async fn patch_rejects_unknown_action() {
        let dir = tempdir().unwrap();
        let catalog = MetadataCatalog::new(dir.path());
        let rec = record("a.txt", "docs");
        let id = rec.id;
        catalog.append(rec).await.unwrap();

        let changes = HashMap::from([("a".to_string(), "1".to_string())]);
        assert!(matches!(
            catalog.patch_custom_metadata(id, &changes, "merge").await,
            Err(CatalogError::InvalidAction(_))
        ));
    }

    #[tokio::test]
    async fn patch_unknown_id_is_not_found() {
        let dir = tempdir().unwrap();
        let catalog = MetadataCatalog::new(dir.path());
        catalog.append(record("a.txt", "docs")).await.unwrap();

        let missing = Uuid::new_v4();
        let changes = HashMap::from([("a".to_string(), "1".to_string())]);
        assert!(matches!(
            catalog.patch_custom_metadata(missing, &changes, "add").await,
            Err(CatalogError::RecordNotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn latest_record_prefers_newest_append() {
        let dir = tempdir().unwrap();
        let catalog = MetadataCatalog::new(dir.path());

        let first = record("a.txt", "docs");
        let second = record("a.txt", "docs");
        let newest = second.id;
        catalog.append(first).await.unwrap();
        catalog.append(second).await.unwrap();

        let found = catalog.latest_record("docs", "a.txt").await.unwrap().unwrap();
        assert_eq!(found.id, newest);
        assert!(catalog.latest_record("docs", "b.txt").await.unwrap().is_none());
    }
}
