//! ObjectStore — the storage engine behind the HTTP surface.
//!
//! Composes the crypto store, metadata catalog, bucket manager, replication
//! engine, and SBOM scanner into the upload/download/list/delete/search
//! operations. Payloads are sealed before they touch the primary namespace;
//! replicas receive the same ciphertext. There are no per-object locks:
//! concurrent uploads to one (bucket, filename) race last-writer-wins on
//! both the object file and the catalog rewrite.

use crate::{
    models::metadata::{MetadataSeed, ObjectMetadata},
    services::{
        buckets::{BucketError, BucketManager},
        catalog::{CatalogError, MetadataCatalog},
        crypto::{CryptoError, CryptoStore},
        replication::ReplicationEngine,
        sbom::{SIDECAR_SUFFIX, SbomScanner},
    },
};
use bytes::Bytes;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_FILENAME_LEN: usize = 1024;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{filename}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, filename: String },
    #[error("invalid object filename")]
    InvalidFilename,
    #[error(transparent)]
    Bucket(#[from] BucketError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A decrypted object ready to be returned to the client.
#[derive(Debug)]
pub struct DownloadedObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// The storage engine. Cheap to clone; shared as axum state.
#[derive(Clone)]
pub struct ObjectStore {
    crypto: CryptoStore,
    catalog: Arc<MetadataCatalog>,
    buckets: Arc<BucketManager>,
    replicator: ReplicationEngine,
    scanner: SbomScanner,
}

impl ObjectStore {
    pub fn new(
        crypto: CryptoStore,
        catalog: MetadataCatalog,
        buckets: BucketManager,
        replicator: ReplicationEngine,
        scanner: SbomScanner,
    ) -> Self {
        Self {
            crypto,
            catalog: Arc::new(catalog),
            buckets: Arc::new(buckets),
            replicator,
            scanner,
        }
    }

    /// Storage root directory, for readiness probes.
    pub fn root(&self) -> &Path {
        self.buckets.root()
    }

    /// Reject filenames that could escape the bucket directory. Objects live
    /// flat beneath the bucket, so separators are rejected outright.
    fn ensure_filename_safe(&self, filename: &str) -> StorageResult<()> {
        if filename.is_empty() || filename.len() > MAX_FILENAME_LEN {
            return Err(StorageError::InvalidFilename);
        }
        if filename.contains('/') || filename.contains("..") || filename.starts_with('.') {
            return Err(StorageError::InvalidFilename);
        }
        if filename
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::InvalidFilename);
        }
        Ok(())
    }

    fn object_path(&self, bucket: &str, filename: &str) -> PathBuf {
        self.buckets.bucket_path(bucket).join(filename)
    }

    /// Create a bucket namespace on the primary and every replica root.
    pub async fn create_bucket(&self, name: &str) -> StorageResult<()> {
        self.buckets.create(name).await?;
        Ok(())
    }

    /// Upload one object: digest the plaintext, optionally record an SBOM
    /// sidecar, seal, persist to the primary namespace, append a catalog
    /// record, and queue replication of the sealed bytes. Returns the
    /// created record once the primary copy and the catalog are durable;
    /// replication completes (or fails) in the background.
    pub async fn upload(
        &self,
        bucket: &str,
        filename: &str,
        seed: MetadataSeed,
        data: Bytes,
    ) -> StorageResult<ObjectMetadata> {
        self.buckets.validate_name(bucket)?;
        self.ensure_filename_safe(filename)?;
        if !self.buckets.exists(bucket).await {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }

        let hash = hex::encode(Sha256::digest(&data));

        let mut custom_metadata = seed.custom_metadata;
        if self.scanner.is_enabled() {
            if let Some(sidecar) = self.generate_sidecar(bucket, filename, &data).await {
                custom_metadata.insert("sbom_file_path".to_string(), sidecar);
            }
        }

        let sealed = Bytes::from(self.crypto.seal(&data)?);
        self.write_sealed(bucket, filename, &sealed).await?;

        let now = Utc::now();
        let record = ObjectMetadata {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            bucket_name: bucket.to_string(),
            upload_time: now,
            content_type: seed
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            size: data.len() as i64,
            hash: hash.clone(),
            owner: seed.owner,
            tags: seed.tags,
            description: seed.description,
            version: seed.version,
            permissions: seed.permissions,
            checksum: hash,
            last_accessed: now,
            expiration: seed.expiration,
            custom_metadata,
        };
        self.catalog.append(record.clone()).await?;

        self.replicator.schedule(bucket, filename, sealed);
        Ok(record)
    }

    /// Read and decrypt the primary copy. A missing object and a tampered
    /// payload are distinct failures.
    pub async fn download(&self, bucket: &str, filename: &str) -> StorageResult<DownloadedObject> {
        self.buckets.validate_name(bucket)?;
        self.ensure_filename_safe(filename)?;

        let path = self.object_path(bucket, filename);
        let sealed = fs::read(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    filename: filename.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;

        let bytes = self.crypto.open(&sealed)?;
        let content_type = match self.catalog.latest_record(bucket, filename).await {
            Ok(Some(record)) => record.content_type,
            Ok(None) => DEFAULT_CONTENT_TYPE.to_string(),
            Err(err) => {
                debug!("catalog lookup failed for {}/{}: {}", bucket, filename, err);
                DEFAULT_CONTENT_TYPE.to_string()
            }
        };

        Ok(DownloadedObject { bytes, content_type })
    }

    /// Filenames in the bucket's primary namespace. Internal artifacts
    /// (temp files, SBOM sidecars) are not listed.
    pub async fn list(&self, bucket: &str) -> StorageResult<Vec<String>> {
        self.buckets.validate_name(bucket)?;

        let mut entries = fs::read_dir(self.buckets.bucket_path(bucket))
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    StorageError::BucketNotFound(bucket.to_string())
                } else {
                    StorageError::Io(err)
                }
            })?;

        let mut filenames = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name.ends_with(SIDECAR_SUFFIX) {
                continue;
            }
            filenames.push(name);
        }
        filenames.sort();
        Ok(filenames)
    }

    /// Remove the primary copy, then best-effort remove every replica copy.
    /// The catalog record is intentionally left in place.
    pub async fn delete(&self, bucket: &str, filename: &str) -> StorageResult<()> {
        self.buckets.validate_name(bucket)?;
        self.ensure_filename_safe(filename)?;

        let path = self.object_path(bucket, filename);
        fs::remove_file(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    filename: filename.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;

        for replica_bucket in self.buckets.replica_bucket_paths(bucket) {
            let replica_copy = replica_bucket.join(filename);
            match fs::remove_file(&replica_copy).await {
                Ok(()) => debug!("removed replica copy {}", replica_copy.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!(
                    "failed to remove replica copy {}: {}",
                    replica_copy.display(),
                    err
                ),
            }
        }
        Ok(())
    }

    /// Exact-match catalog search over filename and bucket name.
    pub async fn search(&self, query: &str) -> StorageResult<Vec<ObjectMetadata>> {
        Ok(self.catalog.search(query).await?)
    }

    /// Patch one record's custom metadata by id.
    pub async fn patch_custom_metadata(
        &self,
        id: Uuid,
        changes: &HashMap<String, String>,
        action: &str,
    ) -> StorageResult<ObjectMetadata> {
        Ok(self.catalog.patch_custom_metadata(id, changes, action).await?)
    }

    /// Catalog readability check for the readiness probe. Returns the
    /// record count.
    pub async fn catalog_check(&self) -> Result<usize, CatalogError> {
        Ok(self.catalog.load().await?.len())
    }

    /// Write sealed bytes to a temp file, fsync, and rename into place so a
    /// crashed upload never leaves a half-written object at the final key.
    async fn write_sealed(&self, bucket: &str, filename: &str, sealed: &[u8]) -> StorageResult<()> {
        let bucket_dir = self.buckets.bucket_path(bucket);
        let tmp_path = bucket_dir.join(format!(".tmp-{}", Uuid::new_v4()));

        let mut file = File::create(&tmp_path).await?;
        let write = async {
            file.write_all(sealed).await?;
            file.flush().await?;
            file.sync_all().await
        };
        if let Err(err) = write.await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        let final_path = bucket_dir.join(filename);
        if let Err(err) = fs::rename(&tmp_path, &final_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&final_path).await?;
                fs::rename(&tmp_path, &final_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        Ok(())
    }

    /// Stage the plaintext for the external scanner and collect the sidecar
    /// path. Any failure here is an omitted annotation, not an upload error.
    async fn generate_sidecar(&self, bucket: &str, filename: &str, data: &[u8]) -> Option<String> {
        let bucket_dir = self.buckets.bucket_path(bucket);
        let staged = bucket_dir.join(format!(".scan-{}", Uuid::new_v4()));
        if let Err(err) = fs::write(&staged, data).await {
            warn!("failed to stage {}/{} for sbom scan: {}", bucket, filename, err);
            return None;
        }

        let sidecar = bucket_dir.join(format!("{filename}{SIDECAR_SUFFIX}"));
        let result = self.scanner.scan(&staged, &sidecar).await;
        let _ = fs::remove_file(&staged).await;
        result
    }
}
