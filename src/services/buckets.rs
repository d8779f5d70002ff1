//! Bucket namespace lifecycle across primary and replica storage roots.
//!
//! A bucket is a directory under the storage root, mirrored at the same
//! relative path under every configured replica root. Creation is idempotent
//! on the primary; a replica failure after the primary succeeded leaves the
//! namespace partially created (no rollback).

use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::fs;

const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidName { name: String, reason: String },
    #[error("failed to create bucket `{name}` at {path}: {source}")]
    Create {
        name: String,
        path: PathBuf,
        source: io::Error,
    },
}

/// Creates and locates bucket namespaces.
pub struct BucketManager {
    root: PathBuf,
    replicas: Vec<String>,
}

impl BucketManager {
    pub fn new(root: impl Into<PathBuf>, replicas: Vec<String>) -> Self {
        Self {
            root: root.into(),
            replicas,
        }
    }

    /// Validate a bucket name before it touches the filesystem.
    ///
    /// Names arrive untrusted from the request boundary; this rejects
    /// anything that could escape the storage root, plus names outside
    /// S3-style conventions:
    /// - 3–63 characters
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start or end with a dot or hyphen
    /// - no consecutive dots
    pub fn validate_name(&self, name: &str) -> Result<(), BucketError> {
        let invalid = |reason: &str| BucketError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        };

        let len = name.len();
        if len < BUCKET_NAME_MIN_LEN || len > BUCKET_NAME_MAX_LEN {
            return Err(invalid("must be between 3 and 63 characters"));
        }
        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return Err(invalid(
                "allowed characters are lowercase letters, digits, dots, and hyphens",
            ));
        }
        if name.starts_with('.') || name.ends_with('.') || name.starts_with('-') || name.ends_with('-')
        {
            return Err(invalid("must start and end with a lowercase letter or digit"));
        }
        if name.contains("..") {
            return Err(invalid("cannot contain consecutive dots"));
        }
        Ok(())
    }

    /// Create the primary namespace for `name`, then the same relative path
    /// under every replica root. An already-existing directory is not an
    /// error. Fails on the first directory that cannot be created, leaving
    /// anything created so far in place.
    pub async fn create(&self, name: &str) -> Result<(), BucketError> {
        self.validate_name(name)?;

        let primary = self.bucket_path(name);
        fs::create_dir_all(&primary).await.map_err(|source| BucketError::Create {
            name: name.to_string(),
            path: primary.clone(),
            source,
        })?;

        for path in self.replica_bucket_paths(name) {
            fs::create_dir_all(&path).await.map_err(|source| BucketError::Create {
                name: name.to_string(),
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Whether the primary namespace for `name` exists.
    pub async fn exists(&self, name: &str) -> bool {
        fs::try_exists(self.bucket_path(name)).await.unwrap_or(false)
    }

    /// Primary namespace directory for `name`. Does not check existence.
    pub fn bucket_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// The mirrored namespace directory under each replica root.
    pub fn replica_bucket_paths(&self, name: &str) -> Vec<PathBuf> {
        self.replicas
            .iter()
            .map(|replica| self.root.join(replica).join(name))
            .collect()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manager(root: &Path) -> BucketManager {
        BucketManager::new(root, vec!["replica1".into(), "replica2".into()])
    }

    #[tokio::test]
    async fn create_is_idempotent_and_mirrors_replicas() {
        let dir = tempdir().unwrap();
        let buckets = manager(dir.path());

        buckets.create("docs").await.unwrap();
        buckets.create("docs").await.unwrap();

        assert!(dir.path().join("docs").is_dir());
        assert!(dir.path().join("replica1/docs").is_dir());
        assert!(dir.path().join("replica2/docs").is_dir());
        assert!(buckets.exists("docs").await);
        assert!(!buckets.exists("other").await);
    }

    #[tokio::test]
    async fn rejects_traversal_and_malformed_names() {
        let dir = tempdir().unwrap();
        let buckets = manager(dir.path());

        for name in ["", "ab", "has/slash", "dot..dot", "-lead", "trail-", "UPPER", "a\\b"] {
            assert!(
                matches!(buckets.create(name).await, Err(BucketError::InvalidName { .. })),
                "expected `{name}` to be rejected"
            );
        }
    }
}
