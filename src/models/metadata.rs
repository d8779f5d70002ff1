//! Metadata records describing stored objects.
//!
//! One `ObjectMetadata` record is appended to the catalog per upload. Records
//! are an append-mostly audit trail: deleting an object does not remove its
//! record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Descriptive attributes of one uploaded object.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ObjectMetadata {
    /// Opaque identifier generated at upload time. Unique and stable for the
    /// life of the object.
    pub id: Uuid,

    /// Filename the object was uploaded under.
    pub filename: String,

    /// Bucket the object lives in.
    pub bucket_name: String,

    /// When the upload happened.
    pub upload_time: DateTime<Utc>,

    /// Content type (MIME type) supplied with the upload.
    pub content_type: String,

    /// Plaintext size in bytes.
    pub size: i64,

    /// Hex-encoded SHA-256 digest of the plaintext.
    pub hash: String,

    /// Owner of the object.
    pub owner: String,

    /// Free-form tags, order preserved.
    pub tags: Vec<String>,

    /// Free-form description.
    pub description: String,

    /// Version string.
    pub version: String,

    /// Permission string (e.g. "rw-r--r--").
    pub permissions: String,

    /// Same digest algorithm as `hash`.
    pub checksum: String,

    /// Last time the record was touched.
    pub last_accessed: DateTime<Utc>,

    /// Optional expiration timestamp.
    pub expiration: Option<DateTime<Utc>>,

    /// Custom metadata keys mapped to string values.
    pub custom_metadata: HashMap<String, String>,
}

/// Caller-supplied attributes for a new upload — everything the storage
/// engine cannot derive from the payload itself.
#[derive(Debug, Clone)]
pub struct MetadataSeed {
    pub content_type: Option<String>,
    pub owner: String,
    pub tags: Vec<String>,
    pub description: String,
    pub version: String,
    pub permissions: String,
    pub expiration: Option<DateTime<Utc>>,
    pub custom_metadata: HashMap<String, String>,
}

impl Default for MetadataSeed {
    fn default() -> Self {
        Self {
            content_type: None,
            owner: "anonymous".into(),
            tags: Vec::new(),
            description: String::new(),
            version: "1.0".into(),
            permissions: "rw-r--r--".into(),
            expiration: None,
            custom_metadata: HashMap::new(),
        }
    }
}

/// Request body for `POST /update-metadata`.
#[derive(Debug, Deserialize)]
pub struct CustomMetadataRequest {
    /// Record to patch.
    pub id: Uuid,

    /// Keys to merge or remove.
    pub custom_metadata: HashMap<String, String>,

    /// One of "add", "update", "delete".
    pub action: String,
}
