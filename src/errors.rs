use crate::services::{
    buckets::BucketError,
    catalog::CatalogError,
    object_store::StorageError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for handler errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Map storage-engine failures onto HTTP statuses. Every variant surfaces to
/// the client as a distinct, mappable failure; only replication errors are
/// swallowed, and those never reach a handler.
impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        let status = match &err {
            StorageError::BucketNotFound(_) | StorageError::ObjectNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            StorageError::Catalog(CatalogError::RecordNotFound(_)) => StatusCode::NOT_FOUND,
            StorageError::Catalog(CatalogError::InvalidAction(_)) => StatusCode::BAD_REQUEST,
            StorageError::InvalidFilename
            | StorageError::Bucket(BucketError::InvalidName { .. }) => StatusCode::BAD_REQUEST,
            StorageError::Bucket(BucketError::Create { .. })
            | StorageError::Crypto(_)
            | StorageError::Catalog(_)
            | StorageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
