//! Defines routes for all bucket and object operations.
//!
//! ## Structure
//! - **Bucket-level endpoints**
//!   - `POST   /create-bucket?bucket=` — create bucket (primary + replicas)
//!   - `GET    /list?bucket=` — list filenames in a bucket
//!
//! - **Object-level endpoints**
//!   - `POST   /upload?bucket=` — multipart upload, encrypted at rest
//!   - `GET    /download?bucket=&filename=` — decrypt and return an object
//!   - `DELETE /delete?bucket=&filename=` — remove object and replica copies
//!
//! - **Catalog endpoints**
//!   - `GET    /search?query=` — exact-match metadata search
//!   - `POST   /update-metadata` — patch custom metadata by record id

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{
            create_bucket, delete_object, download_object, list_objects, search_objects,
            update_custom_metadata, upload_object,
        },
    },
    services::object_store::ObjectStore,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build and return the router for all storage routes.
///
/// The router carries shared state (`ObjectStore`) to all handlers.
pub fn routes() -> Router<ObjectStore> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // bucket-level routes
        .route("/create-bucket", post(create_bucket))
        .route("/list", get(list_objects))
        // object-level routes
        .route("/upload", post(upload_object))
        .route("/download", get(download_object))
        .route("/delete", delete(delete_object))
        // catalog routes
        .route("/search", get(search_objects))
        .route("/update-metadata", post(update_custom_metadata))
}
