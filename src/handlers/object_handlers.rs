//! HTTP handlers for bucket and object operations.
//!
//! Thin translation between the wire and `ObjectStore`: query parameters and
//! multipart bodies in, JSON (or raw object bytes) out. Storage semantics
//! live in the services layer.

use crate::{
    errors::AppError,
    models::metadata::{CustomMetadataRequest, MetadataSeed, ObjectMetadata},
    services::object_store::ObjectStore,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct BucketQuery {
    pub bucket: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectQuery {
    pub bucket: String,
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

/// POST `/create-bucket?bucket=` — create a bucket on the primary and every
/// replica root.
pub async fn create_bucket(
    State(store): State<ObjectStore>,
    Query(q): Query<BucketQuery>,
) -> Result<impl IntoResponse, AppError> {
    store.create_bucket(&q.bucket).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "bucket": q.bucket, "status": "created" })),
    ))
}

/// POST `/upload?bucket=` — multipart upload; the payload arrives in the
/// `file` field. Responds with the created metadata record.
pub async fn upload_object(
    State(store): State<ObjectStore>,
    Query(q): Query<BucketQuery>,
    mut multipart: Multipart,
) -> Result<Json<ObjectMetadata>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request("multipart `file` field needs a filename"))?;
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(err.to_string()))?;

        let seed = MetadataSeed {
            content_type,
            ..Default::default()
        };
        let record = store.upload(&q.bucket, &filename, seed, data).await?;
        return Ok(Json(record));
    }

    Err(AppError::bad_request("multipart field `file` is required"))
}

/// GET `/download?bucket=&filename=` — decrypted object bytes as an
/// attachment.
pub async fn download_object(
    State(store): State<ObjectStore>,
    Query(q): Query<ObjectQuery>,
) -> Result<Response, AppError> {
    let object = store.download(&q.bucket, &q.filename).await?;

    let mut response = Response::new(Body::from(object.bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&object.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    let disposition = format!("attachment; filename=\"{}\"", q.filename);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// GET `/list?bucket=` — filenames in the bucket as a JSON array.
pub async fn list_objects(
    State(store): State<ObjectStore>,
    Query(q): Query<BucketQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(store.list(&q.bucket).await?))
}

/// DELETE `/delete?bucket=&filename=` — remove the object from the primary
/// and, best-effort, from every replica.
pub async fn delete_object(
    State(store): State<ObjectStore>,
    Query(q): Query<ObjectQuery>,
) -> Result<impl IntoResponse, AppError> {
    store.delete(&q.bucket, &q.filename).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "bucket": q.bucket, "filename": q.filename, "status": "deleted" })),
    ))
}

/// GET `/search?query=` — metadata records whose filename or bucket name
/// equals the query exactly.
pub async fn search_objects(
    State(store): State<ObjectStore>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<ObjectMetadata>>, AppError> {
    Ok(Json(store.search(&q.query).await?))
}

/// POST `/update-metadata` — patch one record's custom metadata. Responds
/// with the updated record.
pub async fn update_custom_metadata(
    State(store): State<ObjectStore>,
    Json(req): Json<CustomMetadataRequest>,
) -> Result<Json<ObjectMetadata>, AppError> {
    let record = store
        .patch_custom_metadata(req.id, &req.custom_metadata, &req.action)
        .await?;
    Ok(Json(record))
}
