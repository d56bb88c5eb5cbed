//! HTTP handlers for direct photo upload and download.
//! Streams object bodies to avoid buffering in memory and delegates storage
//! and credential checks to `LocalBlobStore`. The credential travels as the
//! request's query string.

use crate::{
    errors::AppError,
    models::{
        container::ContainerName,
        object::{ObjectName, ObjectPath, StoredObject},
    },
    services::storage_service::StorageError,
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::io;
use tokio_util::io::ReaderStream;

fn object_path(container: &str, object: &str) -> Result<ObjectPath, StorageError> {
    let container = ContainerName::parse(container).map_err(StorageError::InvalidName)?;
    let object = ObjectName::parse(object).map_err(StorageError::InvalidName)?;
    Ok(ObjectPath::new(container, object))
}

/// PUT `/storage/{container}/{object}` — upload with a create/write credential.
pub async fn put_blob(
    State(state): State<AppState>,
    Path((container, object)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let path = object_path(&container, &object)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));

    let (stored, created) = state
        .blob_store
        .put_object_stream(&path, query.as_deref(), content_type, stream)
        .await?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    if let Some(etag) = stored.etag.as_ref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            response.headers_mut().insert(header::ETAG, value);
        }
    }
    Ok(response)
}

/// GET `/storage/{container}/{object}` — stream the payload with a read credential.
pub async fn get_blob(
    State(state): State<AppState>,
    Path((container, object)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let path = object_path(&container, &object)?;
    let (meta, file) = state
        .blob_store
        .get_object_reader(&path, query.as_deref())
        .await?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// HEAD `/storage/{container}/{object}` — same headers as GET but no body.
pub async fn head_blob(
    State(state): State<AppState>,
    Path((container, object)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let path = object_path(&container, &object)?;
    let meta = state
        .blob_store
        .get_object_metadata(&path, query.as_deref())
        .await?;

    let mut response = Response::new(Body::empty());
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// DELETE `/storage/{container}/{object}` — requires a credential with `d`.
pub async fn delete_blob(
    State(state): State<AppState>,
    Path((container, object)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Result<StatusCode, AppError> {
    let path = object_path(&container, &object)?;
    state
        .blob_store
        .delete_object(&path, query.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &StoredObject) {
    let content_type = meta
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(meta.size_bytes.max(0)),
    );

    if let Some(etag) = meta.etag.as_ref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&meta.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    // presented URLs are short-lived; do not let shared caches outlive them
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("private, no-store"));
}
