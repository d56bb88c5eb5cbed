//! Upload-intent endpoint.

use crate::{errors::AppError, state::AppState};
use axum::{
    Json,
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

/// Seconds a client should wait before retrying after a storage outage.
const RETRY_AFTER_SECS: u32 = 2;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub file_name: Option<String>,
}

/// POST `/api/storage/generate-upload-url`
///
/// Returns `{uploadUrl, finalObjectUrl}`. The client PUTs the photo to
/// `uploadUrl` and stores `finalObjectUrl` in its review. Storage outages
/// answer 503 with `Retry-After`.
pub async fn generate_upload_url(
    State(state): State<AppState>,
    Json(request): Json<UploadUrlRequest>,
) -> Response {
    match state
        .uploads
        .issue_upload_target(request.file_name.as_deref())
        .await
    {
        Ok(target) => Json(target).into_response(),
        Err(err) => {
            let retryable = err.is_retryable();
            let mut response = AppError::from(err).into_response();
            if retryable {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
            }
            response
        }
    }
}
