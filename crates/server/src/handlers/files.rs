//! File upload, listing, deletion and download handlers.

use crate::error::{ApiError, ApiResult};
use crate::ingest::IngestError;
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use serde::Serialize;
use stash_core::{FileId, FileRecord, Rejection, StorageName};
use stash_storage::BlobStore;

/// Multipart field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

/// Content type recorded when the client does not declare one.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Plain message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Body-read failures: a 413 from the body limit means the upload is too
/// large, anything else is a malformed request.
fn body_error(err: MultipartError, limit: u64) -> IngestError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        IngestError::Rejected(Rejection::TooLarge { limit })
    } else {
        IngestError::Client(err.body_text())
    }
}

/// POST /upload - Upload one file as multipart field `file`.
///
/// The first part named `file` that carries a filename is ingested; its
/// bytes are streamed to storage without buffering the whole body. Other
/// fields are ignored.
#[tracing::instrument(skip_all)]
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<FileRecord>)> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = state.coordinator.gate().max_size_bytes();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| body_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        // Browsers send an empty filename when no file was chosen.
        let Some(original_name) = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .map(str::to_owned)
        else {
            continue;
        };
        let mime_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_owned();

        let body = field.map_err(move |e| body_error(e, limit));
        let record = state
            .coordinator
            .ingest(&original_name, &mime_type, body)
            .await?;
        return Ok((StatusCode::CREATED, Json(record)));
    }

    metrics::UPLOADS_REJECTED
        .with_label_values(&["missing_file"])
        .inc();
    Err(IngestError::MissingFile.into())
}

/// GET / - List all files, newest first.
pub async fn list_files(State(state): State<AppState>) -> ApiResult<Json<Vec<FileRecord>>> {
    Ok(Json(state.coordinator.list().await?))
}

/// DELETE /{id} - Delete a file and its blob.
///
/// Ids that are not UUIDs cannot name a file and are reported as not found.
#[tracing::instrument(skip(state))]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = FileId::parse(&id).map_err(|_| ApiError::NotFound)?;
    state.coordinator.remove(id).await?;
    Ok(Json(MessageResponse {
        message: "file deleted successfully",
    }))
}

/// GET {public_prefix}/{storage_name} - Stream a stored file.
///
/// Only cataloged files are served; a blob without a catalog row is a 404.
#[tracing::instrument(skip(state))]
pub async fn get_blob(
    State(state): State<AppState>,
    Path(storage_name): Path<String>,
) -> ApiResult<Response> {
    let name = StorageName::parse(&storage_name).map_err(|_| ApiError::NotFound)?;
    let record = state
        .coordinator
        .find_by_storage_name(&name)
        .await?
        .ok_or(ApiError::NotFound)?;

    let stream = match state.storage.get_stream(&name).await {
        Ok(stream) => stream,
        Err(e) if e.is_not_found() => {
            tracing::warn!(
                file_id = %record.id,
                storage_name = %name,
                "Cataloged file has no blob"
            );
            return Err(ApiError::NotFound);
        }
        Err(e) => return Err(e.into()),
    };

    let content_type = HeaderValue::from_str(&record.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let disposition = HeaderValue::from_str(&format!(
        "inline; filename=\"{}\"",
        disposition_filename(&record.original_name)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("inline"));

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, content_type),
            (CONTENT_LENGTH, HeaderValue::from(record.size_bytes)),
            (CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Reduce a client-supplied name to printable ASCII safe inside a quoted
/// header parameter.
fn disposition_filename(original_name: &str) -> String {
    original_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect()
}
