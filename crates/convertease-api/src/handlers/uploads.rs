use crate::auth::ClientContext;
use crate::constants::MULTIPART_ENVELOPE_BYTES;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header::CONTENT_LENGTH, HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use convertease_core::models::{FormatCategory, UploadedFile};
use convertease_core::AppError;
use convertease_infra::ErrorResponse;
use convertease_services::IncomingFile;
use futures::channel::mpsc;
use futures::SinkExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

/// Chunks buffered between the multipart reader and the staging writer
const STREAM_BUFFER: usize = 8;

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub upload_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub category: FormatCategory,
    pub size_bytes: u64,
    /// Codes of every format this file can be converted to
    pub compatible_formats: Vec<String>,
    pub created_at: DateTime<Utc>,
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::InvalidInput(format!("Failed to read multipart body: {}", err))
}

/// Body size announced by the client, minus the multipart envelope.
fn declared_file_size(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|len| len.saturating_sub(MULTIPART_ENVELOPE_BYTES))
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    tag = "uploads",
    request_body(content = inline(Object), content_type = "multipart/form-data", description = "Exactly one file part"),
    responses(
        (status = 201, description = "File validated and staged", body = UploadResponse),
        (status = 400, description = "No file, more than one file, or malformed body", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 413, description = "File exceeds the tier limit", body = ErrorResponse),
        (status = 415, description = "Type not convertible or content does not match it", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, headers, multipart), fields(client_id = %client.client_id))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    client: ClientContext,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), HttpAppError> {
    let declared_size = declared_file_size(&headers);

    let mut staged: Option<UploadedFile> = None;
    let mut file_count = 0usize;
    let mut read_error = None;

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                read_error = Some(multipart_error(e));
                break;
            }
        };

        // Plain form fields carry no file name and are ignored.
        if field.file_name().is_none() {
            continue;
        }
        file_count += 1;
        if file_count > 1 {
            continue;
        }

        let (mut tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(STREAM_BUFFER);
        let incoming = IncomingFile {
            declared_name: field.file_name().unwrap_or_default().to_string(),
            declared_type: field.content_type().unwrap_or_default().to_string(),
            declared_size,
            body: Box::pin(rx),
        };

        let intake = state.intake.clone();
        let identity = client.0.clone();
        let staging: JoinHandle<Result<UploadedFile, AppError>> =
            tokio::spawn(async move { intake.stage(&identity, vec![incoming]).await });

        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    // Intake stopped reading: the file is already rejected.
                    if tx.send(Ok(chunk)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let message = e.to_string();
                    let _ = tx.send(Err(std::io::Error::other(message.clone()))).await;
                    read_error = Some(AppError::InvalidInput(format!(
                        "Failed to read file data: {}",
                        message
                    )));
                    break;
                }
            }
        }
        drop(tx);

        let outcome = staging
            .await
            .map_err(|e| AppError::Internal(format!("Staging task failed: {}", e)))?;
        if let Some(err) = read_error {
            if let Ok(upload) = &outcome {
                state.intake.discard(upload.id).await;
            }
            return Err(err.into());
        }
        // A rejected file ends the request without reading the rest of the body
        staged = Some(outcome?);
    }

    let rejection = if file_count > 1 {
        Some(AppError::TooManyFiles { count: file_count })
    } else {
        read_error
    };
    if let Some(err) = rejection {
        if let Some(upload) = &staged {
            state.intake.discard(upload.id).await;
        }
        return Err(err.into());
    }

    let upload = staged.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;

    let compatible_formats = state
        .registry
        .compatible_formats(&upload.content_type)
        .into_iter()
        .map(|f| f.code.clone())
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            upload_id: upload.id,
            filename: upload.filename,
            content_type: upload.content_type,
            category: upload.category,
            size_bytes: upload.size_bytes,
            compatible_formats,
            created_at: upload.created_at,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_declared_file_size_subtracts_envelope() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_file_size(&headers), None);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1000"));
        assert_eq!(declared_file_size(&headers), Some(0));

        let big = (2u64 << 30).to_string();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_str(&big).unwrap());
        assert_eq!(
            declared_file_size(&headers),
            Some((2u64 << 30) - MULTIPART_ENVELOPE_BYTES)
        );
    }
}
