//! Conversion jobs: submit, poll, cancel, download and delete results.

use crate::auth::ClientContext;
use crate::constants::API_PREFIX;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use convertease_core::models::{
    ConversionJob, ConversionSettings, FormatCategory, JobFailure, JobStatus,
};
use convertease_core::AppError;
use convertease_infra::ErrorResponse;
use convertease_services::CancelOutcome;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConversionRequest {
    pub upload_id: Uuid,
    /// Target format code, e.g. `PNG` or `PDF` (case-insensitive)
    pub target_format: String,
    /// Image options; omit for document targets
    #[serde(default)]
    pub settings: Option<ConversionSettings>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateConversionResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Download details of a succeeded job.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResultInfo {
    pub download_url: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub source_filename: String,
    pub target_format: String,
    pub category: FormatCategory,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

impl From<ConversionJob> for JobResponse {
    fn from(job: ConversionJob) -> Self {
        let result = job.result.map(|summary| ResultInfo {
            download_url: format!("{}/conversions/{}/result", API_PREFIX, job.id),
            filename: summary.filename,
            content_type: summary.content_type,
            size_bytes: summary.size_bytes,
            expires_at: summary.expires_at,
        });

        Self {
            job_id: job.id,
            status: job.status,
            source_filename: job.source_filename,
            target_format: job.target_format,
            category: job.category,
            attempts: job.attempts,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            result,
            error: job.failure,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponse {
    pub job_id: Uuid,
    /// Status after the request; `running` while a cooperative cancel is pending
    pub status: JobStatus,
    /// Whether the job is or will end up cancelled
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Job owned by the caller. Other clients' jobs are reported as missing.
async fn owned_job(
    state: &AppState,
    client: &ClientContext,
    job_id: Uuid,
) -> Result<ConversionJob, AppError> {
    let job = state.jobs.status(job_id).await?;
    if job.client_id != client.client_id {
        return Err(AppError::NotFound(format!("Job {} not found", job_id)));
    }
    Ok(job)
}

fn content_disposition(filename: &str) -> HeaderValue {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded = utf8_percent_encode(filename, NON_ALPHANUMERIC);
    HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii, encoded
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[utoipa::path(
    post,
    path = "/api/v1/conversions",
    tag = "conversions",
    request_body = CreateConversionRequest,
    responses(
        (status = 202, description = "Job queued", body = CreateConversionResponse),
        (status = 400, description = "Malformed body or upload already converted", body = ErrorResponse),
        (status = 404, description = "Upload not found", body = ErrorResponse),
        (status = 415, description = "Target not reachable from the upload's type", body = ErrorResponse),
        (status = 422, description = "Settings rejected for this target", body = ErrorResponse),
        (status = 429, description = "Too many active jobs for the tier", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, request), fields(client_id = %client.client_id, upload_id = %request.upload_id))]
pub async fn create_conversion(
    State(state): State<Arc<AppState>>,
    client: ClientContext,
    ValidatedJson(request): ValidatedJson<CreateConversionRequest>,
) -> Result<(StatusCode, Json<CreateConversionResponse>), HttpAppError> {
    let upload = state
        .intake
        .get(&client.client_id, request.upload_id)
        .await?;

    let job = state
        .jobs
        .submit(&upload, &request.target_format, request.settings)
        .await?;
    state.intake.claim(upload.id).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateConversionResponse {
            job_id: job.id,
            status: job.status,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversions",
    tag = "conversions",
    responses(
        (status = 200, description = "The caller's jobs, oldest first", body = Vec<JobResponse>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_conversions(
    State(state): State<Arc<AppState>>,
    client: ClientContext,
) -> Json<Vec<JobResponse>> {
    let jobs = state.jobs.list(&client.client_id).await;
    Json(jobs.into_iter().map(JobResponse::from).collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/conversions/{job_id}",
    tag = "conversions",
    params(("job_id" = Uuid, Path, description = "Conversion job ID")),
    responses(
        (status = 200, description = "Current job status", body = JobResponse),
        (status = 404, description = "Job not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_conversion(
    State(state): State<Arc<AppState>>,
    client: ClientContext,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>, HttpAppError> {
    let job = owned_job(&state, &client, job_id).await?;
    Ok(Json(job.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/conversions/{job_id}",
    tag = "conversions",
    params(("job_id" = Uuid, Path, description = "Conversion job ID")),
    responses(
        (status = 200, description = "Cancellation outcome", body = CancelResponse),
        (status = 404, description = "Job not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state), fields(client_id = %client.client_id))]
pub async fn cancel_conversion(
    State(state): State<Arc<AppState>>,
    client: ClientContext,
    Path(job_id): Path<Uuid>,
) -> Result<Json<CancelResponse>, HttpAppError> {
    owned_job(&state, &client, job_id).await?;

    let (cancelled, message) = match state.jobs.cancel(job_id).await {
        Ok(CancelOutcome::Cancelled) => (true, None),
        Ok(CancelOutcome::CancellationRequested) => (
            true,
            Some("Cancellation requested; the job stops at its next checkpoint".to_string()),
        ),
        Ok(CancelOutcome::Finished(status)) => (
            status == JobStatus::Cancelled,
            Some(format!("Job already {}", status)),
        ),
        Err(AppError::CancellationNotSupported(msg)) => (false, Some(msg)),
        Err(e) => return Err(e.into()),
    };

    let job = state.jobs.status(job_id).await?;
    Ok(Json(CancelResponse {
        job_id,
        status: job.status,
        cancelled,
        message,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversions/{job_id}/result",
    tag = "conversions",
    params(("job_id" = Uuid, Path, description = "Conversion job ID")),
    responses(
        (status = 200, description = "Converted file", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 404, description = "No result, or the result expired", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state), fields(client_id = %client.client_id))]
pub async fn download_result(
    State(state): State<Arc<AppState>>,
    client: ClientContext,
    Path(job_id): Path<Uuid>,
) -> Result<Response, HttpAppError> {
    let owned = state
        .results
        .metadata(job_id)
        .await
        .is_some_and(|r| r.client_id == client.client_id);
    if !owned {
        return Err(AppError::NotFound(format!("No result for job {}", job_id)).into());
    }

    let (result, data) = state.results.get(job_id).await?;

    let content_type = HeaderValue::from_str(&result.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, content_disposition(&result.filename)),
            (header::CACHE_CONTROL, HeaderValue::from_static("private, no-store")),
        ],
        Body::from(data),
    )
        .into_response())
}

#[utoipa::path(
    delete,
    path = "/api/v1/conversions/{job_id}/result",
    tag = "conversions",
    params(("job_id" = Uuid, Path, description = "Conversion job ID")),
    responses(
        (status = 204, description = "Result deleted"),
        (status = 404, description = "No result for this job", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state), fields(client_id = %client.client_id))]
pub async fn delete_result(
    State(state): State<Arc<AppState>>,
    client: ClientContext,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    let owned = state
        .results
        .metadata(job_id)
        .await
        .is_some_and(|r| r.client_id == client.client_id);
    if !owned {
        return Err(AppError::NotFound(format!("No result for job {}", job_id)).into());
    }

    state.results.delete(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_escapes_quotes() {
        let value = content_disposition("my \"report\".pdf");
        let value = value.to_str().unwrap();
        assert!(value.starts_with("attachment; filename=\"my _report_.pdf\""));
        assert!(value.contains("filename*=UTF-8''my%20%22report%22%2Epdf"));
    }

    #[test]
    fn test_content_disposition_non_ascii() {
        let value = content_disposition("résumé.pdf");
        let value = value.to_str().unwrap();
        assert!(value.contains("filename=\"r_sum_.pdf\""));
        assert!(value.contains("r%C3%A9sum%C3%A9%2Epdf"));
    }
}
