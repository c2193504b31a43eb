//! HTTP request handlers.

use crate::AppState;
use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use docrights_service::{HealthStatus, Operation, ProtectionError, ProtectionRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: 400,
            error_code: Some("VALIDATION_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl From<ProtectionError> for ApiError {
    fn from(err: ProtectionError) -> Self {
        Self {
            error: err.to_string(),
            code: err.status_code(),
            error_code: Some(err.error_code()),
        }
    }
}

/// Body of the JSON protection endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileRequest {
    pub file_name: String,
    pub file_base64_string_content: String,
    /// Comma-separated subject principals.
    pub email: String,
    pub owner_email_id: String,
    /// Comma-separated rights codes.
    pub file_access_right_type: String,
    pub retain_input_files: Option<bool>,
    pub retain_output_files: Option<bool>,
}

impl FileRequest {
    fn into_request(self) -> ProtectionRequest {
        let mut request =
            ProtectionRequest::from_encoded(self.file_name, self.file_base64_string_content)
                .with_subjects(self.email)
                .with_rights_codes(self.file_access_right_type);
        if !self.owner_email_id.trim().is_empty() {
            request = request.with_owner(self.owner_email_id);
        }
        request.retain_input = self.retain_input_files;
        request.retain_output = self.retain_output_files;
        request
    }
}

/// Response of the JSON protection endpoints.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub status_code: u16,
    pub status_message: String,
    /// Base64 output document; empty on failure.
    pub file_response_content: String,
}

impl FileResponse {
    fn success(content: &[u8]) -> Self {
        Self {
            status_code: 200,
            status_message: "Success".to_string(),
            file_response_content: STANDARD.encode(content),
        }
    }

    fn failure(err: &ProtectionError) -> Self {
        Self {
            status_code: err.status_code(),
            status_message: format!("Error: {}", err),
            file_response_content: String::new(),
        }
    }
}

fn require(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} is required.", field)));
    }
    Ok(())
}

fn status_of(err: &ProtectionError) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn process_json(state: &AppState, operation: Operation, body: FileRequest) -> Response {
    match state.service.process(operation, body.into_request()).await {
        Ok(outcome) => (StatusCode::OK, Json(FileResponse::success(&outcome.content))).into_response(),
        Err(err) => {
            warn!(operation = %operation, error = %err, "Request failed");
            (status_of(&err), Json(FileResponse::failure(&err))).into_response()
        }
    }
}

/// POST /api/v1/protect
pub async fn protect(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FileRequest>,
) -> Result<Response, ApiError> {
    require(&body.file_name, "fileName")?;
    require(&body.file_base64_string_content, "fileBase64StringContent")?;
    require(&body.file_access_right_type, "fileAccessRightType")?;
    Ok(process_json(&state, Operation::Protect, body).await)
}

/// POST /api/v1/unprotect
pub async fn unprotect(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FileRequest>,
) -> Result<Response, ApiError> {
    require(&body.file_base64_string_content, "fileBase64StringContent")?;
    require(&body.file_name, "fileName")?;
    Ok(process_json(&state, Operation::Unprotect, body).await)
}

/// POST /api/v1/permissions
pub async fn add_permissions(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FileRequest>,
) -> Result<Response, ApiError> {
    require(&body.file_base64_string_content, "fileBase64StringContent")?;
    require(&body.file_name, "fileName")?;
    require(&body.file_access_right_type, "fileAccessRightType")?;
    Ok(process_json(&state, Operation::AddPermissions, body).await)
}

/// Fields of the multipart protection endpoints.
///
/// Field names are matched case-insensitively.
#[derive(Debug, Default)]
pub struct FileForm {
    pub file: Option<Vec<u8>>,
    pub file_name: String,
    pub email: String,
    pub owner_email_id: String,
    pub file_access_right_type: String,
    pub retain_input_files: Option<bool>,
    pub retain_output_files: Option<bool>,
}

impl FileForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Malformed form data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_ascii_lowercase();
            if name == "file" {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Unreadable file part: {}", e)))?;
                form.file = Some(bytes.to_vec());
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Unreadable field {}: {}", name, e)))?;
            match name.as_str() {
                "filename" => form.file_name = value,
                "email" => form.email = value,
                "owneremailid" => form.owner_email_id = value,
                "fileaccessrighttype" => form.file_access_right_type = value,
                "retaininputfiles" => form.retain_input_files = parse_flag(&name, &value)?,
                "retainoutputfiles" => form.retain_output_files = parse_flag(&name, &value)?,
                other => debug!(field = other, "Ignoring unknown form field"),
            }
        }
        Ok(form)
    }

    fn into_request(self, bytes: Vec<u8>) -> ProtectionRequest {
        let mut request = ProtectionRequest::from_bytes(self.file_name, bytes)
            .with_subjects(self.email)
            .with_rights_codes(self.file_access_right_type);
        if !self.owner_email_id.trim().is_empty() {
            request = request.with_owner(self.owner_email_id);
        }
        request.retain_input = self.retain_input_files;
        request.retain_output = self.retain_output_files;
        request
    }
}

fn parse_flag(name: &str, value: &str) -> Result<Option<bool>, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" => Ok(Some(true)),
        "false" => Ok(Some(false)),
        other => Err(ApiError::bad_request(format!(
            "{} must be true or false, got '{}'",
            name, other
        ))),
    }
}

fn take_file(form: &mut FileForm) -> Result<Vec<u8>, ApiError> {
    match form.file.take() {
        Some(bytes) if !bytes.is_empty() => Ok(bytes),
        _ => Err(ApiError::bad_request("File is required.")),
    }
}

async fn process_download(state: &AppState, operation: Operation, request: ProtectionRequest) -> Response {
    match state.service.process(operation, request).await {
        Ok(outcome) => {
            let disposition = format!(
                "attachment; filename=\"{}\"",
                header_safe(&outcome.output_file_name)
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                outcome.content,
            )
                .into_response()
        }
        Err(err) => {
            warn!(operation = %operation, error = %err, "Request failed");
            (status_of(&err), Json(FileResponse::failure(&err))).into_response()
        }
    }
}

fn header_safe(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect()
}

/// POST /api/v1/protect/owner
pub async fn protect_with_owner(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = FileForm::read(multipart).await?;
    let bytes = take_file(&mut form)?;
    require(&form.owner_email_id, "OwnerEmailId")?;
    require(&form.file_name, "FileName")?;
    Ok(process_download(&state, Operation::ProtectWithOwner, form.into_request(bytes)).await)
}

/// POST /api/v1/protect/subject-owner
pub async fn protect_with_subject_owner(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = FileForm::read(multipart).await?;
    let bytes = take_file(&mut form)?;
    require(&form.email, "Email")?;
    require(&form.file_name, "FileName")?;
    Ok(process_download(&state, Operation::ProtectWithSubjectOwner, form.into_request(bytes)).await)
}

/// GET /api/v1/health
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let report = state.health.check_all().await;
    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report)).into_response()
}

/// GET /api/v1/health/live
pub async fn liveness(State(state): State<Arc<AppState>>) -> Response {
    (StatusCode::OK, Json(state.health.check_liveness().await)).into_response()
}

/// GET /api/v1/health/ready
pub async fn readiness(State(state): State<Arc<AppState>>) -> Response {
    let readiness = state.health.check_readiness().await;
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness)).into_response()
}

/// GET /api/HealthCheck/status - process is up
pub async fn status() -> Response {
    let body = serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "docrights-server",
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /api/v1/info - Server info
pub async fn info() -> Response {
    let info = serde_json::json!({
        "name": "docrights-server",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v1",
        "operations": Operation::all(),
    });

    (StatusCode::OK, Json(info)).into_response()
}
