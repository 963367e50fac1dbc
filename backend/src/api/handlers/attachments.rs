//! Attachment handlers: multipart upload, metadata, download and removal.

use axum::{
    body::Body,
    extract::{rejection::MultipartRejection, DefaultBodyLimit, Extension, Multipart, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::extract::{ApiPath, ApiQuery};
use crate::api::middleware::auth::AuthExtension;
use crate::api::pagination::{PageParams, Pagination};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::attachment::Attachment;
use crate::services::attachment_service::{AttachmentFilter, AttachmentService, AttachmentUpload};
use crate::services::event_bus::{ChangeKind, EntityKind};

/// Room for multipart boundaries and the non-file fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_attachments,
        upload_attachment,
        get_attachment,
        download_attachment,
        delete_attachment,
    ),
    components(schemas(Attachment, AttachmentListResponse, UploadAttachmentForm))
)]
pub struct AttachmentsApiDoc;

/// Attachment routes; request bodies are capped a little above `max_upload_bytes`.
pub fn router(max_upload_bytes: usize) -> Router<SharedState> {
    Router::new()
        .route("/", get(list_attachments).post(upload_attachment))
        .route("/:id", get(get_attachment).delete(delete_attachment))
        .route("/:id/download", get(download_attachment))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
}

fn service(state: &SharedState) -> AttachmentService {
    AttachmentService::new(
        state.db.clone(),
        state.storage.clone(),
        state.config.max_upload_bytes,
    )
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAttachmentsQuery {
    pub violation: Option<Uuid>,
    pub task: Option<Uuid>,
    pub comment: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttachmentListResponse {
    pub items: Vec<Attachment>,
    pub pagination: Pagination,
}

/// Shape of the multipart upload form, for the OpenAPI document only.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadAttachmentForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub violation: Option<Uuid>,
    pub task: Option<Uuid>,
    pub comment: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/attachments",
    tag = "attachments",
    params(ListAttachmentsQuery),
    responses(
        (status = 200, description = "Attachments", body = AttachmentListResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn list_attachments(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<ListAttachmentsQuery>,
) -> Result<Json<AttachmentListResponse>> {
    let page = PageParams::new(query.page, query.per_page);
    let filter = AttachmentFilter {
        violation_id: query.violation,
        task_id: query.task,
        comment_id: query.comment,
    };
    let (items, total) = service(&state).list(filter, page).await?;

    Ok(Json(AttachmentListResponse {
        items,
        pagination: page.pagination(total),
    }))
}

fn parse_uuid_field(name: &str, value: &str) -> Result<Option<Uuid>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(value)
        .map(Some)
        .map_err(|_| AppError::Validation(format!("{} must be a UUID", name)))
}

/// Collect the `file`, `violation`, `task` and `comment` parts of an upload.
async fn read_upload(mut multipart: Multipart) -> Result<AttachmentUpload> {
    let mut file: Option<(String, Option<String>, Bytes)> = None;
    let mut violation_id = None;
    let mut task_id = None;
    let mut comment_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(String::from)
                    .ok_or_else(|| AppError::Validation("file part has no file name".to_string()))?;
                let content_type = field.content_type().map(String::from);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {}", e)))?;
                file = Some((file_name, content_type, data));
            }
            "violation" | "task" | "comment" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid {} field: {}", name, e)))?;
                let id = parse_uuid_field(&name, &text)?;
                match name.as_str() {
                    "violation" => violation_id = id,
                    "task" => task_id = id,
                    _ => comment_id = id,
                }
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| AppError::Validation("file is required".to_string()))?;

    Ok(AttachmentUpload {
        file_name,
        content_type,
        data,
        violation_id,
        task_id,
        comment_id,
    })
}

#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/attachments",
    tag = "attachments",
    request_body(content = UploadAttachmentForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Attachment stored", body = Attachment),
        (status = 400, description = "Missing file or parent, or file too large", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn upload_attachment(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Attachment>)> {
    let upload = read_upload(multipart?).await?;
    let attachment = service(&state).create(upload, auth.user_id).await?;
    state.event_bus.emit(
        EntityKind::Attachment,
        ChangeKind::Created,
        attachment.id,
        &auth.username,
    );
    Ok((StatusCode::CREATED, Json(attachment)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/attachments",
    tag = "attachments",
    params(("id" = Uuid, Path, description = "Attachment ID")),
    responses(
        (status = 200, description = "Attachment metadata", body = Attachment),
        (status = 404, description = "Attachment not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn get_attachment(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Attachment>> {
    Ok(Json(service(&state).get(id).await?))
}

fn content_disposition(file_name: &str) -> String {
    let escaped = file_name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("attachment; filename=\"{}\"", escaped)
}

#[utoipa::path(
    get,
    path = "/{id}/download",
    context_path = "/api/v1/attachments",
    tag = "attachments",
    params(("id" = Uuid, Path, description = "Attachment ID")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "Attachment not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn download_attachment(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Response> {
    let (attachment, data) = service(&state).content(id).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, attachment.content_type.as_str())
        .header(header::CONTENT_LENGTH, data.len())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&attachment.file_name),
        )
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build download response: {}", e)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/attachments",
    tag = "attachments",
    params(("id" = Uuid, Path, description = "Attachment ID")),
    responses(
        (status = 204, description = "Attachment and its content removed"),
        (status = 404, description = "Attachment not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn delete_attachment(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    service(&state).delete(id).await?;
    state
        .event_bus
        .emit(EntityKind::Attachment, ChangeKind::Deleted, id, &auth.username);
    Ok(StatusCode::NO_CONTENT)
}
