//! Attachment model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Metadata for an uploaded file. The bytes live in the storage backend
/// under `storage_key`, which is never exposed to clients.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Attachment {
    pub id: Uuid,
    pub violation_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum_sha256: String,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
