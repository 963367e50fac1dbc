//! Attachment upload, lookup and removal.
//!
//! Metadata lives in the `attachments` table; content lives in the storage
//! backend under `attachments/<id>/<file name>`.

use std::sync::Arc;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::pagination::PageParams;
use crate::api::validation::sanitize_file_name;
use crate::error::{AppError, Result};
use crate::models::attachment::Attachment;
use crate::services::ensure_exists;
use crate::storage::StorageBackend;

const ATTACHMENT_COLUMNS: &str = "id, violation_id, task_id, comment_id, file_name, content_type, \
                                  size_bytes, checksum_sha256, storage_key, uploaded_by, created_at";

#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentFilter {
    pub violation_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
}

/// A parsed upload, ready to be stored.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
    pub violation_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
}

impl AttachmentUpload {
    fn has_parent(&self) -> bool {
        self.violation_id.is_some() || self.task_id.is_some() || self.comment_id.is_some()
    }

    /// Declared content type, or a guess from the file name.
    fn resolved_content_type(&self) -> String {
        self.content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
            .map(String::from)
            .unwrap_or_else(|| {
                mime_guess::from_path(&self.file_name)
                    .first_or_octet_stream()
                    .to_string()
            })
    }
}

/// Remove stored content for attachment rows that are already gone.
/// Failures are logged; leftover content is only wasted space.
pub async fn remove_content(storage: &dyn StorageBackend, storage_keys: &[String]) {
    for key in storage_keys {
        if let Err(e) = storage.delete(key).await {
            tracing::warn!(key = %key, "Failed to delete attachment content: {}", e);
        }
    }
    if !storage_keys.is_empty() {
        tracing::debug!(count = storage_keys.len(), "Removed attachment content");
    }
}

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub struct AttachmentService {
    db: PgPool,
    storage: Arc<dyn StorageBackend>,
    max_upload_bytes: usize,
}

impl AttachmentService {
    pub fn new(db: PgPool, storage: Arc<dyn StorageBackend>, max_upload_bytes: usize) -> Self {
        Self {
            db,
            storage,
            max_upload_bytes,
        }
    }

    pub async fn list(
        &self,
        filter: AttachmentFilter,
        page: PageParams,
    ) -> Result<(Vec<Attachment>, i64)> {
        let attachments = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM attachments
            WHERE ($1::uuid IS NULL OR violation_id = $1)
              AND ($2::uuid IS NULL OR task_id = $2)
              AND ($3::uuid IS NULL OR comment_id = $3)
            ORDER BY created_at DESC
            OFFSET $4 LIMIT $5
            "#,
            ATTACHMENT_COLUMNS
        ))
        .bind(filter.violation_id)
        .bind(filter.task_id)
        .bind(filter.comment_id)
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM attachments
            WHERE ($1::uuid IS NULL OR violation_id = $1)
              AND ($2::uuid IS NULL OR task_id = $2)
              AND ($3::uuid IS NULL OR comment_id = $3)
            "#,
        )
        .bind(filter.violation_id)
        .bind(filter.task_id)
        .bind(filter.comment_id)
        .fetch_one(&self.db)
        .await?;

        Ok((attachments, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<Attachment> {
        sqlx::query_as(&format!(
            "SELECT {} FROM attachments WHERE id = $1",
            ATTACHMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Attachment not found".to_string()))
    }

    /// Store the content, then record it. The content is removed again if
    /// the row cannot be written.
    pub async fn create(&self, upload: AttachmentUpload, uploaded_by: Uuid) -> Result<Attachment> {
        if !upload.has_parent() {
            return Err(AppError::Validation(
                "An attachment needs a violation, task or comment".to_string(),
            ));
        }
        if upload.data.is_empty() {
            return Err(AppError::Validation("The uploaded file is empty".to_string()));
        }
        if upload.data.len() > self.max_upload_bytes {
            return Err(AppError::Validation(format!(
                "File exceeds the {} byte upload limit",
                self.max_upload_bytes
            )));
        }
        if let Some(id) = upload.violation_id {
            ensure_exists(&self.db, "violations", id, "Violation").await?;
        }
        if let Some(id) = upload.task_id {
            ensure_exists(&self.db, "tasks", id, "Task").await?;
        }
        if let Some(id) = upload.comment_id {
            ensure_exists(&self.db, "comments", id, "Comment").await?;
        }

        let id = Uuid::new_v4();
        let file_name = sanitize_file_name(&upload.file_name)?;
        let storage_key = format!("attachments/{}/{}", id, file_name);
        let content_type = upload.resolved_content_type();
        let checksum = sha256_hex(&upload.data);
        let size_bytes = upload.data.len() as i64;

        self.storage.put(&storage_key, upload.data.clone()).await?;

        let inserted = sqlx::query_as::<_, Attachment>(&format!(
            r#"
            INSERT INTO attachments
                (id, violation_id, task_id, comment_id, file_name, content_type,
                 size_bytes, checksum_sha256, storage_key, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            ATTACHMENT_COLUMNS
        ))
        .bind(id)
        .bind(upload.violation_id)
        .bind(upload.task_id)
        .bind(upload.comment_id)
        .bind(&file_name)
        .bind(&content_type)
        .bind(size_bytes)
        .bind(&checksum)
        .bind(&storage_key)
        .bind(uploaded_by)
        .fetch_one(&self.db)
        .await;

        match inserted {
            Ok(attachment) => {
                tracing::info!(
                    attachment_id = %attachment.id,
                    size_bytes = size_bytes,
                    content_type = %content_type,
                    "Stored attachment"
                );
                Ok(attachment)
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&storage_key).await {
                    tracing::warn!(key = %storage_key, "Failed to remove orphaned content: {}", cleanup);
                }
                Err(e.into())
            }
        }
    }

    /// Attachment metadata together with its content.
    pub async fn content(&self, id: Uuid) -> Result<(Attachment, Bytes)> {
        let attachment = self.get(id).await?;
        let data = self.storage.get(&attachment.storage_key).await?;
        Ok((attachment, data))
    }

    /// Delete the row, then its content.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let storage_key: Option<String> =
            sqlx::query_scalar("DELETE FROM attachments WHERE id = $1 RETURNING storage_key")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        let storage_key =
            storage_key.ok_or_else(|| AppError::NotFound("Attachment not found".to_string()))?;

        remove_content(self.storage.as_ref(), &[storage_key]).await;
        Ok(())
    }
}
