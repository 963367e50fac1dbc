//! Comments on tasks.

use serde::Deserialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::pagination::PageParams;
use crate::api::validation::{required_text, COMMENT_MAX_LEN};
use crate::error::{AppError, Result};
use crate::models::comment::Comment;
use crate::services::exists;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentRequest {
    pub text: String,
}

pub struct CommentService {
    db: PgPool,
}

impl CommentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Comments on a task, oldest first.
    pub async fn list_for_task(
        &self,
        task_id: Uuid,
        page: PageParams,
    ) -> Result<(Vec<Comment>, i64)> {
        if !exists(&self.db, "tasks", task_id).await? {
            return Err(AppError::NotFound("Task not found".to_string()));
        }

        let comments = sqlx::query_as(
            r#"
            SELECT id, task_id, author_id, text, created_at, updated_at
            FROM comments
            WHERE task_id = $1
            ORDER BY created_at ASC, id ASC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(task_id)
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE task_id = $1")
            .bind(task_id)
            .fetch_one(&self.db)
            .await?;

        Ok((comments, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<Comment> {
        sqlx::query_as(
            r#"
            SELECT id, task_id, author_id, text, created_at, updated_at
            FROM comments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }

    pub async fn create(
        &self,
        task_id: Uuid,
        author_id: Uuid,
        req: CommentRequest,
    ) -> Result<Comment> {
        let text = required_text(&req.text, "text", COMMENT_MAX_LEN)?;
        if !exists(&self.db, "tasks", task_id).await? {
            return Err(AppError::NotFound("Task not found".to_string()));
        }

        let comment: Comment = sqlx::query_as(
            r#"
            INSERT INTO comments (task_id, author_id, text)
            VALUES ($1, $2, $3)
            RETURNING id, task_id, author_id, text, created_at, updated_at
            "#,
        )
        .bind(task_id)
        .bind(author_id)
        .bind(&text)
        .fetch_one(&self.db)
        .await?;

        tracing::debug!(comment_id = %comment.id, task_id = %task_id, "Created comment");
        Ok(comment)
    }

    pub async fn update(&self, id: Uuid, req: CommentRequest) -> Result<Comment> {
        let text = required_text(&req.text, "text", COMMENT_MAX_LEN)?;
        sqlx::query_as(
            r#"
            UPDATE comments SET text = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, task_id, author_id, text, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&text)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }

    /// Delete the comment and its attachments. Returns the storage keys of
    /// the removed attachments.
    pub async fn delete(&self, id: Uuid) -> Result<Vec<String>> {
        let mut tx = self.db.begin().await?;

        let storage_keys: Vec<String> =
            sqlx::query_scalar("DELETE FROM attachments WHERE comment_id = $1 RETURNING storage_key")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }

        tx.commit().await?;
        Ok(storage_keys)
    }
}
