//! Violation CRUD.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::pagination::PageParams;
use crate::api::validation::{optional_text, required_text, TITLE_MAX_LEN};
use crate::error::{AppError, Result};
use crate::models::violation::{Violation, ViolationStatus};
use crate::services::ensure_exists;

const VIOLATION_COLUMNS: &str = "id, project_id, violation_type_id, title, description, status, \
                                 deadline, creator_id, created_at, updated_at";

/// Optional list filters.
#[derive(Debug, Clone, Default)]
pub struct ViolationFilter {
    pub project_id: Option<Uuid>,
    pub status: Option<ViolationStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateViolationRequest {
    pub project_id: Uuid,
    pub violation_type_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<ViolationStatus>,
    pub deadline: Option<DateTime<Utc>>,
}

/// Changes to apply to a violation. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateViolationRequest {
    pub project_id: Option<Uuid>,
    pub violation_type_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ViolationStatus>,
    pub deadline: Option<DateTime<Utc>>,
}

impl UpdateViolationRequest {
    /// A full replacement must name the project and the title.
    pub fn require_full(&self) -> Result<()> {
        if self.project_id.is_none() {
            return Err(AppError::Validation("project_id is required".to_string()));
        }
        if self.title.is_none() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        Ok(())
    }
}

pub struct ViolationService {
    db: PgPool,
}

impl ViolationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Violations created by `creator_id`, newest first.
    pub async fn list_for_creator(
        &self,
        creator_id: Uuid,
        filter: &ViolationFilter,
        page: PageParams,
    ) -> Result<(Vec<Violation>, i64)> {
        let status = filter.status.map(|s| s.as_str());
        let violations = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM violations
            WHERE creator_id = $1
              AND ($2::uuid IS NULL OR project_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC
            OFFSET $4 LIMIT $5
            "#,
            VIOLATION_COLUMNS
        ))
        .bind(creator_id)
        .bind(filter.project_id)
        .bind(status)
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM violations
            WHERE creator_id = $1
              AND ($2::uuid IS NULL OR project_id = $2)
              AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(creator_id)
        .bind(filter.project_id)
        .bind(status)
        .fetch_one(&self.db)
        .await?;

        Ok((violations, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<Violation> {
        sqlx::query_as(&format!(
            "SELECT {} FROM violations WHERE id = $1",
            VIOLATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Violation not found".to_string()))
    }

    /// Create a violation owned by `creator_id`.
    pub async fn create(&self, creator_id: Uuid, req: CreateViolationRequest) -> Result<Violation> {
        let title = required_text(&req.title, "title", TITLE_MAX_LEN)?;
        ensure_exists(&self.db, "projects", req.project_id, "Project").await?;
        if let Some(type_id) = req.violation_type_id {
            ensure_exists(&self.db, "violation_types", type_id, "Violation type").await?;
        }
        let status = req.status.unwrap_or_default();

        let violation: Violation = sqlx::query_as(&format!(
            r#"
            INSERT INTO violations
                (project_id, violation_type_id, title, description, status, deadline, creator_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            VIOLATION_COLUMNS
        ))
        .bind(req.project_id)
        .bind(req.violation_type_id)
        .bind(&title)
        .bind(req.description.trim())
        .bind(status.as_str())
        .bind(req.deadline)
        .bind(creator_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            violation_id = %violation.id,
            creator_id = %creator_id,
            "Created violation"
        );
        Ok(violation)
    }

    pub async fn update(&self, id: Uuid, req: UpdateViolationRequest) -> Result<Violation> {
        let title = optional_text(req.title.as_deref(), "title", TITLE_MAX_LEN)?;
        if let Some(project_id) = req.project_id {
            ensure_exists(&self.db, "projects", project_id, "Project").await?;
        }
        if let Some(type_id) = req.violation_type_id {
            ensure_exists(&self.db, "violation_types", type_id, "Violation type").await?;
        }

        sqlx::query_as(&format!(
            r#"
            UPDATE violations SET
                project_id = COALESCE($2, project_id),
                violation_type_id = COALESCE($3, violation_type_id),
                title = COALESCE($4, title),
                description = COALESCE($5, description),
                status = COALESCE($6, status),
                deadline = COALESCE($7, deadline),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            VIOLATION_COLUMNS
        ))
        .bind(id)
        .bind(req.project_id)
        .bind(req.violation_type_id)
        .bind(title)
        .bind(req.description.as_deref().map(str::trim))
        .bind(req.status.map(|s| s.as_str()))
        .bind(req.deadline)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Violation not found".to_string()))
    }

    /// Delete the violation with its tasks, their comments and every
    /// attachment under them. Returns the storage keys of the removed
    /// attachments; their content is the caller's to remove.
    pub async fn delete(&self, id: Uuid) -> Result<Vec<String>> {
        let mut tx = self.db.begin().await?;

        let storage_keys: Vec<String> = sqlx::query_scalar(
            r#"
            DELETE FROM attachments
            WHERE violation_id = $1
               OR task_id IN (SELECT id FROM tasks WHERE violation_id = $1)
               OR comment_id IN (
                   SELECT c.id FROM comments c
                   JOIN tasks t ON t.id = c.task_id
                   WHERE t.violation_id = $1
               )
            RETURNING storage_key
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM violations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Violation not found".to_string()));
        }

        tx.commit().await?;
        Ok(storage_keys)
    }
}
