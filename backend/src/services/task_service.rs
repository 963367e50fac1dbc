//! Task CRUD.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::pagination::PageParams;
use crate::api::validation::{optional_text, required_text, TITLE_MAX_LEN};
use crate::error::{AppError, Result};
use crate::models::task::{Task, TaskStatus};
use crate::services::ensure_exists;

const TASK_COLUMNS: &str = "id, violation_id, title, description, status, deadline, \
                            creator_id, executor_id, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub violation_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub violation_id: Uuid,
    pub executor_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<TaskStatus>,
    pub deadline: Option<DateTime<Utc>>,
}

/// Changes to apply to a task. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub violation_id: Option<Uuid>,
    pub executor_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub deadline: Option<DateTime<Utc>>,
}

impl UpdateTaskRequest {
    /// A full replacement must name the violation, the executor and the title.
    pub fn require_full(&self) -> Result<()> {
        let missing = [
            ("violation_id", self.violation_id.is_none()),
            ("executor_id", self.executor_id.is_none()),
            ("title", self.title.is_none()),
        ];
        match missing.iter().find(|(_, absent)| *absent) {
            Some((field, _)) => Err(AppError::Validation(format!("{} is required", field))),
            None => Ok(()),
        }
    }
}

pub struct TaskService {
    db: PgPool,
}

impl TaskService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Tasks the user created or has to execute, newest first.
    pub async fn list_for_participant(
        &self,
        user_id: Uuid,
        filter: &TaskFilter,
        page: PageParams,
    ) -> Result<(Vec<Task>, i64)> {
        let status = filter.status.map(|s| s.as_str());
        let tasks = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM tasks
            WHERE (creator_id = $1 OR executor_id = $1)
              AND ($2::uuid IS NULL OR violation_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC
            OFFSET $4 LIMIT $5
            "#,
            TASK_COLUMNS
        ))
        .bind(user_id)
        .bind(filter.violation_id)
        .bind(status)
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM tasks
            WHERE (creator_id = $1 OR executor_id = $1)
              AND ($2::uuid IS NULL OR violation_id = $2)
              AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(user_id)
        .bind(filter.violation_id)
        .bind(status)
        .fetch_one(&self.db)
        .await?;

        Ok((tasks, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<Task> {
        sqlx::query_as(&format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
    }

    pub async fn create(&self, creator_id: Uuid, req: CreateTaskRequest) -> Result<Task> {
        let title = required_text(&req.title, "title", TITLE_MAX_LEN)?;
        ensure_exists(&self.db, "violations", req.violation_id, "Violation").await?;
        ensure_exists(&self.db, "users", req.executor_id, "Executor").await?;
        let status = req.status.unwrap_or_default();

        let task: Task = sqlx::query_as(&format!(
            r#"
            INSERT INTO tasks
                (violation_id, title, description, status, deadline, creator_id, executor_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(req.violation_id)
        .bind(&title)
        .bind(req.description.trim())
        .bind(status.as_str())
        .bind(req.deadline)
        .bind(creator_id)
        .bind(req.executor_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            task_id = %task.id,
            violation_id = %task.violation_id,
            executor_id = %task.executor_id,
            "Created task"
        );
        Ok(task)
    }

    pub async fn update(&self, id: Uuid, req: UpdateTaskRequest) -> Result<Task> {
        let title = optional_text(req.title.as_deref(), "title", TITLE_MAX_LEN)?;
        if let Some(violation_id) = req.violation_id {
            ensure_exists(&self.db, "violations", violation_id, "Violation").await?;
        }
        if let Some(executor_id) = req.executor_id {
            ensure_exists(&self.db, "users", executor_id, "Executor").await?;
        }

        sqlx::query_as(&format!(
            r#"
            UPDATE tasks SET
                violation_id = COALESCE($2, violation_id),
                executor_id = COALESCE($3, executor_id),
                title = COALESCE($4, title),
                description = COALESCE($5, description),
                status = COALESCE($6, status),
                deadline = COALESCE($7, deadline),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(req.violation_id)
        .bind(req.executor_id)
        .bind(title)
        .bind(req.description.as_deref().map(str::trim))
        .bind(req.status.map(|s| s.as_str()))
        .bind(req.deadline)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
    }

    /// Delete the task with its comments and their attachments. Returns the
    /// storage keys of the removed attachments.
    pub async fn delete(&self, id: Uuid) -> Result<Vec<String>> {
        let mut tx = self.db.begin().await?;

        let storage_keys: Vec<String> = sqlx::query_scalar(
            r#"
            DELETE FROM attachments
            WHERE task_id = $1
               OR comment_id IN (SELECT id FROM comments WHERE task_id = $1)
            RETURNING storage_key
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Task not found".to_string()));
        }

        tx.commit().await?;
        Ok(storage_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_requires_executor() {
        let json = format!(r#"{{"violation_id": "{}", "title": "Fix it"}}"#, Uuid::nil());
        assert!(serde_json::from_str::<CreateTaskRequest>(&json).is_err());
    }

    #[test]
    fn test_require_full_names_first_missing_field() {
        let req = UpdateTaskRequest {
            violation_id: Some(Uuid::nil()),
            title: Some("Replace railing".to_string()),
            ..Default::default()
        };
        let err = req.require_full().unwrap_err();
        assert_eq!(err.to_string(), "Validation error: executor_id is required");
    }

    #[test]
    fn test_status_only_patch() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"status": "done"}"#).unwrap();
        assert_eq!(req.status, Some(TaskStatus::Done));
        assert!(req.title.is_none());
    }
}
