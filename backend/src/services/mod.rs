//! Business logic services.

pub mod attachment_service;
pub mod auth_service;
pub mod catalog_service;
pub mod comment_service;
pub mod event_bus;
pub mod task_service;
pub mod user_service;
pub mod violation_service;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Whether `table` has a row with primary key `id`.
pub(crate) async fn exists(db: &PgPool, table: &'static str, id: Uuid) -> Result<bool> {
    let found: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
        table
    ))
    .bind(id)
    .fetch_one(db)
    .await?;
    Ok(found)
}

/// Fail with a validation error when a referenced row is missing.
pub(crate) async fn ensure_exists(
    db: &PgPool,
    table: &'static str,
    id: Uuid,
    label: &str,
) -> Result<()> {
    if exists(db, table, id).await? {
        Ok(())
    } else {
        Err(AppError::Validation(format!("{} {} does not exist", label, id)))
    }
}
