//! Read-only reference data: projects, organizations and violation types.

use sqlx::PgPool;
use uuid::Uuid;

use crate::api::pagination::PageParams;
use crate::error::{AppError, Result};
use crate::models::organization::Organization;
use crate::models::project::Project;
use crate::models::violation::ViolationType;

pub struct CatalogService {
    db: PgPool,
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_projects(&self, page: PageParams) -> Result<(Vec<Project>, i64)> {
        let projects = sqlx::query_as(
            r#"
            SELECT id, name, description, address, organization_id, created_at
            FROM projects
            ORDER BY name
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(&self.db)
            .await?;

        Ok((projects, total))
    }

    pub async fn get_project(&self, id: Uuid) -> Result<Project> {
        sqlx::query_as(
            r#"
            SELECT id, name, description, address, organization_id, created_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
    }

    pub async fn list_organizations(&self, page: PageParams) -> Result<(Vec<Organization>, i64)> {
        let organizations = sqlx::query_as(
            r#"
            SELECT id, name, description, created_at
            FROM organizations
            ORDER BY name
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organizations")
            .fetch_one(&self.db)
            .await?;

        Ok((organizations, total))
    }

    pub async fn get_organization(&self, id: Uuid) -> Result<Organization> {
        sqlx::query_as("SELECT id, name, description, created_at FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))
    }

    /// All violation types. The table is small, so it is never paginated.
    pub async fn list_violation_types(&self) -> Result<Vec<ViolationType>> {
        let types = sqlx::query_as("SELECT id, name, description FROM violation_types ORDER BY name")
            .fetch_all(&self.db)
            .await?;
        Ok(types)
    }
}
