//! Read-only project handlers.

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::extract::{ApiPath, ApiQuery};
use crate::api::pagination::{PageParams, Pagination};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::project::Project;
use crate::services::catalog_service::CatalogService;

#[derive(OpenApi)]
#[openapi(
    paths(list_projects, get_project),
    components(schemas(Project, ProjectListResponse))
)]
pub struct ProjectsApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_projects))
        .route("/:id", get(get_project))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListProjectsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectListResponse {
    pub items: Vec<Project>,
    pub pagination: Pagination,
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/projects",
    tag = "projects",
    params(ListProjectsQuery),
    responses((status = 200, description = "Projects", body = ProjectListResponse)),
    security(("bearer_auth" = [])),
)]
pub async fn list_projects(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<ListProjectsQuery>,
) -> Result<Json<ProjectListResponse>> {
    let page = PageParams::new(query.page, query.per_page);
    let (items, total) = CatalogService::new(state.db.clone())
        .list_projects(page)
        .await?;
    Ok(Json(ProjectListResponse {
        items,
        pagination: page.pagination(total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/projects",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 404, description = "Project not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn get_project(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Project>> {
    Ok(Json(CatalogService::new(state.db.clone()).get_project(id).await?))
}
