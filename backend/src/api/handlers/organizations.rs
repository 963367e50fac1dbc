//! Read-only organization handlers.

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
use crate::models::organization::Organization;
use crate::services::catalog_service::CatalogService;

#[derive(OpenApi)]
#[openapi(
    paths(list_organizations, get_organization),
    components(schemas(Organization, OrganizationListResponse))
)]
pub struct OrganizationsApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_organizations))
        .route("/:id", get(get_organization))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrganizationsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrganizationListResponse {
    pub items: Vec<Organization>,
    pub pagination: Pagination,
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/organizations",
    tag = "organizations",
    params(ListOrganizationsQuery),
    responses((status = 200, description = "Organizations", body = OrganizationListResponse)),
    security(("bearer_auth" = [])),
)]
pub async fn list_organizations(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<ListOrganizationsQuery>,
) -> Result<Json<OrganizationListResponse>> {
    let page = PageParams::new(query.page, query.per_page);
    let (items, total) = CatalogService::new(state.db.clone())
        .list_organizations(page)
        .await?;
    Ok(Json(OrganizationListResponse {
        items,
        pagination: page.pagination(total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/organizations",
    tag = "organizations",
    params(("id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization", body = Organization),
        (status = 404, description = "Organization not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn get_organization(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Organization>> {
    Ok(Json(
        CatalogService::new(state.db.clone())
            .get_organization(id)
            .await?,
    ))
}
