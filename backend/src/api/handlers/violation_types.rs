//! Violation type catalogue.

use axum::{extract::State, routing::get, Json, Router};
use utoipa::OpenApi;

use crate::api::SharedState;
use crate::error::Result;
use crate::models::violation::ViolationType;
use crate::services::catalog_service::CatalogService;

#[derive(OpenApi)]
#[openapi(paths(list_violation_types), components(schemas(ViolationType)))]
pub struct ViolationTypesApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(list_violation_types))
}

/// Every violation type, as a plain array.
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/violation-types",
    tag = "violation-types",
    responses((status = 200, description = "All violation types", body = Vec<ViolationType>)),
    security(("bearer_auth" = [])),
)]
pub async fn list_violation_types(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ViolationType>>> {
    Ok(Json(
        CatalogService::new(state.db.clone())
            .list_violation_types()
            .await?,
    ))
}
