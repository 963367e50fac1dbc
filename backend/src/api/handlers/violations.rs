//! Violation handlers.
//!
//! Listing and creation are open to representatives and only ever see the
//! caller's own violations. Item routes look the row up among all violations
//! and then require the caller to be its creator.

use axum::{
    extract::{Extension, State},
    http::{Method, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::middleware::auth::AuthExtension;
use crate::api::pagination::{PageParams, Pagination};
use crate::api::permissions::{
    check_object_permissions, check_permissions, IsRepresentative, IsRepresentativeAndCreator,
    Permission, RequestContext,
};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::violation::{Violation, ViolationStatus};
use crate::services::attachment_service::remove_content;
use crate::services::event_bus::{ChangeKind, EntityKind};
use crate::services::violation_service::{
    CreateViolationRequest, UpdateViolationRequest, ViolationFilter, ViolationService,
};

const LIST_POLICIES: &[&dyn Permission] = &[&IsRepresentative];
const DETAIL_POLICIES: &[&dyn Permission] = &[&IsRepresentativeAndCreator];

#[derive(OpenApi)]
#[openapi(
    paths(
        list_violations,
        create_violation,
        get_violation,
        replace_violation,
        update_violation,
        delete_violation,
    ),
    components(schemas(
        Violation,
        ViolationStatus,
        ViolationListResponse,
        CreateViolationRequest,
        UpdateViolationRequest,
    ))
)]
pub struct ViolationsApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_violations).post(create_violation))
        .route(
            "/:id",
            get(get_violation)
                .put(replace_violation)
                .patch(update_violation)
                .delete(delete_violation),
        )
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListViolationsQuery {
    /// Only violations on this project
    pub project: Option<Uuid>,
    /// Only violations in this status
    pub status: Option<ViolationStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ViolationListResponse {
    pub items: Vec<Violation>,
    pub pagination: Pagination,
}

/// GET /api/v1/violations
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/violations",
    tag = "violations",
    params(ListViolationsQuery),
    responses(
        (status = 200, description = "Violations created by the caller", body = ViolationListResponse),
        (status = 403, description = "Caller is not a representative", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn list_violations(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiQuery(query): ApiQuery<ListViolationsQuery>,
) -> Result<Json<ViolationListResponse>> {
    check_permissions(LIST_POLICIES, &RequestContext::new(&method, &auth))?;

    let page = PageParams::new(query.page, query.per_page);
    let filter = ViolationFilter {
        project_id: query.project,
        status: query.status,
    };
    let service = ViolationService::new(state.db.clone());
    let (items, total) = service.list_for_creator(auth.user_id, &filter, page).await?;

    Ok(Json(ViolationListResponse {
        items,
        pagination: page.pagination(total),
    }))
}

/// POST /api/v1/violations
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/violations",
    tag = "violations",
    request_body = CreateViolationRequest,
    responses(
        (status = 201, description = "Violation created", body = Violation),
        (status = 400, description = "Invalid input", body = crate::api::openapi::ErrorResponse),
        (status = 403, description = "Caller is not a representative", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn create_violation(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiJson(payload): ApiJson<CreateViolationRequest>,
) -> Result<(StatusCode, Json<Violation>)> {
    check_permissions(LIST_POLICIES, &RequestContext::new(&method, &auth))?;

    let service = ViolationService::new(state.db.clone());
    let violation = service.create(auth.user_id, payload).await?;
    state.event_bus.emit(
        EntityKind::Violation,
        ChangeKind::Created,
        violation.id,
        &auth.username,
    );

    Ok((StatusCode::CREATED, Json(violation)))
}

/// Load a violation and run the detail policies against it.
async fn load_authorized(
    service: &ViolationService,
    id: Uuid,
    method: &Method,
    auth: &AuthExtension,
) -> Result<Violation> {
    let ctx = RequestContext::new(method, auth);
    check_permissions(DETAIL_POLICIES, &ctx)?;
    let violation = service.get(id).await?;
    check_object_permissions(DETAIL_POLICIES, &ctx, &violation)?;
    Ok(violation)
}

/// GET /api/v1/violations/:id
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/violations",
    tag = "violations",
    params(("id" = Uuid, Path, description = "Violation ID")),
    responses(
        (status = 200, description = "Violation", body = Violation),
        (status = 403, description = "Caller is not the creator", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Violation not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn get_violation(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Violation>> {
    let service = ViolationService::new(state.db.clone());
    let violation = load_authorized(&service, id, &method, &auth).await?;
    Ok(Json(violation))
}

/// PUT /api/v1/violations/:id
#[utoipa::path(
    put,
    path = "/{id}",
    context_path = "/api/v1/violations",
    tag = "violations",
    params(("id" = Uuid, Path, description = "Violation ID")),
    request_body = UpdateViolationRequest,
    responses(
        (status = 200, description = "Violation replaced", body = Violation),
        (status = 400, description = "Missing required fields", body = crate::api::openapi::ErrorResponse),
        (status = 403, description = "Caller is not the creator", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Violation not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn replace_violation(
    state: State<SharedState>,
    auth: Extension<AuthExtension>,
    method: Method,
    id: ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateViolationRequest>,
) -> Result<Json<Violation>> {
    payload.require_full()?;
    update_violation(state, auth, method, id, ApiJson(payload)).await
}

/// PATCH /api/v1/violations/:id
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/violations",
    tag = "violations",
    params(("id" = Uuid, Path, description = "Violation ID")),
    request_body = UpdateViolationRequest,
    responses(
        (status = 200, description = "Violation updated", body = Violation),
        (status = 403, description = "Caller is not the creator", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Violation not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn update_violation(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateViolationRequest>,
) -> Result<Json<Violation>> {
    let service = ViolationService::new(state.db.clone());
    load_authorized(&service, id, &method, &auth).await?;

    let violation = service.update(id, payload).await?;
    state
        .event_bus
        .emit(EntityKind::Violation, ChangeKind::Updated, id, &auth.username);
    Ok(Json(violation))
}

/// DELETE /api/v1/violations/:id
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/violations",
    tag = "violations",
    params(("id" = Uuid, Path, description = "Violation ID")),
    responses(
        (status = 204, description = "Violation deleted"),
        (status = 403, description = "Caller is not the creator", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Violation not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn delete_violation(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    let service = ViolationService::new(state.db.clone());
    load_authorized(&service, id, &method, &auth).await?;

    let storage_keys = service.delete(id).await?;
    remove_content(state.storage.as_ref(), &storage_keys).await;
    state
        .event_bus
        .emit(EntityKind::Violation, ChangeKind::Deleted, id, &auth.username);
    Ok(StatusCode::NO_CONTENT)
}
