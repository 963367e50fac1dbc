//! Task handlers.
//!
//! Only representatives may create tasks. A task is visible to its creator
//! and its executor only, and either of them may replace, patch or delete it.

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
use crate::api::handlers::comments;
use crate::api::middleware::auth::AuthExtension;
use crate::api::pagination::{PageParams, Pagination};
use crate::api::permissions::{
    check_object_permissions, check_permissions, IsAuthenticated, IsCreatorOrExecutor,
    IsRepresentativeOrReadOnly, Permission, RequestContext,
};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::task::{Task, TaskStatus};
use crate::services::attachment_service::remove_content;
use crate::services::event_bus::{ChangeKind, EntityKind};
use crate::services::task_service::{
    CreateTaskRequest, TaskFilter, TaskService, UpdateTaskRequest,
};

const LIST_POLICIES: &[&dyn Permission] = &[&IsRepresentativeOrReadOnly, &IsAuthenticated];
const DETAIL_POLICIES: &[&dyn Permission] = &[&IsCreatorOrExecutor];

#[derive(OpenApi)]
#[openapi(
    paths(list_tasks, create_task, get_task, replace_task, update_task, delete_task),
    components(schemas(
        Task,
        TaskStatus,
        TaskListResponse,
        CreateTaskRequest,
        UpdateTaskRequest,
    ))
)]
pub struct TasksApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route(
            "/:id",
            get(get_task)
                .put(replace_task)
                .patch(update_task)
                .delete(delete_task),
        )
        .route(
            "/:id/comments",
            get(comments::list_task_comments).post(comments::create_comment),
        )
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTasksQuery {
    /// Only tasks raised for this violation
    pub violation: Option<Uuid>,
    /// Only tasks in this status
    pub status: Option<TaskStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskListResponse {
    pub items: Vec<Task>,
    pub pagination: Pagination,
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/tasks",
    tag = "tasks",
    params(ListTasksQuery),
    responses(
        (status = 200, description = "Tasks the caller created or executes", body = TaskListResponse),
        (status = 401, description = "Not authenticated", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn list_tasks(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiQuery(query): ApiQuery<ListTasksQuery>,
) -> Result<Json<TaskListResponse>> {
    check_permissions(LIST_POLICIES, &RequestContext::new(&method, &auth))?;

    let page = PageParams::new(query.page, query.per_page);
    let filter = TaskFilter {
        violation_id: query.violation,
        status: query.status,
    };
    let (items, total) = TaskService::new(state.db.clone())
        .list_for_participant(auth.user_id, &filter, page)
        .await?;

    Ok(Json(TaskListResponse {
        items,
        pagination: page.pagination(total),
    }))
}

#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/tasks",
    tag = "tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Invalid input", body = crate::api::openapi::ErrorResponse),
        (status = 403, description = "Caller is not a representative", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn create_task(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiJson(payload): ApiJson<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>)> {
    check_permissions(LIST_POLICIES, &RequestContext::new(&method, &auth))?;

    let task = TaskService::new(state.db.clone())
        .create(auth.user_id, payload)
        .await?;
    state
        .event_bus
        .emit(EntityKind::Task, ChangeKind::Created, task.id, &auth.username);

    Ok((StatusCode::CREATED, Json(task)))
}

/// Load a task the caller takes part in.
pub(crate) async fn load_authorized(
    service: &TaskService,
    id: Uuid,
    method: &Method,
    auth: &AuthExtension,
) -> Result<Task> {
    let ctx = RequestContext::new(method, auth);
    check_permissions(DETAIL_POLICIES, &ctx)?;
    let task = service.get(id).await?;
    check_object_permissions(DETAIL_POLICIES, &ctx, &task)?;
    Ok(task)
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/tasks",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = Task),
        (status = 403, description = "Caller is neither creator nor executor", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Task not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn get_task(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Task>> {
    let service = TaskService::new(state.db.clone());
    Ok(Json(load_authorized(&service, id, &method, &auth).await?))
}

#[utoipa::path(
    put,
    path = "/{id}",
    context_path = "/api/v1/tasks",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task replaced", body = Task),
        (status = 400, description = "Missing required fields", body = crate::api::openapi::ErrorResponse),
        (status = 403, description = "Caller is neither creator nor executor", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Task not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn replace_task(
    state: State<SharedState>,
    auth: Extension<AuthExtension>,
    method: Method,
    id: ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateTaskRequest>,
) -> Result<Json<Task>> {
    payload.require_full()?;
    update_task(state, auth, method, id, ApiJson(payload)).await
}

#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/tasks",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 403, description = "Caller is neither creator nor executor", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Task not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn update_task(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateTaskRequest>,
) -> Result<Json<Task>> {
    let service = TaskService::new(state.db.clone());
    load_authorized(&service, id, &method, &auth).await?;

    let task = service.update(id, payload).await?;
    state
        .event_bus
        .emit(EntityKind::Task, ChangeKind::Updated, id, &auth.username);
    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/tasks",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 403, description = "Caller is neither creator nor executor", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Task not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn delete_task(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    let service = TaskService::new(state.db.clone());
    load_authorized(&service, id, &method, &auth).await?;

    let storage_keys = service.delete(id).await?;
    remove_content(state.storage.as_ref(), &storage_keys).await;
    state
        .event_bus
        .emit(EntityKind::Task, ChangeKind::Deleted, id, &auth.username);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(groups: &[&str]) -> AuthExtension {
        AuthExtension {
            user_id: Uuid::new_v4(),
            username: "someone".into(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            is_admin: false,
        }
    }

    #[test]
    fn test_contractor_can_list_but_not_create() {
        let contractor = user(&["contractor"]);
        assert!(check_permissions(LIST_POLICIES, &RequestContext::new(&Method::GET, &contractor)).is_ok());
        assert!(check_permissions(LIST_POLICIES, &RequestContext::new(&Method::POST, &contractor)).is_err());

        let rep = user(&["representative"]);
        assert!(check_permissions(LIST_POLICIES, &RequestContext::new(&Method::POST, &rep)).is_ok());
    }

    #[test]
    fn test_executor_may_replace_patch_and_delete_task() {
        let creator = user(&["representative"]);
        let executor = user(&["contractor"]);
        let stranger = user(&["representative"]);
        let task = Task {
            id: Uuid::new_v4(),
            violation_id: Uuid::new_v4(),
            title: "Replace railing".into(),
            description: String::new(),
            status: "new".into(),
            deadline: None,
            creator_id: creator.user_id,
            executor_id: executor.user_id,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        for who in [&creator, &executor] {
            for method in [Method::PUT, Method::PATCH, Method::DELETE] {
                let ctx = RequestContext::new(&method, who);
                assert!(check_permissions(DETAIL_POLICIES, &ctx).is_ok(), "{}", method);
                assert!(
                    check_object_permissions(DETAIL_POLICIES, &ctx, &task).is_ok(),
                    "{}",
                    method
                );
            }
        }
        let ctx = RequestContext::new(&Method::DELETE, &stranger);
        assert!(check_object_permissions(DETAIL_POLICIES, &ctx, &task).is_err());
        let ctx = RequestContext::new(&Method::GET, &stranger);
        assert!(check_object_permissions(DETAIL_POLICIES, &ctx, &task).is_err());
    }

    #[test]
    fn test_list_query_parses_filters() {
        let query: ListTasksQuery = serde_urlencoded::from_str("status=done&per_page=5").unwrap();
        assert_eq!(query.status, Some(TaskStatus::Done));
        assert_eq!(query.per_page, Some(5));
        assert!(query.violation.is_none());
    }
}
