//! Comment handlers.
//!
//! Comments are listed and created under their task
//! (`/api/v1/tasks/:id/comments`, routed from the tasks router) and
//! addressed individually under `/api/v1/comments/:id`.

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
    check_object_permissions, check_permissions, IsAuthenticated, IsAuthorOrReadOnly, Permission,
    RequestContext,
};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::comment::Comment;
use crate::services::attachment_service::remove_content;
use crate::services::comment_service::{CommentRequest, CommentService};
use crate::services::event_bus::{ChangeKind, EntityKind};

const TASK_POLICIES: &[&dyn Permission] = &[&IsAuthenticated];
const DETAIL_POLICIES: &[&dyn Permission] = &[&IsAuthorOrReadOnly, &IsAuthenticated];

#[derive(OpenApi)]
#[openapi(
    paths(
        list_task_comments,
        create_comment,
        get_comment,
        update_comment,
        delete_comment,
    ),
    components(schemas(Comment, CommentRequest, CommentListResponse))
)]
pub struct CommentsApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new().route(
        "/:id",
        get(get_comment)
            .put(update_comment)
            .patch(update_comment)
            .delete(delete_comment),
    )
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCommentsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentListResponse {
    pub items: Vec<Comment>,
    pub pagination: Pagination,
}

#[utoipa::path(
    get,
    path = "/{id}/comments",
    context_path = "/api/v1/tasks",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Task ID"), ListCommentsQuery),
    responses(
        (status = 200, description = "Comments on the task, oldest first", body = CommentListResponse),
        (status = 404, description = "Task not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn list_task_comments(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<ListCommentsQuery>,
) -> Result<Json<CommentListResponse>> {
    check_permissions(TASK_POLICIES, &RequestContext::new(&method, &auth))?;

    let page = PageParams::new(query.page, query.per_page);
    let (items, total) = CommentService::new(state.db.clone())
        .list_for_task(task_id, page)
        .await?;

    Ok(Json(CommentListResponse {
        items,
        pagination: page.pagination(total),
    }))
}

#[utoipa::path(
    post,
    path = "/{id}/comments",
    context_path = "/api/v1/tasks",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Empty or oversized text", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Task not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn create_comment(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>)> {
    check_permissions(TASK_POLICIES, &RequestContext::new(&method, &auth))?;

    let comment = CommentService::new(state.db.clone())
        .create(task_id, auth.user_id, payload)
        .await?;
    state.event_bus.emit(
        EntityKind::Comment,
        ChangeKind::Created,
        comment.id,
        &auth.username,
    );

    Ok((StatusCode::CREATED, Json(comment)))
}

async fn load_authorized(
    service: &CommentService,
    id: Uuid,
    method: &Method,
    auth: &AuthExtension,
) -> Result<Comment> {
    let ctx = RequestContext::new(method, auth);
    check_permissions(DETAIL_POLICIES, &ctx)?;
    let comment = service.get(id).await?;
    check_object_permissions(DETAIL_POLICIES, &ctx, &comment)?;
    Ok(comment)
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/comments",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment", body = Comment),
        (status = 404, description = "Comment not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn get_comment(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Comment>> {
    let service = CommentService::new(state.db.clone());
    Ok(Json(load_authorized(&service, id, &method, &auth).await?))
}

/// PUT and PATCH both replace the text, the only editable field.
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/comments",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Comment ID")),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = Comment),
        (status = 403, description = "Caller is not the author", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Comment not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn update_comment(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CommentRequest>,
) -> Result<Json<Comment>> {
    let service = CommentService::new(state.db.clone());
    load_authorized(&service, id, &method, &auth).await?;

    let comment = service.update(id, payload).await?;
    state
        .event_bus
        .emit(EntityKind::Comment, ChangeKind::Updated, id, &auth.username);
    Ok(Json(comment))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/comments",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Caller is not the author", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Comment not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn delete_comment(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    method: Method,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    let service = CommentService::new(state.db.clone());
    load_authorized(&service, id, &method, &auth).await?;

    let storage_keys = service.delete(id).await?;
    remove_content(state.storage.as_ref(), &storage_keys).await;
    state
        .event_bus
        .emit(EntityKind::Comment, ChangeKind::Deleted, id, &auth.username);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment_by(author: Uuid) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            author_id: author,
            text: "Scaffolding still unsecured".into(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn user() -> AuthExtension {
        AuthExtension {
            user_id: Uuid::new_v4(),
            username: "u".into(),
            groups: vec![],
            is_admin: false,
        }
    }

    #[test]
    fn test_anyone_reads_only_author_writes() {
        let author = user();
        let reader = user();
        let comment = comment_by(author.user_id);

        let read = RequestContext::new(&Method::GET, &reader);
        assert!(check_object_permissions(DETAIL_POLICIES, &read, &comment).is_ok());

        let write = RequestContext::new(&Method::DELETE, &reader);
        assert!(check_object_permissions(DETAIL_POLICIES, &write, &comment).is_err());

        let own = RequestContext::new(&Method::PUT, &author);
        assert!(check_object_permissions(DETAIL_POLICIES, &own, &comment).is_ok());
    }

    #[test]
    fn test_anonymous_rejected() {
        let ctx = RequestContext::anonymous(&Method::GET);
        assert!(check_permissions(DETAIL_POLICIES, &ctx).is_err());
    }
}
