//! User directory handlers.

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
use crate::models::user::UserResponse;
use crate::services::user_service::UserService;

#[derive(OpenApi)]
#[openapi(
    paths(list_users, get_user),
    components(schemas(UserResponse, UserListResponse))
)]
pub struct UsersApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_users))
        .route("/:id", get(get_user))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// Only members of this group; empty means every user
    pub group: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub items: Vec<UserResponse>,
    pub pagination: Pagination,
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/users",
    tag = "users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users with their group names", body = UserListResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn list_users(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<Json<UserListResponse>> {
    let page = PageParams::new(query.page, query.per_page);
    let (items, total) = UserService::new(state.db.clone())
        .list(query.group.as_deref(), page)
        .await?;

    Ok(Json(UserListResponse {
        items,
        pagination: page.pagination(total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "User not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn get_user(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserResponse>> {
    Ok(Json(UserService::new(state.db.clone()).get(id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_filter_is_optional() {
        let query: ListUsersQuery = serde_urlencoded::from_str("").unwrap();
        assert!(query.group.is_none());

        let query: ListUsersQuery = serde_urlencoded::from_str("group=contractor").unwrap();
        assert_eq!(query.group.as_deref(), Some("contractor"));

        let query: ListUsersQuery = serde_urlencoded::from_str("group=").unwrap();
        assert_eq!(query.group.as_deref(), Some(""));
    }
}
