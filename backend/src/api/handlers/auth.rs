//! Token endpoints. These are the only `/api/v1` routes open to anonymous callers.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::api::extract::ApiJson;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::services::auth_service::{AuthService, TokenPair};

#[derive(OpenApi)]
#[openapi(
    paths(obtain_token, refresh_token),
    components(schemas(TokenRequest, TokenPair, RefreshRequest, AccessTokenResponse))
)]
pub struct AuthApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(obtain_token))
        .route("/refresh", post(refresh_token))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub username: String,
    #[schema(format = Password)]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access: String,
}

/// POST /api/v1/token
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/token",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Access and refresh tokens", body = TokenPair),
        (status = 401, description = "Invalid credentials", body = crate::api::openapi::ErrorResponse),
    ),
)]
pub async fn obtain_token(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<TokenRequest>,
) -> Result<Json<TokenPair>> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "username and password are required".to_string(),
        ));
    }

    let pair = AuthService::new(state.db.clone(), &state.tokens)
        .login(payload.username.trim(), &payload.password)
        .await?;
    Ok(Json(pair))
}

/// POST /api/v1/token/refresh
#[utoipa::path(
    post,
    path = "/refresh",
    context_path = "/api/v1/token",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "Invalid or expired refresh token", body = crate::api::openapi::ErrorResponse),
    ),
)]
pub async fn refresh_token(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>> {
    let access = AuthService::new(state.db.clone(), &state.tokens)
        .refresh(&payload.refresh)
        .await?;
    Ok(Json(AccessTokenResponse { access }))
}
