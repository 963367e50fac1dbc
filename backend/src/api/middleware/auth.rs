//! Bearer-token authentication middleware.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::services::auth_service::AuthService;

/// The authenticated principal, attached to every request that passes
/// [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthExtension {
    pub user_id: Uuid,
    pub username: String,
    pub groups: Vec<String>,
    pub is_admin: bool,
}

impl AuthExtension {
    pub fn in_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g == name)
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Reject requests without a valid access token; otherwise attach an
/// [`AuthExtension`] for the handlers.
pub async fn auth_middleware(
    State(state): State<SharedState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided".to_string())
        })?
        .to_string();

    let auth = AuthService::new(state.db.clone(), &state.tokens)
        .authenticate(&token)
        .await?;

    tracing::Span::current().record("user", auth.username.as_str());
    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_bearer_token(&headers("bearer xyz")), Some("xyz"));
    }

    #[test]
    fn test_extract_rejects_other_schemes() {
        assert_eq!(extract_bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(extract_bearer_token(&headers("Bearer")), None);
        assert_eq!(extract_bearer_token(&headers("Bearer   ")), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_in_group() {
        let auth = AuthExtension {
            user_id: Uuid::nil(),
            username: "rep".to_string(),
            groups: vec!["contractor".to_string(), "representative".to_string()],
            is_admin: false,
        };
        assert!(auth.in_group("representative"));
        assert!(!auth.in_group("Representative"));
        assert!(!auth.in_group("admin"));
    }
}
