//! Request extractors whose rejections use the service's error body.
//!
//! Malformed JSON, query strings and path segments are answered with
//! `400 {"code": "VALIDATION_ERROR", "message": ...}` instead of axum's
//! plain-text rejections.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use axum_test::TestServer;
    use serde::Deserialize;
    use uuid::Uuid;

    #[derive(Deserialize)]
    struct Credentials {
        username: String,
        #[allow(dead_code)]
        password: String,
    }

    #[derive(Deserialize)]
    struct Paging {
        page: Option<u32>,
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/echo",
                get(|ApiQuery(q): ApiQuery<Paging>| async move {
                    q.page.unwrap_or(1).to_string()
                })
                .post(|ApiJson(c): ApiJson<Credentials>| async move { c.username }),
            )
            .route(
                "/items/:id",
                get(|ApiPath(id): ApiPath<Uuid>| async move { id.to_string() }),
            )
    }

    fn assert_validation_error(response: axum_test::TestResponse) {
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(!body["message"].as_str().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_missing_json_field_is_400_with_error_body() {
        let server = TestServer::new(app()).unwrap();
        let response = server
            .post("/echo")
            .json(&serde_json::json!({"username": "rep1"}))
            .await;
        assert_validation_error(response);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400_with_error_body() {
        let server = TestServer::new(app()).unwrap();
        let response = server
            .post("/echo")
            .bytes(bytes::Bytes::from_static(b"{\"username\":"))
            .content_type("application/json")
            .await;
        assert_validation_error(response);
    }

    #[tokio::test]
    async fn test_missing_content_type_is_400_with_error_body() {
        let server = TestServer::new(app()).unwrap();
        let response = server.post("/echo").text("username=rep1").await;
        assert_validation_error(response);
    }

    #[tokio::test]
    async fn test_bad_query_value_is_400_with_error_body() {
        let server = TestServer::new(app()).unwrap();
        let response = server.get("/echo?page=first").await;
        assert_validation_error(response);
    }

    #[tokio::test]
    async fn test_bad_uuid_path_is_400_with_error_body() {
        let server = TestServer::new(app()).unwrap();
        let response = server.get("/items/not-a-uuid").await;
        assert_validation_error(response);
    }

    #[tokio::test]
    async fn test_valid_requests_pass_through() {
        let server = TestServer::new(app()).unwrap();
        let id = Uuid::new_v4();
        assert_eq!(server.get(&format!("/items/{}", id)).await.text(), id.to_string());
        assert_eq!(server.get("/echo?page=3").await.text(), "3");
        let response = server
            .post("/echo")
            .json(&serde_json::json!({"username": "rep1", "password": "pw"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), "rep1");
    }
}
