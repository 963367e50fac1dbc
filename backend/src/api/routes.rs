//! Route table and the middleware stack around it.

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers::{
    attachments, auth, comments, health, organizations, projects, tasks, users, violation_types,
    violations,
};
use crate::api::middleware::auth::auth_middleware;
use crate::api::middleware::metrics::track_metrics;
use crate::api::openapi::build_openapi;
use crate::api::SharedState;

/// Build the application router.
///
/// `/health`, `/metrics`, the docs and `/api/v1/token*` are public; every
/// other `/api/v1` route goes through [`auth_middleware`].
pub fn create_router(state: SharedState) -> Router {
    let protected = Router::new()
        .nest("/projects", projects::router())
        .nest("/organizations", organizations::router())
        .nest("/violation-types", violation_types::router())
        .nest("/violations", violations::router())
        .nest("/tasks", tasks::router())
        .nest("/comments", comments::router())
        .nest(
            "/attachments",
            attachments::router(state.config.max_upload_bytes),
        )
        .nest("/users", users::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new().nest("/token", auth::router()).merge(protected);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .nest("/api/v1", api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", build_openapi()))
        .layer(middleware::from_fn(track_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            uri = %request.uri(),
                            user = tracing::field::Empty,
                        )
                    }),
                )
                .layer(cors_layer(&state.config.cors_origins))
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

/// Any origin when `origins` is empty, otherwise exactly the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(allowed)
}
