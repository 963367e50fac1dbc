//! OpenAPI document assembled from the handler annotations.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Root document. Each handler module contributes an `XxxApiDoc` that is
/// merged in by [`build_openapi`].
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Violation Tracker API",
        description = "Site violations, remediation tasks, comments and attachments.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Token issue and refresh"),
        (name = "projects", description = "Construction projects"),
        (name = "organizations", description = "Contractor organizations"),
        (name = "violation-types", description = "Violation categories"),
        (name = "violations", description = "Violations reported by representatives"),
        (name = "tasks", description = "Remediation tasks"),
        (name = "comments", description = "Task discussion"),
        (name = "attachments", description = "Files attached to violations, tasks and comments"),
        (name = "users", description = "User directory"),
        (name = "health", description = "Liveness checks"),
    ),
    components(schemas(ErrorResponse))
)]
pub struct ApiDoc;

/// Error body returned by every endpoint on failure.
#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable code, e.g. "NOT_FOUND", "FORBIDDEN"
    pub code: String,
    pub message: String,
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn build_openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();

    doc.merge(super::handlers::auth::AuthApiDoc::openapi());
    doc.merge(super::handlers::projects::ProjectsApiDoc::openapi());
    doc.merge(super::handlers::organizations::OrganizationsApiDoc::openapi());
    doc.merge(super::handlers::violation_types::ViolationTypesApiDoc::openapi());
    doc.merge(super::handlers::violations::ViolationsApiDoc::openapi());
    doc.merge(super::handlers::tasks::TasksApiDoc::openapi());
    doc.merge(super::handlers::comments::CommentsApiDoc::openapi());
    doc.merge(super::handlers::attachments::AttachmentsApiDoc::openapi());
    doc.merge(super::handlers::users::UsersApiDoc::openapi());
    doc.merge(super::handlers::health::HealthApiDoc::openapi());

    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_resource_paths() {
        let doc = build_openapi();
        for path in [
            "/api/v1/token",
            "/api/v1/token/refresh",
            "/api/v1/violations",
            "/api/v1/violations/{id}",
            "/api/v1/tasks/{id}/comments",
            "/api/v1/comments/{id}",
            "/api/v1/attachments/{id}/download",
            "/api/v1/violation-types",
            "/api/v1/users",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let doc = build_openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_document_serializes() {
        let json = serde_json::to_string(&build_openapi()).unwrap();
        assert!(json.contains("Violation Tracker API"));
    }
}
