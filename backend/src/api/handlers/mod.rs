//! HTTP request handlers, one module per resource.

pub mod attachments;
pub mod auth;
pub mod comments;
pub mod health;
pub mod organizations;
pub mod projects;
pub mod tasks;
pub mod users;
pub mod violation_types;
pub mod violations;
