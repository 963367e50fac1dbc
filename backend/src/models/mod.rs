//! Database models (SQLx).

pub mod attachment;
pub mod comment;
pub mod organization;
pub mod project;
pub mod task;
pub mod user;
pub mod violation;
