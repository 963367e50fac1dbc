//! Violation tracker backend.
//!
//! An HTTP API for site violations, the remediation tasks raised against
//! them, task comments and file attachments, backed by PostgreSQL.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{AppError, Result};
