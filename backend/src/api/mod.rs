//! HTTP API: shared state, routing, middleware and handlers.

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod pagination;
pub mod permissions;
pub mod routes;
pub mod validation;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::Result;
use crate::services::auth_service::TokenIssuer;
use crate::services::event_bus::EventBus;
use crate::storage::StorageBackend;

/// State shared by every request handler.
pub struct AppState {
    pub config: Config,
    pub db: PgPool,
    pub storage: Arc<dyn StorageBackend>,
    pub tokens: TokenIssuer,
    pub event_bus: Arc<EventBus>,
    /// Absent when another recorder is already installed (tests).
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: PgPool,
        storage: Arc<dyn StorageBackend>,
        event_bus: Arc<EventBus>,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self> {
        let tokens = TokenIssuer::from_config(&config)?;
        Ok(Self {
            config,
            db,
            storage,
            tokens,
            event_bus,
            metrics,
        })
    }
}

pub type SharedState = Arc<AppState>;
