//! In-process change notifications.
//!
//! Handlers publish an event after every successful write. The audit
//! listener spawned at startup turns them into structured log lines.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Kind of entity an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Violation,
    Task,
    Comment,
    Attachment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Violation => "violation",
            Self::Task => "task",
            Self::Comment => "comment",
            Self::Attachment => "attachment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

/// A domain event published when an entity changes.
#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    /// Event type, e.g. "violation.created", "task.deleted"
    #[serde(rename = "type")]
    pub event_type: String,
    /// UUID of the affected entity
    pub entity_id: String,
    /// Username of the actor who triggered the change
    pub actor: Option<String>,
    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl DomainEvent {
    /// Create a domain event timestamped to now.
    pub fn now(
        entity: EntityKind,
        change: ChangeKind,
        entity_id: impl ToString,
        actor: Option<String>,
    ) -> Self {
        Self {
            event_type: format!("{}.{}", entity.as_str(), change.as_str()),
            entity_id: entity_id.to_string(),
            actor,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Broadcast-based event bus for domain events.
///
/// A subscriber that falls behind receives `RecvError::Lagged` and skips
/// ahead; events are never replayed.
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a domain event. With no subscribers the event is dropped.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Build a timestamped event and publish it.
    pub fn emit(
        &self,
        entity: EntityKind,
        change: ChangeKind,
        entity_id: impl ToString,
        actor: &str,
    ) {
        self.publish(DomainEvent::now(
            entity,
            change,
            entity_id,
            Some(actor.to_string()),
        ));
    }
}

/// Log every published event under the `audit` target until the bus is dropped.
pub fn spawn_audit_log(bus: &Arc<EventBus>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    tracing::info!(
                        target: "audit",
                        event = %event.event_type,
                        entity_id = %event.entity_id,
                        actor = event.actor.as_deref().unwrap_or("-"),
                        at = %event.timestamp,
                        "Entity changed"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "audit", skipped, "Audit log fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
