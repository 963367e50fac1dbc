//! Violation and violation type models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::permissions::{ObjectOwners, OwnedObject};

/// Category a violation is filed under.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ViolationType {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// Lifecycle of a reported violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViolationStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl ViolationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }
}

/// A reported issue on a project, owned by the user who filed it.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Violation {
    pub id: Uuid,
    pub project_id: Uuid,
    pub violation_type_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub status: String,
    pub deadline: Option<DateTime<Utc>>,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnedObject for Violation {
    fn owners(&self) -> ObjectOwners {
        ObjectOwners {
            creator: Some(self.creator_id),
            ..Default::default()
        }
    }
}
