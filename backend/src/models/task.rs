//! Task model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::permissions::{ObjectOwners, OwnedObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    New,
    InProgress,
    Done,
    Rejected,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Rejected => "rejected",
        }
    }
}

/// Follow-up work on a violation, assigned by its creator to an executor.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Task {
    pub id: Uuid,
    pub violation_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub deadline: Option<DateTime<Utc>>,
    pub creator_id: Uuid,
    pub executor_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnedObject for Task {
    fn owners(&self) -> ObjectOwners {
        ObjectOwners {
            creator: Some(self.creator_id),
            executor: Some(self.executor_id),
            author: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_values_match_serde() {
        for status in [
            TaskStatus::New,
            TaskStatus::InProgress,
            TaskStatus::Done,
            TaskStatus::Rejected,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert_eq!(TaskStatus::default(), TaskStatus::New);
    }

    #[test]
    fn test_status_deserializes_snake_case() {
        let status: TaskStatus = serde_json::from_str(r#""rejected""#).unwrap();
        assert_eq!(status, TaskStatus::Rejected);
        assert!(serde_json::from_str::<TaskStatus>(r#""Rejected""#).is_err());
    }
}
