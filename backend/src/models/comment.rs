//! Comment model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::permissions::{ObjectOwners, OwnedObject};

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Comment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnedObject for Comment {
    fn owners(&self) -> ObjectOwners {
        ObjectOwners {
            author: Some(self.author_id),
            ..Default::default()
        }
    }
}
