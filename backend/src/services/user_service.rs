//! User lookups, group membership, and account creation.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::api::pagination::PageParams;
use crate::error::{AppError, Result};
use crate::models::user::{User, UserResponse};
use crate::services::auth_service::hash_password;

const USER_COLUMNS: &str = "u.id, u.username, u.email, u.first_name, u.last_name, \
                            u.password_hash, u.is_active, u.is_staff, u.created_at";

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub groups: Vec<String>,
}

pub struct UserService {
    db: PgPool,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List users, optionally restricted to members of `group`.
    pub async fn list(
        &self,
        group: Option<&str>,
        page: PageParams,
    ) -> Result<(Vec<UserResponse>, i64)> {
        let group = group.map(str::trim).filter(|g| !g.is_empty());
        let filter = r#"
            WHERE ($1::text IS NULL OR EXISTS (
                SELECT 1 FROM user_groups ug
                JOIN groups g ON g.id = ug.group_id
                WHERE ug.user_id = u.id AND g.name = $1
            ))
        "#;

        let users: Vec<User> = sqlx::query_as(&format!(
            "SELECT {} FROM users u {} ORDER BY u.username OFFSET $2 LIMIT $3",
            USER_COLUMNS, filter
        ))
        .bind(group)
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users u {}", filter))
            .bind(group)
            .fetch_one(&self.db)
            .await?;

        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
        let mut groups = self.group_names_for(&ids).await?;
        let items = users
            .into_iter()
            .map(|u| {
                let names = groups.remove(&u.id).unwrap_or_default();
                UserResponse::from_user(u, names)
            })
            .collect();

        Ok((items, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<UserResponse> {
        let user = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let groups = self.group_names(user.id).await?;
        Ok(UserResponse::from_user(user, groups))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {} FROM users u WHERE u.id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as(&format!(
            "SELECT {} FROM users u WHERE u.username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    /// Group names of one user, sorted.
    pub async fn group_names(&self, user_id: Uuid) -> Result<Vec<String>> {
        let names = sqlx::query_scalar(
            r#"
            SELECT g.name FROM groups g
            JOIN user_groups ug ON ug.group_id = g.id
            WHERE ug.user_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(names)
    }

    async fn group_names_for(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<String>>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT ug.user_id, g.name FROM user_groups ug
            JOIN groups g ON g.id = ug.group_id
            WHERE ug.user_id = ANY($1)
            ORDER BY g.name
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.db)
        .await?;

        let mut map: HashMap<Uuid, Vec<String>> = HashMap::new();
        for (user_id, name) in rows {
            map.entry(user_id).or_default().push(name);
        }
        Ok(map)
    }

    /// Create an account and add it to the given groups, creating missing groups.
    pub async fn create(&self, new_user: NewUser) -> Result<UserResponse> {
        let password_hash = hash_password(&new_user.password).await?;
        let mut tx = self.db.begin().await?;

        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (username, email, first_name, last_name, password_hash, is_staff)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, email, first_name, last_name, password_hash,
                      is_active, is_staff, created_at
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&password_hash)
        .bind(new_user.is_staff)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return AppError::Conflict(format!(
                        "Username '{}' is taken",
                        new_user.username
                    ));
                }
            }
            AppError::Sqlx(e)
        })?;

        for group in &new_user.groups {
            let group_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO groups (name) VALUES ($1)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING id
                "#,
            )
            .bind(group)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO user_groups (user_id, group_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user.id)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let mut groups = new_user.groups.clone();
        groups.sort();
        groups.dedup();
        tracing::info!(user_id = %user.id, username = %user.username, "Created user");
        Ok(UserResponse::from_user(user, groups))
    }
}
