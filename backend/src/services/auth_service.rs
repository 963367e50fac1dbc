//! Token issuing and request authentication.
//!
//! Access and refresh tokens are HS256 JWTs. Both carry the user's id, name
//! and group names at issue time; only access tokens are accepted on API
//! requests, and the user is reloaded on every request so deactivation and
//! group changes take effect immediately.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::OnceCell;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::middleware::auth::AuthExtension;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::services::user_service::UserService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub username: String,
    pub groups: Vec<String>,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Signs and verifies tokens.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let access_ttl = Duration::try_minutes(config.jwt_access_token_expiry_minutes)
            .ok_or_else(|| AppError::Config("Access token lifetime out of range".to_string()))?;
        let refresh_ttl = Duration::try_days(config.jwt_refresh_token_expiry_days)
            .ok_or_else(|| AppError::Config("Refresh token lifetime out of range".to_string()))?;
        Ok(Self::new(config.jwt_secret.as_bytes(), access_ttl, refresh_ttl))
    }

    fn issue(&self, user: &User, groups: &[String], token_type: TokenType) -> Result<String> {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::Internal("Token expiry out of range".to_string()))?;
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            groups: groups.to_vec(),
            token_type,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    pub fn issue_access(&self, user: &User, groups: &[String]) -> Result<String> {
        self.issue(user, groups, TokenType::Access)
    }

    pub fn issue_pair(&self, user: &User, groups: &[String]) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue(user, groups, TokenType::Access)?,
            refresh: self.issue(user, groups, TokenType::Refresh)?,
        })
    }

    /// Verify signature and expiry, then require the expected token type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        if data.claims.token_type != expected {
            return Err(AppError::Authentication(format!(
                "Expected {} token",
                match expected {
                    TokenType::Access => "an access",
                    TokenType::Refresh => "a refresh",
                }
            )));
        }
        Ok(data.claims)
    }
}

/// Hash checked when the username is unknown, so that branch costs one
/// bcrypt verification like a wrong password does.
static UNKNOWN_USER_HASH: OnceCell<String> = OnceCell::const_new();

async fn unknown_user_hash() -> Result<&'static str> {
    UNKNOWN_USER_HASH
        .get_or_try_init(|| hash_password("unknown-user-placeholder"))
        .await
        .map(String::as_str)
}

/// Credential checks backed by the users table.
pub struct AuthService<'a> {
    db: PgPool,
    tokens: &'a TokenIssuer,
}

impl<'a> AuthService<'a> {
    pub fn new(db: PgPool, tokens: &'a TokenIssuer) -> Self {
        Self { db, tokens }
    }

    /// Exchange a username and password for a token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair> {
        let users = UserService::new(self.db.clone());
        let invalid = || {
            AppError::Authentication(
                "No active account found with the given credentials".to_string(),
            )
        };

        let Some(user) = users.find_by_username(username).await? else {
            verify_password(password, unknown_user_hash().await?).await?;
            tracing::info!(username = %username, "Rejected login attempt");
            return Err(invalid());
        };
        if !user.is_active || !verify_password(password, &user.password_hash).await? {
            tracing::info!(username = %username, "Rejected login attempt");
            return Err(invalid());
        }

        let groups = users.group_names(user.id).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "Issued token pair");
        self.tokens.issue_pair(&user, &groups)
    }

    /// Trade a refresh token for a fresh access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh)?;
        let (user, groups) = self.load_active(claims.sub).await?;
        self.tokens.issue_access(&user, &groups)
    }

    /// Resolve an access token into the request principal.
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthExtension> {
        let claims = self.tokens.verify(access_token, TokenType::Access)?;
        let (user, groups) = self.load_active(claims.sub).await?;
        Ok(AuthExtension {
            user_id: user.id,
            username: user.username,
            groups,
            is_admin: user.is_staff,
        })
    }

    async fn load_active(&self, user_id: Uuid) -> Result<(User, Vec<String>)> {
        let users = UserService::new(self.db.clone());
        let user = users
            .find_by_id(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Authentication("User not found or inactive".to_string()))?;
        let groups = users.group_names(user.id).await?;
        Ok((user, groups))
    }
}

/// Hash a password with bcrypt off the async executor.
pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Check a password against a bcrypt hash off the async executor.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(e.to_string()))
}
