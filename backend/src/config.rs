//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;

use crate::error::{AppError, Result};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_STORAGE_PATH: &str = "./data/attachments";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
/// Upper bound for either token lifetime: one year.
const MAX_ACCESS_TOKEN_MINUTES: i64 = 365 * 24 * 60;
const MAX_REFRESH_TOKEN_DAYS: i64 = 365;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string
    pub database_url: String,
    /// Maximum connections held by the pool
    pub database_max_connections: u32,
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// HMAC secret used to sign JWTs
    pub jwt_secret: String,
    /// Access token lifetime in minutes
    pub jwt_access_token_expiry_minutes: i64,
    /// Refresh token lifetime in days
    pub jwt_refresh_token_expiry_days: i64,
    /// Root directory for attachment content
    pub storage_path: PathBuf,
    /// Largest accepted attachment upload
    pub max_upload_bytes: usize,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Config {
    /// Create config from environment variables.
    ///
    /// `DATABASE_URL` and `JWT_SECRET` are required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Config("DATABASE_URL not set".to_string()))?;

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Config("JWT_SECRET not set".to_string()))?;
        if jwt_secret.len() < 16 {
            return Err(AppError::Config(
                "JWT_SECRET must be at least 16 characters".to_string(),
            ));
        }

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        let jwt_access_token_expiry_minutes = within(
            "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
            parse_or(&lookup, "JWT_ACCESS_TOKEN_EXPIRY_MINUTES", 60)?,
            MAX_ACCESS_TOKEN_MINUTES,
        )?;
        let jwt_refresh_token_expiry_days = within(
            "JWT_REFRESH_TOKEN_EXPIRY_DAYS",
            parse_or(&lookup, "JWT_REFRESH_TOKEN_EXPIRY_DAYS", 1)?,
            MAX_REFRESH_TOKEN_DAYS,
        )?;
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let bind_address =
            lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let storage_path = lookup("STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH));

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let log_json = lookup("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            database_max_connections,
            bind_address,
            jwt_secret,
            jwt_access_token_expiry_minutes,
            jwt_refresh_token_expiry_days,
            storage_path,
            max_upload_bytes,
            cors_origins,
            log_json,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

/// Accept `value` only in `1..=max`.
fn within(key: &str, value: i64, max: i64) -> Result<i64> {
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(AppError::Config(format!(
            "{} must be between 1 and {}, got {}",
            key, max, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgres://localhost/violations"),
            ("JWT_SECRET", "0123456789abcdef0123"),
        ]
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&required())).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.jwt_access_token_expiry_minutes, 60);
        assert_eq!(config.jwt_refresh_token_expiry_days, 1);
        assert_eq!(config.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(config.storage_path, PathBuf::from("./data/attachments"));
        assert!(config.cors_origins.is_empty());
        assert!(!config.log_json);
    }

    #[test]
    fn test_missing_database_url() {
        let err = Config::from_lookup(lookup_from(&[("JWT_SECRET", "0123456789abcdef")]))
            .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_missing_jwt_secret() {
        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")]))
            .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "short"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("at least 16"));
    }

    #[test]
    fn test_overrides() {
        let mut vars = required();
        vars.extend([
            ("BIND_ADDRESS", "127.0.0.1:9000"),
            ("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", "5"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("CORS_ORIGINS", "https://a.example.com, https://b.example.com,"),
            ("LOG_FORMAT", "JSON"),
        ]);
        let config = Config::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.jwt_access_token_expiry_minutes, 5);
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example.com", "https://b.example.com"]
        );
        assert!(config.log_json);
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let mut vars = required();
        vars.push(("DATABASE_MAX_CONNECTIONS", "lots"));
        let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("DATABASE_MAX_CONNECTIONS"));
    }

    #[test]
    fn test_token_lifetimes_must_be_positive() {
        for (key, value) in [
            ("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", "0"),
            ("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", "-5"),
            ("JWT_REFRESH_TOKEN_EXPIRY_DAYS", "0"),
            ("JWT_REFRESH_TOKEN_EXPIRY_DAYS", "-1"),
        ] {
            let mut vars = required();
            vars.push((key, value));
            let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
            assert!(matches!(err, AppError::Config(_)), "{}={}", key, value);
            assert!(err.to_string().contains(key));
        }
    }

    #[test]
    fn test_token_lifetimes_are_capped_at_a_year() {
        for (key, value) in [
            ("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", "525601"),
            ("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", "9223372036854775807"),
            ("JWT_REFRESH_TOKEN_EXPIRY_DAYS", "366"),
            ("JWT_REFRESH_TOKEN_EXPIRY_DAYS", "9223372036854775807"),
        ] {
            let mut vars = required();
            vars.push((key, value));
            let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
            assert!(matches!(err, AppError::Config(_)), "{}={}", key, value);
        }
    }

    #[test]
    fn test_token_lifetime_bounds_inclusive() {
        let mut vars = required();
        vars.extend([
            ("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", "525600"),
            ("JWT_REFRESH_TOKEN_EXPIRY_DAYS", "365"),
        ]);
        let config = Config::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.jwt_access_token_expiry_minutes, 525_600);
        assert_eq!(config.jwt_refresh_token_expiry_days, 365);
    }
}
