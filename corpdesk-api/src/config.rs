/// Configuration management for the API server
///
/// Settings come from environment variables. A `.env` file in the working
/// directory is loaded first when present.
///
/// # Environment Variables
///
/// - `API_HOST` (default `0.0.0.0`), `API_PORT` (default `8080`)
/// - `API_CORS_ORIGINS`: comma-separated origins, `*` for any (default `*`)
/// - `API_PRODUCTION`: `true` enables HSTS
/// - `DATABASE_URL` (required), `DATABASE_MAX_CONNECTIONS` (default 10)
/// - `JWT_SECRET` (required, at least 32 characters)
/// - `JWT_ACCESS_TTL_MINUTES` (default 60), `JWT_REFRESH_TTL_DAYS` (default 7)
/// - `RUN_MIGRATIONS` (default `true`)
/// - `LOG_FORMAT`: `pretty` or `json` (default `pretty`)
///
/// # Example
///
/// ```no_run
/// use corpdesk_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use chrono::Duration;
use corpdesk_shared::auth::jwt::JwtSettings;
use serde::{Deserialize, Serialize};
use std::{env, str::FromStr};

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Enables HSTS
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,

    /// Apply embedded migrations on startup
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing key. Generate with `openssl rand -hex 32`.
    #[serde(skip_serializing)]
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(&lookup, "API_PORT", 8080)?;

        let cors_origins: Vec<String> = lookup("API_CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let production = parse_bool_or(&lookup, "API_PRODUCTION", false)?;

        let url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections: u32 = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        let run_migrations = parse_bool_or(&lookup, "RUN_MIGRATIONS", true)?;

        let secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let access_ttl_minutes: i64 = parse_or(&lookup, "JWT_ACCESS_TTL_MINUTES", 60)?;
        let refresh_ttl_days: i64 = parse_or(&lookup, "JWT_REFRESH_TTL_DAYS", 7)?;
        if access_ttl_minutes <= 0 || refresh_ttl_days <= 0 {
            anyhow::bail!("JWT token lifetimes must be positive");
        }

        let format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::Pretty,
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins: if cors_origins.is_empty() {
                    vec!["*".to_string()]
                } else {
                    cors_origins
                },
                production,
            },
            database: DatabaseConfig {
                url,
                max_connections,
                run_migrations,
            },
            jwt: JwtConfig {
                secret,
                access_ttl_minutes,
                refresh_ttl_days,
            },
            logging: LoggingConfig { format },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn jwt_settings(&self) -> JwtSettings {
        JwtSettings {
            secret: self.jwt.secret.clone(),
            access_ttl: Duration::minutes(self.jwt.access_ttl_minutes),
            refresh_ttl: Duration::days(self.jwt.refresh_ttl_days),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: '{}'", key, value)),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> anyhow::Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" || v.eq_ignore_ascii_case("no") => Ok(false),
        Some(v) => anyhow::bail!("{} must be a boolean, got '{}'", key, v),
    }
}
