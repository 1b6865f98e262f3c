//! Event Registration Configuration
//!
//! Configuration is resolved in three layers, later layers winning:
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. `ER_*` environment variables
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ER_CONFIG` | - | Path to a TOML config file |
//! | `ER_HTTP_PORT` | `8080` | HTTP API port |
//! | `ER_DATABASE_URL` | `postgres://localhost:5432/event_registration` | Postgres URL |
//! | `ER_DATABASE_MAX_CONNECTIONS` | `10` | Pool size |
//! | `ER_DATABASE_ACQUIRE_TIMEOUT_MS` | `3000` | Wait for a pooled connection |
//! | `ER_DATABASE_STATEMENT_TIMEOUT_MS` | `5000` | Per-statement and per-operation bound |
//! | `ER_JWT_SECRET` | dev secret | HMAC key for session tokens |
//! | `ER_JWT_ISSUER` | `event-registration` | `iss` claim |
//! | `ER_SESSION_TTL_SECS` | `604800` | Session lifetime (7 days) |
//! | `ER_COOKIE_SECURE` | `false` | Mark the session cookie `Secure` |
//! | `ER_PASSWORD_MEMORY_KIB` | `19456` | Argon2 memory cost |
//! | `ER_PASSWORD_ITERATIONS` | `2` | Argon2 time cost |
//! | `ER_LOG_FORMAT` | `text` | `text` or `json` |
//! | `ER_DEV_MODE` | `false` | Create schema and seed sample data on start |

use std::path::Path;
use std::time::Duration;

use er_common::LogFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Secret used when nothing is configured. Only acceptable in dev mode.
pub const DEV_JWT_SECRET: &str = "dev-only-insecure-secret-change-me";

/// Longest accepted session lifetime (one year).
pub const MAX_SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 365;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    /// Upper bound for a single statement and for a whole service operation
    pub statement_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/event_registration".to_string(),
            max_connections: 10,
            acquire_timeout_ms: 3_000,
            statement_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub issuer: String,
    pub session_ttl_secs: i64,
    pub cookie_secure: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            issuer: "event-registration".to_string(),
            session_ttl_secs: 60 * 60 * 24 * 7,
            cookie_secure: false,
        }
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthSettings,
    pub password: PasswordSettings,
    pub logging: LoggingConfig,
    pub dev_mode: bool,
}

impl AppConfig {
    /// Load defaults, then the TOML file (explicit path or `ER_CONFIG`), then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("ER_CONFIG").ok();
        let path = path.map(Path::to_path_buf).or_else(|| env_path.map(Into::into));

        let mut config = match path {
            Some(p) => {
                info!("Loading configuration from {}", p.display());
                Self::from_file(&p)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from a variable lookup. Taking a closure keeps tests off the process env.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ER_HTTP_PORT") {
            self.http.port = parse_env("ER_HTTP_PORT", &v)?;
        }
        if let Some(v) = lookup("ER_DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = lookup("ER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("ER_DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("ER_DATABASE_ACQUIRE_TIMEOUT_MS") {
            self.database.acquire_timeout_ms = parse_env("ER_DATABASE_ACQUIRE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("ER_DATABASE_STATEMENT_TIMEOUT_MS") {
            self.database.statement_timeout_ms = parse_env("ER_DATABASE_STATEMENT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("ER_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = lookup("ER_JWT_ISSUER") {
            self.auth.issuer = v;
        }
        if let Some(v) = lookup("ER_SESSION_TTL_SECS") {
            self.auth.session_ttl_secs = parse_env("ER_SESSION_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("ER_COOKIE_SECURE") {
            self.auth.cookie_secure = parse_bool("ER_COOKIE_SECURE", &v)?;
        }
        if let Some(v) = lookup("ER_PASSWORD_MEMORY_KIB") {
            self.password.memory_kib = parse_env("ER_PASSWORD_MEMORY_KIB", &v)?;
        }
        if let Some(v) = lookup("ER_PASSWORD_ITERATIONS") {
            self.password.iterations = parse_env("ER_PASSWORD_ITERATIONS", &v)?;
        }
        if let Some(v) = lookup("ER_LOG_FORMAT") {
            self.logging.format = v.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "ER_LOG_FORMAT".to_string(),
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("ER_DEV_MODE") {
            self.dev_mode = parse_bool("ER_DEV_MODE", &v)?;
        }
        debug!(port = self.http.port, dev_mode = self.dev_mode, "Applied environment overrides");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.http.port == 0 {
            return Err(ConfigError::Invalid("http.port must be non-zero".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be non-zero".to_string()));
        }
        if self.database.acquire_timeout_ms == 0 || self.database.statement_timeout_ms == 0 {
            return Err(ConfigError::Invalid("database timeouts must be non-zero".to_string()));
        }
        if self.auth.session_ttl_secs <= 0 {
            return Err(ConfigError::Invalid("auth.session_ttl_secs must be positive".to_string()));
        }
        if self.auth.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "auth.session_ttl_secs must be at most {}",
                MAX_SESSION_TTL_SECS
            )));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".to_string()));
        }
        if !self.dev_mode && self.auth.jwt_secret == DEV_JWT_SECRET {
            return Err(ConfigError::Invalid(
                "auth.jwt_secret must be set outside dev mode".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.auth.session_ttl_secs, 604_800);
        assert!(!config.dev_mode);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            dev_mode = true

            [database]
            url = "postgres://db:5432/events"
            max_connections = 4
            "#,
        )
        .unwrap();

        assert!(config.dev_mode);
        assert_eq!(config.database.url, "postgres://db:5432/events");
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.statement_timeout_ms, 5_000);
        assert_eq!(config.http.port, 8080);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http]\nport = 9000\n\n[logging]\nformat = \"json\"").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = AppConfig::from_file(Path::new("/nonexistent/er.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = AppConfig::from_toml("[http]\nport = 9000").unwrap();
        config
            .apply_env(lookup_from(&[
                ("ER_HTTP_PORT", "9100"),
                ("ER_JWT_SECRET", "s3cret"),
                ("ER_COOKIE_SECURE", "true"),
                ("ER_DEV_MODE", "1"),
            ]))
            .unwrap();

        assert_eq!(config.http.port, 9100);
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert!(config.auth.cookie_secure);
        assert!(config.dev_mode);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(lookup_from(&[("ER_HTTP_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref key, .. } if key == "ER_HTTP_PORT"));
    }

    #[test]
    fn test_default_secret_rejected_outside_dev_mode() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());

        let dev = AppConfig { dev_mode: true, ..AppConfig::default() };
        assert!(dev.validate().is_ok());
    }

    #[test]
    fn test_session_ttl_bounds() {
        let mut config = AppConfig { dev_mode: true, ..AppConfig::default() };

        config.auth.session_ttl_secs = MAX_SESSION_TTL_SECS;
        assert!(config.validate().is_ok());

        config.auth.session_ttl_secs = MAX_SESSION_TTL_SECS + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.auth.session_ttl_secs = i64::MAX;
        assert!(config.validate().is_err());

        config.auth.session_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = AppConfig { dev_mode: true, ..AppConfig::default() };
        config.database.statement_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
