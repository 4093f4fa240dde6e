//! Server configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use http::HeaderValue;
use notes_core::{ROLE_USER, RoleSet};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Deployment environment. Only `Development` exposes internal error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Production,
    Development,
}

/// Origins allowed by CORS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<HeaderValue>),
}

impl FromStr for CorsOrigins {
    type Err = ConfigError;

    /// `"*"` or a comma-separated list of origins.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "*" {
            return Ok(Self::Any);
        }
        raw.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|_| ConfigError::invalid("CORS_ORIGINS", origin))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::List)
    }
}

/// Credentials of the admin user ensured at startup.
#[derive(Clone)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSeed")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server port to listen on.
    pub port: u16,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    pub log_format: LogFormat,
    pub app_env: AppEnv,
    pub cors_origins: CorsOrigins,
    /// Requests allowed per client IP per window.
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    /// Maximum request body size in bytes.
    pub body_limit: usize,
    pub request_timeout: Duration,
    /// Send `strict-transport-security`.
    pub hsts: bool,
    /// Roles granted to self-registered users.
    pub registration_roles: RoleSet,
    pub admin: Option<AdminSeed>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            app_env: AppEnv::Production,
            cors_origins: CorsOrigins::Any,
            rate_limit_max: 60,
            rate_limit_window: Duration::from_millis(60_000),
            body_limit: 1_000_000,
            request_timeout: Duration::from_millis(15_000),
            hsts: false,
            registration_roles: [ROLE_USER].into_iter().collect(),
            admin: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// All optional:
    /// - `PORT` (default: 8080)
    /// - `LOG_LEVEL` (default: "info"), `LOG_FORMAT` ("text" or "json")
    /// - `APP_ENV` ("production" or "development")
    /// - `CORS_ORIGINS` (default: "*")
    /// - `RATE_LIMIT_MAX` (default: 60), `RATE_LIMIT_TIME_MS` (default: 60000)
    /// - `BODY_LIMIT` (default: 1000000), `REQUEST_TIMEOUT_MS` (default: 15000)
    /// - `HELMET_HSTS` (default: false)
    /// - `REGISTRATION_ROLES` (default: "user")
    /// - `ADMIN_USERNAME` and `ADMIN_PASSWORD` (seed skipped unless both are set)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let log_format = match var("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(ConfigError::invalid("LOG_FORMAT", other)),
        };

        let app_env = match var("APP_ENV").as_deref().map(str::trim) {
            None | Some("") | Some("production") => AppEnv::Production,
            Some("development") => AppEnv::Development,
            Some(other) => return Err(ConfigError::invalid("APP_ENV", other)),
        };

        let rate_limit_max: u32 = parse_or(&var, "RATE_LIMIT_MAX", defaults.rate_limit_max)?;
        if rate_limit_max == 0 {
            return Err(ConfigError::invalid("RATE_LIMIT_MAX", "0"));
        }
        let rate_limit_ms: u64 = parse_or(&var, "RATE_LIMIT_TIME_MS", 60_000)?;
        if rate_limit_ms == 0 {
            return Err(ConfigError::invalid("RATE_LIMIT_TIME_MS", "0"));
        }

        let admin = match (var("ADMIN_USERNAME"), var("ADMIN_PASSWORD")) {
            (Some(username), Some(password))
                if !username.trim().is_empty() && !password.is_empty() =>
            {
                Some(AdminSeed { username, password })
            }
            _ => None,
        };

        Ok(Self {
            port: parse_or(&var, "PORT", defaults.port)?,
            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            app_env,
            cors_origins: match var("CORS_ORIGINS") {
                Some(raw) => raw.parse()?,
                None => defaults.cors_origins,
            },
            rate_limit_max,
            rate_limit_window: Duration::from_millis(rate_limit_ms),
            body_limit: parse_or(&var, "BODY_LIMIT", defaults.body_limit)?,
            request_timeout: Duration::from_millis(parse_or(&var, "REQUEST_TIMEOUT_MS", 15_000)?),
            hsts: parse_bool(&var, "HELMET_HSTS", defaults.hsts)?,
            registration_roles: var("REGISTRATION_ROLES")
                .map(|raw| raw.split(',').collect())
                .unwrap_or(defaults.registration_roles),
            admin,
        })
    }

    pub fn is_development(&self) -> bool {
        self.app_env == AppEnv::Development
    }

    /// Get the socket address for the server.
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::invalid(name, &raw)),
        None => Ok(default),
    }
}

fn parse_bool(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match var(name).as_deref().map(str::trim) {
        None => Ok(default),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") | Some("") => Ok(false),
        Some(other) => Err(ConfigError::invalid(name, other)),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid environment variable value.
    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl ConfigError {
    fn invalid(name: &str, value: &str) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            reason: format!("unsupported value {value:?}"),
        }
    }
}
