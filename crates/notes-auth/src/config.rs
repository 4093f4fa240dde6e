//! Token lifecycle configuration.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// Default access token lifetime ("15m").
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Default refresh token lifetime ("7d").
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Longest accepted token lifetime.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default number of simultaneously valid refresh tokens per user.
pub const DEFAULT_REFRESH_CAP: usize = 5;

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Configuration for [`SessionManager`](crate::SessionManager).
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for access tokens.
    pub access_secret: String,
    /// HMAC secret for refresh tokens. Must differ from `access_secret`.
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Maximum non-revoked refresh records per user.
    pub refresh_cap: usize,
    /// Bound applied to every store call.
    pub store_timeout: Duration,
    /// Argon2 memory cost in KiB.
    pub argon2_memory_kib: u32,
    /// Argon2 iteration count.
    pub argon2_iterations: u32,
}

impl AuthConfig {
    /// Configuration with default lifetimes and the given secrets.
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            refresh_cap: DEFAULT_REFRESH_CAP,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            argon2_memory_kib: argon2::Params::DEFAULT_M_COST,
            argon2_iterations: argon2::Params::DEFAULT_T_COST,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `JWT_ACCESS_SECRET`, `JWT_REFRESH_SECRET`
    ///
    /// Optional:
    /// - `JWT_ACCESS_TTL` (default "15m"), `JWT_REFRESH_TTL` (default "7d")
    /// - `REFRESH_TOKEN_CAP` (default 5)
    /// - `STORE_TIMEOUT_MS` (default 5000)
    /// - `ARGON2_MEMORY_KIB`, `ARGON2_ITERATIONS` (argon2 defaults)
    pub fn from_env() -> AuthResult<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> AuthResult<Self> {
        let required = |name: &str| {
            var(name).ok_or_else(|| {
                AuthError::Config(format!("missing required environment variable: {name}"))
            })
        };

        let mut config = Self::new(required("JWT_ACCESS_SECRET")?, required("JWT_REFRESH_SECRET")?);

        config.access_ttl = ttl_or(&var, "JWT_ACCESS_TTL", config.access_ttl)?;
        config.refresh_ttl = ttl_or(&var, "JWT_REFRESH_TTL", config.refresh_ttl)?;

        config.refresh_cap = parse_or(&var, "REFRESH_TOKEN_CAP", config.refresh_cap)?;
        config.store_timeout =
            Duration::from_millis(parse_or(&var, "STORE_TIMEOUT_MS", 5_000u64)?);
        config.argon2_memory_kib = parse_or(&var, "ARGON2_MEMORY_KIB", config.argon2_memory_kib)?;
        config.argon2_iterations = parse_or(&var, "ARGON2_ITERATIONS", config.argon2_iterations)?;

        if config.refresh_cap == 0 {
            return Err(AuthError::Config("REFRESH_TOKEN_CAP must be at least 1".to_string()));
        }

        Ok(config)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("refresh_cap", &self.refresh_cap)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> AuthResult<T> {
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AuthError::Config(format!("invalid value for {name}: {raw}"))),
        None => Ok(default),
    }
}

fn ttl_or(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> AuthResult<Duration> {
    let Some(raw) = var(name) else {
        return Ok(default);
    };
    parse_ttl(&raw)
        .filter(|ttl| ttl_in_range(*ttl))
        .ok_or_else(|| AuthError::Config(format!("invalid {name}: {raw} (expected 1s to 365d)")))
}

/// Whether `ttl` is non-zero and at most [`MAX_TTL`].
pub(crate) fn ttl_in_range(ttl: Duration) -> bool {
    !ttl.is_zero() && ttl <= MAX_TTL
}

/// Parses a lifetime such as `"30s"`, `"15m"`, `"12h"`, `"7d"`, or a bare
/// number of seconds.
pub fn parse_ttl(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let (unit_start, _) = raw.char_indices().last()?;
    let (digits, unit) = raw.split_at(unit_start);
    let n: u64 = digits.parse().ok()?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return None,
    };
    n.checked_mul(multiplier).map(Duration::from_secs)
}
