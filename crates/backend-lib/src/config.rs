// ============================
// authority-backend/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::password::{PasswordRequirements, DEFAULT_LOG_N};
use crate::auth::rate_limit::{DEFAULT_LOCKOUT_DURATION, DEFAULT_MAX_ATTEMPTS};
use crate::auth::reset::RESET_TOKEN_TTL_SECS;
use crate::auth::session::SESSION_TTL_SECS;
use crate::auth::token::parse_algorithm;

/// Prefix of environment variables read by `Settings::load`
pub const ENV_PREFIX: &str = "AUTHORITY_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Directory holding `accounts.json`
    pub data_dir: PathBuf,
    /// Log level
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: String,
    pub auth: AuthSettings,
    pub password_requirements: PasswordRequirements,
    pub rate_limit: RateLimitSettings,
}

/// Token signing and lifetime settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC signing key; required
    pub secret_key: String,
    /// `HS256`, `HS384` or `HS512`
    pub algorithm: String,
    pub token_ttl_secs: u64,
    pub reset_token_ttl_secs: u64,
    /// scrypt cost exponent for new digests
    pub scrypt_log_n: u8,
    /// Mark the access-token cookie `Secure`
    pub cookie_secure: bool,
}

/// Login lockout settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_attempts: u32,
    pub lockout_secs: u64,
    /// Key lockouts on `x-real-ip` instead of the peer address. Only safe
    /// behind a proxy that overwrites the header.
    pub trust_forwarded_ip: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8001)),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            auth: AuthSettings::default(),
            password_requirements: PasswordRequirements::default(),
            rate_limit: RateLimitSettings::default(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            algorithm: "HS256".to_string(),
            token_ttl_secs: SESSION_TTL_SECS,
            reset_token_ttl_secs: RESET_TOKEN_TTL_SECS,
            scrypt_log_n: DEFAULT_LOG_N,
            cookie_secure: true,
        }
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret_key", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("reset_token_ttl_secs", &self.reset_token_ttl_secs)
            .field("scrypt_log_n", &self.scrypt_log_n)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_secs: DEFAULT_LOCKOUT_DURATION.as_secs(),
            trust_forwarded_ip: false,
        }
    }
}

impl Settings {
    /// Load from `config.toml` in the working directory plus the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config.toml")
    }

    /// Load from an explicit TOML file plus the environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Settings = Self::figment(path.as_ref()).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Layering: defaults, TOML file, `AUTHORITY_*` variables (nested with
    /// `__`), then bare `SECRET_KEY` / `ALGORITHM`.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(
                Env::raw()
                    .only(&["SECRET_KEY", "ALGORITHM"])
                    .map(|key| format!("auth.{}", key.as_str().to_ascii_lowercase()).into()),
            )
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.secret_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "auth.secret_key (or SECRET_KEY) is required".to_string(),
            ));
        }
        parse_algorithm(&self.auth.algorithm)
            .map_err(|e| ConfigError::Invalid(format!("auth.algorithm: {e}")))?;
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid("auth.token_ttl_secs must be positive".to_string()));
        }
        if self.auth.reset_token_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "auth.reset_token_ttl_secs must be positive".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!("unknown log level {}", self.log_level)));
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!("unknown log format {}", self.log_format)));
        }
        if self.password_requirements.min_length < 6 {
            return Err(ConfigError::Invalid(
                "password_requirements.min_length must be at least 6".to_string(),
            ));
        }
        if self.rate_limit.max_attempts == 0 {
            return Err(ConfigError::Invalid("rate_limit.max_attempts must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod config_tests;
