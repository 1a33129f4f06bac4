//! Gateway configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file,
//! then `MOODLE_*` environment variables. Everything is read once at startup;
//! the resulting [`GatewayConfig`] is never re-read.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policy::{ScopeId, WritePolicy};

pub const ENV_PREFIX: &str = "MOODLE_";

/// Sandbox course that receives writes in development unless overridden.
pub const DEFAULT_DEV_SCOPE: ScopeId = 7299;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Environment discriminator; only `prod` selects production.
    #[serde(default)]
    pub env: Option<String>,

    #[serde(default)]
    pub dev: EndpointSettings,

    #[serde(default)]
    pub prod: EndpointSettings,

    #[serde(default)]
    pub write_policy: WritePolicySettings,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub response: ResponseSettings,
}

/// Base URL and token for one backend.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct EndpointSettings {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for EndpointSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointSettings")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WritePolicySettings {
    /// Courses that accept writes while the dev environment is active
    #[serde(default = "default_dev_whitelist")]
    pub dev_course_whitelist: BTreeSet<ScopeId>,

    /// Master switch for writes against production
    #[serde(default)]
    pub prod_allow_writes: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Upper bound on concurrently in-flight upstream requests
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Idle keep-alive connections kept per host
    #[serde(default = "default_max_keepalive")]
    pub max_keepalive_connections: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseSettings {
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

fn default_dev_whitelist() -> BTreeSet<ScopeId> {
    BTreeSet::from([DEFAULT_DEV_SCOPE])
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    100
}

fn default_max_keepalive() -> usize {
    20
}

fn default_max_response_bytes() -> usize {
    50_000
}

impl Default for WritePolicySettings {
    fn default() -> Self {
        Self {
            dev_course_whitelist: default_dev_whitelist(),
            prod_allow_writes: false,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_connections: default_max_connections(),
            max_keepalive_connections: default_max_keepalive(),
        }
    }
}

impl Default for ResponseSettings {
    fn default() -> Self {
        Self {
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

impl GatewayConfig {
    /// Parse a TOML document. Missing sections fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read a TOML file without applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load from an optional TOML file, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay `MOODLE_*` variables resolved through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(env) = var("ENV") {
            self.env = Some(env);
        }
        if let Some(url) = var("DEV_URL") {
            self.dev.url = Some(url);
        }
        if let Some(token) = var("DEV_TOKEN") {
            self.dev.token = Some(token);
        }
        if let Some(url) = var("PROD_URL") {
            self.prod.url = Some(url);
        }
        if let Some(token) = var("PROD_TOKEN") {
            self.prod.token = Some(token);
        }
        if let Some(raw) = var("DEV_COURSE_WHITELIST") {
            self.write_policy.dev_course_whitelist =
                parse_whitelist(&raw, "MOODLE_DEV_COURSE_WHITELIST")?;
        }
        if let Some(raw) = var("PROD_ALLOW_WRITES") {
            self.write_policy.prod_allow_writes = parse_bool(&raw, "MOODLE_PROD_ALLOW_WRITES")?;
        }
        if let Some(raw) = var("API_TIMEOUT") {
            self.http.timeout_secs = parse_number(&raw, "MOODLE_API_TIMEOUT")?;
        }
        if let Some(raw) = var("MAX_CONNECTIONS") {
            self.http.max_connections = parse_number(&raw, "MOODLE_MAX_CONNECTIONS")?;
        }
        if let Some(raw) = var("MAX_KEEPALIVE_CONNECTIONS") {
            self.http.max_keepalive_connections =
                parse_number(&raw, "MOODLE_MAX_KEEPALIVE_CONNECTIONS")?;
        }
        if let Some(raw) = var("MAX_RESPONSE_BYTES") {
            self.response.max_response_bytes = parse_number(&raw, "MOODLE_MAX_RESPONSE_BYTES")?;
        }

        Ok(())
    }

    pub fn write_policy(&self) -> WritePolicy {
        WritePolicy::new(
            self.write_policy.dev_course_whitelist.iter().copied(),
            self.write_policy.prod_allow_writes,
        )
    }
}

/// Parse a comma-separated list of course ids. Blank entries are skipped;
/// anything non-numeric is rejected rather than silently replaced.
pub fn parse_whitelist(raw: &str, key: &str) -> Result<BTreeSet<ScopeId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse::<ScopeId>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{entry}' is not a course id"),
            })
        })
        .collect()
}

fn parse_bool(raw: &str, key: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{other}' is not a boolean"),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{}' is not a valid number", raw.trim()),
    })
}
