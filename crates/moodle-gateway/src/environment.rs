//! Active backend selection.

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::{EndpointSettings, GatewayConfig};
use crate::error::ConfigError;

/// Which backend the process talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    /// Normalize (trim + lowercase) and match. Only `prod` selects
    /// production; absent, empty or unrecognized values select dev.
    pub fn from_discriminator(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()) {
            Some(value) if value == "prod" => Environment::Prod,
            _ => Environment::Dev,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Environment::Dev => "DEVELOPMENT",
            Environment::Prod => "PRODUCTION",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Prod)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Opaque web-service token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Resolved settings for the active backend.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub name: Environment,
    pub base_url: Url,
    pub credential: Credential,
    pub writes_allowed: bool,
}

/// Pick the active environment and validate its endpoint settings.
///
/// Callers should warn the operator whenever this returns production.
pub fn resolve(raw: Option<&str>, config: &GatewayConfig) -> Result<EnvironmentConfig, ConfigError> {
    let name = Environment::from_discriminator(raw);
    let (endpoint, writes_allowed) = match name {
        Environment::Dev => (
            &config.dev,
            !config.write_policy.dev_course_whitelist.is_empty(),
        ),
        Environment::Prod => (&config.prod, config.write_policy.prod_allow_writes),
    };

    let (base_url, credential) = endpoint_parts(endpoint, name)?;

    Ok(EnvironmentConfig {
        name,
        base_url,
        credential,
        writes_allowed,
    })
}

fn endpoint_parts(
    endpoint: &EndpointSettings,
    name: Environment,
) -> Result<(Url, Credential), ConfigError> {
    let missing = |key: &str| ConfigError::MissingRequired {
        key: format!("{}_{}", name.as_str(), key),
        environment: name.display_name().to_string(),
    };

    let raw_url = endpoint
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| missing("url"))?;
    let token = endpoint
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| missing("token"))?;

    let base_url = Url::parse(raw_url).map_err(|e| ConfigError::InvalidValue {
        key: format!("{}_url", name.as_str()),
        message: e.to_string(),
    })?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            key: format!("{}_url", name.as_str()),
            message: format!("unsupported scheme '{}'", base_url.scheme()),
        });
    }

    Ok((base_url, Credential::new(token)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both_configured() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.dev = EndpointSettings {
            url: Some("https://dev.example.edu".into()),
            token: Some("dev-token".into()),
        };
        config.prod = EndpointSettings {
            url: Some("https://prod.example.edu".into()),
            token: Some("prod-token".into()),
        };
        config
    }

    #[test]
    fn test_only_prod_selects_production() {
        assert_eq!(Environment::from_discriminator(Some("prod")), Environment::Prod);
        assert_eq!(Environment::from_discriminator(Some("  Prod\t")), Environment::Prod);
        assert_eq!(Environment::from_discriminator(Some("PROD ")), Environment::Prod);
    }

    #[test]
    fn test_unrecognized_values_select_dev() {
        for raw in ["", "production", "prd", "pro d", "dev", "staging", "PRODUCTION "] {
            assert_eq!(
                Environment::from_discriminator(Some(raw)),
                Environment::Dev,
                "{raw:?} must not select production"
            );
        }
        assert_eq!(Environment::from_discriminator(None), Environment::Dev);
    }

    #[test]
    fn test_resolve_dev_default() {
        let env = resolve(None, &both_configured()).unwrap();
        assert_eq!(env.name, Environment::Dev);
        assert_eq!(env.base_url.as_str(), "https://dev.example.edu/");
        assert_eq!(env.credential.expose(), "dev-token");
        assert!(env.writes_allowed);
    }

    #[test]
    fn test_resolve_prod_writes_follow_flag() {
        let env = resolve(Some("prod"), &both_configured()).unwrap();
        assert_eq!(env.name, Environment::Prod);
        assert_eq!(env.credential.expose(), "prod-token");
        assert!(!env.writes_allowed);
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let mut config = both_configured();
        config.dev.token = Some("   ".into());
        let err = resolve(Some("dev"), &config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "dev_token"));
    }

    #[test]
    fn test_missing_prod_url_only_matters_in_prod() {
        let mut config = both_configured();
        config.prod.url = None;
        assert!(resolve(Some("dev"), &config).is_ok());
        assert!(matches!(
            resolve(Some("prod"), &config),
            Err(ConfigError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let env = resolve(None, &both_configured()).unwrap();
        assert!(!format!("{:?}", env).contains("dev-token"));
    }
}
