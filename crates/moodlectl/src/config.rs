use anyhow::{Context, Result};
use moodle_gateway::GatewayConfig;
use std::path::Path;

/// Load config from file (or defaults), apply `MOODLE_*` variables, then
/// the `--env` flag.
pub fn load_config(path: Option<&Path>, env_override: Option<&str>) -> Result<GatewayConfig> {
    let mut config = GatewayConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load config file: {:?}", path),
        None => "Failed to load configuration from environment".to_string(),
    })?;

    if let Some(env) = env_override {
        config.env = Some(env.to_string());
    }
    Ok(config)
}
