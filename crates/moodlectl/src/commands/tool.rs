use anyhow::{Context, Result};
use moodle_gateway::Gateway;
use serde_json::Value;

/// Run a catalog tool by name.
pub async fn execute(gateway: &Gateway, name: &str, input: &str) -> Result<()> {
    let input: Value = serde_json::from_str(input).context("Tool input is not valid JSON")?;
    let registry = moodle_tools::default_registry()?;
    let response = registry.invoke(gateway, name, input).await?;
    super::emit(&response)
}
