pub mod catalog;
pub mod declarative_tool;
pub mod input;
pub mod participant_profiles_tool;
pub mod user_courses_tool;

pub use declarative_tool::DeclarativeTool;
pub use input::{build_call, ToolOptions};
pub use participant_profiles_tool::ParticipantProfilesTool;
pub use user_courses_tool::UserCoursesTool;

use anyhow::{Context, Result};
use moodle_gateway::{RetryPolicy, ToolRegistry};
use std::sync::Arc;

/// Register every catalog tool on `registry`.
pub fn register_catalog(registry: &ToolRegistry, retry: RetryPolicy) -> Result<()> {
    for spec in catalog::DECLARATIVE {
        registry
            .register(Arc::new(DeclarativeTool::new(*spec).with_retry(retry)))
            .with_context(|| format!("Failed to register '{}'", spec.name))?;
    }
    registry.register(Arc::new(UserCoursesTool::new(retry)))?;
    registry.register(Arc::new(ParticipantProfilesTool::new(retry)))?;
    Ok(())
}

/// A registry holding the full catalog.
pub fn default_registry() -> Result<ToolRegistry> {
    let registry = ToolRegistry::new();
    register_catalog(&registry, RetryPolicy::default())?;
    Ok(registry)
}
