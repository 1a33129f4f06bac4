//! Policy layers used by the gateway pipeline.

use super::write::{authorize, WritePolicy};
use super::{PolicyContext, PolicyDecision, PolicyLayer};
use crate::environment::Environment;

// ============================================================================
// Write scope check
// ============================================================================

/// Applies the environment's write policy to mutating calls.
pub struct WriteScopeLayer {
    environment: Environment,
    policy: WritePolicy,
}

impl WriteScopeLayer {
    pub fn new(environment: Environment, policy: WritePolicy) -> Self {
        Self {
            environment,
            policy,
        }
    }
}

impl PolicyLayer for WriteScopeLayer {
    fn name(&self) -> &str {
        "write_scope"
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyDecision {
        authorize(ctx.call, self.environment, &self.policy)
    }
}

// ============================================================================
// Audit log
// ============================================================================

/// Logs every mutating call attempt. Always returns Allow (side-effect only).
pub struct AuditLogLayer {
    is_enabled: bool,
}

impl Default for AuditLogLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogLayer {
    pub fn new() -> Self {
        Self { is_enabled: true }
    }
}

impl PolicyLayer for AuditLogLayer {
    fn name(&self) -> &str {
        "audit_log"
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyDecision {
        if ctx.call.is_mutating {
            tracing::info!(
                call_id = %ctx.call_id,
                function = %ctx.call.function_name,
                environment = ctx.environment.as_str(),
                scope_param = ?ctx.call.scope_param_key,
                scope = ?ctx.call.scope_value(),
                "Write call audit"
            );
        }
        PolicyDecision::Allow
    }

    fn enabled(&self) -> bool {
        self.is_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::ToolCall;
    use crate::policy::PolicyPipeline;
    use uuid::Uuid;

    fn ctx(call: &ToolCall, environment: Environment) -> PolicyContext<'_> {
        PolicyContext {
            call,
            environment,
            call_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_write_scope_layer_uses_its_environment() {
        let layer = WriteScopeLayer::new(Environment::Prod, WritePolicy::new([7299], false));
        let call = ToolCall::write("core_course_update_courses", "courseid").param("courseid", 7299);
        assert!(!layer.evaluate(&ctx(&call, Environment::Prod)).is_allowed());
    }

    #[test]
    fn test_audit_layer_never_denies() {
        let layer = AuditLogLayer::new();
        let call = ToolCall::write("core_course_update_courses", "courseid");
        assert!(layer.evaluate(&ctx(&call, Environment::Dev)).is_allowed());
    }

    #[test]
    fn test_standard_pipeline_blocks_outside_whitelist() {
        let pipeline =
            PolicyPipeline::for_environment(Environment::Dev, WritePolicy::new([7299], false));
        let allowed = ToolCall::write("core_course_update_courses", "courseid").param("courseid", 7299);
        let blocked =
            ToolCall::write("core_course_update_courses", "courseid").param("courseid", 13043);

        assert!(pipeline.evaluate(&ctx(&allowed, Environment::Dev)).is_ok());
        assert!(pipeline.evaluate(&ctx(&blocked, Environment::Dev)).is_err());
    }
}
