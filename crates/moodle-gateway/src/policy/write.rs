//! Write-permission decision for mutating calls.

use std::collections::BTreeSet;

use serde_json::Value;

use super::PolicyDecision;
use crate::call::ToolCall;
use crate::environment::Environment;

/// Identifier of the unit that write access is partitioned by (a course id).
pub type ScopeId = i64;

pub const MISSING_SCOPE_REASON: &str = "missing scope identifier for safety check";

/// Immutable write policy, read once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePolicy {
    scope_whitelist: BTreeSet<ScopeId>,
    production_writes_allowed: bool,
}

impl WritePolicy {
    pub fn new(
        scope_whitelist: impl IntoIterator<Item = ScopeId>,
        production_writes_allowed: bool,
    ) -> Self {
        Self {
            scope_whitelist: scope_whitelist.into_iter().collect(),
            production_writes_allowed,
        }
    }

    pub fn scope_whitelist(&self) -> &BTreeSet<ScopeId> {
        &self.scope_whitelist
    }

    pub fn production_writes_allowed(&self) -> bool {
        self.production_writes_allowed
    }

    fn whitelist_display(&self) -> String {
        let ids: Vec<String> = self.scope_whitelist.iter().map(|id| id.to_string()).collect();
        format!("[{}]", ids.join(", "))
    }
}

/// Decide whether `call` may run. Read-only calls are always allowed and
/// their parameters are never looked at.
pub fn authorize(call: &ToolCall, environment: Environment, policy: &WritePolicy) -> PolicyDecision {
    if !call.is_mutating {
        return PolicyDecision::Allow;
    }

    let Some(raw_scope) = call.scope_value() else {
        let key = call.scope_param_key.as_deref().unwrap_or("<none>");
        return PolicyDecision::Deny(format!(
            "{MISSING_SCOPE_REASON}: '{}' requires parameter '{}'",
            call.function_name, key
        ));
    };

    match environment {
        Environment::Prod => {
            if policy.production_writes_allowed {
                PolicyDecision::Allow
            } else {
                PolicyDecision::Deny(format!(
                    "write operations are disabled in the {} environment \
                     (attempted scope {}, production writes allowed: false)",
                    environment,
                    display_scope(raw_scope)
                ))
            }
        }
        Environment::Dev => match parse_scope(raw_scope) {
            Some(scope) if policy.scope_whitelist.contains(&scope) => PolicyDecision::Allow,
            Some(scope) => PolicyDecision::Deny(format!(
                "scope {} is not in the {} write whitelist {}; \
                 add it to MOODLE_DEV_COURSE_WHITELIST to allow writes",
                scope,
                environment,
                policy.whitelist_display()
            )),
            None => PolicyDecision::Deny(format!(
                "scope identifier {} is not a valid course id; whitelist is {}",
                display_scope(raw_scope),
                policy.whitelist_display()
            )),
        },
    }
}

/// Accept JSON integers and numeric strings.
fn parse_scope(value: &Value) -> Option<ScopeId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn display_scope(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sandbox_policy() -> WritePolicy {
        WritePolicy::new([7299], false)
    }

    fn write_call(scope: Value) -> ToolCall {
        ToolCall::write("core_group_create_groups", "course_id").param("course_id", scope)
    }

    #[test]
    fn test_read_only_always_allowed() {
        let call = ToolCall::read("core_course_get_courses").param("course_id", 13043);
        assert_eq!(
            authorize(&call, Environment::Prod, &WritePolicy::new([], false)),
            PolicyDecision::Allow
        );
    }

    #[test]
    fn test_whitelisted_scope_allowed_in_dev() {
        let decision = authorize(&write_call(json!(7299)), Environment::Dev, &sandbox_policy());
        assert_eq!(decision, PolicyDecision::Allow);
    }

    #[test]
    fn test_numeric_string_scope_accepted() {
        let decision = authorize(&write_call(json!(" 7299 ")), Environment::Dev, &sandbox_policy());
        assert_eq!(decision, PolicyDecision::Allow);
    }

    #[test]
    fn test_other_scope_denied_in_dev_with_diagnostics() {
        let decision = authorize(&write_call(json!(13043)), Environment::Dev, &sandbox_policy());
        match decision {
            PolicyDecision::Deny(reason) => {
                assert!(reason.contains("13043"));
                assert!(reason.contains("[7299]"));
            }
            PolicyDecision::Allow => panic!("scope 13043 must be denied"),
        }
    }

    #[test]
    fn test_whitelisted_scope_denied_in_prod_when_flag_off() {
        let decision = authorize(&write_call(json!(7299)), Environment::Prod, &sandbox_policy());
        match decision {
            PolicyDecision::Deny(reason) => assert!(reason.contains("PRODUCTION")),
            PolicyDecision::Allow => panic!("prod writes are off"),
        }
    }

    #[test]
    fn test_prod_flag_allows_any_scope() {
        let policy = WritePolicy::new([7299], true);
        let decision = authorize(&write_call(json!(13043)), Environment::Prod, &policy);
        assert_eq!(decision, PolicyDecision::Allow);
    }

    #[test]
    fn test_missing_scope_denied_regardless_of_policy() {
        let call = ToolCall::write("core_group_create_groups", "course_id").param("name", "x");
        for (env, policy) in [
            (Environment::Dev, sandbox_policy()),
            (Environment::Prod, WritePolicy::new([], true)),
            (Environment::Dev, WritePolicy::new([1, 2, 3], true)),
        ] {
            match authorize(&call, env, &policy) {
                PolicyDecision::Deny(reason) => assert!(reason.starts_with(MISSING_SCOPE_REASON)),
                PolicyDecision::Allow => panic!("missing scope must never be allowed"),
            }
        }
    }

    #[test]
    fn test_mutating_without_scope_key_denied() {
        let mut call = write_call(json!(7299));
        call.scope_param_key = None;
        assert!(!authorize(&call, Environment::Dev, &sandbox_policy()).is_allowed());
    }

    #[test]
    fn test_non_numeric_scope_denied_in_dev() {
        let decision = authorize(&write_call(json!("abc")), Environment::Dev, &sandbox_policy());
        assert!(!decision.is_allowed());
    }
}
