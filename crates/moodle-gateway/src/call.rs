//! Per-invocation call description and the raw outcome of dispatching it.

use serde_json::{Map, Value};

use crate::error::GatewayError;

/// One upstream function call as presented to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub function_name: String,
    pub parameters: Map<String, Value>,
    pub is_mutating: bool,
    /// Parameter carrying the scope (course) id for the write gate.
    /// Dotted paths address nested values, e.g. `groups.0.courseid`.
    pub scope_param_key: Option<String>,
}

impl ToolCall {
    /// Read-only call. Never inspected by the write gate.
    pub fn read(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            parameters: Map::new(),
            is_mutating: false,
            scope_param_key: None,
        }
    }

    /// Mutating call whose scope lives under `scope_param_key`.
    ///
    /// Once the request has been sent the backend may apply it even if the
    /// caller drops the future; cancellation is not observable client side.
    pub fn write(function_name: impl Into<String>, scope_param_key: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            parameters: Map::new(),
            is_mutating: true,
            scope_param_key: Some(scope_param_key.into()),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Set a value at a dotted path, creating objects and arrays on the way.
    pub fn set_path(&mut self, path: &str, value: Value) {
        insert_path(&mut self.parameters, path, value);
    }

    /// Value of the scope parameter, if the call names one and carries it.
    pub fn scope_value(&self) -> Option<&Value> {
        let key = self.scope_param_key.as_deref()?;
        lookup_path(&self.parameters, key)
    }
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamResult {
    Success { payload: Value },
    Failure(GatewayError),
}

impl UpstreamResult {
    pub fn is_success(&self) -> bool {
        matches!(self, UpstreamResult::Success { .. })
    }

    pub fn into_result(self) -> Result<Value, GatewayError> {
        match self {
            UpstreamResult::Success { payload } => Ok(payload),
            UpstreamResult::Failure(err) => Err(err),
        }
    }
}

impl From<Result<Value, GatewayError>> for UpstreamResult {
    fn from(result: Result<Value, GatewayError>) -> Self {
        match result {
            Ok(payload) => UpstreamResult::Success { payload },
            Err(err) => UpstreamResult::Failure(err),
        }
    }
}

/// Look up a dotted path. Plain keys are tried verbatim first so that
/// pre-flattened names like `courseids[0]` keep working.
pub fn lookup_path<'a>(params: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(value) = params.get(path) {
        return Some(value);
    }
    let mut segments = path.split('.');
    let mut current = params.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Insert `value` at a dotted path. Numeric segments index into arrays,
/// padding with nulls as needed.
pub fn insert_path(params: &mut Map<String, Value>, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return,
    };
    if rest.is_empty() {
        params.insert((*first).to_string(), value);
        return;
    }
    let slot = params
        .entry((*first).to_string())
        .or_insert_with(|| empty_container_for(rest[0]));
    insert_into(slot, rest, value);
}

fn insert_into(slot: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *slot = value;
        return;
    };

    if let Ok(index) = head.parse::<usize>() {
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            if !rest.is_empty() && items[index].is_null() {
                items[index] = empty_container_for(rest[0]);
            }
            insert_into(&mut items[index], rest, value);
        }
    } else {
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(map) = slot {
            let child = map
                .entry((*head).to_string())
                .or_insert_with(|| match rest.first() {
                    Some(next) => empty_container_for(next),
                    None => Value::Null,
                });
            insert_into(child, rest, value);
        }
    }
}

fn empty_container_for(segment: &str) -> Value {
    if segment.parse::<usize>().is_ok() {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_nested_path() {
        let mut call = ToolCall::write("core_group_create_groups", "groups.0.courseid");
        call.set_path("groups.0.courseid", json!(7299));
        call.set_path("groups.0.name", json!("Team A"));

        assert_eq!(
            Value::Object(call.parameters.clone()),
            json!({"groups": [{"courseid": 7299, "name": "Team A"}]})
        );
        assert_eq!(call.scope_value(), Some(&json!(7299)));
    }

    #[test]
    fn test_lookup_prefers_literal_key() {
        let call = ToolCall::read("mod_assign_get_assignments").param("courseids[0]", 12);
        assert_eq!(lookup_path(&call.parameters, "courseids[0]"), Some(&json!(12)));
    }

    #[test]
    fn test_scope_value_absent() {
        let call = ToolCall::write("core_group_create_groups", "course_id").param("name", "x");
        assert!(call.scope_value().is_none());
        assert!(ToolCall::read("core_webservice_get_site_info")
            .scope_value()
            .is_none());
    }
}
