//! Common tool inputs: `format`, `offset`, `limit`, plus mapping declared
//! params onto an upstream call.

use moodle_gateway::{GatewayError, PageRequest, ResponseEncoding, ToolCall, ToolSpec};
use serde_json::{Map, Value};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

/// Presentation and paging options shared by every tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolOptions {
    pub encoding: ResponseEncoding,
    pub page: Option<PageRequest>,
}

impl ToolOptions {
    pub fn parse(input: &Value, paginated: bool) -> Result<Self, GatewayError> {
        check_shape(input)?;

        let encoding = match input.get("format") {
            None | Some(Value::Null) => ResponseEncoding::default(),
            Some(Value::String(s)) => s.parse().map_err(GatewayError::invalid_parameter)?,
            Some(other) => {
                return Err(GatewayError::invalid_parameter(format!(
                    "'format' must be a string, got {other}"
                )))
            }
        };

        let page = if paginated {
            let offset = read_count(input, "offset")?.unwrap_or(0);
            let limit = read_count(input, "limit")?
                .unwrap_or(DEFAULT_LIMIT)
                .clamp(1, MAX_LIMIT);
            Some(PageRequest { offset, limit })
        } else {
            None
        };

        Ok(Self { encoding, page })
    }

    /// Encoding to use for reporting an input error: the requested one when
    /// it parses, otherwise readable.
    pub fn encoding_hint(input: &Value) -> ResponseEncoding {
        input
            .get("format")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

/// Build the upstream call for `spec` from the agent's input map.
pub fn build_call(spec: &ToolSpec, input: &Value) -> Result<ToolCall, GatewayError> {
    check_shape(input)?;
    let mut call = ToolCall {
        function_name: spec.function.to_string(),
        parameters: Map::new(),
        is_mutating: spec.mutating,
        scope_param_key: spec.scope_param.map(str::to_string),
    };

    for param in spec.params {
        let value = input
            .get(param.name)
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| param.default.map(|d| d.to_value()));

        match value {
            Some(value) => call.set_path(param.path, value),
            None if param.required => {
                return Err(GatewayError::invalid_parameter(format!(
                    "missing required input '{}' for tool '{}'",
                    param.name, spec.name
                )))
            }
            None => {}
        }
    }

    Ok(call)
}

/// Tool input is an object; a missing input (null) counts as empty.
fn check_shape(input: &Value) -> Result<(), GatewayError> {
    match input {
        Value::Object(_) | Value::Null => Ok(()),
        other => Err(GatewayError::invalid_parameter(format!(
            "tool input must be an object, got {other}"
        ))),
    }
}

fn read_count(input: &Value, key: &str) -> Result<Option<usize>, GatewayError> {
    match input.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| {
                GatewayError::invalid_parameter(format!(
                    "'{key}' must be a non-negative integer, got {value}"
                ))
            }),
    }
}
