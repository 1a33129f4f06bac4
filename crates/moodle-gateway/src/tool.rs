use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::gateway::Gateway;
use crate::shaper::RenderedResponse;

/// Value used when an optional input is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamDefault {
    Int(i64),
    Text(&'static str),
}

impl ParamDefault {
    pub fn to_value(self) -> Value {
        match self {
            ParamDefault::Int(n) => Value::from(n),
            ParamDefault::Text(s) => Value::from(s),
        }
    }
}

/// One agent-facing input field and where it lands in the upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    /// Key in the tool input map
    pub name: &'static str,
    /// Upstream parameter path; dotted segments address nested params
    pub path: &'static str,
    pub required: bool,
    pub default: Option<ParamDefault>,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn required(name: &'static str, path: &'static str, description: &'static str) -> Self {
        Self {
            name,
            path,
            required: true,
            default: None,
            description,
        }
    }

    pub const fn optional(name: &'static str, path: &'static str, description: &'static str) -> Self {
        Self {
            name,
            path,
            required: false,
            default: None,
            description,
        }
    }

    pub const fn with_default(mut self, default: ParamDefault) -> Self {
        self.default = Some(default);
        self
    }
}

/// Declarative description of a catalog tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Upstream function the tool calls
    pub function: &'static str,
    pub mutating: bool,
    /// Parameter path holding the scope id, required for mutating tools
    pub scope_param: Option<&'static str>,
    /// Heading of the readable rendering
    pub title: &'static str,
    /// Whether the tool honours `offset`/`limit` input
    pub pagination: bool,
    /// Collection to slice when the payload is an object
    pub collection_key: Option<&'static str>,
    pub params: &'static [ParamSpec],
}

/// Async Tool trait
/// Note: Uses async_trait for trait object compatibility with DashMap storage
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    /// Tool name for registration
    fn name(&self) -> &str {
        self.spec().name
    }

    /// Run the tool. Failures are rendered into the response, never raised.
    async fn execute(&self, gateway: &Gateway, input: Value) -> RenderedResponse;
}

/// Name → tool map shared by every caller.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            bail!("Tool '{}' already registered", name);
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|entry| entry.value().clone())
    }

    /// Specs of every registered tool, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.iter().map(|entry| *entry.value().spec()).collect();
        specs.sort_by_key(|spec| spec.name);
        specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up `name` and run it. Only an unknown name is an error.
    pub async fn invoke(&self, gateway: &Gateway, name: &str, input: Value) -> Result<RenderedResponse> {
        let tool = self
            .get(name)
            .with_context(|| format!("Tool '{}' not registered", name))?;

        info!(tool = name, "Executing tool");
        let response = tool.execute(gateway, input).await;
        info!(tool = name, truncated = response.truncated, "Tool completed");
        Ok(response)
    }
}
