//! Call policy pipeline: layered authorization evaluated before dispatch.

pub mod layers;
pub mod write;

pub use layers::{AuditLogLayer, WriteScopeLayer};
pub use write::{authorize, ScopeId, WritePolicy};

use uuid::Uuid;

use crate::call::ToolCall;
use crate::environment::Environment;
use crate::error::GatewayError;

/// Result of a single policy layer evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Allow the call to proceed
    Allow,
    /// Deny the call with a reason
    Deny(String),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allow)
    }
}

/// Context passed to each policy layer for evaluation
pub struct PolicyContext<'a> {
    pub call: &'a ToolCall,
    pub environment: Environment,
    pub call_id: Uuid,
}

/// Individual policy layer.
/// Layers are pure: no I/O, no suspension.
pub trait PolicyLayer: Send + Sync {
    /// Layer name for logging and error messages
    fn name(&self) -> &str;

    /// Evaluate whether the call should proceed
    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyDecision;

    /// Whether this layer is active (disabled layers are skipped)
    fn enabled(&self) -> bool {
        true
    }
}

/// Pipeline that evaluates policy layers in order.
/// Short-circuits on first Deny.
pub struct PolicyPipeline {
    layers: Vec<Box<dyn PolicyLayer>>,
}

impl PolicyPipeline {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Standard gateway pipeline: audit every mutating attempt, then apply
    /// the write scope check.
    pub fn for_environment(environment: Environment, policy: WritePolicy) -> Self {
        Self::new()
            .add_layer(Box::new(AuditLogLayer::new()))
            .add_layer(Box::new(WriteScopeLayer::new(environment, policy)))
    }

    /// Add a policy layer to the pipeline
    pub fn add_layer(mut self, layer: Box<dyn PolicyLayer>) -> Self {
        self.layers.push(layer);
        self
    }

    /// Evaluate all enabled layers in order.
    /// A denial becomes a `WriteBlocked` error carrying the layer's reason.
    pub fn evaluate(&self, ctx: &PolicyContext<'_>) -> Result<(), GatewayError> {
        for layer in &self.layers {
            if !layer.enabled() {
                continue;
            }
            match layer.evaluate(ctx) {
                PolicyDecision::Allow => continue,
                PolicyDecision::Deny(reason) => {
                    tracing::warn!(
                        layer = layer.name(),
                        call_id = %ctx.call_id,
                        function = %ctx.call.function_name,
                        environment = ctx.environment.as_str(),
                        reason = %reason,
                        "Call denied by policy"
                    );
                    return Err(GatewayError::write_blocked(reason));
                }
            }
        }
        Ok(())
    }
}

impl Default for PolicyPipeline {
    fn default() -> Self {
        Self::new()
    }
}
