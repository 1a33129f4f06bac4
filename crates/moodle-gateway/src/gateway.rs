//! The request path shared by every tool: authorize, paginate, dispatch,
//! slice, render.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::call::{ToolCall, UpstreamResult};
use crate::config::GatewayConfig;
use crate::dispatcher::Dispatcher;
use crate::environment::{self, EnvironmentConfig};
use crate::error::{ConfigError, GatewayError};
use crate::pagination::{apply_slice, PaginationRegistry};
use crate::policy::{PolicyContext, PolicyPipeline};
use crate::shaper::{self, RenderedResponse, ResponseEncoding};

/// Agent-supplied window over a collection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

/// One tool invocation: the upstream call plus how to present it.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub call: ToolCall,
    pub title: String,
    pub encoding: ResponseEncoding,
    pub page: Option<PageRequest>,
    pub collection_key: Option<String>,
}

impl ToolRequest {
    pub fn new(call: ToolCall, title: impl Into<String>) -> Self {
        Self {
            call,
            title: title.into(),
            encoding: ResponseEncoding::default(),
            page: None,
            collection_key: None,
        }
    }

    pub fn with_encoding(mut self, encoding: ResponseEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.page = Some(PageRequest { offset, limit });
        self
    }

    pub fn with_collection_key(mut self, key: impl Into<String>) -> Self {
        self.collection_key = Some(key.into());
        self
    }
}

/// Process-wide gateway. Configuration is fixed at construction; calls may
/// run concurrently through a shared reference.
pub struct Gateway {
    environment: Arc<EnvironmentConfig>,
    policy: PolicyPipeline,
    pagination: PaginationRegistry,
    dispatcher: Dispatcher,
    max_response_bytes: usize,
}

impl Gateway {
    /// Resolve the active environment and build the HTTP pool.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let environment = environment::resolve(config.env.as_deref(), config)?;

        if environment.name.is_production() {
            warn!(
                url = %environment.base_url,
                writes_allowed = environment.writes_allowed,
                "Gateway bound to PRODUCTION environment"
            );
        } else {
            info!(
                url = %environment.base_url,
                writes_allowed = environment.writes_allowed,
                whitelist = ?config.write_policy.dev_course_whitelist,
                "Gateway bound to development environment"
            );
        }

        let dispatcher = Dispatcher::new(&environment, &config.http)?;
        let policy = PolicyPipeline::for_environment(environment.name, config.write_policy());

        Ok(Self {
            environment: Arc::new(environment),
            policy,
            pagination: PaginationRegistry::moodle_defaults(),
            dispatcher,
            max_response_bytes: config.response.max_response_bytes,
        })
    }

    pub fn with_pagination(mut self, pagination: PaginationRegistry) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn environment(&self) -> &EnvironmentConfig {
        &self.environment
    }

    pub fn max_response_bytes(&self) -> usize {
        self.max_response_bytes
    }

    /// Single call, no pagination.
    pub async fn call(&self, call: &ToolCall) -> Result<Value, GatewayError> {
        self.fetch(call, None, None).await
    }

    /// Authorize, page and dispatch `call`, returning the (sliced) payload.
    ///
    /// A denied call never reaches the network.
    pub async fn fetch(
        &self,
        call: &ToolCall,
        page: Option<PageRequest>,
        collection_key: Option<&str>,
    ) -> Result<Value, GatewayError> {
        let call_id = Uuid::new_v4();
        let ctx = PolicyContext {
            call,
            environment: self.environment.name,
            call_id,
        };
        self.policy.evaluate(&ctx)?;

        let (outgoing, slice) = match page {
            Some(PageRequest { offset, limit }) => {
                let prepared =
                    self.pagination
                        .prepare(&call.function_name, call.parameters.clone(), offset, limit);
                let outgoing = ToolCall {
                    parameters: prepared.parameters,
                    ..call.clone()
                };
                (outgoing, prepared.local_slice)
            }
            None => (call.clone(), None),
        };

        let result = self.dispatcher.execute(&outgoing).await;
        match &result {
            UpstreamResult::Success { .. } => info!(
                call_id = %call_id,
                function = %call.function_name,
                mutating = call.is_mutating,
                environment = self.environment.name.as_str(),
                "Upstream call succeeded"
            ),
            UpstreamResult::Failure(err) => warn!(
                call_id = %call_id,
                function = %call.function_name,
                mutating = call.is_mutating,
                environment = self.environment.name.as_str(),
                kind = %err.kind,
                "Upstream call failed"
            ),
        }

        let payload = result.into_result()?;
        Ok(match slice {
            Some(range) => apply_slice(payload, range, collection_key),
            None => payload,
        })
    }

    /// Full request path ending in a rendered response.
    pub async fn invoke(&self, request: &ToolRequest) -> RenderedResponse {
        let result: UpstreamResult = self
            .fetch(&request.call, request.page, request.collection_key.as_deref())
            .await
            .into();
        self.render(&result, &request.title, request.encoding)
    }

    /// Render under this gateway's response bound.
    pub fn render(&self, result: &UpstreamResult, title: &str, encoding: ResponseEncoding) -> RenderedResponse {
        shaper::render(result, title, encoding, self.max_response_bytes)
    }
}
