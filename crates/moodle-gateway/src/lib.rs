pub mod call;
pub mod config;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod fanout;
pub mod gateway;
pub mod pagination;
pub mod policy;
pub mod retry;
pub mod shaper;
pub mod tool;

pub use call::{ToolCall, UpstreamResult};
pub use config::{EndpointSettings, GatewayConfig, HttpSettings, ResponseSettings, WritePolicySettings};
pub use dispatcher::Dispatcher;
pub use environment::{Credential, Environment, EnvironmentConfig};
pub use error::{ConfigError, ErrorKind, GatewayError};
pub use fanout::{fan_out, ItemOutcome};
pub use gateway::{Gateway, PageRequest, ToolRequest};
pub use pagination::{PaginationRegistry, PaginationSpec, SliceRange};
pub use policy::{PolicyDecision, PolicyLayer, PolicyPipeline, ScopeId, WritePolicy};
pub use retry::RetryPolicy;
pub use shaper::{RenderedResponse, ResponseEncoding};
pub use tool::{ParamDefault, ParamSpec, Tool, ToolRegistry, ToolSpec};

/// Initialize structured JSON logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .json()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
