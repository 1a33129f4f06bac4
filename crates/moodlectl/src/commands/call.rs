use anyhow::Result;
use moodle_gateway::{Gateway, ResponseEncoding, ToolCall, ToolRequest};
use moodle_tools::input::DEFAULT_LIMIT;
use serde_json::Value;
use tracing::info;

pub struct CallArgs {
    pub function: String,
    pub params: Vec<(String, Value)>,
    pub mutating: bool,
    pub scope_param: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub encoding: ResponseEncoding,
    pub title: Option<String>,
}

/// Run one raw function call through the full gateway path.
pub async fn execute(gateway: &Gateway, args: CallArgs) -> Result<()> {
    let mut call = ToolCall::read(args.function.clone());
    if args.mutating {
        call.is_mutating = true;
        call.scope_param_key = args.scope_param;
    }
    for (key, value) in args.params {
        call.set_path(&key, value);
    }

    info!(function = %call.function_name, mutating = call.is_mutating, "Running raw call");

    let title = args.title.unwrap_or(args.function);
    let mut request = ToolRequest::new(call, title).with_encoding(args.encoding);
    if args.offset.is_some() || args.limit.is_some() {
        request = request.with_page(args.offset.unwrap_or(0), args.limit.unwrap_or(DEFAULT_LIMIT));
    }

    let response = gateway.invoke(&request).await;
    super::emit(&response)
}
