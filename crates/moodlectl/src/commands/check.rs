use anyhow::Result;
use moodle_gateway::{Gateway, ResponseEncoding, ToolCall, ToolRequest};

const SITE_INFO_FUNCTION: &str = "core_webservice_get_site_info";

/// Print the active environment, then the backend's view of the token.
pub async fn execute(gateway: &Gateway, encoding: ResponseEncoding) -> Result<()> {
    let environment = gateway.environment();
    eprintln!(
        "Environment: {} ({})\nWrites: {}",
        environment.name,
        environment.base_url,
        if environment.writes_allowed {
            "allowed by policy"
        } else {
            "disabled"
        }
    );

    let request = ToolRequest::new(ToolCall::read(SITE_INFO_FUNCTION), "Site Information")
        .with_encoding(encoding);
    let response = gateway.invoke(&request).await;
    super::emit(&response)
}
