use async_trait::async_trait;
use moodle_gateway::{
    ErrorKind, Gateway, GatewayError, ParamSpec, RenderedResponse, RetryPolicy, Tool, ToolCall,
    ToolSpec, UpstreamResult,
};
use serde_json::Value;
use tracing::debug;

use crate::input::ToolOptions;

pub const USER_COURSES: ToolSpec = ToolSpec {
    name: "moodle_get_user_courses",
    description: "Courses a user is enrolled in; defaults to the token owner. Supports offset/limit.",
    function: "core_enrol_get_users_courses",
    mutating: false,
    scope_param: None,
    title: "Enrolled Courses",
    pagination: true,
    collection_key: None,
    params: &[ParamSpec::optional("user_id", "userid", "User id; defaults to the token owner")],
};

const SITE_INFO_FUNCTION: &str = "core_webservice_get_site_info";

/// Lists a user's courses, resolving "the current user" through site info
/// when no id is given.
pub struct UserCoursesTool {
    retry: RetryPolicy,
}

impl UserCoursesTool {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    async fn current_user_id(&self, gateway: &Gateway) -> Result<i64, GatewayError> {
        let call = ToolCall::read(SITE_INFO_FUNCTION);
        let call_ref = &call;
        let info = self.retry.run(call_ref, move || gateway.call(call_ref)).await?;
        info.get("userid").and_then(Value::as_i64).ok_or_else(|| {
            GatewayError::new(
                ErrorKind::UpstreamUnknown,
                "site info response has no 'userid'",
            )
        })
    }

    async fn fetch(&self, gateway: &Gateway, input: &Value, options: ToolOptions) -> Result<Value, GatewayError> {
        let user_id = match input.get("user_id").filter(|v| !v.is_null()) {
            Some(id) => id.as_i64().ok_or_else(|| {
                GatewayError::invalid_parameter(format!("'user_id' must be an integer, got {id}"))
            })?,
            None => {
                let id = self.current_user_id(gateway).await?;
                debug!(user_id = id, "Resolved current user from site info");
                id
            }
        };

        let call = ToolCall::read(USER_COURSES.function).param("userid", user_id);
        let call_ref = &call;
        self.retry
            .run(call_ref, move || gateway.fetch(call_ref, options.page, None))
            .await
    }
}

impl Default for UserCoursesTool {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[async_trait]
impl Tool for UserCoursesTool {
    fn spec(&self) -> &ToolSpec {
        &USER_COURSES
    }

    async fn execute(&self, gateway: &Gateway, input: Value) -> RenderedResponse {
        let options = match ToolOptions::parse(&input, true) {
            Ok(options) => options,
            Err(err) => {
                return gateway.render(
                    &UpstreamResult::Failure(err),
                    USER_COURSES.title,
                    ToolOptions::encoding_hint(&input),
                )
            }
        };

        let result = self.fetch(gateway, &input, options).await;
        gateway.render(&result.into(), USER_COURSES.title, options.encoding)
    }
}
