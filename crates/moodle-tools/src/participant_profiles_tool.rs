use async_trait::async_trait;
use moodle_gateway::shaper::describe_failure;
use moodle_gateway::{
    fan_out, Gateway, GatewayError, ItemOutcome, ParamSpec, RenderedResponse, RetryPolicy, Tool,
    ToolCall, ToolSpec, UpstreamResult,
};
use serde_json::{json, Value};
use tracing::info;

use crate::input::{build_call, ToolOptions};

pub const COURSE_PARTICIPANTS_PROFILES: ToolSpec = ToolSpec {
    name: "moodle_get_course_participants_profiles",
    description: "Full profiles for a page of course participants, looked up concurrently. \
                  Supports offset/limit.",
    function: "core_enrol_get_enrolled_users",
    mutating: false,
    scope_param: None,
    title: "Participant Profiles",
    pagination: true,
    collection_key: None,
    params: &[ParamSpec::required("course_id", "courseid", "Course id")],
};

const PROFILE_FUNCTION: &str = "core_user_get_users_by_field";
const DEFAULT_CONCURRENCY: usize = 5;

/// Pages the participant list, then fetches each profile in parallel.
/// A failed lookup is reported against its user id; the rest still succeed.
pub struct ParticipantProfilesTool {
    retry: RetryPolicy,
    concurrency: usize,
}

impl ParticipantProfilesTool {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn fetch(&self, gateway: &Gateway, input: &Value, options: ToolOptions) -> Result<Value, GatewayError> {
        let list_call = build_call(&COURSE_PARTICIPANTS_PROFILES, input)?;
        let list_ref = &list_call;
        let participants = self
            .retry
            .run(list_ref, move || gateway.fetch(list_ref, options.page, None))
            .await?;

        let user_ids: Vec<i64> = participants
            .as_array()
            .map(|users| users.iter().filter_map(|u| u.get("id").and_then(Value::as_i64)).collect())
            .unwrap_or_default();

        let retry = self.retry;
        let outcomes = fan_out(user_ids, self.concurrency, move |user_id| async move {
            let call = ToolCall::read(PROFILE_FUNCTION)
                .param("field", "id")
                .param("values", json!([user_id]));
            let call_ref = &call;
            retry.run(call_ref, move || gateway.call(call_ref)).await
        })
        .await;

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            course_id = ?list_call.parameters.get("courseid"),
            profiles = outcomes.len(),
            failed,
            "Fetched participant profiles"
        );

        Ok(json!({
            "course_id": list_call.parameters.get("courseid"),
            "profiles_requested": outcomes.len(),
            "profiles_failed": failed,
            "participants": outcomes.iter().map(profile_entry).collect::<Vec<_>>(),
        }))
    }
}

impl Default for ParticipantProfilesTool {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

fn profile_entry(outcome: &ItemOutcome<i64, Value>) -> Value {
    match &outcome.result {
        Ok(Value::Array(users)) if !users.is_empty() => json!({
            "id": outcome.item,
            "profile": users[0],
        }),
        Ok(_) => json!({
            "id": outcome.item,
            "error": "no profile returned",
        }),
        Err(err) => json!({
            "id": outcome.item,
            "error": describe_failure(err),
        }),
    }
}

#[async_trait]
impl Tool for ParticipantProfilesTool {
    fn spec(&self) -> &ToolSpec {
        &COURSE_PARTICIPANTS_PROFILES
    }

    async fn execute(&self, gateway: &Gateway, input: Value) -> RenderedResponse {
        let title = COURSE_PARTICIPANTS_PROFILES.title;
        let options = match ToolOptions::parse(&input, true) {
            Ok(options) => options,
            Err(err) => {
                return gateway.render(
                    &UpstreamResult::Failure(err),
                    title,
                    ToolOptions::encoding_hint(&input),
                )
            }
        };

        let result = self.fetch(gateway, &input, options).await;
        gateway.render(&result.into(), title, options.encoding)
    }
}
