use async_trait::async_trait;
use moodle_gateway::{Gateway, RenderedResponse, RetryPolicy, Tool, ToolSpec, UpstreamResult};
use serde_json::Value;

use crate::input::{build_call, ToolOptions};

/// A tool that is fully described by its [`ToolSpec`]: one upstream call,
/// inputs mapped through the declared params.
pub struct DeclarativeTool {
    spec: ToolSpec,
    retry: RetryPolicy,
}

impl DeclarativeTool {
    pub fn new(spec: ToolSpec) -> Self {
        Self {
            spec,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Tool for DeclarativeTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, gateway: &Gateway, input: Value) -> RenderedResponse {
        let prepared = ToolOptions::parse(&input, self.spec.pagination)
            .and_then(|options| Ok((options, build_call(&self.spec, &input)?)));
        let (options, call) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                return gateway.render(
                    &UpstreamResult::Failure(err),
                    self.spec.title,
                    ToolOptions::encoding_hint(&input),
                )
            }
        };

        let call_ref = &call;
        let collection_key = self.spec.collection_key;
        let result = self
            .retry
            .run(call_ref, move || gateway.fetch(call_ref, options.page, collection_key))
            .await;

        gateway.render(&result.into(), self.spec.title, options.encoding)
    }
}
