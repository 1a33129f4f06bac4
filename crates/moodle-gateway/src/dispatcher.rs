//! Moodle REST dispatcher.
//!
//! One POST per call to `{base}/webservice/rest/server.php` with the token,
//! function name and flattened parameters as form fields. Failures are
//! classified into [`ErrorKind`]s; nothing is retried here.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, StatusCode, Url};
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::call::{ToolCall, UpstreamResult};
use crate::config::HttpSettings;
use crate::environment::{Credential, EnvironmentConfig};
use crate::error::{ConfigError, ErrorKind, GatewayError};

pub const REST_PATH: &str = "webservice/rest/server.php";
pub const REST_FORMAT: &str = "json";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes single upstream calls over a shared connection pool.
pub struct Dispatcher {
    client: Client,
    endpoint: Url,
    credential: Credential,
    timeout: Duration,
    /// Bounds concurrently in-flight requests across all callers
    in_flight: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(environment: &EnvironmentConfig, http: &HttpSettings) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(http.timeout_secs.max(1));
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .pool_max_idle_per_host(http.max_keepalive_connections)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: rest_endpoint(&environment.base_url)?,
            credential: environment.credential.clone(),
            timeout,
            in_flight: Arc::new(Semaphore::new(http.max_connections.max(1))),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Run exactly one attempt of `call`.
    ///
    /// The whole call, including the wait for a pool slot, is bounded by the
    /// configured timeout; expiry is reported as a network error.
    pub async fn execute(&self, call: &ToolCall) -> UpstreamResult {
        let result = match tokio::time::timeout(self.timeout, self.send(call)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::network(format!(
                "request to '{}' timed out after {}s",
                call.function_name,
                self.timeout.as_secs()
            ))),
        };
        result.into()
    }

    async fn send(&self, call: &ToolCall) -> Result<Value, GatewayError> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|_| GatewayError::network("connection pool is closed"))?;

        debug!(
            function = %call.function_name,
            params = call.parameters.len(),
            "Dispatching upstream call"
        );

        let form = self.build_form(call);
        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| classify_transport(&call.function_name, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(&call.function_name, e))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let payload: Value = serde_json::from_str(&body).map_err(|e| {
            GatewayError::new(
                ErrorKind::UpstreamUnknown,
                format!("invalid JSON response from '{}': {}", call.function_name, e),
            )
            .with_debug_info(excerpt(&body))
        })?;

        match classify_envelope(&payload) {
            Some(err) => Err(err),
            None => Ok(payload),
        }
    }

    fn build_form(&self, call: &ToolCall) -> Vec<(String, String)> {
        let mut form = vec![
            ("wstoken".to_string(), self.credential.expose().to_string()),
            ("wsfunction".to_string(), call.function_name.clone()),
            ("moodlewsrestformat".to_string(), REST_FORMAT.to_string()),
        ];
        form.extend(flatten_params(&call.parameters));
        form
    }
}

fn rest_endpoint(base_url: &Url) -> Result<Url, ConfigError> {
    let base = base_url.as_str().trim_end_matches('/');
    Url::parse(&format!("{base}/{REST_PATH}")).map_err(|e| ConfigError::InvalidValue {
        key: "url".to_string(),
        message: e.to_string(),
    })
}

/// Flatten nested parameters into Moodle's bracket notation:
/// `{"users": [{"id": 1}]}` becomes `users[0][id]=1`.
pub fn flatten_params(params: &Map<String, Value>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (key, value) in params {
        flatten_into(key.clone(), value, &mut out);
    }
    out
}

fn flatten_into(key: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (child, v) in map {
                flatten_into(format!("{key}[{child}]"), v, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_into(format!("{key}[{i}]"), v, out);
            }
        }
        Value::Bool(b) => out.push((key, if *b { "1" } else { "0" }.to_string())),
        Value::Null => out.push((key, String::new())),
        Value::Number(n) => out.push((key, n.to_string())),
        Value::String(s) => out.push((key, s.clone())),
    }
}

/// Recognize Moodle's error envelope `{exception, errorcode, message, debuginfo}`.
pub fn classify_envelope(payload: &Value) -> Option<GatewayError> {
    let obj = payload.as_object()?;
    if !obj.contains_key("exception") && !obj.contains_key("errorcode") {
        return None;
    }

    let field = |name: &str| obj.get(name).and_then(Value::as_str).unwrap_or_default();
    let exception = field("exception");
    let errorcode = field("errorcode");
    let message = match field("message") {
        "" => "unknown error",
        m => m,
    };
    let debuginfo = field("debuginfo");

    let kind = classify_code(exception, errorcode);
    let message = match kind {
        ErrorKind::UpstreamUnknown => format!("{message} (errorcode: {errorcode}, exception: {exception})"),
        _ => message.to_string(),
    };

    Some(GatewayError::new(kind, message).with_debug_info(debuginfo))
}

fn classify_code(exception: &str, errorcode: &str) -> ErrorKind {
    let code = errorcode.to_ascii_lowercase();
    let exception = exception.to_ascii_lowercase();

    if code.contains("invalidtoken") || code.contains("tokenexpired") || code.contains("expiredtoken") {
        ErrorKind::AuthError
    } else if code == "accessexception"
        || code.contains("nopermission")
        || code.contains("requireloginerror")
        || exception.ends_with("webservice_access_exception")
        || exception.ends_with("required_capability_exception")
        || exception.ends_with("require_login_exception")
    {
        ErrorKind::PermissionDenied
    } else if code.contains("invalidparameter")
        || exception.ends_with("invalid_parameter_exception")
    {
        ErrorKind::InvalidParameter
    } else {
        ErrorKind::UpstreamUnknown
    }
}

fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    if let Ok(payload) = serde_json::from_str::<Value>(body) {
        if let Some(err) = classify_envelope(&payload) {
            return err;
        }
    }

    let kind = match status {
        StatusCode::UNAUTHORIZED => ErrorKind::AuthError,
        StatusCode::FORBIDDEN => ErrorKind::PermissionDenied,
        StatusCode::BAD_REQUEST => ErrorKind::InvalidParameter,
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => ErrorKind::NetworkError,
        _ => ErrorKind::UpstreamUnknown,
    };
    GatewayError::new(kind, format!("HTTP {status}")).with_debug_info(excerpt(body))
}

fn classify_transport(function: &str, err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::network(format!("request to '{function}' timed out"))
    } else if err.is_connect() || err.is_request() {
        GatewayError::network(format!("connection failed for '{function}': {err}"))
    } else if err.is_decode() || err.is_body() {
        GatewayError::new(
            ErrorKind::UpstreamUnknown,
            format!("unreadable response for '{function}': {err}"),
        )
    } else {
        GatewayError::network(format!("request for '{function}' failed: {err}"))
    }
}

/// Keep raw bodies bounded when attached as debug info.
fn excerpt(body: &str) -> String {
    const MAX: usize = 2_000;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_params() {
        let params = json!({
            "courseid": 7299,
            "groups": [{"courseid": 7299, "name": "A"}],
            "options": {"visible": true},
            "values": [3, 4]
        });
        let flat = flatten_params(params.as_object().unwrap());
        assert_eq!(
            flat,
            vec![
                ("courseid".to_string(), "7299".to_string()),
                ("groups[0][courseid]".to_string(), "7299".to_string()),
                ("groups[0][name]".to_string(), "A".to_string()),
                ("options[visible]".to_string(), "1".to_string()),
                ("values[0]".to_string(), "3".to_string()),
                ("values[1]".to_string(), "4".to_string()),
            ]
        );
    }

    #[test]
    fn test_envelope_access_exception_is_permission_denied() {
        let err = classify_envelope(&json!({
            "exception": "webservice_access_exception",
            "errorcode": "accessexception",
            "message": "Access control exception",
            "debuginfo": "Access to the function core_x() is not allowed."
        }))
        .unwrap();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
        assert_eq!(
            err.debug_info.as_deref(),
            Some("Access to the function core_x() is not allowed.")
        );
    }

    #[test]
    fn test_envelope_invalid_token_is_auth() {
        let err = classify_envelope(&json!({
            "exception": "moodle_exception",
            "errorcode": "invalidtoken",
            "message": "Invalid token - token not found"
        }))
        .unwrap();
        assert_eq!(err.kind, ErrorKind::AuthError);
        assert!(err.debug_info.is_none());
    }

    #[test]
    fn test_envelope_invalid_parameter() {
        let err = classify_envelope(&json!({
            "exception": "invalid_parameter_exception",
            "errorcode": "invalidparameter",
            "message": "Invalid parameter value detected",
            "debuginfo": "Unexpected keys (limitfrom) detected in parameter array."
        }))
        .unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_envelope_unknown_is_verbatim() {
        let err = classify_envelope(&json!({
            "exception": "dml_missing_record_exception",
            "errorcode": "invalidrecord",
            "message": "Can't find data record in database table course."
        }))
        .unwrap();
        assert_eq!(err.kind, ErrorKind::UpstreamUnknown);
        assert!(err.message.contains("invalidrecord"));
        assert!(err.message.contains("Can't find data record"));
    }

    #[test]
    fn test_regular_payload_is_not_an_envelope() {
        assert!(classify_envelope(&json!({"courses": [], "warnings": []})).is_none());
        assert!(classify_envelope(&json!([{"id": 1}])).is_none());
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED, "").kind, ErrorKind::AuthError);
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, "down").kind,
            ErrorKind::NetworkError
        );
        assert_eq!(
            classify_status(StatusCode::IM_A_TEAPOT, "odd").kind,
            ErrorKind::UpstreamUnknown
        );
    }

    #[test]
    fn test_rest_endpoint_handles_subpath() {
        let base = Url::parse("https://moodle.example.edu/lms/").unwrap();
        assert_eq!(
            rest_endpoint(&base).unwrap().as_str(),
            "https://moodle.example.edu/lms/webservice/rest/server.php"
        );
    }
}
