use std::time::{Duration, Instant};

use moodle_gateway::{
    EndpointSettings, ErrorKind, Gateway, GatewayConfig, HttpSettings, ResponseEncoding,
    ResponseSettings, ToolCall, ToolRequest,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

const REST: &str = "/webservice/rest/server.php";

/// Matches requests whose form body lacks `key=`.
struct WithoutField(&'static str);

impl Match for WithoutField {
    fn matches(&self, request: &Request) -> bool {
        let body = String::from_utf8_lossy(&request.body);
        !body.split('&').any(|pair| pair.starts_with(&format!("{}=", self.0)))
    }
}

fn dev_config(server: &MockServer) -> GatewayConfig {
    GatewayConfig {
        dev: EndpointSettings {
            url: Some(server.uri()),
            token: Some("test-token".into()),
        },
        ..GatewayConfig::default()
    }
}

fn gateway(server: &MockServer) -> Gateway {
    Gateway::from_config(&dev_config(server)).unwrap()
}

fn participants(n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|i| json!({"id": i, "fullname": format!("Student {i}"), "email": format!("s{i}@example.edu")}))
            .collect(),
    )
}

#[tokio::test]
async fn test_read_call_sends_token_and_function() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REST))
        .and(body_string_contains("wstoken=test-token"))
        .and(body_string_contains("wsfunction=core_webservice_get_site_info"))
        .and(body_string_contains("moodlewsrestformat=json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sitename": "Sandbox",
            "userid": 42,
            "release": "4.3"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let response = gateway
        .invoke(&ToolRequest::new(
            ToolCall::read("core_webservice_get_site_info"),
            "Site info",
        ))
        .await;

    assert!(!response.truncated);
    assert!(response.body.starts_with("# Site info\n\n"));
    assert!(response.body.contains("- sitename: Sandbox"));
    assert!(response.body.contains("- userid: 42"));
}

#[tokio::test]
async fn test_access_exception_keeps_debug_info() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REST))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exception": "webservice_access_exception",
            "errorcode": "accessexception",
            "message": "Access control exception",
            "debuginfo": "Access to the function core_group_get_course_groups() is not allowed. There could be multiple reasons for this."
        })))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let call = ToolCall::read("core_group_get_course_groups").param("courseid", 7299);

    let err = gateway.call(&call).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::PermissionDenied);

    let response = gateway.invoke(&ToolRequest::new(call, "Groups")).await;
    assert!(response.body.contains(
        "Debug info: Access to the function core_group_get_course_groups() is not allowed. There could be multiple reasons for this."
    ));
    assert!(!response.body.to_lowercase().contains("insufficient permission"));
}

#[tokio::test]
async fn test_write_outside_whitelist_never_reaches_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REST))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let call = ToolCall::write("core_group_create_groups", "groups.0.courseid")
        .param("groups", json!([{"courseid": 13043, "name": "Blocked"}]));

    let err = gateway.call(&call).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::WriteBlocked);
    assert!(err.message.contains("13043"));
    assert!(err.message.contains("[7299]"));
}

#[tokio::test]
async fn test_whitelisted_write_is_dispatched_with_bracket_params() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REST))
        .and(body_string_contains("wsfunction=core_group_create_groups"))
        .and(body_string_contains("groups%5B0%5D%5Bcourseid%5D=7299"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 501, "courseid": 7299}])))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let call = ToolCall::write("core_group_create_groups", "groups.0.courseid")
        .param("groups", json!([{"courseid": 7299, "name": "Team A"}]));

    let payload = gateway.call(&call).await.unwrap();
    assert_eq!(payload[0]["id"], json!(501));
}

#[tokio::test]
async fn test_prod_write_blocked_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REST))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let config = GatewayConfig {
        env: Some("PROD".into()),
        prod: EndpointSettings {
            url: Some(server.uri()),
            token: Some("prod-token".into()),
        },
        ..GatewayConfig::default()
    };
    let gateway = Gateway::from_config(&config).unwrap();
    assert!(gateway.environment().name.is_production());

    let call = ToolCall::write("core_group_create_groups", "courseid").param("courseid", 7299);
    let err = gateway.call(&call).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::WriteBlocked);
}

#[tokio::test]
async fn test_client_side_window_is_sliced_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REST))
        .and(body_string_contains("wsfunction=core_enrol_get_enrolled_users"))
        .and(WithoutField("limitfrom"))
        .and(WithoutField("limitnum"))
        .and(WithoutField("page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(participants(12)))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let call = ToolCall::read("core_enrol_get_enrolled_users").param("courseid", 7299);
    let payload = gateway.fetch(&call, Some(moodle_gateway::PageRequest { offset: 5, limit: 5 }), None).await.unwrap();

    let ids: Vec<i64> = payload
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![5, 6, 7, 8, 9]);
}

#[tokio::test]
async fn test_native_offset_params_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REST))
        .and(body_string_contains("wsfunction=core_message_get_conversations"))
        .and(body_string_contains("limitfrom=20"))
        .and(body_string_contains("limitnum=10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversations": [{"id": 1}, {"id": 2}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let request = ToolRequest::new(
        ToolCall::read("core_message_get_conversations").param("userid", 42),
        "Conversations",
    )
    .with_encoding(ResponseEncoding::Structured)
    .with_page(20, 10);

    let response = gateway.invoke(&request).await;
    let parsed: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(parsed["conversations"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_service_unavailable_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REST))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .call(&ToolCall::read("core_webservice_get_site_info"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkError);
}

#[tokio::test]
async fn test_non_json_body_is_upstream_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REST))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .call(&ToolCall::read("core_webservice_get_site_info"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UpstreamUnknown);
    assert_eq!(err.debug_info.as_deref(), Some("<html>login</html>"));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let config = GatewayConfig {
        dev: EndpointSettings {
            url: Some("http://127.0.0.1:1".into()),
            token: Some("test-token".into()),
        },
        ..GatewayConfig::default()
    };
    let gateway = Gateway::from_config(&config).unwrap();
    let err = gateway
        .call(&ToolCall::read("core_webservice_get_site_info"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkError);
}

#[tokio::test]
async fn test_slow_backend_times_out_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REST))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"sitename": "Sandbox"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = GatewayConfig {
        http: HttpSettings {
            timeout_secs: 1,
            ..HttpSettings::default()
        },
        ..dev_config(&server)
    };
    let gateway = Gateway::from_config(&config).unwrap();

    let started = Instant::now();
    let err = gateway
        .call(&ToolCall::read("core_webservice_get_site_info"))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.kind, ErrorKind::NetworkError);
    assert!(err.message.contains("timed out"), "{}", err.message);
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(2_500), "{elapsed:?}");
}

#[tokio::test]
async fn test_large_response_bounded_and_deterministic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REST))
        .respond_with(ResponseTemplate::new(200).set_body_json(participants(400)))
        .mount(&server)
        .await;

    let config = GatewayConfig {
        response: ResponseSettings {
            max_response_bytes: 2_000,
        },
        ..dev_config(&server)
    };
    let gateway = Gateway::from_config(&config).unwrap();

    for encoding in [ResponseEncoding::Readable, ResponseEncoding::Structured] {
        let request = ToolRequest::new(
            ToolCall::read("core_enrol_get_enrolled_users").param("courseid", 7299),
            "Participants",
        )
        .with_encoding(encoding);

        let first = gateway.invoke(&request).await;
        let second = gateway.invoke(&request).await;
        assert!(first.truncated);
        assert!(first.body.len() <= 2_000);
        assert_eq!(first, second);
    }
}
