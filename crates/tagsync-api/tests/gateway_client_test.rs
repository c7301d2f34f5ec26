// Integration tests for `GatewayClient` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tagsync_api::{ApiStatus, Error, GatewayClient, ReadRequest, TransportConfig, WriteRequest};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, GatewayClient) {
    let server = MockServer::start().await;
    let client = GatewayClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

fn write_request(value: serde_json::Value) -> WriteRequest {
    WriteRequest {
        device_id: "plc_001".into(),
        variable: "Light.Kitchen.bOn".into(),
        value,
    }
}

// ── Write ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_write_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/variables/write"))
        .and(body_json(json!({
            "deviceId": "plc_001",
            "variable": "Light.Kitchen.bOn",
            "value": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.write(&write_request(json!(true))).await.unwrap();
    assert!(resp.is_success());
    assert_eq!(resp.message, None);
}

#[tokio::test]
async fn test_write_application_error_is_returned_as_response() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/variables/write"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "error",
            "message": "Unknown variable Light.Kitchen.bOn"
        })))
        .mount(&server)
        .await;

    let resp = client.write(&write_request(json!(false))).await.unwrap();
    assert_eq!(resp.status, ApiStatus::Error);
    assert_eq!(resp.message.as_deref(), Some("Unknown variable Light.Kitchen.bOn"));
}

#[tokio::test]
async fn test_write_server_error_without_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/variables/write"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = client.write(&write_request(json!(true))).await.unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 502 }));
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/variables/write"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.write(&write_request(json!(true))).await.unwrap_err();
    assert!(err.is_auth_error());
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;
    let transport =
        TransportConfig::default().with_token(secrecy::SecretString::from("s3cret".to_string()));
    let client = GatewayClient::new(server.uri().parse().unwrap(), &transport).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/variables/write"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.write(&write_request(json!(1))).await.unwrap().is_success());
}

// ── Read ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_read_returns_value_and_source() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/variables/read"))
        .and(body_json(json!({
            "deviceId": "plc_001",
            "variable": "Hvac.rSetpoint",
            "useCache": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "value": 21.5,
            "timestamp": 1_700_000_000.25,
            "type": "REAL",
            "source": "device"
        })))
        .mount(&server)
        .await;

    let resp = client
        .read(&ReadRequest {
            device_id: "plc_001".into(),
            variable: "Hvac.rSetpoint".into(),
            use_cache: false,
        })
        .await
        .unwrap();

    assert!(resp.is_success());
    assert_eq!(resp.value, Some(json!(21.5)));
    assert_eq!(resp.timestamp, Some(1_700_000_000.25));
    assert_eq!(resp.declared_type.as_deref(), Some("REAL"));
    assert_eq!(resp.source.as_deref(), Some("device"));
}

#[tokio::test]
async fn test_read_garbage_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/variables/read"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client
        .read(&ReadRequest {
            device_id: "plc_001".into(),
            variable: "A".into(),
            use_cache: true,
        })
        .await
        .unwrap_err();

    match err {
        Error::Deserialization { body, .. } => assert!(body.contains("oops")),
        other => panic!("unexpected error: {other:?}"),
    }
}

// ── Statistics ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_statistics() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/variables/statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "statistics": { "activeSubscriptions": 3, "devices": 1 }
        })))
        .mount(&server)
        .await;

    let resp = client.statistics().await.unwrap();
    assert_eq!(resp.status, ApiStatus::Success);
    assert_eq!(resp.statistics.unwrap()["activeSubscriptions"], 3);
}

// ── Transport failures ──────────────────────────────────────────────

#[tokio::test]
async fn test_connection_refused_is_transient() {
    // Nothing listens on this port once the server is dropped.
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };
    let client = GatewayClient::from_reqwest(&uri, reqwest::Client::new()).unwrap();

    let err = client.write(&write_request(json!(true))).await.unwrap_err();
    assert!(err.is_transient(), "expected transient error, got {err:?}");
}

#[tokio::test]
async fn test_slow_gateway_reports_configured_timeout() {
    let server = MockServer::start().await;
    let transport = TransportConfig {
        timeout: Duration::from_secs(1),
        ..TransportConfig::default()
    };
    let client = GatewayClient::new(server.uri().parse().unwrap(), &transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/variables/statistics"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "success" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = client.statistics().await.unwrap_err();
    assert!(
        matches!(err, Error::Timeout { timeout_secs: 1 }),
        "expected timeout, got {err:?}"
    );
    assert!(err.is_transient());
}
