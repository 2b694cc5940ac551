//! Payload building from real `http` types and degraded inputs
//!
//! Tests focus on the record that comes out, not on how fields are extracted.

use bytes::Bytes;
use mqttelemetry::payload::extract::normalize_whitespace;
use mqttelemetry::payload::{
    DiagnosticKind, PathParams, PayloadBuilder, RecordField, DEFAULT_STATUS_CODE,
};
use mqttelemetry::testing::{MockRequest, MockResponse};
use proptest::prelude::*;
use serde_json::{json, Value};
use warp::http::{Request, Response, StatusCode};

#[tokio::test]
async fn test_http_exchange_becomes_complete_record() {
    let mut request = Request::put("/users/42/settings?theme=dark&lang=en")
        .header("content-type", "application/json")
        .header("x-request-id", "r-1")
        .body(Bytes::from_static(b"{ \"theme\":\n\t\"dark\" }"))
        .unwrap();
    request
        .extensions_mut()
        .insert(PathParams::new().with("user_id", "42"));

    let mut response = Response::new(Bytes::from_static(br#"{"saved": true}"#));
    *response.status_mut() = StatusCode::ACCEPTED;

    let built = PayloadBuilder::from_exchange(&request, &response).await;
    assert!(built.is_complete());

    let json: Value = serde_json::from_str(&built.record.to_json().unwrap()).unwrap();
    assert_eq!(
        json,
        json!({
            "request_method": "PUT",
            "request_body": "{ \"theme\": \"dark\" }",
            "request_url_path": "/users/42/settings",
            "request_query_params": {"theme": "dark", "lang": "en"},
            "request_path_params": {"user_id": "42"},
            "headers": {"content-type": "application/json", "x-request-id": "r-1"},
            "response_body": {"saved": true},
            "response_status_code": 202
        })
    );
}

#[tokio::test]
async fn test_invalid_utf8_request_body() {
    let request = MockRequest::new("POST", "/upload").with_body(vec![b'o', b'k', 0xc3, 0x28]);
    let response = MockResponse::new(Some(200)).with_body(br#"{"ok": true}"#.to_vec());

    let built = PayloadBuilder::from_exchange(&request, &response).await;

    assert_eq!(built.record.request_body, None);
    assert_eq!(built.record.response_body, Some(json!({"ok": true})));
    assert_eq!(
        built.diagnostic_for(RecordField::RequestBody).map(|d| d.kind),
        Some(DiagnosticKind::InvalidUtf8)
    );
}

#[tokio::test]
async fn test_response_body_variants() {
    let request = MockRequest::new("GET", "/");

    let cases = vec![
        (br#"{"ok": true}"#.to_vec(), json!({"ok": true})),
        (b"[1, 2, 3]".to_vec(), json!([1, 2, 3])),
        (b"plain text".to_vec(), json!("plain text")),
        (Vec::new(), json!("")),
    ];

    for (body, expected) in cases {
        let response = MockResponse::new(Some(200)).with_body(body);
        let built = PayloadBuilder::from_exchange(&request, &response).await;
        assert_eq!(built.record.response_body, Some(expected));
    }
}

#[tokio::test]
async fn test_invalid_utf8_response_body_is_absent() {
    let request = MockRequest::new("GET", "/");
    let response = MockResponse::new(Some(200)).with_body(vec![0xff, 0xfe, 0xfd]);

    let built = PayloadBuilder::from_exchange(&request, &response).await;

    assert_eq!(built.record.response_body, None);
    assert_eq!(
        built.diagnostic_for(RecordField::ResponseBody).map(|d| d.kind),
        Some(DiagnosticKind::InvalidUtf8)
    );
}

#[tokio::test]
async fn test_missing_status_defaults() {
    let request = MockRequest::new("GET", "/");
    let response = MockResponse::new(None);

    let built = PayloadBuilder::from_exchange(&request, &response).await;

    assert_eq!(built.record.response_status_code, DEFAULT_STATUS_CODE);
    assert_eq!(built.record.response_status_code, 500);
}

#[tokio::test]
async fn test_whitespace_only_body_becomes_empty_string() {
    let request = MockRequest::new("POST", "/").with_body(b" \n\t ".to_vec());
    let response = MockResponse::new(Some(200));

    let built = PayloadBuilder::from_exchange(&request, &response).await;

    assert_eq!(built.record.request_body.as_deref(), Some(""));
}

#[test]
fn test_whitespace_examples() {
    assert_eq!(normalize_whitespace("a   b\nc"), "a b c");
    assert_eq!(normalize_whitespace("  padded\t"), "padded");
    assert_eq!(normalize_whitespace("\r\n"), "");
    assert_eq!(normalize_whitespace("a\u{1c}b\u{1f} c"), "a b c");
    assert_eq!(normalize_whitespace("x\u{a0}\u{3000}y"), "x y");
}

proptest! {
    #[test]
    fn prop_normalized_text_has_single_spaces(text in "[a-z \\t\\n\\r]{0,64}") {
        let normalized = normalize_whitespace(&text);

        prop_assert!(!normalized.contains("  "));
        prop_assert!(!normalized.starts_with(' '));
        prop_assert!(!normalized.ends_with(' '));
        prop_assert!(!normalized.contains(['\t', '\n', '\r']));
        prop_assert_eq!(
            normalized.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>(),
            text.split_whitespace().collect::<Vec<_>>()
        );
    }

    #[test]
    fn prop_normalization_is_idempotent(text in "\\PC{0,64}") {
        let once = normalize_whitespace(&text);
        prop_assert_eq!(normalize_whitespace(&once), once.clone());
    }
}
