//! End-to-end: a warp route captured, recorded and published through the
//! reporter with a mock transport

use bytes::Bytes;
use mqttelemetry::payload::{capture_reply, capture_request, PathParams};
use mqttelemetry::reporter::TelemetryReporter;
use mqttelemetry::testing::{MockTransport, PublishedMessage};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::Mutex;
use warp::http::{Request, StatusCode};
use warp::Filter;

type Published = Arc<Mutex<Vec<PublishedMessage>>>;

fn instrumented_routes(
    reporter: Arc<TelemetryReporter<MockTransport>>,
) -> impl Filter<Extract = (warp::reply::Response,), Error = warp::Rejection> + Clone {
    warp::path!("items" / u32)
        .and(capture_request())
        .and(warp::any().map(move || reporter.clone()))
        .and_then(
            |id: u32, mut request: Request<Bytes>, reporter: Arc<TelemetryReporter<MockTransport>>| async move {
                request
                    .extensions_mut()
                    .insert(PathParams::new().with("id", id.to_string()));

                let reply = if id == 0 {
                    warp::reply::with_status(
                        warp::reply::json(&"no such item"),
                        StatusCode::NOT_FOUND,
                    )
                } else {
                    warp::reply::with_status(
                        warp::reply::json(&json!({"id": id, "name": "widget"})),
                        StatusCode::OK,
                    )
                };

                let (captured, response) = capture_reply(reply).await;
                let _ = reporter.report(&request, &captured).await;
                Ok::<_, Infallible>(response)
            },
        )
}

fn setup() -> (
    impl Filter<Extract = (warp::reply::Response,), Error = warp::Rejection> + Clone,
    Published,
) {
    let transport = MockTransport::new();
    let published = transport.published_messages.clone();
    let reporter = Arc::new(TelemetryReporter::new(transport, "telemetry/http"));
    (instrumented_routes(reporter), published)
}

#[tokio::test]
async fn test_exchange_is_published_and_reply_untouched() {
    let (routes, published) = setup();

    let response = warp::test::request()
        .method("POST")
        .path("/items/7?verbose=true&fields=name")
        .header("x-trace-id", "abc123")
        .body("{\n  \"note\":   \"hi\"\n}")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body, json!({"id": 7, "name": "widget"}));

    let messages = published.lock().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "telemetry/http");

    let record: Value = serde_json::from_str(&messages[0].1).unwrap();
    assert_eq!(record["request_method"], "POST");
    assert_eq!(record["request_url_path"], "/items/7");
    assert_eq!(record["request_body"], "{ \"note\": \"hi\" }");
    assert_eq!(
        record["request_query_params"],
        json!({"verbose": "true", "fields": "name"})
    );
    assert_eq!(record["request_path_params"], json!({"id": "7"}));
    assert_eq!(record["headers"]["x-trace-id"], "abc123");
    assert_eq!(record["response_body"], json!({"id": 7, "name": "widget"}));
    assert_eq!(record["response_status_code"], 200);
}

#[tokio::test]
async fn test_error_reply_is_recorded() {
    let (routes, published) = setup();

    let response = warp::test::request()
        .method("GET")
        .path("/items/0")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let messages = published.lock().await;
    let record: Value = serde_json::from_str(&messages[0].1).unwrap();
    assert_eq!(record["request_body"], Value::Null);
    assert_eq!(record["request_query_params"], json!({}));
    assert_eq!(record["response_body"], "no such item");
    assert_eq!(record["response_status_code"], 404);
}

#[tokio::test]
async fn test_unmatched_route_publishes_nothing() {
    let (routes, published) = setup();

    let response = warp::test::request()
        .method("GET")
        .path("/other")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(published.lock().await.is_empty());
}
