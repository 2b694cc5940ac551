//! Mock implementations for testing
//!
//! Provides a mock [`Transport`] plus in-memory HTTP exchange halves, so the
//! reporter and payload builder can be tested without a broker or a server.

use crate::payload::{ExchangeRequest, ExchangeResponse, ExtractError, FieldPairs};
use crate::transport::mqtt::{ConnectionState, MqttError, PublishResultCode};
use crate::transport::Transport;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Topic and payload of one publish
pub type PublishedMessage = (String, String);

/// Mock transport for testing
#[derive(Debug, Default)]
pub struct MockTransport {
    pub published_messages: Arc<Mutex<Vec<PublishedMessage>>>,
    pub disconnect_calls: Arc<AtomicUsize>,
    /// Fail every send with a transport error
    pub should_fail: bool,
    /// Code returned for every send; `None` means success
    pub result_code: Option<PublishResultCode>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Every send is refused by the "broker" with this reason
    pub fn with_rejection(reason: &str) -> Self {
        Self {
            result_code: Some(PublishResultCode::Rejected(reason.to_string())),
            ..Default::default()
        }
    }

    pub async fn get_published_messages(&self) -> Vec<PublishedMessage> {
        self.published_messages.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.published_messages.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MqttError;

    async fn send(&self, topic: &str, message: &str) -> Result<PublishResultCode, Self::Error> {
        if self.connection_state() != ConnectionState::Connected {
            return Err(MqttError::NotConnected {
                state: self.connection_state(),
            });
        }
        if self.should_fail {
            return Err(MqttError::ConnectionLost("Mock failure".to_string()));
        }

        self.published_messages
            .lock()
            .await
            .push((topic.to_string(), message.to_string()));
        Ok(self
            .result_code
            .clone()
            .unwrap_or(PublishResultCode::Success))
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        if self.disconnect_calls.load(Ordering::SeqCst) > 0 {
            ConnectionState::Disconnected("Client disconnected".to_string())
        } else {
            ConnectionState::Connected
        }
    }
}

/// In-memory inbound request
#[derive(Debug, Clone)]
pub struct MockRequest {
    method: String,
    path: String,
    query: FieldPairs,
    path_params: FieldPairs,
    headers: FieldPairs,
    body: Result<Option<Bytes>, ExtractError>,
}

impl MockRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            query: Vec::new(),
            path_params: Vec::new(),
            headers: Vec::new(),
            body: Ok(None),
        }
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query
            .push((name.to_string(), Value::String(value.to_string())));
        self
    }

    pub fn with_path_param(mut self, name: &str, value: &str) -> Self {
        self.path_params
            .push((name.to_string(), Value::String(value.to_string())));
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_string(), Value::String(value.to_string())));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Ok(Some(Bytes::from(body)));
        self
    }

    /// Reading the body fails with this message
    pub fn with_body_error(mut self, message: &str) -> Self {
        self.body = Err(ExtractError::new(message));
        self
    }
}

#[async_trait]
impl ExchangeRequest for MockRequest {
    fn method(&self) -> String {
        self.method.clone()
    }

    fn url_path(&self) -> String {
        self.path.clone()
    }

    fn query_params(&self) -> FieldPairs {
        self.query.clone()
    }

    fn path_params(&self) -> FieldPairs {
        self.path_params.clone()
    }

    fn headers(&self) -> FieldPairs {
        self.headers.clone()
    }

    async fn body(&self) -> Result<Option<Bytes>, ExtractError> {
        self.body.clone()
    }
}

/// In-memory response
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: Option<u16>,
    body: Result<Option<Bytes>, ExtractError>,
}

impl MockResponse {
    pub fn new(status: Option<u16>) -> Self {
        Self {
            status,
            body: Ok(None),
        }
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Ok(Some(Bytes::from(body)));
        self
    }

    pub fn with_body_error(mut self, message: &str) -> Self {
        self.body = Err(ExtractError::new(message));
        self
    }
}

impl ExchangeResponse for MockResponse {
    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn body(&self) -> Result<Option<Bytes>, ExtractError> {
        self.body.clone()
    }
}
