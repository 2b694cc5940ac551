//! Request and response sources
//!
//! The builder reads an HTTP exchange through these traits so any HTTP layer
//! can feed it. Implementations are provided for `http::Request<Bytes>` and
//! `http::Response<Bytes>` (as re-exported by warp).

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use warp::http::{HeaderMap, Request, Response};

/// Key/value pairs in the order the HTTP layer supplied them
pub type FieldPairs = Vec<(String, Value)>;

/// A body could not be read from its source
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ExtractError {
    message: String,
}

impl ExtractError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Inbound side of an HTTP exchange
#[async_trait]
pub trait ExchangeRequest: Send + Sync {
    fn method(&self) -> String;

    fn url_path(&self) -> String;

    fn query_params(&self) -> FieldPairs;

    fn path_params(&self) -> FieldPairs;

    fn headers(&self) -> FieldPairs;

    /// Raw request body; may suspend while the body is collected
    async fn body(&self) -> Result<Option<Bytes>, ExtractError>;
}

/// Outbound side of an HTTP exchange
pub trait ExchangeResponse: Send + Sync {
    /// `None` when the response carries no status
    fn status_code(&self) -> Option<u16>;

    /// `Ok(None)` when the response exposes no body
    fn body(&self) -> Result<Option<Bytes>, ExtractError>;
}

/// Route parameters matched by the router, stored as a request extension
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(pub HashMap<String, String>);

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

/// Parse a raw query string; repeated keys keep their first position and last value
pub fn parse_query(query: &str) -> FieldPairs {
    let mut pairs: FieldPairs = Vec::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()).into_owned() {
        match pairs.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = Value::String(value),
            None => pairs.push((key, Value::String(value))),
        }
    }
    pairs
}

/// Copy headers. A repeated name keeps its first value; values are decoded as
/// latin-1 so every byte survives.
pub fn header_pairs(headers: &HeaderMap) -> FieldPairs {
    headers
        .keys()
        .filter_map(|name| {
            let value = headers.get(name)?;
            let text: String = value.as_bytes().iter().map(|&b| b as char).collect();
            Some((name.as_str().to_owned(), Value::String(text)))
        })
        .collect()
}

#[async_trait]
impl ExchangeRequest for Request<Bytes> {
    fn method(&self) -> String {
        Request::method(self).as_str().to_owned()
    }

    fn url_path(&self) -> String {
        self.uri().path().to_owned()
    }

    fn query_params(&self) -> FieldPairs {
        self.uri().query().map(parse_query).unwrap_or_default()
    }

    fn path_params(&self) -> FieldPairs {
        let Some(params) = self.extensions().get::<PathParams>() else {
            return Vec::new();
        };
        let mut pairs: FieldPairs = params
            .0
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    fn headers(&self) -> FieldPairs {
        header_pairs(Request::headers(self))
    }

    async fn body(&self) -> Result<Option<Bytes>, ExtractError> {
        Ok(Some(Request::body(self).clone()))
    }
}

impl ExchangeResponse for Response<Bytes> {
    fn status_code(&self) -> Option<u16> {
        Some(self.status().as_u16())
    }

    fn body(&self) -> Result<Option<Bytes>, ExtractError> {
        Ok(Some(Response::body(self).clone()))
    }
}
