//! warp integration
//!
//! [`capture_request`] is a filter that hands the route an owned copy of the
//! inbound request; [`capture_reply`] collects a reply's body so it can be
//! recorded, and gives back an equivalent reply to return to the client.

use super::source::{ExchangeResponse, ExtractError};
use bytes::Bytes;
use warp::http::{HeaderMap, Method, Request, Uri};
use warp::hyper::Body;
use warp::path::FullPath;
use warp::{Filter, Rejection, Reply};

/// The captured method, path and query did not form a valid URI
#[derive(Debug)]
pub struct InvalidCapturedUri;

impl warp::reject::Reject for InvalidCapturedUri {}

/// Extract the whole inbound request as `http::Request<Bytes>`
pub fn capture_request() -> impl Filter<Extract = (Request<Bytes>,), Error = Rejection> + Clone {
    warp::method()
        .and(warp::path::full())
        .and(
            warp::query::raw()
                .or(warp::any().map(String::new))
                .unify(),
        )
        .and(warp::header::headers_cloned())
        .and(warp::body::bytes())
        .and_then(
            |method: Method, path: FullPath, query: String, headers: HeaderMap, body: Bytes| async move {
                assemble_request(method, &path, &query, headers, body)
                    .map_err(|_| warp::reject::custom(InvalidCapturedUri))
            },
        )
}

fn assemble_request(
    method: Method,
    path: &FullPath,
    query: &str,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Request<Bytes>, warp::http::Error> {
    let target = if query.is_empty() {
        path.as_str().to_owned()
    } else {
        format!("{}?{}", path.as_str(), query)
    };
    let uri: Uri = target.parse()?;

    let mut request = Request::new(body);
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.headers_mut() = headers;
    Ok(request)
}

/// Status and body of a reply, as seen by the client
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    status: Option<u16>,
    body: Result<Option<Bytes>, ExtractError>,
}

impl CapturedResponse {
    pub fn new(status: Option<u16>, body: Result<Option<Bytes>, ExtractError>) -> Self {
        Self { status, body }
    }
}

impl ExchangeResponse for CapturedResponse {
    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn body(&self) -> Result<Option<Bytes>, ExtractError> {
        self.body.clone()
    }
}

/// Collect a reply's body. The returned response carries the same status,
/// headers and body; when collection fails its body is empty.
pub async fn capture_reply<R: Reply>(reply: R) -> (CapturedResponse, warp::reply::Response) {
    let (parts, body) = reply.into_response().into_parts();
    let status = Some(parts.status.as_u16());

    match warp::hyper::body::to_bytes(body).await {
        Ok(bytes) => (
            CapturedResponse::new(status, Ok(Some(bytes.clone()))),
            warp::reply::Response::from_parts(parts, Body::from(bytes)),
        ),
        Err(e) => (
            CapturedResponse::new(status, Err(ExtractError::new(e.to_string()))),
            warp::reply::Response::from_parts(parts, Body::empty()),
        ),
    }
}
