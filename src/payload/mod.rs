//! Payload building: HTTP exchange in, [`TelemetryRecord`] out
//!
//! - [`source`] - traits the HTTP layer implements, plus `http` type impls
//! - [`extract`] - pure per-field extraction with diagnostics
//! - [`builder`] - assembles the record, logging degraded fields
//! - [`record`] - the serializable record and its build report
//! - [`capture`] - warp filter and reply capture helpers
//!
//! ```rust
//! use bytes::Bytes;
//! use mqttelemetry::payload::PayloadBuilder;
//! use warp::http::{Request, Response};
//!
//! # tokio_test::block_on(async {
//! let request = Request::post("/search?q=mqtt")
//!     .body(Bytes::from_static(b"find   this"))
//!     .unwrap();
//! let response = Response::new(Bytes::from_static(br#"{"hits": 3}"#));
//!
//! let built = PayloadBuilder::from_exchange(&request, &response).await;
//! assert_eq!(built.record.request_body.as_deref(), Some("find this"));
//! assert_eq!(built.record.response_status_code, 200);
//! # });
//! ```

pub mod builder;
pub mod capture;
pub mod extract;
pub mod record;
pub mod source;

pub use builder::PayloadBuilder;
pub use capture::{capture_reply, capture_request, CapturedResponse};
pub use extract::{DiagnosticKind, Extraction};
pub use record::{BuiltRecord, FieldDiagnostic, RecordField, TelemetryRecord, DEFAULT_STATUS_CODE};
pub use source::{ExchangeRequest, ExchangeResponse, ExtractError, FieldPairs, PathParams};
