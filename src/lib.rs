//! mqttelemetry - HTTP telemetry over MQTT
//!
//! Captures metadata of HTTP request/response pairs and publishes each one
//! as a JSON record to an MQTT broker.
//!
//! # Overview
//!
//! - [`payload`] turns an exchange into a [`TelemetryRecord`], degrading
//!   unreadable fields instead of failing
//! - [`transport`] holds the publisher session ([`MessageService`]) for
//!   MQTT v5 and v3.1.1
//! - [`reporter`] ties both together on a configured topic
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mqttelemetry::config::MqttSection;
//! use mqttelemetry::reporter::TelemetryReporter;
//! use mqttelemetry::transport::mqtt::MessageService;
//! use bytes::Bytes;
//! use warp::http::{Request, Response};
//!
//! # tokio_test::block_on(async {
//! let service = MessageService::connect(MqttSection::new("localhost", "svc", "secret")).await?;
//! let reporter = TelemetryReporter::new(service, "telemetry/http");
//!
//! let request = Request::get("/health").body(Bytes::new())?;
//! let response = Response::new(Bytes::from_static(br#"{"ok":true}"#));
//! let code = reporter.report(&request, &response).await?;
//! println!("broker said: {code}");
//!
//! reporter.shutdown().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod payload;
pub mod reporter;
pub mod testing;
pub mod transport;

pub use config::{DeliveryQos, MqttSection, ProtocolVersion, TelemetryConfig};
pub use error::{TelemetryError, TelemetryResult};
pub use payload::{BuiltRecord, PayloadBuilder, TelemetryRecord};
pub use reporter::TelemetryReporter;
pub use transport::mqtt::{ConnectionState, MessageService, MqttError, PublishResultCode};
pub use transport::Transport;
