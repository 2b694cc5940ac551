//! MQTT publisher session
//!
//! - [`connection`] - pure state, errors and option building
//! - [`event_router`] - pure mapping of `rumqttc` events for v5 and v3.1.1
//! - [`ack_tracker`] - pairs acknowledgments with waiting publishers
//! - [`session`] - one client/event-loop pair for either protocol version
//! - [`client`] - the [`MessageService`] that ties them together
//!
//! # Usage
//!
//! ```rust,no_run
//! use mqttelemetry::config::MqttSection;
//! use mqttelemetry::transport::mqtt::MessageService;
//!
//! # tokio_test::block_on(async {
//! let config = MqttSection::new("localhost", "telemetry", "secret");
//!
//! let mut service = MessageService::connect(config).await?;
//! let code = service.send("telemetry/http", r#"{"ok":true}"#).await?;
//! assert!(code.is_success());
//! service.disconnect().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod ack_tracker;
pub mod client;
pub mod connection;
pub mod event_router;
pub mod session;

pub use ack_tracker::AckTracker;
pub use client::MessageService;
pub use connection::{ConnectionState, MqttError, PublishResultCode};
pub use event_router::{EventRouter, LinkEvent};
