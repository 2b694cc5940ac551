//! Pure connection state, error types and option building for the MQTT session
//!
//! Nothing in this module touches the network; it turns an [`MqttSection`]
//! into `rumqttc` options for the selected protocol version.

use crate::config::{ConfigError, DeliveryQos, MqttSection};
use rumqttc::Transport as RumqttcTransport;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of one publisher session. There is no way back from `Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Session created, waiting for the broker's CONNACK
    Constructing,
    /// CONNACK received, background loop running
    Connected,
    /// Closed by the client or lost, with the reason
    Disconnected(String),
}

/// Result code reported by the broker for one publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishResultCode {
    Success,
    /// Accepted, but nobody is subscribed (MQTT v5 reason 0x10)
    NoMatchingSubscribers,
    /// Refused by the broker with the given reason
    Rejected(String),
}

impl PublishResultCode {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            PublishResultCode::Success | PublishResultCode::NoMatchingSubscribers
        )
    }
}

impl fmt::Display for PublishResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishResultCode::Success => write!(f, "success"),
            PublishResultCode::NoMatchingSubscribers => write!(f, "no matching subscribers"),
            PublishResultCode::Rejected(reason) => write!(f, "rejected ({reason})"),
        }
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("No CONNACK from broker within {0:?}")]
    ConnectTimeout(Duration),
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
    #[error("Publishing failed: {0}")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    #[error("No acknowledgment for publish to {topic} within {timeout:?}")]
    AckTimeout { topic: String, timeout: Duration },
    #[error("Disconnect failed: {0}")]
    DisconnectFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Client id unique per session: `<prefix>-<12 hex chars>`
pub fn build_client_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &suffix[..12])
}

/// Split `host:port`. A bare host, or an IPv6 address without a port, comes
/// back whole with no port.
pub fn split_host_port(address: &str) -> (&str, Option<u16>) {
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !host.contains(':') => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (address, None),
        },
        _ => (address, None),
    }
}

fn credentials(config: &MqttSection) -> Result<Option<(String, String)>, MqttError> {
    let username = config.resolved_username()?;
    let password = config.resolved_password()?;
    Ok(username.map(|username| (username, password.unwrap_or_default())))
}

/// Options for an MQTT v5 session
pub fn configure_v5_options(
    config: &MqttSection,
    client_id: &str,
) -> Result<rumqttc::v5::MqttOptions, MqttError> {
    let mut options = rumqttc::v5::MqttOptions::new(client_id, config.host.clone(), config.port);

    if let Some((username, password)) = credentials(config)? {
        options.set_credentials(username, password);
    }
    if config.tls {
        options.set_transport(RumqttcTransport::tls_with_default_config());
    }
    options.set_keep_alive(config.keep_alive());
    options.set_clean_start(true);
    options.set_max_packet_size(Some(config.max_packet_size));

    Ok(options)
}

/// Options for an MQTT v3.1.1 session
pub fn configure_v311_options(
    config: &MqttSection,
    client_id: &str,
) -> Result<rumqttc::MqttOptions, MqttError> {
    let mut options = rumqttc::MqttOptions::new(client_id, config.host.clone(), config.port);

    if let Some((username, password)) = credentials(config)? {
        options.set_credentials(username, password);
    }
    if config.tls {
        options.set_transport(RumqttcTransport::tls_with_default_config());
    }
    options.set_keep_alive(config.keep_alive());
    options.set_clean_session(true);
    let max_packet_size = config.max_packet_size as usize;
    options.set_max_packet_size(max_packet_size, max_packet_size);

    Ok(options)
}

pub fn v5_qos(qos: DeliveryQos) -> rumqttc::v5::mqttbytes::QoS {
    use rumqttc::v5::mqttbytes::QoS;
    match qos {
        DeliveryQos::AtMostOnce => QoS::AtMostOnce,
        DeliveryQos::AtLeastOnce => QoS::AtLeastOnce,
        DeliveryQos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

pub fn v311_qos(qos: DeliveryQos) -> rumqttc::QoS {
    use rumqttc::QoS;
    match qos {
        DeliveryQos::AtMostOnce => QoS::AtMostOnce,
        DeliveryQos::AtLeastOnce => QoS::AtLeastOnce,
        DeliveryQos::ExactlyOnce => QoS::ExactlyOnce,
    }
}
