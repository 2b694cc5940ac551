//! Configuration for the telemetry publisher
//!
//! Broker connection settings live in the `[mqtt]` section and the destination
//! topic in `[telemetry]`. Every field except `mqtt.host` has a default, so a
//! publisher can also be configured in code through [`MqttSection::new`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Top-level configuration file layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    pub mqtt: MqttSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker hostname or IP address
    pub host: String,
    /// Broker port (default: 1883)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username given directly
    #[serde(default)]
    pub username: Option<String>,
    /// Password given directly; never written back out
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Environment variable holding the username, used when `username` is absent
    #[serde(default)]
    pub username_env: Option<String>,
    /// Environment variable holding the password, used when `password` is absent
    #[serde(default)]
    pub password_env: Option<String>,
    /// MQTT protocol version (default: v5)
    #[serde(default)]
    pub protocol: ProtocolVersion,
    /// Delivery guarantee requested for each publish (default: 1)
    #[serde(default)]
    pub qos: DeliveryQos,
    /// Wrap the connection in TLS using the platform roots
    #[serde(default)]
    pub tls: bool,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Upper bound on waiting for the broker's CONNACK, fractions allowed
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: f64,
    /// Upper bound on one `send`, from the call to the broker's result code
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: f64,
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
    /// Largest packet accepted or sent, in bytes
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: u32,
}

/// Telemetry routing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    /// Topic every telemetry record is published to
    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            topic: default_topic(),
        }
    }
}

/// MQTT protocol version spoken to the broker
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProtocolVersion {
    #[serde(rename = "v3.1.1", alias = "3.1.1", alias = "v311", alias = "mqttv311")]
    V311,
    #[default]
    #[serde(rename = "v5", alias = "5", alias = "mqttv5")]
    V5,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V311 => write!(f, "MQTT v3.1.1"),
            ProtocolVersion::V5 => write!(f, "MQTT v5"),
        }
    }
}

/// Delivery guarantee for published messages, configured as 0, 1 or 2
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub enum DeliveryQos {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl TryFrom<u8> for DeliveryQos {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(DeliveryQos::AtMostOnce),
            1 => Ok(DeliveryQos::AtLeastOnce),
            2 => Ok(DeliveryQos::ExactlyOnce),
            other => Err(format!("QoS must be 0, 1 or 2, got {other}")),
        }
    }
}

impl From<DeliveryQos> for u8 {
    fn from(qos: DeliveryQos) -> Self {
        match qos {
            DeliveryQos::AtMostOnce => 0,
            DeliveryQos::AtLeastOnce => 1,
            DeliveryQos::ExactlyOnce => 2,
        }
    }
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    60
}

fn default_connect_timeout() -> f64 {
    10.0
}

fn default_publish_timeout() -> f64 {
    30.0
}

fn default_client_id_prefix() -> String {
    "mqttelemetry".to_string()
}

fn default_max_packet_size() -> u32 {
    256 * 1024
}

fn default_topic() -> String {
    "telemetry/http".to_string()
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to render TOML: {0}")]
    TomlRender(#[from] toml::ser::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MqttSection {
    /// Build a section from the connection essentials; everything else takes its default,
    /// including the protocol version (v5)
    pub fn new<H, U, P>(host: H, username: U, password: P) -> Self
    where
        H: Into<String>,
        U: Into<String>,
        P: Into<String>,
    {
        Self {
            host: host.into(),
            port: default_port(),
            username: Some(username.into()),
            password: Some(password.into()),
            username_env: None,
            password_env: None,
            protocol: ProtocolVersion::default(),
            qos: DeliveryQos::default(),
            tls: false,
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
            publish_timeout_secs: default_publish_timeout(),
            client_id_prefix: default_client_id_prefix(),
            max_packet_size: default_max_packet_size(),
        }
    }

    /// Anonymous session against `host`
    pub fn anonymous<H: Into<String>>(host: H) -> Self {
        Self {
            username: None,
            password: None,
            ..Self::new(host, "", "")
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_qos(mut self, qos: DeliveryQos) -> Self {
        self.qos = qos;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        seconds_to_duration(self.connect_timeout_secs, default_connect_timeout())
    }

    pub fn publish_timeout(&self) -> Duration {
        seconds_to_duration(self.publish_timeout_secs, default_publish_timeout())
    }

    /// Username to authenticate with: the direct value, else the named environment variable.
    /// A named variable that is unset is an error rather than an anonymous login.
    pub fn resolved_username(&self) -> Result<Option<String>, ConfigError> {
        resolve_credential(self.username.as_ref(), self.username_env.as_ref())
    }

    /// Password to authenticate with, resolved like [`Self::resolved_username`]
    pub fn resolved_password(&self) -> Result<Option<String>, ConfigError> {
        resolve_credential(self.password.as_ref(), self.password_env.as_ref())
    }

    /// Check field ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "mqtt.host must not be empty".to_string(),
            ));
        }
        if self.client_id_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "mqtt.client_id_prefix must not be empty".to_string(),
            ));
        }
        if self.keep_alive_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.keep_alive_secs must be greater than 0".to_string(),
            ));
        }
        let timeouts = [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("publish_timeout_secs", self.publish_timeout_secs),
        ];
        for (name, value) in timeouts {
            if !matches!(Duration::try_from_secs_f64(value), Ok(d) if !d.is_zero()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "mqtt.{name} must be a positive number of seconds, got {value}"
                )));
            }
        }
        if self.max_packet_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.max_packet_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl TelemetryConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TelemetryConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mqtt.validate()?;
        if self.telemetry.topic.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "telemetry.topic must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the effective configuration; the password is left out
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn resolve_credential(
    direct: Option<&String>,
    env_var_name: Option<&String>,
) -> Result<Option<String>, ConfigError> {
    match (direct, env_var_name) {
        (Some(value), _) => Ok(Some(value.clone())),
        (None, Some(name)) => get_env_var_required(name).map(Some),
        (None, None) => Ok(None),
    }
}

/// Unvalidated sections fall back to the default instead of panicking
fn seconds_to_duration(secs: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
        .unwrap_or_else(|| Duration::from_secs_f64(fallback))
}

fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
    std::env::var(env_var_name).map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
}
