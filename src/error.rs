//! Crate-level error type
//!
//! Extraction problems never surface here: the payload builder degrades fields
//! instead of failing. What remains are configuration, serialization and
//! transport failures.

use thiserror::Error;

/// Main error type for telemetry operations
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    TransportError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl TelemetryError {
    /// Wrap any transport error
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TransportError(Box::new(error))
    }
}

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::transport::mqtt::MqttError;

    #[test]
    fn test_config_error_conversion() {
        let error: TelemetryError = ConfigError::InvalidConfig("bad host".to_string()).into();
        assert!(matches!(error, TelemetryError::ConfigError(_)));
        assert_eq!(
            error.to_string(),
            "Configuration error: Invalid configuration: bad host"
        );
    }

    #[test]
    fn test_transport_error_wraps_source() {
        let error = TelemetryError::transport(MqttError::ConnectionLost("reset".to_string()));
        assert!(matches!(error, TelemetryError::TransportError(_)));
        assert!(error.to_string().contains("reset"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: TelemetryError = json_error.into();
        assert!(error.to_string().starts_with("Serialization error"));
    }
}
