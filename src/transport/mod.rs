//! Transport layer for telemetry publishing
//!
//! [`Transport`] is the seam between the reporter and the broker, so the
//! reporter can be driven by [`crate::testing::MockTransport`] in tests.

use crate::transport::mqtt::{ConnectionState, PublishResultCode};

pub mod mqtt;

/// A connected publisher session
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Publish one message and return the broker's result code
    async fn send(&self, topic: &str, message: &str) -> Result<PublishResultCode, Self::Error>;

    /// Close the session; calling it again is a no-op
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    fn connection_state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }
}
