//! Publishes one telemetry record per HTTP exchange

use crate::error::{TelemetryError, TelemetryResult};
use crate::payload::{ExchangeRequest, ExchangeResponse, PayloadBuilder, TelemetryRecord};
use crate::transport::mqtt::PublishResultCode;
use crate::transport::Transport;
use tracing::debug;

/// Builds records and sends them to a fixed topic over a [`Transport`]
pub struct TelemetryReporter<T: Transport> {
    transport: T,
    topic: String,
}

impl<T: Transport> TelemetryReporter<T> {
    pub fn new(transport: T, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the record for this exchange and publish it.
    ///
    /// Extraction problems only degrade the record. A broker refusal comes
    /// back as `Ok` with a failing code.
    pub async fn report<Q, S>(&self, request: &Q, response: &S) -> TelemetryResult<PublishResultCode>
    where
        Q: ExchangeRequest + ?Sized,
        S: ExchangeResponse + ?Sized,
    {
        let built = PayloadBuilder::from_exchange(request, response).await;
        if !built.is_complete() {
            debug!(
                degraded = built.diagnostics.len(),
                "Publishing record with degraded fields"
            );
        }
        self.publish_record(&built.record).await
    }

    pub async fn publish_record(
        &self,
        record: &TelemetryRecord,
    ) -> TelemetryResult<PublishResultCode> {
        let payload = record.to_json()?;
        self.transport
            .send(&self.topic, &payload)
            .await
            .map_err(TelemetryError::transport)
    }

    /// Close the underlying session
    pub async fn shutdown(mut self) -> TelemetryResult<()> {
        self.transport
            .disconnect()
            .await
            .map_err(TelemetryError::transport)
    }
}
